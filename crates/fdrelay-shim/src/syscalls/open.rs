//! open / openat interposition.

use std::ffi::CStr;

use libc::{c_char, c_int, mode_t};

use fdrelay_proto::{open_wants_mode, Request};

use crate::guards::{SymbolGuard, IN_OPEN, IN_OPENAT};
use crate::linux_raw;
use crate::rpc::{self, Exchange};
use crate::{shim_debug, shim_diag};

/// The returned value is a client descriptor, meaningful only to this
/// library and its server.
pub unsafe fn open_entry(path: *const c_char, flags: c_int, raw_mode: mode_t) -> c_int {
    // O_CREAT | O_TMPFILE is the sole trigger for reading the mode slot;
    // without them the register holds garbage and 0 is forwarded.
    let mode = if open_wants_mode(flags) { raw_mode } else { 0 };

    let Some(_guard) = SymbolGuard::enter(&IN_OPEN) else {
        return linux_raw::raw_open(path, flags, mode);
    };

    let Some(path_str) = path_utf8(path) else {
        return linux_raw::raw_open(path, flags, mode);
    };

    shim_debug!("intercepted open(\"{}\", {:#x}, {:o})", path_str, flags, mode);

    let request = Request::Open {
        path: path_str.to_owned(),
        flags,
        mode: mode as u32,
    };
    match rpc::exchange(&request) {
        Exchange::Reply(reply) => {
            linux_raw::set_errno(reply.err);
            reply.result as c_int
        }
        Exchange::TransportFailed => {
            shim_diag!("open: rpc exchange failed");
            linux_raw::set_errno(libc::EIO);
            -1
        }
        Exchange::NoClient => {
            shim_diag!("no rpc connection, using direct syscall");
            linux_raw::raw_open(path, flags, mode)
        }
    }
}

pub unsafe fn openat_entry(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    raw_mode: mode_t,
) -> c_int {
    let mode = if open_wants_mode(flags) { raw_mode } else { 0 };

    let Some(_guard) = SymbolGuard::enter(&IN_OPENAT) else {
        return linux_raw::raw_openat(dirfd, path, flags, mode);
    };

    let Some(path_str) = path_utf8(path) else {
        return linux_raw::raw_openat(dirfd, path, flags, mode);
    };

    shim_debug!(
        "intercepted openat({}, \"{}\", {:#x}, {:o})",
        dirfd,
        path_str,
        flags,
        mode
    );

    let request = Request::OpenAt {
        dirfd,
        path: path_str.to_owned(),
        flags,
        mode: mode as u32,
    };
    match rpc::exchange(&request) {
        Exchange::Reply(reply) => {
            linux_raw::set_errno(reply.err);
            reply.result as c_int
        }
        Exchange::TransportFailed => {
            shim_diag!("openat: rpc exchange failed");
            linux_raw::set_errno(libc::EIO);
            -1
        }
        Exchange::NoClient => {
            shim_diag!("no rpc connection, using direct syscall");
            linux_raw::raw_openat(dirfd, path, flags, mode)
        }
    }
}

/// Paths the codec cannot carry (null or non-UTF-8) stay local.
pub(crate) unsafe fn path_utf8<'a>(path: *const c_char) -> Option<&'a str> {
    if path.is_null() {
        return None;
    }
    CStr::from_ptr(path).to_str().ok()
}
