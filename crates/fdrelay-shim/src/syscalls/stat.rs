//! stat / fstat / newfstatat interposition.

use libc::{c_char, c_int, stat as libc_stat};

use fdrelay_proto::{Request, ReplyPayload, StatRecord};

use crate::guards::{SymbolGuard, IN_FSTAT, IN_FSTATAT, IN_STAT};
use crate::linux_raw;
use crate::rpc::{self, Exchange};
use crate::syscalls::open::path_utf8;
use crate::{shim_debug, shim_diag};

pub unsafe fn stat_entry(path: *const c_char, statbuf: *mut libc_stat) -> c_int {
    let Some(_guard) = SymbolGuard::enter(&IN_STAT) else {
        return linux_raw::raw_stat(path, statbuf);
    };

    let Some(path_str) = path_utf8(path) else {
        return linux_raw::raw_stat(path, statbuf);
    };

    shim_debug!("intercepted stat(\"{}\")", path_str);

    let request = Request::Stat {
        path: path_str.to_owned(),
    };
    finish_stat(request, statbuf, || unsafe {
        linux_raw::raw_stat(path, statbuf)
    })
}

pub unsafe fn fstat_entry(fd: c_int, statbuf: *mut libc_stat) -> c_int {
    let Some(_guard) = SymbolGuard::enter(&IN_FSTAT) else {
        return linux_raw::raw_fstat(fd, statbuf);
    };

    shim_debug!("intercepted fstat({})", fd);

    let request = Request::FStat { fd };
    finish_stat(request, statbuf, || unsafe {
        linux_raw::raw_fstat(fd, statbuf)
    })
}

pub unsafe fn fstatat_entry(
    dirfd: c_int,
    path: *const c_char,
    statbuf: *mut libc_stat,
    flags: c_int,
) -> c_int {
    let Some(_guard) = SymbolGuard::enter(&IN_FSTATAT) else {
        return linux_raw::raw_fstatat(dirfd, path, statbuf, flags);
    };

    let Some(path_str) = path_utf8(path) else {
        return linux_raw::raw_fstatat(dirfd, path, statbuf, flags);
    };

    shim_debug!(
        "intercepted newfstatat({}, \"{}\", {:#x})",
        dirfd,
        path_str,
        flags
    );

    let request = Request::FStatAt {
        dirfd,
        path: path_str.to_owned(),
        flags,
    };
    finish_stat(request, statbuf, || unsafe {
        linux_raw::raw_fstatat(dirfd, path, statbuf, flags)
    })
}

unsafe fn finish_stat(
    request: Request,
    statbuf: *mut libc_stat,
    fallback: impl FnOnce() -> c_int,
) -> c_int {
    match rpc::exchange(&request) {
        Exchange::Reply(reply) => {
            linux_raw::set_errno(reply.err);
            if reply.result >= 0 {
                if let ReplyPayload::Stat(st) = &reply.payload {
                    fill_stat(statbuf, st);
                }
            }
            reply.result as c_int
        }
        Exchange::TransportFailed => {
            shim_diag!("stat: rpc exchange failed");
            linux_raw::set_errno(libc::EIO);
            -1
        }
        Exchange::NoClient => {
            shim_diag!("no rpc connection, using direct syscall");
            fallback()
        }
    }
}

/// Zero the caller's buffer, then write every scalar field from the reply.
unsafe fn fill_stat(buf: *mut libc_stat, st: &StatRecord) {
    if buf.is_null() {
        return;
    }
    std::ptr::write_bytes(buf, 0, 1);
    let out = &mut *buf;
    out.st_dev = st.dev as _;
    out.st_ino = st.ino as _;
    out.st_mode = st.mode as _;
    out.st_nlink = st.nlink as _;
    out.st_uid = st.uid as _;
    out.st_gid = st.gid as _;
    out.st_rdev = st.rdev as _;
    out.st_size = st.size as _;
    out.st_blksize = st.blksize as _;
    out.st_blocks = st.blocks as _;
    out.st_atime = st.atime as _;
    out.st_mtime = st.mtime as _;
    out.st_ctime = st.ctime as _;
}
