//! # fdrelay-shim
//!
//! `LD_PRELOAD` shim that forwards a target process's file syscalls to the
//! fdrelay server and restores the kernel result and errno in the calling
//! thread. The exported symbols shadow the C library definitions; every
//! call the shim makes on its own behalf goes through raw syscalls so the
//! interposed symbols are never re-entered.
//!
//! Linux only. The transport is chosen by `RPC_TRANSPORT` (see
//! `fdrelay-proto`); verbose tracing is enabled by `FDRELAY_DEBUG`.

#![allow(clippy::missing_safety_doc)]

pub mod guards;
pub mod linux_raw;
pub mod log;
pub mod rpc;
pub mod syscalls;

use std::sync::atomic::Ordering;

use libc::{c_char, c_int, c_long, c_void, mode_t, off_t, size_t, ssize_t};

// ============================================================================
// Interposed symbol exports
// ============================================================================
//
// LD_PRELOAD works by symbol interposition: these definitions shadow the
// libc functions of the same name. The trailing mode argument of open and
// openat sits in the variadic slot; the implementations only read it when
// the flags say a mode was passed.

#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    syscalls::open::open_entry(path, flags, mode)
}

#[no_mangle]
pub unsafe extern "C" fn open64(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    syscalls::open::open_entry(path, flags | libc::O_LARGEFILE, mode)
}

#[no_mangle]
pub unsafe extern "C" fn openat(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    mode: mode_t,
) -> c_int {
    syscalls::open::openat_entry(dirfd, path, flags, mode)
}

#[no_mangle]
pub unsafe extern "C" fn close(fd: c_int) -> c_int {
    syscalls::io::close_entry(fd)
}

#[no_mangle]
pub unsafe extern "C" fn read(fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t {
    syscalls::io::read_entry(fd, buf, count)
}

#[no_mangle]
pub unsafe extern "C" fn pread(fd: c_int, buf: *mut c_void, count: size_t, offset: off_t) -> ssize_t {
    syscalls::io::pread_entry(fd, buf, count, offset)
}

#[no_mangle]
pub unsafe extern "C" fn pread64(
    fd: c_int,
    buf: *mut c_void,
    count: size_t,
    offset: off_t,
) -> ssize_t {
    syscalls::io::pread_entry(fd, buf, count, offset)
}

#[no_mangle]
pub unsafe extern "C" fn write(fd: c_int, buf: *const c_void, count: size_t) -> ssize_t {
    syscalls::io::write_entry(fd, buf, count)
}

#[no_mangle]
pub unsafe extern "C" fn pwrite(
    fd: c_int,
    buf: *const c_void,
    count: size_t,
    offset: off_t,
) -> ssize_t {
    syscalls::io::pwrite_entry(fd, buf, count, offset)
}

#[no_mangle]
pub unsafe extern "C" fn stat(path: *const c_char, statbuf: *mut libc::stat) -> c_int {
    syscalls::stat::stat_entry(path, statbuf)
}

#[no_mangle]
pub unsafe extern "C" fn fstat(fd: c_int, statbuf: *mut libc::stat) -> c_int {
    syscalls::stat::fstat_entry(fd, statbuf)
}

#[no_mangle]
pub unsafe extern "C" fn fstatat(
    dirfd: c_int,
    path: *const c_char,
    statbuf: *mut libc::stat,
    flags: c_int,
) -> c_int {
    syscalls::stat::fstatat_entry(dirfd, path, statbuf, flags)
}

#[no_mangle]
pub unsafe extern "C" fn newfstatat(
    dirfd: c_int,
    path: *const c_char,
    statbuf: *mut libc::stat,
    flags: c_int,
) -> c_int {
    syscalls::stat::fstatat_entry(dirfd, path, statbuf, flags)
}

#[no_mangle]
pub unsafe extern "C" fn fcntl(fd: c_int, cmd: c_int, arg: c_long) -> c_int {
    syscalls::fcntl::fcntl_entry(fd, cmd, arg)
}

#[no_mangle]
pub unsafe extern "C" fn fdatasync(fd: c_int) -> c_int {
    syscalls::io::fdatasync_entry(fd)
}

// ============================================================================
// Load / unload hooks
// ============================================================================

#[used]
#[link_section = ".init_array"]
static INIT: unsafe extern "C" fn() = {
    unsafe extern "C" fn init() {
        if !libc::getenv(c"FDRELAY_DEBUG".as_ptr()).is_null() {
            log::DEBUG_ENABLED.store(true, Ordering::Relaxed);
        }
    }
    init
};

#[used]
#[link_section = ".fini_array"]
static TEARDOWN: unsafe extern "C" fn() = {
    unsafe extern "C" fn teardown() {
        rpc::teardown();
    }
    teardown
};
