//! read / pread / write / pwrite / close / fdatasync interposition.

use std::ptr;
use std::slice;

use libc::{c_int, c_void, off_t, size_t, ssize_t};

use fdrelay_proto::{Request, ReplyPayload, MAX_BUFFER_SIZE};

use crate::guards::{
    SymbolGuard, IN_CLOSE, IN_FDATASYNC, IN_PREAD, IN_PWRITE, IN_READ, IN_WRITE,
};
use crate::linux_raw;
use crate::rpc::{self, Exchange};
use crate::{shim_debug, shim_diag};

pub unsafe fn read_entry(fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t {
    let Some(_guard) = SymbolGuard::enter(&IN_READ) else {
        return linux_raw::raw_read(fd, buf, count);
    };

    shim_debug!("intercepted read({}, buf, {})", fd, count);

    let request = Request::Read {
        fd,
        count: count.min(u32::MAX as usize) as u32,
    };
    match rpc::exchange(&request) {
        Exchange::Reply(reply) => {
            linux_raw::set_errno(reply.err);
            if reply.result >= 0 {
                if let ReplyPayload::Data(data) = &reply.payload {
                    copy_out(buf, count, reply.result, data);
                }
            }
            reply.result as ssize_t
        }
        Exchange::TransportFailed => {
            shim_diag!("read: rpc exchange failed");
            linux_raw::set_errno(libc::EIO);
            -1
        }
        Exchange::NoClient => {
            shim_diag!("no rpc connection, using direct syscall");
            linux_raw::raw_read(fd, buf, count)
        }
    }
}

pub unsafe fn pread_entry(fd: c_int, buf: *mut c_void, count: size_t, offset: off_t) -> ssize_t {
    let Some(_guard) = SymbolGuard::enter(&IN_PREAD) else {
        return linux_raw::raw_pread64(fd, buf, count, offset);
    };

    shim_debug!("intercepted pread({}, buf, {}, {})", fd, count, offset);

    let request = Request::PRead {
        fd,
        count: count.min(u32::MAX as usize) as u32,
        offset: offset as u64,
    };
    match rpc::exchange(&request) {
        Exchange::Reply(reply) => {
            linux_raw::set_errno(reply.err);
            if reply.result >= 0 {
                if let ReplyPayload::Data(data) = &reply.payload {
                    copy_out(buf, count, reply.result, data);
                }
            }
            reply.result as ssize_t
        }
        Exchange::TransportFailed => {
            shim_diag!("pread: rpc exchange failed");
            linux_raw::set_errno(libc::EIO);
            -1
        }
        Exchange::NoClient => {
            shim_diag!("no rpc connection, using direct syscall");
            linux_raw::raw_pread64(fd, buf, count, offset)
        }
    }
}

pub unsafe fn write_entry(fd: c_int, buf: *const c_void, count: size_t) -> ssize_t {
    let Some(_guard) = SymbolGuard::enter(&IN_WRITE) else {
        return linux_raw::raw_write(fd, buf, count);
    };

    shim_debug!("intercepted write({}, buf, {})", fd, count);

    let request = Request::Write {
        fd,
        data: marshal_data(buf, count),
    };
    match rpc::exchange(&request) {
        Exchange::Reply(reply) => {
            linux_raw::set_errno(reply.err);
            reply.result as ssize_t
        }
        Exchange::TransportFailed => {
            shim_diag!("write: rpc exchange failed");
            linux_raw::set_errno(libc::EIO);
            -1
        }
        Exchange::NoClient => {
            shim_diag!("no rpc connection, using direct syscall");
            linux_raw::raw_write(fd, buf, count)
        }
    }
}

pub unsafe fn pwrite_entry(fd: c_int, buf: *const c_void, count: size_t, offset: off_t) -> ssize_t {
    let Some(_guard) = SymbolGuard::enter(&IN_PWRITE) else {
        return linux_raw::raw_pwrite64(fd, buf, count, offset);
    };

    shim_debug!("intercepted pwrite({}, buf, {}, {})", fd, count, offset);

    let request = Request::PWrite {
        fd,
        data: marshal_data(buf, count),
        offset: offset as u64,
    };
    match rpc::exchange(&request) {
        Exchange::Reply(reply) => {
            linux_raw::set_errno(reply.err);
            reply.result as ssize_t
        }
        Exchange::TransportFailed => {
            shim_diag!("pwrite: rpc exchange failed");
            linux_raw::set_errno(libc::EIO);
            -1
        }
        Exchange::NoClient => {
            shim_diag!("no rpc connection, using direct syscall");
            linux_raw::raw_pwrite64(fd, buf, count, offset)
        }
    }
}

pub unsafe fn close_entry(fd: c_int) -> c_int {
    let Some(_guard) = SymbolGuard::enter(&IN_CLOSE) else {
        return linux_raw::raw_close(fd);
    };

    shim_debug!("intercepted close({})", fd);

    let request = Request::Close { fd };
    match rpc::exchange(&request) {
        Exchange::Reply(reply) => {
            linux_raw::set_errno(reply.err);
            reply.result as c_int
        }
        Exchange::TransportFailed => {
            shim_diag!("close: rpc exchange failed");
            linux_raw::set_errno(libc::EIO);
            -1
        }
        Exchange::NoClient => {
            shim_diag!("no rpc connection, using direct syscall");
            linux_raw::raw_close(fd)
        }
    }
}

pub unsafe fn fdatasync_entry(fd: c_int) -> c_int {
    let Some(_guard) = SymbolGuard::enter(&IN_FDATASYNC) else {
        return linux_raw::raw_fdatasync(fd);
    };

    shim_debug!("intercepted fdatasync({})", fd);

    let request = Request::Fdatasync { fd };
    match rpc::exchange(&request) {
        Exchange::Reply(reply) => {
            linux_raw::set_errno(reply.err);
            reply.result as c_int
        }
        Exchange::TransportFailed => {
            shim_diag!("fdatasync: rpc exchange failed");
            linux_raw::set_errno(libc::EIO);
            -1
        }
        Exchange::NoClient => {
            shim_diag!("no rpc connection, using direct syscall");
            linux_raw::raw_fdatasync(fd)
        }
    }
}

/// Copy up to `min(result, user_count)` reply bytes into the user buffer.
/// Bytes not covered by the reply are left untouched.
unsafe fn copy_out(buf: *mut c_void, count: size_t, result: i64, data: &[u8]) {
    let n = (result as usize).min(count).min(data.len());
    ptr::copy_nonoverlapping(data.as_ptr(), buf as *mut u8, n);
}

/// Snapshot the caller's buffer for the wire. A single frame carries at
/// most MAX_BUFFER_SIZE bytes of write payload; larger writes come back
/// short and the caller resumes, as with any short write.
unsafe fn marshal_data(buf: *const c_void, count: size_t) -> Vec<u8> {
    let count = count.min(MAX_BUFFER_SIZE);
    slice::from_raw_parts(buf as *const u8, count).to_vec()
}
