//! fcntl interposition.
//!
//! The third argument is classified by command before anything else, so
//! the raw fallback forwards exactly what the caller passed and the RPC
//! path marshals the right variant.

use libc::{c_int, c_long};

use fdrelay_proto::{FcntlArg, FcntlArgKind, FlockRecord, Request, ReplyPayload};

use crate::guards::{SymbolGuard, IN_FCNTL};
use crate::linux_raw;
use crate::rpc::{self, Exchange};
use crate::{shim_debug, shim_diag};

pub unsafe fn fcntl_entry(fd: c_int, cmd: c_int, arg: c_long) -> c_int {
    let kind = FcntlArgKind::classify(cmd);
    let int_arg = arg as c_int;
    let flock_ptr = arg as *mut libc::flock;

    let Some(_guard) = SymbolGuard::enter(&IN_FCNTL) else {
        return linux_raw::raw_fcntl(fd, cmd, arg);
    };

    shim_debug!("intercepted fcntl({}, {})", fd, cmd);

    if cmd == libc::F_SETLKW {
        shim_diag!("warning: F_SETLKW may block and stall the rpc exchange");
    }

    let wire_arg = match kind {
        FcntlArgKind::None => FcntlArg::None,
        FcntlArgKind::Int => FcntlArg::Int(int_arg),
        FcntlArgKind::Flock => {
            if flock_ptr.is_null() {
                FcntlArg::Flock(FlockRecord::default())
            } else {
                let fl = &*flock_ptr;
                FcntlArg::Flock(FlockRecord {
                    l_type: fl.l_type as i32,
                    l_whence: fl.l_whence as i32,
                    l_start: fl.l_start as i64,
                    l_len: fl.l_len as i64,
                    l_pid: fl.l_pid as i32,
                })
            }
        }
    };

    let request = Request::Fcntl {
        fd,
        cmd,
        arg: wire_arg,
    };
    match rpc::exchange(&request) {
        Exchange::Reply(reply) => {
            linux_raw::set_errno(reply.err);
            if cmd == libc::F_GETLK && reply.result >= 0 && !flock_ptr.is_null() {
                if let ReplyPayload::Flock(fl) = &reply.payload {
                    let out = &mut *flock_ptr;
                    out.l_type = fl.l_type as _;
                    out.l_whence = fl.l_whence as _;
                    out.l_start = fl.l_start as _;
                    out.l_len = fl.l_len as _;
                    out.l_pid = fl.l_pid as _;
                }
            }
            reply.result as c_int
        }
        Exchange::TransportFailed => {
            shim_diag!("fcntl: rpc exchange failed");
            linux_raw::set_errno(libc::EIO);
            -1
        }
        Exchange::NoClient => {
            shim_diag!("no rpc connection, using direct syscall");
            linux_raw::raw_fcntl(fd, cmd, arg)
        }
    }
}
