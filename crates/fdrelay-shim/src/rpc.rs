//! Per-thread RPC handle and exchange.
//!
//! Each thread lazily creates one client endpoint on its first
//! non-reentrant call and keeps it for the life of the thread. Handle
//! creation runs with `in_rpc_init` and the RPC flag held so that any
//! interposed call made by socket setup falls through to the kernel. A
//! teardown hook poisons the handle state process-wide at library unload;
//! nothing is created or used after that.
//!
//! All stream I/O and the final close go through raw syscalls, never
//! through symbols this library exports.

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use libc::{c_int, c_void};

use fdrelay_proto::transport::{Transport, TCP_PORT, UNIX_SOCKET_PATH};
use fdrelay_proto::{frame, Reply, Request};

use crate::guards::{RpcFlagGuard, IN_RPC_INIT};
use crate::linux_raw;
use crate::shim_diag;

/// Set once by the teardown hook. No handle exists or is created after.
static SHUT_DOWN: AtomicBool = AtomicBool::new(false);

thread_local! {
    static CLIENT: RefCell<Option<RpcClient>> = const { RefCell::new(None) };
}

/// Outcome of one request/reply round trip.
pub enum Exchange {
    /// No handle could be obtained; the caller takes the direct kernel
    /// path and the kernel's own result/errno.
    NoClient,
    /// The round trip was attempted and failed mid-exchange; the caller
    /// reports EIO.
    TransportFailed,
    Reply(Reply),
}

struct RpcClient {
    fd: c_int,
}

impl RpcClient {
    fn call(&mut self, request: &Request) -> Result<Reply, fdrelay_proto::wire::WireError> {
        let mut io = RawFdIo(self.fd);
        frame::send_request(&mut io, request)?;
        frame::read_reply(&mut io, request.opcode())
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        unsafe { linux_raw::raw_close(self.fd) };
    }
}

/// `io::Read`/`io::Write` over a raw fd, backed by raw syscalls.
struct RawFdIo(c_int);

impl Read for RawFdIo {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { linux_raw::raw_read(self.0, buf.as_mut_ptr() as *mut c_void, buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}

impl Write for RawFdIo {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe { linux_raw::raw_write(self.0, buf.as_ptr() as *const c_void, buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run one exchange on this thread's handle, creating it first if needed.
pub fn exchange(request: &Request) -> Exchange {
    if SHUT_DOWN.load(Ordering::Acquire) {
        return Exchange::NoClient;
    }
    CLIENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = init_client();
        }
        let Some(client) = slot.as_mut() else {
            return Exchange::NoClient;
        };
        // Anything the codec or transport calls from here on bypasses the
        // shim entirely.
        let _flag = RpcFlagGuard::set();
        match client.call(request) {
            Ok(reply) => Exchange::Reply(reply),
            Err(_) => Exchange::TransportFailed,
        }
    })
}

/// Destroy the handle state. Called once from the library teardown hook.
pub fn teardown() {
    SHUT_DOWN.store(true, Ordering::Release);
    // Drop this thread's handle; other threads' handles go with their TLS.
    let _ = CLIENT.try_with(|slot| slot.borrow_mut().take());
}

fn init_client() -> Option<RpcClient> {
    // Prevent recursive initialization.
    if IN_RPC_INIT.with(|c| c.get()) {
        return None;
    }
    IN_RPC_INIT.with(|c| c.set(true));
    let _flag = RpcFlagGuard::set();

    let transport = Transport::from_env();
    let fd = unsafe {
        match transport {
            Transport::Unix => connect_unix(),
            Transport::Tcp => connect_tcp(),
        }
    };

    IN_RPC_INIT.with(|c| c.set(false));

    if fd < 0 {
        shim_diag!("failed to connect to server ({} transport)", transport.name());
        None
    } else {
        Some(RpcClient { fd })
    }
}

unsafe fn connect_unix() -> c_int {
    let fd = libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0);
    if fd < 0 {
        return -1;
    }
    // Keep the stream out of any child the target forks off.
    linux_raw::raw_fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC as libc::c_long);

    let mut addr: libc::sockaddr_un = mem::zeroed();
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;

    let path = UNIX_SOCKET_PATH.as_bytes();
    if path.len() >= addr.sun_path.len() {
        linux_raw::raw_close(fd);
        return -1;
    }
    ptr::copy_nonoverlapping(
        path.as_ptr(),
        addr.sun_path.as_mut_ptr() as *mut u8,
        path.len(),
    );

    let addr_len = mem::size_of::<libc::sockaddr_un>() as libc::socklen_t;
    if libc::connect(fd, &addr as *const _ as *const libc::sockaddr, addr_len) < 0 {
        linux_raw::raw_close(fd);
        return -1;
    }

    fd
}

unsafe fn connect_tcp() -> c_int {
    let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0);
    if fd < 0 {
        return -1;
    }
    linux_raw::raw_fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC as libc::c_long);

    let addr = libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: TCP_PORT.to_be(),
        sin_addr: libc::in_addr {
            s_addr: u32::from(std::net::Ipv4Addr::LOCALHOST).to_be(),
        },
        sin_zero: [0; 8],
    };

    let addr_len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    if libc::connect(fd, &addr as *const _ as *const libc::sockaddr, addr_len) < 0 {
        linux_raw::raw_close(fd);
        return -1;
    }

    fd
}
