//! Request dispatch.
//!
//! Every handler has the same shape: translate the client FD (if the call
//! carries one), execute the kernel call, capture errno, build the reply.
//! Replies own their payload bytes; the only reused storage is the read
//! scratch buffer, which is copied out before the next request is decoded.

use std::os::fd::{BorrowedFd, RawFd};
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{self, AtFlags, OFlag};
use nix::sys::stat::{self, Mode};
use nix::sys::uio;
use nix::unistd;
use tracing::{debug, warn};

use fdrelay_proto::{
    FcntlArg, FlockRecord, Reply, ReplyPayload, Request, StatRecord, MAX_BUFFER_SIZE,
};

use crate::fd_table::FdTable;

pub struct Dispatcher {
    table: FdTable,
    /// Scratch for read/pread, capping any single payload.
    scratch: Vec<u8>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            table: FdTable::new(),
            scratch: vec![0u8; MAX_BUFFER_SIZE],
        }
    }

    pub fn dispatch(&mut self, request: &Request) -> Reply {
        match request {
            Request::Open { path, flags, mode } => self.open(path, *flags, *mode),
            Request::OpenAt {
                dirfd,
                path,
                flags,
                mode,
            } => self.openat(*dirfd, path, *flags, *mode),
            Request::Close { fd } => self.close(*fd),
            Request::Read { fd, count } => self.read(*fd, *count),
            Request::PRead { fd, count, offset } => self.pread(*fd, *count, *offset),
            Request::Write { fd, data } => self.write(*fd, data),
            Request::PWrite { fd, data, offset } => self.pwrite(*fd, data, *offset),
            Request::Stat { path } => self.stat(path),
            Request::FStat { fd } => self.fstat(*fd),
            Request::FStatAt { dirfd, path, flags } => self.fstatat(*dirfd, path, *flags),
            Request::Fcntl { fd, cmd, arg } => self.fcntl(*fd, *cmd, arg),
            Request::Fdatasync { fd } => self.fdatasync(*fd),
        }
    }

    fn open(&mut self, path: &str, flags: i32, mode: u32) -> Reply {
        debug!(path, flags, mode, "open");
        match fcntl::open(
            Path::new(path),
            OFlag::from_bits_retain(flags),
            Mode::from_bits_truncate(mode),
        ) {
            Ok(server_fd) => self.map_new_fd(server_fd),
            Err(errno) => Reply::error(errno as i32),
        }
    }

    fn openat(&mut self, dirfd: i32, path: &str, flags: i32, mode: u32) -> Reply {
        debug!(dirfd, path, flags, mode, "openat");
        // dirfd is passed through untranslated; AT_FDCWD resolves against
        // the server's working directory, anything else is taken as a
        // server-side descriptor.
        match fcntl::openat(
            Some(dirfd),
            Path::new(path),
            OFlag::from_bits_retain(flags),
            Mode::from_bits_truncate(mode),
        ) {
            Ok(server_fd) => self.map_new_fd(server_fd),
            Err(errno) => Reply::error(errno as i32),
        }
    }

    fn close(&mut self, client_fd: i32) -> Reply {
        debug!(client_fd, "close");
        let Some(server_fd) = self.table.translate(client_fd) else {
            warn!(client_fd, "close on unmapped fd");
            return Reply::error(Errno::EBADF as i32);
        };
        match unistd::close(server_fd) {
            Ok(()) => {
                // Only a successful kernel close frees the slot.
                self.table.remove(client_fd);
                Reply::new(0, 0)
            }
            Err(errno) => Reply::error(errno as i32),
        }
    }

    fn read(&mut self, client_fd: i32, count: u32) -> Reply {
        debug!(client_fd, count, "read");
        let Some(server_fd) = self.table.translate(client_fd) else {
            warn!(client_fd, "read on unmapped fd");
            return Reply::error(Errno::EBADF as i32);
        };
        let count = (count as usize).min(MAX_BUFFER_SIZE);
        match unistd::read(server_fd, &mut self.scratch[..count]) {
            Ok(n) => Reply {
                result: n as i64,
                err: 0,
                payload: ReplyPayload::Data(self.scratch[..n].to_vec()),
            },
            Err(errno) => Reply::error(errno as i32),
        }
    }

    fn pread(&mut self, client_fd: i32, count: u32, offset: u64) -> Reply {
        debug!(client_fd, count, offset, "pread");
        let Some(server_fd) = self.table.translate(client_fd) else {
            warn!(client_fd, "pread on unmapped fd");
            return Reply::error(Errno::EBADF as i32);
        };
        let count = (count as usize).min(MAX_BUFFER_SIZE);
        let fd = unsafe { BorrowedFd::borrow_raw(server_fd) };
        match uio::pread(fd, &mut self.scratch[..count], offset as libc::off_t) {
            Ok(n) => Reply {
                result: n as i64,
                err: 0,
                payload: ReplyPayload::Data(self.scratch[..n].to_vec()),
            },
            Err(errno) => Reply::error(errno as i32),
        }
    }

    fn write(&mut self, client_fd: i32, data: &[u8]) -> Reply {
        debug!(client_fd, count = data.len(), "write");
        let Some(server_fd) = self.table.translate(client_fd) else {
            warn!(client_fd, "write on unmapped fd");
            return Reply::error(Errno::EBADF as i32);
        };
        let fd = unsafe { BorrowedFd::borrow_raw(server_fd) };
        match unistd::write(fd, data) {
            Ok(n) => Reply::new(n as i64, 0),
            Err(errno) => Reply::error(errno as i32),
        }
    }

    fn pwrite(&mut self, client_fd: i32, data: &[u8], offset: u64) -> Reply {
        debug!(client_fd, count = data.len(), offset, "pwrite");
        let Some(server_fd) = self.table.translate(client_fd) else {
            warn!(client_fd, "pwrite on unmapped fd");
            return Reply::error(Errno::EBADF as i32);
        };
        let fd = unsafe { BorrowedFd::borrow_raw(server_fd) };
        match uio::pwrite(fd, data, offset as libc::off_t) {
            Ok(n) => Reply::new(n as i64, 0),
            Err(errno) => Reply::error(errno as i32),
        }
    }

    fn stat(&mut self, path: &str) -> Reply {
        debug!(path, "stat");
        match stat::stat(Path::new(path)) {
            Ok(st) => stat_reply(&st),
            Err(errno) => Reply::error(errno as i32),
        }
    }

    fn fstat(&mut self, client_fd: i32) -> Reply {
        debug!(client_fd, "fstat");
        let Some(server_fd) = self.table.translate(client_fd) else {
            warn!(client_fd, "fstat on unmapped fd");
            return Reply::error(Errno::EBADF as i32);
        };
        match stat::fstat(server_fd) {
            Ok(st) => stat_reply(&st),
            Err(errno) => Reply::error(errno as i32),
        }
    }

    fn fstatat(&mut self, dirfd: i32, path: &str, flags: i32) -> Reply {
        debug!(dirfd, path, flags, "fstatat");
        let dirfd = match self.translate_dirfd(dirfd) {
            Ok(fd) => fd,
            Err(reply) => return reply,
        };
        match stat::fstatat(Some(dirfd), Path::new(path), AtFlags::from_bits_retain(flags)) {
            Ok(st) => stat_reply(&st),
            Err(errno) => Reply::error(errno as i32),
        }
    }

    fn fcntl(&mut self, client_fd: i32, cmd: i32, arg: &FcntlArg) -> Reply {
        debug!(client_fd, cmd, "fcntl");
        let Some(server_fd) = self.table.translate(client_fd) else {
            warn!(client_fd, "fcntl on unmapped fd");
            return Reply::error(Errno::EBADF as i32);
        };

        // The cmd arrives as wire data, so the dispatch over the argument
        // variant is done on the raw call rather than a typed wrapper.
        let mut flock_buf: libc::flock = unsafe { std::mem::zeroed() };
        let result = match arg {
            FcntlArg::None => unsafe { libc::fcntl(server_fd, cmd) },
            FcntlArg::Int(v) => unsafe { libc::fcntl(server_fd, cmd, *v) },
            FcntlArg::Flock(fl) => {
                flock_buf.l_type = fl.l_type as _;
                flock_buf.l_whence = fl.l_whence as _;
                flock_buf.l_start = fl.l_start as _;
                flock_buf.l_len = fl.l_len as _;
                flock_buf.l_pid = fl.l_pid as _;
                unsafe { libc::fcntl(server_fd, cmd, &mut flock_buf as *mut libc::flock) }
            }
        };
        let errno = Errno::last();

        if result < 0 {
            return Reply::error(errno as i32);
        }

        if cmd == libc::F_DUPFD || cmd == libc::F_DUPFD_CLOEXEC {
            // The kernel handed us a new server FD; hand the client a new
            // client FD at or above its requested minimum.
            let min_fd = match arg {
                FcntlArg::Int(v) => *v,
                _ => 0,
            };
            return match self.table.add_from(result, min_fd) {
                Some(client_fd) => Reply::new(client_fd as i64, 0),
                None => {
                    warn!(min_fd, "fd table full on F_DUPFD");
                    let _ = unistd::close(result);
                    Reply::error(Errno::ENFILE as i32)
                }
            };
        }

        let payload = if cmd == libc::F_GETLK && matches!(arg, FcntlArg::Flock(_)) {
            ReplyPayload::Flock(FlockRecord {
                l_type: flock_buf.l_type as i32,
                l_whence: flock_buf.l_whence as i32,
                l_start: flock_buf.l_start as i64,
                l_len: flock_buf.l_len as i64,
                l_pid: flock_buf.l_pid as i32,
            })
        } else {
            ReplyPayload::None
        };
        Reply {
            result: result as i64,
            err: 0,
            payload,
        }
    }

    fn fdatasync(&mut self, client_fd: i32) -> Reply {
        debug!(client_fd, "fdatasync");
        let Some(server_fd) = self.table.translate(client_fd) else {
            warn!(client_fd, "fdatasync on unmapped fd");
            return Reply::error(Errno::EBADF as i32);
        };
        match unistd::fdatasync(server_fd) {
            Ok(()) => Reply::new(0, 0),
            Err(errno) => Reply::error(errno as i32),
        }
    }

    /// Map a freshly opened server FD, converting table exhaustion to
    /// ENFILE and closing the orphan so nothing leaks.
    fn map_new_fd(&mut self, server_fd: RawFd) -> Reply {
        match self.table.add(server_fd) {
            Some(client_fd) => {
                debug!(client_fd, server_fd, "fd mapped");
                Reply::new(client_fd as i64, 0)
            }
            None => {
                warn!(server_fd, "fd table full");
                let _ = unistd::close(server_fd);
                Reply::error(Errno::ENFILE as i32)
            }
        }
    }

    /// dirfd translation for fstatat. AT_FDCWD passes through and means
    /// "relative to the server's working directory"; anything else must
    /// be a mapped client FD.
    fn translate_dirfd(&self, dirfd: i32) -> Result<RawFd, Reply> {
        if dirfd == libc::AT_FDCWD {
            return Ok(libc::AT_FDCWD);
        }
        self.table
            .translate(dirfd)
            .ok_or_else(|| Reply::error(Errno::EBADF as i32))
    }
}

fn stat_reply(st: &libc::stat) -> Reply {
    Reply {
        result: 0,
        err: 0,
        payload: ReplyPayload::Stat(StatRecord {
            dev: st.st_dev as u64,
            ino: st.st_ino as u64,
            mode: st.st_mode as u32,
            nlink: st.st_nlink as u64,
            uid: st.st_uid as u32,
            gid: st.st_gid as u32,
            rdev: st.st_rdev as u64,
            size: st.st_size as i64,
            blksize: st.st_blksize as i64,
            blocks: st.st_blocks as i64,
            atime: st.st_atime as i64,
            mtime: st.st_mtime as i64,
            ctime: st.st_ctime as i64,
        }),
    }
}
