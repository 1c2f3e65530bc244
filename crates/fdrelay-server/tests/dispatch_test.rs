//! Dispatcher tests against the real kernel, in a throwaway directory.

use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::Path;

use fdrelay_proto::{FcntlArg, FlockRecord, Reply, ReplyPayload, Request, MAX_BUFFER_SIZE};
use fdrelay_server::dispatch::Dispatcher;

const MSG: &[u8] = b"Hello from intercepted syscalls! This is a test message.";

fn open(d: &mut Dispatcher, path: &Path, flags: i32, mode: u32) -> Reply {
    d.dispatch(&Request::Open {
        path: path.to_str().unwrap().to_owned(),
        flags,
        mode,
    })
}

fn close(d: &mut Dispatcher, fd: i32) -> Reply {
    d.dispatch(&Request::Close { fd })
}

#[test]
fn write_read_roundtrip() {
    assert_eq!(MSG.len(), 56);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.txt");
    let mut d = Dispatcher::new();

    let reply = open(
        &mut d,
        &path,
        libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC,
        0o644,
    );
    assert_eq!(reply.err, 0);
    let fd = reply.result as i32;
    assert!(fd >= 3);

    let reply = d.dispatch(&Request::Write {
        fd,
        data: MSG.to_vec(),
    });
    assert_eq!(reply.result, MSG.len() as i64);
    assert_eq!(close(&mut d, fd).result, 0);

    let reply = open(&mut d, &path, libc::O_RDONLY, 0);
    let fd = reply.result as i32;
    assert!(fd >= 3);

    let reply = d.dispatch(&Request::Read { fd, count: 255 });
    assert_eq!(reply.result, MSG.len() as i64);
    assert_eq!(reply.err, 0);
    match &reply.payload {
        ReplyPayload::Data(data) => assert_eq!(data.as_slice(), MSG),
        other => panic!("expected data payload, got {other:?}"),
    }
    assert_eq!(close(&mut d, fd).result, 0);
}

#[test]
fn openat_with_at_fdcwd_opens_absolute_paths() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.txt");
    std::fs::write(&path, MSG).unwrap();

    let mut d = Dispatcher::new();
    let reply = d.dispatch(&Request::OpenAt {
        dirfd: libc::AT_FDCWD,
        path: path.to_str().unwrap().to_owned(),
        flags: libc::O_RDONLY,
        mode: 0,
    });
    assert_eq!(reply.err, 0);
    let fd = reply.result as i32;
    assert!(fd >= 3);

    let reply = d.dispatch(&Request::Read { fd, count: 255 });
    assert_eq!(reply.result, MSG.len() as i64);
    match &reply.payload {
        ReplyPayload::Data(data) => assert_eq!(data.as_slice(), MSG),
        other => panic!("expected data payload, got {other:?}"),
    }
}

#[test]
fn openat_dirfd_is_passed_through_untranslated() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("t.txt"), MSG).unwrap();

    // A descriptor the table has never seen. openat hands it to the
    // kernel as-is, so it resolves as a server-side descriptor.
    let dir_handle = File::open(dir.path()).unwrap();
    let server_dirfd = dir_handle.as_raw_fd();

    let mut d = Dispatcher::new();
    let reply = d.dispatch(&Request::OpenAt {
        dirfd: server_dirfd,
        path: "t.txt".into(),
        flags: libc::O_RDONLY,
        mode: 0,
    });
    assert_eq!(reply.err, 0);
    let fd = reply.result as i32;
    assert!(fd >= 3);

    let reply = d.dispatch(&Request::FStat { fd });
    assert_eq!(reply.result, 0);
    match &reply.payload {
        ReplyPayload::Stat(st) => assert_eq!(st.size, MSG.len() as i64),
        other => panic!("expected stat payload, got {other:?}"),
    }
}

#[test]
fn openat_bad_dirfd_is_kernel_ebadf() {
    let mut d = Dispatcher::new();
    let reply = d.dispatch(&Request::OpenAt {
        dirfd: 987_654,
        path: "t.txt".into(),
        flags: libc::O_RDONLY,
        mode: 0,
    });
    assert_eq!(reply.result, -1);
    assert_eq!(reply.err, libc::EBADF);
}

#[test]
fn pwrite_pread_at_offset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.txt");
    let mut d = Dispatcher::new();

    let fd = open(&mut d, &path, libc::O_CREAT | libc::O_RDWR, 0o644).result as i32;
    let reply = d.dispatch(&Request::PWrite {
        fd,
        data: b"abcdef".to_vec(),
        offset: 3,
    });
    assert_eq!(reply.result, 6);

    let reply = d.dispatch(&Request::PRead {
        fd,
        count: 4,
        offset: 5,
    });
    assert_eq!(reply.result, 4);
    match &reply.payload {
        ReplyPayload::Data(data) => assert_eq!(data.as_slice(), b"cdef"),
        other => panic!("expected data payload, got {other:?}"),
    }
}

#[test]
fn stat_reports_size_and_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.txt");
    std::fs::write(&path, MSG).unwrap();

    let mut d = Dispatcher::new();
    let reply = d.dispatch(&Request::Stat {
        path: path.to_str().unwrap().to_owned(),
    });
    assert_eq!(reply.result, 0);
    assert_eq!(reply.err, 0);
    match &reply.payload {
        ReplyPayload::Stat(st) => {
            assert_eq!(st.size, MSG.len() as i64);
            assert_eq!(st.mode & libc::S_IFMT, libc::S_IFREG);
            assert!(st.nlink >= 1);
        }
        other => panic!("expected stat payload, got {other:?}"),
    }
}

#[test]
fn stat_missing_path_is_enoent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nonexistent_abcdef");

    let mut d = Dispatcher::new();
    let reply = d.dispatch(&Request::Stat {
        path: path.to_str().unwrap().to_owned(),
    });
    assert_eq!(reply.result, -1);
    assert_eq!(reply.err, libc::ENOENT);
    assert_eq!(reply.payload, ReplyPayload::None);
}

#[test]
fn fstat_matches_file_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.txt");
    std::fs::write(&path, MSG).unwrap();

    let mut d = Dispatcher::new();
    let fd = open(&mut d, &path, libc::O_RDONLY, 0).result as i32;
    let reply = d.dispatch(&Request::FStat { fd });
    assert_eq!(reply.result, 0);
    match &reply.payload {
        ReplyPayload::Stat(st) => assert_eq!(st.size, MSG.len() as i64),
        other => panic!("expected stat payload, got {other:?}"),
    }
}

#[test]
fn fstatat_translates_dirfd() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("t.txt"), MSG).unwrap();

    let mut d = Dispatcher::new();
    let dirfd = open(&mut d, dir.path(), libc::O_RDONLY | libc::O_DIRECTORY, 0).result as i32;
    assert!(dirfd >= 3);

    let reply = d.dispatch(&Request::FStatAt {
        dirfd,
        path: "t.txt".into(),
        flags: 0,
    });
    assert_eq!(reply.result, 0);
    match &reply.payload {
        ReplyPayload::Stat(st) => assert_eq!(st.size, MSG.len() as i64),
        other => panic!("expected stat payload, got {other:?}"),
    }
}

#[test]
fn fstatat_unmapped_dirfd_is_ebadf() {
    let mut d = Dispatcher::new();
    let reply = d.dispatch(&Request::FStatAt {
        dirfd: 42,
        path: "t.txt".into(),
        flags: 0,
    });
    assert_eq!(reply.result, -1);
    assert_eq!(reply.err, libc::EBADF);
}

#[test]
fn fcntl_unmapped_fd_is_ebadf() {
    let mut d = Dispatcher::new();
    let reply = d.dispatch(&Request::Fcntl {
        fd: 999,
        cmd: libc::F_GETFD,
        arg: FcntlArg::None,
    });
    assert_eq!(reply.result, -1);
    assert_eq!(reply.err, libc::EBADF);
}

#[test]
fn dupfd_allocates_at_or_above_minimum() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.txt");
    std::fs::write(&path, MSG).unwrap();

    let mut d = Dispatcher::new();
    let a = open(&mut d, &path, libc::O_RDONLY, 0).result as i32;

    let reply = d.dispatch(&Request::Fcntl {
        fd: a,
        cmd: libc::F_DUPFD,
        arg: FcntlArg::Int(10),
    });
    let b = reply.result as i32;
    assert!(b >= 10, "F_DUPFD returned {b}");

    // The duplicate maps the same open file description.
    let reply = d.dispatch(&Request::PRead {
        fd: b,
        count: 5,
        offset: 0,
    });
    assert_eq!(reply.result, 5);

    // Closing the duplicate leaves the source usable.
    assert_eq!(close(&mut d, b).result, 0);
    let reply = d.dispatch(&Request::FStat { fd: a });
    assert_eq!(reply.result, 0);
}

#[test]
fn getlk_reports_unlocked_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.txt");
    std::fs::write(&path, MSG).unwrap();

    let mut d = Dispatcher::new();
    let fd = open(&mut d, &path, libc::O_RDWR, 0).result as i32;

    let reply = d.dispatch(&Request::Fcntl {
        fd,
        cmd: libc::F_GETLK,
        arg: FcntlArg::Flock(FlockRecord {
            l_type: libc::F_WRLCK as i32,
            l_whence: libc::SEEK_SET,
            l_start: 0,
            l_len: 0,
            l_pid: 0,
        }),
    });
    assert_eq!(reply.result, 0);
    match &reply.payload {
        ReplyPayload::Flock(fl) => assert_eq!(fl.l_type, libc::F_UNLCK as i32),
        other => panic!("expected flock payload, got {other:?}"),
    }
}

#[test]
fn setlk_then_getlk_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.txt");
    std::fs::write(&path, MSG).unwrap();

    let mut d = Dispatcher::new();
    let fd = open(&mut d, &path, libc::O_RDWR, 0).result as i32;

    let reply = d.dispatch(&Request::Fcntl {
        fd,
        cmd: libc::F_SETLK,
        arg: FcntlArg::Flock(FlockRecord {
            l_type: libc::F_WRLCK as i32,
            l_whence: libc::SEEK_SET,
            l_start: 0,
            l_len: 10,
            l_pid: 0,
        }),
    });
    // Locks held by the same process do not conflict; the set succeeds.
    assert_eq!(reply.result, 0);
}

#[test]
fn read_is_capped_at_max_buffer_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.bin");
    std::fs::write(&path, vec![0x5a; MAX_BUFFER_SIZE + 2000]).unwrap();

    let mut d = Dispatcher::new();
    let fd = open(&mut d, &path, libc::O_RDONLY, 0).result as i32;
    let reply = d.dispatch(&Request::Read {
        fd,
        count: (MAX_BUFFER_SIZE * 2) as u32,
    });
    assert_eq!(reply.result, MAX_BUFFER_SIZE as i64);
    match &reply.payload {
        ReplyPayload::Data(data) => assert_eq!(data.len(), MAX_BUFFER_SIZE),
        other => panic!("expected data payload, got {other:?}"),
    }
}

#[test]
fn read_unmapped_fd_is_ebadf() {
    let mut d = Dispatcher::new();
    let reply = d.dispatch(&Request::Read { fd: 3, count: 16 });
    assert_eq!(reply.result, -1);
    assert_eq!(reply.err, libc::EBADF);
}

#[test]
fn open_failure_allocates_no_slot() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing");
    let mut d = Dispatcher::new();

    let reply = open(&mut d, &missing, libc::O_RDONLY, 0);
    assert_eq!(reply.result, -1);
    assert_eq!(reply.err, libc::ENOENT);

    // The first successful open still gets the first client descriptor.
    let reply = open(&mut d, Path::new("/dev/null"), libc::O_RDONLY, 0);
    assert_eq!(reply.result, 3);
}

#[test]
fn close_frees_the_slot() {
    let mut d = Dispatcher::new();
    let fd = open(&mut d, Path::new("/dev/null"), libc::O_RDONLY, 0).result as i32;
    assert_eq!(close(&mut d, fd).result, 0);

    let reply = d.dispatch(&Request::FStat { fd });
    assert_eq!(reply.result, -1);
    assert_eq!(reply.err, libc::EBADF);

    // Closing again is EBADF at the translator.
    let reply = close(&mut d, fd);
    assert_eq!(reply.result, -1);
    assert_eq!(reply.err, libc::EBADF);
}
