//! # fdrelay-proto
//!
//! Request/reply records and framing for the fdrelay syscall protocol.
//!
//! One request/reply pair exists per intercepted call. Every reply carries
//! the kernel result and the errno captured right after the syscall
//! returned, plus any out-of-band payload (read bytes, stat fields, an
//! updated flock). The codec lives in [`wire`]; transport selection in
//! [`transport`].

pub mod transport;
pub mod wire;

use std::io::{Cursor, Read, Write};

use wire::{Decodable, Encodable, WireError};

/// Fixed program identifier carried in every frame. Both sides check it;
/// a mismatch is a handshake failure.
pub const PROGRAM_ID: u32 = 0x2000_00FD;

/// Protocol version, also checked on every frame.
pub const PROTOCOL_VERSION: u8 = 1;

/// Frame magic: "FR".
pub const WIRE_MAGIC: [u8; 2] = *b"FR";

/// Capacity of the server's client→server descriptor table.
pub const MAX_FDS: usize = 1024;

/// Server-side cap on a single read/pread payload. Requests for more are
/// silently capped; the client copies at most `min(result, user_count)`.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Upper bound on a frame payload. Large enough for a full read payload
/// plus a worst-case path; anything bigger is a corrupt length field.
pub const MAX_FRAME_PAYLOAD: usize = MAX_BUFFER_SIZE + 4096;

/// True when `open`/`openat` take a mode argument. `O_CREAT | O_TMPFILE`
/// is the sole trigger for variadic mode extraction.
pub fn open_wants_mode(flags: i32) -> bool {
    flags & (libc::O_CREAT | libc::O_TMPFILE) != 0
}

// ============================================================================
// Frame header
// ============================================================================

/// Operation tags, one per intercepted call.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Open = 0,
    OpenAt = 1,
    Close = 2,
    Read = 3,
    PRead = 4,
    Write = 5,
    PWrite = 6,
    Stat = 7,
    FStat = 8,
    FStatAt = 9,
    Fcntl = 10,
    Fdatasync = 11,
}

impl TryFrom<u8> for Op {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, WireError> {
        Ok(match value {
            0 => Op::Open,
            1 => Op::OpenAt,
            2 => Op::Close,
            3 => Op::Read,
            4 => Op::PRead,
            5 => Op::Write,
            6 => Op::PWrite,
            7 => Op::Stat,
            8 => Op::FStat,
            9 => Op::FStatAt,
            10 => Op::Fcntl,
            11 => Op::Fdatasync,
            other => return Err(WireError::UnknownOpcode(other)),
        })
    }
}

/// Frame header (12 bytes, big-endian):
///
/// ```text
/// ┌──────────┬───────────┬──────────┬────────────┬────────────┐
/// │Magic (2B)│Version(1B)│Opcode(1B)│Program (4B)│ Length (4B)│
/// │  "FR"    │     1     │   Op     │ 0x200000FD │  payload   │
/// └──────────┴───────────┴──────────┴────────────┴────────────┘
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub opcode: Op,
    pub length: u32,
}

impl FrameHeader {
    pub const SIZE: usize = 12;

    pub fn new(opcode: Op, length: u32) -> Self {
        Self { opcode, length }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&WIRE_MAGIC);
        bytes[2] = PROTOCOL_VERSION;
        bytes[3] = self.opcode as u8;
        bytes[4..8].copy_from_slice(&PROGRAM_ID.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.length.to_be_bytes());
        bytes
    }

    /// Parse and validate a header. Magic, version, and program identity
    /// must all match this build; the length must be within bounds.
    pub fn parse(bytes: &[u8; Self::SIZE]) -> Result<Self, WireError> {
        let magic = [bytes[0], bytes[1]];
        if magic != WIRE_MAGIC {
            return Err(WireError::BadMagic(magic));
        }
        if bytes[2] != PROTOCOL_VERSION {
            return Err(WireError::Version {
                got: bytes[2],
                expected: PROTOCOL_VERSION,
            });
        }
        let program = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
        if program != PROGRAM_ID {
            return Err(WireError::Program {
                got: program,
                expected: PROGRAM_ID,
            });
        }
        let opcode = Op::try_from(bytes[3])?;
        let length = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
        if length as usize > MAX_FRAME_PAYLOAD {
            return Err(WireError::Oversized {
                what: "frame",
                len: length,
            });
        }
        Ok(Self { opcode, length })
    }
}

// ============================================================================
// Records
// ============================================================================

/// Flat stat payload. On error every field is zero; the caller only looks
/// at it when `result >= 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatRecord {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: i64,
    pub blksize: i64,
    pub blocks: i64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl Encodable for StatRecord {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), WireError> {
        self.dev.encode(w)?;
        self.ino.encode(w)?;
        self.mode.encode(w)?;
        self.nlink.encode(w)?;
        self.uid.encode(w)?;
        self.gid.encode(w)?;
        self.rdev.encode(w)?;
        self.size.encode(w)?;
        self.blksize.encode(w)?;
        self.blocks.encode(w)?;
        self.atime.encode(w)?;
        self.mtime.encode(w)?;
        self.ctime.encode(w)
    }
}

impl Decodable for StatRecord {
    fn decode<R: Read>(r: &mut R) -> Result<Self, WireError> {
        Ok(Self {
            dev: u64::decode(r)?,
            ino: u64::decode(r)?,
            mode: u32::decode(r)?,
            nlink: u64::decode(r)?,
            uid: u32::decode(r)?,
            gid: u32::decode(r)?,
            rdev: u64::decode(r)?,
            size: i64::decode(r)?,
            blksize: i64::decode(r)?,
            blocks: i64::decode(r)?,
            atime: i64::decode(r)?,
            mtime: i64::decode(r)?,
            ctime: i64::decode(r)?,
        })
    }
}

/// File-lock description carried by the fcntl lock commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlockRecord {
    pub l_type: i32,
    pub l_whence: i32,
    pub l_start: i64,
    pub l_len: i64,
    pub l_pid: i32,
}

impl Encodable for FlockRecord {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), WireError> {
        self.l_type.encode(w)?;
        self.l_whence.encode(w)?;
        self.l_start.encode(w)?;
        self.l_len.encode(w)?;
        self.l_pid.encode(w)
    }
}

impl Decodable for FlockRecord {
    fn decode<R: Read>(r: &mut R) -> Result<Self, WireError> {
        Ok(Self {
            l_type: i32::decode(r)?,
            l_whence: i32::decode(r)?,
            l_start: i64::decode(r)?,
            l_len: i64::decode(r)?,
            l_pid: i32::decode(r)?,
        })
    }
}

/// Which kind of third argument an fcntl command takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FcntlArgKind {
    None,
    Int,
    Flock,
}

impl FcntlArgKind {
    /// Classify an fcntl command. Unknown commands are treated as taking
    /// no argument.
    pub fn classify(cmd: i32) -> Self {
        match cmd {
            libc::F_GETFD | libc::F_GETFL | libc::F_GETOWN => FcntlArgKind::None,
            libc::F_DUPFD
            | libc::F_DUPFD_CLOEXEC
            | libc::F_SETFD
            | libc::F_SETFL
            | libc::F_SETOWN => FcntlArgKind::Int,
            libc::F_GETLK | libc::F_SETLK | libc::F_SETLKW => FcntlArgKind::Flock,
            _ => FcntlArgKind::None,
        }
    }
}

/// The fcntl argument as carried on the wire: an integer discriminator
/// followed by the case-specific body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FcntlArg {
    None,
    Int(i32),
    Flock(FlockRecord),
}

impl FcntlArg {
    pub fn kind(&self) -> FcntlArgKind {
        match self {
            FcntlArg::None => FcntlArgKind::None,
            FcntlArg::Int(_) => FcntlArgKind::Int,
            FcntlArg::Flock(_) => FcntlArgKind::Flock,
        }
    }
}

impl Encodable for FcntlArg {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), WireError> {
        match self {
            FcntlArg::None => 0u32.encode(w),
            FcntlArg::Int(v) => {
                1u32.encode(w)?;
                v.encode(w)
            }
            FcntlArg::Flock(fl) => {
                2u32.encode(w)?;
                fl.encode(w)
            }
        }
    }
}

impl Decodable for FcntlArg {
    fn decode<R: Read>(r: &mut R) -> Result<Self, WireError> {
        match u32::decode(r)? {
            0 => Ok(FcntlArg::None),
            1 => Ok(FcntlArg::Int(i32::decode(r)?)),
            2 => Ok(FcntlArg::Flock(FlockRecord::decode(r)?)),
            value => Err(WireError::UnknownTag {
                what: "fcntl argument",
                value,
            }),
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// One request record per intercepted call. File descriptors here are
/// client descriptors; the server translates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Open { path: String, flags: i32, mode: u32 },
    OpenAt { dirfd: i32, path: String, flags: i32, mode: u32 },
    Close { fd: i32 },
    Read { fd: i32, count: u32 },
    PRead { fd: i32, count: u32, offset: u64 },
    Write { fd: i32, data: Vec<u8> },
    PWrite { fd: i32, data: Vec<u8>, offset: u64 },
    Stat { path: String },
    FStat { fd: i32 },
    FStatAt { dirfd: i32, path: String, flags: i32 },
    Fcntl { fd: i32, cmd: i32, arg: FcntlArg },
    Fdatasync { fd: i32 },
}

impl Request {
    pub fn opcode(&self) -> Op {
        match self {
            Request::Open { .. } => Op::Open,
            Request::OpenAt { .. } => Op::OpenAt,
            Request::Close { .. } => Op::Close,
            Request::Read { .. } => Op::Read,
            Request::PRead { .. } => Op::PRead,
            Request::Write { .. } => Op::Write,
            Request::PWrite { .. } => Op::PWrite,
            Request::Stat { .. } => Op::Stat,
            Request::FStat { .. } => Op::FStat,
            Request::FStatAt { .. } => Op::FStatAt,
            Request::Fcntl { .. } => Op::Fcntl,
            Request::Fdatasync { .. } => Op::Fdatasync,
        }
    }

    fn encode_body<W: Write>(&self, w: &mut W) -> Result<(), WireError> {
        match self {
            Request::Open { path, flags, mode } => {
                path.encode(w)?;
                flags.encode(w)?;
                mode.encode(w)
            }
            Request::OpenAt {
                dirfd,
                path,
                flags,
                mode,
            } => {
                dirfd.encode(w)?;
                path.encode(w)?;
                flags.encode(w)?;
                mode.encode(w)
            }
            Request::Close { fd } => fd.encode(w),
            Request::Read { fd, count } => {
                fd.encode(w)?;
                count.encode(w)
            }
            Request::PRead { fd, count, offset } => {
                fd.encode(w)?;
                count.encode(w)?;
                offset.encode(w)
            }
            Request::Write { fd, data } => {
                fd.encode(w)?;
                data.encode(w)
            }
            Request::PWrite { fd, data, offset } => {
                fd.encode(w)?;
                data.encode(w)?;
                offset.encode(w)
            }
            Request::Stat { path } => path.encode(w),
            Request::FStat { fd } => fd.encode(w),
            Request::FStatAt { dirfd, path, flags } => {
                dirfd.encode(w)?;
                path.encode(w)?;
                flags.encode(w)
            }
            Request::Fcntl { fd, cmd, arg } => {
                fd.encode(w)?;
                cmd.encode(w)?;
                arg.encode(w)
            }
            Request::Fdatasync { fd } => fd.encode(w),
        }
    }

    fn decode_body<R: Read>(opcode: Op, r: &mut R) -> Result<Self, WireError> {
        Ok(match opcode {
            Op::Open => Request::Open {
                path: String::decode(r)?,
                flags: i32::decode(r)?,
                mode: u32::decode(r)?,
            },
            Op::OpenAt => Request::OpenAt {
                dirfd: i32::decode(r)?,
                path: String::decode(r)?,
                flags: i32::decode(r)?,
                mode: u32::decode(r)?,
            },
            Op::Close => Request::Close {
                fd: i32::decode(r)?,
            },
            Op::Read => Request::Read {
                fd: i32::decode(r)?,
                count: u32::decode(r)?,
            },
            Op::PRead => Request::PRead {
                fd: i32::decode(r)?,
                count: u32::decode(r)?,
                offset: u64::decode(r)?,
            },
            Op::Write => Request::Write {
                fd: i32::decode(r)?,
                data: Vec::<u8>::decode(r)?,
            },
            Op::PWrite => Request::PWrite {
                fd: i32::decode(r)?,
                data: Vec::<u8>::decode(r)?,
                offset: u64::decode(r)?,
            },
            Op::Stat => Request::Stat {
                path: String::decode(r)?,
            },
            Op::FStat => Request::FStat {
                fd: i32::decode(r)?,
            },
            Op::FStatAt => Request::FStatAt {
                dirfd: i32::decode(r)?,
                path: String::decode(r)?,
                flags: i32::decode(r)?,
            },
            Op::Fcntl => Request::Fcntl {
                fd: i32::decode(r)?,
                cmd: i32::decode(r)?,
                arg: FcntlArg::decode(r)?,
            },
            Op::Fdatasync => Request::Fdatasync {
                fd: i32::decode(r)?,
            },
        })
    }
}

// ============================================================================
// Replies
// ============================================================================

/// Out-of-band data attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReplyPayload {
    #[default]
    None,
    /// Bytes delivered by read/pread (length equals the result).
    Data(Vec<u8>),
    /// Stat fields for stat/fstat/fstatat.
    Stat(StatRecord),
    /// The flock written back by F_GETLK.
    Flock(FlockRecord),
}

impl Encodable for ReplyPayload {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), WireError> {
        match self {
            ReplyPayload::None => 0u32.encode(w),
            ReplyPayload::Data(data) => {
                1u32.encode(w)?;
                data.encode(w)
            }
            ReplyPayload::Stat(st) => {
                2u32.encode(w)?;
                st.encode(w)
            }
            ReplyPayload::Flock(fl) => {
                3u32.encode(w)?;
                fl.encode(w)
            }
        }
    }
}

impl Decodable for ReplyPayload {
    fn decode<R: Read>(r: &mut R) -> Result<Self, WireError> {
        match u32::decode(r)? {
            0 => Ok(ReplyPayload::None),
            1 => Ok(ReplyPayload::Data(Vec::<u8>::decode(r)?)),
            2 => Ok(ReplyPayload::Stat(StatRecord::decode(r)?)),
            3 => Ok(ReplyPayload::Flock(FlockRecord::decode(r)?)),
            value => Err(WireError::UnknownTag {
                what: "reply payload",
                value,
            }),
        }
    }
}

/// Every reply carries the kernel result, the errno captured immediately
/// after the syscall returned (zero when the result is non-negative), and
/// any out-of-band payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub result: i64,
    pub err: i32,
    pub payload: ReplyPayload,
}

impl Reply {
    /// A plain result/errno reply with no payload.
    pub fn new(result: i64, err: i32) -> Self {
        Self {
            result,
            err,
            payload: ReplyPayload::None,
        }
    }

    /// The conventional failure shape: result −1 plus the errno.
    pub fn error(err: i32) -> Self {
        Self::new(-1, err)
    }
}

impl Encodable for Reply {
    fn encode<W: Write>(&self, w: &mut W) -> Result<(), WireError> {
        self.result.encode(w)?;
        self.err.encode(w)?;
        self.payload.encode(w)
    }
}

impl Decodable for Reply {
    fn decode<R: Read>(r: &mut R) -> Result<Self, WireError> {
        Ok(Self {
            result: i64::decode(r)?,
            err: i32::decode(r)?,
            payload: ReplyPayload::decode(r)?,
        })
    }
}

// ============================================================================
// Framing
// ============================================================================

/// Blocking frame I/O over any `Read`/`Write` pair.
pub mod frame {
    use super::*;

    fn read_header<R: Read>(r: &mut R) -> Result<FrameHeader, WireError> {
        let mut buf = [0u8; FrameHeader::SIZE];
        r.read_exact(&mut buf)?;
        FrameHeader::parse(&buf)
    }

    fn read_payload<R: Read>(r: &mut R, header: &FrameHeader) -> Result<Vec<u8>, WireError> {
        let mut payload = vec![0u8; header.length as usize];
        r.read_exact(&mut payload)?;
        Ok(payload)
    }

    pub fn send_request<W: Write>(w: &mut W, request: &Request) -> Result<(), WireError> {
        let mut payload = Vec::new();
        request.encode_body(&mut payload)?;
        let header = FrameHeader::new(request.opcode(), payload.len() as u32);
        w.write_all(&header.to_bytes())?;
        w.write_all(&payload)?;
        Ok(w.flush()?)
    }

    pub fn read_request<R: Read>(r: &mut R) -> Result<Request, WireError> {
        let header = read_header(r)?;
        let payload = read_payload(r, &header)?;
        Request::decode_body(header.opcode, &mut Cursor::new(payload))
    }

    pub fn send_reply<W: Write>(w: &mut W, opcode: Op, reply: &Reply) -> Result<(), WireError> {
        let mut payload = Vec::new();
        reply.encode(&mut payload)?;
        let header = FrameHeader::new(opcode, payload.len() as u32);
        w.write_all(&header.to_bytes())?;
        w.write_all(&payload)?;
        Ok(w.flush()?)
    }

    /// Read a reply frame, verifying it answers the request we sent.
    pub fn read_reply<R: Read>(r: &mut R, expected: Op) -> Result<Reply, WireError> {
        let header = read_header(r)?;
        if header.opcode != expected {
            return Err(WireError::OpcodeMismatch {
                got: header.opcode,
                expected,
            });
        }
        let payload = read_payload(r, &header)?;
        Reply::decode(&mut Cursor::new(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_roundtrip() {
        let header = FrameHeader::new(Op::PRead, 1234);
        let bytes = header.to_bytes();
        let decoded = FrameHeader::parse(&bytes).unwrap();
        assert_eq!(decoded.opcode, Op::PRead);
        assert_eq!(decoded.length, 1234);
    }

    #[test]
    fn header_rejects_corruption() {
        let mut bytes = FrameHeader::new(Op::Open, 0).to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            FrameHeader::parse(&bytes),
            Err(WireError::BadMagic(_))
        ));

        let mut bytes = FrameHeader::new(Op::Open, 0).to_bytes();
        bytes[2] = PROTOCOL_VERSION + 1;
        assert!(matches!(
            FrameHeader::parse(&bytes),
            Err(WireError::Version { .. })
        ));

        let mut bytes = FrameHeader::new(Op::Open, 0).to_bytes();
        bytes[4] ^= 0xff;
        assert!(matches!(
            FrameHeader::parse(&bytes),
            Err(WireError::Program { .. })
        ));

        let mut bytes = FrameHeader::new(Op::Open, 0).to_bytes();
        bytes[3] = 200;
        assert!(matches!(
            FrameHeader::parse(&bytes),
            Err(WireError::UnknownOpcode(200))
        ));
    }

    #[test]
    fn header_rejects_oversized_length() {
        let bytes = FrameHeader::new(Op::Read, (MAX_FRAME_PAYLOAD + 1) as u32).to_bytes();
        assert!(matches!(
            FrameHeader::parse(&bytes),
            Err(WireError::Oversized { .. })
        ));
    }

    #[test]
    fn request_roundtrip() {
        let requests = [
            Request::Open {
                path: "/tmp/t.txt".into(),
                flags: libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC,
                mode: 0o644,
            },
            Request::PRead {
                fd: 7,
                count: 255,
                offset: 4096,
            },
            Request::Write {
                fd: 3,
                data: b"Hello from intercepted syscalls!".to_vec(),
            },
            Request::Fcntl {
                fd: 3,
                cmd: libc::F_SETLK,
                arg: FcntlArg::Flock(FlockRecord {
                    l_type: libc::F_WRLCK as i32,
                    l_whence: libc::SEEK_SET,
                    l_start: 0,
                    l_len: 100,
                    l_pid: 0,
                }),
            },
            Request::FStatAt {
                dirfd: libc::AT_FDCWD,
                path: "t.txt".into(),
                flags: libc::AT_SYMLINK_NOFOLLOW,
            },
        ];
        for request in requests {
            let mut buf = Vec::new();
            frame::send_request(&mut buf, &request).unwrap();
            let decoded = frame::read_request(&mut Cursor::new(&buf)).unwrap();
            assert_eq!(decoded, request);
        }
    }

    #[test]
    fn reply_roundtrip() {
        let reply = Reply {
            result: 56,
            err: 0,
            payload: ReplyPayload::Data(vec![0xaa; 56]),
        };
        let mut buf = Vec::new();
        frame::send_reply(&mut buf, Op::Read, &reply).unwrap();
        let decoded = frame::read_reply(&mut Cursor::new(&buf), Op::Read).unwrap();
        assert_eq!(decoded, reply);
    }

    #[test]
    fn reply_for_wrong_opcode_is_rejected() {
        let mut buf = Vec::new();
        frame::send_reply(&mut buf, Op::Read, &Reply::new(0, 0)).unwrap();
        assert!(matches!(
            frame::read_reply(&mut Cursor::new(&buf), Op::Write),
            Err(WireError::OpcodeMismatch { .. })
        ));
    }

    #[test]
    fn truncated_request_is_an_error() {
        let mut buf = Vec::new();
        frame::send_request(
            &mut buf,
            &Request::Stat {
                path: "/tmp/x".into(),
            },
        )
        .unwrap();
        buf.truncate(buf.len() - 3);
        assert!(frame::read_request(&mut Cursor::new(&buf)).is_err());
    }

    #[test]
    fn fcntl_classification() {
        assert_eq!(FcntlArgKind::classify(libc::F_GETFD), FcntlArgKind::None);
        assert_eq!(FcntlArgKind::classify(libc::F_GETFL), FcntlArgKind::None);
        assert_eq!(FcntlArgKind::classify(libc::F_GETOWN), FcntlArgKind::None);
        assert_eq!(FcntlArgKind::classify(libc::F_DUPFD), FcntlArgKind::Int);
        assert_eq!(
            FcntlArgKind::classify(libc::F_DUPFD_CLOEXEC),
            FcntlArgKind::Int
        );
        assert_eq!(FcntlArgKind::classify(libc::F_SETFD), FcntlArgKind::Int);
        assert_eq!(FcntlArgKind::classify(libc::F_SETFL), FcntlArgKind::Int);
        assert_eq!(FcntlArgKind::classify(libc::F_SETOWN), FcntlArgKind::Int);
        assert_eq!(FcntlArgKind::classify(libc::F_GETLK), FcntlArgKind::Flock);
        assert_eq!(FcntlArgKind::classify(libc::F_SETLK), FcntlArgKind::Flock);
        assert_eq!(FcntlArgKind::classify(libc::F_SETLKW), FcntlArgKind::Flock);
        // Unknown commands take no argument.
        assert_eq!(FcntlArgKind::classify(0x7fff), FcntlArgKind::None);
    }

    #[test]
    fn mode_extraction_trigger() {
        assert!(open_wants_mode(libc::O_CREAT));
        assert!(open_wants_mode(libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC));
        assert!(open_wants_mode(libc::O_TMPFILE | libc::O_RDWR));
        assert!(!open_wants_mode(libc::O_RDONLY));
        assert!(!open_wants_mode(libc::O_WRONLY | libc::O_APPEND));
    }
}
