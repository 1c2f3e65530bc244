//! Raw stderr diagnostics.
//!
//! Everything the shim prints goes through the raw write syscall, never
//! libc stdio, so logging cannot re-enter the interposed `write` symbol.
//! Formatting happens into a fixed stack buffer; no heap involved.

use std::sync::atomic::AtomicBool;

use libc::c_void;

/// Set at library load when `FDRELAY_DEBUG` is present in the environment.
pub static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

pub struct StackWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> StackWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.pos]).unwrap_or("")
    }
}

impl std::fmt::Write for StackWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buf.len() - self.pos;
        let to_copy = std::cmp::min(bytes.len(), remaining);
        self.buf[self.pos..self.pos + to_copy].copy_from_slice(&bytes[..to_copy]);
        self.pos += to_copy;
        Ok(())
    }
}

pub(crate) unsafe fn write_stderr(msg: &str) {
    crate::linux_raw::raw_write(2, msg.as_ptr() as *const c_void, msg.len());
}

/// One diagnostic line, always emitted.
#[macro_export]
macro_rules! shim_diag {
    ($($arg:tt)*) => {{
        use std::fmt::Write;
        let mut buf = [0u8; 256];
        let mut wrapper = $crate::log::StackWriter::new(&mut buf);
        let _ = write!(wrapper, "[fdrelay-shim] ");
        let _ = write!(wrapper, $($arg)*);
        let _ = writeln!(wrapper);
        let msg = wrapper.as_str();
        unsafe { $crate::log::write_stderr(msg) };
    }};
}

/// Verbose per-call trace, emitted only when `FDRELAY_DEBUG` is set.
#[macro_export]
macro_rules! shim_debug {
    ($($arg:tt)*) => {{
        if $crate::log::DEBUG_ENABLED.load(std::sync::atomic::Ordering::Relaxed) {
            $crate::shim_diag!($($arg)*);
        }
    }};
}
