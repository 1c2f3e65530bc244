//! Reentry discipline.
//!
//! Two layers keep the shim from recursing into itself:
//!
//! 1. One guard per interposed symbol. While a symbol is active on a
//!    thread, a second entry to the same symbol on that thread bypasses the
//!    shim and goes straight to the kernel.
//! 2. One RPC-in-progress flag. Held across the whole exchange (and across
//!    handle creation) so that any interposed call the transport or codec
//!    makes internally falls through to the kernel.
//!
//! Both are per-thread. The RPC flag in particular is per-thread on
//! purpose: its job is suppressing *nested* interception on the calling
//! thread, not serializing threads against each other.

use std::cell::Cell;
use std::thread::LocalKey;

thread_local! {
    pub static IN_OPEN: Cell<bool> = const { Cell::new(false) };
    pub static IN_OPENAT: Cell<bool> = const { Cell::new(false) };
    pub static IN_CLOSE: Cell<bool> = const { Cell::new(false) };
    pub static IN_READ: Cell<bool> = const { Cell::new(false) };
    pub static IN_PREAD: Cell<bool> = const { Cell::new(false) };
    pub static IN_WRITE: Cell<bool> = const { Cell::new(false) };
    pub static IN_PWRITE: Cell<bool> = const { Cell::new(false) };
    pub static IN_STAT: Cell<bool> = const { Cell::new(false) };
    pub static IN_FSTAT: Cell<bool> = const { Cell::new(false) };
    pub static IN_FSTATAT: Cell<bool> = const { Cell::new(false) };
    pub static IN_FCNTL: Cell<bool> = const { Cell::new(false) };
    pub static IN_FDATASYNC: Cell<bool> = const { Cell::new(false) };

    /// Set while an exchange is on the wire.
    static RPC_IN_PROGRESS: Cell<bool> = const { Cell::new(false) };
    /// Set while the RPC handle is being created.
    pub(crate) static IN_RPC_INIT: Cell<bool> = const { Cell::new(false) };
}

/// True when the calling thread is inside an RPC exchange or handle
/// creation; interposed symbols must take the direct kernel path.
pub fn rpc_in_progress() -> bool {
    RPC_IN_PROGRESS.with(Cell::get) || IN_RPC_INIT.with(Cell::get)
}

/// RAII guard for one interposed symbol.
pub struct SymbolGuard {
    slot: &'static LocalKey<Cell<bool>>,
}

impl SymbolGuard {
    /// Returns None when the symbol is already active on this thread or an
    /// RPC is in flight; the caller must then invoke the kernel directly.
    pub fn enter(slot: &'static LocalKey<Cell<bool>>) -> Option<Self> {
        if rpc_in_progress() || slot.with(Cell::get) {
            return None;
        }
        slot.with(|c| c.set(true));
        Some(SymbolGuard { slot })
    }
}

impl Drop for SymbolGuard {
    fn drop(&mut self) {
        self.slot.with(|c| c.set(false));
    }
}

/// RAII holder of the RPC-in-progress flag.
pub struct RpcFlagGuard;

impl RpcFlagGuard {
    pub fn set() -> Self {
        RPC_IN_PROGRESS.with(|c| c.set(true));
        RpcFlagGuard
    }
}

impl Drop for RpcFlagGuard {
    fn drop(&mut self) {
        RPC_IN_PROGRESS.with(|c| c.set(false));
    }
}
