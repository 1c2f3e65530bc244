//! # fdrelay-server
//!
//! Executes forwarded file syscalls on behalf of a single connected
//! client. The server owns the real kernel descriptors and hands the
//! client dense pretend descriptors through the translation table.

pub mod dispatch;
pub mod fd_table;
pub mod serve;
