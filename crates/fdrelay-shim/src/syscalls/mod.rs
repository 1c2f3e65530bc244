//! Interposed call implementations, one module per family.

pub mod fcntl;
pub mod io;
pub mod open;
pub mod stat;
