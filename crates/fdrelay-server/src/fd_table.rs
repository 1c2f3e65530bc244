//! Client→server descriptor translation table.
//!
//! The target never sees a real kernel descriptor; it gets a client
//! descriptor allocated densely from 3 upward (0/1/2 are reserved so the
//! pretend numbers never collide with the target's stdio). Entry `i` holds
//! either −1 (free) or the server-side kernel descriptor it maps to.
//!
//! The dispatcher is the table's only writer; the server is
//! single-threaded with respect to client requests, so no locking.

use std::os::fd::RawFd;

use fdrelay_proto::MAX_FDS;

const FIRST_CLIENT_FD: usize = 3;

pub struct FdTable {
    map: [RawFd; MAX_FDS],
    next_client_fd: usize,
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FdTable {
    pub fn new() -> Self {
        Self {
            map: [-1; MAX_FDS],
            next_client_fd: FIRST_CLIENT_FD,
        }
    }

    /// Map a server descriptor to the next dense client descriptor.
    /// Returns None when the table is full; the caller converts that to
    /// ENFILE and must close the orphaned server descriptor.
    pub fn add(&mut self, server_fd: RawFd) -> Option<i32> {
        if self.next_client_fd >= MAX_FDS {
            return None;
        }
        let client_fd = self.next_client_fd;
        self.next_client_fd += 1;
        self.map[client_fd] = server_fd;
        Some(client_fd as i32)
    }

    /// Map a server descriptor to the first free client descriptor at or
    /// above `max(min_fd, next_client_fd)` (F_DUPFD / F_DUPFD_CLOEXEC).
    pub fn add_from(&mut self, server_fd: RawFd, min_fd: i32) -> Option<i32> {
        let start = (min_fd.max(0) as usize).max(self.next_client_fd);
        for client_fd in start..MAX_FDS {
            if self.map[client_fd] == -1 {
                self.map[client_fd] = server_fd;
                if client_fd >= self.next_client_fd {
                    self.next_client_fd = client_fd + 1;
                }
                return Some(client_fd as i32);
            }
        }
        None
    }

    /// Free a slot. Out-of-range values are ignored.
    pub fn remove(&mut self, client_fd: i32) {
        if let Ok(idx) = usize::try_from(client_fd) {
            if idx < MAX_FDS {
                self.map[idx] = -1;
            }
        }
    }

    /// Translate a client descriptor to its server descriptor. Unmapped or
    /// out-of-range values never reach the kernel.
    pub fn translate(&self, client_fd: i32) -> Option<RawFd> {
        let idx = usize::try_from(client_fd).ok()?;
        let fd = *self.map.get(idx)?;
        (fd != -1).then_some(fd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_densely_from_three() {
        let mut table = FdTable::new();
        assert_eq!(table.add(100), Some(3));
        assert_eq!(table.add(101), Some(4));
        assert_eq!(table.add(102), Some(5));
        assert_eq!(table.translate(4), Some(101));
    }

    #[test]
    fn cursor_does_not_reuse_closed_slots() {
        let mut table = FdTable::new();
        let a = table.add(100).unwrap();
        table.remove(a);
        assert_eq!(table.translate(a), None);
        // Dense cursor is monotone; the freed slot is only revisited by
        // add_from scans.
        assert_eq!(table.add(101), Some(4));
    }

    #[test]
    fn add_from_scans_from_max_of_min_and_cursor() {
        let mut table = FdTable::new();
        let a = table.add(100).unwrap();
        assert_eq!(a, 3);

        // min_fd above the cursor: honored.
        let b = table.add_from(200, 10).unwrap();
        assert_eq!(b, 10);
        assert_eq!(table.translate(10), Some(200));

        // min_fd below the cursor: the scan still starts at the cursor.
        let c = table.add_from(201, 0).unwrap();
        assert_eq!(c, 11);
    }

    #[test]
    fn add_from_skips_occupied_slots() {
        let mut table = FdTable::new();
        table.add(100).unwrap(); // 3
        table.add_from(200, 10).unwrap(); // 10
        table.add_from(201, 10).unwrap(); // 11
        assert_eq!(table.add_from(202, 10), Some(12));
    }

    #[test]
    fn table_full_returns_none() {
        let mut table = FdTable::new();
        for _ in 3..MAX_FDS {
            assert!(table.add(7).is_some());
        }
        assert_eq!(table.add(7), None);
        assert_eq!(table.add_from(7, 0), None);
    }

    #[test]
    fn translate_rejects_out_of_range() {
        let table = FdTable::new();
        assert_eq!(table.translate(-1), None);
        assert_eq!(table.translate(999), None);
        assert_eq!(table.translate(MAX_FDS as i32), None);
        assert_eq!(table.translate(i32::MAX), None);
    }
}
