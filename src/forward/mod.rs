//! Correlating forwarded queries with upstream replies.
//!
//! When a query has no local answer its raw bytes are relayed to the
//! upstream resolver and the client's address is parked here, keyed
//! by the query's transaction ID.  When the upstream answers, the
//! oldest entry with a matching ID names the client to relay the
//! reply to.
//!
//! The source of truth for "oldest" is append order: entries join at
//! the back, so the front of the queue is always the next to expire.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// How long a forwarded query may wait for its upstream reply.  A
/// reply arriving later than this finds no entry and is dropped; the
/// client will have retried by then anyway.
pub const ENTRY_LIFETIME: Duration = Duration::from_secs(10);

/// How many queries may be in flight at once.  Registering into a
/// full table drops the oldest entry.
pub const TABLE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Eq, PartialEq)]
struct Entry {
    id: u16,
    client: SocketAddr,
    expires_at: Instant,
}

/// The in-flight forwarded queries, oldest first.
#[derive(Debug, Clone)]
pub struct ForwardTable {
    entries: VecDeque<Entry>,
    capacity: usize,
    lifetime: Duration,
}

impl ForwardTable {
    pub fn new() -> Self {
        Self::with_limits(TABLE_CAPACITY, ENTRY_LIFETIME)
    }

    pub fn with_limits(capacity: usize, lifetime: Duration) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            lifetime,
        }
    }

    /// Park a client's address until the upstream reply with the same
    /// ID arrives.  Duplicate IDs are fine: two clients may happen to
    /// pick the same one, and their entries form a FIFO queue.
    pub fn register(&mut self, id: u16, client: SocketAddr) {
        self.register_at(Instant::now(), id, client);
    }

    /// Remove and return the oldest entry with the given ID.
    pub fn take_matching(&mut self, id: u16) -> Option<SocketAddr> {
        self.take_matching_at(Instant::now(), id)
    }

    /// Drop entries whose reply never came.  Called from the event
    /// loop's once-a-second tick.
    pub fn expire_stale(&mut self) {
        self.expire_stale_at(Instant::now());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn register_at(&mut self, now: Instant, id: u16, client: SocketAddr) {
        self.expire_stale_at(now);

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(Entry {
            id,
            client,
            expires_at: now + self.lifetime,
        });
    }

    fn take_matching_at(&mut self, now: Instant, id: u16) -> Option<SocketAddr> {
        self.expire_stale_at(now);

        let index = self.entries.iter().position(|entry| entry.id == id)?;
        self.entries.remove(index).map(|entry| entry.client)
    }

    fn expire_stale_at(&mut self, now: Instant) {
        while self
            .entries
            .front()
            .map_or(false, |entry| entry.expires_at <= now)
        {
            self.entries.pop_front();
        }
    }
}

impl Default for ForwardTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(host: u8, port: u16) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, host], port))
    }

    #[test]
    fn register_then_take() {
        let mut table = ForwardTable::new();
        table.register(0x00aa, addr(5, 5353));

        assert_eq!(Some(addr(5, 5353)), table.take_matching(0x00aa));
        assert!(table.is_empty());
    }

    #[test]
    fn take_without_register() {
        let mut table = ForwardTable::new();

        assert_eq!(None, table.take_matching(0x00aa));
    }

    #[test]
    fn take_consumes_the_entry() {
        let mut table = ForwardTable::new();
        table.register(0x00aa, addr(5, 5353));

        assert_eq!(Some(addr(5, 5353)), table.take_matching(0x00aa));
        assert_eq!(None, table.take_matching(0x00aa));
    }

    #[test]
    fn duplicate_ids_are_fifo() {
        let mut table = ForwardTable::new();
        table.register(0x00aa, addr(1, 1111));
        table.register(0x00aa, addr(2, 2222));

        assert_eq!(Some(addr(1, 1111)), table.take_matching(0x00aa));
        assert_eq!(Some(addr(2, 2222)), table.take_matching(0x00aa));
        assert_eq!(None, table.take_matching(0x00aa));
    }

    #[test]
    fn ids_do_not_interfere() {
        let mut table = ForwardTable::new();
        table.register(0x0001, addr(1, 1111));
        table.register(0x0002, addr(2, 2222));

        assert_eq!(Some(addr(2, 2222)), table.take_matching(0x0002));
        assert_eq!(Some(addr(1, 1111)), table.take_matching(0x0001));
    }

    #[test]
    fn entries_expire() {
        let mut table = ForwardTable::with_limits(16, Duration::from_secs(10));
        let t0 = Instant::now();

        table.register_at(t0, 0x00aa, addr(5, 5353));

        assert_eq!(
            None,
            table.take_matching_at(t0 + Duration::from_secs(10), 0x00aa)
        );
    }

    #[test]
    fn entries_survive_until_expiry() {
        let mut table = ForwardTable::with_limits(16, Duration::from_secs(10));
        let t0 = Instant::now();

        table.register_at(t0, 0x00aa, addr(5, 5353));

        assert_eq!(
            Some(addr(5, 5353)),
            table.take_matching_at(t0 + Duration::from_secs(9), 0x00aa)
        );
    }

    #[test]
    fn expire_stale_sweeps_the_front() {
        let mut table = ForwardTable::with_limits(16, Duration::from_secs(10));
        let t0 = Instant::now();

        table.register_at(t0, 0x0001, addr(1, 1111));
        table.register_at(t0 + Duration::from_secs(5), 0x0002, addr(2, 2222));

        table.expire_stale_at(t0 + Duration::from_secs(12));

        assert_eq!(1, table.len());
        assert_eq!(
            Some(addr(2, 2222)),
            table.take_matching_at(t0 + Duration::from_secs(12), 0x0002)
        );
    }

    #[test]
    fn full_table_evicts_the_oldest() {
        let mut table = ForwardTable::with_limits(2, Duration::from_secs(10));
        let t0 = Instant::now();

        table.register_at(t0, 0x0001, addr(1, 1111));
        table.register_at(t0, 0x0002, addr(2, 2222));
        table.register_at(t0, 0x0003, addr(3, 3333));

        assert_eq!(2, table.len());
        assert_eq!(None, table.take_matching_at(t0, 0x0001));
        assert_eq!(Some(addr(2, 2222)), table.take_matching_at(t0, 0x0002));
        assert_eq!(Some(addr(3, 3333)), table.take_matching_at(t0, 0x0003));
    }
}
