//! An authoritative DNS server with upstream forwarding.
//!
//! Queries whose names appear in the zone file are answered locally
//! with the AA bit set; everything else is relayed verbatim to a
//! single upstream resolver, and the upstream's replies are routed
//! back to the original clients by transaction ID.

pub mod forward;
pub mod protocol;
pub mod resolver;
pub mod server;
pub mod zones;
