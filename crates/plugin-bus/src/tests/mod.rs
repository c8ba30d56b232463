//! Pipeline and server tests over the in-memory bus.
//!
//! Modules:
//! - `authorization`: tenant resolution and credential gating
//! - `decoding`: request envelope handling
//! - `handshake`: ack ordering, retained completions, job bookkeeping
//! - `server`: subscription, routing and shutdown

mod authorization;
mod handshake;
