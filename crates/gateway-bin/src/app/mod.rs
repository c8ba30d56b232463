//! Gateway wiring and lifecycle.

mod init;

pub use init::run_gateway;
