//! Adapter implementations of the archive ports.

pub mod memory;
pub mod postgres;
