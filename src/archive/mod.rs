//! Activity archive for finished tasks.
//!
//! Every task leaves the queue through exactly one archive insert. Records
//! keep a denormalised latest-outcome index: among rows sharing a
//! latest-outcome key, the most recently archived non-cancelled one is
//! flagged, so dashboards can find the current state of a component
//! without scanning its history. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
