//! fleetctl subcommands

pub mod logs;
pub mod snapshots;
