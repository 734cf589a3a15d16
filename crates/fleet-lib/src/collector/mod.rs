//! Periodic snapshot collection
//!
//! The [`CollectionLoop`] runs one cycle per tick: enumerate namespaces,
//! gather each namespace's inventory and metrics, and deliver the assembled
//! snapshot. Namespace-scoped failures only drop that namespace; failing to
//! list namespaces aborts the cycle.

mod r#loop;

#[cfg(test)]
mod tests;

pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder, InFlightGuard};

use std::time::Duration;

/// What one collection cycle produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub namespaces_total: usize,
    pub namespaces_collected: usize,
    /// Namespaces left out of the snapshot, with the reason
    pub skipped: Vec<(String, String)>,
    /// Resource names across all collected namespaces
    pub resources: usize,
    pub metrics: usize,
    pub elapsed: Duration,
}

impl CycleReport {
    /// True when at least one namespace was skipped
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}
