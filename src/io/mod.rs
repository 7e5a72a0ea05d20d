//! File formats: snapshots, the tree cache, inventories and reports

pub mod cache;
pub mod inventory;
pub mod report;
pub mod snapshot;
