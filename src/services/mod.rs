//! Core services for listing, pruning and reconciling site trees

pub mod lister;
pub mod liveness;
pub mod orchestrator;
pub mod reconcile;
pub mod registry;
pub mod remover;
