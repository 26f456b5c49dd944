//! Networked client: connection handling and snapshot reconciliation

pub mod client;
pub mod reconciler;
