//! Application layer: the ledger and the transaction orchestrator.
//!
//! Everything here is written against the ports in `domain::ports`; the
//! concrete collaborators are injected at construction time.

pub mod ledger;
pub mod service;
