//! API endpoint handlers, one module per ledger component.

pub mod administrations;
pub mod alerts;
pub mod audits;
pub mod health;
pub mod medications;
