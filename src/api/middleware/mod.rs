//! API middleware stack.

pub mod access;
