//! Key-value store tests

pub mod basic_ops;
pub mod concurrency;
pub mod locks;
pub mod transactions;
