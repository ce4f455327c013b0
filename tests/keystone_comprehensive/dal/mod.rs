//! Entity data access layer tests

pub mod migration;
pub mod relations;
