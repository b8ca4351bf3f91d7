//! Command implementations

pub mod ingest;
