//! Pipelines and their scheduled background tasks

pub mod homepage_graphs;
pub mod housekeeping;
