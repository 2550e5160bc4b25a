//! Homepage ETL library exports

pub mod chart;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod queries;
pub mod reducer;
pub mod render;
pub mod retention;
pub mod routes;
pub mod state;
pub mod storage;
pub mod tasks;
