//! Command handlers.

pub mod models;
pub mod run;
pub mod stats;
