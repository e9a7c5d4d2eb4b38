//! Thin adapters over the external tools the pipeline drives.

pub mod agent;
pub mod git;
pub mod hosting;
pub mod mix;
