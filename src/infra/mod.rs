// src/infra/mod.rs

pub mod config;
pub mod daemon;
pub mod errors;
pub mod logger;
pub mod paths;
pub mod stats;
