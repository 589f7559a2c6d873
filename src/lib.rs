// src/lib.rs — Library root for Manifix

pub mod api;
pub mod cli;
pub mod infra;
pub mod repair;
pub mod session;
pub mod tools;
pub mod watch;
