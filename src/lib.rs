// src/lib.rs

pub mod accessor;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod logging;
pub mod memory;
pub mod orchestrator;
#[cfg(windows)]
pub mod power;
pub mod profile;
pub mod state;
pub mod tweaks;
pub mod utils;
