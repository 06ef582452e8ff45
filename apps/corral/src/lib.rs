//! # Corral
//!
//! Library half of the Corral binary: command line parsing, configuration
//! file loading and the orchestrator loop. `main.rs` only wires these up.

pub mod cli;
pub mod config;
pub mod orchestrator;
