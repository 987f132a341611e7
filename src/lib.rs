//! Discrete-event simulation of a LoRa-style mesh/star sensor network.
//!
//! The `simulation` module holds the model (topology, routing, event engine
//! and the supporting models); `config` loads a run description from TOML and
//! `runner` drives a headless run of it.

pub mod config;
pub mod runner;
pub mod simulation;

pub use config::SimulatorConfig;
pub use runner::{RunSummary, run};
