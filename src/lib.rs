//! Streaming fraud-decision engine for transfer events.
//!
//! See `orchestrator::Orchestrator::process` for the entry point; every
//! other module is a component it wires together.

pub mod aggregation;
pub mod analyzers;
pub mod cache;
pub mod config;
pub mod domain;
pub mod egress;
pub mod error;
pub mod health;
pub mod ingress;
pub mod ml;
pub mod orchestrator;
pub mod stores;
