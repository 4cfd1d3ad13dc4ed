//! lavado-batch - Batch Analysis Orchestrator
//!
//! Client-side workflow for the compliance portal: validates an uploaded
//! transaction batch against the required-column contract, computes the
//! tiered processing price, guards it against the account balance, submits
//! the batch for multi-stage ML analysis, tracks stage progress, polls for
//! the completed report with a bounded attempt budget, and reconciles the
//! balance afterward.
//!
//! The ML classifiers, billing, and persistence all live in the external
//! backend; this crate only drives the workflow and reacts to typed
//! failures.

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod pricing;
pub mod progress;
pub mod services;

pub use crate::error::AnalysisError;
pub use crate::orchestrator::BatchOrchestrator;
