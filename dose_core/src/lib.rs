#![forbid(unsafe_code)]

//! Opioid dose calculation engine.
//!
//! This crate provides:
//! - Drug registry (potency table, rotation targets, syringe geometry)
//! - MME conversion and aggregation
//! - Breakthrough recommendation, rotation and titration
//! - CSCI and IV infusion preparation
//! - Safety review, config, logging and entry-file input
//!
//! Every calculation is a pure function of a `&Registry` and its arguments;
//! nothing is cached between calls.

pub mod types;
pub mod error;
pub mod rounding;
pub mod registry;
pub mod config;
pub mod logging;
pub mod mme;
pub mod aggregate;
pub mod breakthrough;
pub mod rotation;
pub mod titration;
pub mod infusion;
pub mod safety;
pub mod entries;
pub mod worksheet;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use registry::{build_default_registry, get_default_registry};
pub use config::Config;
pub use mme::mme_of;
pub use aggregate::{aggregate, aggregate_set};
pub use breakthrough::{recommend_breakthrough, BreakthroughRecommendation};
pub use rotation::{quick_reference, rotate, rotate_default, RotationResult, DEFAULT_REDUCTION_PERCENT};
pub use titration::{adjust_balance, adjust_by_percentage, adjust_from_prn};
pub use infusion::{prepare_csci, prepare_iv_infusion, tdd_from_rate, CsciPreparation, CsciResult, IvPreparation};
pub use safety::{review_safety, SafetyReport, SafetyWarning};
pub use entries::{parse_entry, read_entries, read_entries_from_path, EntryBucket};
pub use worksheet::Worksheet;
