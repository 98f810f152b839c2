//! Error types for the dose_core library.
//!
//! Calculation functions never return these: an unknown drug or an unusable
//! dose is reported as `None` or zero. Errors only come out of the loaders
//! (config, registry, entry files) and the CSCI adapter used by the CLI.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dose_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Registry validation error
    #[error("Registry validation error: {0}")]
    RegistryValidation(String),

    /// Malformed medication entry input
    #[error("Entry file error: {0}")]
    EntryFile(String),

    /// Requested dose does not fit in the chosen syringe volume
    #[error("Drug volume exceeds total volume ({drug_volume} ml > {total_volume} ml)")]
    VolumeExceeded { drug_volume: f64, total_volume: f64 },

    /// Drug key not usable for the requested operation
    #[error("Unknown drug: {0}")]
    UnknownDrug(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
