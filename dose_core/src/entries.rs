//! Reading medication entries supplied as text.
//!
//! Entry files are CSV with a header row:
//!
//! ```text
//! bucket,key,dose
//! basal,fentanyl_patch,25
//! breakthrough,morphine_ir_tab_10,2
//! rotation_basal,morphine_csci,30
//! ```
//!
//! The engine does no text parsing itself, so this is where unparseable
//! doses get coerced to 0 (with a warning) before anything is calculated.

use crate::{EntrySet, Error, MedicationEntry, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Which collection an entry belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryBucket {
    Basal,
    Breakthrough,
    RotationBasal,
}

impl FromStr for EntryBucket {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "basal" => Ok(EntryBucket::Basal),
            "breakthrough" | "prn" => Ok(EntryBucket::Breakthrough),
            "rotation_basal" | "rotation" => Ok(EntryBucket::RotationBasal),
            other => Err(Error::EntryFile(format!("Unknown entry bucket '{}'", other))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EntryRow {
    bucket: String,
    key: String,
    dose: String,
}

impl EntrySet {
    /// Add an entry to the given collection
    pub fn push(&mut self, bucket: EntryBucket, entry: MedicationEntry) {
        match bucket {
            EntryBucket::Basal => self.basal.push(entry),
            EntryBucket::Breakthrough => self.breakthrough.push(entry),
            EntryBucket::RotationBasal => self.rotation_basal.push(entry),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.basal.is_empty() && self.breakthrough.is_empty() && self.rotation_basal.is_empty()
    }
}

/// Read an entry CSV from any reader
pub fn read_entries<R: Read>(reader: R) -> Result<EntrySet> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut set = EntrySet::default();
    for (line, row) in csv_reader.deserialize::<EntryRow>().enumerate() {
        let row = row?;
        let bucket: EntryBucket = row.bucket.parse().map_err(|e| match e {
            Error::EntryFile(msg) => Error::EntryFile(format!("row {}: {}", line + 1, msg)),
            other => other,
        })?;
        set.push(bucket, MedicationEntry::new(row.key.clone(), coerce_dose(&row.key, &row.dose)));
    }

    tracing::debug!(
        "Read {} basal, {} breakthrough, {} rotation-basal entries",
        set.basal.len(),
        set.breakthrough.len(),
        set.rotation_basal.len()
    );
    Ok(set)
}

/// Read an entry CSV from a file
pub fn read_entries_from_path(path: &Path) -> Result<EntrySet> {
    let file = std::fs::File::open(path)?;
    let set = read_entries(file)?;
    tracing::info!("Loaded entries from {:?}", path);
    Ok(set)
}

/// Parse a `key=dose` pair as typed on the command line
pub fn parse_entry(text: &str) -> Result<MedicationEntry> {
    let (key, dose) = text
        .split_once('=')
        .ok_or_else(|| Error::EntryFile(format!("Expected key=dose, got '{}'", text)))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(Error::EntryFile(format!("Missing drug key in '{}'", text)));
    }

    Ok(MedicationEntry::new(key, coerce_dose(key, dose)))
}

fn coerce_dose(key: &str, text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(dose) => dose,
        Err(_) => {
            tracing::warn!("Unparseable dose '{}' for '{}', using 0", text, key);
            0.0
        }
    }
}
