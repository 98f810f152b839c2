//! Core domain types for the dose calculation engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Drug definitions and the registry tables they live in
//! - Medication entries supplied by callers
//! - Breakdown and balance-pair types consumed by the clinical functions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Drug Definition Types
// ============================================================================

/// Delivery form of a dosing-table drug
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DrugForm {
    Patch,
    Oral,
    Injectable,
}

/// Infusion workflow a rotation target routes to
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InfusionHelper {
    Csci,
    IvInfusion,
}

/// Unit of a prepared solution's concentration
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConcentrationUnit {
    #[serde(rename = "mg/ml")]
    MgPerMl,
    #[serde(rename = "mcg/ml")]
    McgPerMl,
}

impl ConcentrationUnit {
    /// Mass token of the unit ("mg", "mcg")
    pub fn mass(&self) -> &'static str {
        match self {
            ConcentrationUnit::MgPerMl => "mg",
            ConcentrationUnit::McgPerMl => "mcg",
        }
    }

    /// Per-volume label ("mg/ml")
    pub fn per_ml(&self) -> &'static str {
        match self {
            ConcentrationUnit::MgPerMl => "mg/ml",
            ConcentrationUnit::McgPerMl => "mcg/ml",
        }
    }

    /// Hourly dose label ("mg/hr")
    pub fn per_hour(&self) -> &'static str {
        match self {
            ConcentrationUnit::MgPerMl => "mg/hr",
            ConcentrationUnit::McgPerMl => "mcg/hr",
        }
    }

    /// Concentration label annotated with the bag volume ("mg/ml in 100ml")
    pub fn per_ml_in(&self, fluid_volume_ml: f64) -> String {
        format!(
            "{} in {}ml",
            self.per_ml(),
            crate::rounding::format_amount(fluid_volume_ml)
        )
    }
}

/// Stock solution used when preparing an infusion
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DrugInfo {
    pub name: String,
    pub concentration: f64,
    pub unit: ConcentrationUnit,
}

/// A drug the engine can convert to and from MME
///
/// `MME = dose * strength / factor` when `strength` is set (dose is a unit
/// count), otherwise `MME = dose / factor`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DrugDefinition {
    pub name: String,
    pub factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default)]
    pub is_basal: bool,
    #[serde(default)]
    pub is_breakthrough: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_doses: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drug_info: Option<DrugInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper: Option<InfusionHelper>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<DrugForm>,
}

impl DrugDefinition {
    /// Minimal definition; the remaining fields are filled with struct update syntax.
    pub fn new(name: impl Into<String>, factor: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factor,
            strength: None,
            unit: unit.into(),
            step: None,
            is_basal: false,
            is_breakthrough: false,
            allowed_doses: None,
            drug_info: None,
            helper: None,
            form: None,
        }
    }
}

/// Plunger travel of one syringe barrel size
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SyringeGeometry {
    pub brand: String,
    pub size_ml: u32,
    pub plunger_travel_mm: f64,
}

// ============================================================================
// Registry Type
// ============================================================================

/// Static reference data: dosing drugs, rotation targets and syringe geometry
///
/// Keys are kept in a `BTreeMap` so listings come out in a stable order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Registry {
    #[serde(default)]
    pub drugs: BTreeMap<String, DrugDefinition>,
    #[serde(default)]
    pub rotation_targets: BTreeMap<String, DrugDefinition>,
    #[serde(default)]
    pub syringes: Vec<SyringeGeometry>,
}

// ============================================================================
// Entry and Result Types
// ============================================================================

/// One caller-supplied medication line
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MedicationEntry {
    pub key: String,
    pub dose: f64,
}

impl MedicationEntry {
    pub fn new(key: impl Into<String>, dose: f64) -> Self {
        Self {
            key: key.into(),
            dose,
        }
    }
}

/// The three entry collections that feed aggregation
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EntrySet {
    #[serde(default)]
    pub basal: Vec<MedicationEntry>,
    #[serde(default)]
    pub breakthrough: Vec<MedicationEntry>,
    #[serde(default)]
    pub rotation_basal: Vec<MedicationEntry>,
}

/// Aggregated MME, recomputed on every input change
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MmeBreakdown {
    pub basal: f64,
    pub breakthrough: f64,
    pub total: f64,
    /// Integer percent of the total coming from breakthrough dosing
    pub breakthrough_ratio: u32,
}

/// Two distinct drugs to trade dose between
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawBalancePair")]
pub struct BalancePair {
    decrease_key: String,
    increase_key: String,
}

impl BalancePair {
    /// Returns `None` when both keys are the same drug.
    pub fn new(decrease_key: impl Into<String>, increase_key: impl Into<String>) -> Option<Self> {
        let decrease_key = decrease_key.into();
        let increase_key = increase_key.into();
        if decrease_key == increase_key {
            return None;
        }
        Some(Self {
            decrease_key,
            increase_key,
        })
    }

    pub fn decrease_key(&self) -> &str {
        &self.decrease_key
    }

    pub fn increase_key(&self) -> &str {
        &self.increase_key
    }
}

#[derive(Deserialize)]
struct RawBalancePair {
    decrease_key: String,
    increase_key: String,
}

impl TryFrom<RawBalancePair> for BalancePair {
    type Error = String;

    fn try_from(raw: RawBalancePair) -> std::result::Result<Self, Self::Error> {
        BalancePair::new(raw.decrease_key, raw.increase_key)
            .ok_or_else(|| "balance pair keys must differ".to_string())
    }
}
