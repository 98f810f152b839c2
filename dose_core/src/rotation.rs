//! Opioid rotation to a new drug or route.
//!
//! The current total MME is reduced for incomplete cross-tolerance, then
//! converted to the target drug and rounded to a dose that can actually be
//! given:
//! 1. Targets with discrete rungs (patch strengths) snap to the nearest rung
//! 2. High-potency targets (`factor < 1`) round to 1 decimal
//! 3. Everything else rounds to a whole number

use crate::mme::dose_for_mme;
use crate::rounding::{is_usable, nearest_allowed_dose, round1, round2};
use crate::{DrugDefinition, DrugInfo, InfusionHelper, Registry};
use serde::{Deserialize, Serialize};

/// Reduction applied when the caller has no preference
pub const DEFAULT_REDUCTION_PERCENT: f64 = 25.0;

/// Outcome of rotating onto a target drug
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RotationResult {
    pub key: String,
    pub drug: String,
    pub dose: f64,
    pub unit: String,
    pub original_mme: f64,
    pub reduced_mme: f64,
    pub reduction_percent: f64,
    /// Infusion workflow to continue with, passed through from the registry
    pub helper: Option<InfusionHelper>,
    pub drug_info: Option<DrugInfo>,
}

/// Rotate `current_mme` onto `target_key` with the given safety reduction.
///
/// Returns `None` when there is no usable MME or the target is not in the
/// rotation table.
pub fn rotate(
    registry: &Registry,
    target_key: &str,
    current_mme: f64,
    reduction_percent: f64,
) -> Option<RotationResult> {
    if !is_usable(current_mme) {
        return None;
    }

    let target = match registry.rotation_target(target_key) {
        Some(target) => target,
        None => {
            tracing::debug!("'{}' is not a rotation target", target_key);
            return None;
        }
    };

    // The unrounded value feeds the dose; the rounded one is only reported
    let reduced_mme = current_mme * (1.0 - reduction_percent / 100.0);
    let dose = round_rotation_dose(target, dose_for_mme(target, reduced_mme));

    tracing::info!(
        "Rotation to {}: {} MME -{}% -> {} {}",
        target_key,
        current_mme,
        reduction_percent,
        dose,
        target.unit
    );

    Some(RotationResult {
        key: target_key.to_string(),
        drug: target.name.clone(),
        dose,
        unit: target.unit.clone(),
        original_mme: current_mme,
        reduced_mme: round2(reduced_mme),
        reduction_percent,
        helper: target.helper,
        drug_info: target.drug_info.clone(),
    })
}

/// Rotation with [`DEFAULT_REDUCTION_PERCENT`]
pub fn rotate_default(registry: &Registry, target_key: &str, current_mme: f64) -> Option<RotationResult> {
    rotate(registry, target_key, current_mme, DEFAULT_REDUCTION_PERCENT)
}

fn round_rotation_dose(target: &DrugDefinition, raw_dose: f64) -> f64 {
    if let Some(rung) = target
        .allowed_doses
        .as_deref()
        .and_then(|allowed| nearest_allowed_dose(raw_dose, allowed))
    {
        return rung;
    }

    if target.factor < 1.0 {
        round1(raw_dose)
    } else {
        raw_dose.round()
    }
}

/// Equivalent dose on every non-infusion rotation target, without reduction.
///
/// Infusion targets are left out because their dose is worked out in the
/// preparation helpers instead.
pub fn quick_reference(registry: &Registry, total_mme: f64) -> Vec<RotationResult> {
    registry
        .rotation_targets
        .iter()
        .filter(|(_, target)| target.helper.is_none())
        .filter_map(|(key, _)| rotate(registry, key, total_mme, 0.0))
        .collect()
}
