//! Dose titration strategies.
//!
//! Three ways of adjusting an existing regimen:
//! - Percentage: scale every unlocked entry by the same percent
//! - Balance: move dose from one drug to another by a percent of each
//! - PRN: fold half of the breakthrough MME into the basal drugs
//!
//! Percentage and balance doses land on the drug's step grid when it
//! declares one, otherwise they are rounded to 2 decimals. PRN increases
//! always snap, to a step of 1 when the drug has none. Inputs are never
//! mutated.

use crate::mme::{dose_for_mme, mme_of};
use crate::rounding::{is_usable, snap_or_round2, snap_to_step};
use crate::{BalancePair, MedicationEntry, Registry};
use std::collections::BTreeSet;

/// Share of the daily breakthrough MME moved into basal by [`adjust_from_prn`]
pub const PRN_TO_BASAL_FRACTION: f64 = 0.5;

/// Scale every entry not in `locked` by `percent` (e.g. `-25.0` for a 25 % cut).
pub fn adjust_by_percentage(
    registry: &Registry,
    entries: &[MedicationEntry],
    percent: f64,
    locked: &BTreeSet<String>,
) -> Vec<MedicationEntry> {
    tracing::debug!(
        "Percentage titration of {}% over {} entries ({} locked)",
        percent,
        entries.len(),
        locked.len()
    );

    entries
        .iter()
        .map(|entry| {
            if locked.contains(&entry.key) {
                entry.clone()
            } else {
                scale_entry(registry, entry, 1.0 + percent / 100.0)
            }
        })
        .collect()
}

/// Move dose from `pair.decrease_key` to `pair.increase_key`.
///
/// Only the magnitude of `percent` matters; the pair decides the direction.
/// Entries for any other drug are returned unchanged.
pub fn adjust_balance(
    registry: &Registry,
    entries: &[MedicationEntry],
    pair: &BalancePair,
    percent: f64,
) -> Vec<MedicationEntry> {
    let magnitude = percent.abs() / 100.0;

    entries
        .iter()
        .map(|entry| {
            if entry.key == pair.decrease_key() {
                scale_entry(registry, entry, 1.0 - magnitude)
            } else if entry.key == pair.increase_key() {
                scale_entry(registry, entry, 1.0 + magnitude)
            } else {
                entry.clone()
            }
        })
        .collect()
}

/// Raise basal doses by half of the MME taken as breakthrough doses.
///
/// With `pinned` set, every basal row for that drug receives the whole
/// increase. Otherwise the increase is split evenly over the basal rows in
/// use (a basal-flagged drug with a positive dose). Each share is turned
/// back into a dose of that drug and the new dose snapped to its step.
pub fn adjust_from_prn(
    registry: &Registry,
    basal: &[MedicationEntry],
    breakthrough: &[MedicationEntry],
    pinned: Option<&str>,
) -> Vec<MedicationEntry> {
    let prn_mme: f64 = breakthrough
        .iter()
        .filter(|e| e.dose > 0.0)
        .map(|e| mme_of(registry, &e.key, e.dose))
        .sum();
    let increase_mme = prn_mme * PRN_TO_BASAL_FRACTION;

    if !(increase_mme > 0.0) {
        tracing::debug!("No breakthrough MME, basal unchanged");
        return basal.to_vec();
    }

    let receives = |entry: &MedicationEntry| match pinned {
        Some(key) => entry.key == key,
        None => {
            entry.dose > 0.0 && registry.drug(&entry.key).map_or(false, |d| d.is_basal)
        }
    };

    let receivers = basal.iter().filter(|&e| receives(e)).count();
    if receivers == 0 {
        tracing::debug!("No basal drug to receive {} MME", increase_mme);
        return basal.to_vec();
    }
    let share_mme = match pinned {
        Some(_) => increase_mme,
        None => increase_mme / receivers as f64,
    };

    tracing::info!(
        "PRN titration: {} breakthrough MME, +{} MME over {} basal row(s)",
        prn_mme,
        increase_mme,
        receivers
    );

    basal
        .iter()
        .map(|entry| {
            let drug = match registry.lookup(&entry.key) {
                Some(drug) if receives(entry) => drug,
                _ => return entry.clone(),
            };
            let current = if entry.dose.is_nan() { 0.0 } else { entry.dose };
            let dose = current + dose_for_mme(drug, share_mme);
            MedicationEntry {
                key: entry.key.clone(),
                dose: snap_to_step(dose, drug.step.unwrap_or(1.0)),
            }
        })
        .collect()
}

fn scale_entry(registry: &Registry, entry: &MedicationEntry, multiplier: f64) -> MedicationEntry {
    // Nothing entered yet: leave the row as the caller had it
    if !is_usable(entry.dose) {
        return entry.clone();
    }

    let step = registry.lookup(&entry.key).and_then(|drug| drug.step);

    MedicationEntry {
        key: entry.key.clone(),
        dose: snap_or_round2(entry.dose * multiplier, step),
    }
}
