//! Aggregation of medication entries into an MME breakdown.

use crate::mme::mme_of;
use crate::rounding::{is_usable, round2};
use crate::{EntrySet, MedicationEntry, MmeBreakdown, Registry};

/// Sum the three entry collections into basal/breakthrough/total MME.
///
/// Rotation-basal entries count toward basal. Sums are rounded once at the
/// end. The ratio is an integer percent and is 0 when the total is not
/// positive.
pub fn aggregate(
    registry: &Registry,
    basal: &[MedicationEntry],
    breakthrough: &[MedicationEntry],
    rotation_basal: &[MedicationEntry],
) -> MmeBreakdown {
    let basal_mme = sum_mme(registry, basal) + sum_mme(registry, rotation_basal);
    let breakthrough_mme = sum_mme(registry, breakthrough);
    let total_mme = basal_mme + breakthrough_mme;

    let breakthrough_ratio = if total_mme > 0.0 {
        (breakthrough_mme / total_mme * 100.0).round().clamp(0.0, 100.0) as u32
    } else {
        0
    };

    MmeBreakdown {
        basal: round2(basal_mme),
        breakthrough: round2(breakthrough_mme),
        total: round2(total_mme),
        breakthrough_ratio,
    }
}

/// [`aggregate`] over an [`EntrySet`]
pub fn aggregate_set(registry: &Registry, entries: &EntrySet) -> MmeBreakdown {
    aggregate(
        registry,
        &entries.basal,
        &entries.breakthrough,
        &entries.rotation_basal,
    )
}

fn sum_mme(registry: &Registry, entries: &[MedicationEntry]) -> f64 {
    entries
        .iter()
        .filter(|entry| !entry.key.is_empty() && is_usable(entry.dose))
        .map(|entry| mme_of(registry, &entry.key, entry.dose))
        .sum()
}
