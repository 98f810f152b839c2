//! Breakthrough (PRN) dose recommendation.

use crate::mme::dose_for_mme;
use crate::rounding::{round2, snap_or_round2};
use crate::Registry;
use serde::{Deserialize, Serialize};

/// Suggested as-needed dose derived from the total daily MME
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BreakthroughRecommendation {
    pub key: String,
    pub drug: String,
    pub dose: f64,
    pub unit: String,
    pub target_mme: f64,
    pub percent: f64,
}

/// Recommend a breakthrough dose worth `percent` % of `total_mme`.
///
/// Returns `None` while there is nothing to recommend: no positive total, or
/// `key` is not a breakthrough-eligible dosing drug.
pub fn recommend_breakthrough(
    registry: &Registry,
    total_mme: f64,
    key: &str,
    percent: f64,
) -> Option<BreakthroughRecommendation> {
    if !(total_mme > 0.0) {
        return None;
    }

    let drug = registry.drug(key).filter(|d| d.is_breakthrough)?;

    let target_mme = total_mme * percent / 100.0;
    let dose = snap_or_round2(dose_for_mme(drug, target_mme), drug.step);

    tracing::debug!(
        "Breakthrough for {} MME at {}%: {} {} of {}",
        total_mme,
        percent,
        dose,
        drug.unit,
        key
    );

    Some(BreakthroughRecommendation {
        key: key.to_string(),
        drug: drug.name.clone(),
        dose,
        unit: drug.unit.clone(),
        target_mme: round2(target_mme),
        percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_default_registry;

    #[test]
    fn test_recommendation_snaps_to_step() {
        crate::logging::init_test();
        let registry = build_default_registry();
        let rec = recommend_breakthrough(&registry, 100.0, "morphine_ir_tab_10", 15.0).unwrap();

        // 15 MME = 1.5 tablets, snapped to whole tablets
        assert_eq!(
            rec,
            BreakthroughRecommendation {
                key: "morphine_ir_tab_10".into(),
                drug: "Morphine IR 10mg".into(),
                dose: 2.0,
                unit: "tab/day".into(),
                target_mme: 15.0,
                percent: 15.0,
            }
        );
    }

    #[test]
    fn test_recommendation_without_step_rounds_to_2_decimals() {
        let registry = build_default_registry();

        let syrup = recommend_breakthrough(&registry, 45.0, "morphine_syrup", 10.0).unwrap();
        assert_eq!(syrup.target_mme, 4.5);
        assert_eq!(syrup.dose, 2.25);

        let injectable = recommend_breakthrough(&registry, 40.42, "morphine_iv_sc", 10.0).unwrap();
        assert_eq!(injectable.target_mme, 4.04);
        assert_eq!(injectable.dose, 12.13);
    }

    #[test]
    fn test_unknown_drug_returns_none() {
        let registry = build_default_registry();
        assert!(recommend_breakthrough(&registry, 100.0, "invalid_drug", 15.0).is_none());
    }

    #[test]
    fn test_basal_only_drug_returns_none() {
        let registry = build_default_registry();
        assert!(recommend_breakthrough(&registry, 100.0, "mst_10", 10.0).is_none());
        // Rotation targets are not breakthrough drugs either
        assert!(recommend_breakthrough(&registry, 100.0, "morphine_sr", 10.0).is_none());
    }

    #[test]
    fn test_no_total_returns_none() {
        let registry = build_default_registry();
        assert!(recommend_breakthrough(&registry, 0.0, "morphine_syrup", 10.0).is_none());
        assert!(recommend_breakthrough(&registry, f64::NAN, "morphine_syrup", 10.0).is_none());
    }
}
