//! MME conversion: dose to morphine milligram equivalents and back.

use crate::rounding::{is_usable, round2};
use crate::{DrugDefinition, Registry};

/// Convert a dose of `key` to MME, rounded to 2 decimals.
///
/// Unknown drugs and unusable doses (zero, NaN) give 0. Negative doses are
/// not filtered here.
pub fn mme_of(registry: &Registry, key: &str, dose: f64) -> f64 {
    if !is_usable(dose) {
        return 0.0;
    }
    match registry.lookup(key) {
        Some(drug) => round2(raw_mme(drug, dose)),
        None => {
            tracing::debug!("No registry entry for '{}', contributing 0 MME", key);
            0.0
        }
    }
}

/// Unrounded MME of a dose
pub fn raw_mme(drug: &DrugDefinition, dose: f64) -> f64 {
    match drug.strength {
        Some(strength) => dose * strength / drug.factor,
        None => dose / drug.factor,
    }
}

/// Inverse of [`raw_mme`]: the unrounded dose of `drug` delivering `mme`
pub fn dose_for_mme(drug: &DrugDefinition, mme: f64) -> f64 {
    match drug.strength {
        Some(strength) => mme * drug.factor / strength,
        None => mme * drug.factor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_default_registry;

    #[test]
    fn test_fentanyl_patch_mme() {
        let registry = build_default_registry();
        assert_eq!(mme_of(&registry, "fentanyl_patch", 25.0), 10.42);
    }

    #[test]
    fn test_mst_mme_uses_strength() {
        let registry = build_default_registry();
        assert_eq!(mme_of(&registry, "mst_10", 3.0), 30.0);
        assert_eq!(mme_of(&registry, "mst_30", 2.0), 60.0);
    }

    #[test]
    fn test_injectable_mme() {
        let registry = build_default_registry();
        assert_eq!(mme_of(&registry, "morphine_iv_sc", 30.0), 10.0);
        assert_eq!(mme_of(&registry, "fentanyl_iv_sc", 300.0), 1000.0);
    }

    #[test]
    fn test_rotation_only_key_converts() {
        let registry = build_default_registry();
        assert_eq!(mme_of(&registry, "morphine_csci", 20.0), 6.67);
    }

    #[test]
    fn test_unknown_drug_is_zero() {
        crate::logging::init_test();
        let registry = build_default_registry();
        assert_eq!(mme_of(&registry, "invalid_drug", 25.0), 0.0);
        assert_eq!(mme_of(&registry, "", 25.0), 0.0);
    }

    #[test]
    fn test_unusable_dose_is_zero() {
        let registry = build_default_registry();
        for key in registry.drugs.keys().chain(registry.rotation_targets.keys()) {
            assert_eq!(mme_of(&registry, key, 0.0), 0.0);
            assert_eq!(mme_of(&registry, key, f64::NAN), 0.0);
        }
    }

    #[test]
    fn test_negative_dose_passes_through() {
        let registry = build_default_registry();
        assert_eq!(mme_of(&registry, "mst_10", -1.0), -10.0);
    }

    #[test]
    fn test_mme_is_homogeneous() {
        let registry = build_default_registry();
        for key in registry.drugs.keys() {
            for dose in [1.0, 2.5, 7.0, 40.0] {
                let single = mme_of(&registry, key, dose);
                let double = mme_of(&registry, key, 2.0 * dose);
                assert!(
                    (double - 2.0 * single).abs() <= 0.015 + 1e-9,
                    "{} at {}: {} vs 2 x {}",
                    key,
                    dose,
                    double,
                    single
                );
            }
        }
    }

    #[test]
    fn test_dose_for_mme_inverts_raw_mme() {
        let registry = build_default_registry();
        for drug in registry.drugs.values() {
            let dose = 3.0;
            let back = dose_for_mme(drug, raw_mme(drug, dose));
            assert!((back - dose).abs() < 1e-9, "{}", drug.name);
        }
    }
}
