//! Safety review of a regimen.
//!
//! The review only ever warns. Nothing here blocks a calculation.

use crate::aggregate::aggregate_set;
use crate::config::SafetyConfig;
use crate::rounding::is_usable;
use crate::{DrugForm, EntrySet, Registry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One reason to double-check a regimen
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SafetyWarning {
    /// More than one basal drug of the same delivery form
    DuplicateForm { form: DrugForm, keys: Vec<String> },
    HighTotalMme { total: f64, threshold: f64 },
    /// Breakthrough use is a large share of the total; consider more basal
    HighBreakthroughRatio { ratio: u32, threshold: u32 },
}

impl fmt::Display for SafetyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyWarning::DuplicateForm { form, keys } => write!(
                f,
                "More than one basal {:?} drug: {}",
                form,
                keys.join(", ")
            ),
            SafetyWarning::HighTotalMme { total, threshold } => write!(
                f,
                "Total MME {} is above {}; review carefully",
                total, threshold
            ),
            SafetyWarning::HighBreakthroughRatio { ratio, threshold } => write!(
                f,
                "Breakthrough ratio {}% is above {}%; consider increasing basal dosing",
                ratio, threshold
            ),
        }
    }
}

/// Result of [`review_safety`]
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SafetyReport {
    pub warnings: Vec<SafetyWarning>,
}

impl SafetyReport {
    pub fn is_clear(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Review a regimen against the configured thresholds
pub fn review_safety(registry: &Registry, entries: &EntrySet, thresholds: &SafetyConfig) -> SafetyReport {
    let mut warnings = Vec::new();

    let mut by_form: BTreeMap<DrugForm, Vec<String>> = BTreeMap::new();
    for entry in entries.basal.iter().filter(|e| is_usable(e.dose)) {
        if let Some(form) = registry.drug(&entry.key).and_then(|d| d.form) {
            by_form.entry(form).or_default().push(entry.key.clone());
        }
    }
    for (form, keys) in by_form {
        if keys.len() > 1 {
            warnings.push(SafetyWarning::DuplicateForm { form, keys });
        }
    }

    let breakdown = aggregate_set(registry, entries);
    if breakdown.total > thresholds.high_total_mme {
        warnings.push(SafetyWarning::HighTotalMme {
            total: breakdown.total,
            threshold: thresholds.high_total_mme,
        });
    }
    if breakdown.breakthrough_ratio > thresholds.high_breakthrough_ratio {
        warnings.push(SafetyWarning::HighBreakthroughRatio {
            ratio: breakdown.breakthrough_ratio,
            threshold: thresholds.high_breakthrough_ratio,
        });
    }

    for warning in &warnings {
        tracing::warn!("Safety review: {}", warning);
    }

    SafetyReport { warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_default_registry, MedicationEntry};

    fn entries(basal: &[(&str, f64)], prn: &[(&str, f64)]) -> EntrySet {
        EntrySet {
            basal: basal.iter().map(|(k, d)| MedicationEntry::new(*k, *d)).collect(),
            breakthrough: prn.iter().map(|(k, d)| MedicationEntry::new(*k, *d)).collect(),
            rotation_basal: vec![],
        }
    }

    #[test]
    fn test_clear_regimen() {
        crate::logging::init_test();
        let registry = build_default_registry();
        let set = entries(&[("mst_30", 2.0)], &[("morphine_ir_tab_10", 1.0)]);

        let report = review_safety(&registry, &set, &SafetyConfig::default());
        assert!(report.is_clear(), "{:?}", report);
    }

    #[test]
    fn test_duplicate_oral_basal() {
        let registry = build_default_registry();
        let set = entries(&[("mst_10", 2.0), ("kapanol_20", 1.0), ("fentanyl_patch", 25.0)], &[]);

        let report = review_safety(&registry, &set, &SafetyConfig::default());
        assert_eq!(
            report.warnings,
            vec![SafetyWarning::DuplicateForm {
                form: DrugForm::Oral,
                keys: vec!["mst_10".into(), "kapanol_20".into()],
            }]
        );
    }

    #[test]
    fn test_high_total_mme() {
        let registry = build_default_registry();
        let set = entries(&[("mst_30", 8.0)], &[]);

        let report = review_safety(&registry, &set, &SafetyConfig::default());
        assert_eq!(
            report.warnings,
            vec![SafetyWarning::HighTotalMme {
                total: 240.0,
                threshold: 200.0,
            }]
        );
    }

    #[test]
    fn test_high_breakthrough_ratio() {
        let registry = build_default_registry();
        let set = entries(&[("mst_30", 2.0)], &[("morphine_ir_tab_10", 2.0)]);

        let report = review_safety(&registry, &set, &SafetyConfig::default());
        assert_eq!(
            report.warnings,
            vec![SafetyWarning::HighBreakthroughRatio {
                ratio: 25,
                threshold: 20,
            }]
        );
        assert!(report.warnings[0].to_string().contains("25%"));
    }

    #[test]
    fn test_custom_thresholds() {
        let registry = build_default_registry();
        let set = entries(&[("mst_30", 2.0)], &[]);
        let strict = SafetyConfig {
            high_total_mme: 50.0,
            high_breakthrough_ratio: 20,
        };

        let report = review_safety(&registry, &set, &strict);
        assert_eq!(report.warnings.len(), 1);
    }
}
