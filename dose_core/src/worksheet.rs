//! Caller-owned working state for interactive front ends.
//!
//! A `Worksheet` keeps the entry lists and titration settings a form is
//! editing. It holds no authority of its own: every number comes from the
//! pure functions, and adjusted doses are handed back rather than written
//! into the lists. Callers replace the lists when they accept a change.

use crate::aggregate::aggregate_set;
use crate::titration::{adjust_balance, adjust_by_percentage, adjust_from_prn};
use crate::{BalancePair, EntrySet, MedicationEntry, MmeBreakdown, Registry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Worksheet {
    #[serde(default)]
    pub entries: EntrySet,
    #[serde(default)]
    pub percent_adjustment: f64,
    #[serde(default)]
    pub locked: BTreeSet<String>,
    #[serde(default)]
    pub balance_pair: Option<BalancePair>,
    /// Basal drug that receives the whole PRN-based increase
    #[serde(default)]
    pub pinned: Option<String>,
}

impl Worksheet {
    pub fn new(entries: EntrySet) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn breakdown(&self, registry: &Registry) -> MmeBreakdown {
        aggregate_set(registry, &self.entries)
    }

    pub fn lock(&mut self, key: impl Into<String>) {
        self.locked.insert(key.into());
    }

    pub fn unlock(&mut self, key: &str) {
        self.locked.remove(key);
    }

    pub fn set_balance_pair(&mut self, pair: Option<BalancePair>) {
        self.balance_pair = pair;
    }

    /// Record `percent` and return the adjusted basal entries
    pub fn apply_percentage(&mut self, registry: &Registry, percent: f64) -> Vec<MedicationEntry> {
        self.percent_adjustment = percent;
        adjust_by_percentage(registry, &self.entries.basal, percent, &self.locked)
    }

    /// Adjusted basal entries for the current balance pair, if one is set
    pub fn apply_balance(&self, registry: &Registry, percent: f64) -> Option<Vec<MedicationEntry>> {
        let pair = self.balance_pair.as_ref()?;
        Some(adjust_balance(registry, &self.entries.basal, pair, percent))
    }

    pub fn set_pinned(&mut self, key: Option<String>) {
        self.pinned = key;
    }

    /// Adjusted basal entries after folding in the breakthrough use
    pub fn apply_from_prn(&self, registry: &Registry) -> Vec<MedicationEntry> {
        adjust_from_prn(
            registry,
            &self.entries.basal,
            &self.entries.breakthrough,
            self.pinned.as_deref(),
        )
    }

    pub fn replace_basal(&mut self, basal: Vec<MedicationEntry>) {
        self.entries.basal = basal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_default_registry;

    fn sheet() -> Worksheet {
        Worksheet::new(EntrySet {
            basal: vec![
                MedicationEntry::new("fentanyl_patch", 25.0),
                MedicationEntry::new("mst_10", 4.0),
            ],
            breakthrough: vec![MedicationEntry::new("morphine_ir_tab_10", 2.0)],
            rotation_basal: vec![],
        })
    }

    #[test]
    fn test_breakdown_delegates_to_aggregate() {
        let registry = build_default_registry();
        let breakdown = sheet().breakdown(&registry);
        assert_eq!(breakdown.basal, 50.42);
        assert_eq!(breakdown.breakthrough, 20.0);
        assert_eq!(breakdown.total, 70.42);
    }

    #[test]
    fn test_apply_percentage_does_not_touch_entries() {
        let registry = build_default_registry();
        let mut sheet = sheet();
        sheet.lock("fentanyl_patch");

        let adjusted = sheet.apply_percentage(&registry, 50.0);
        assert_eq!(sheet.percent_adjustment, 50.0);
        assert_eq!(adjusted[0].dose, 25.0);
        assert_eq!(adjusted[1].dose, 6.0);
        assert_eq!(sheet.entries.basal[1].dose, 4.0);

        sheet.replace_basal(adjusted);
        assert_eq!(sheet.breakdown(&registry).basal, 70.42);
    }

    #[test]
    fn test_unlock() {
        let registry = build_default_registry();
        let mut sheet = sheet();
        sheet.lock("mst_10");
        sheet.unlock("mst_10");
        assert!(sheet.locked.is_empty());
        assert_eq!(sheet.apply_percentage(&registry, 50.0)[1].dose, 6.0);
    }

    #[test]
    fn test_apply_balance_needs_pair() {
        let registry = build_default_registry();
        let mut sheet = sheet();
        assert!(sheet.apply_balance(&registry, 25.0).is_none());

        sheet.set_balance_pair(BalancePair::new("mst_10", "fentanyl_patch"));
        let adjusted = sheet.apply_balance(&registry, 50.0).unwrap();
        assert_eq!(adjusted[0].dose, 37.5);
        assert_eq!(adjusted[1].dose, 2.0);
    }

    #[test]
    fn test_apply_from_prn_uses_pin() {
        let registry = build_default_registry();
        let mut sheet = sheet();

        // 20 PRN MME -> +10 MME; split gives +5 each, pinned gives +10 to one
        let split = sheet.apply_from_prn(&registry);
        assert_eq!(split[0].dose, 37.5);
        assert_eq!(split[1].dose, 5.0);

        sheet.set_pinned(Some("mst_10".into()));
        let pinned = sheet.apply_from_prn(&registry);
        assert_eq!(pinned[0].dose, 25.0);
        assert_eq!(pinned[1].dose, 5.0);
        assert_eq!(sheet.entries.basal[1].dose, 4.0);
    }

    #[test]
    fn test_worksheet_serde_roundtrip() {
        let mut sheet = sheet();
        sheet.lock("mst_10");
        sheet.set_pinned(Some("fentanyl_patch".into()));
        sheet.set_balance_pair(BalancePair::new("mst_10", "fentanyl_patch"));

        let json = serde_json::to_string(&sheet).unwrap();
        let restored: Worksheet = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, sheet);
    }
}
