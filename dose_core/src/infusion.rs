//! Infusion preparation helpers.
//!
//! - TDD from a running infusion's rate (reverse check)
//! - CSCI syringe-driver fill: stock volume, diluent, ml/hr and mm/hr rates
//! - IV bag concentration and hourly dose
//!
//! All of these are 24-hour preparations.

use crate::rounding::{format_amount, is_usable, round2};
use crate::{ConcentrationUnit, DrugInfo, Error, Registry, Result};
use serde::{Deserialize, Serialize};

const HOURS_PER_DAY: f64 = 24.0;

/// Total daily dose delivered by an infusion of `drug_amount` in
/// `fluid_volume` ml running at `rate_ml_per_hr`. Any unusable input gives 0.
pub fn tdd_from_rate(drug_amount: f64, fluid_volume: f64, rate_ml_per_hr: f64) -> f64 {
    if !is_usable(drug_amount) || !is_usable(fluid_volume) || !is_usable(rate_ml_per_hr) {
        return 0.0;
    }

    let concentration = drug_amount / fluid_volume;
    round2(concentration * rate_ml_per_hr * HOURS_PER_DAY)
}

// ============================================================================
// CSCI
// ============================================================================

/// A syringe that can be drawn up as requested
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CsciPreparation {
    pub key: String,
    pub drug: String,
    pub total_dose: f64,
    pub dose_unit: String,
    pub drug_volume: f64,
    pub diluent_volume: f64,
    pub rate_ml_per_hr: f64,
    /// For drivers set by plunger travel rather than volume
    pub rate_mm_per_hr: f64,
    pub concentration: f64,
    pub concentration_unit: ConcentrationUnit,
    pub total_volume: f64,
    pub syringe_size_ml: u32,
    pub order_text: String,
}

/// Outcome of a CSCI calculation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CsciResult {
    Prepared(CsciPreparation),
    /// The stock volume alone is larger than the requested total volume.
    /// The caller should ask for a larger volume or a stronger stock.
    VolumeExceeded { drug_volume: f64, total_volume: f64 },
}

impl CsciResult {
    pub fn is_prepared(&self) -> bool {
        matches!(self, CsciResult::Prepared(_))
    }

    /// Turn the volume failure into [`Error::VolumeExceeded`] for `?` callers
    pub fn into_result(self) -> Result<CsciPreparation> {
        match self {
            CsciResult::Prepared(prep) => Ok(prep),
            CsciResult::VolumeExceeded {
                drug_volume,
                total_volume,
            } => Err(Error::VolumeExceeded {
                drug_volume,
                total_volume,
            }),
        }
    }
}

/// Work out a 24-hour CSCI syringe for `total_dose` of `key`.
///
/// Returns `None` when `key` is not a rotation target with stock drug info,
/// or when the dose is missing. A missing (zero) total volume cannot hold
/// any stock and comes back as `VolumeExceeded`. An unknown syringe size
/// still prepares, with a 0 mm/hr rate.
pub fn prepare_csci(
    registry: &Registry,
    key: &str,
    total_dose: f64,
    syringe_size_ml: u32,
    total_volume_ml: f64,
) -> Option<CsciResult> {
    if !is_usable(total_dose) || total_volume_ml.is_nan() {
        return None;
    }

    let target = registry.rotation_target(key)?;
    let stock = stock_info(key, target.drug_info.as_ref())?;

    let drug_volume = total_dose / stock.concentration;
    let diluent_volume = total_volume_ml - drug_volume;

    if diluent_volume < 0.0 {
        tracing::warn!(
            "CSCI {}: {} ml of stock does not fit in {} ml",
            key,
            round2(drug_volume),
            total_volume_ml
        );
        return Some(CsciResult::VolumeExceeded {
            drug_volume: round2(drug_volume),
            total_volume: total_volume_ml,
        });
    }

    let rate_ml_per_hr = total_volume_ml / HOURS_PER_DAY;
    let plunger_travel_mm = match registry.syringe(syringe_size_ml) {
        Some(syringe) => syringe.plunger_travel_mm,
        None => {
            tracing::warn!(
                "No geometry for a {} ml syringe, mm/hr rate unavailable",
                syringe_size_ml
            );
            0.0
        }
    };
    let rate_mm_per_hr = plunger_travel_mm / HOURS_PER_DAY;

    let order_text = format!(
        "{} {}{} + NSS {}ml in {}ml syringe, infuse at {}ml/hr via CSCI pump",
        stock.name,
        format_amount(total_dose),
        stock.unit.mass(),
        format_amount(diluent_volume),
        format_amount(drug_volume + diluent_volume),
        format_amount(rate_ml_per_hr)
    );

    Some(CsciResult::Prepared(CsciPreparation {
        key: key.to_string(),
        drug: stock.name.clone(),
        total_dose,
        dose_unit: stock.unit.mass().to_string(),
        drug_volume: round2(drug_volume),
        diluent_volume: round2(diluent_volume),
        rate_ml_per_hr: round2(rate_ml_per_hr),
        rate_mm_per_hr: round2(rate_mm_per_hr),
        concentration: stock.concentration,
        concentration_unit: stock.unit,
        total_volume: total_volume_ml,
        syringe_size_ml,
        order_text,
    }))
}

// ============================================================================
// IV infusion
// ============================================================================

/// A 24-hour IV bag
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IvPreparation {
    pub key: String,
    pub drug: String,
    pub total_dose: f64,
    /// Stock volume to add to the bag
    pub drug_volume: f64,
    /// Final concentration in the bag
    pub concentration: f64,
    pub concentration_unit: String,
    pub dose_per_hour: f64,
    pub dose_unit: String,
    pub fluid_volume: f64,
    pub order_text: String,
}

/// Work out a 24-hour IV bag of `total_dose` of `key` in `fluid_volume_ml`.
///
/// Returns `None` for targets without stock drug info and for a missing dose
/// or fluid volume.
pub fn prepare_iv_infusion(
    registry: &Registry,
    key: &str,
    total_dose: f64,
    fluid_volume_ml: f64,
) -> Option<IvPreparation> {
    if !is_usable(total_dose) || !is_usable(fluid_volume_ml) {
        return None;
    }

    let target = registry.rotation_target(key)?;
    let stock = stock_info(key, target.drug_info.as_ref())?;

    let drug_volume = total_dose / stock.concentration;
    let final_concentration = total_dose / fluid_volume_ml;
    let dose_per_hour = total_dose / HOURS_PER_DAY;

    let order_text = format!(
        "{} {}{} in {}ml NSS (concentration: {}{}), infuse continuously",
        stock.name,
        format_amount(total_dose),
        stock.unit.mass(),
        format_amount(fluid_volume_ml),
        format_amount(final_concentration),
        stock.unit.per_ml()
    );

    Some(IvPreparation {
        key: key.to_string(),
        drug: stock.name.clone(),
        total_dose,
        drug_volume: round2(drug_volume),
        concentration: round2(final_concentration),
        concentration_unit: stock.unit.per_ml_in(fluid_volume_ml),
        dose_per_hour: round2(dose_per_hour),
        dose_unit: stock.unit.per_hour().to_string(),
        fluid_volume: fluid_volume_ml,
        order_text,
    })
}

fn stock_info<'a>(key: &str, info: Option<&'a DrugInfo>) -> Option<&'a DrugInfo> {
    match info {
        Some(info) if info.concentration > 0.0 => Some(info),
        _ => {
            tracing::debug!("'{}' has no stock concentration for infusion", key);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_default_registry;

    #[test]
    fn test_tdd_from_rate() {
        assert_eq!(tdd_from_rate(100.0, 50.0, 2.0), 96.0);
        assert_eq!(tdd_from_rate(10.0, 100.0, 4.2), 10.08);
    }

    #[test]
    fn test_tdd_from_rate_missing_inputs() {
        assert_eq!(tdd_from_rate(0.0, 50.0, 2.0), 0.0);
        assert_eq!(tdd_from_rate(100.0, 0.0, 2.0), 0.0);
        assert_eq!(tdd_from_rate(100.0, 50.0, f64::NAN), 0.0);
    }

    #[test]
    fn test_csci_morphine() {
        let registry = build_default_registry();
        let result = prepare_csci(&registry, "morphine_csci", 60.0, 30, 20.0).unwrap();

        let prep = match result {
            CsciResult::Prepared(prep) => prep,
            other => panic!("Expected prepared syringe, got {:?}", other),
        };
        assert_eq!(prep.drug_volume, 6.0);
        assert_eq!(prep.diluent_volume, 14.0);
        assert_eq!(prep.rate_ml_per_hr, 0.83);
        assert_eq!(prep.rate_mm_per_hr, 3.65);
        assert_eq!(prep.dose_unit, "mg");
        assert_eq!(
            prep.order_text,
            "Morphine 60mg + NSS 14ml in 20ml syringe, infuse at 0.83ml/hr via CSCI pump"
        );
    }

    #[test]
    fn test_csci_fentanyl_uses_mcg() {
        let registry = build_default_registry();
        let prep = prepare_csci(&registry, "fentanyl_csci", 600.0, 50, 48.0)
            .unwrap()
            .into_result()
            .unwrap();

        assert_eq!(prep.drug_volume, 12.0);
        assert_eq!(prep.diluent_volume, 36.0);
        assert_eq!(prep.rate_ml_per_hr, 2.0);
        assert_eq!(prep.rate_mm_per_hr, 5.13);
        assert!(prep.order_text.starts_with("Fentanyl 600mcg + NSS 36ml"));
    }

    #[test]
    fn test_csci_volume_exceeded() {
        crate::logging::init_test();
        let registry = build_default_registry();
        let result = prepare_csci(&registry, "morphine_csci", 300.0, 20, 20.0).unwrap();

        assert!(!result.is_prepared());
        assert_eq!(
            result,
            CsciResult::VolumeExceeded {
                drug_volume: 30.0,
                total_volume: 20.0,
            }
        );
        assert!(matches!(
            result.into_result(),
            Err(Error::VolumeExceeded { .. })
        ));
    }

    #[test]
    fn test_csci_exact_fill_has_no_diluent() {
        let registry = build_default_registry();
        let prep = prepare_csci(&registry, "morphine_csci", 200.0, 20, 20.0)
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(prep.diluent_volume, 0.0);
    }

    #[test]
    fn test_csci_unknown_syringe_has_zero_mm_rate() {
        crate::logging::init_test();
        let registry = build_default_registry();
        let prep = prepare_csci(&registry, "morphine_csci", 30.0, 10, 10.0)
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(prep.rate_mm_per_hr, 0.0);
        assert_eq!(prep.rate_ml_per_hr, 0.42);
    }

    #[test]
    fn test_csci_requires_stock() {
        let registry = build_default_registry();
        assert!(prepare_csci(&registry, "morphine_sr", 60.0, 30, 20.0).is_none());
        assert!(prepare_csci(&registry, "unknown", 60.0, 30, 20.0).is_none());
        assert!(prepare_csci(&registry, "morphine_csci", 0.0, 30, 20.0).is_none());
        assert!(prepare_csci(&registry, "morphine_csci", 60.0, 30, f64::NAN).is_none());
    }

    #[test]
    fn test_csci_zero_total_volume_is_exceeded() {
        crate::logging::init_test();
        let registry = build_default_registry();
        let result = prepare_csci(&registry, "morphine_csci", 60.0, 30, 0.0);

        assert_eq!(
            result,
            Some(CsciResult::VolumeExceeded {
                drug_volume: 6.0,
                total_volume: 0.0,
            })
        );
    }

    #[test]
    fn test_csci_result_serializes_with_status() {
        let result = CsciResult::VolumeExceeded {
            drug_volume: 30.0,
            total_volume: 20.0,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "volume_exceeded");
        assert!(json.get("diluent_volume").is_none());
    }

    #[test]
    fn test_iv_morphine() {
        let registry = build_default_registry();
        let prep = prepare_iv_infusion(&registry, "morphine_iv_infusion", 120.0, 100.0).unwrap();

        assert_eq!(prep.drug_volume, 12.0);
        assert_eq!(prep.concentration, 1.2);
        assert_eq!(prep.concentration_unit, "mg/ml in 100ml");
        assert_eq!(prep.dose_per_hour, 5.0);
        assert_eq!(prep.dose_unit, "mg/hr");
        assert_eq!(
            prep.order_text,
            "Morphine 120mg in 100ml NSS (concentration: 1.2mg/ml), infuse continuously"
        );
    }

    #[test]
    fn test_iv_fentanyl_units() {
        let registry = build_default_registry();
        let prep = prepare_iv_infusion(&registry, "fentanyl_iv_infusion", 1000.0, 100.0).unwrap();

        assert_eq!(prep.drug_volume, 20.0);
        assert_eq!(prep.concentration, 10.0);
        assert_eq!(prep.concentration_unit, "mcg/ml in 100ml");
        assert_eq!(prep.dose_per_hour, 41.67);
        assert_eq!(prep.dose_unit, "mcg/hr");
    }

    #[test]
    fn test_iv_requires_inputs() {
        let registry = build_default_registry();
        assert!(prepare_iv_infusion(&registry, "morphine_sr", 120.0, 100.0).is_none());
        assert!(prepare_iv_infusion(&registry, "morphine_iv_infusion", 120.0, 0.0).is_none());
    }
}
