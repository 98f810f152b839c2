//! Default drug registry and registry loading.
//!
//! This module provides the built-in potency table, rotation targets and
//! syringe geometry, plus lookup and validation over any registry.

use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::path::Path;

/// Cached default registry - built once and shared read-only across callers
static DEFAULT_REGISTRY: Lazy<Registry> = Lazy::new(build_default_registry_internal);

/// Get a reference to the cached default registry
pub fn get_default_registry() -> &'static Registry {
    &DEFAULT_REGISTRY
}

/// Builds the default registry
///
/// **Note**: For production use, prefer `get_default_registry()` which returns a
/// cached reference. This function is retained for tests that need an owned,
/// modifiable copy.
pub fn build_default_registry() -> Registry {
    build_default_registry_internal()
}

fn build_default_registry_internal() -> Registry {
    let mut drugs = BTreeMap::new();
    let mut rotation_targets = BTreeMap::new();

    // ========================================================================
    // Dosing table (basal and breakthrough)
    // ========================================================================

    drugs.insert(
        "fentanyl_patch".into(),
        DrugDefinition {
            step: Some(12.5),
            is_basal: true,
            form: Some(DrugForm::Patch),
            ..DrugDefinition::new("Fentanyl Patch", 2.4, "mcg/hr")
        },
    );

    for (key, name, strength) in [("mst_10", "MST 10mg", 10.0), ("mst_30", "MST 30mg", 30.0)] {
        drugs.insert(
            key.into(),
            DrugDefinition {
                strength: Some(strength),
                step: Some(1.0),
                is_basal: true,
                form: Some(DrugForm::Oral),
                ..DrugDefinition::new(name, 1.0, "tab/day")
            },
        );
    }

    drugs.insert(
        "kapanol_20".into(),
        DrugDefinition {
            strength: Some(20.0),
            step: Some(1.0),
            is_basal: true,
            form: Some(DrugForm::Oral),
            ..DrugDefinition::new("Kapanol 20mg", 1.0, "cap/day")
        },
    );

    drugs.insert(
        "morphine_iv_sc".into(),
        DrugDefinition {
            is_basal: true,
            is_breakthrough: true,
            form: Some(DrugForm::Injectable),
            ..DrugDefinition::new("Morphine IV/SC", 3.0, "mg/day")
        },
    );

    drugs.insert(
        "fentanyl_iv_sc".into(),
        DrugDefinition {
            is_basal: true,
            is_breakthrough: true,
            form: Some(DrugForm::Injectable),
            ..DrugDefinition::new("Fentanyl IV/SC", 0.3, "mcg/day")
        },
    );

    drugs.insert(
        "morphine_ir_tab_10".into(),
        DrugDefinition {
            strength: Some(10.0),
            step: Some(1.0),
            is_breakthrough: true,
            form: Some(DrugForm::Oral),
            ..DrugDefinition::new("Morphine IR 10mg", 1.0, "tab/day")
        },
    );

    // Syrup is dosed in mL, so no step: any volume can be measured
    drugs.insert(
        "morphine_syrup".into(),
        DrugDefinition {
            strength: Some(2.0),
            is_breakthrough: true,
            form: Some(DrugForm::Oral),
            ..DrugDefinition::new("Morphine Syrup 2mg/ml", 1.0, "mL/day")
        },
    );

    // ========================================================================
    // Rotation targets
    // ========================================================================

    rotation_targets.insert(
        "fentanyl_patch".into(),
        DrugDefinition {
            allowed_doses: Some(vec![12.5, 25.0, 50.0, 75.0, 100.0]),
            ..DrugDefinition::new("Fentanyl Patch", 2.4, "mcg/hr")
        },
    );

    rotation_targets.insert(
        "morphine_sr".into(),
        DrugDefinition::new("Morphine SR", 1.0, "mg/day"),
    );

    let morphine_stock = DrugInfo {
        name: "Morphine".into(),
        concentration: 10.0,
        unit: ConcentrationUnit::MgPerMl,
    };
    let fentanyl_stock = DrugInfo {
        name: "Fentanyl".into(),
        concentration: 50.0,
        unit: ConcentrationUnit::McgPerMl,
    };

    let infusion_targets = [
        ("morphine_iv_infusion", "Morphine (IV Infusion)", 3.0, "mg/day", InfusionHelper::IvInfusion, &morphine_stock),
        ("fentanyl_iv_infusion", "Fentanyl (IV Infusion)", 0.3, "mcg/day", InfusionHelper::IvInfusion, &fentanyl_stock),
        ("morphine_csci", "Morphine (CSCI)", 3.0, "mg/day", InfusionHelper::Csci, &morphine_stock),
        ("fentanyl_csci", "Fentanyl (CSCI)", 0.3, "mcg/day", InfusionHelper::Csci, &fentanyl_stock),
    ];

    for (key, name, factor, unit, helper, stock) in infusion_targets {
        rotation_targets.insert(
            key.into(),
            DrugDefinition {
                helper: Some(helper),
                drug_info: Some(stock.clone()),
                ..DrugDefinition::new(name, factor, unit)
            },
        );
    }

    // ========================================================================
    // Syringe geometry (BD barrels)
    // ========================================================================

    let syringes = [(20, 88.0), (30, 87.5), (50, 123.0)]
        .into_iter()
        .map(|(size_ml, plunger_travel_mm)| SyringeGeometry {
            brand: "BD".into(),
            size_ml,
            plunger_travel_mm,
        })
        .collect();

    Registry {
        drugs,
        rotation_targets,
        syringes,
    }
}

impl Registry {
    /// Look a key up for MME conversion: dosing table first, then rotation targets
    pub fn lookup(&self, key: &str) -> Option<&DrugDefinition> {
        self.drugs
            .get(key)
            .or_else(|| self.rotation_targets.get(key))
    }

    /// Dosing-table drug only
    pub fn drug(&self, key: &str) -> Option<&DrugDefinition> {
        self.drugs.get(key)
    }

    /// Rotation-table drug only
    pub fn rotation_target(&self, key: &str) -> Option<&DrugDefinition> {
        self.rotation_targets.get(key)
    }

    /// Geometry for a barrel size
    pub fn syringe(&self, size_ml: u32) -> Option<&SyringeGeometry> {
        self.syringes.iter().find(|s| s.size_ml == size_ml)
    }

    /// Load a registry from a TOML file and reject it if it does not validate
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let registry: Registry = toml::from_str(&contents)?;

        let errors = registry.validate();
        if !errors.is_empty() {
            return Err(Error::RegistryValidation(errors.join("; ")));
        }

        tracing::info!(
            "Loaded registry from {:?} ({} drugs, {} rotation targets)",
            path,
            registry.drugs.len(),
            registry.rotation_targets.len()
        );
        Ok(registry)
    }

    /// Validate the registry for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (table, entries) in [("drug", &self.drugs), ("rotation target", &self.rotation_targets)] {
            for (key, def) in entries {
                validate_definition(table, key, def, &mut errors);
            }
        }

        for (key, def) in &self.drugs {
            if !def.is_basal && !def.is_breakthrough {
                errors.push(format!(
                    "Drug '{}' is neither basal nor breakthrough",
                    key
                ));
            }
        }

        for syringe in &self.syringes {
            if syringe.size_ml == 0 {
                errors.push(format!("Syringe '{}' has zero size", syringe.brand));
            }
            if !(syringe.plunger_travel_mm > 0.0) {
                errors.push(format!(
                    "Syringe {} {}ml has non-positive plunger travel {}",
                    syringe.brand, syringe.size_ml, syringe.plunger_travel_mm
                ));
            }
        }

        errors
    }
}

fn validate_definition(table: &str, key: &str, def: &DrugDefinition, errors: &mut Vec<String>) {
    if key.is_empty() {
        errors.push(format!("A {} has an empty key", table));
    }
    if def.name.is_empty() {
        errors.push(format!("{} '{}' has empty name", table, key));
    }
    // Written as a negation so NaN is caught too
    if !(def.factor > 0.0) {
        errors.push(format!("{} '{}': factor {} must be > 0", table, key, def.factor));
    }
    if let Some(strength) = def.strength {
        if !(strength > 0.0) {
            errors.push(format!("{} '{}': strength {} must be > 0", table, key, strength));
        }
    }
    if let Some(step) = def.step {
        if !(step > 0.0) {
            errors.push(format!("{} '{}': step {} must be > 0", table, key, step));
        }
    }
    if let Some(allowed) = &def.allowed_doses {
        if allowed.is_empty() {
            errors.push(format!("{} '{}': allowed doses list is empty", table, key));
        }
        if allowed.windows(2).any(|pair| !(pair[0] < pair[1])) {
            errors.push(format!(
                "{} '{}': allowed doses must be strictly ascending",
                table, key
            ));
        }
    }
    if let Some(info) = &def.drug_info {
        if !(info.concentration > 0.0) {
            errors.push(format!(
                "{} '{}': concentration {} must be > 0",
                table, key, info.concentration
            ));
        }
    }
    if def.helper.is_some() && def.drug_info.is_none() {
        errors.push(format!(
            "{} '{}' names an infusion helper but has no drug info",
            table, key
        ));
    }
}
