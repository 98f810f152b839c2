use clap::{Args, Parser, Subcommand};
use dose_core::*;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mmecalc")]
#[command(about = "Opioid MME conversion and dose calculator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Registry TOML replacing the built-in drug table
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Medication entries, from a CSV file and/or key=dose arguments
#[derive(Args, Default)]
struct EntryArgs {
    /// CSV file with bucket,key,dose rows
    #[arg(long)]
    entries: Option<PathBuf>,

    /// Basal entry as key=dose (repeatable)
    #[arg(long = "basal", value_name = "KEY=DOSE")]
    basal: Vec<String>,

    /// Breakthrough entry as key=dose (repeatable)
    #[arg(long = "prn", value_name = "KEY=DOSE")]
    breakthrough: Vec<String>,

    /// Rotation-basal entry as key=dose (repeatable)
    #[arg(long = "rotation-basal", value_name = "KEY=DOSE")]
    rotation_basal: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one dose to MME
    Mme {
        drug: String,
        dose: f64,
    },

    /// Aggregate entries into basal/breakthrough/total MME
    Total {
        #[command(flatten)]
        entries: EntryArgs,
    },

    /// Recommend a breakthrough (PRN) dose
    Prn {
        drug: String,

        /// Percent of the total daily MME (config default when omitted)
        #[arg(long)]
        percent: Option<f64>,

        /// Total daily MME; computed from the entries when omitted
        #[arg(long)]
        total: Option<f64>,

        #[command(flatten)]
        entries: EntryArgs,
    },

    /// Rotate the current regimen onto another drug or route
    Rotate {
        target: String,

        /// Current total MME; computed from the entries when omitted
        #[arg(long)]
        mme: Option<f64>,

        /// Cross-tolerance reduction percent
        #[arg(long, conflicts_with = "conservative")]
        reduction: Option<f64>,

        /// Use the conservative reduction from the config
        #[arg(long)]
        conservative: bool,

        #[command(flatten)]
        entries: EntryArgs,
    },

    /// Equivalent doses on every non-infusion rotation target
    Quickref {
        #[arg(long)]
        mme: Option<f64>,

        #[command(flatten)]
        entries: EntryArgs,
    },

    /// Scale unlocked basal entries by a percent, or fold PRN use into basal
    Titrate {
        #[arg(
            long,
            allow_hyphen_values = true,
            required_unless_present = "from_prn",
            conflicts_with = "from_prn"
        )]
        percent: Option<f64>,

        /// Drug key to leave unchanged (repeatable)
        #[arg(long = "lock", value_name = "KEY", conflicts_with = "from_prn")]
        locked: Vec<String>,

        /// Add half of the breakthrough MME to the basal drugs
        #[arg(long)]
        from_prn: bool,

        /// Basal drug that takes the whole PRN-based increase
        #[arg(long = "pin", value_name = "KEY", requires = "from_prn")]
        pinned: Option<String>,

        #[command(flatten)]
        entries: EntryArgs,
    },

    /// Move dose from one basal drug to another
    Balance {
        #[arg(long)]
        decrease: String,

        #[arg(long)]
        increase: String,

        #[arg(long, allow_hyphen_values = true)]
        percent: f64,

        #[command(flatten)]
        entries: EntryArgs,
    },

    /// Total daily dose from a running infusion
    Tdd {
        /// Drug amount in the bag or syringe
        #[arg(long)]
        amount: f64,

        /// Fluid volume in ml
        #[arg(long)]
        volume: f64,

        /// Infusion rate in ml/hr
        #[arg(long)]
        rate: f64,
    },

    /// Prepare a 24-hour CSCI syringe
    Csci {
        drug: String,

        #[arg(long)]
        dose: f64,

        /// Syringe size in ml
        #[arg(long, default_value_t = 30)]
        syringe: u32,

        /// Total volume to draw up in ml
        #[arg(long)]
        volume: f64,
    },

    /// Prepare a 24-hour IV infusion bag
    Iv {
        drug: String,

        #[arg(long)]
        dose: f64,

        /// Bag volume in ml
        #[arg(long, default_value_t = 100.0)]
        volume: f64,
    },

    /// Review entries for common safety concerns
    Safety {
        #[command(flatten)]
        entries: EntryArgs,
    },

    /// Inspect the drug registry
    Registry {
        #[command(subcommand)]
        command: RegistryCommand,
    },
}

#[derive(Subcommand)]
enum RegistryCommand {
    /// List drugs, rotation targets and syringes
    List,
    /// Validate the registry in use
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    dose_core::logging::init_with_level(if cli.verbose { "debug" } else { "warn" });

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let registry = load_registry(cli.registry.as_ref(), &config)?;
    let json = cli.json;

    match cli.command {
        Commands::Mme { drug, dose } => cmd_mme(&registry, &drug, dose, json),
        Commands::Total { entries } => cmd_total(&registry, &entries, json),
        Commands::Prn {
            drug,
            percent,
            total,
            entries,
        } => cmd_prn(&registry, &config, &drug, percent, total, &entries, json),
        Commands::Rotate {
            target,
            mme,
            reduction,
            conservative,
            entries,
        } => {
            let reduction = match (reduction, conservative) {
                (Some(reduction), _) => reduction,
                (None, true) => config.clinical.rotation_reduction_conservative,
                (None, false) => config.clinical.rotation_reduction_standard,
            };
            cmd_rotate(&registry, &target, mme, reduction, &entries, json)
        }
        Commands::Quickref { mme, entries } => cmd_quickref(&registry, mme, &entries, json),
        Commands::Titrate {
            percent,
            locked,
            from_prn,
            pinned,
            entries,
        } => match (from_prn, percent) {
            (true, _) => cmd_titrate_from_prn(&registry, pinned.as_deref(), &entries, json),
            (false, Some(percent)) => cmd_titrate(&registry, percent, locked, &entries, json),
            (false, None) => Err(Error::Other("titrate needs --percent or --from-prn".into())),
        },
        Commands::Balance {
            decrease,
            increase,
            percent,
            entries,
        } => cmd_balance(&registry, decrease, increase, percent, &entries, json),
        Commands::Tdd {
            amount,
            volume,
            rate,
        } => cmd_tdd(amount, volume, rate, json),
        Commands::Csci {
            drug,
            dose,
            syringe,
            volume,
        } => cmd_csci(&registry, &drug, dose, syringe, volume, json),
        Commands::Iv { drug, dose, volume } => cmd_iv(&registry, &drug, dose, volume, json),
        Commands::Safety { entries } => cmd_safety(&registry, &config, &entries, json),
        Commands::Registry { command } => cmd_registry(&registry, command, json),
    }
}

fn load_registry(cli_path: Option<&PathBuf>, config: &Config) -> Result<Cow<'static, Registry>> {
    match cli_path.or(config.registry.path.as_ref()) {
        Some(path) => Ok(Cow::Owned(Registry::load_from(path)?)),
        None => Ok(Cow::Borrowed(get_default_registry())),
    }
}

fn load_entries(args: &EntryArgs) -> Result<EntrySet> {
    let mut set = match &args.entries {
        Some(path) => read_entries_from_path(path)?,
        None => EntrySet::default(),
    };

    for (bucket, texts) in [
        (EntryBucket::Basal, &args.basal),
        (EntryBucket::Breakthrough, &args.breakthrough),
        (EntryBucket::RotationBasal, &args.rotation_basal),
    ] {
        for text in texts {
            set.push(bucket, parse_entry(text)?);
        }
    }

    // Negative doses are arithmetic-valid in the engine, so stop them here
    let all = set
        .basal
        .iter()
        .chain(&set.breakthrough)
        .chain(&set.rotation_basal);
    for entry in all {
        if entry.dose < 0.0 {
            return Err(Error::EntryFile(format!(
                "Negative dose {} for '{}'",
                entry.dose, entry.key
            )));
        }
    }

    Ok(set)
}

/// Reject negative (and NaN) numbers typed on the command line
fn non_negative(what: &str, value: f64) -> Result<f64> {
    if value >= 0.0 {
        Ok(value)
    } else {
        Err(Error::Other(format!(
            "{} must be a non-negative number, got {}",
            what, value
        )))
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_mme(registry: &Registry, drug: &str, dose: f64, json: bool) -> Result<()> {
    let def = registry
        .lookup(drug)
        .ok_or_else(|| Error::UnknownDrug(drug.to_string()))?;
    let dose = non_negative("dose", dose)?;
    let mme = mme_of(registry, drug, dose);

    if json {
        return print_json(&serde_json::json!({ "drug": drug, "dose": dose, "mme": mme }));
    }

    println!("{} {} {} = {} MME", def.name, dose, def.unit, mme);
    Ok(())
}

fn cmd_total(registry: &Registry, args: &EntryArgs, json: bool) -> Result<()> {
    let entries = load_entries(args)?;
    let breakdown = aggregate_set(registry, &entries);

    if json {
        return print_json(&breakdown);
    }

    display_breakdown(&breakdown);
    Ok(())
}

fn resolve_total(registry: &Registry, total: Option<f64>, args: &EntryArgs) -> Result<f64> {
    match total {
        Some(total) => non_negative("total MME", total),
        None => Ok(aggregate_set(registry, &load_entries(args)?).total),
    }
}

fn cmd_prn(
    registry: &Registry,
    config: &Config,
    drug: &str,
    percent: Option<f64>,
    total: Option<f64>,
    args: &EntryArgs,
    json: bool,
) -> Result<()> {
    if registry.drug(drug).map_or(true, |d| !d.is_breakthrough) {
        return Err(Error::UnknownDrug(format!("{} (not a breakthrough drug)", drug)));
    }

    let percent = percent.unwrap_or(config.clinical.prn_percent_default);
    let percent = non_negative("percent", percent)?;
    if percent < config.clinical.prn_percent_min || percent > config.clinical.prn_percent_max {
        tracing::warn!(
            "PRN percent {} is outside the usual {}-{}% range",
            percent,
            config.clinical.prn_percent_min,
            config.clinical.prn_percent_max
        );
    }

    let total = resolve_total(registry, total, args)?;
    let recommendation = recommend_breakthrough(registry, total, drug, percent);

    if json {
        return print_json(&recommendation);
    }

    match recommendation {
        Some(rec) => {
            println!("Breakthrough: {} {} {}", rec.drug, rec.dose, rec.unit);
            println!("  {}% of {} MME = {} MME", rec.percent, total, rec.target_mme);
        }
        None => println!("No total MME yet; nothing to recommend."),
    }
    Ok(())
}

fn cmd_rotate(
    registry: &Registry,
    target: &str,
    mme: Option<f64>,
    reduction: f64,
    args: &EntryArgs,
    json: bool,
) -> Result<()> {
    if registry.rotation_target(target).is_none() {
        return Err(Error::UnknownDrug(format!("{} (not a rotation target)", target)));
    }
    if !(0.0..100.0).contains(&reduction) {
        return Err(Error::Other(format!(
            "reduction must be in [0, 100), got {}",
            reduction
        )));
    }

    let current = resolve_total(registry, mme, args)?;
    let result = rotate(registry, target, current, reduction);

    if json {
        return print_json(&result);
    }

    match result {
        Some(result) => display_rotation(&result),
        None => println!("No current MME; nothing to rotate."),
    }
    Ok(())
}

fn cmd_quickref(registry: &Registry, mme: Option<f64>, args: &EntryArgs, json: bool) -> Result<()> {
    let total = resolve_total(registry, mme, args)?;
    let table = quick_reference(registry, total);

    if json {
        return print_json(&table);
    }

    println!("Equivalents for {} MME (no reduction):", total);
    for row in &table {
        println!("  {:<24} {} {}", row.drug, row.dose, row.unit);
    }
    Ok(())
}

fn cmd_titrate(
    registry: &Registry,
    percent: f64,
    locked: Vec<String>,
    args: &EntryArgs,
    json: bool,
) -> Result<()> {
    let entries = load_entries(args)?;
    let locked: BTreeSet<String> = locked.into_iter().collect();
    let adjusted = adjust_by_percentage(registry, &entries.basal, percent, &locked);

    let after = EntrySet {
        basal: adjusted,
        ..entries.clone()
    };
    display_adjustment(registry, &entries, &after, json)
}

fn cmd_titrate_from_prn(
    registry: &Registry,
    pinned: Option<&str>,
    args: &EntryArgs,
    json: bool,
) -> Result<()> {
    let entries = load_entries(args)?;
    if let Some(key) = pinned {
        if !entries.basal.iter().any(|e| e.key == key) {
            return Err(Error::UnknownDrug(format!("{} (not among the basal entries)", key)));
        }
    }

    let after = EntrySet {
        basal: adjust_from_prn(registry, &entries.basal, &entries.breakthrough, pinned),
        ..entries.clone()
    };
    display_adjustment(registry, &entries, &after, json)
}

fn cmd_balance(
    registry: &Registry,
    decrease: String,
    increase: String,
    percent: f64,
    args: &EntryArgs,
    json: bool,
) -> Result<()> {
    let pair = BalancePair::new(decrease, increase)
        .ok_or_else(|| Error::Other("--decrease and --increase must be different drugs".into()))?;

    let entries = load_entries(args)?;
    let after = EntrySet {
        basal: adjust_balance(registry, &entries.basal, &pair, percent),
        ..entries.clone()
    };
    display_adjustment(registry, &entries, &after, json)
}

fn cmd_tdd(amount: f64, volume: f64, rate: f64, json: bool) -> Result<()> {
    let amount = non_negative("amount", amount)?;
    let volume = non_negative("volume", volume)?;
    let rate = non_negative("rate", rate)?;
    let tdd = tdd_from_rate(amount, volume, rate);

    if json {
        return print_json(&serde_json::json!({ "tdd": tdd }));
    }

    println!("Total daily dose: {}", tdd);
    Ok(())
}

fn require_stock(registry: &Registry, drug: &str) -> Result<()> {
    match registry.rotation_target(drug).and_then(|d| d.drug_info.as_ref()) {
        Some(_) => Ok(()),
        None => Err(Error::UnknownDrug(format!("{} (no stock concentration)", drug))),
    }
}

fn cmd_csci(
    registry: &Registry,
    drug: &str,
    dose: f64,
    syringe: u32,
    volume: f64,
    json: bool,
) -> Result<()> {
    let dose = non_negative("dose", dose)?;
    let volume = non_negative("volume", volume)?;
    require_stock(registry, drug)?;

    let result = prepare_csci(registry, drug, dose, syringe, volume)
        .ok_or_else(|| Error::Other("CSCI needs a dose above 0".into()))?;

    if json {
        print_json(&result)?;
    }
    let prep = result.into_result()?;
    if json {
        return Ok(());
    }

    println!("CSCI {} ({} ml syringe)", prep.drug, prep.syringe_size_ml);
    println!("  Drug volume:    {} ml", prep.drug_volume);
    println!("  Diluent (NSS):  {} ml", prep.diluent_volume);
    println!("  Rate:           {} ml/hr", prep.rate_ml_per_hr);
    println!("  Rate:           {} mm/hr", prep.rate_mm_per_hr);
    println!("  MME:            {}", mme_of(registry, drug, dose));
    println!();
    println!("  {}", prep.order_text);
    Ok(())
}

fn cmd_iv(registry: &Registry, drug: &str, dose: f64, volume: f64, json: bool) -> Result<()> {
    let dose = non_negative("dose", dose)?;
    let volume = non_negative("volume", volume)?;
    require_stock(registry, drug)?;

    let prep = prepare_iv_infusion(registry, drug, dose, volume).ok_or_else(|| {
        Error::Other("IV infusion needs a dose and a bag volume above 0".into())
    })?;

    if json {
        return print_json(&prep);
    }

    println!("IV infusion {}", prep.drug);
    println!("  Drug volume:    {} ml", prep.drug_volume);
    println!("  Concentration:  {} {}", prep.concentration, prep.concentration_unit);
    println!("  Dose:           {} {}", prep.dose_per_hour, prep.dose_unit);
    println!("  MME:            {}", mme_of(registry, drug, dose));
    println!();
    println!("  {}", prep.order_text);
    Ok(())
}

fn cmd_safety(registry: &Registry, config: &Config, args: &EntryArgs, json: bool) -> Result<()> {
    let entries = load_entries(args)?;
    let report = review_safety(registry, &entries, &config.safety);

    if json {
        return print_json(&report);
    }

    if report.is_clear() {
        println!("No safety warnings.");
    }
    for warning in &report.warnings {
        println!("⚠ {}", warning);
    }
    Ok(())
}

fn cmd_registry(registry: &Registry, command: RegistryCommand, json: bool) -> Result<()> {
    match command {
        RegistryCommand::List => {
            if json {
                return print_json(registry);
            }
            println!("Drugs:");
            for (key, def) in &registry.drugs {
                let roles = match (def.is_basal, def.is_breakthrough) {
                    (true, true) => "basal, prn",
                    (true, false) => "basal",
                    (false, true) => "prn",
                    (false, false) => "-",
                };
                println!("  {:<22} {:<24} {:<10} {}", key, def.name, def.unit, roles);
            }
            println!("Rotation targets:");
            for (key, def) in &registry.rotation_targets {
                println!("  {:<22} {:<24} {}", key, def.name, def.unit);
            }
            println!("Syringes:");
            for syringe in &registry.syringes {
                println!(
                    "  {} {} ml: {} mm",
                    syringe.brand, syringe.size_ml, syringe.plunger_travel_mm
                );
            }
            Ok(())
        }
        RegistryCommand::Validate => {
            let errors = registry.validate();
            if json {
                print_json(&errors)?;
            } else if errors.is_empty() {
                println!("✓ Registry is valid");
            } else {
                eprintln!("Registry validation errors:");
                for error in &errors {
                    eprintln!("  - {}", error);
                }
            }
            if errors.is_empty() {
                Ok(())
            } else {
                Err(Error::RegistryValidation(format!("{} problem(s)", errors.len())))
            }
        }
    }
}

fn display_breakdown(breakdown: &MmeBreakdown) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  TOTAL MME: {}", breakdown.total);
    println!("╰─────────────────────────────────────────╯");
    println!("  Basal:        {}", breakdown.basal);
    println!("  Breakthrough: {}", breakdown.breakthrough);
    println!("  PRN ratio:    {}%", breakdown.breakthrough_ratio);
    println!();
}

fn display_rotation(result: &RotationResult) {
    println!("Rotate to {}: {} {}", result.drug, result.dose, result.unit);
    println!(
        "  {} MME -{}% = {} MME",
        result.original_mme, result.reduction_percent, result.reduced_mme
    );
    match result.helper {
        Some(InfusionHelper::Csci) => println!(
            "  Next: mmecalc csci {} --dose {} --volume <ml>",
            result.key, result.dose
        ),
        Some(InfusionHelper::IvInfusion) => {
            println!("  Next: mmecalc iv {} --dose {}", result.key, result.dose)
        }
        None => {}
    }
}

#[derive(Serialize)]
struct Adjustment<'a> {
    before: &'a [MedicationEntry],
    after: &'a [MedicationEntry],
    mme_before: MmeBreakdown,
    mme_after: MmeBreakdown,
}

fn display_adjustment(
    registry: &Registry,
    before: &EntrySet,
    after: &EntrySet,
    json: bool,
) -> Result<()> {
    let adjustment = Adjustment {
        before: &before.basal,
        after: &after.basal,
        mme_before: aggregate_set(registry, before),
        mme_after: aggregate_set(registry, after),
    };

    if json {
        return print_json(&adjustment);
    }

    for (old, new) in before.basal.iter().zip(&after.basal) {
        println!("  {:<22} {} -> {}", old.key, old.dose, new.dose);
    }
    println!(
        "  Total MME {} -> {}",
        adjustment.mme_before.total, adjustment.mme_after.total
    );
    Ok(())
}
