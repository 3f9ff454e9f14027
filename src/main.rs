use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use hunt_odds::{
    Config, EligibilityTag, HuntOddsError, HuntQuery, HuntRecord, HuntRecordStore, QueryEngine,
    WeaponCode,
};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("hunt-odds")
        .version("0.1.0")
        .about("Computes and queries big-game license draw odds")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("hunt-odds.toml")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("More log output, repeat for more (-v, -vv, -vvv)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("init-config")
                .about("Write the default configuration file")
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("Overwrite an existing file")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("normalize")
                .about("Normalize a raw odds report into the hunt snapshot")
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .value_name("FILE")
                        .help("Raw report, CSV or xlsx/xls/ods (defaults to files.raw_report)"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Snapshot CSV to write (defaults to files.snapshot)"),
                )
                .arg(
                    Arg::new("header-row")
                        .long("header-row")
                        .value_name("INDEX")
                        .help("Zero-based row holding the column names")
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("lookup")
                .about("Show the draw chance for one hunt code")
                .arg(
                    Arg::new("hunt_code")
                        .value_name("HUNT_CODE")
                        .help("Hunt code, e.g. ANT-1-101")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("query")
                .about("List hunts filtered by species, weapon and eligibility")
                .arg(
                    Arg::new("species")
                        .short('s')
                        .long("species")
                        .value_name("PREFIX")
                        .help("Hunt code prefix, e.g. ANT or ELK"),
                )
                .arg(
                    Arg::new("weapon")
                        .short('w')
                        .long("weapon")
                        .value_name("WEAPON")
                        .help("any-legal (1), bow (2) or muzzle-loader (3)")
                        .value_parser(|s: &str| s.parse::<WeaponCode>()),
                )
                .arg(
                    Arg::new("keep")
                        .long("keep")
                        .value_name("TAG")
                        .help("Keep hunts tagged private-land, youth, mobility-impaired or military")
                        .action(ArgAction::Append)
                        .value_parser(|s: &str| s.parse::<EligibilityTag>()),
                )
                .arg(
                    Arg::new("remove")
                        .long("remove")
                        .value_name("TAG")
                        .help("Remove hunts carrying this eligibility tag")
                        .action(ArgAction::Append)
                        .value_parser(|s: &str| s.parse::<EligibilityTag>()),
                )
                .arg(
                    Arg::new("sort")
                        .long("sort")
                        .value_name("ORDER")
                        .help("Sort by hunt odds (highest first) or by hunt code")
                        .value_parser(["odds", "code"]),
                )
                .arg(
                    Arg::new("export")
                        .short('e')
                        .long("export")
                        .value_name("FILE")
                        .help("Also write the results to a CSV file"),
                ),
        )
        .subcommand(Command::new("species").about("List known species and their hunt counts"))
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let filter = match matches.get_count("verbose") {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("hunt-odds.toml");

    match matches.subcommand() {
        Some(("init-config", sub)) => init_config(config_file, sub.get_flag("force")),
        Some(("normalize", sub)) => run_normalize(&load_config(config_file)?, sub),
        Some(("lookup", sub)) => run_lookup(&load_config(config_file)?, sub),
        Some(("query", sub)) => run_query(&load_config(config_file)?, sub),
        Some(("species", _)) => run_species(&load_config(config_file)?),
        other => unreachable!(
            "clap accepted an unknown subcommand: {:?}",
            other.map(|(name, _)| name)
        ),
    }
}

fn init_config(config_file: &str, force: bool) -> Result<()> {
    if Path::new(config_file).exists() && !force {
        println!("⚠️  {} already exists, use --force to overwrite it", config_file);
        return Ok(());
    }
    Config::default()
        .save_to_file(config_file)
        .with_context(|| format!("Failed to write configuration: {}", config_file))?;
    println!("📝 Wrote default configuration file: {}", config_file);
    Ok(())
}

fn load_config(config_file: &str) -> Result<Config> {
    if Path::new(config_file).exists() {
        tracing::info!(path = config_file, "loading configuration");
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to load configuration: {}", config_file))
    } else {
        tracing::info!(path = config_file, "no configuration file, using defaults");
        Ok(Config::default())
    }
}

fn open_store(config: &Config) -> Result<HuntRecordStore> {
    HuntRecordStore::open(&config.files, &config.report).with_context(|| {
        format!(
            "Failed to load hunt data (snapshot {}, raw report {})",
            config.files.snapshot, config.files.raw_report
        )
    })
}

fn run_normalize(config: &Config, sub: &ArgMatches) -> Result<()> {
    let input = sub
        .get_one::<String>("input")
        .unwrap_or(&config.files.raw_report);
    let output = sub
        .get_one::<String>("output")
        .unwrap_or(&config.files.snapshot);
    let mut layout = config.report.clone();
    if let Some(&header_row) = sub.get_one::<usize>("header-row") {
        layout.header_row = header_row;
    }

    println!("📄 Processing raw report: {}", input);
    let store = HuntRecordStore::from_raw_report(input, &layout)
        .with_context(|| format!("Failed to normalize report: {}", input))?;
    println!("   ✅ Normalized {} hunt records", store.len());

    store
        .save_snapshot(output)
        .with_context(|| format!("Failed to write snapshot: {}", output))?;
    println!("💾 Snapshot written to: {}", output);
    Ok(())
}

fn run_lookup(config: &Config, sub: &ArgMatches) -> Result<()> {
    let hunt_code = sub
        .get_one::<String>("hunt_code")
        .map(String::as_str)
        .unwrap_or_default();
    let store = open_store(config)?;

    match QueryEngine::new(&store).lookup(hunt_code) {
        Ok(line) => println!("🎯 {}", line),
        Err(HuntOddsError::CodeNotFound { code }) => {
            println!("❓ Hunt Code {} not found. Please try again.", code);
        }
        Err(HuntOddsError::DivisionGuard) => {
            println!("❌ Error: Cannot divide by zero (rTot value is 0).");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn build_query(config: &Config, sub: &ArgMatches) -> HuntQuery {
    let mut query = config.query.clone();
    if let Some(species) = sub.get_one::<String>("species") {
        query.species_prefix = species.clone();
    }
    if let Some(&weapon) = sub.get_one::<WeaponCode>("weapon") {
        query.weapon = weapon;
    }
    for &tag in sub.get_many::<EligibilityTag>("keep").into_iter().flatten() {
        query.set_removal(tag, false);
    }
    for &tag in sub.get_many::<EligibilityTag>("remove").into_iter().flatten() {
        query.set_removal(tag, true);
    }
    if let Some(order) = sub.get_one::<String>("sort") {
        query.sort_by_odds = order == "odds";
    }
    query
}

fn run_query(config: &Config, sub: &ArgMatches) -> Result<()> {
    let query = build_query(config, sub);
    let store = open_store(config)?;
    let results = QueryEngine::new(&store).run(&query);

    if results.is_empty() {
        println!(
            "ℹ️ No results found for hunt codes starting with '{}' and weapon type {}.",
            query.species_prefix, query.weapon
        );
    } else {
        print_results(config, &query, &results);
    }

    if let Some(export) = sub.get_one::<String>("export") {
        export_results(&results, export)?;
        println!("📂 Results exported to: {}", export);
    }
    Ok(())
}

fn print_results(config: &Config, query: &HuntQuery, results: &[HuntRecord]) {
    let species = config
        .species_name(&query.species_prefix)
        .unwrap_or(&query.species_prefix);
    println!("\n🎯 Filtered Hunt Results: {} / {}", species, query.weapon.label());
    let removed: Vec<String> = query.removed_tags().iter().map(|t| t.to_string()).collect();
    if !removed.is_empty() {
        println!("🚫 Removed: {}", removed.join(", "));
    }
    println!("{}", "-".repeat(72));
    println!("{:<12} {:>11}  {}", "Hunt Code", "Hunt Odds %", "Description");
    for record in results {
        println!(
            "{:<12} {:>11.4}  {}",
            record.hunt_code, record.hunt_odds, record.unit_description
        );
    }
    println!("{}", "-".repeat(72));
    println!("{} hunts", results.len());
}

fn export_results(results: &[HuntRecord], output: &str) -> Result<()> {
    use csv::Writer;

    let mut writer = Writer::from_path(output)
        .with_context(|| format!("Failed to create export file: {}", output))?;
    if results.is_empty() {
        writer.write_record(["huntCode", "unitDescription", "huntOdds"])?;
    }
    for record in results {
        writer.serialize(record.summary())?;
    }
    writer.flush()?;
    Ok(())
}

fn run_species(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    println!("🦌 Species in {} ({} hunts total):", config.files.snapshot, store.len());
    for species in &config.species_catalog {
        println!(
            "   {}  {:<16} {} hunts",
            species.prefix,
            species.name,
            store.count_species(&species.prefix)
        );
    }
    Ok(())
}
