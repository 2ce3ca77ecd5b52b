//! Headless Battle Simulator
//!
//! Runs seeded combats between two armies built from a unit catalog and
//! prints win ratios and mean losses.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use strategos::combat::{
    Combat, CombatEventLog, CombatOutcome, CombatSettings, RollMode, UnitStack,
};
use strategos::core::config::GameConfig;
use strategos::core::error::{GameError, Result};
use strategos::core::types::ProvinceId;
use strategos::units::{Unit, UnitCatalog};

/// Headless Battle Simulator - repeated seeded combats between two armies
#[derive(Parser, Debug)]
#[command(name = "battle_sim")]
#[command(about = "Simulate combats between two armies and report the odds")]
struct Args {
    /// Unit catalog (TOML)
    #[arg(long, default_value = "data/units.toml")]
    catalog: PathBuf,

    /// Game configuration (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Attacking units as Name:quantity, repeatable
    #[arg(long, short = 'a', required = true)]
    attacker: Vec<String>,

    /// Defending units as Name:quantity, repeatable
    #[arg(long, short = 'd')]
    defender: Vec<String>,

    /// Number of combats to run
    #[arg(long, default_value_t = 100)]
    runs: u32,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Resolve attacks with expected damage instead of dice
    #[arg(long)]
    estimated: bool,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Print the event log of the first combat
    #[arg(long)]
    trace: bool,

    /// Verbose logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// JSON output structure
#[derive(Serialize)]
struct SimulationReport {
    runs: u32,
    seed: u64,
    attacker_victories: u32,
    defender_victories: u32,
    draws: u32,
    stalemates: u32,
    win_ratio: f64,
    mean_attacker_loss: f64,
    mean_defender_loss: f64,
    mean_turns: f64,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "strategos=debug"
    } else {
        "strategos=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    config.validate()?;
    let catalog = UnitCatalog::load(&args.catalog)?;

    let attackers = build_army(&catalog, &args.attacker)?;
    let defenders = build_army(&catalog, &args.defender)?;
    let attacker_cost: u64 = attackers.iter().map(UnitStack::training_cost).sum();
    let defender_cost: u64 = defenders.iter().map(UnitStack::training_cost).sum();

    let mode = if args.estimated {
        RollMode::Estimated
    } else {
        RollMode::Live
    };
    let settings = CombatSettings::new(&config.combat)?.with_mode(mode);
    let seed = args.seed.unwrap_or_else(rand::random);

    tracing::info!(
        "Simulating {} combats: {} attacking stacks vs {} defending stacks",
        args.runs,
        attackers.len(),
        defenders.len()
    );

    let mut report = SimulationReport {
        runs: args.runs,
        seed,
        attacker_victories: 0,
        defender_victories: 0,
        draws: 0,
        stalemates: 0,
        win_ratio: 0.0,
        mean_attacker_loss: 0.0,
        mean_defender_loss: 0.0,
        mean_turns: 0.0,
    };
    let mut attacker_loss = 0u64;
    let mut defender_loss = 0u64;
    let mut turns = 0u64;

    for run in 0..args.runs {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(run as u64));
        let mut combat = Combat::new(
            ProvinceId(0),
            attackers.iter().map(UnitStack::clone_for_simulation).collect(),
            defenders.iter().map(UnitStack::clone_for_simulation).collect(),
            settings.clone(),
        );

        let mut log = CombatEventLog::new();
        let outcome = if args.trace && run == 0 {
            combat.resolve_combat(&mut rng, &mut log)
        } else {
            combat.resolve_combat(&mut rng, &mut ())
        };
        if !log.is_empty() {
            println!("{}", serde_json::to_string_pretty(&log.events)?);
        }

        match outcome {
            CombatOutcome::AttackerVictory => report.attacker_victories += 1,
            CombatOutcome::DefenderVictory | CombatOutcome::Retreat => {
                report.defender_victories += 1
            }
            CombatOutcome::Draw => report.draws += 1,
            CombatOutcome::Stalemate => report.stalemates += 1,
        }
        let surviving_attackers: u64 = combat.attackers().iter().map(UnitStack::training_cost).sum();
        let surviving_defenders: u64 = combat.defenders().iter().map(UnitStack::training_cost).sum();
        attacker_loss += attacker_cost.saturating_sub(surviving_attackers);
        defender_loss += defender_cost.saturating_sub(surviving_defenders);
        turns += combat.turn() as u64;
    }

    let n = args.runs.max(1) as f64;
    report.win_ratio = report.attacker_victories as f64 / n;
    report.mean_attacker_loss = attacker_loss as f64 / n;
    report.mean_defender_loss = defender_loss as f64 / n;
    report.mean_turns = turns as f64 / n;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Runs:               {} (seed {})", report.runs, report.seed);
        println!("Attacker victories: {}", report.attacker_victories);
        println!("Defender victories: {}", report.defender_victories);
        println!("Draws:              {}", report.draws);
        println!("Stalemates:         {}", report.stalemates);
        println!("Win ratio:          {:.3}", report.win_ratio);
        println!("Mean attacker loss: {:.1}", report.mean_attacker_loss);
        println!("Mean defender loss: {:.1}", report.mean_defender_loss);
        println!("Mean turns:         {:.1}", report.mean_turns);
    }
    Ok(())
}

/// Parse `Name:quantity` entries into full-health stacks
fn build_army(catalog: &UnitCatalog, entries: &[String]) -> Result<Vec<UnitStack>> {
    entries
        .iter()
        .map(|entry| {
            let (name, quantity) = entry.rsplit_once(':').ok_or_else(|| {
                GameError::InvalidConfig(format!("expected Name:quantity, got '{}'", entry))
            })?;
            let quantity: u32 = quantity.trim().parse().map_err(|_| {
                GameError::InvalidConfig(format!("bad quantity in '{}'", entry))
            })?;
            let unit_type = catalog.require(name.trim())?;
            Ok(UnitStack::new(Unit::new(unit_type, quantity)))
        })
        .collect()
}
