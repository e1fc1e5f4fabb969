use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use paipai::core::strfile;
use paipai::engine::operators::MoveWeights;
use paipai::engine::store::StateStore;
use paipai::solvers::mc::{McConfig, McDriver};

/// Environment override for a reproducible run (decimal u64 seed).
const SEED_ENV: &str = "PAIPAI_SEED";

// --- CLI Definitions ---

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "PAIPAI: Metropolis MC over substitutional/interstitial lattices, energies from external MLIP workers",
    long_about = None
)]
struct Args {
    /// Initial structure file
    input: PathBuf,

    /// Number of fast worker slots
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    workers: u32,

    /// Number of MC trial steps to consume
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    steps: u64,

    /// Metropolis temperature (energy units; no Boltzmann constant applied)
    #[arg(long, default_value_t = 1e-3)]
    temp: f64,

    /// Weight of the metallic swap move
    #[arg(long = "p-swap-metal", default_value_t = 70)]
    p_swap_metal: u32,

    /// Weight of the interstitial swap move
    #[arg(long = "p-swap-inter", default_value_t = 30)]
    p_swap_inter: u32,

    /// Weight of the metallic exchange move
    #[arg(long = "p-exch-metal", default_value_t = 0)]
    p_exch_metal: u32,

    /// Weight of the interstitial exchange move
    #[arg(long = "p-exch-inter", default_value_t = 0)]
    p_exch_inter: u32,
}

fn seeded_rng() -> StdRng {
    match env::var(SEED_ENV).ok().and_then(|s| s.parse::<u64>().ok()) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let weights = MoveWeights {
        swap_metal: args.p_swap_metal,
        swap_inter: args.p_swap_inter,
        exch_metal: args.p_exch_metal,
        exch_inter: args.p_exch_inter,
    };
    if weights.sum() == 0 {
        eprintln!("MC move probabilities are incorrect. Please check input parameters.");
        process::exit(2);
    }

    let mut rng = seeded_rng();
    let store = StateStore::new(".");
    store.init_layout()?;

    // Seed the chain: the dispatcher reloads the accepted state from SAVE
    // on every proposal.
    let structure = strfile::read_structure(&args.input, &mut rng)?;
    store.write_atomic(&store.save_path(), &strfile::save_string(&structure))?;
    info!(
        "loaded {}: {} metallic atoms, {} interstitial sites",
        args.input.display(),
        structure.occupation.num_metal_atoms(),
        structure.occupation.num_sites()
    );

    let cfg = McConfig {
        workers: args.workers as usize,
        steps: args.steps,
        temp: args.temp,
        weights,
    };
    let mut driver = McDriver::new(store, cfg, rng);
    let summary = driver.run()?;

    println!(
        "MC finished: steps={} accepted={}",
        summary.mc_steps, summary.accept_count
    );
    Ok(())
}
