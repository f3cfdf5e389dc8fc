//! Scenekit demo runner.
//!
//! Drives an ordered [`Scene`] from a fixed-step loop using:
//! - **bevy_ecs** for the world, resources and schedules
//! - **configparser** for the INI settings file
//! - **env_logger** for log output
//!
//! # Main Loop
//!
//! 1. Load `scenekit.ini` (or `--config`), apply command-line overrides
//! 2. Build the world and register randomised members
//! 3. For each tick: advance time, run the update schedule, run the draw
//!    schedule, and every `reorder_every` ticks give a member new priorities
//! 4. Tear the scene down, releasing every member
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- --ticks 120 --members 8 --dump
//! ```

use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use scenekit::demo::{self, Spinner};
use scenekit::resources::sceneconfig::SceneConfig;
use scenekit::scene::Scene;
use scenekit::systems::time::update_world_time;

/// Ordered scene container demo
#[derive(Parser)]
#[command(version, about = "Runs a scene of randomised members for a number of ticks.")]
struct Cli {
    /// INI settings file (default: ./scenekit.ini).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of ticks to run.
    #[arg(long, value_name = "N")]
    ticks: Option<u64>,

    /// Number of demo members.
    #[arg(long, value_name = "N")]
    members: Option<u32>,

    /// Seed for the random priorities.
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// Print the final update and draw orders as JSON before teardown.
    #[arg(long)]
    dump: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SceneConfig::with_path(path),
        None => SceneConfig::new(),
    };
    let loaded = config.load_from_file();
    if let Some(ticks) = cli.ticks {
        config.ticks = ticks;
    }
    if let Some(members) = cli.members {
        config.members = members;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let filter = config.log_filter.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
    if let Err(e) = loaded {
        // Only an explicit --config is worth a warning; the default file is optional.
        if cli.config.is_some() {
            warn!("{}", e);
        }
        info!("Using default settings");
    }

    // --------------- ECS world + members ---------------
    let mut world = demo::setup_world(&config);
    let scene = world.resource::<Scene>().clone();
    let mut rng = fastrand::Rng::with_seed(config.seed);
    let spinners = match demo::spawn_members(&scene, &config, &mut rng) {
        Ok(spinners) => spinners,
        Err(e) => {
            error!("Failed to set up the scene: {}", e);
            std::process::exit(1);
        }
    };

    let mut update = demo::build_update_schedule();
    let mut draw = demo::build_draw_schedule();
    update
        .initialize(&mut world)
        .expect("Failed to initialize update schedule");
    draw.initialize(&mut world)
        .expect("Failed to initialize draw schedule");

    // --------------- Main loop ---------------
    let latecomer_tick = config.ticks / 2;
    for tick in 0..config.ticks {
        if tick == latecomer_tick {
            let latecomer = Spinner::new("latecomer", rng.i32(0..demo::PRIORITY_RANGE), 0);
            demo::defer_latecomer(&world, Arc::new(latecomer));
        }

        update_world_time(&mut world, config.fixed_delta);
        update.run(&mut world);
        draw.run(&mut world);
        world.clear_trackers();

        if config.reorder_every > 0 && (tick + 1) % config.reorder_every == 0 {
            demo::shuffle_one(&spinners, &mut rng);
        }
    }

    let total_updates: u64 = spinners.iter().map(|s| s.updates()).sum();
    let total_draws: u64 = spinners.iter().map(|s| s.draws()).sum();
    info!(
        "Ran {} tick(s): {} update call(s), {} draw call(s) across {} spinner(s)",
        config.ticks,
        total_updates,
        total_draws,
        spinners.len()
    );

    if cli.dump {
        match scene.snapshot().to_json_pretty() {
            Ok(json) => println!("{}", json),
            Err(e) => error!("{}", e),
        }
    }

    // --------------- Teardown ---------------
    if let Err(e) = scene.clear() {
        error!("Teardown: {}", e);
        for failure in e.failures() {
            error!("  {}", failure);
        }
        std::process::exit(1);
    }
    info!("Scene released");
}
