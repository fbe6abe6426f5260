//! gantry CLI - physics demo runner
//!
//! Drops a character onto a pair of static quads and prints its position at
//! every accepted simulation step.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gantry_physics::{CollisionFlags, EngineConfig, PhysicsEngine};
use nalgebra::{UnitQuaternion, Vector3};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gantry")]
#[command(about = "Fixed-frequency physics demo over Rapier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo scene
    Run {
        /// TOML engine configuration (defaults are used if omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Simulation frequency in Hz
        #[arg(short, long, default_value_t = 60.0)]
        frequency: f32,
        /// Number of simulation steps to run
        #[arg(short, long, default_value_t = 120)]
        steps: u32,
        /// Print one JSON object per step instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file and print the effective values
    CheckConfig {
        /// TOML engine configuration
        file: PathBuf,
    },
}

/// One line of demo output.
#[derive(Serialize)]
struct StepSample {
    step: u32,
    elapsed: f32,
    position: [f32; 3],
    grounded: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            frequency,
            steps,
            json,
        } => {
            let config = load_config(config.as_ref())?;
            run_demo(config, frequency, steps, json)?;
        }
        Commands::CheckConfig { file } => {
            check_config(&file)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn run_demo(config: EngineConfig, frequency: f32, steps: u32, json: bool) -> Result<()> {
    log::info!("running {} steps at {} Hz", steps, frequency);
    let mut engine = PhysicsEngine::initialize(config)?;

    let character = engine.create_character_controller(Vector3::zeros(), 1.25, 0.2)?;

    let vertices: [[f32; 3]; 4] = [
        [-1.0, 0.0, -1.0],
        [-1.0, 0.0, 1.0],
        [1.0, 0.0, -1.0],
        [1.0, 0.0, 1.0],
    ];
    let indices: [u32; 6] = [3, 2, 0, 3, 0, 1];
    let mesh = engine.create_triangle_mesh(&vertices, &indices)?;

    engine.create_static_mesh(
        mesh,
        Vector3::new(0.0, -2.5, 0.0),
        UnitQuaternion::identity(),
        Vector3::new(5.0, 1.0, 5.0),
    )?;
    engine.create_static_mesh(
        mesh,
        Vector3::new(1.0, -4.0, 0.0),
        UnitQuaternion::identity(),
        Vector3::new(8.0, 1.0, 8.0),
    )?;

    let mut step = 0;
    while step < steps {
        let mut flags = CollisionFlags::empty();
        let mut move_error = None;
        let stepped = engine.simulate_fixed_frequency_with(frequency, |engine, dt| {
            match engine.move_character(character, Vector3::new(0.07, 0.0, 0.0), dt, true) {
                Ok(result) => flags = result,
                Err(e) => move_error = Some(e),
            }
        })?;
        if let Some(e) = move_error {
            return Err(e.into());
        }

        let Some(elapsed) = stepped else {
            std::thread::yield_now();
            continue;
        };
        step += 1;

        let position = engine.character(character)?.position();
        let sample = StepSample {
            step,
            elapsed,
            position: position.into(),
            grounded: flags.contains(CollisionFlags::DOWN),
        };

        if json {
            println!("{}", serde_json::to_string(&sample)?);
        } else {
            println!(
                "{:>4}  dt={:.4}  {:.3} {:.3} {:.3}{}",
                sample.step,
                sample.elapsed,
                position.x,
                position.y,
                position.z,
                if sample.grounded { "  grounded" } else { "" }
            );
        }
    }

    Ok(())
}

fn check_config(file: &PathBuf) -> Result<()> {
    let config = EngineConfig::load(file)
        .with_context(|| format!("loading configuration {}", file.display()))?;

    println!("configuration: {}", file.display());
    println!("  Threads: {}", config.thread_count);
    println!(
        "  Gravity: [{}, {}, {}]",
        config.gravity[0], config.gravity[1], config.gravity[2]
    );
    println!(
        "  Material: friction {}, restitution {}",
        config.material.friction, config.material.restitution
    );
    println!(
        "  Character: min move {}, max slope {} deg, snap to ground {}",
        config.character.min_move_distance,
        config.character.max_slope_climb_deg,
        config.character.snap_to_ground
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["gantry", "run"]).unwrap();
        match cli.command {
            Commands::Run {
                config,
                frequency,
                steps,
                json,
            } => {
                assert!(config.is_none());
                assert_eq!(frequency, 60.0);
                assert_eq!(steps, 120);
                assert!(!json);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_check_config() {
        let cli = Cli::try_parse_from(["gantry", "check-config", "engine.toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::CheckConfig { file } if file == PathBuf::from("engine.toml")
        ));
    }

    #[test]
    fn test_load_config_default() {
        let config = load_config(None).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_run_demo_short() {
        run_demo(EngineConfig::default(), 1000.0, 3, true).unwrap();
    }
}
