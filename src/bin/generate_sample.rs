//! Writes a synthetic tracked-marker dataset (`conID,tstID,poiID,x,y`) for
//! trying out the pipeline.
//!
//! Every configuration is one rally on a 23.77 m × 10.97 m court: each point
//! starts at a fixed court position and random-walks from timestamp to
//! timestamp, clamped to the court.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pdp_runner::data::buffer::round2;
use pdp_runner::data::loader::write_dataset;
use pdp_runner::data::model::Record;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const COURT_LENGTH: f64 = 23.77;
const COURT_WIDTH: f64 = 10.97;

/// Generate a deterministic sample dataset.
#[derive(Parser)]
#[command(name = "generate_sample", version)]
struct Cli {
    /// Output CSV path.
    #[arg(default_value = "N_C_Dataset.csv")]
    output: PathBuf,

    /// Number of configurations (rallies).
    #[arg(long, default_value_t = 4)]
    configurations: i64,

    /// Timestamps per configuration.
    #[arg(long, default_value_t = 20)]
    timestamps: i64,

    /// Tracked points (players, ball) per timestamp.
    #[arg(long, default_value_t = 3)]
    points: i64,

    /// Std-dev of one random-walk step, in metres.
    #[arg(long, default_value_t = 0.4)]
    step: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// One normally distributed step (Box-Muller over two uniform draws).
fn gauss(rng: &mut impl Rng, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Starting position of point `p`, spread along the court's long axis.
fn start_position(p: i64, points: i64) -> (f64, f64) {
    let frac = (p as f64 + 0.5) / points as f64;
    (COURT_LENGTH * frac, COURT_WIDTH / 2.0)
}

/// Random-walk every point through every timestamp of every configuration.
fn generate(cli: &Cli) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut records = Vec::new();
    for con in 0..cli.configurations {
        let mut positions: Vec<(f64, f64)> = (0..cli.points)
            .map(|p| start_position(p, cli.points))
            .collect();

        for tst in 0..cli.timestamps {
            for (poi, (x, y)) in (0..).zip(positions.iter_mut()) {
                *x = (*x + gauss(&mut rng, cli.step)).clamp(0.0, COURT_LENGTH);
                *y = (*y + gauss(&mut rng, cli.step)).clamp(0.0, COURT_WIDTH);
                records.push(Record::new(con, tst, poi, round2(*x), round2(*y)));
            }
        }
    }
    records
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let records = generate(&cli);

    write_dataset(&cli.output, &records)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    log::info!(
        "Wrote {} records ({} configurations × {} timestamps × {} points) to {}",
        records.len(),
        cli.configurations,
        cli.timestamps,
        cli.points,
        cli.output.display()
    );
    Ok(())
}
