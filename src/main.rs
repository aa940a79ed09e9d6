//! Snowfall viewer

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use snowfall::{SnowConfig, Snowfall};

/// Falling snow with wind. Drag to orbit, A/D to push the wind.
#[derive(Parser, Debug)]
#[command(name = "snowfall", version, about)]
struct Cli {
    /// Number of snowflakes
    #[arg(short = 'n', long, default_value_t = 300)]
    particles: u32,

    /// Seed for a reproducible particle field
    #[arg(long)]
    seed: Option<u64>,

    /// Snowflake image (PNG, JPEG or BMP); a procedural flake is used otherwise
    #[arg(short, long)]
    texture: Option<PathBuf>,

    /// Window width in logical pixels
    #[arg(long, default_value_t = 600)]
    width: u32,

    /// Window height in logical pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> SnowConfig {
        SnowConfig {
            particle_count: self.particles,
            seed: self.seed,
            texture: self.texture,
            window_size: (self.width, self.height),
            ..Default::default()
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG still wins over -v.
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match Snowfall::new().with_config(cli.into_config()).run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("snowfall: {err}");
            ExitCode::FAILURE
        }
    }
}
