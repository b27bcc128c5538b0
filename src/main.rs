use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use occupancy_schedules::config::{Config, DEFAULT_CONFIG_PATH};
use occupancy_schedules::flexibility::{PeakHourTable, SetpointModifier};
use occupancy_schedules::simulation::ScheduleGenerator;
use occupancy_schedules::{export, telemetry};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "schedgen", version, about = "Stochastic occupancy schedules and setpoint flexibility")]
struct Cli {
    /// TOML configuration, overlaid with SCHEDGEN__* environment variables
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Two-letter state code
    #[arg(long, global = true)]
    state: Option<String>,

    #[arg(long, global = true)]
    year: Option<i32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a year of occupancy and end-use schedules
    Generate {
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[arg(long)]
        occupants: Option<f64>,
    },
    /// Apply peak / pre-peak offsets to a baseline setpoint CSV
    Flex {
        #[arg(long)]
        baseline: Option<PathBuf>,

        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Window shift in timesteps
        #[arg(long, allow_negative_numbers = true)]
        shift: Option<i64>,
    },
}

fn main() -> Result<()> {
    telemetry::init_tracing();

    let cli = Cli::parse();
    let mut cfg = Config::load_from(&cli.config)?;
    if let Some(seed) = cli.seed {
        cfg.calendar.random_seed = seed;
    }
    if let Some(state) = cli.state {
        cfg.calendar.state = state;
    }
    if let Some(year) = cli.year {
        cfg.calendar.sim_year = year;
    }

    match cli.command {
        Command::Generate { output, occupants } => {
            if let Some(path) = output {
                cfg.output.path = path;
            }
            if let Some(occupants) = occupants {
                cfg.calendar.num_occupants = occupants;
            }
            generate(&cfg)
        }
        Command::Flex {
            baseline,
            output,
            shift,
        } => {
            let Some(flex) = cfg.flexibility.as_mut() else {
                bail!("configuration has no [flexibility] section");
            };
            if let Some(path) = baseline {
                flex.baseline_path = path;
            }
            if let Some(path) = output {
                flex.output_path = path;
            }
            if let Some(shift) = shift {
                flex.inputs.random_shift_steps = shift;
            }
            apply_flexibility(&cfg)
        }
    }
}

fn generate(cfg: &Config) -> Result<()> {
    let ctx = cfg.calendar_context()?;
    let store = cfg.parameter_store()?;

    let generated = ScheduleGenerator::new(&ctx, store.for_state(ctx.state()))
        .with_end_uses(cfg.end_uses())
        .generate()?;
    export::write_schedules_file(&generated.table, &ctx, &cfg.output.path)?;

    info!(
        diagnostics = %serde_json::to_string(&generated.diagnostics)?,
        output = %cfg.output.path.display(),
        "generate finished"
    );
    Ok(())
}

fn apply_flexibility(cfg: &Config) -> Result<()> {
    let Some(flex) = cfg.flexibility.as_ref() else {
        bail!("configuration has no [flexibility] section");
    };
    let ctx = cfg.calendar_context()?;

    let baseline = export::read_setpoints_file(&flex.baseline_path)?;
    let modifier = SetpointModifier::new(&ctx, flex.inputs, PeakHourTable::builtin())?;
    let (setpoints, diagnostics) = modifier.apply(&baseline)?;
    export::write_setpoints_file(&setpoints, &ctx, &flex.output_path)?;

    info!(
        diagnostics = %serde_json::to_string(&diagnostics)?,
        output = %flex.output_path.display(),
        "flex finished"
    );
    Ok(())
}
