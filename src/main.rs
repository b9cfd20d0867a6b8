use anyhow::Result;
use clap::Parser;
use ludus_core::init_logging;
use ludus_lib::{App, Overrides};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model configuration file
    #[arg(short, long, default_value = "ludus.toml")]
    config: PathBuf,

    /// Option override, e.g. `--set noise=0.1;0.5` (repeatable)
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Event limit per species
    #[arg(short, long)]
    events: Option<u64>,

    /// Number of independent fixation runs instead of a single trajectory
    #[arg(long)]
    stats: Option<usize>,

    /// Report file; `.gz` compresses it
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List the options with their effective values and exit
    #[arg(long)]
    list_options: bool,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let overrides = Overrides {
        assignments: args.set,
        seed: args.seed,
        events: args.events,
        statistics_runs: args.stats,
    };
    let mut app = App::load(Some(&args.config), &overrides)?;

    if args.list_options {
        for (key, value) in ludus_core::options::report(&app.config.species) {
            let help = ludus_core::options::lookup(key).map_or("", |o| o.help);
            println!("{key:<16} {value:<24} {help}");
        }
        return Ok(());
    }

    let report = app.run()?;
    match args.output {
        Some(path) => report.save(path)?,
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
