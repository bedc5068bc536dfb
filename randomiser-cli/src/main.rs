use clap::Parser;
use rand::Rng;
use std::path::PathBuf;

use rom_randomiser_core::{run, RunOptions};

#[derive(Debug, Parser)]
#[command(name = "RomRandomiser-CLI", version, about = "Randomiser for GB, GBC and GBA monster-catching ROMs")]
struct Args {
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    output: PathBuf,

    /// ROM layout catalog (JSON).
    #[arg(long)]
    catalog: PathBuf,

    /// Settings token as produced by a front-end.
    #[arg(long, conflicts_with = "settings_file", required_unless_present = "settings_file")]
    settings: Option<String>,

    #[arg(long, value_name = "FILE")]
    settings_file: Option<PathBuf>,

    /// Random when not given.
    #[arg(long)]
    seed: Option<u64>,

    /// Custom names file the settings were made with.
    #[arg(long, value_name = "FILE")]
    names: Option<PathBuf>,

    /// Write a spoiler log next to the output.
    #[arg(long, default_value_t = false)]
    log: bool,

    /// IPS patch to apply to the input first.
    #[arg(long, value_name = "FILE")]
    patch: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let options = RunOptions {
        input_path: args.input,
        output_path: args.output,
        catalog_path: args.catalog,
        settings_token: args.settings,
        settings_file: args.settings_file,
        seed,
        names_file: args.names,
        write_log: args.log,
        patch: args.patch,
    };

    match run(&options) {
        Ok(report) => {
            log::info!(
                "{}: seed {} check value {:08X}",
                report.rom_name,
                report.seed,
                report.check_value
            );
        }
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
