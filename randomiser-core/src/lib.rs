use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod checksum;
pub mod encounters;
pub mod evolution;
pub mod gen1;
pub mod gen2;
pub mod gen3;
pub mod handler;
pub mod ips;
pub mod layout;
pub mod model;
pub mod randomiser;
pub mod rom;
pub mod search;
pub mod selector;
pub mod settings;
pub mod statics;
pub mod text;
pub mod trainers;

use handler::detect;
use ips::apply_ips;
use layout::Catalog;
use model::SpeciesId;
use randomiser::randomise;
use rom::Rom;
use settings::Settings;

#[derive(Debug, Error)]
pub enum RandomiserError {
    #[error("format error: {0}")]
    Format(String),
    #[error("version error: {0}")]
    Version(String),
    #[error("integrity error: {0}")]
    Integrity(String),
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),
    #[error("evolution cycle through species {species}")]
    EvolutionCycle { species: SpeciesId },
    #[error("nothing left to pick for {context}")]
    EmptyPool { context: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("settings token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

pub type Result<T> = std::result::Result<T, RandomiserError>;

/// Everything one randomiser run needs from the outside.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOptions {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub catalog_path: PathBuf,
    /// Settings as a token. Exactly one of this and `settings_file` is set.
    pub settings_token: Option<String>,
    pub settings_file: Option<PathBuf>,
    pub seed: u64,
    /// Custom names file the settings were made against.
    pub names_file: Option<PathBuf>,
    pub write_log: bool,
    /// IPS patch applied to the input before detection.
    pub patch: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub seed: u64,
    pub check_value: u32,
    pub rom_name: String,
    pub log: String,
}

fn load_settings(options: &RunOptions) -> Result<(Settings, String)> {
    match (&options.settings_token, &options.settings_file) {
        (Some(token), None) => Ok((Settings::from_token(token)?, token.trim().to_string())),
        (None, Some(path)) => {
            let settings = Settings::from_file_bytes(&fs::read(path)?)?;
            let token = settings.to_token()?;
            Ok((settings, token))
        }
        (Some(_), Some(_)) => Err(RandomiserError::Config(
            "give either a settings token or a settings file, not both".to_string(),
        )),
        (None, None) => Err(RandomiserError::Config(
            "no settings given; pass a token or a settings file".to_string(),
        )),
    }
}

/// Where the spoiler log goes for a given output image.
pub fn log_path_for(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".log");
    PathBuf::from(name)
}

pub fn run(options: &RunOptions) -> Result<RunReport> {
    if !options.input_path.exists() {
        return Err(RandomiserError::Config(format!(
            "Input path does not exist: {}",
            options.input_path.display()
        )));
    }

    let (settings, token) = load_settings(options)?;
    let names = match &options.names_file {
        Some(path) => Some(fs::read_to_string(path)?),
        None => None,
    };
    if !settings.reference_checksum_matches(names.as_deref()) {
        log::warn!("settings were made with a different names file; results may differ");
    }

    let mut image = fs::read(&options.input_path)?;
    if let Some(patch) = &options.patch {
        let records = apply_ips(&fs::read(patch)?, &mut image)?;
        log::info!("applied {records} patch records from {}", patch.display());
    }

    let catalog = Catalog::from_path(&options.catalog_path)?;
    let rom = Rom::new(image);
    let mut handler = detect(&rom, &catalog)?;
    if !settings.rom_name.is_empty() && settings.rom_name != handler.rom_name() {
        log::warn!(
            "settings were made for {} but this is {}",
            settings.rom_name,
            handler.rom_name()
        );
    }

    let outcome = randomise(handler.as_mut(), &settings, &token, options.seed)?;

    if let Some(parent) = options.output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&options.output_path, &outcome.image)?;
    log::info!("wrote {}", options.output_path.display());

    if options.write_log {
        let log_path = log_path_for(&options.output_path);
        fs::write(&log_path, &outcome.log)?;
        log::info!("wrote spoiler log {}", log_path.display());
    }

    Ok(RunReport {
        seed: options.seed,
        check_value: outcome.check_value,
        rom_name: handler.rom_name().to_string(),
        log: outcome.log,
    })
}
