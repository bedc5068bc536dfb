use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::SpeciesId;
use crate::rom::{
    Rom, GBA_ROM_CODE_OFFSET, GBA_VERSION_OFFSET, GBC_ROM_CODE_OFFSET, GB_CGB_FLAG_OFFSET,
    GB_JP_FLAG_OFFSET, GB_MAX_ROM_SIZE, GB_MIN_ROM_SIZE, GB_SIGNATURE_OFFSET, GB_VERSION_OFFSET,
};
use crate::settings::MiscTweak;
use crate::text::TextTable;
use crate::{RandomiserError, Result};

/// CGB flag value of cartridges that refuse to boot on the original GB.
const CGB_ONLY: u8 = 0xC0;

/// Offsets may be written as JSON numbers or as "0x..." strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawOffset {
    Number(u64),
    Text(String),
}

impl RawOffset {
    fn resolve(self) -> std::result::Result<usize, String> {
        match self {
            RawOffset::Number(n) => Ok(n as usize),
            RawOffset::Text(s) => {
                let trimmed = s.trim();
                let parsed = match trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                {
                    Some(hex) => usize::from_str_radix(hex, 16),
                    None => trimmed.parse(),
                };
                parsed.map_err(|_| format!("'{s}' is not an offset"))
            }
        }
    }
}

fn offset<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<usize, D::Error> {
    RawOffset::deserialize(d)?.resolve().map_err(D::Error::custom)
}

fn offsets<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<usize>, D::Error> {
    Vec::<RawOffset>::deserialize(d)?
        .into_iter()
        .map(|raw| raw.resolve().map_err(D::Error::custom))
        .collect()
}

fn opt_offset<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<usize>, D::Error> {
    Option::<RawOffset>::deserialize(d)?
        .map(|raw| raw.resolve().map_err(D::Error::custom))
        .transpose()
}

fn offset_groups<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Vec<Vec<usize>>, D::Error> {
    Vec::<Vec<RawOffset>>::deserialize(d)?
        .into_iter()
        .map(|group| {
            group
                .into_iter()
                .map(|raw| raw.resolve().map_err(D::Error::custom))
                .collect()
        })
        .collect()
}

/// Maps keyed by a table index. JSON keys are strings, and flattened
/// structs do not coerce them, so they are parsed here.
fn indexed<'de, D, V>(d: D) -> std::result::Result<BTreeMap<usize, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    BTreeMap::<String, V>::deserialize(d)?
        .into_iter()
        .map(|(key, value)| {
            key.trim()
                .parse::<usize>()
                .map(|index| (index, value))
                .map_err(|_| D::Error::custom(format!("'{key}' is not a table index")))
        })
        .collect()
}

/// Where a catalog entry gets its character table from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextSource {
    #[serde(default)]
    pub text_table: Option<String>,
    #[serde(default)]
    pub text_table_path: Option<PathBuf>,
}

impl TextSource {
    pub fn load(&self, terminator: u8) -> Result<TextTable> {
        if let Some(inline) = &self.text_table {
            return TextTable::parse(inline, terminator);
        }
        match &self.text_table_path {
            Some(path) => {
                let source = fs::read_to_string(path).map_err(|err| {
                    RandomiserError::Config(format!(
                        "cannot read text table {}: {err}",
                        path.display()
                    ))
                })?;
                TextTable::parse(&source, terminator)
            }
            None => Err(RandomiserError::Config(
                "catalog entry has neither text_table nor text_table_path".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticEntry {
    #[serde(deserialize_with = "offsets")]
    pub species_offsets: Vec<usize>,
    #[serde(default, deserialize_with = "offsets")]
    pub level_offsets: Vec<usize>,
    #[serde(default)]
    pub is_egg: bool,
    /// Offsets that must always hold the same species as this one.
    #[serde(default)]
    pub linked: Vec<StaticEntry>,
    /// Gen 2 game corner prizes also show the species name.
    #[serde(default, deserialize_with = "opt_offset")]
    pub game_corner_name_offset: Option<usize>,
}

/// Fields every catalog entry carries regardless of generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryCommon {
    pub name: String,
    #[serde(flatten)]
    pub text: TextSource,
    #[serde(default, deserialize_with = "offset_groups")]
    pub starters: Vec<Vec<usize>>,
    #[serde(default)]
    pub statics: Vec<StaticEntry>,
    #[serde(default, deserialize_with = "indexed")]
    pub trainer_tags: BTreeMap<usize, String>,
    #[serde(default, deserialize_with = "indexed")]
    pub encounter_bans: BTreeMap<usize, Vec<SpeciesId>>,
    #[serde(default, deserialize_with = "offsets")]
    pub intro_offsets: Vec<usize>,
    #[serde(default)]
    pub tweak_patches: BTreeMap<MiscTweak, PathBuf>,
    #[serde(default)]
    pub friendship_locator: Option<String>,
    #[serde(default, deserialize_with = "opt_offset")]
    pub check_value_offset: Option<usize>,
    /// Replaces the built-in legendary list when present.
    #[serde(default)]
    pub legendaries: Option<Vec<SpeciesId>>,
    #[serde(default)]
    pub map_names: BTreeMap<String, String>,
}

impl EntryCommon {
    pub fn map_name(&self, bank: u8, map: u8) -> String {
        self.map_names
            .get(&format!("{bank}.{map}"))
            .cloned()
            .unwrap_or_else(|| format!("Map {bank}.{map}"))
    }

    /// GB games number maps with a single id.
    pub fn map_name_by_id(&self, id: usize) -> String {
        self.map_names
            .get(&id.to_string())
            .cloned()
            .unwrap_or_else(|| format!("Map {id}"))
    }

    fn resolve_paths(&mut self, base: &Path) {
        if let Some(path) = self.text.text_table_path.as_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        for path in self.tweak_patches.values_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gen1Entry {
    #[serde(flatten)]
    pub common: EntryCommon,
    pub signature: String,
    pub version: u8,
    pub non_japanese: u8,
    #[serde(default)]
    pub yellow: bool,
    #[serde(deserialize_with = "offset")]
    pub pokedex_order: usize,
    pub internal_count: usize,
    #[serde(deserialize_with = "offset")]
    pub stats: usize,
    #[serde(default, deserialize_with = "opt_offset")]
    pub mew_stats: Option<usize>,
    #[serde(deserialize_with = "offset")]
    pub names: usize,
    pub name_length: usize,
    #[serde(deserialize_with = "offset")]
    pub movesets_table: usize,
    pub movesets_data_size: usize,
    #[serde(default, deserialize_with = "opt_offset")]
    pub movesets_extra_space: Option<usize>,
    #[serde(deserialize_with = "offset")]
    pub wild_table: usize,
    #[serde(default, deserialize_with = "opt_offset")]
    pub old_rod: Option<usize>,
    #[serde(default, deserialize_with = "opt_offset")]
    pub good_rod: Option<usize>,
    #[serde(default, deserialize_with = "opt_offset")]
    pub super_rod: Option<usize>,
    #[serde(default)]
    pub ban_ghost_marowak: bool,
    #[serde(default, deserialize_with = "offsets")]
    pub ghost_marowak_offsets: Vec<usize>,
    #[serde(deserialize_with = "offset")]
    pub trainer_classes: usize,
    pub trainer_class_counts: Vec<usize>,
    #[serde(default, deserialize_with = "opt_offset")]
    pub extra_trainer_moves: Option<usize>,
    /// Jump that loads the champion's custom moves, NOP'd on write.
    #[serde(default, deserialize_with = "opt_offset")]
    pub champion_rival_jump: Option<usize>,
    #[serde(default, deserialize_with = "opt_offset")]
    pub text_delay_offset: Option<usize>,
}

impl Gen1Entry {
    fn matches(&self, rom: &Rom) -> bool {
        let sig = self.signature.as_bytes();
        rom.read_bytes(GB_SIGNATURE_OFFSET, sig.len()).ok() == Some(sig)
            && rom.read_byte(GB_VERSION_OFFSET).ok() == Some(self.version)
            && rom.read_byte(GB_JP_FLAG_OFFSET).ok() == Some(self.non_japanese)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gen2Entry {
    #[serde(flatten)]
    pub common: EntryCommon,
    pub rom_code: String,
    pub version: u8,
    pub non_japanese: u8,
    #[serde(default)]
    pub crystal: bool,
    #[serde(deserialize_with = "offset")]
    pub stats: usize,
    #[serde(deserialize_with = "offset")]
    pub names: usize,
    pub name_length: usize,
    #[serde(deserialize_with = "offset")]
    pub movesets_table: usize,
    #[serde(deserialize_with = "offset")]
    pub wild_land_sea: usize,
    #[serde(deserialize_with = "offset")]
    pub fishing: usize,
    #[serde(default = "default_fishing_groups")]
    pub fishing_groups: usize,
    #[serde(default = "default_fishing_group_size")]
    pub fishing_group_size: usize,
    #[serde(deserialize_with = "offset")]
    pub headbutt: usize,
    pub headbutt_table_count: usize,
    #[serde(deserialize_with = "offset")]
    pub bug_contest: usize,
    #[serde(deserialize_with = "offset")]
    pub trainer_classes: usize,
    pub trainer_class_counts: Vec<usize>,
    #[serde(default, deserialize_with = "offsets")]
    pub starter_text: Vec<usize>,
    #[serde(default = "default_game_corner_name_length")]
    pub game_corner_name_length: usize,
    #[serde(default, deserialize_with = "opt_offset")]
    pub text_delay_offset: Option<usize>,
}

fn default_fishing_groups() -> usize {
    12
}

fn default_fishing_group_size() -> usize {
    11
}

fn default_game_corner_name_length() -> usize {
    10
}

impl Gen2Entry {
    fn matches(&self, rom: &Rom) -> bool {
        let code = self.rom_code.as_bytes();
        rom.read_bytes(GBC_ROM_CODE_OFFSET, code.len()).ok() == Some(code)
            && rom.read_byte(GB_VERSION_OFFSET).ok() == Some(self.version)
            && rom.read_byte(GB_JP_FLAG_OFFSET).ok() == Some(self.non_japanese)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gen3Entry {
    #[serde(flatten)]
    pub common: EntryCommon,
    pub rom_code: String,
    pub version: u8,
    #[serde(default)]
    pub frlg: bool,
    pub pokemon_count: usize,
    #[serde(default = "default_gen3_dex_count")]
    pub pokedex_count: usize,
    #[serde(deserialize_with = "offset")]
    pub pokedex_order: usize,
    #[serde(deserialize_with = "offset")]
    pub stats: usize,
    #[serde(deserialize_with = "offset")]
    pub names: usize,
    #[serde(default = "default_gen3_name_length")]
    pub name_length: usize,
    #[serde(deserialize_with = "offset")]
    pub evolutions: usize,
    #[serde(deserialize_with = "offset")]
    pub movesets: usize,
    #[serde(deserialize_with = "offset")]
    pub trainers: usize,
    pub trainer_count: usize,
    #[serde(default = "default_gen3_trainer_entry_size")]
    pub trainer_entry_size: usize,
    #[serde(deserialize_with = "offset")]
    pub wild_headers: usize,
    #[serde(default)]
    pub battle_trapper_bans: Vec<usize>,
    #[serde(default, deserialize_with = "opt_offset")]
    pub run_indoors_offset: Option<usize>,
}

fn default_gen3_dex_count() -> usize {
    386
}

fn default_gen3_name_length() -> usize {
    11
}

fn default_gen3_trainer_entry_size() -> usize {
    40
}

impl Gen3Entry {
    fn matches(&self, rom: &Rom) -> bool {
        let code = self.rom_code.as_bytes();
        rom.read_bytes(GBA_ROM_CODE_OFFSET, code.len()).ok() == Some(code)
            && rom.read_byte(GBA_VERSION_OFFSET).ok() == Some(self.version)
    }
}

/// Per-revision layouts for every supported cartridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub gen1: Vec<Gen1Entry>,
    #[serde(default)]
    pub gen2: Vec<Gen2Entry>,
    #[serde(default)]
    pub gen3: Vec<Gen3Entry>,
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a catalog file. Relative text-table and patch paths are
    /// resolved against the catalog's directory.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|err| {
            RandomiserError::Config(format!("cannot read catalog {}: {err}", path.display()))
        })?;
        let mut catalog = Catalog::from_json(&json)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for entry in catalog.gen1.iter_mut() {
            entry.common.resolve_paths(base);
        }
        for entry in catalog.gen2.iter_mut() {
            entry.common.resolve_paths(base);
        }
        for entry in catalog.gen3.iter_mut() {
            entry.common.resolve_paths(base);
        }
        log::debug!(
            "catalog {}: {} gen1, {} gen2, {} gen3 entries",
            path.display(),
            catalog.gen1.len(),
            catalog.gen2.len(),
            catalog.gen3.len()
        );
        Ok(catalog)
    }

    fn gb_sized(rom: &Rom) -> bool {
        (GB_MIN_ROM_SIZE..=GB_MAX_ROM_SIZE).contains(&rom.len())
    }

    pub fn find_gen1(&self, rom: &Rom) -> Option<&Gen1Entry> {
        if !Self::gb_sized(rom) || rom.read_byte(GB_CGB_FLAG_OFFSET).ok() == Some(CGB_ONLY) {
            return None;
        }
        self.gen1.iter().find(|entry| entry.matches(rom))
    }

    pub fn find_gen2(&self, rom: &Rom) -> Option<&Gen2Entry> {
        if !Self::gb_sized(rom) {
            return None;
        }
        self.gen2.iter().find(|entry| entry.matches(rom))
    }

    pub fn find_gen3(&self, rom: &Rom) -> Option<&Gen3Entry> {
        self.gen3.iter().find(|entry| entry.matches(rom))
    }
}
