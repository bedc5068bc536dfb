use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::checksum::{crc32, reference_file_checksum};
use crate::{RandomiserError, Result};

/// Version written into every token. Tokens from a newer codec are refused.
pub const VERSION: u32 = 321;

/// Fixed part of the payload, before the ROM name.
const FIXED_PAYLOAD_LEN: usize = 13;

/// Version, length, CRC and reference checksum.
const ENVELOPE_LEN: usize = 16;

/// Versions whose high byte falls in this range predate the current layout.
const ANCIENT_VERSIONS: std::ops::RangeInclusive<u32> = 1..=172;

const MAX_FORCE_LEVEL: u8 = 0x7F;

/// An enumeration stored as exactly one set bit inside a byte.
trait FlagGroup: Sized + Copy + PartialEq + 'static {
    const NAME: &'static str;
    const MEMBERS: &'static [Self];

    fn bits(self, shift: u8) -> u8 {
        let index = Self::MEMBERS.iter().position(|m| *m == self).unwrap_or(0);
        1 << (shift as usize + index)
    }

    fn restore(byte: u8, shift: u8) -> Result<Self> {
        let mut found = None;
        for (index, member) in Self::MEMBERS.iter().enumerate() {
            if byte & (1 << (shift as usize + index)) == 0 {
                continue;
            }
            if found.is_some() {
                return Err(RandomiserError::Format(format!(
                    "more than one {} selected in settings byte {byte:#04x}",
                    Self::NAME
                )));
            }
            found = Some(*member);
        }
        Ok(found.unwrap_or(Self::MEMBERS[0]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StartersMod {
    #[default]
    Unchanged,
    Custom,
    CompletelyRandom,
    RandomWithTwoEvolutions,
}

impl FlagGroup for StartersMod {
    const NAME: &'static str = "starter mode";
    const MEMBERS: &'static [Self] = &[
        StartersMod::Unchanged,
        StartersMod::Custom,
        StartersMod::CompletelyRandom,
        StartersMod::RandomWithTwoEvolutions,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrainersMod {
    #[default]
    Unchanged,
    Random,
    Distributed,
    MainPlaythrough,
    TypeThemed,
    TypeThemedElite4Gyms,
}

impl FlagGroup for TrainersMod {
    const NAME: &'static str = "trainer mode";
    const MEMBERS: &'static [Self] = &[
        TrainersMod::Unchanged,
        TrainersMod::Random,
        TrainersMod::Distributed,
        TrainersMod::MainPlaythrough,
        TrainersMod::TypeThemed,
        TrainersMod::TypeThemedElite4Gyms,
    ];
}

impl TrainersMod {
    pub fn is_type_themed(self) -> bool {
        matches!(self, TrainersMod::TypeThemed | TrainersMod::TypeThemedElite4Gyms)
    }

    /// Gen 1-3 catalogs list no main-playthrough trainers, so only the
    /// plain distributed mode keeps placement history.
    pub fn is_distributed(self) -> bool {
        self == TrainersMod::Distributed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WildPokemonMod {
    #[default]
    Unchanged,
    Random,
    AreaMapping,
    GlobalMapping,
}

impl FlagGroup for WildPokemonMod {
    const NAME: &'static str = "wild mode";
    const MEMBERS: &'static [Self] = &[
        WildPokemonMod::Unchanged,
        WildPokemonMod::Random,
        WildPokemonMod::AreaMapping,
        WildPokemonMod::GlobalMapping,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WildPokemonRestrictionMod {
    #[default]
    None,
    SimilarStrength,
    CatchEmAll,
    TypeThemeAreas,
}

impl FlagGroup for WildPokemonRestrictionMod {
    const NAME: &'static str = "wild restriction";
    const MEMBERS: &'static [Self] = &[
        WildPokemonRestrictionMod::None,
        WildPokemonRestrictionMod::SimilarStrength,
        WildPokemonRestrictionMod::CatchEmAll,
        WildPokemonRestrictionMod::TypeThemeAreas,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StaticPokemonMod {
    #[default]
    Unchanged,
    RandomMatching,
    CompletelyRandom,
    SimilarStrength,
}

impl FlagGroup for StaticPokemonMod {
    const NAME: &'static str = "static mode";
    const MEMBERS: &'static [Self] = &[
        StaticPokemonMod::Unchanged,
        StaticPokemonMod::RandomMatching,
        StaticPokemonMod::CompletelyRandom,
        StaticPokemonMod::SimilarStrength,
    ];
}

/// Optional code and data patches. `bit` is the position in the settings
/// mask; higher `priority` tweaks are applied first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MiscTweak {
    BwExpPatch,
    NerfXAccuracy,
    FixCritRate,
    FastestText,
    RunningShoesIndoors,
    RandomizePcPotion,
    AllowPikachuEvolution,
    NationalDexAtStart,
    UpdateTypeEffectiveness,
    LowerCasePokemonNames,
    RandomizeCatchingTutorial,
    BanLuckyEgg,
    BalanceStaticLevels,
    RunWithoutRunningShoes,
}

impl MiscTweak {
    pub const ALL: [MiscTweak; 14] = [
        MiscTweak::BwExpPatch,
        MiscTweak::NerfXAccuracy,
        MiscTweak::FixCritRate,
        MiscTweak::FastestText,
        MiscTweak::RunningShoesIndoors,
        MiscTweak::RandomizePcPotion,
        MiscTweak::AllowPikachuEvolution,
        MiscTweak::NationalDexAtStart,
        MiscTweak::UpdateTypeEffectiveness,
        MiscTweak::LowerCasePokemonNames,
        MiscTweak::RandomizeCatchingTutorial,
        MiscTweak::BanLuckyEgg,
        MiscTweak::BalanceStaticLevels,
        MiscTweak::RunWithoutRunningShoes,
    ];

    pub fn bit(self) -> u32 {
        match self {
            MiscTweak::BwExpPatch => 1,
            MiscTweak::NerfXAccuracy => 1 << 1,
            MiscTweak::FixCritRate => 1 << 2,
            MiscTweak::FastestText => 1 << 3,
            MiscTweak::RunningShoesIndoors => 1 << 4,
            MiscTweak::RandomizePcPotion => 1 << 5,
            MiscTweak::AllowPikachuEvolution => 1 << 6,
            MiscTweak::NationalDexAtStart => 1 << 7,
            MiscTweak::UpdateTypeEffectiveness => 1 << 8,
            MiscTweak::LowerCasePokemonNames => 1 << 10,
            MiscTweak::RandomizeCatchingTutorial => 1 << 11,
            MiscTweak::BanLuckyEgg => 1 << 12,
            MiscTweak::BalanceStaticLevels => 1 << 16,
            MiscTweak::RunWithoutRunningShoes => 1 << 18,
        }
    }

    pub fn priority(self) -> u8 {
        match self {
            MiscTweak::BanLuckyEgg => 1,
            _ => 0,
        }
    }

    /// Tweaks present in both masks, highest priority first. Equal
    /// priorities keep bit order.
    pub fn selected(available: u32, chosen: u32) -> Vec<MiscTweak> {
        let mut tweaks: Vec<MiscTweak> = MiscTweak::ALL
            .iter()
            .copied()
            .filter(|t| available & chosen & t.bit() != 0)
            .collect();
        tweaks.sort_by(|a, b| b.priority().cmp(&a.priority()));
        tweaks
    }
}

/// Everything a run can be asked to change. Persisted either as JSON or as
/// the compact token from `to_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rom_name: String,

    pub change_impossible_evolutions: bool,
    pub make_evolutions_easier: bool,
    pub remove_time_based_evolutions: bool,

    pub starters_mod: StartersMod,

    pub trainers_mod: TrainersMod,
    pub trainers_use_pokemon_of_similar_strength: bool,
    pub rival_carries_starter_through_out: bool,
    pub trainers_block_legendaries: bool,
    pub trainers_block_early_wonder_guard: bool,
    pub trainers_force_fully_evolved: bool,
    pub trainers_force_fully_evolved_level: u8,

    pub wild_pokemon_mod: WildPokemonMod,
    pub wild_pokemon_restriction_mod: WildPokemonRestrictionMod,
    pub use_time_based_encounters: bool,
    pub block_wild_legendaries: bool,

    pub static_pokemon_mod: StaticPokemonMod,
    pub limit_main_game_legendaries: bool,

    /// Bitmask of `MiscTweak::bit` values.
    pub current_misc_tweaks: u32,

    /// Checksum of the names file the token was made with.
    pub reference_checksum: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            rom_name: String::new(),
            change_impossible_evolutions: false,
            make_evolutions_easier: false,
            remove_time_based_evolutions: false,
            starters_mod: StartersMod::Unchanged,
            trainers_mod: TrainersMod::Unchanged,
            trainers_use_pokemon_of_similar_strength: false,
            rival_carries_starter_through_out: false,
            trainers_block_legendaries: true,
            trainers_block_early_wonder_guard: true,
            trainers_force_fully_evolved: false,
            trainers_force_fully_evolved_level: 30,
            wild_pokemon_mod: WildPokemonMod::Unchanged,
            wild_pokemon_restriction_mod: WildPokemonRestrictionMod::None,
            use_time_based_encounters: false,
            block_wild_legendaries: true,
            static_pokemon_mod: StaticPokemonMod::Unchanged,
            limit_main_game_legendaries: false,
            current_misc_tweaks: 0,
            reference_checksum: 0,
        }
    }
}

fn flags(bools: &[bool]) -> u8 {
    bools
        .iter()
        .enumerate()
        .fold(0, |byte, (i, &set)| if set { byte | 1 << i } else { byte })
}

fn flag(byte: u8, index: u8) -> bool {
    (byte >> index) & 1 == 1
}

fn read_be_u32(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or_else(|| RandomiserError::Format(format!("settings data ends before byte {}", at + 4)))
}

fn check_version(version: u32) -> Result<()> {
    if ANCIENT_VERSIONS.contains(&(version >> 24)) {
        return Err(RandomiserError::Version(
            "these settings are too old to update; use an older release of the randomiser to convert them"
                .to_string(),
        ));
    }
    if version > VERSION {
        return Err(RandomiserError::Version(format!(
            "settings version {version} is newer than this randomiser ({VERSION}); update to read them"
        )));
    }
    Ok(())
}

impl Settings {
    fn payload(&self) -> Result<Vec<u8>> {
        let name = self.rom_name.as_bytes();
        if name.len() > u8::MAX as usize {
            return Err(RandomiserError::Format(format!(
                "ROM name '{}' is too long to store",
                self.rom_name
            )));
        }
        if self.trainers_force_fully_evolved_level > MAX_FORCE_LEVEL {
            return Err(RandomiserError::Format(format!(
                "force fully evolved level {} is out of range",
                self.trainers_force_fully_evolved_level
            )));
        }

        let mut out = Vec::with_capacity(FIXED_PAYLOAD_LEN + name.len());
        out.push(flags(&[
            self.change_impossible_evolutions,
            self.make_evolutions_easier,
            self.remove_time_based_evolutions,
        ]));
        out.push(self.starters_mod.bits(0));
        out.push(self.trainers_mod.bits(0));
        out.push(
            self.trainers_force_fully_evolved_level
                | if self.trainers_force_fully_evolved { 0x80 } else { 0 },
        );
        out.push(
            self.wild_pokemon_mod.bits(0)
                | flags(&[false, false, false, false, self.use_time_based_encounters, self.block_wild_legendaries]),
        );
        out.push(self.wild_pokemon_restriction_mod.bits(0));
        out.push(
            self.static_pokemon_mod.bits(0)
                | if self.limit_main_game_legendaries { 0x10 } else { 0 },
        );
        out.push(flags(&[
            self.trainers_use_pokemon_of_similar_strength,
            self.rival_carries_starter_through_out,
            self.trainers_block_legendaries,
            self.trainers_block_early_wonder_guard,
        ]));
        out.extend_from_slice(&self.current_misc_tweaks.to_be_bytes());
        out.push(name.len() as u8);
        out.extend_from_slice(name);
        Ok(out)
    }

    fn from_payload(data: &[u8]) -> Result<Settings> {
        if data.len() < FIXED_PAYLOAD_LEN {
            return Err(RandomiserError::Format(format!(
                "settings payload is {} bytes, expected at least {FIXED_PAYLOAD_LEN}",
                data.len()
            )));
        }
        let name_len = data[12] as usize;
        let name = data
            .get(FIXED_PAYLOAD_LEN..FIXED_PAYLOAD_LEN + name_len)
            .ok_or_else(|| RandomiserError::Format("settings ROM name is truncated".to_string()))?;
        let rom_name = String::from_utf8(name.to_vec())
            .map_err(|_| RandomiserError::Format("settings ROM name is not UTF-8".to_string()))?;

        Ok(Settings {
            rom_name,
            change_impossible_evolutions: flag(data[0], 0),
            make_evolutions_easier: flag(data[0], 1),
            remove_time_based_evolutions: flag(data[0], 2),
            starters_mod: StartersMod::restore(data[1], 0)?,
            trainers_mod: TrainersMod::restore(data[2], 0)?,
            trainers_force_fully_evolved: flag(data[3], 7),
            trainers_force_fully_evolved_level: data[3] & MAX_FORCE_LEVEL,
            wild_pokemon_mod: WildPokemonMod::restore(data[4] & 0x0F, 0)?,
            use_time_based_encounters: flag(data[4], 4),
            block_wild_legendaries: flag(data[4], 5),
            wild_pokemon_restriction_mod: WildPokemonRestrictionMod::restore(data[5], 0)?,
            static_pokemon_mod: StaticPokemonMod::restore(data[6] & 0x0F, 0)?,
            limit_main_game_legendaries: flag(data[6], 4),
            trainers_use_pokemon_of_similar_strength: flag(data[7], 0),
            rival_carries_starter_through_out: flag(data[7], 1),
            trainers_block_legendaries: flag(data[7], 2),
            trainers_block_early_wonder_guard: flag(data[7], 3),
            current_misc_tweaks: read_be_u32(data, 8)?,
            reference_checksum: 0,
        })
    }

    /// Base64 token: version, payload length, payload, CRC32 of all of
    /// that, then the reference checksum. Integers are big-endian.
    pub fn to_token(&self) -> Result<String> {
        let payload = self.payload()?;
        let mut out = Vec::with_capacity(payload.len() + ENVELOPE_LEN);
        out.extend_from_slice(&VERSION.to_be_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&payload);
        let crc = crc32(&out);
        out.extend_from_slice(&crc.to_be_bytes());
        out.extend_from_slice(&self.reference_checksum.to_be_bytes());
        Ok(STANDARD.encode(out))
    }

    pub fn from_token(token: &str) -> Result<Settings> {
        let data = STANDARD.decode(token.trim())?;
        if data.len() < ENVELOPE_LEN {
            return Err(RandomiserError::Format(format!(
                "settings token is only {} bytes",
                data.len()
            )));
        }
        let body_end = data.len() - 8;
        let stored_crc = read_be_u32(&data, body_end)?;
        if crc32(&data[..body_end]) != stored_crc {
            return Err(RandomiserError::Integrity(
                "settings token checksum does not match".to_string(),
            ));
        }

        check_version(read_be_u32(&data, 0)?)?;

        let length = read_be_u32(&data, 4)? as usize;
        let payload = &data[8..body_end];
        if payload.len() != length {
            return Err(RandomiserError::Format(format!(
                "settings payload is {} bytes but the header says {length}",
                payload.len()
            )));
        }

        let mut settings = Settings::from_payload(payload)?;
        settings.reference_checksum = read_be_u32(&data, body_end + 4)?;
        Ok(settings)
    }

    /// Settings file: version and token length ahead of the UTF-8 token.
    pub fn to_file_bytes(&self) -> Result<Vec<u8>> {
        let token = self.to_token()?;
        let mut out = Vec::with_capacity(token.len() + 8);
        out.extend_from_slice(&VERSION.to_be_bytes());
        out.extend_from_slice(&(token.len() as u32).to_be_bytes());
        out.extend_from_slice(token.as_bytes());
        Ok(out)
    }

    pub fn from_file_bytes(bytes: &[u8]) -> Result<Settings> {
        check_version(read_be_u32(bytes, 0)?)?;
        let length = read_be_u32(bytes, 4)? as usize;
        let token = bytes
            .get(8..8 + length)
            .ok_or_else(|| RandomiserError::Format("settings file is truncated".to_string()))?;
        let token = std::str::from_utf8(token)
            .map_err(|_| RandomiserError::Format("settings file token is not UTF-8".to_string()))?;
        Settings::from_token(token)
    }

    /// Records which names file the settings are meant for.
    pub fn set_reference_file(&mut self, names: Option<&str>) {
        self.reference_checksum = names.map_or(0, reference_file_checksum);
    }

    /// Whether `names` is the file these settings were made with. A
    /// mismatch is only worth a warning.
    pub fn reference_checksum_matches(&self, names: Option<&str>) -> bool {
        names.map_or(0, reference_file_checksum) == self.reference_checksum
    }
}

#[cfg(test)]
mod tests {
    use super::{
        MiscTweak, Settings, StartersMod, StaticPokemonMod, TrainersMod, WildPokemonMod,
        WildPokemonRestrictionMod, VERSION,
    };
    use crate::RandomiserError;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    fn busy_settings() -> Settings {
        Settings {
            rom_name: "Crystal (U)".to_string(),
            change_impossible_evolutions: true,
            remove_time_based_evolutions: true,
            starters_mod: StartersMod::RandomWithTwoEvolutions,
            trainers_mod: TrainersMod::TypeThemedElite4Gyms,
            trainers_use_pokemon_of_similar_strength: true,
            rival_carries_starter_through_out: true,
            trainers_block_early_wonder_guard: false,
            trainers_force_fully_evolved: true,
            trainers_force_fully_evolved_level: 42,
            wild_pokemon_mod: WildPokemonMod::GlobalMapping,
            wild_pokemon_restriction_mod: WildPokemonRestrictionMod::TypeThemeAreas,
            use_time_based_encounters: true,
            static_pokemon_mod: StaticPokemonMod::SimilarStrength,
            limit_main_game_legendaries: true,
            current_misc_tweaks: MiscTweak::FastestText.bit() | MiscTweak::BanLuckyEgg.bit(),
            reference_checksum: 0xDEAD_BEEF,
            ..Settings::default()
        }
    }

    fn reseal(data: &mut Vec<u8>) {
        let end = data.len() - 8;
        let crc = crate::checksum::crc32(&data[..end]);
        data[end..end + 4].copy_from_slice(&crc.to_be_bytes());
    }

    #[test]
    fn token_round_trips() {
        for settings in [Settings::default(), busy_settings()] {
            let token = settings.to_token().unwrap();
            assert_eq!(Settings::from_token(&token).unwrap(), settings);
        }
    }

    #[test]
    fn file_form_wraps_the_token() {
        let settings = busy_settings();
        let bytes = settings.to_file_bytes().unwrap();
        assert_eq!(&bytes[..4], &VERSION.to_be_bytes());
        assert_eq!(Settings::from_file_bytes(&bytes).unwrap(), settings);
        assert!(Settings::from_file_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn any_flipped_bit_fails_the_checksum() {
        let token = busy_settings().to_token().unwrap();
        let data = STANDARD.decode(token).unwrap();
        for byte in 0..data.len() - 8 {
            for bit in 0..8 {
                let mut broken = data.clone();
                broken[byte] ^= 1 << bit;
                let result = Settings::from_token(&STANDARD.encode(&broken));
                assert!(
                    matches!(result, Err(RandomiserError::Integrity(_))),
                    "byte {byte} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn rejects_ancient_and_newer_versions() {
        let mut data = STANDARD.decode(Settings::default().to_token().unwrap()).unwrap();
        data[..4].copy_from_slice(&(VERSION + 1).to_be_bytes());
        reseal(&mut data);
        assert!(matches!(
            Settings::from_token(&STANDARD.encode(&data)),
            Err(RandomiserError::Version(_))
        ));

        data[..4].copy_from_slice(&[100, 0, 0, 1]);
        reseal(&mut data);
        assert!(matches!(
            Settings::from_token(&STANDARD.encode(&data)),
            Err(RandomiserError::Version(_))
        ));
    }

    #[test]
    fn enum_groups_must_have_one_bit() {
        let mut data = STANDARD.decode(Settings::default().to_token().unwrap()).unwrap();
        // starters byte: Unchanged and Custom at once
        data[8 + 1] = 0b0011;
        reseal(&mut data);
        assert!(matches!(
            Settings::from_token(&STANDARD.encode(&data)),
            Err(RandomiserError::Format(_))
        ));

        data[8 + 1] = 0;
        reseal(&mut data);
        let settings = Settings::from_token(&STANDARD.encode(&data)).unwrap();
        assert_eq!(settings.starters_mod, StartersMod::Unchanged);
    }

    #[test]
    fn length_field_is_checked() {
        let mut data = STANDARD.decode(busy_settings().to_token().unwrap()).unwrap();
        data[7] += 1;
        reseal(&mut data);
        assert!(matches!(
            Settings::from_token(&STANDARD.encode(&data)),
            Err(RandomiserError::Format(_))
        ));
        assert!(matches!(
            Settings::from_token("not base64!"),
            Err(RandomiserError::Base64(_))
        ));
    }

    #[test]
    fn reference_checksum_is_reported_not_enforced() {
        let mut settings = Settings::default();
        assert!(settings.reference_checksum_matches(None));
        settings.set_reference_file(Some("Alpha\nBeta\n"));
        let decoded = Settings::from_token(&settings.to_token().unwrap()).unwrap();
        assert!(decoded.reference_checksum_matches(Some("Alpha\n\nBeta")));
        assert!(!decoded.reference_checksum_matches(None));
    }

    #[test]
    fn tweaks_run_by_priority() {
        let all = MiscTweak::ALL.iter().fold(0, |m, t| m | t.bit());
        let chosen = MiscTweak::FastestText.bit() | MiscTweak::BanLuckyEgg.bit() | MiscTweak::BwExpPatch.bit();
        assert_eq!(
            MiscTweak::selected(all, chosen),
            vec![MiscTweak::BanLuckyEgg, MiscTweak::BwExpPatch, MiscTweak::FastestText]
        );
        assert_eq!(MiscTweak::selected(MiscTweak::FastestText.bit(), chosen), vec![MiscTweak::FastestText]);
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"trainers_mod":"Random"}"#).unwrap();
        assert_eq!(settings.trainers_mod, TrainersMod::Random);
        assert!(settings.trainers_block_legendaries);
        assert_eq!(settings.trainers_force_fully_evolved_level, 30);
    }
}
