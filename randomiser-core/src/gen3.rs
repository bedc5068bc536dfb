use std::collections::{BTreeSet, HashSet};

use crate::evolution::rewrite_evolutions;
use crate::handler::{
    apply_catalog_tweak, apply_encounter_bans, apply_legendary_override, catalog_tweaks,
    expect_same_trainers, moves_at_level, patch_friendship, read_statics, tag_trainers,
    write_statics, RomHandler,
};
use crate::layout::{Catalog, Gen3Entry};
use crate::model::{
    Encounter, EncounterSet, Evolution, EvolutionMethod, EvolutionUpdate, ExpCurve, Generation,
    IndexMap, MoveLearnt, Pokedex, Species, SpeciesId, StaticEncounter, Trainer, TrainerPokemon,
    Type, CLAMPERL, POKETYPE_CUSTOM_MOVES, POKETYPE_HELD_ITEMS, POLIWHIRL, SEADRA, SLOWPOKE,
};
use crate::rom::Rom;
use crate::settings::MiscTweak;
use crate::text::{TextTable, GBA_TERMINATOR, GBA_VARIABLE_ESCAPE};
use crate::{RandomiserError, Result};

const STATS_ENTRY_SIZE: usize = 0x1C;
const EVOLUTION_SLOTS: usize = 5;
const EVOLUTION_SLOT_SIZE: usize = 8;
const EVOLUTIONS_PER_SPECIES: usize = EVOLUTION_SLOTS * EVOLUTION_SLOT_SIZE;
const MOVESET_END: u16 = 0xFFFF;

const TRAINER_NAME_LENGTH: usize = 12;
const SMALL_POKEMON_SIZE: usize = 8;
const LARGE_POKEMON_SIZE: usize = 16;

const WILD_HEADER_SIZE: usize = 20;
const WILD_SLOT_SIZE: usize = 4;
/// (header offset, slot count, label) for grass, water, rock smash, fishing.
const WILD_KINDS: [(usize, usize, &str); 4] = [
    (4, 12, "Grass/Cave"),
    (8, 5, "Surfing"),
    (12, 5, "Rock Smash"),
    (16, 10, "Fishing"),
];

const SHADOW_TAG: u16 = 23;
const MAGNET_PULL: u16 = 42;
const ARENA_TRAP: u16 = 71;

const SUN_STONE: u16 = 93;
const MOON_STONE: u16 = 94;
const WATER_STONE: u16 = 97;
const DEEP_SEA_TOOTH: u16 = 192;
const DEEP_SEA_SCALE: u16 = 193;

const FRIENDSHIP_VANILLA: u8 = 219;
const FRIENDSHIP_EASY: u8 = 159;

const RUN_INDOORS_ENABLED: u8 = 0x00;

fn gba_type_from_byte(b: u8) -> Type {
    match b {
        0x00 => Type::Normal,
        0x01 => Type::Fighting,
        0x02 => Type::Flying,
        0x03 => Type::Poison,
        0x04 => Type::Ground,
        0x05 => Type::Rock,
        0x06 => Type::Bug,
        0x07 => Type::Ghost,
        0x08 => Type::Steel,
        0x0A => Type::Fire,
        0x0B => Type::Water,
        0x0C => Type::Grass,
        0x0D => Type::Electric,
        0x0E => Type::Psychic,
        0x0F => Type::Ice,
        0x10 => Type::Dragon,
        0x11 => Type::Dark,
        other => {
            log::warn!("unknown type byte 0x{other:02X}, reading it as normal");
            Type::Normal
        }
    }
}

fn gba_type_byte(t: Type) -> u8 {
    match t {
        Type::Normal | Type::Fairy => 0x00,
        Type::Fighting => 0x01,
        Type::Flying => 0x02,
        Type::Poison => 0x03,
        Type::Ground => 0x04,
        Type::Rock => 0x05,
        Type::Bug => 0x06,
        Type::Ghost => 0x07,
        Type::Steel => 0x08,
        Type::Fire => 0x0A,
        Type::Water => 0x0B,
        Type::Grass => 0x0C,
        Type::Electric => 0x0D,
        Type::Psychic => 0x0E,
        Type::Ice => 0x0F,
        Type::Dragon => 0x10,
        Type::Dark => 0x11,
    }
}

fn iv_from_byte(b: u8) -> u8 {
    (u32::from(b) * 31 / 255) as u8
}

fn iv_to_byte(iv: u8) -> u16 {
    (1 + u16::from(iv) * 255 / 31).min(255)
}

/// One wild table: `header` holds the rate byte, `data` the slots.
struct WildTable {
    name: String,
    header: usize,
    data: usize,
    slots: usize,
}

pub struct Gen3Handler {
    rom: Rom,
    entry: Gen3Entry,
    text: TextTable,
    index: IndexMap,
    dex: Pokedex,
}

impl Gen3Handler {
    pub fn load(rom: &Rom, catalog: &Catalog) -> Result<Option<Self>> {
        let Some(entry) = catalog.find_gen3(rom) else {
            return Ok(None);
        };
        let entry = entry.clone();
        let text = entry
            .common
            .text
            .load(GBA_TERMINATOR)?
            .with_variable_escape(GBA_VARIABLE_ESCAPE);
        let order = (0..entry.pokemon_count)
            .map(|i| {
                let dex = rom.read_word(entry.pokedex_order + i * 2)?;
                Ok(if dex as usize > entry.pokedex_count { 0 } else { dex })
            })
            .collect::<Result<Vec<u16>>>()?;
        let mut handler = Gen3Handler {
            rom: rom.clone(),
            index: IndexMap::from_order_table(&order),
            dex: Pokedex::new(entry.pokedex_count),
            entry,
            text,
        };
        handler.load_species()?;
        handler.load_evolutions_and_moves()?;
        apply_legendary_override(&mut handler.dex, handler.entry.common.legendaries.as_deref());
        log::info!(
            "{}: {} species, {} internal slots",
            handler.entry.common.name,
            handler.dex.len(),
            handler.entry.pokemon_count
        );
        Ok(Some(handler))
    }

    fn owned_indices(&self) -> Vec<(u16, SpeciesId)> {
        (1..=self.entry.pokemon_count as u16)
            .filter_map(|internal| {
                let dex = self.index.dex(internal);
                let owns = dex != 0 && self.index.internal(dex).ok() == Some(internal);
                owns.then_some((internal, dex))
            })
            .collect()
    }

    fn stats_offset(&self, internal: u16) -> usize {
        self.entry.stats + internal as usize * STATS_ENTRY_SIZE
    }

    fn load_species(&mut self) -> Result<()> {
        for (internal, dex) in self.owned_indices() {
            let at = self.stats_offset(internal);
            let name_at = self.entry.names + internal as usize * self.entry.name_length;
            let name = self
                .text
                .decode(self.rom.read_bytes(name_at, self.entry.name_length)?);
            let primary = gba_type_from_byte(self.rom.read_byte(at + 6)?);
            let secondary = gba_type_from_byte(self.rom.read_byte(at + 7)?);

            let mut species = Species::new(dex, name, primary);
            species.secondary_type = (secondary != primary).then_some(secondary);
            species.hp = self.rom.read_byte(at)?;
            species.attack = self.rom.read_byte(at + 1)?;
            species.defense = self.rom.read_byte(at + 2)?;
            species.speed = self.rom.read_byte(at + 3)?;
            species.sp_atk = self.rom.read_byte(at + 4)?;
            species.sp_def = self.rom.read_byte(at + 5)?;
            species.catch_rate = self.rom.read_byte(at + 8)?;
            species.exp_yield = self.rom.read_byte(at + 9)?;
            let common = self.rom.read_word(at + 12)?;
            let rare = self.rom.read_word(at + 14)?;
            if common == rare {
                species.guaranteed_held_item = common;
            } else {
                species.common_held_item = common;
                species.rare_held_item = rare;
            }
            species.gender_ratio = self.rom.read_byte(at + 16)?;
            species.growth_curve = ExpCurve::from_byte(self.rom.read_byte(at + 19)?);
            species.abilities[0] = u16::from(self.rom.read_byte(at + 22)?);
            species.abilities[1] = u16::from(self.rom.read_byte(at + 23)?);
            self.dex.insert(species);
        }
        Ok(())
    }

    fn load_evolutions_and_moves(&mut self) -> Result<()> {
        let count = self.entry.pokemon_count as u16;
        let mut evolutions = Vec::new();
        for (internal, dex) in self.owned_indices() {
            let base = self.entry.evolutions + internal as usize * EVOLUTIONS_PER_SPECIES;
            for slot in 0..EVOLUTION_SLOTS {
                let at = base + slot * EVOLUTION_SLOT_SIZE;
                let method = self.rom.read_word(at)?;
                let extra = self.rom.read_word(at + 2)?;
                let target = self.rom.read_word(at + 4)?;
                let Some(method) = EvolutionMethod::from_gen3_index(method) else {
                    continue;
                };
                if target == 0 || target > count {
                    continue;
                }
                let to = self.index.dex(target);
                let evo = Evolution::new(dex, to, method, extra);
                if to != 0 && !evolutions.contains(&evo) {
                    evolutions.push(evo);
                }
            }

            let mut at = self
                .rom
                .read_gba_pointer(self.entry.movesets + internal as usize * 4)?;
            let mut moves = Vec::new();
            loop {
                let word = self.rom.read_word(at)?;
                if word == MOVESET_END {
                    break;
                }
                moves.push(MoveLearnt {
                    level: (word >> 9) as u8,
                    move_id: word & 0x1FF,
                });
                at += 2;
            }
            if let Some(species) = self.dex.get_mut(dex) {
                species.moves_learnt = moves;
            }
        }
        for evo in evolutions {
            self.dex.add_evolution(evo);
        }
        self.dex.mark_split_evolutions();
        Ok(())
    }

    fn save_species(&mut self) -> Result<()> {
        for (internal, dex) in self.owned_indices() {
            let at = self.stats_offset(internal);
            let species = self.dex.species(dex)?;
            let primary = gba_type_byte(species.primary_type);
            let secondary = species.secondary_type.map_or(primary, gba_type_byte);
            let ability1 = species.abilities[0] as u8;
            let ability2 = match species.abilities[1] {
                0 => ability1,
                other => other as u8,
            };
            let (common, rare) = if species.guaranteed_held_item > 0 {
                (species.guaranteed_held_item, species.guaranteed_held_item)
            } else {
                (species.common_held_item, species.rare_held_item)
            };
            let stats = [
                species.hp,
                species.attack,
                species.defense,
                species.speed,
                species.sp_atk,
                species.sp_def,
                primary,
                secondary,
                species.catch_rate,
                species.exp_yield,
            ];
            let gender = species.gender_ratio;
            let growth = species.growth_curve.to_byte();

            self.rom.write_bytes(at, &stats)?;
            self.rom.write_word(at + 12, common)?;
            self.rom.write_word(at + 14, rare)?;
            self.rom.write_byte(at + 16, gender)?;
            self.rom.write_byte(at + 19, growth)?;
            self.rom.write_bytes(at + 22, &[ability1, ability2])?;
        }
        Ok(())
    }

    fn save_evolutions(&mut self) -> Result<()> {
        for (internal, dex) in self.owned_indices() {
            let base = self.entry.evolutions + internal as usize * EVOLUTIONS_PER_SPECIES;
            let species = self.dex.species(dex)?;
            if species.evolutions_from.len() > EVOLUTION_SLOTS {
                return Err(RandomiserError::Format(format!(
                    "{} has {} evolutions, only {EVOLUTION_SLOTS} fit",
                    species.name,
                    species.evolutions_from.len()
                )));
            }
            let mut table = vec![0u8; EVOLUTIONS_PER_SPECIES];
            for (slot, evo) in species.evolutions_from.iter().enumerate() {
                let at = slot * EVOLUTION_SLOT_SIZE;
                let target = self.index.internal(evo.to)?;
                table[at..at + 2].copy_from_slice(&evo.method.gen3_index().to_le_bytes());
                table[at + 2..at + 4].copy_from_slice(&evo.extra.to_le_bytes());
                table[at + 4..at + 6].copy_from_slice(&target.to_le_bytes());
            }
            self.rom.write_bytes(base, &table)?;
        }
        Ok(())
    }

    fn trainer_offset(&self, index: usize) -> usize {
        self.entry.trainers + index * self.entry.trainer_entry_size
    }

    fn read_trainers(&self) -> Result<Vec<Trainer>> {
        let size = self.entry.trainer_entry_size;
        let mut trainers = Vec::new();
        for index in 1..self.entry.trainer_count {
            let at = self.trainer_offset(index);
            let mut trainer = Trainer::new(index, at);
            trainer.poketype = self.rom.read_byte(at)?;
            trainer.name = self
                .text
                .decode(self.rom.read_bytes(at + 4, TRAINER_NAME_LENGTH)?);
            let count = self.rom.read_byte(at + size - 8)? as usize;
            let roster = self.rom.read_gba_pointer(at + size - 4)?;
            let block = if trainer.uses_custom_moves() {
                LARGE_POKEMON_SIZE
            } else {
                SMALL_POKEMON_SIZE
            };
            for slot in 0..count {
                let p = roster + slot * block;
                let iv = self.rom.read_word(p)? as u8;
                let level = self.rom.read_word(p + 2)? as u8;
                let species = self.index.dex(self.rom.read_word(p + 4)?);
                let mut pokemon = TrainerPokemon::new(species, level);
                pokemon.iv = iv_from_byte(iv);
                let mut moves_at = p + 6;
                if trainer.uses_held_items() {
                    pokemon.held_item = self.rom.read_word(p + 6)?;
                    moves_at = p + 8;
                }
                if trainer.uses_custom_moves() {
                    for (m, move_id) in pokemon.moves.iter_mut().enumerate() {
                        *move_id = self.rom.read_word(moves_at + m * 2)?;
                    }
                }
                trainer.pokemon.push(pokemon);
            }
            trainers.push(trainer);
        }
        tag_trainers(&mut trainers, &self.entry.common.trainer_tags);
        Ok(trainers)
    }

    fn write_trainer(&mut self, original: &Trainer, trainer: &Trainer) -> Result<()> {
        let size = self.entry.trainer_entry_size;
        let roster = self.rom.read_gba_pointer(original.offset + size - 4)?;
        let custom_moves = original.poketype & POKETYPE_CUSTOM_MOVES != 0;
        let held_items = original.poketype & POKETYPE_HELD_ITEMS != 0;
        let block = if custom_moves {
            LARGE_POKEMON_SIZE
        } else {
            SMALL_POKEMON_SIZE
        };
        for (slot, pokemon) in trainer.pokemon.iter().enumerate() {
            let p = roster + slot * block;
            let internal = self.index.internal(pokemon.species)?;
            self.rom.write_word(p, iv_to_byte(pokemon.iv))?;
            self.rom.write_word(p + 2, u16::from(pokemon.level))?;
            self.rom.write_word(p + 4, internal)?;
            if !custom_moves {
                let item = if held_items { pokemon.held_item } else { 0 };
                self.rom.write_word(p + 6, item)?;
                continue;
            }
            let moves_at = if held_items {
                self.rom.write_word(p + 6, pokemon.held_item)?;
                p + 8
            } else {
                self.rom.write_word(p + 14, 0)?;
                p + 6
            };
            let moves = if pokemon.reset_moves {
                moves_at_level(&self.dex.species(pokemon.species)?.moves_learnt, pokemon.level)
            } else {
                pokemon.moves
            };
            for (m, &move_id) in moves.iter().enumerate() {
                self.rom.write_word(moves_at + m * 2, move_id)?;
            }
        }
        Ok(())
    }

    /// Tables reached from the map headers, each data block only once.
    fn wild_tables(&self) -> Result<Vec<WildTable>> {
        let mut tables = Vec::new();
        let mut seen = HashSet::new();
        let mut at = self.entry.wild_headers;
        loop {
            let bank = self.rom.read_byte(at)?;
            let map = self.rom.read_byte(at + 1)?;
            if bank == 0xFF && map == 0xFF {
                break;
            }
            let map_name = self.entry.common.map_name(bank, map);
            for (pointer_at, slots, label) in WILD_KINDS {
                let Ok(header) = self.rom.read_gba_pointer(at + pointer_at) else {
                    continue;
                };
                if self.rom.read_byte(header)? == 0 {
                    continue;
                }
                let Ok(data) = self.rom.read_gba_pointer(header + 4) else {
                    continue;
                };
                if !seen.insert(data) {
                    continue;
                }
                tables.push(WildTable {
                    name: format!("{map_name} {label}"),
                    header,
                    data,
                    slots,
                });
            }
            at += WILD_HEADER_SIZE;
        }
        Ok(tables)
    }

    fn battle_trappers(&self) -> BTreeSet<SpeciesId> {
        self.dex
            .iter()
            .filter(|s| [SHADOW_TAG, MAGNET_PULL, ARENA_TRAP].iter().any(|&a| s.has_ability(a)))
            .map(|s| s.id)
            .collect()
    }
}

impl RomHandler for Gen3Handler {
    fn generation(&self) -> Generation {
        Generation::Gen3
    }

    fn rom_name(&self) -> &str {
        &self.entry.common.name
    }

    fn rom(&self) -> &Rom {
        &self.rom
    }

    fn pokedex(&self) -> &Pokedex {
        &self.dex
    }

    fn pokedex_mut(&mut self) -> &mut Pokedex {
        &mut self.dex
    }

    fn starter_count(&self) -> usize {
        self.entry.common.starters.len()
    }

    fn starters(&self) -> Result<Vec<SpeciesId>> {
        self.entry
            .common
            .starters
            .iter()
            .map(|offsets| {
                let at = offsets.first().ok_or_else(|| {
                    RandomiserError::Config("starter slot has no offsets".to_string())
                })?;
                Ok(self.index.dex(self.rom.read_word(*at)?))
            })
            .collect()
    }

    fn set_starters(&mut self, starters: &[SpeciesId]) -> Result<()> {
        if starters.len() != self.starter_count() {
            return Err(RandomiserError::Format(format!(
                "{} starters given for {} slots",
                starters.len(),
                self.starter_count()
            )));
        }
        for (offsets, &species) in self.entry.common.starters.iter().zip(starters) {
            let internal = self.index.internal(species)?;
            for &at in offsets {
                self.rom.write_word(at, internal)?;
            }
        }
        Ok(())
    }

    fn trainers(&self) -> Result<Vec<Trainer>> {
        self.read_trainers()
    }

    fn set_trainers(&mut self, trainers: &[Trainer]) -> Result<()> {
        let layout = self.read_trainers()?;
        expect_same_trainers(&layout, trainers)?;
        for (original, trainer) in layout.iter().zip(trainers) {
            self.write_trainer(original, trainer)?;
        }
        Ok(())
    }

    fn encounters(&self, _use_time_based: bool) -> Result<Vec<EncounterSet>> {
        let mut sets = Vec::new();
        for table in self.wild_tables()? {
            let mut set = EncounterSet::new(table.name, self.rom.read_byte(table.header)?);
            for slot in 0..table.slots {
                let at = table.data + slot * WILD_SLOT_SIZE;
                let species = self.index.dex(self.rom.read_word(at + 2)?);
                let mut encounter = Encounter::new(species, self.rom.read_byte(at)?);
                encounter.max_level = self.rom.read_byte(at + 1)?;
                set.encounters.push(encounter);
            }
            sets.push(set);
        }
        if !self.entry.battle_trapper_bans.is_empty() {
            let trappers = self.battle_trappers();
            for &index in &self.entry.battle_trapper_bans {
                match sets.get_mut(index) {
                    Some(set) => set.banned.extend(trappers.iter().copied()),
                    None => log::warn!("battle trapper ban for table {index}, which does not exist"),
                }
            }
        }
        apply_encounter_bans(&mut sets, &self.entry.common.encounter_bans);
        Ok(sets)
    }

    fn set_encounters(&mut self, _use_time_based: bool, sets: &[EncounterSet]) -> Result<()> {
        let tables = self.wild_tables()?;
        if tables.len() != sets.len() {
            return Err(RandomiserError::Format(format!(
                "{} encounter tables given, ROM holds {}",
                sets.len(),
                tables.len()
            )));
        }
        for (table, set) in tables.iter().zip(sets) {
            if set.encounters.len() != table.slots {
                return Err(RandomiserError::Format(format!(
                    "encounter table '{}' changed size",
                    table.name
                )));
            }
            for (slot, encounter) in set.encounters.iter().enumerate() {
                let at = table.data + slot * WILD_SLOT_SIZE;
                let internal = self.index.internal(encounter.species)?;
                self.rom
                    .write_bytes(at, &[encounter.level, encounter.max_level])?;
                self.rom.write_word(at + 2, internal)?;
            }
        }
        Ok(())
    }

    fn static_pokemon(&self) -> Result<Vec<StaticEncounter>> {
        let index = &self.index;
        read_statics(&self.rom, &self.entry.common.statics, &|rom: &Rom, at: usize| {
            Ok(index.dex(rom.read_word(at)?))
        })
    }

    fn set_static_pokemon(&mut self, statics: &[StaticEncounter]) -> Result<()> {
        let index = &self.index;
        write_statics(
            &mut self.rom,
            &self.entry.common.statics,
            statics,
            &|rom: &mut Rom, at: usize, species: SpeciesId| {
                rom.write_word(at, index.internal(species)?)
            },
        )
    }

    fn can_change_static_pokemon(&self) -> bool {
        !self.entry.common.statics.is_empty()
    }

    fn set_intro_species(&mut self, species: SpeciesId) -> Result<()> {
        let internal = self.index.internal(species)?;
        for &at in &self.entry.common.intro_offsets {
            self.rom.write_word(at, internal)?;
        }
        Ok(())
    }

    fn remove_impossible_evolutions(&mut self) -> BTreeSet<EvolutionUpdate> {
        let frlg = self.entry.frlg;
        rewrite_evolutions(&mut self.dex, |evo| match evo.method {
            EvolutionMethod::HappinessDay if frlg => Some((EvolutionMethod::Stone, SUN_STONE)),
            EvolutionMethod::HappinessNight if frlg => Some((EvolutionMethod::Stone, MOON_STONE)),
            EvolutionMethod::LevelHighBeauty if frlg => Some((EvolutionMethod::Level, 35)),
            EvolutionMethod::Trade => Some((EvolutionMethod::Level, 37)),
            EvolutionMethod::TradeItem => Some(match (evo.from, evo.extra) {
                (POLIWHIRL, _) => (EvolutionMethod::Level, 37),
                (SLOWPOKE, _) => (EvolutionMethod::Stone, WATER_STONE),
                (SEADRA, _) => (EvolutionMethod::Level, 40),
                (CLAMPERL, DEEP_SEA_TOOTH) => (EvolutionMethod::Level, 30),
                (CLAMPERL, DEEP_SEA_SCALE) => (EvolutionMethod::Stone, WATER_STONE),
                _ => (EvolutionMethod::Level, 30),
            }),
            _ => None,
        })
    }

    fn remove_time_based_evolutions(&mut self) -> BTreeSet<EvolutionUpdate> {
        rewrite_evolutions(&mut self.dex, |evo| match evo.method {
            EvolutionMethod::HappinessDay => Some((EvolutionMethod::Stone, SUN_STONE)),
            EvolutionMethod::HappinessNight => Some((EvolutionMethod::Stone, MOON_STONE)),
            _ => None,
        })
    }

    fn patch_friendship_threshold(&mut self) -> Result<bool> {
        let mut edits = vec![(0, FRIENDSHIP_VANILLA, FRIENDSHIP_EASY)];
        if !self.entry.frlg {
            edits.push((38, FRIENDSHIP_VANILLA, FRIENDSHIP_EASY));
            edits.push((66, FRIENDSHIP_VANILLA, FRIENDSHIP_EASY));
        }
        patch_friendship(
            &mut self.rom,
            self.entry.common.friendship_locator.as_deref(),
            &edits,
        )
    }

    fn misc_tweaks_available(&self) -> u32 {
        let mut available = catalog_tweaks(&self.entry.common);
        if self.entry.run_indoors_offset.is_some() {
            available |= MiscTweak::RunningShoesIndoors.bit();
        }
        available
    }

    fn apply_misc_tweak(&mut self, tweak: MiscTweak) -> Result<()> {
        match (tweak, self.entry.run_indoors_offset) {
            (MiscTweak::RunningShoesIndoors, Some(at)) => {
                self.rom.write_byte(at, RUN_INDOORS_ENABLED)
            }
            _ => apply_catalog_tweak(&mut self.rom, &self.entry.common, tweak),
        }
    }

    fn check_value_offset(&self) -> Option<usize> {
        self.entry.common.check_value_offset
    }

    fn save(&mut self) -> Result<Vec<u8>> {
        self.save_species()?;
        self.save_evolutions()?;
        Ok(self.rom.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::{iv_from_byte, iv_to_byte, Gen3Handler};
    use crate::handler::RomHandler;
    use crate::layout::Catalog;
    use crate::model::{EvolutionMethod, Type};
    use crate::rom::{Rom, GBA_ROM_CODE_OFFSET};
    use crate::settings::MiscTweak;
    use serde_json::json;

    const ORDER: usize = 0x1000;
    const STATS: usize = 0x2000;
    const NAMES: usize = 0x3000;
    const EVOLUTIONS: usize = 0x4000;
    const MOVESETS: usize = 0x5000;
    const MOVE_DATA: usize = 0x5100;
    const TRAINERS: usize = 0x6000;
    const WILD: usize = 0x7000;

    // Internal 1..=7. Internal 4 is an unused slot; 5, 6 and 7 hold dex 4,
    // Clamperl and its evolution (traded holding a scale).
    fn catalog(frlg: bool) -> Catalog {
        Catalog::from_json(
            &json!({
                "gen3": [{
                    "name": "Test Emerald",
                    "text_table": "BB=A\nBC=B\n00= \n",
                    "rom_code": "BPEE",
                    "version": 0,
                    "frlg": frlg,
                    "pokemon_count": 7,
                    "pokedex_order": ORDER,
                    "stats": STATS,
                    "names": NAMES,
                    "evolutions": EVOLUTIONS,
                    "movesets": MOVESETS,
                    "trainers": TRAINERS,
                    "trainer_count": 3,
                    "wild_headers": WILD,
                    "battle_trapper_bans": [0],
                    "starters": [["0x100"], ["0x102", "0x104"]],
                    "statics": [{ "species_offsets": ["0x110"], "level_offsets": ["0x112"] }],
                    "intro_offsets": ["0x120"],
                    "run_indoors_offset": "0x130",
                    "map_names": { "0.1": "Route 101" }
                }]
            })
            .to_string(),
        )
        .unwrap()
    }

    fn rom() -> Rom {
        let mut rom = Rom::new(vec![0; 0x10000]);
        rom.write_bytes(GBA_ROM_CODE_OFFSET, b"BPEE").unwrap();
        for (i, dex) in [1u16, 2, 3, 0, 4, 366, 367].iter().enumerate() {
            rom.write_word(ORDER + i * 2, *dex).unwrap();
        }
        for internal in 1..=7usize {
            let at = STATS + internal * 0x1C;
            rom.write_bytes(at, &[45, 49, 49, 45, 65, 65, 0x0C, 0x03, 45, 64]).unwrap();
            rom.write_bytes(NAMES + internal * 11, &[0xBB, 0xFF]).unwrap();
            rom.write_gba_pointer(MOVESETS + internal * 4, MOVE_DATA).unwrap();
        }
        // internal 3 is a single water type holding a guaranteed item with Arena Trap
        let at = STATS + 3 * 0x1C;
        rom.write_bytes(at + 6, &[0x0B, 0x0B]).unwrap();
        rom.write_word(at + 12, 7).unwrap();
        rom.write_word(at + 14, 7).unwrap();
        rom.write_bytes(at + 22, &[71, 0]).unwrap();
        rom.write_bytes(MOVE_DATA, &[33, 2, 45, 6, 0xFF, 0xFF]).unwrap();

        // 1 -> 2 at 16, 6 (dex 366) -> 7 (dex 367) by trade item 193
        rom.write_bytes(EVOLUTIONS + 0x28, &[4, 0, 16, 0, 2, 0, 0, 0]).unwrap();
        rom.write_bytes(EVOLUTIONS + 6 * 0x28, &[6, 0, 193, 0, 7, 0, 0, 0]).unwrap();
        // invalid method and out-of-range target are ignored
        rom.write_bytes(EVOLUTIONS + 2 * 0x28, &[99, 0, 1, 0, 3, 0, 0, 0]).unwrap();
        rom.write_bytes(EVOLUTIONS + 2 * 0x28 + 8, &[4, 0, 1, 0, 50, 0, 0, 0]).unwrap();

        // trainer 1: items + moves, one pokemon; trainer 2: plain, two
        let t1 = TRAINERS + 40;
        rom.write_byte(t1, 3).unwrap();
        rom.write_bytes(t1 + 4, &[0xBC, 0xBB, 0xFF]).unwrap();
        rom.write_byte(t1 + 32, 1).unwrap();
        rom.write_gba_pointer(t1 + 36, 0x6200).unwrap();
        rom.write_bytes(0x6200, &[255, 0, 30, 0, 1, 0, 7, 0, 33, 0, 45, 0, 0, 0, 0, 0]).unwrap();
        let t2 = TRAINERS + 80;
        rom.write_byte(t2 + 32, 2).unwrap();
        rom.write_gba_pointer(t2 + 36, 0x6300).unwrap();
        rom.write_bytes(0x6300, &[0, 0, 5, 0, 2, 0, 0, 0, 0, 0, 6, 0, 3, 0, 0, 0]).unwrap();

        // one map with grass and a surfing table sharing the grass data
        rom.write_bytes(WILD, &[0, 1]).unwrap();
        rom.write_gba_pointer(WILD + 4, 0x7100).unwrap();
        rom.write_gba_pointer(WILD + 8, 0x7110).unwrap();
        rom.write_bytes(WILD + 20, &[0xFF, 0xFF]).unwrap();
        rom.write_byte(0x7100, 20).unwrap();
        rom.write_gba_pointer(0x7104, 0x7200).unwrap();
        rom.write_byte(0x7110, 4).unwrap();
        rom.write_gba_pointer(0x7114, 0x7200).unwrap();
        for slot in 0..12 {
            rom.write_bytes(0x7200 + slot * 4, &[3, 5, 1, 0]).unwrap();
        }

        rom.write_word(0x100, 1).unwrap();
        rom.write_word(0x102, 5).unwrap();
        rom.write_word(0x104, 5).unwrap();
        rom.write_bytes(0x110, &[6, 0, 30]).unwrap();
        rom
    }

    fn handler(frlg: bool) -> Gen3Handler {
        Gen3Handler::load(&rom(), &catalog(frlg)).unwrap().unwrap()
    }

    #[test]
    fn iv_scaling_matches_trainer_difficulty() {
        assert_eq!(iv_from_byte(255), 31);
        assert_eq!(iv_from_byte(0), 0);
        assert_eq!(iv_to_byte(31), 255);
        assert_eq!(iv_to_byte(0), 1);
        assert_eq!(iv_from_byte(iv_to_byte(12) as u8), 12);
    }

    #[test]
    fn maps_internal_indices_to_dex_numbers() {
        let handler = handler(false);
        let dex = handler.pokedex();
        assert_eq!(dex.len(), 6);
        assert_eq!(dex.get(4).unwrap().name, "A");
        let water = dex.get(3).unwrap();
        assert_eq!((water.primary_type, water.secondary_type), (Type::Water, None));
        assert_eq!(water.guaranteed_held_item, 7);
        let grass = dex.get(1).unwrap();
        assert_eq!(grass.secondary_type, Some(Type::Poison));
        assert_eq!(grass.moves_learnt.len(), 2);
        assert_eq!(grass.moves_learnt[1].level, 3);
        assert_eq!(grass.moves_learnt[1].move_id, 45);

        assert_eq!(dex.get(1).unwrap().evolutions_from[0].to, 2);
        assert!(dex.get(3).unwrap().evolutions_from.is_empty());
        let clamperl = &dex.get(366).unwrap().evolutions_from[0];
        assert_eq!((clamperl.to, clamperl.method, clamperl.extra), (367, EvolutionMethod::TradeItem, 193));
    }

    #[test]
    fn trade_item_evolutions_depend_on_species_and_item() {
        let mut handler = handler(false);
        let updates = handler.remove_impossible_evolutions();
        assert_eq!(updates.len(), 1);
        let clamperl = &handler.pokedex().get(366).unwrap().evolutions_from[0];
        assert_eq!((clamperl.method, clamperl.extra), (EvolutionMethod::Stone, 97));

        let bytes = handler.save().unwrap();
        assert_eq!(&bytes[EVOLUTIONS + 6 * 0x28..EVOLUTIONS + 6 * 0x28 + 8], &[7, 0, 97, 0, 7, 0, 0, 0]);
        // the ignored slots are cleared on write
        assert_eq!(&bytes[EVOLUTIONS + 2 * 0x28..EVOLUTIONS + 2 * 0x28 + 16], &[0; 16]);
        // single type and empty second ability are written as duplicates
        assert_eq!(&bytes[STATS + 3 * 0x1C + 22..STATS + 3 * 0x1C + 24], &[71, 71]);
    }

    #[test]
    fn trainers_read_both_block_sizes() {
        let mut handler = handler(false);
        let mut trainers = handler.trainers().unwrap();
        assert_eq!(trainers.len(), 2);
        assert_eq!(trainers[0].name, "BA");
        let ace = &trainers[0].pokemon[0];
        assert_eq!((ace.species, ace.level, ace.iv, ace.held_item), (1, 30, 31, 7));
        assert_eq!(ace.moves, [33, 45, 0, 0]);
        assert_eq!(trainers[1].pokemon[1].species, 3);

        trainers[0].pokemon[0].species = 4;
        trainers[0].pokemon[0].reset_moves = true;
        trainers[1].pokemon[0].species = 366;
        handler.set_trainers(&trainers).unwrap();
        let rom = handler.rom();
        assert_eq!(rom.read_word(0x6204).unwrap(), 5);
        assert_eq!(rom.read_bytes(0x6208, 8).unwrap(), &[33, 0, 45, 0, 0, 0, 0, 0]);
        assert_eq!(rom.read_word(0x6304).unwrap(), 6);
    }

    #[test]
    fn shared_wild_data_is_listed_once() {
        let mut handler = handler(false);
        let mut sets = handler.encounters(false).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].name, "Route 101 Grass/Cave");
        assert_eq!(sets[0].encounters.len(), 12);
        assert_eq!((sets[0].encounters[0].level, sets[0].encounters[0].max_level), (3, 5));
        // Arena Trap
        assert!(sets[0].banned.contains(&3));

        sets[0].encounters[0].species = 366;
        handler.set_encounters(false, &sets).unwrap();
        assert_eq!(handler.rom().read_bytes(0x7200, 4).unwrap(), &[3, 5, 6, 0]);
    }

    #[test]
    fn starters_statics_and_tweaks() {
        let mut handler = handler(true);
        assert_eq!(handler.starters().unwrap(), vec![1, 4]);
        handler.set_starters(&[2, 366]).unwrap();
        assert_eq!(handler.rom().read_word(0x104).unwrap(), 6);

        let mut statics = handler.static_pokemon().unwrap();
        assert_eq!((statics[0].species, statics[0].level), (366, 30));
        statics[0].species = 3;
        handler.set_static_pokemon(&statics).unwrap();
        assert_eq!(handler.rom().read_word(0x110).unwrap(), 3);

        handler.set_intro_species(4).unwrap();
        assert_eq!(handler.rom().read_word(0x120).unwrap(), 5);

        assert_ne!(handler.misc_tweaks_available() & MiscTweak::RunningShoesIndoors.bit(), 0);
        handler.apply_misc_tweak(MiscTweak::RunningShoesIndoors).unwrap();
        assert_eq!(handler.rom().read_byte(0x130).unwrap(), 0);
        assert!(handler.apply_misc_tweak(MiscTweak::FastestText).is_err());
    }
}
