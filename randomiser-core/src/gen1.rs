use std::collections::{BTreeSet, HashMap};

use crate::evolution::rewrite_evolutions;
use crate::handler::{
    apply_catalog_tweak, apply_encounter_bans, apply_legendary_override, catalog_tweaks,
    expect_same_trainers, read_slot_tables, read_statics, tag_trainers, write_slot_tables,
    write_statics, RomHandler, SlotLocation, TableLocation,
};
use crate::layout::{Catalog, Gen1Entry};
use crate::model::{
    Evolution, EvolutionMethod, EvolutionUpdate, ExpCurve, Generation, IndexMap, MoveLearnt,
    EncounterSet, Pokedex, Species, SpeciesId, StaticEncounter, Trainer, TrainerPokemon, Type,
    MAROWAK, MEW,
};
use crate::rom::{bank_of, calculate_offset, make_gb_pointer, DataBlock, Rom, GB_BANK_SIZE};
use crate::settings::MiscTweak;
use crate::text::{TextTable, GB_TERMINATOR};
use crate::{RandomiserError, Result};

const SPECIES_COUNT: usize = 151;
const STATS_ENTRY_SIZE: usize = 0x1C;

const EVO_LEVEL: u8 = 1;
const EVO_STONE: u8 = 2;
const EVO_TRADE: u8 = 3;

const WILD_TABLE_END: u16 = 0xFFFF;
const WILD_SLOTS: usize = 10;
const YELLOW_SUPER_ROD_SLOTS: usize = 4;
const TABLE_END: u8 = 0xFF;
const TOWER_MAPS: std::ops::RangeInclusive<usize> = 0x90..=0x94;

const SPECIAL_TRAINER: u8 = 0xFF;
/// Trainer whose entries carry their own levels.
const POKETYPE_SPECIAL: u8 = 1;

pub(crate) const GB_NOP: u8 = 0x00;
pub(crate) const GB_RET: u8 = 0xC9;

/// GB/GBC type bytes. Gen 1 never stores Steel or Dark.
pub(crate) fn gb_type_from_byte(b: u8) -> Type {
    match b {
        0x00 => Type::Normal,
        0x01 => Type::Fighting,
        0x02 => Type::Flying,
        0x03 => Type::Poison,
        0x04 => Type::Ground,
        0x05 => Type::Rock,
        0x07 => Type::Bug,
        0x08 => Type::Ghost,
        0x09 => Type::Steel,
        0x14 => Type::Fire,
        0x15 => Type::Water,
        0x16 => Type::Grass,
        0x17 => Type::Electric,
        0x18 => Type::Psychic,
        0x19 => Type::Ice,
        0x1A => Type::Dragon,
        0x1B => Type::Dark,
        other => {
            log::warn!("unknown type byte 0x{other:02X}, reading it as normal");
            Type::Normal
        }
    }
}

pub(crate) fn gb_type_byte(t: Type) -> u8 {
    match t {
        Type::Normal | Type::Fairy => 0x00,
        Type::Fighting => 0x01,
        Type::Flying => 0x02,
        Type::Poison => 0x03,
        Type::Ground => 0x04,
        Type::Rock => 0x05,
        Type::Bug => 0x07,
        Type::Ghost => 0x08,
        Type::Steel => 0x09,
        Type::Fire => 0x14,
        Type::Water => 0x15,
        Type::Grass => 0x16,
        Type::Electric => 0x17,
        Type::Psychic => 0x18,
        Type::Ice => 0x19,
        Type::Dragon => 0x1A,
        Type::Dark => 0x1B,
    }
}

pub struct Gen1Handler {
    rom: Rom,
    entry: Gen1Entry,
    text: TextTable,
    index: IndexMap,
    dex: Pokedex,
}

impl Gen1Handler {
    pub fn load(rom: &Rom, catalog: &Catalog) -> Result<Option<Self>> {
        let Some(entry) = catalog.find_gen1(rom) else {
            return Ok(None);
        };
        let entry = entry.clone();
        let text = entry.common.text.load(GB_TERMINATOR)?;
        let order: Vec<u16> = rom
            .read_bytes(entry.pokedex_order, entry.internal_count)?
            .iter()
            .map(|&b| u16::from(b))
            .collect();
        let mut handler = Gen1Handler {
            rom: rom.clone(),
            entry,
            text,
            index: IndexMap::from_order_table(&order),
            dex: Pokedex::new(SPECIES_COUNT),
        };
        handler.load_species()?;
        handler.load_evolutions_and_moves()?;
        apply_legendary_override(&mut handler.dex, handler.entry.common.legendaries.as_deref());
        log::info!(
            "{}: {} species, {} internal slots",
            handler.entry.common.name,
            handler.dex.len(),
            handler.entry.internal_count
        );
        Ok(Some(handler))
    }

    fn stats_offset(&self, dex: SpeciesId) -> usize {
        match self.entry.mew_stats {
            Some(offset) if dex == MEW => offset,
            _ => self.entry.stats + (dex as usize - 1) * STATS_ENTRY_SIZE,
        }
    }

    /// Internal indices that own a species. Repeats of a dex number are
    /// skipped so each species is read once.
    fn owned_indices(&self) -> Vec<(u16, SpeciesId)> {
        (1..=self.entry.internal_count as u16)
            .filter_map(|internal| {
                let dex = self.index.dex(internal);
                let owns = dex != 0 && self.index.internal(dex).ok() == Some(internal);
                owns.then_some((internal, dex))
            })
            .collect()
    }

    fn load_species(&mut self) -> Result<()> {
        for (internal, dex) in self.owned_indices() {
            let at = self.stats_offset(dex);
            let name_at = self.entry.names + (internal as usize - 1) * self.entry.name_length;
            let name = self
                .text
                .decode(self.rom.read_bytes(name_at, self.entry.name_length)?);
            let primary = gb_type_from_byte(self.rom.read_byte(at + 6)?);
            let secondary = gb_type_from_byte(self.rom.read_byte(at + 7)?);

            let mut species = Species::new(dex, name.trim_end(), primary);
            species.secondary_type = (secondary != primary).then_some(secondary);
            species.hp = self.rom.read_byte(at + 1)?;
            species.attack = self.rom.read_byte(at + 2)?;
            species.defense = self.rom.read_byte(at + 3)?;
            species.speed = self.rom.read_byte(at + 4)?;
            species.sp_atk = self.rom.read_byte(at + 5)?;
            species.sp_def = species.sp_atk;
            species.single_special = true;
            species.catch_rate = self.rom.read_byte(at + 8)?;
            species.exp_yield = self.rom.read_byte(at + 9)?;
            species.growth_curve = ExpCurve::from_byte(self.rom.read_byte(at + 0x13)?);
            self.dex.insert(species);
        }
        Ok(())
    }

    fn load_evolutions_and_moves(&mut self) -> Result<()> {
        let mut evolutions = Vec::new();
        for (internal, dex) in self.owned_indices() {
            let mut at = self
                .rom
                .read_pointer(self.entry.movesets_table + (internal as usize - 1) * 2)?;
            loop {
                let method = self.rom.read_byte(at)?;
                if method == 0 {
                    break;
                }
                let (evo_method, extra, target_at, len) = match method {
                    EVO_LEVEL => (
                        EvolutionMethod::Level,
                        u16::from(self.rom.read_byte(at + 1)?),
                        at + 2,
                        3,
                    ),
                    EVO_STONE => (
                        EvolutionMethod::Stone,
                        u16::from(self.rom.read_byte(at + 1)?),
                        at + 3,
                        4,
                    ),
                    EVO_TRADE => (EvolutionMethod::Trade, 0, at + 2, 3),
                    other => {
                        return Err(RandomiserError::Format(format!(
                            "unknown evolution method {other} at 0x{at:X}"
                        )))
                    }
                };
                let to = self.index.dex(u16::from(self.rom.read_byte(target_at)?));
                if to != 0 {
                    evolutions.push(Evolution::new(dex, to, evo_method, extra));
                }
                at += len;
            }
            at += 1;

            let mut moves = Vec::new();
            loop {
                let level = self.rom.read_byte(at)?;
                if level == 0 {
                    break;
                }
                let move_id = u16::from(self.rom.read_byte(at + 1)?);
                moves.push(MoveLearnt { level, move_id });
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

    fn internal_byte(&self, species: SpeciesId) -> Result<u8> {
        Ok(self.index.internal(species)? as u8)
    }

    fn save_species(&mut self) -> Result<()> {
        for species in self.dex.iter() {
            let at = self.stats_offset(species.id);
            let primary = gb_type_byte(species.primary_type);
            let secondary = species.secondary_type.map_or(primary, gb_type_byte);
            self.rom.write_bytes(
                at + 1,
                &[
                    species.hp,
                    species.attack,
                    species.defense,
                    species.speed,
                    species.sp_atk,
                    primary,
                    secondary,
                    species.catch_rate,
                    species.exp_yield,
                ],
            )?;
            self.rom.write_byte(at + 0x13, species.growth_curve.to_byte())?;
        }
        Ok(())
    }

    fn evolution_entry(&self, species: &Species) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        for evo in &species.evolutions_from {
            let extra = u8::try_from(evo.extra).map_err(|_| {
                RandomiserError::Format(format!(
                    "evolution parameter {} of {} does not fit a byte",
                    evo.extra, species.name
                ))
            })?;
            match evo.method {
                EvolutionMethod::Level => data.extend_from_slice(&[EVO_LEVEL, extra]),
                EvolutionMethod::Stone => data.extend_from_slice(&[EVO_STONE, extra, 1]),
                EvolutionMethod::Trade => data.extend_from_slice(&[EVO_TRADE, 1]),
                other => {
                    return Err(RandomiserError::Format(format!(
                        "{other:?} evolutions cannot be stored in gen 1"
                    )))
                }
            }
            data.push(self.internal_byte(evo.to)?);
        }
        data.push(0);
        for learnt in &species.moves_learnt {
            data.extend_from_slice(&[learnt.level, learnt.move_id as u8]);
        }
        data.push(0);
        Ok(data)
    }

    /// Rebuilds the evolution/moveset pointer table and the data behind it.
    fn save_evolutions_and_moves(&mut self) -> Result<()> {
        let table = self.entry.movesets_table;
        let count = self.entry.internal_count;
        let mut main = DataBlock::new(table + count * 2, self.entry.movesets_data_size);
        let mut extra = self
            .entry
            .movesets_extra_space
            .filter(|&offset| bank_of(offset) == bank_of(table))
            .map(|offset| DataBlock::new(offset, (bank_of(offset) + 1) * GB_BANK_SIZE - offset));

        let mut pointers = Vec::with_capacity(count);
        let mut null_entry = None;
        for internal in 1..=count as u16 {
            let dex = self.index.dex(internal);
            if dex == 0 {
                if let Some(at) = null_entry {
                    pointers.push(at);
                    continue;
                }
            }
            let entry = match self.dex.get(dex) {
                Some(species) if dex != 0 => self.evolution_entry(species)?,
                _ => vec![0, 0],
            };
            let at = main
                .place(&entry)
                .or_else(|| extra.as_mut().and_then(|block| block.place(&entry)))
                .ok_or_else(|| {
                    RandomiserError::Format(format!(
                        "evolutions and movesets no longer fit (internal index {internal})"
                    ))
                })?;
            if dex == 0 {
                null_entry = Some(at);
            }
            pointers.push(at);
        }

        for (i, &at) in pointers.iter().enumerate() {
            self.rom.write_word(table + i * 2, make_gb_pointer(at))?;
        }
        main.commit(&mut self.rom)?;
        if let Some(block) = &extra {
            block.commit(&mut self.rom)?;
        }
        log::debug!(
            "movesets: {} of {} main bytes used",
            main.used(),
            main.capacity()
        );
        Ok(())
    }

    fn ghost_marowak(&self) -> Result<SpeciesId> {
        match self.entry.ghost_marowak_offsets.first() {
            Some(&at) if self.can_change_static_pokemon() => {
                Ok(self.index.dex(u16::from(self.rom.read_byte(at)?)))
            }
            _ => Ok(MAROWAK),
        }
    }

    fn encounter_tables(&self) -> Result<Vec<TableLocation>> {
        let common = &self.entry.common;
        let mut ghost_ban = BTreeSet::new();
        if self.entry.ban_ghost_marowak {
            ghost_ban.insert(self.ghost_marowak()?);
        }

        let mut tables: Vec<TableLocation> = Vec::new();
        let mut seen: HashMap<usize, Vec<usize>> = HashMap::new();
        let bank = bank_of(self.entry.wild_table);
        let mut pointer_at = self.entry.wild_table;
        let mut map_id = 0;
        loop {
            let pointer = self.rom.read_word(pointer_at)?;
            if pointer == WILD_TABLE_END {
                break;
            }
            let root = calculate_offset(bank, pointer);
            let map_name = common.map_name_by_id(map_id);
            if let Some(existing) = seen.get(&root) {
                for &i in existing {
                    tables[i].name.push_str(&format!(", {map_name}"));
                }
            } else {
                let mut created = Vec::new();
                let mut at = root;
                for kind in ["Grass/Cave", "Surfing"] {
                    let rate = self.rom.read_byte(at)?;
                    at += 1;
                    if rate == 0 {
                        continue;
                    }
                    let mut table = TableLocation {
                        name: format!("{kind} on {map_name}"),
                        rate,
                        ..TableLocation::default()
                    };
                    if TOWER_MAPS.contains(&map_id) {
                        table.banned = ghost_ban.clone();
                    }
                    for slot in 0..WILD_SLOTS {
                        table.slots.push(SlotLocation::new(at + slot * 2, at + slot * 2 + 1));
                    }
                    at += WILD_SLOTS * 2;
                    created.push(tables.len());
                    tables.push(table);
                }
                seen.insert(root, created);
            }
            pointer_at += 2;
            map_id += 1;
        }

        if let Some(old_rod) = self.entry.old_rod {
            tables.push(TableLocation {
                name: "Old Rod Fishing".to_string(),
                banned: ghost_ban.clone(),
                slots: vec![SlotLocation::new(old_rod + 2, old_rod + 1)],
                ..TableLocation::default()
            });
        }
        if let Some(good_rod) = self.entry.good_rod {
            tables.push(TableLocation {
                name: "Good Rod Fishing".to_string(),
                banned: ghost_ban.clone(),
                slots: (0..2)
                    .map(|i| SlotLocation::new(good_rod + i * 2, good_rod + i * 2 + 1))
                    .collect(),
                ..TableLocation::default()
            });
        }
        if let Some(super_rod) = self.entry.super_rod {
            if self.entry.yellow {
                self.yellow_super_rod(super_rod, &ghost_ban, &mut tables)?;
            } else {
                self.super_rod(super_rod, &ghost_ban, &mut tables)?;
            }
        }
        Ok(tables)
    }

    /// Yellow keeps four (species, level) pairs inline after each map id.
    fn yellow_super_rod(
        &self,
        mut at: usize,
        ghost_ban: &BTreeSet<SpeciesId>,
        tables: &mut Vec<TableLocation>,
    ) -> Result<()> {
        loop {
            let map = self.rom.read_byte(at)?;
            if map == TABLE_END {
                return Ok(());
            }
            at += 1;
            tables.push(TableLocation {
                name: format!(
                    "Super Rod Fishing on {}",
                    self.entry.common.map_name_by_id(map as usize)
                ),
                banned: ghost_ban.clone(),
                slots: (0..YELLOW_SUPER_ROD_SLOTS)
                    .map(|i| SlotLocation::new(at + i * 2 + 1, at + i * 2))
                    .collect(),
                ..TableLocation::default()
            });
            at += YELLOW_SUPER_ROD_SLOTS * 2;
        }
    }

    /// Red/Blue point each map at a shared, counted list of (level, species).
    fn super_rod(
        &self,
        mut at: usize,
        ghost_ban: &BTreeSet<SpeciesId>,
        tables: &mut Vec<TableLocation>,
    ) -> Result<()> {
        let bank = bank_of(at);
        let mut seen: HashMap<usize, usize> = HashMap::new();
        loop {
            let map = self.rom.read_byte(at)?;
            if map == TABLE_END {
                return Ok(());
            }
            let set_at = self.rom.read_pointer_in_bank(at + 1, bank)?;
            at += 3;
            let map_name = self.entry.common.map_name_by_id(map as usize);
            if let Some(&i) = seen.get(&set_at) {
                tables[i].name.push_str(&format!(", {map_name}"));
                continue;
            }
            let count = self.rom.read_byte(set_at)? as usize;
            let first = set_at + 1;
            seen.insert(set_at, tables.len());
            tables.push(TableLocation {
                name: format!("Super Rod Fishing on {map_name}"),
                banned: ghost_ban.clone(),
                slots: (0..count)
                    .map(|i| SlotLocation::new(first + i * 2, first + i * 2 + 1))
                    .collect(),
                ..TableLocation::default()
            });
        }
    }

    fn class_pointers(&self) -> Result<Vec<usize>> {
        (0..self.entry.trainer_class_counts.len())
            .map(|i| self.rom.read_pointer(self.entry.trainer_classes + i * 2))
            .collect()
    }

    fn read_trainers(&self) -> Result<Vec<Trainer>> {
        let mut trainers = Vec::new();
        let mut index = 0;
        let pointers = self.class_pointers()?;
        for (class, (&start, &count)) in pointers
            .iter()
            .zip(&self.entry.trainer_class_counts)
            .enumerate()
        {
            let mut at = start;
            for number in 0..count {
                index += 1;
                let mut trainer = Trainer::new(index, at);
                trainer.name = format!("Class {} #{}", class + 1, number + 1);
                let first = self.rom.read_byte(at)?;
                at += 1;
                if first == SPECIAL_TRAINER {
                    trainer.poketype = POKETYPE_SPECIAL;
                    while self.rom.read_byte(at)? != 0 {
                        let level = self.rom.read_byte(at)?;
                        let species = self.index.dex(u16::from(self.rom.read_byte(at + 1)?));
                        trainer.pokemon.push(TrainerPokemon::new(species, level));
                        at += 2;
                    }
                } else {
                    while self.rom.read_byte(at)? != 0 {
                        let species = self.index.dex(u16::from(self.rom.read_byte(at)?));
                        trainer.pokemon.push(TrainerPokemon::new(species, first));
                        at += 1;
                    }
                }
                at += 1;
                trainers.push(trainer);
            }
        }
        tag_trainers(&mut trainers, &self.entry.common.trainer_tags);
        Ok(trainers)
    }
}

impl RomHandler for Gen1Handler {
    fn generation(&self) -> Generation {
        Generation::Gen1
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
                Ok(self.index.dex(u16::from(self.rom.read_byte(*at)?)))
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
            let internal = self.index.internal(species)? as u8;
            for &at in offsets {
                self.rom.write_byte(at, internal)?;
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
            let mut at = original.offset;
            if original.poketype == POKETYPE_SPECIAL {
                self.rom.write_byte(at, SPECIAL_TRAINER)?;
                at += 1;
                for pokemon in &trainer.pokemon {
                    let internal = self.internal_byte(pokemon.species)?;
                    self.rom.write_bytes(at, &[pokemon.level, internal])?;
                    at += 2;
                }
            } else {
                if let Some(first) = trainer.pokemon.first() {
                    self.rom.write_byte(at, first.level)?;
                }
                at += 1;
                for pokemon in &trainer.pokemon {
                    let internal = self.internal_byte(pokemon.species)?;
                    self.rom.write_byte(at, internal)?;
                    at += 1;
                }
            }
            self.rom.write_byte(at, 0)?;
        }

        if let Some(at) = self.entry.extra_trainer_moves {
            self.rom.write_byte(at, TABLE_END)?;
        }
        if let Some(at) = self.entry.champion_rival_jump.filter(|_| !self.entry.yellow) {
            self.rom.write_bytes(at, &[GB_NOP, GB_NOP])?;
        }
        Ok(())
    }

    fn encounters(&self, _use_time_based: bool) -> Result<Vec<EncounterSet>> {
        let tables = self.encounter_tables()?;
        let mut sets = read_slot_tables(&self.rom, &tables, |b| self.index.dex(u16::from(b)))?;
        apply_encounter_bans(&mut sets, &self.entry.common.encounter_bans);
        Ok(sets)
    }

    fn set_encounters(&mut self, _use_time_based: bool, sets: &[EncounterSet]) -> Result<()> {
        let tables = self.encounter_tables()?;
        let index = &self.index;
        write_slot_tables(&mut self.rom, &tables, sets, |species| {
            Ok(index.internal(species)? as u8)
        })
    }

    fn static_pokemon(&self) -> Result<Vec<StaticEncounter>> {
        let index = &self.index;
        read_statics(&self.rom, &self.entry.common.statics, &|rom: &Rom, at: usize| {
            Ok(index.dex(u16::from(rom.read_byte(at)?)))
        })
    }

    fn set_static_pokemon(&mut self, statics: &[StaticEncounter]) -> Result<()> {
        let index = &self.index;
        write_statics(
            &mut self.rom,
            &self.entry.common.statics,
            statics,
            &|rom: &mut Rom, at: usize, species: SpeciesId| {
                rom.write_byte(at, index.internal(species)? as u8)
            },
        )
    }

    fn can_change_static_pokemon(&self) -> bool {
        !self.entry.common.statics.is_empty()
    }

    fn set_intro_species(&mut self, species: SpeciesId) -> Result<()> {
        let internal = self.internal_byte(species)?;
        for &at in &self.entry.common.intro_offsets {
            self.rom.write_byte(at, internal)?;
        }
        Ok(())
    }

    fn remove_impossible_evolutions(&mut self) -> BTreeSet<EvolutionUpdate> {
        rewrite_evolutions(&mut self.dex, |evo| {
            (evo.method == EvolutionMethod::Trade).then_some((EvolutionMethod::Level, 37))
        })
    }

    fn misc_tweaks_available(&self) -> u32 {
        let mut available = catalog_tweaks(&self.entry.common);
        if self.entry.text_delay_offset.is_some() {
            available |= MiscTweak::FastestText.bit();
        }
        available
    }

    fn apply_misc_tweak(&mut self, tweak: MiscTweak) -> Result<()> {
        match (tweak, self.entry.text_delay_offset) {
            (MiscTweak::FastestText, Some(at)) => self.rom.write_byte(at, GB_RET),
            _ => apply_catalog_tweak(&mut self.rom, &self.entry.common, tweak),
        }
    }

    fn check_value_offset(&self) -> Option<usize> {
        self.entry.common.check_value_offset
    }

    fn save(&mut self) -> Result<Vec<u8>> {
        self.save_species()?;
        self.save_evolutions_and_moves()?;
        Ok(self.rom.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::{gb_type_byte, gb_type_from_byte, Gen1Handler};
    use crate::handler::RomHandler;
    use crate::layout::Catalog;
    use crate::model::{EvolutionMethod, Type};
    use crate::rom::{
        make_gb_pointer, Rom, GB_JP_FLAG_OFFSET, GB_SIGNATURE_OFFSET, GB_VERSION_OFFSET,
    };
    use crate::settings::MiscTweak;
    use serde_json::json;

    const ORDER: usize = 0x41000;
    const STATS: usize = 0x38000;
    const NAMES: usize = 0x1C000;
    const MOVESETS: usize = 0x3B000;
    const WILD: usize = 0xCE00;
    const OLD_ROD: usize = 0xE000;
    const CLASSES: usize = 0x39D00;
    const TRAINER_MOVES: usize = 0x39E00;

    fn catalog() -> Catalog {
        Catalog::from_json(
            &json!({
                "gen1": [{
                    "name": "Test Red",
                    "text_table": "80=A\n81=B\n82=C\n83=D\n",
                    "signature": "POKEMON RED",
                    "version": 0,
                    "non_japanese": 1,
                    "pokedex_order": ORDER,
                    "internal_count": 4,
                    "stats": STATS,
                    "names": NAMES,
                    "name_length": 10,
                    "movesets_table": MOVESETS,
                    "movesets_data_size": 64,
                    "wild_table": WILD,
                    "old_rod": OLD_ROD,
                    "trainer_classes": CLASSES,
                    "trainer_class_counts": [2, 1],
                    "extra_trainer_moves": TRAINER_MOVES,
                    "starters": [["0x1D000", "0x1D010"], ["0x1D001"], ["0x1D002"]],
                    "statics": [{ "species_offsets": ["0x1D020"], "level_offsets": ["0x1D021"] }],
                    "intro_offsets": ["0x1D030"],
                    "text_delay_offset": "0x1D040",
                    "trainer_tags": { "3": "GYM1" },
                    "map_names": { "1": "Route 1" }
                }]
            })
            .to_string(),
        )
        .unwrap()
    }

    // Internal 1 = dex 1, internal 2 unused, internal 3 = dex 2, internal 4 = dex 4.
    // 1 -> 2 at level 16, 2 -> 4 by trade.
    fn rom() -> Rom {
        let mut rom = Rom::new(vec![0; 0x80000]);
        rom.write_bytes(GB_SIGNATURE_OFFSET, b"POKEMON RED").unwrap();
        rom.write_byte(GB_JP_FLAG_OFFSET, 1).unwrap();
        rom.write_byte(GB_VERSION_OFFSET, 0).unwrap();
        rom.write_bytes(ORDER, &[1, 0, 2, 4]).unwrap();

        for (dex, types) in [(1usize, [0x16, 0x03]), (2, [0x16, 0x16]), (4, [0x14, 0x14])] {
            let at = STATS + (dex - 1) * 0x1C;
            rom.write_bytes(at, &[dex as u8, 45, 49, 49, 45, 65, types[0], types[1], 45, 64])
                .unwrap();
            rom.write_byte(at + 0x13, 3).unwrap();
        }
        rom.write_bytes(NAMES, &[0x80, 0x50]).unwrap();
        rom.write_bytes(NAMES + 20, &[0x81, 0x81, 0x50]).unwrap();
        rom.write_bytes(NAMES + 30, &[0x83, 0x50]).unwrap();

        let data = MOVESETS + 8;
        let entries: [&[u8]; 4] = [
            &[1, 16, 3, 0, 1, 33, 5, 45, 0],
            &[0, 0],
            &[3, 1, 4, 0, 1, 10, 0],
            &[0, 1, 52, 0],
        ];
        let mut at = data;
        for (i, entry) in entries.iter().enumerate() {
            rom.write_word(MOVESETS + i * 2, make_gb_pointer(at)).unwrap();
            rom.write_bytes(at, entry).unwrap();
            at += entry.len();
        }

        // two maps sharing one table, then the terminator
        rom.write_word(WILD, make_gb_pointer(WILD + 0x10)).unwrap();
        rom.write_word(WILD + 2, make_gb_pointer(WILD + 0x10)).unwrap();
        rom.write_word(WILD + 4, 0xFFFF).unwrap();
        rom.write_byte(WILD + 0x10, 25).unwrap();
        for slot in 0..10 {
            rom.write_bytes(WILD + 0x11 + slot * 2, &[3 + slot as u8, 1]).unwrap();
        }
        rom.write_byte(WILD + 0x11 + 20, 0).unwrap();
        rom.write_bytes(OLD_ROD, &[0, 4, 5]).unwrap();

        rom.write_word(CLASSES, make_gb_pointer(0x39D10)).unwrap();
        rom.write_word(CLASSES + 2, make_gb_pointer(0x39D20)).unwrap();
        rom.write_bytes(0x39D10, &[5, 1, 3, 0, 0xFF, 7, 1, 9, 3, 0]).unwrap();
        rom.write_bytes(0x39D20, &[12, 4, 0]).unwrap();

        rom.write_bytes(0x1D000, &[1, 3, 4]).unwrap();
        rom.write_byte(0x1D010, 1).unwrap();
        rom.write_bytes(0x1D020, &[4, 30]).unwrap();
        rom
    }

    fn handler() -> Gen1Handler {
        Gen1Handler::load(&rom(), &catalog()).unwrap().unwrap()
    }

    #[test]
    fn type_bytes_map_both_ways() {
        for t in [Type::Fire, Type::Bug, Type::Dragon, Type::Steel, Type::Dark] {
            assert_eq!(gb_type_from_byte(gb_type_byte(t)), t);
        }
        assert_eq!(gb_type_from_byte(0x06), Type::Normal);
    }

    #[test]
    fn loads_species_and_evolution_graph() {
        let handler = handler();
        let dex = handler.pokedex();
        assert_eq!(dex.len(), 3);
        let first = dex.get(1).unwrap();
        assert_eq!(first.name, "A");
        assert_eq!(first.secondary_type, Some(Type::Poison));
        assert_eq!(first.bst(), 45 + 49 + 49 + 45 + 65);
        assert_eq!(first.evolutions_from[0].to, 2);
        assert_eq!(first.moves_learnt.len(), 2);
        assert_eq!(dex.get(2).unwrap().secondary_type, None);
        assert_eq!(dex.get(2).unwrap().evolutions_from[0].method, EvolutionMethod::Trade);
        assert_eq!(dex.get(4).unwrap().evolutions_to, vec![2]);
    }

    #[test]
    fn missing_entry_is_not_an_error() {
        let mut rom = rom();
        rom.write_byte(GB_JP_FLAG_OFFSET, 0).unwrap();
        assert!(Gen1Handler::load(&rom, &catalog()).unwrap().is_none());
    }

    #[test]
    fn rewrites_trainers_in_place() {
        let mut handler = handler();
        let mut trainers = handler.trainers().unwrap();
        assert_eq!(trainers.len(), 3);
        assert_eq!(trainers[0].pokemon.len(), 2);
        assert_eq!(trainers[1].poketype, 1);
        assert_eq!(trainers[1].pokemon[1].level, 9);
        assert_eq!(trainers[2].tag.as_deref(), Some("GYM1"));

        trainers[0].pokemon[1].species = 4;
        trainers[1].pokemon[0].species = 2;
        handler.set_trainers(&trainers).unwrap();
        let rom = handler.rom();
        assert_eq!(rom.read_bytes(0x39D10, 10).unwrap(), &[5, 1, 4, 0, 0xFF, 7, 3, 9, 3, 0]);
        assert_eq!(rom.read_byte(TRAINER_MOVES).unwrap(), 0xFF);

        let extra = trainers[2].pokemon[0].clone();
        trainers[2].pokemon.push(extra);
        assert!(handler.set_trainers(&trainers).is_err());
    }

    #[test]
    fn shared_wild_tables_are_read_once() {
        let mut handler = handler();
        let mut sets = handler.encounters(false).unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].name, "Grass/Cave on Map 0, Route 1");
        assert_eq!(sets[0].encounters.len(), 10);
        assert_eq!(sets[0].encounters[9].level, 12);
        assert_eq!((sets[1].encounters[0].species, sets[1].encounters[0].level), (4, 5));

        sets[0].encounters[0].species = 2;
        sets[1].encounters[0].species = 1;
        handler.set_encounters(false, &sets).unwrap();
        assert_eq!(handler.rom().read_bytes(WILD + 0x11, 2).unwrap(), &[3, 3]);
        assert_eq!(handler.rom().read_byte(OLD_ROD + 1).unwrap(), 1);
    }

    #[test]
    fn starters_statics_and_intro() {
        let mut handler = handler();
        assert_eq!(handler.starter_count(), 3);
        assert_eq!(handler.starters().unwrap(), vec![1, 2, 4]);
        handler.set_starters(&[4, 2, 1]).unwrap();
        assert_eq!(handler.rom().read_byte(0x1D010).unwrap(), 4);
        assert!(handler.set_starters(&[1]).is_err());

        let mut statics = handler.static_pokemon().unwrap();
        assert_eq!((statics[0].species, statics[0].level), (4, 30));
        statics[0].species = 2;
        handler.set_static_pokemon(&statics).unwrap();
        assert_eq!(handler.rom().read_byte(0x1D020).unwrap(), 3);

        handler.set_intro_species(2).unwrap();
        assert_eq!(handler.rom().read_byte(0x1D030).unwrap(), 3);
    }

    #[test]
    fn saved_evolutions_reload_with_changes() {
        let mut handler = handler();
        let updates = handler.remove_impossible_evolutions();
        assert_eq!(updates.len(), 1);
        handler.pokedex_mut().get_mut(4).unwrap().hp = 99;
        let bytes = handler.save().unwrap();

        let reloaded = Gen1Handler::load(&Rom::new(bytes), &catalog()).unwrap().unwrap();
        let dex = reloaded.pokedex();
        let evo = &dex.get(2).unwrap().evolutions_from[0];
        assert_eq!((evo.method, evo.extra, evo.to), (EvolutionMethod::Level, 37, 4));
        assert_eq!(dex.get(4).unwrap().hp, 99);
        assert_eq!(dex.get(4).unwrap().moves_learnt[0].move_id, 52);
        assert_eq!(dex.get(1).unwrap().moves_learnt, handler.pokedex().get(1).unwrap().moves_learnt);
    }

    #[test]
    fn fastest_text_writes_a_return() {
        let mut handler = handler();
        assert_ne!(handler.misc_tweaks_available() & MiscTweak::FastestText.bit(), 0);
        handler.apply_misc_tweak(MiscTweak::FastestText).unwrap();
        assert_eq!(handler.rom().read_byte(0x1D040).unwrap(), 0xC9);
        assert!(handler.apply_misc_tweak(MiscTweak::BwExpPatch).is_err());
    }
}
