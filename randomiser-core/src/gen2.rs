use std::collections::BTreeSet;

use crate::evolution::rewrite_evolutions;
use crate::gen1::{gb_type_byte, gb_type_from_byte, GB_RET};
use crate::handler::{
    apply_catalog_tweak, apply_encounter_bans, apply_legendary_override, catalog_tweaks,
    expect_same_trainers, moves_at_level, patch_friendship, read_slot_tables, read_statics,
    tag_trainers, write_slot_tables, write_statics, RomHandler, SlotLocation, TableLocation,
};
use crate::layout::{Catalog, Gen2Entry};
use crate::model::{
    EncounterSet, Evolution, EvolutionMethod, EvolutionUpdate, ExpCurve, Generation, MoveLearnt,
    Pokedex, Species, SpeciesId, StaticEncounter, Trainer, TrainerPokemon, POKETYPE_CUSTOM_MOVES,
    POKETYPE_HELD_ITEMS, POLIWHIRL, SEADRA, SLOWPOKE, UNOWN,
};
use crate::rom::{bank_of, make_gb_pointer, DataBlock, Rom, GB_BANK_SIZE};
use crate::settings::MiscTweak;
use crate::text::{TextTable, GB_TERMINATOR};
use crate::{RandomiserError, Result};

const SPECIES_COUNT: usize = 251;
const STATS_ENTRY_SIZE: usize = 0x20;

const EVO_LEVEL: u8 = 1;
const EVO_STONE: u8 = 2;
const EVO_TRADE: u8 = 3;
const EVO_HAPPINESS: u8 = 4;
const EVO_STATS: u8 = 5;
const NO_ITEM: u8 = 0xFF;

const HAPPINESS_ANY: u8 = 1;
const HAPPINESS_DAY: u8 = 2;
const HAPPINESS_NIGHT: u8 = 3;
const ATTACK_HIGHER: u8 = 1;
const DEFENSE_HIGHER: u8 = 2;
const ATK_DEF_SAME: u8 = 3;

const MOON_STONE: u16 = 8;
const WATER_STONE: u16 = 24;
const SUN_STONE: u16 = 169;

const FRIENDSHIP_VANILLA: u8 = 220;
const FRIENDSHIP_EASY: u8 = 160;

const LAND_SLOTS: usize = 7;
const LAND_RECORD_SIZE: usize = 5 + 6 * LAND_SLOTS;
const SEA_SLOTS: usize = 3;
const SEA_RECORD_SIZE: usize = 3 + 2 * SEA_SLOTS;
const TIMES_OF_DAY: [&str; 3] = ["Morning", "Day", "Night"];
const DAY: usize = 1;
const FISHING_ENTRY_SIZE: usize = 3;
const TABLE_END: u8 = 0xFF;

pub struct Gen2Handler {
    rom: Rom,
    entry: Gen2Entry,
    text: TextTable,
    dex: Pokedex,
}

impl Gen2Handler {
    pub fn load(rom: &Rom, catalog: &Catalog) -> Result<Option<Self>> {
        let Some(entry) = catalog.find_gen2(rom) else {
            return Ok(None);
        };
        let mut handler = Gen2Handler {
            rom: rom.clone(),
            entry: entry.clone(),
            text: entry.common.text.load(GB_TERMINATOR)?,
            dex: Pokedex::new(SPECIES_COUNT),
        };
        handler.load_species()?;
        handler.load_evolutions_and_moves()?;
        apply_legendary_override(&mut handler.dex, handler.entry.common.legendaries.as_deref());
        log::info!(
            "{}: {} species{}",
            handler.entry.common.name,
            handler.dex.len(),
            if handler.entry.crystal { " (crystal)" } else { "" }
        );
        Ok(Some(handler))
    }

    fn stats_offset(&self, id: SpeciesId) -> usize {
        self.entry.stats + (id as usize - 1) * STATS_ENTRY_SIZE
    }

    fn load_species(&mut self) -> Result<()> {
        for id in 1..=SPECIES_COUNT as SpeciesId {
            let at = self.stats_offset(id);
            let name_at = self.entry.names + (id as usize - 1) * self.entry.name_length;
            let name = self
                .text
                .decode(self.rom.read_bytes(name_at, self.entry.name_length)?);
            let primary = gb_type_from_byte(self.rom.read_byte(at + 7)?);
            let secondary = gb_type_from_byte(self.rom.read_byte(at + 8)?);

            let mut species = Species::new(id, name.trim_end(), primary);
            species.secondary_type = (secondary != primary).then_some(secondary);
            species.hp = self.rom.read_byte(at + 1)?;
            species.attack = self.rom.read_byte(at + 2)?;
            species.defense = self.rom.read_byte(at + 3)?;
            species.speed = self.rom.read_byte(at + 4)?;
            species.sp_atk = self.rom.read_byte(at + 5)?;
            species.sp_def = self.rom.read_byte(at + 6)?;
            species.catch_rate = self.rom.read_byte(at + 9)?;
            species.exp_yield = self.rom.read_byte(at + 10)?;
            species.common_held_item = u16::from(self.rom.read_byte(at + 11)?);
            species.rare_held_item = u16::from(self.rom.read_byte(at + 12)?);
            species.gender_ratio = self.rom.read_byte(at + 13)?;
            species.growth_curve = ExpCurve::from_byte(self.rom.read_byte(at + 0x16)?);
            self.dex.insert(species);
        }
        Ok(())
    }

    fn moveset_pointer(&self, id: SpeciesId) -> Result<usize> {
        self.rom
            .read_pointer(self.entry.movesets_table + (id as usize - 1) * 2)
    }

    fn load_evolutions_and_moves(&mut self) -> Result<()> {
        let mut evolutions = Vec::new();
        for id in 1..=SPECIES_COUNT as SpeciesId {
            let mut at = self.moveset_pointer(id)?;
            loop {
                let method = self.rom.read_byte(at)?;
                if method == 0 {
                    break;
                }
                let param = self.rom.read_byte(at + 1)?;
                let (evo_method, extra) = match method {
                    EVO_LEVEL => (EvolutionMethod::Level, u16::from(param)),
                    EVO_STONE => (EvolutionMethod::Stone, u16::from(param)),
                    EVO_TRADE if param == NO_ITEM => (EvolutionMethod::Trade, 0),
                    EVO_TRADE => (EvolutionMethod::TradeItem, u16::from(param)),
                    EVO_HAPPINESS => match param {
                        HAPPINESS_DAY => (EvolutionMethod::HappinessDay, 0),
                        HAPPINESS_NIGHT => (EvolutionMethod::HappinessNight, 0),
                        _ => (EvolutionMethod::Happiness, 0),
                    },
                    EVO_STATS => match self.rom.read_byte(at + 2)? {
                        DEFENSE_HIGHER => (EvolutionMethod::LevelDefenseHigher, u16::from(param)),
                        ATK_DEF_SAME => (EvolutionMethod::LevelAtkDefSame, u16::from(param)),
                        _ => (EvolutionMethod::LevelAttackHigher, u16::from(param)),
                    },
                    other => {
                        return Err(RandomiserError::Format(format!(
                            "unknown evolution method {other} at 0x{at:X}"
                        )))
                    }
                };
                let len = if method == EVO_STATS { 4 } else { 3 };
                let to = SpeciesId::from(self.rom.read_byte(at + len - 1)?);
                let evo = Evolution::new(id, to, evo_method, extra);
                if !evolutions.contains(&evo) {
                    evolutions.push(evo);
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
            if let Some(species) = self.dex.get_mut(id) {
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
                    species.sp_def,
                    primary,
                    secondary,
                    species.catch_rate,
                    species.exp_yield,
                    species.common_held_item as u8,
                    species.rare_held_item as u8,
                ],
            )?;
            self.rom.write_byte(at + 0x16, species.growth_curve.to_byte())?;
        }
        Ok(())
    }

    fn evolution_entry(species: &Species) -> Result<Vec<u8>> {
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
                EvolutionMethod::Stone => data.extend_from_slice(&[EVO_STONE, extra]),
                EvolutionMethod::Trade => data.extend_from_slice(&[EVO_TRADE, NO_ITEM]),
                EvolutionMethod::TradeItem => data.extend_from_slice(&[EVO_TRADE, extra]),
                EvolutionMethod::Happiness => data.extend_from_slice(&[EVO_HAPPINESS, HAPPINESS_ANY]),
                EvolutionMethod::HappinessDay => {
                    data.extend_from_slice(&[EVO_HAPPINESS, HAPPINESS_DAY])
                }
                EvolutionMethod::HappinessNight => {
                    data.extend_from_slice(&[EVO_HAPPINESS, HAPPINESS_NIGHT])
                }
                EvolutionMethod::LevelAttackHigher => {
                    data.extend_from_slice(&[EVO_STATS, extra, ATTACK_HIGHER])
                }
                EvolutionMethod::LevelDefenseHigher => {
                    data.extend_from_slice(&[EVO_STATS, extra, DEFENSE_HIGHER])
                }
                EvolutionMethod::LevelAtkDefSame => {
                    data.extend_from_slice(&[EVO_STATS, extra, ATK_DEF_SAME])
                }
                other => {
                    return Err(RandomiserError::Format(format!(
                        "{other:?} evolutions cannot be stored in gen 2"
                    )))
                }
            }
            data.push(evo.to as u8);
        }
        data.push(0);
        for learnt in &species.moves_learnt {
            data.extend_from_slice(&[learnt.level, learnt.move_id as u8]);
        }
        data.push(0);
        Ok(data)
    }

    /// The pointer table and its data run to the end of their bank.
    fn save_evolutions_and_moves(&mut self) -> Result<()> {
        let table = self.entry.movesets_table;
        let start = table + SPECIES_COUNT * 2;
        let bank_end = (bank_of(table) + 1) * GB_BANK_SIZE;
        let mut block = DataBlock::new(start, bank_end.saturating_sub(start));
        for id in 1..=SPECIES_COUNT as SpeciesId {
            let entry = match self.dex.get(id) {
                Some(species) => Self::evolution_entry(species)?,
                None => vec![0, 0],
            };
            let at = block.place(&entry).ok_or_else(|| {
                RandomiserError::Format(format!(
                    "evolutions and movesets no longer fit (species {id})"
                ))
            })?;
            self.rom
                .write_word(table + (id as usize - 1) * 2, make_gb_pointer(at))?;
        }
        block.commit(&mut self.rom)
    }

    fn terminated_length(&self, at: usize) -> Result<usize> {
        let mut len = 0;
        while self.rom.read_byte(at + len)? != GB_TERMINATOR {
            len += 1;
        }
        Ok(len)
    }

    fn read_trainers(&self) -> Result<Vec<Trainer>> {
        let mut trainers = Vec::new();
        let mut index = 0;
        for (class, &count) in self.entry.trainer_class_counts.iter().enumerate() {
            let mut at = self.rom.read_pointer(self.entry.trainer_classes + class * 2)?;
            for _ in 0..count {
                index += 1;
                let mut trainer = Trainer::new(index, at);
                let name_len = self.terminated_length(at)?;
                trainer.name = self.text.decode(self.rom.read_bytes(at, name_len)?);
                at += name_len + 1;
                trainer.poketype = self.rom.read_byte(at)?;
                at += 1;
                while self.rom.read_byte(at)? != TABLE_END {
                    let level = self.rom.read_byte(at)?;
                    let species = SpeciesId::from(self.rom.read_byte(at + 1)?);
                    let mut pokemon = TrainerPokemon::new(species, level);
                    at += 2;
                    if trainer.uses_held_items() {
                        pokemon.held_item = u16::from(self.rom.read_byte(at)?);
                        at += 1;
                    }
                    if trainer.uses_custom_moves() {
                        for (slot, &b) in self.rom.read_bytes(at, 4)?.iter().enumerate() {
                            pokemon.moves[slot] = u16::from(b);
                        }
                        at += 4;
                    }
                    trainer.pokemon.push(pokemon);
                }
                at += 1;
                trainers.push(trainer);
            }
        }
        tag_trainers(&mut trainers, &self.entry.common.trainer_tags);
        Ok(trainers)
    }

    fn land_tables(
        &self,
        mut at: usize,
        use_time_based: bool,
        tables: &mut Vec<TableLocation>,
    ) -> Result<usize> {
        while self.rom.read_byte(at)? != TABLE_END {
            let map_name = self
                .entry
                .common
                .map_name(self.rom.read_byte(at)?, self.rom.read_byte(at + 1)?);
            let block = |time: usize| at + 5 + time * LAND_SLOTS * 2;
            if use_time_based {
                for (time, label) in TIMES_OF_DAY.iter().enumerate() {
                    tables.push(TableLocation {
                        name: format!("{map_name} Grass/Cave ({label})"),
                        rate: self.rom.read_byte(at + 2 + time)?,
                        slots: (0..LAND_SLOTS)
                            .map(|j| SlotLocation::new(block(time) + j * 2, block(time) + j * 2 + 1))
                            .collect(),
                        ..TableLocation::default()
                    });
                }
            } else {
                let slots = (0..LAND_SLOTS)
                    .map(|j| {
                        let mut slot = SlotLocation::new(block(DAY) + j * 2, block(DAY) + j * 2 + 1);
                        for time in [0, 2] {
                            slot.mirrors.push((block(time) + j * 2, block(time) + j * 2 + 1));
                        }
                        slot
                    })
                    .collect();
                tables.push(TableLocation {
                    name: format!("{map_name} Grass/Cave"),
                    rate: self.rom.read_byte(at + 2 + DAY)?,
                    slots,
                    ..TableLocation::default()
                });
            }
            at += LAND_RECORD_SIZE;
        }
        Ok(at + 1)
    }

    fn sea_tables(&self, mut at: usize, tables: &mut Vec<TableLocation>) -> Result<usize> {
        while self.rom.read_byte(at)? != TABLE_END {
            let map_name = self
                .entry
                .common
                .map_name(self.rom.read_byte(at)?, self.rom.read_byte(at + 1)?);
            tables.push(TableLocation {
                name: format!("{map_name} Surfing"),
                rate: self.rom.read_byte(at + 2)?,
                slots: (0..SEA_SLOTS)
                    .map(|j| SlotLocation::new(at + 3 + j * 2, at + 4 + j * 2))
                    .collect(),
                ..TableLocation::default()
            });
            at += SEA_RECORD_SIZE;
        }
        Ok(at + 1)
    }

    /// Species 0 in a fishing group points into the time-of-day table:
    /// each record there is (night species, level, day species, level).
    fn fishing_tables(&self, use_time_based: bool, tables: &mut Vec<TableLocation>) -> Result<()> {
        let root = self.entry.fishing;
        let groups = self.entry.fishing_groups;
        let group_size = self.entry.fishing_group_size;
        let time_table = root + FISHING_ENTRY_SIZE * group_size * groups;
        for group in 0..groups {
            let mut table = TableLocation {
                name: format!("Fishing Group {}", group + 1),
                ..TableLocation::default()
            };
            for i in 0..group_size {
                let at = root + (group * group_size + i) * FISHING_ENTRY_SIZE;
                let species = self.rom.read_byte(at + 1)?;
                if species != 0 {
                    table.slots.push(SlotLocation::new(at + 2, at + 1));
                    continue;
                }
                let record = time_table + self.rom.read_byte(at + 2)? as usize * 4;
                if use_time_based {
                    table.slots.push(SlotLocation::new(record + 1, record));
                    table.slots.push(SlotLocation::new(record + 3, record + 2));
                } else {
                    let mut slot = SlotLocation::new(record + 3, record + 2);
                    slot.mirrors.push((at + 2, at + 1));
                    table.slots.push(slot);
                }
            }
            tables.push(table);
        }
        Ok(())
    }

    fn encounter_tables(&self, use_time_based: bool) -> Result<Vec<TableLocation>> {
        let mut tables = Vec::new();
        let mut at = self.entry.wild_land_sea;
        // johto, kanto, then specials
        for _ in 0..3 {
            at = self.land_tables(at, use_time_based, &mut tables)?;
            at = self.sea_tables(at, &mut tables)?;
        }
        self.fishing_tables(use_time_based, &mut tables)?;

        let mut at = self.entry.headbutt;
        for set in 0..self.entry.headbutt_table_count {
            let mut table = TableLocation {
                name: format!("Headbutt Trees Set {}", set + 1),
                ..TableLocation::default()
            };
            while self.rom.read_byte(at)? != TABLE_END {
                table.slots.push(SlotLocation::new(at + 2, at + 1));
                at += 3;
            }
            at += 1;
            tables.push(table);
        }

        let mut at = self.entry.bug_contest;
        let mut contest = TableLocation {
            name: "Bug Catching Contest".to_string(),
            ..TableLocation::default()
        };
        contest.banned.insert(UNOWN);
        while self.rom.read_byte(at)? != TABLE_END {
            let mut slot = SlotLocation::new(at + 2, at + 1);
            slot.max_level = Some(at + 3);
            contest.slots.push(slot);
            at += 4;
        }
        tables.push(contest);
        Ok(tables)
    }

    fn write_game_corner_names(&mut self, statics: &[StaticEncounter]) -> Result<()> {
        let len = self.entry.game_corner_name_length;
        for (entry, encounter) in self.entry.common.statics.iter().zip(statics) {
            let Some(at) = entry.game_corner_name_offset else {
                continue;
            };
            let name = self.dex.name(encounter.species);
            let padded = format!("{name:<len$}");
            let bytes = self.text.encode_fixed(&padded, len, GB_TERMINATOR);
            self.rom.write_bytes(at, &bytes)?;
        }
        Ok(())
    }
}

impl RomHandler for Gen2Handler {
    fn generation(&self) -> Generation {
        Generation::Gen2
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
                Ok(SpeciesId::from(self.rom.read_byte(*at)?))
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
            for &at in offsets {
                self.rom.write_byte(at, species as u8)?;
            }
        }
        for (&at, &species) in self.entry.starter_text.iter().zip(starters) {
            let text = self
                .text
                .encode_terminated(&format!("{}?", self.dex.name(species)));
            self.rom.write_bytes(at, &text)?;
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
            let mut at = original.offset + self.terminated_length(original.offset)? + 2;
            for pokemon in &trainer.pokemon {
                self.rom
                    .write_bytes(at, &[pokemon.level, pokemon.species as u8])?;
                at += 2;
                if original.poketype & POKETYPE_HELD_ITEMS != 0 {
                    self.rom.write_byte(at, pokemon.held_item as u8)?;
                    at += 1;
                }
                if original.poketype & POKETYPE_CUSTOM_MOVES != 0 {
                    let moves = if pokemon.reset_moves {
                        moves_at_level(&self.dex.species(pokemon.species)?.moves_learnt, pokemon.level)
                    } else {
                        pokemon.moves
                    };
                    let bytes: Vec<u8> = moves.iter().map(|&m| m as u8).collect();
                    self.rom.write_bytes(at, &bytes)?;
                    at += 4;
                }
            }
            self.rom.write_byte(at, TABLE_END)?;
        }
        Ok(())
    }

    fn encounters(&self, use_time_based: bool) -> Result<Vec<EncounterSet>> {
        let tables = self.encounter_tables(use_time_based)?;
        let mut sets = read_slot_tables(&self.rom, &tables, SpeciesId::from)?;
        apply_encounter_bans(&mut sets, &self.entry.common.encounter_bans);
        Ok(sets)
    }

    fn set_encounters(&mut self, use_time_based: bool, sets: &[EncounterSet]) -> Result<()> {
        let tables = self.encounter_tables(use_time_based)?;
        write_slot_tables(&mut self.rom, &tables, sets, |species| Ok(species as u8))
    }

    fn static_pokemon(&self) -> Result<Vec<StaticEncounter>> {
        read_statics(&self.rom, &self.entry.common.statics, &|rom: &Rom, at: usize| {
            Ok(SpeciesId::from(rom.read_byte(at)?))
        })
    }

    fn set_static_pokemon(&mut self, statics: &[StaticEncounter]) -> Result<()> {
        write_statics(
            &mut self.rom,
            &self.entry.common.statics,
            statics,
            &|rom: &mut Rom, at: usize, species: SpeciesId| rom.write_byte(at, species as u8),
        )?;
        self.write_game_corner_names(statics)
    }

    fn can_change_static_pokemon(&self) -> bool {
        !self.entry.common.statics.is_empty()
    }

    fn intro_allowed(&self, species: SpeciesId) -> bool {
        species != UNOWN
    }

    fn set_intro_species(&mut self, species: SpeciesId) -> Result<()> {
        for &at in &self.entry.common.intro_offsets {
            self.rom.write_byte(at, species as u8)?;
        }
        Ok(())
    }

    fn remove_impossible_evolutions(&mut self) -> BTreeSet<EvolutionUpdate> {
        rewrite_evolutions(&mut self.dex, |evo| {
            if !matches!(evo.method, EvolutionMethod::Trade | EvolutionMethod::TradeItem) {
                return None;
            }
            Some(match evo.from {
                SLOWPOKE => (EvolutionMethod::Stone, WATER_STONE),
                SEADRA => (EvolutionMethod::Level, 40),
                _ if evo.from == POLIWHIRL || evo.method == EvolutionMethod::Trade => {
                    (EvolutionMethod::Level, 37)
                }
                _ => (EvolutionMethod::Level, 30),
            })
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
        patch_friendship(
            &mut self.rom,
            self.entry.common.friendship_locator.as_deref(),
            &[(1, FRIENDSHIP_VANILLA, FRIENDSHIP_EASY)],
        )
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
