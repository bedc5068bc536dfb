use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::gen1::Gen1Handler;
use crate::gen2::Gen2Handler;
use crate::gen3::Gen3Handler;
use crate::ips::apply_ips;
use crate::layout::{Catalog, EntryCommon, StaticEntry};
use crate::model::{
    Encounter, EncounterSet, EvolutionUpdate, Generation, MoveLearnt, Pokedex, SpeciesId,
    StaticEncounter, Trainer,
};
use crate::rom::Rom;
use crate::search::find_hex;
use crate::settings::MiscTweak;
use crate::{RandomiserError, Result};

/// What a randomisation pass may ask of a loaded cartridge. Each
/// generation implements it on its own; helpers they share are the free
/// functions below and in `rom`.
pub trait RomHandler {
    fn generation(&self) -> Generation;

    /// Catalog name of the detected revision.
    fn rom_name(&self) -> &str;

    fn rom(&self) -> &Rom;

    fn pokedex(&self) -> &Pokedex;

    fn pokedex_mut(&mut self) -> &mut Pokedex;

    fn starter_count(&self) -> usize;

    fn starters(&self) -> Result<Vec<SpeciesId>>;

    fn set_starters(&mut self, starters: &[SpeciesId]) -> Result<()>;

    fn trainers(&self) -> Result<Vec<Trainer>>;

    /// Trainers must come back in the order `trainers` produced them.
    fn set_trainers(&mut self, trainers: &[Trainer]) -> Result<()>;

    fn encounters(&self, use_time_based: bool) -> Result<Vec<EncounterSet>>;

    fn set_encounters(&mut self, use_time_based: bool, sets: &[EncounterSet]) -> Result<()>;

    fn static_pokemon(&self) -> Result<Vec<StaticEncounter>>;

    fn set_static_pokemon(&mut self, statics: &[StaticEncounter]) -> Result<()>;

    fn can_change_static_pokemon(&self) -> bool;

    /// Species the title screen can show.
    fn intro_allowed(&self, _species: SpeciesId) -> bool {
        true
    }

    fn set_intro_species(&mut self, species: SpeciesId) -> Result<()>;

    fn remove_impossible_evolutions(&mut self) -> BTreeSet<EvolutionUpdate>;

    fn remove_time_based_evolutions(&mut self) -> BTreeSet<EvolutionUpdate> {
        BTreeSet::new()
    }

    /// Lowers the friendship needed for happiness evolutions. Returns
    /// whether the routine was found.
    fn patch_friendship_threshold(&mut self) -> Result<bool> {
        Ok(false)
    }

    /// Bitmask of `MiscTweak::bit` values this ROM supports.
    fn misc_tweaks_available(&self) -> u32;

    fn apply_misc_tweak(&mut self, tweak: MiscTweak) -> Result<()>;

    fn check_value_offset(&self) -> Option<usize>;

    /// Writes species data back and returns the finished image.
    fn save(&mut self) -> Result<Vec<u8>>;
}

/// Picks the handler whose catalog knows this image.
pub fn detect(rom: &Rom, catalog: &Catalog) -> Result<Box<dyn RomHandler>> {
    if let Some(handler) = Gen1Handler::load(rom, catalog)? {
        log::info!("detected {} (gen 1)", handler.rom_name());
        return Ok(Box::new(handler));
    }
    if let Some(handler) = Gen2Handler::load(rom, catalog)? {
        log::info!("detected {} (gen 2)", handler.rom_name());
        return Ok(Box::new(handler));
    }
    if let Some(handler) = Gen3Handler::load(rom, catalog)? {
        log::info!("detected {} (gen 3)", handler.rom_name());
        return Ok(Box::new(handler));
    }
    Err(RandomiserError::UnsupportedInput(format!(
        "no catalog entry matches this {}-byte image",
        rom.len()
    )))
}

/// The four moves a species knows at `level` from its level-up list.
pub fn moves_at_level(moves: &[MoveLearnt], level: u8) -> [u16; 4] {
    let mut known = [0u16; 4];
    let mut count = 0;
    for learnt in moves {
        if learnt.level > level {
            break;
        }
        if known[..count].contains(&learnt.move_id) {
            continue;
        }
        if count == 4 {
            known.rotate_left(1);
            known[3] = learnt.move_id;
        } else {
            known[count] = learnt.move_id;
            count += 1;
        }
    }
    known
}

pub(crate) fn apply_tweak_patch(rom: &mut Rom, path: &Path) -> Result<()> {
    let patch = fs::read(path).map_err(|err| {
        RandomiserError::Config(format!("cannot read tweak patch {}: {err}", path.display()))
    })?;
    let records = apply_ips(&patch, rom.as_bytes_mut())?;
    log::debug!("applied {} ({} records)", path.display(), records);
    Ok(())
}

/// Finds `locator` and rewrites each `(distance, from, to)` byte that still
/// holds its vanilla value.
pub(crate) fn patch_friendship(
    rom: &mut Rom,
    locator: Option<&str>,
    edits: &[(usize, u8, u8)],
) -> Result<bool> {
    let Some(locator) = locator else {
        return Ok(false);
    };
    let Some(found) = find_hex(rom.as_bytes(), locator)? else {
        log::warn!("friendship routine {locator} not found");
        return Ok(false);
    };
    for &(distance, from, to) in edits {
        let at = found + distance;
        if rom.read_byte(at)? == from {
            rom.write_byte(at, to)?;
        }
    }
    Ok(true)
}

pub(crate) fn read_statics<F>(
    rom: &Rom,
    entries: &[StaticEntry],
    read_species: &F,
) -> Result<Vec<StaticEncounter>>
where
    F: Fn(&Rom, usize) -> Result<SpeciesId>,
{
    entries
        .iter()
        .map(|entry| read_static(rom, entry, read_species))
        .collect()
}

fn read_static<F>(rom: &Rom, entry: &StaticEntry, read_species: &F) -> Result<StaticEncounter>
where
    F: Fn(&Rom, usize) -> Result<SpeciesId>,
{
    let first = entry.species_offsets.first().ok_or_else(|| {
        RandomiserError::Config("static encounter entry has no species offsets".to_string())
    })?;
    let level = match entry.level_offsets.first() {
        Some(&offset) => rom.read_byte(offset)?,
        None => 1,
    };
    let mut encounter = StaticEncounter::new(read_species(rom, *first)?, level);
    encounter.is_egg = entry.is_egg;
    encounter.linked = read_statics(rom, &entry.linked, read_species)?;
    Ok(encounter)
}

/// Linked offsets always get their parent's species.
pub(crate) fn write_statics<F>(
    rom: &mut Rom,
    entries: &[StaticEntry],
    statics: &[StaticEncounter],
    write_species: &F,
) -> Result<()>
where
    F: Fn(&mut Rom, usize, SpeciesId) -> Result<()>,
{
    if entries.len() != statics.len() {
        return Err(RandomiserError::Format(format!(
            "{} static encounters given for {} slots",
            statics.len(),
            entries.len()
        )));
    }
    for (entry, encounter) in entries.iter().zip(statics) {
        write_static(rom, entry, encounter.species, encounter.level, write_species)?;
        for (linked_entry, linked) in entry.linked.iter().zip(&encounter.linked) {
            write_static(rom, linked_entry, encounter.species, linked.level, write_species)?;
        }
    }
    Ok(())
}

fn write_static<F>(
    rom: &mut Rom,
    entry: &StaticEntry,
    species: SpeciesId,
    level: u8,
    write_species: &F,
) -> Result<()>
where
    F: Fn(&mut Rom, usize, SpeciesId) -> Result<()>,
{
    for &offset in &entry.species_offsets {
        write_species(rom, offset, species)?;
    }
    for &offset in &entry.level_offsets {
        rom.write_byte(offset, level)?;
    }
    Ok(())
}

/// Where one byte-sized encounter slot lives. `mirrors` are extra
/// (level, species) places written with the same values.
#[derive(Debug, Clone, Default)]
pub(crate) struct SlotLocation {
    pub level: usize,
    pub species: usize,
    pub max_level: Option<usize>,
    pub mirrors: Vec<(usize, usize)>,
}

impl SlotLocation {
    pub fn new(level: usize, species: usize) -> Self {
        SlotLocation {
            level,
            species,
            ..SlotLocation::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TableLocation {
    pub name: String,
    pub rate: u8,
    pub banned: BTreeSet<SpeciesId>,
    pub slots: Vec<SlotLocation>,
}

pub(crate) fn read_slot_tables<F>(
    rom: &Rom,
    tables: &[TableLocation],
    species_of: F,
) -> Result<Vec<EncounterSet>>
where
    F: Fn(u8) -> SpeciesId,
{
    let mut sets = Vec::with_capacity(tables.len());
    for table in tables {
        let mut set = EncounterSet::new(table.name.clone(), table.rate);
        set.banned = table.banned.clone();
        for slot in &table.slots {
            let mut encounter =
                Encounter::new(species_of(rom.read_byte(slot.species)?), rom.read_byte(slot.level)?);
            if let Some(max) = slot.max_level {
                encounter.max_level = rom.read_byte(max)?;
            }
            set.encounters.push(encounter);
        }
        sets.push(set);
    }
    Ok(sets)
}

pub(crate) fn write_slot_tables<F>(
    rom: &mut Rom,
    tables: &[TableLocation],
    sets: &[EncounterSet],
    byte_of: F,
) -> Result<()>
where
    F: Fn(SpeciesId) -> Result<u8>,
{
    if tables.len() != sets.len() {
        return Err(RandomiserError::Format(format!(
            "{} encounter tables given, ROM holds {}",
            sets.len(),
            tables.len()
        )));
    }
    for (table, set) in tables.iter().zip(sets) {
        if table.slots.len() != set.encounters.len() {
            return Err(RandomiserError::Format(format!(
                "encounter table '{}' changed size",
                table.name
            )));
        }
        for (slot, encounter) in table.slots.iter().zip(&set.encounters) {
            let species = byte_of(encounter.species)?;
            rom.write_byte(slot.level, encounter.level)?;
            rom.write_byte(slot.species, species)?;
            if let Some(max) = slot.max_level {
                rom.write_byte(max, encounter.max_level)?;
            }
            for &(level, mirror) in &slot.mirrors {
                rom.write_byte(level, encounter.level)?;
                rom.write_byte(mirror, species)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn apply_encounter_bans(
    sets: &mut [EncounterSet],
    bans: &BTreeMap<usize, Vec<SpeciesId>>,
) {
    for (&index, species) in bans {
        match sets.get_mut(index) {
            Some(set) => set.banned.extend(species.iter().copied()),
            None => log::warn!("encounter ban for table {index}, which does not exist"),
        }
    }
}

pub(crate) fn tag_trainers(trainers: &mut [Trainer], tags: &BTreeMap<usize, String>) {
    for trainer in trainers.iter_mut() {
        trainer.tag = tags.get(&trainer.index).cloned();
    }
}

/// Tweaks the catalog ships a patch for.
pub(crate) fn catalog_tweaks(common: &EntryCommon) -> u32 {
    common.tweak_patches.keys().fold(0, |mask, tweak| mask | tweak.bit())
}

pub(crate) fn apply_catalog_tweak(rom: &mut Rom, common: &EntryCommon, tweak: MiscTweak) -> Result<()> {
    match common.tweak_patches.get(&tweak) {
        Some(path) => apply_tweak_patch(rom, path),
        None => Err(RandomiserError::Config(format!(
            "{tweak:?} is not available for {}",
            common.name
        ))),
    }
}

/// Sets the legendary flag from the catalog's list when it has one.
pub(crate) fn apply_legendary_override(dex: &mut Pokedex, legendaries: Option<&[SpeciesId]>) {
    if let Some(list) = legendaries {
        for species in dex.iter_mut() {
            species.legendary = list.contains(&species.id);
        }
    }
}

/// Check that every trainer handed back lines up with the one read.
pub(crate) fn expect_same_trainers(read: &[Trainer], given: &[Trainer]) -> Result<()> {
    if read.len() != given.len() {
        return Err(RandomiserError::Format(format!(
            "{} trainers given, ROM holds {}",
            given.len(),
            read.len()
        )));
    }
    for (original, new) in read.iter().zip(given) {
        if original.pokemon.len() != new.pokemon.len() {
            return Err(RandomiserError::Format(format!(
                "trainer {} roster changed size ({} -> {})",
                original.index,
                original.pokemon.len(),
                new.pokemon.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        apply_encounter_bans, moves_at_level, patch_friendship, read_slot_tables, read_statics,
        write_slot_tables, write_statics, SlotLocation, TableLocation,
    };
    use crate::layout::StaticEntry;
    use crate::model::MoveLearnt;
    use crate::rom::Rom;
    use std::collections::BTreeMap;

    fn learnt(pairs: &[(u8, u16)]) -> Vec<MoveLearnt> {
        pairs
            .iter()
            .map(|&(level, move_id)| MoveLearnt { level, move_id })
            .collect()
    }

    #[test]
    fn moves_at_level_shifts_when_full() {
        let moves = learnt(&[(1, 33), (1, 45), (7, 22), (13, 77), (20, 33), (22, 75), (30, 99)]);
        assert_eq!(moves_at_level(&moves, 5), [33, 45, 0, 0]);
        assert_eq!(moves_at_level(&moves, 13), [33, 45, 22, 77]);
        // 33 is already known at 20, so only 75 pushes the oldest out
        assert_eq!(moves_at_level(&moves, 25), [45, 22, 77, 75]);
        assert_eq!(moves_at_level(&moves, 100), [22, 77, 75, 99]);
    }

    #[test]
    fn friendship_patch_only_touches_vanilla_bytes() {
        let mut data = vec![0u8; 64];
        data[10..14].copy_from_slice(&[0xDB, 0x29, 0x00, 0xD8]);
        data[20] = 219;
        let mut rom = Rom::new(data);
        assert!(patch_friendship(&mut rom, Some("DB2900D8"), &[(10, 219, 159), (12, 219, 159)]).unwrap());
        assert_eq!(rom.read_byte(20).unwrap(), 159);
        assert_eq!(rom.read_byte(22).unwrap(), 0);
        assert!(!patch_friendship(&mut rom, Some("FFEEDD"), &[]).unwrap());
        assert!(!patch_friendship(&mut rom, None, &[]).unwrap());
    }

    #[test]
    fn statics_write_linked_offsets_with_parent_species() {
        let entries = vec![StaticEntry {
            species_offsets: vec![0, 1],
            level_offsets: vec![2],
            linked: vec![StaticEntry {
                species_offsets: vec![8],
                level_offsets: vec![9],
                ..StaticEntry::default()
            }],
            ..StaticEntry::default()
        }];
        let mut rom = Rom::new(vec![25, 25, 5, 0, 0, 0, 0, 0, 25, 40]);
        let read_byte = |rom: &Rom, at: usize| rom.read_byte(at).map(u16::from);
        let mut statics = read_statics(&rom, &entries, &read_byte).unwrap();
        assert_eq!((statics[0].species, statics[0].level), (25, 5));
        assert_eq!(statics[0].linked[0].level, 40);

        statics[0].species = 133;
        let write_byte = |rom: &mut Rom, at: usize, species: u16| rom.write_byte(at, species as u8);
        write_statics(&mut rom, &entries, &statics, &write_byte).unwrap();
        assert_eq!(rom.as_bytes(), &[133, 133, 5, 0, 0, 0, 0, 0, 133, 40]);

        assert!(write_statics(&mut rom, &entries, &[], &write_byte).is_err());
    }

    #[test]
    fn slot_tables_write_mirrors() {
        let mut slot = SlotLocation::new(0, 1);
        slot.mirrors.push((4, 5));
        let mut contest = SlotLocation::new(2, 3);
        contest.max_level = Some(6);
        let tables = vec![TableLocation {
            name: "Route".to_string(),
            rate: 10,
            slots: vec![slot, contest],
            ..TableLocation::default()
        }];
        let mut rom = Rom::new(vec![3, 16, 7, 19, 3, 16, 9]);
        let mut sets = read_slot_tables(&rom, &tables, u16::from).unwrap();
        assert_eq!(sets[0].rate, 10);
        assert_eq!((sets[0].encounters[0].species, sets[0].encounters[0].level), (16, 3));
        assert_eq!(sets[0].encounters[1].max_level, 9);

        sets[0].encounters[0].species = 41;
        write_slot_tables(&mut rom, &tables, &sets, |s| Ok(s as u8)).unwrap();
        assert_eq!(rom.as_bytes(), &[3, 41, 7, 19, 3, 41, 9]);

        let mut bans = BTreeMap::new();
        bans.insert(0, vec![151]);
        bans.insert(4, vec![150]);
        apply_encounter_bans(&mut sets, &bans);
        assert!(sets[0].banned.contains(&151));

        sets[0].encounters.pop();
        assert!(write_slot_tables(&mut rom, &tables, &sets, |s| Ok(s as u8)).is_err());
    }
}
