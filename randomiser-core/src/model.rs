use std::collections::{BTreeSet, HashSet};
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{RandomiserError, Result};

/// National dex number.
pub type SpeciesId = u16;

pub const POLIWHIRL: SpeciesId = 61;
pub const SLOWPOKE: SpeciesId = 79;
pub const MAROWAK: SpeciesId = 105;
pub const SEADRA: SpeciesId = 117;
pub const MEW: SpeciesId = 151;
pub const UNOWN: SpeciesId = 201;
pub const SHEDINJA: SpeciesId = 292;
pub const CLAMPERL: SpeciesId = 366;

pub const WONDER_GUARD: u16 = 25;

const LEGENDARIES: &[SpeciesId] = &[
    144, 145, 146, 150, 151, 243, 244, 245, 249, 250, 251, 377, 378, 379, 380, 381, 382, 383,
    384, 385, 386,
];

pub fn is_legendary(id: SpeciesId) -> bool {
    LEGENDARIES.contains(&id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Generation {
    Gen1,
    Gen2,
    Gen3,
}

impl Generation {
    pub fn number(self) -> u8 {
        match self {
            Generation::Gen1 => 1,
            Generation::Gen2 => 2,
            Generation::Gen3 => 3,
        }
    }

    pub fn has_type(self, t: Type) -> bool {
        match t {
            Type::Fairy => false,
            Type::Dark | Type::Steel => self != Generation::Gen1,
            _ => true,
        }
    }

    pub fn abilities_per_species(self) -> usize {
        match self {
            Generation::Gen3 => 2,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Type {
    Normal,
    Fighting,
    Flying,
    Grass,
    Water,
    Fire,
    Rock,
    Ground,
    Psychic,
    Bug,
    Dragon,
    Electric,
    Ghost,
    Poison,
    Ice,
    Steel,
    Dark,
    Fairy,
}

impl Type {
    pub const ALL: [Type; 18] = [
        Type::Normal,
        Type::Fighting,
        Type::Flying,
        Type::Grass,
        Type::Water,
        Type::Fire,
        Type::Rock,
        Type::Ground,
        Type::Psychic,
        Type::Bug,
        Type::Dragon,
        Type::Electric,
        Type::Ghost,
        Type::Poison,
        Type::Ice,
        Type::Steel,
        Type::Dark,
        Type::Fairy,
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Type {
        Type::ALL[rng.gen_range(0..Type::ALL.len())]
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format!("{self:?}").to_uppercase())
    }
}

/// Growth rate of a species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpCurve {
    MediumFast,
    Erratic,
    Fluctuating,
    MediumSlow,
    Fast,
    Slow,
}

impl ExpCurve {
    pub fn from_byte(b: u8) -> ExpCurve {
        match b {
            0 => ExpCurve::MediumFast,
            1 => ExpCurve::Erratic,
            2 => ExpCurve::Fluctuating,
            3 => ExpCurve::MediumSlow,
            4 => ExpCurve::Fast,
            5 => ExpCurve::Slow,
            other => {
                log::warn!("unknown growth curve byte {other}, treating as medium fast");
                ExpCurve::MediumFast
            }
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ExpCurve::MediumFast => 0,
            ExpCurve::Erratic => 1,
            ExpCurve::Fluctuating => 2,
            ExpCurve::MediumSlow => 3,
            ExpCurve::Fast => 4,
            ExpCurve::Slow => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EvolutionMethod {
    Happiness,
    HappinessDay,
    HappinessNight,
    Level,
    Trade,
    TradeItem,
    Stone,
    LevelAttackHigher,
    LevelAtkDefSame,
    LevelDefenseHigher,
    LevelLowPv,
    LevelHighPv,
    LevelCreateExtra,
    LevelIsExtra,
    LevelHighBeauty,
}

impl EvolutionMethod {
    pub fn uses_level(self) -> bool {
        matches!(
            self,
            EvolutionMethod::Level
                | EvolutionMethod::LevelAttackHigher
                | EvolutionMethod::LevelAtkDefSame
                | EvolutionMethod::LevelDefenseHigher
                | EvolutionMethod::LevelLowPv
                | EvolutionMethod::LevelHighPv
                | EvolutionMethod::LevelCreateExtra
                | EvolutionMethod::LevelIsExtra
        )
    }

    /// Method ids of the GBA evolution table, 1-based.
    pub fn from_gen3_index(index: u16) -> Option<EvolutionMethod> {
        use EvolutionMethod::*;
        Some(match index {
            1 => Happiness,
            2 => HappinessDay,
            3 => HappinessNight,
            4 => Level,
            5 => Trade,
            6 => TradeItem,
            7 => Stone,
            8 => LevelAttackHigher,
            9 => LevelAtkDefSame,
            10 => LevelDefenseHigher,
            11 => LevelLowPv,
            12 => LevelHighPv,
            13 => LevelCreateExtra,
            14 => LevelIsExtra,
            15 => LevelHighBeauty,
            _ => return None,
        })
    }

    pub fn gen3_index(self) -> u16 {
        use EvolutionMethod::*;
        match self {
            Happiness => 1,
            HappinessDay => 2,
            HappinessNight => 3,
            Level => 4,
            Trade => 5,
            TradeItem => 6,
            Stone => 7,
            LevelAttackHigher => 8,
            LevelAtkDefSame => 9,
            LevelDefenseHigher => 10,
            LevelLowPv => 11,
            LevelHighPv => 12,
            LevelCreateExtra => 13,
            LevelIsExtra => 14,
            LevelHighBeauty => 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evolution {
    pub from: SpeciesId,
    pub to: SpeciesId,
    pub method: EvolutionMethod,
    pub extra: u16,
    pub carry_stats: bool,
}

impl Evolution {
    pub fn new(from: SpeciesId, to: SpeciesId, method: EvolutionMethod, extra: u16) -> Self {
        Evolution {
            from,
            to,
            method,
            extra,
            carry_stats: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveLearnt {
    pub level: u8,
    pub move_id: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Species {
    pub id: SpeciesId,
    pub name: String,
    pub hp: u8,
    pub attack: u8,
    pub defense: u8,
    pub speed: u8,
    pub sp_atk: u8,
    pub sp_def: u8,
    pub primary_type: Type,
    pub secondary_type: Option<Type>,
    pub catch_rate: u8,
    pub exp_yield: u8,
    pub growth_curve: ExpCurve,
    pub abilities: [u16; 3],
    pub guaranteed_held_item: u16,
    pub common_held_item: u16,
    pub rare_held_item: u16,
    pub gender_ratio: u8,
    /// Gen 1 keeps one special stat, mirrored into `sp_atk` and `sp_def`.
    pub single_special: bool,
    pub legendary: bool,
    pub cosmetic: bool,
    pub evolutions_from: Vec<Evolution>,
    pub evolutions_to: Vec<SpeciesId>,
    pub moves_learnt: Vec<MoveLearnt>,
}

impl Species {
    pub fn new(id: SpeciesId, name: impl Into<String>, primary_type: Type) -> Self {
        Species {
            id,
            name: name.into(),
            hp: 0,
            attack: 0,
            defense: 0,
            speed: 0,
            sp_atk: 0,
            sp_def: 0,
            primary_type,
            secondary_type: None,
            catch_rate: 0,
            exp_yield: 0,
            growth_curve: ExpCurve::MediumFast,
            abilities: [0; 3],
            guaranteed_held_item: 0,
            common_held_item: 0,
            rare_held_item: 0,
            gender_ratio: 0,
            single_special: false,
            legendary: is_legendary(id),
            cosmetic: false,
            evolutions_from: Vec::new(),
            evolutions_to: Vec::new(),
            moves_learnt: Vec::new(),
        }
    }

    pub fn bst(&self) -> u32 {
        let special = if self.single_special {
            self.sp_atk as u32
        } else {
            self.sp_atk as u32 + self.sp_def as u32
        };
        self.hp as u32 + self.attack as u32 + self.defense as u32 + self.speed as u32 + special
    }

    /// Stat total used when comparing strength. Shedinja's single hit point
    /// would otherwise make it look far weaker than it plays.
    pub fn bst_for_power_levels(&self) -> u32 {
        if self.id == SHEDINJA {
            let rest = self.bst() - self.hp as u32;
            rest * 6 / 5
        } else {
            self.bst()
        }
    }

    pub fn has_type(&self, t: Type) -> bool {
        self.primary_type == t || self.secondary_type == Some(t)
    }

    pub fn has_ability(&self, ability: u16) -> bool {
        self.abilities.contains(&ability)
    }
}

/// All species of one ROM, addressed by national dex number.
#[derive(Debug, Clone, Default)]
pub struct Pokedex {
    species: Vec<Option<Species>>,
}

impl Pokedex {
    pub fn new(size: usize) -> Self {
        Pokedex {
            species: vec![None; size + 1],
        }
    }

    pub fn insert(&mut self, species: Species) {
        let id = species.id as usize;
        if id >= self.species.len() {
            self.species.resize(id + 1, None);
        }
        self.species[id] = Some(species);
    }

    pub fn get(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: SpeciesId) -> Option<&mut Species> {
        self.species.get_mut(id as usize).and_then(|s| s.as_mut())
    }

    pub fn species(&self, id: SpeciesId) -> Result<&Species> {
        self.get(id).ok_or_else(|| {
            RandomiserError::Format(format!("species {id} is not present in this ROM"))
        })
    }

    pub fn name(&self, id: SpeciesId) -> String {
        self.get(id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| format!("#{id}"))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Species> {
        self.species.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Species> {
        self.species.iter_mut().flatten()
    }

    pub fn ids(&self) -> Vec<SpeciesId> {
        self.iter().map(|s| s.id).collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds an edge to both endpoints.
    pub fn add_evolution(&mut self, evo: Evolution) {
        if let Some(target) = self.get_mut(evo.to) {
            if !target.evolutions_to.contains(&evo.from) {
                target.evolutions_to.push(evo.from);
            }
        }
        if let Some(source) = self.get_mut(evo.from) {
            source.evolutions_from.push(evo);
        }
    }

    /// Species with more than one outgoing edge do not pass stats on,
    /// except for the deterministic "create extra" split.
    pub fn mark_split_evolutions(&mut self) {
        for species in self.iter_mut() {
            if species.evolutions_from.len() > 1 {
                for evo in species.evolutions_from.iter_mut() {
                    evo.carry_stats = evo.method == EvolutionMethod::LevelCreateExtra;
                }
            }
        }
    }

    pub fn validate_acyclic(&self) -> Result<()> {
        let mut finished: HashSet<SpeciesId> = HashSet::new();
        for species in self.iter() {
            let mut on_path = HashSet::new();
            self.visit(species.id, &mut on_path, &mut finished)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        id: SpeciesId,
        on_path: &mut HashSet<SpeciesId>,
        finished: &mut HashSet<SpeciesId>,
    ) -> Result<()> {
        if finished.contains(&id) {
            return Ok(());
        }
        if !on_path.insert(id) {
            return Err(RandomiserError::EvolutionCycle { species: id });
        }
        if let Some(species) = self.get(id) {
            for evo in &species.evolutions_from {
                self.visit(evo.to, on_path, finished)?;
            }
        }
        on_path.remove(&id);
        finished.insert(id);
        Ok(())
    }
}

/// Bidirectional map between a ROM's internal species index and the
/// national dex number.
#[derive(Debug, Clone, Default)]
pub struct IndexMap {
    internal_to_dex: Vec<SpeciesId>,
    dex_to_internal: Vec<u16>,
}

impl IndexMap {
    /// `table[i]` is the dex number of internal index `i + 1`; zero marks an
    /// unused slot. The first internal index wins when dex numbers repeat.
    pub fn from_order_table(table: &[u16]) -> Self {
        let max_dex = table.iter().copied().max().unwrap_or(0) as usize;
        let mut internal_to_dex = vec![0; table.len() + 1];
        let mut dex_to_internal = vec![0; max_dex + 1];
        for (i, &dex) in table.iter().enumerate() {
            let internal = i + 1;
            internal_to_dex[internal] = dex;
            if dex != 0 && dex_to_internal[dex as usize] == 0 {
                dex_to_internal[dex as usize] = internal as u16;
            }
        }
        IndexMap {
            internal_to_dex,
            dex_to_internal,
        }
    }

    pub fn dex(&self, internal: u16) -> SpeciesId {
        self.internal_to_dex
            .get(internal as usize)
            .copied()
            .unwrap_or(0)
    }

    pub fn internal(&self, dex: SpeciesId) -> Result<u16> {
        match self.dex_to_internal.get(dex as usize) {
            Some(&internal) if internal != 0 || dex == 0 => Ok(internal),
            _ => Err(RandomiserError::Format(format!(
                "species {dex} has no internal index in this ROM"
            ))),
        }
    }

    pub fn internal_count(&self) -> usize {
        self.internal_to_dex.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MultiBattleStatus {
    #[default]
    Never,
    Potential,
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainerPokemon {
    pub species: SpeciesId,
    pub level: u8,
    pub moves: [u16; 4],
    pub held_item: u16,
    pub ability_slot: u8,
    pub iv: u8,
    pub reset_moves: bool,
}

impl TrainerPokemon {
    pub fn new(species: SpeciesId, level: u8) -> Self {
        TrainerPokemon {
            species,
            level,
            moves: [0; 4],
            held_item: 0,
            ability_slot: 0,
            iv: 0,
            reset_moves: false,
        }
    }
}

pub const POKETYPE_CUSTOM_MOVES: u8 = 1;
pub const POKETYPE_HELD_ITEMS: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trainer {
    /// Stable 1-based ordinal.
    pub index: usize,
    pub offset: usize,
    pub tag: Option<String>,
    pub name: String,
    pub poketype: u8,
    pub pokemon: Vec<TrainerPokemon>,
    pub multi_battle: MultiBattleStatus,
}

impl Trainer {
    pub fn new(index: usize, offset: usize) -> Self {
        Trainer {
            index,
            offset,
            tag: None,
            name: String::new(),
            poketype: 0,
            pokemon: Vec::new(),
            multi_battle: MultiBattleStatus::Never,
        }
    }

    pub fn uses_custom_moves(&self) -> bool {
        self.poketype & POKETYPE_CUSTOM_MOVES != 0
    }

    pub fn uses_held_items(&self) -> bool {
        self.poketype & POKETYPE_HELD_ITEMS != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encounter {
    pub species: SpeciesId,
    pub level: u8,
    /// Zero when the slot has a single level.
    pub max_level: u8,
}

impl Encounter {
    pub fn new(species: SpeciesId, level: u8) -> Self {
        Encounter {
            species,
            level,
            max_level: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncounterSet {
    pub name: String,
    pub rate: u8,
    pub encounters: Vec<Encounter>,
    pub banned: BTreeSet<SpeciesId>,
}

impl EncounterSet {
    pub fn new(name: impl Into<String>, rate: u8) -> Self {
        EncounterSet {
            name: name.into(),
            rate,
            encounters: Vec::new(),
            banned: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticEncounter {
    pub species: SpeciesId,
    pub level: u8,
    pub is_egg: bool,
    pub linked: Vec<StaticEncounter>,
}

impl StaticEncounter {
    pub fn new(species: SpeciesId, level: u8) -> Self {
        StaticEncounter {
            species,
            level,
            is_egg: false,
            linked: Vec::new(),
        }
    }
}

/// One changed evolution, kept for the spoiler log.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EvolutionUpdate {
    pub from: SpeciesId,
    pub to: SpeciesId,
    pub method: EvolutionMethod,
    pub extra: u16,
    pub condensed: bool,
}

#[cfg(test)]
mod tests {
    use super::{
        Evolution, EvolutionMethod, EvolutionUpdate, ExpCurve, IndexMap, Pokedex, Species, Type,
    };
    use crate::RandomiserError;
    use std::collections::BTreeSet;

    #[test]
    fn growth_curve_bytes_map_one_to_one() {
        for b in 0..6u8 {
            assert_eq!(ExpCurve::from_byte(b).to_byte(), b);
        }
        assert_eq!(ExpCurve::from_byte(1), ExpCurve::Erratic);
        assert_eq!(ExpCurve::from_byte(5), ExpCurve::Slow);
        assert_eq!(ExpCurve::from_byte(9), ExpCurve::MediumFast);
    }

    #[test]
    fn gen3_method_indices_round_trip() {
        for i in 1..=15u16 {
            let method = EvolutionMethod::from_gen3_index(i).unwrap();
            assert_eq!(method.gen3_index(), i);
        }
        assert!(EvolutionMethod::from_gen3_index(0).is_none());
        assert!(EvolutionMethod::Level.uses_level());
        assert!(!EvolutionMethod::Stone.uses_level());
    }

    #[test]
    fn split_evolutions_stop_carrying_stats() {
        let mut dex = Pokedex::new(3);
        for id in 1..=3 {
            dex.insert(Species::new(id, format!("S{id}"), Type::Normal));
        }
        dex.add_evolution(Evolution::new(1, 2, EvolutionMethod::Stone, 1));
        dex.add_evolution(Evolution::new(1, 3, EvolutionMethod::Stone, 2));
        dex.mark_split_evolutions();
        assert!(dex.get(1).unwrap().evolutions_from.iter().all(|e| !e.carry_stats));
        assert_eq!(dex.get(2).unwrap().evolutions_to, vec![1]);
    }

    #[test]
    fn detects_cycles() {
        let mut dex = Pokedex::new(2);
        dex.insert(Species::new(1, "A", Type::Normal));
        dex.insert(Species::new(2, "B", Type::Normal));
        dex.add_evolution(Evolution::new(1, 2, EvolutionMethod::Level, 10));
        assert!(dex.validate_acyclic().is_ok());
        dex.add_evolution(Evolution::new(2, 1, EvolutionMethod::Level, 20));
        assert!(matches!(
            dex.validate_acyclic(),
            Err(RandomiserError::EvolutionCycle { .. })
        ));
    }

    #[test]
    fn order_table_maps_both_ways() {
        let map = IndexMap::from_order_table(&[112, 115, 0, 112]);
        assert_eq!(map.dex(1), 112);
        assert_eq!(map.dex(3), 0);
        assert_eq!(map.internal(112).unwrap(), 1);
        assert_eq!(map.internal(115).unwrap(), 2);
        assert!(map.internal(7).is_err());
        assert_eq!(map.internal_count(), 4);
    }

    #[test]
    fn evolution_updates_are_totally_ordered() {
        let mut set = BTreeSet::new();
        let a = EvolutionUpdate { from: 2, to: 3, method: EvolutionMethod::Level, extra: 30, condensed: true };
        let b = EvolutionUpdate { from: 1, to: 9, method: EvolutionMethod::Stone, extra: 1, condensed: false };
        let c = EvolutionUpdate { from: 2, to: 3, method: EvolutionMethod::Level, extra: 40, condensed: true };
        set.insert(a.clone());
        set.insert(b.clone());
        set.insert(c.clone());
        set.insert(a.clone());
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![b, a, c]);
    }
}
