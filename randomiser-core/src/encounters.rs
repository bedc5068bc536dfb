use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::model::{EncounterSet, Generation, Pokedex, SpeciesId};
use crate::selector::{
    pick_entirely_random, pick_wild_power_replacement, random_type, take_random, PoolContext,
};
use crate::settings::{Settings, WildPokemonMod, WildPokemonRestrictionMod};
use crate::{RandomiserError, Result};

const MAX_THEME_ATTEMPTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncounterOptions {
    pub mode: WildPokemonMod,
    pub restriction: WildPokemonRestrictionMod,
    pub no_legendaries: bool,
}

impl EncounterOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        EncounterOptions {
            mode: settings.wild_pokemon_mod,
            restriction: settings.wild_pokemon_restriction_mod,
            no_legendaries: settings.block_wild_legendaries,
        }
    }
}

pub fn randomise_encounters<R: Rng + ?Sized>(
    sets: &mut [EncounterSet],
    dex: &Pokedex,
    generation: Generation,
    ctx: &mut PoolContext,
    options: &EncounterOptions,
    rng: &mut R,
) -> Result<()> {
    match options.mode {
        WildPokemonMod::Unchanged => return Ok(()),
        WildPokemonMod::Random => random_encounters(sets, ctx, options.no_legendaries, rng)?,
        WildPokemonMod::AreaMapping => area_one_to_one(sets, dex, generation, ctx, options, rng)?,
        WildPokemonMod::GlobalMapping => global_one_to_one(sets, dex, ctx, options, rng)?,
    }
    log::info!("randomised {} encounter tables ({:?})", sets.len(), options.mode);
    Ok(())
}

fn shuffled_order<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    order.shuffle(rng);
    order
}

/// Every slot becomes an independent random species.
pub fn random_encounters<R: Rng + ?Sized>(
    sets: &mut [EncounterSet],
    ctx: &PoolContext,
    no_legendaries: bool,
    rng: &mut R,
) -> Result<()> {
    for pos in shuffled_order(sets.len(), rng) {
        let set = &mut sets[pos];
        for encounter in set.encounters.iter_mut() {
            encounter.species = pick_entirely_random(ctx, no_legendaries, &set.banned, rng)?;
        }
    }
    Ok(())
}

/// Distinct species of a table, in id order.
fn species_in(set: &EncounterSet) -> BTreeSet<SpeciesId> {
    set.encounters.iter().map(|e| e.species).collect()
}

fn apply_map(set: &mut EncounterSet, map: &BTreeMap<SpeciesId, SpeciesId>) {
    for encounter in set.encounters.iter_mut() {
        if let Some(&new) = map.get(&encounter.species) {
            encounter.species = new;
        }
    }
}

/// One substitution per table: slots that shared a species still do.
pub fn area_one_to_one<R: Rng + ?Sized>(
    sets: &mut [EncounterSet],
    dex: &Pokedex,
    generation: Generation,
    ctx: &mut PoolContext,
    options: &EncounterOptions,
    rng: &mut R,
) -> Result<()> {
    for pos in shuffled_order(sets.len(), rng) {
        let in_area = species_in(&sets[pos]);
        let banned = &sets[pos].banned;
        let mut map = BTreeMap::new();
        match options.restriction {
            WildPokemonRestrictionMod::TypeThemeAreas => {
                let mut possible = Vec::new();
                for _ in 0..MAX_THEME_ATTEMPTS {
                    let theme = random_type(generation, rng);
                    possible = ctx.pokemon_of_type(dex, theme, options.no_legendaries);
                    possible.retain(|id| !banned.contains(id));
                    if possible.len() >= in_area.len() {
                        log::debug!("{} themed {theme}", sets[pos].name);
                        break;
                    }
                }
                if possible.len() < in_area.len() {
                    return Err(RandomiserError::EmptyPool {
                        context: format!("a type theme covering '{}'", sets[pos].name),
                    });
                }
                for &old in &in_area {
                    map.insert(old, take_random(&mut possible, rng, "a themed wild species")?);
                }
            }
            WildPokemonRestrictionMod::SimilarStrength => {
                let allowed: Vec<SpeciesId> = ctx
                    .pool(options.no_legendaries)
                    .iter()
                    .copied()
                    .filter(|id| !banned.contains(id))
                    .collect();
                let mut used = BTreeSet::new();
                for &old in &in_area {
                    let picked = pick_wild_power_replacement(dex, &allowed, old, false, &used, rng)?;
                    used.insert(picked);
                    map.insert(old, picked);
                }
            }
            WildPokemonRestrictionMod::None | WildPokemonRestrictionMod::CatchEmAll => {
                let mut allowed: Vec<SpeciesId> = ctx
                    .pool(options.no_legendaries)
                    .iter()
                    .copied()
                    .filter(|id| !banned.contains(id))
                    .collect();
                for &old in &in_area {
                    map.insert(old, take_random(&mut allowed, rng, "a wild species")?);
                }
            }
        }
        apply_map(&mut sets[pos], &map);
    }
    Ok(())
}

/// One substitution shared by every table. Candidates avoid every
/// table's bans; the pool is reused once each species has been placed.
pub fn global_one_to_one<R: Rng + ?Sized>(
    sets: &mut [EncounterSet],
    dex: &Pokedex,
    ctx: &PoolContext,
    options: &EncounterOptions,
    rng: &mut R,
) -> Result<()> {
    let everywhere: BTreeSet<SpeciesId> = sets.iter().flat_map(species_in).collect();
    let banned: BTreeSet<SpeciesId> = sets.iter().flat_map(|s| s.banned.iter().copied()).collect();
    let allowed: Vec<SpeciesId> = ctx
        .pool(options.no_legendaries)
        .iter()
        .copied()
        .filter(|id| !banned.contains(id))
        .collect();

    let similar = options.restriction == WildPokemonRestrictionMod::SimilarStrength;
    let mut remaining = allowed.clone();
    let mut used = BTreeSet::new();
    let mut map = BTreeMap::new();
    for &old in &everywhere {
        if remaining.is_empty() {
            remaining = allowed.clone();
            used.clear();
        }
        let picked = if similar {
            pick_wild_power_replacement(dex, &allowed, old, false, &used, rng)?
        } else {
            take_random(&mut remaining, rng, "a wild species")?
        };
        remaining.retain(|&id| id != picked);
        used.insert(picked);
        map.insert(old, picked);
    }
    for set in sets.iter_mut() {
        apply_map(set, &map);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{randomise_encounters, EncounterOptions};
    use crate::model::{Encounter, EncounterSet, Generation, Pokedex, Species, Type};
    use crate::selector::PoolContext;
    use crate::settings::{WildPokemonMod, WildPokemonRestrictionMod};
    use crate::RandomiserError;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::{BTreeMap, BTreeSet};

    // 30 species cycling through five types, stat totals rising with id.
    fn dex() -> Pokedex {
        let types = [Type::Fire, Type::Water, Type::Grass, Type::Bug, Type::Normal];
        let mut dex = Pokedex::new(30);
        for id in 1..=30u16 {
            let mut s = Species::new(id, format!("S{id}"), types[id as usize % types.len()]);
            s.hp = 20 + id as u8 * 4;
            s.attack = 50;
            s.defense = 50;
            s.speed = 50;
            s.sp_atk = 50;
            s.sp_def = 50;
            dex.insert(s);
        }
        dex.get_mut(30).unwrap().legendary = true;
        dex
    }

    fn table(name: &str, species: &[u16]) -> EncounterSet {
        let mut set = EncounterSet::new(name, 20);
        set.encounters = species.iter().map(|&s| Encounter::new(s, 5)).collect();
        set
    }

    fn tables() -> Vec<EncounterSet> {
        let mut route = table("Route 1", &[1, 2, 1, 3, 2, 1]);
        route.banned.insert(7);
        vec![route, table("Cave", &[4, 4, 5]), table("Lake", &[2, 6, 6, 6])]
    }

    fn options(mode: WildPokemonMod, restriction: WildPokemonRestrictionMod) -> EncounterOptions {
        EncounterOptions {
            mode,
            restriction,
            no_legendaries: true,
        }
    }

    fn run(options: &EncounterOptions, seed: u64) -> Vec<EncounterSet> {
        let dex = dex();
        let mut ctx = PoolContext::new(&dex);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sets = tables();
        randomise_encounters(&mut sets, &dex, Generation::Gen2, &mut ctx, options, &mut rng).unwrap();
        sets
    }

    /// Slots that shared a species before share one after, and distinct
    /// species stay distinct.
    fn assert_shares_preserved(before: &EncounterSet, after: &EncounterSet) {
        let mut map = BTreeMap::new();
        for (old, new) in before.encounters.iter().zip(&after.encounters) {
            assert_eq!(*map.entry(old.species).or_insert(new.species), new.species);
        }
        let targets: BTreeSet<u16> = map.values().copied().collect();
        assert_eq!(targets.len(), map.len());
    }

    #[test]
    fn unchanged_leaves_tables_alone() {
        let sets = run(&options(WildPokemonMod::Unchanged, WildPokemonRestrictionMod::None), 1);
        assert_eq!(sets, tables());
    }

    #[test]
    fn random_slots_avoid_bans_and_legendaries() {
        for seed in 0..10 {
            let sets = run(&options(WildPokemonMod::Random, WildPokemonRestrictionMod::None), seed);
            for e in &sets[0].encounters {
                assert_ne!(e.species, 7);
            }
            for set in &sets {
                assert!(set.encounters.iter().all(|e| e.species != 30 && e.level == 5));
            }
        }
    }

    #[test]
    fn area_mapping_keeps_shared_slots_together() {
        let before = tables();
        for restriction in [
            WildPokemonRestrictionMod::None,
            WildPokemonRestrictionMod::CatchEmAll,
            WildPokemonRestrictionMod::SimilarStrength,
            WildPokemonRestrictionMod::TypeThemeAreas,
        ] {
            for seed in 0..5 {
                let sets = run(&options(WildPokemonMod::AreaMapping, restriction), seed);
                for (old, new) in before.iter().zip(&sets) {
                    assert_eq!(new.name, old.name);
                    assert_shares_preserved(old, new);
                }
                assert!(sets[0].encounters.iter().all(|e| e.species != 7));
            }
        }
    }

    #[test]
    fn type_themed_areas_share_a_type() {
        let dex = dex();
        for seed in 0..10 {
            let sets = run(
                &options(WildPokemonMod::AreaMapping, WildPokemonRestrictionMod::TypeThemeAreas),
                seed,
            );
            for set in &sets {
                let first = dex.get(set.encounters[0].species).unwrap().primary_type;
                assert!(set
                    .encounters
                    .iter()
                    .all(|e| dex.get(e.species).unwrap().primary_type == first));
            }
        }
    }

    #[test]
    fn similar_strength_stays_close() {
        let dex = dex();
        let before = tables();
        let sets = run(
            &options(WildPokemonMod::AreaMapping, WildPokemonRestrictionMod::SimilarStrength),
            3,
        );
        for (old, new) in before.iter().zip(&sets) {
            for (o, n) in old.encounters.iter().zip(&new.encounters) {
                let a = dex.get(o.species).unwrap().bst() as i64;
                let b = dex.get(n.species).unwrap().bst() as i64;
                assert!((a - b).abs() <= a / 2, "{} -> {}", o.species, n.species);
            }
        }
    }

    #[test]
    fn global_mapping_is_consistent_across_tables() {
        let before = tables();
        let sets = run(&options(WildPokemonMod::GlobalMapping, WildPokemonRestrictionMod::None), 12);
        let mut map = BTreeMap::new();
        for (old, new) in before.iter().zip(&sets) {
            for (o, n) in old.encounters.iter().zip(&new.encounters) {
                assert_eq!(*map.entry(o.species).or_insert(n.species), n.species);
                assert_ne!(n.species, 7);
            }
        }
    }

    #[test]
    fn same_seed_same_tables() {
        let opts = options(WildPokemonMod::AreaMapping, WildPokemonRestrictionMod::TypeThemeAreas);
        assert_eq!(run(&opts, 77), run(&opts, 77));
    }

    #[test]
    fn impossible_theme_is_an_error() {
        let mut dex = Pokedex::new(2);
        dex.insert(Species::new(1, "A", Type::Fire));
        dex.insert(Species::new(2, "B", Type::Water));
        let mut ctx = PoolContext::new(&dex);
        let mut rng = StdRng::seed_from_u64(0);
        let mut sets = vec![table("Crowded", &[1, 2])];
        let result = randomise_encounters(
            &mut sets,
            &dex,
            Generation::Gen1,
            &mut ctx,
            &options(WildPokemonMod::AreaMapping, WildPokemonRestrictionMod::TypeThemeAreas),
            &mut rng,
        );
        assert!(matches!(result, Err(RandomiserError::EmptyPool { .. })));
    }
}
