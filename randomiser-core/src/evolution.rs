use std::collections::{BTreeSet, HashSet};

use rand::Rng;

use crate::model::{Evolution, EvolutionMethod, EvolutionUpdate, Pokedex, SpeciesId};
use crate::{RandomiserError, Result};

/// Upper bound on how many ways a single species can branch.
pub const LARGEST_SPLIT_EVOLUTIONS: u32 = 8;

pub fn record_update(updates: &mut BTreeSet<EvolutionUpdate>, evo: &Evolution, condensed: bool) {
    updates.insert(EvolutionUpdate {
        from: evo.from,
        to: evo.to,
        method: evo.method,
        extra: evo.extra,
        condensed,
    });
}

/// Lowers level requirements: a stage that evolves again is capped at
/// `max_intermediate`, anything else at `max_level`.
pub fn condense_level_evolutions(
    dex: &mut Pokedex,
    max_level: u16,
    max_intermediate: u16,
) -> BTreeSet<EvolutionUpdate> {
    let evolves: HashSet<SpeciesId> = dex
        .iter()
        .filter(|s| !s.evolutions_from.is_empty())
        .map(|s| s.id)
        .collect();

    let mut updates = BTreeSet::new();
    for species in dex.iter_mut() {
        for evo in species.evolutions_from.iter_mut() {
            if !evo.method.uses_level() {
                continue;
            }
            if evo.extra > max_intermediate && evolves.contains(&evo.to) {
                evo.extra = max_intermediate;
                record_update(&mut updates, evo, true);
            } else if evo.extra > max_level {
                evo.extra = max_level;
                record_update(&mut updates, evo, true);
            }
        }
    }
    updates
}

/// Longest chain below `id`, looking at most `max_depth` stages down.
pub fn num_evolutions(dex: &Pokedex, id: SpeciesId, max_depth: usize) -> usize {
    fn walk(dex: &Pokedex, id: SpeciesId, depth: usize, max_depth: usize) -> usize {
        let Some(species) = dex.get(id) else {
            return 0;
        };
        if species.evolutions_from.is_empty() {
            return 0;
        }
        if depth + 1 == max_depth {
            return 1;
        }
        species
            .evolutions_from
            .iter()
            .map(|evo| walk(dex, evo.to, depth + 1, max_depth) + 1)
            .max()
            .unwrap_or(0)
    }
    walk(dex, id, 0, max_depth)
}

/// Base forms with at least two stages above them.
pub fn two_evolution_species(dex: &Pokedex) -> Vec<SpeciesId> {
    dex.iter()
        .filter(|s| s.evolutions_to.is_empty() && !s.evolutions_from.is_empty())
        .filter(|s| {
            s.evolutions_from.iter().any(|evo| {
                dex.get(evo.to)
                    .map_or(false, |next| !next.evolutions_from.is_empty())
            })
        })
        .map(|s| s.id)
        .collect()
}

pub fn pick_random_evolution_of<R: Rng + ?Sized>(
    dex: &Pokedex,
    base: SpeciesId,
    must_evolve_itself: bool,
    rng: &mut R,
) -> Result<SpeciesId> {
    let species = dex.species(base)?;
    let candidates: Vec<SpeciesId> = species
        .evolutions_from
        .iter()
        .filter(|evo| {
            !must_evolve_itself
                || dex
                    .get(evo.to)
                    .map_or(false, |next| !next.evolutions_from.is_empty())
        })
        .map(|evo| evo.to)
        .collect();
    if candidates.is_empty() {
        return Err(RandomiserError::EmptyPool {
            context: format!("an evolution of {}", species.name),
        });
    }
    Ok(candidates[rng.gen_range(0..candidates.len())])
}

/// Follows evolutions to the end of the line. Splits are resolved with
/// `(offset + trainer_index) % branches` so the same trainer always gets
/// the same branch within a run.
pub fn fully_evolve(
    dex: &Pokedex,
    start: SpeciesId,
    offset: u32,
    trainer_index: usize,
) -> Result<SpeciesId> {
    let mut seen = HashSet::new();
    seen.insert(start);
    let mut current = start;
    loop {
        let species = dex.species(current)?;
        if species.evolutions_from.is_empty() {
            return Ok(current);
        }
        let branch = (offset as usize + trainer_index) % species.evolutions_from.len();
        current = species.evolutions_from[branch].to;
        if !seen.insert(current) {
            return Err(RandomiserError::EvolutionCycle { species: current });
        }
    }
}

/// Applies `change` to every evolution and records the ones it rewrites.
pub fn rewrite_evolutions<F>(dex: &mut Pokedex, mut change: F) -> BTreeSet<EvolutionUpdate>
where
    F: FnMut(&Evolution) -> Option<(EvolutionMethod, u16)>,
{
    let mut updates = BTreeSet::new();
    for species in dex.iter_mut() {
        for evo in species.evolutions_from.iter_mut() {
            if let Some((method, extra)) = change(evo) {
                evo.method = method;
                evo.extra = extra;
                record_update(&mut updates, evo, false);
            }
        }
    }
    updates
}
