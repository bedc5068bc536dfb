use rand::Rng;

use crate::evolution::two_evolution_species;
use crate::model::{Pokedex, SpeciesId, StaticEncounter};
use crate::selector::{pick, pick_static_power_replacement, take_random, PoolContext};
use crate::settings::{StartersMod, StaticPokemonMod};
use crate::{RandomiserError, Result};

/// Distinct picks from `candidates`, one per slot.
fn distinct_picks<R: Rng + ?Sized>(
    candidates: &[SpeciesId],
    count: usize,
    rng: &mut R,
    context: &str,
) -> Result<Vec<SpeciesId>> {
    let mut unique = candidates.to_vec();
    unique.sort_unstable();
    unique.dedup();
    if unique.len() < count {
        return Err(RandomiserError::EmptyPool {
            context: format!("{count} distinct {context}"),
        });
    }
    let mut picked = Vec::with_capacity(count);
    while picked.len() < count {
        let id = pick(candidates, rng, context)?;
        if !picked.contains(&id) {
            picked.push(id);
        }
    }
    Ok(picked)
}

/// New starters, or `None` when the mode leaves them alone.
pub fn pick_starters<R: Rng + ?Sized>(
    mode: StartersMod,
    dex: &Pokedex,
    ctx: &PoolContext,
    count: usize,
    rng: &mut R,
) -> Result<Option<Vec<SpeciesId>>> {
    match mode {
        StartersMod::Unchanged => Ok(None),
        StartersMod::Custom => {
            log::warn!("custom starters are not carried in the settings; keeping the originals");
            Ok(None)
        }
        StartersMod::CompletelyRandom => {
            distinct_picks(ctx.main(), count, rng, "starter species").map(Some)
        }
        StartersMod::RandomWithTwoEvolutions => {
            let candidates = two_evolution_species(dex);
            distinct_picks(&candidates, count, rng, "starters with two evolutions").map(Some)
        }
    }
}

fn take_refilling<R: Rng + ?Sized>(
    left: &mut Vec<SpeciesId>,
    full: &[SpeciesId],
    rng: &mut R,
    context: &str,
) -> Result<SpeciesId> {
    if left.is_empty() {
        left.extend_from_slice(full);
    }
    take_random(left, rng, context)
}

/// Replaces each static encounter without repeating a species until the
/// pool runs out. Levels are kept and linked encounters follow their
/// parent.
pub fn randomise_static_pokemon<R: Rng + ?Sized>(
    statics: &mut [StaticEncounter],
    dex: &Pokedex,
    ctx: &PoolContext,
    mode: StaticPokemonMod,
    limit_main_game_legendaries: bool,
    rng: &mut R,
) -> Result<()> {
    match mode {
        StaticPokemonMod::Unchanged => return Ok(()),
        StaticPokemonMod::RandomMatching => {
            let mut legendaries_left = ctx.legendary().to_vec();
            let mut others_left = ctx.no_legendary().to_vec();
            for encounter in statics.iter_mut() {
                encounter.species = if dex.species(encounter.species)?.legendary {
                    take_refilling(&mut legendaries_left, ctx.legendary(), rng, "a legendary")?
                } else {
                    take_refilling(&mut others_left, ctx.no_legendary(), rng, "a non-legendary")?
                };
            }
        }
        StaticPokemonMod::CompletelyRandom => {
            let mut left = ctx.main().to_vec();
            for encounter in statics.iter_mut() {
                encounter.species = take_refilling(&mut left, ctx.main(), rng, "a static species")?;
            }
        }
        StaticPokemonMod::SimilarStrength => {
            let mut left = ctx.main().to_vec();
            for encounter in statics.iter_mut() {
                if left.is_empty() {
                    left = ctx.main().to_vec();
                }
                let old = encounter.species;
                let limit = limit_main_game_legendaries && dex.species(old)?.legendary;
                let picked = pick_static_power_replacement(dex, &left, old, true, limit, rng)?;
                left.retain(|&id| id != picked);
                encounter.species = picked;
            }
        }
    }
    for encounter in statics.iter_mut() {
        let species = encounter.species;
        for linked in encounter.linked.iter_mut() {
            linked.species = species;
        }
    }
    log::info!("randomised {} static encounters ({mode:?})", statics.len());
    Ok(())
}

/// A random species the title screen can show.
pub fn pick_intro_species<R, F>(ctx: &PoolContext, allowed: F, rng: &mut R) -> Result<SpeciesId>
where
    R: Rng + ?Sized,
    F: Fn(SpeciesId) -> bool,
{
    if !ctx.main().iter().any(|&id| allowed(id)) {
        return Err(RandomiserError::EmptyPool {
            context: "an intro species".to_string(),
        });
    }
    loop {
        let id = ctx.random_species(false, rng)?;
        if allowed(id) {
            return Ok(id);
        }
    }
}
