use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;

use crate::model::{Generation, Pokedex, Species, SpeciesId, Type, WONDER_GUARD};
use crate::{RandomiserError, Result};

/// Windows a trainer replacement search evaluates before settling for
/// fewer than three candidates.
pub const TRAINER_WINDOW_ROUNDS: u32 = 2;
pub const WILD_WINDOW_ROUNDS: u32 = 3;
pub const STATIC_WINDOW_ROUNDS: u32 = 3;

/// Wild references are capped at `level * 10 + 250` for this level.
pub const WILD_BALANCE_LEVEL: u32 = 100;

/// Below this many candidates a window keeps widening.
const ENOUGH_CANDIDATES: usize = 3;

/// A stat-total range that grows by `step` on each side per round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerWindow {
    pub min: u32,
    pub max: u32,
    step: u32,
    rounds: u32,
}

impl PowerWindow {
    /// `reference ± 10%`, widening by 5%.
    pub fn around(reference: u32, rounds: u32) -> Self {
        PowerWindow {
            min: reference - reference / 10,
            max: reference + reference / 10,
            step: (reference / 20).max(1),
            rounds,
        }
    }

    /// `[reference - 20%, reference]`, widening by 5%.
    pub fn below(reference: u32, rounds: u32) -> Self {
        PowerWindow {
            min: reference - reference / 5,
            max: reference,
            step: (reference / 20).max(1),
            rounds,
        }
    }

    pub fn admits(&self, bst: u32) -> bool {
        (self.min..=self.max).contains(&bst)
    }

    pub fn widen(&mut self) {
        self.min = self.min.saturating_sub(self.step);
        self.max = self.max.saturating_add(self.step);
    }

    /// Widens until the window holds enough candidates, has used its
    /// rounds with at least one, or covers every candidate. Keeps the
    /// input order. Empty only when `candidates` is.
    pub fn select<T: Copy>(mut self, candidates: &[(T, u32)]) -> Vec<T> {
        let lowest = candidates.iter().map(|c| c.1).min();
        let highest = candidates.iter().map(|c| c.1).max();
        let (Some(lowest), Some(highest)) = (lowest, highest) else {
            return Vec::new();
        };
        let mut rounds = 0;
        loop {
            let picked: Vec<T> = candidates
                .iter()
                .filter(|c| self.admits(c.1))
                .map(|c| c.0)
                .collect();
            rounds += 1;
            let settled = !picked.is_empty()
                && (picked.len() >= ENOUGH_CANDIDATES || rounds >= self.rounds);
            if settled || (self.min <= lowest && self.max >= highest) {
                return picked;
            }
            self.widen();
        }
    }
}

/// Pools and caches one randomisation run shares between passes.
#[derive(Debug, Clone, Default)]
pub struct PoolContext {
    main: Vec<SpeciesId>,
    no_legendary: Vec<SpeciesId>,
    legendary: Vec<SpeciesId>,
    by_type: BTreeMap<(Type, bool), Vec<SpeciesId>>,
    placements: BTreeMap<SpeciesId, u32>,
    evolve_offset: Option<u32>,
}

impl PoolContext {
    pub fn new(dex: &Pokedex) -> Self {
        let mut ctx = PoolContext::default();
        ctx.set_pokemon_pool(dex);
        ctx
    }

    /// Rebuilds the pools from the current species data and drops every
    /// cached type list.
    pub fn set_pokemon_pool(&mut self, dex: &Pokedex) {
        self.main = dex.ids();
        self.no_legendary = dex.iter().filter(|s| !s.legendary).map(|s| s.id).collect();
        self.legendary = dex.iter().filter(|s| s.legendary).map(|s| s.id).collect();
        self.by_type.clear();
        log::debug!(
            "species pool: {} total, {} legendary",
            self.main.len(),
            self.legendary.len()
        );
    }

    pub fn main(&self) -> &[SpeciesId] {
        &self.main
    }

    pub fn no_legendary(&self) -> &[SpeciesId] {
        &self.no_legendary
    }

    pub fn legendary(&self) -> &[SpeciesId] {
        &self.legendary
    }

    pub fn pool(&self, no_legendaries: bool) -> &[SpeciesId] {
        if no_legendaries {
            &self.no_legendary
        } else {
            &self.main
        }
    }

    pub fn random_species<R: Rng + ?Sized>(
        &self,
        no_legendaries: bool,
        rng: &mut R,
    ) -> Result<SpeciesId> {
        pick(self.pool(no_legendaries), rng, "a random species")
    }

    /// Non-cosmetic species with type `t`, memoized until the pool is
    /// rebuilt.
    pub fn pokemon_of_type(&mut self, dex: &Pokedex, t: Type, no_legendaries: bool) -> Vec<SpeciesId> {
        self.by_type
            .entry((t, no_legendaries))
            .or_insert_with(|| {
                dex.iter()
                    .filter(|s| (!no_legendaries || !s.legendary) && !s.cosmetic && s.has_type(t))
                    .map(|s| s.id)
                    .collect()
            })
            .clone()
    }

    /// Split offset for fully-evolving trainer species. Drawn once per run.
    pub fn fully_evolve_offset<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u32 {
        *self
            .evolve_offset
            .get_or_insert_with(|| rng.gen_range(0..crate::evolution::LARGEST_SPLIT_EVOLUTIONS))
    }

    pub fn placement_count(&self, id: SpeciesId) -> u32 {
        self.placements.get(&id).copied().unwrap_or(0)
    }

    pub fn placement_average(&self) -> f64 {
        if self.placements.is_empty() {
            return 0.0;
        }
        let total: u32 = self.placements.values().sum();
        total as f64 / self.placements.len() as f64
    }

    pub fn record_placement(&mut self, id: SpeciesId) {
        *self.placements.entry(id).or_insert(0) += 1;
    }
}

pub fn pick<R: Rng + ?Sized>(list: &[SpeciesId], rng: &mut R, context: &str) -> Result<SpeciesId> {
    if list.is_empty() {
        return Err(RandomiserError::EmptyPool {
            context: context.to_string(),
        });
    }
    Ok(list[rng.gen_range(0..list.len())])
}

/// Draws without replacement.
pub fn take_random<R: Rng + ?Sized>(
    list: &mut Vec<SpeciesId>,
    rng: &mut R,
    context: &str,
) -> Result<SpeciesId> {
    if list.is_empty() {
        return Err(RandomiserError::EmptyPool {
            context: context.to_string(),
        });
    }
    let index = rng.gen_range(0..list.len());
    Ok(list.remove(index))
}

/// A random type this generation has.
pub fn random_type<R: Rng + ?Sized>(generation: Generation, rng: &mut R) -> Type {
    loop {
        let t = Type::random(rng);
        if generation.has_type(t) {
            return t;
        }
    }
}

/// Re-rolls until the species is not banned.
pub fn pick_entirely_random<R: Rng + ?Sized>(
    ctx: &PoolContext,
    no_legendaries: bool,
    banned: &BTreeSet<SpeciesId>,
    rng: &mut R,
) -> Result<SpeciesId> {
    let pool = ctx.pool(no_legendaries);
    if pool.iter().all(|id| banned.contains(id)) {
        return Err(RandomiserError::EmptyPool {
            context: "an unbanned wild species".to_string(),
        });
    }
    loop {
        let id = pick(pool, rng, "a wild species")?;
        if !banned.contains(&id) {
            return Ok(id);
        }
    }
}

/// What a trainer slot replacement must respect.
#[derive(Debug, Clone, Copy)]
pub struct TrainerRequest {
    pub current: SpeciesId,
    pub power_levels: bool,
    pub theme: Option<Type>,
    pub no_legendaries: bool,
    pub wonder_guard_allowed: bool,
    pub distributed: bool,
}

pub fn pick_trainer_replacement<R: Rng + ?Sized>(
    ctx: &mut PoolContext,
    dex: &Pokedex,
    request: &TrainerRequest,
    banned: &BTreeSet<SpeciesId>,
    rng: &mut R,
) -> Result<SpeciesId> {
    let all: Vec<SpeciesId> = ctx
        .pool(request.no_legendaries)
        .iter()
        .copied()
        .filter(|&id| dex.get(id).map_or(false, |s| !s.cosmetic))
        .collect();

    let mut pick_from = if request.distributed {
        let average = ctx.placement_average();
        let spread: Vec<SpeciesId> = all
            .iter()
            .copied()
            .filter(|&id| (ctx.placement_count(id) as f64) < average * 2.0)
            .collect();
        if spread.is_empty() {
            all
        } else {
            spread
        }
    } else if let Some(t) = request.theme {
        ctx.pokemon_of_type(dex, t, request.no_legendaries)
    } else {
        all
    };

    let unbanned: Vec<SpeciesId> = pick_from
        .iter()
        .copied()
        .filter(|id| !banned.contains(id))
        .collect();
    if !unbanned.is_empty() {
        pick_from = unbanned;
    }

    let allowed = |s: &&Species| request.wonder_guard_allowed || !s.has_ability(WONDER_GUARD);
    let candidates: Vec<&Species> = pick_from
        .iter()
        .filter_map(|&id| dex.get(id))
        .filter(allowed)
        .collect();

    if !request.power_levels {
        let ids: Vec<SpeciesId> = candidates.iter().map(|s| s.id).collect();
        return pick(&ids, rng, "a trainer species");
    }

    let reference = dex.species(request.current)?.bst_for_power_levels();
    let scored: Vec<(SpeciesId, u32)> = candidates
        .iter()
        .map(|s| (s.id, s.bst_for_power_levels()))
        .collect();
    let window = PowerWindow::around(reference, TRAINER_WINDOW_ROUNDS).select(&scored);
    if request.distributed {
        let average = ctx.placement_average();
        let rare: Vec<SpeciesId> = window
            .iter()
            .copied()
            .filter(|&id| (ctx.placement_count(id) as f64) < average)
            .collect();
        if !rare.is_empty() {
            return pick(&rare, rng, "a trainer species");
        }
    }
    pick(&window, rng, "a trainer species")
}

/// Similar-strength wild pick, skipping anything in `used`.
pub fn pick_wild_power_replacement<R: Rng + ?Sized>(
    dex: &Pokedex,
    pool: &[SpeciesId],
    current: SpeciesId,
    ban_same: bool,
    used: &BTreeSet<SpeciesId>,
    rng: &mut R,
) -> Result<SpeciesId> {
    let balanced = WILD_BALANCE_LEVEL * 10 + 250;
    let reference = dex.species(current)?.bst_for_power_levels().min(balanced);
    let scored: Vec<(SpeciesId, u32)> = pool
        .iter()
        .copied()
        .filter(|&id| !(ban_same && id == current) && !used.contains(&id))
        .filter_map(|id| dex.get(id).map(|s| (id, s.bst_for_power_levels())))
        .collect();
    let window = PowerWindow::around(reference, WILD_WINDOW_ROUNDS).select(&scored);
    pick(&window, rng, "a similar-strength wild species")
}

/// Similar-strength static pick. `limit_bst` keeps the replacement at or
/// below the original's total.
pub fn pick_static_power_replacement<R: Rng + ?Sized>(
    dex: &Pokedex,
    pool: &[SpeciesId],
    current: SpeciesId,
    ban_same: bool,
    limit_bst: bool,
    rng: &mut R,
) -> Result<SpeciesId> {
    let reference = dex.species(current)?.bst_for_power_levels();
    let window = if limit_bst {
        PowerWindow::below(reference, STATIC_WINDOW_ROUNDS)
    } else {
        PowerWindow::around(reference, STATIC_WINDOW_ROUNDS)
    };
    let scored: Vec<(SpeciesId, u32)> = pool
        .iter()
        .copied()
        .filter(|&id| !(ban_same && id == current))
        .filter_map(|id| dex.get(id).map(|s| (id, s.bst_for_power_levels())))
        .collect();
    pick(&window.select(&scored), rng, "a similar-strength static species")
}
