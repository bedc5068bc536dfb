use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::evolution::{fully_evolve, num_evolutions, pick_random_evolution_of};
use crate::model::{Generation, Pokedex, Species, SpeciesId, Trainer, TrainerPokemon, Type};
use crate::selector::{pick_trainer_replacement, random_type, PoolContext, TrainerRequest};
use crate::settings::{Settings, TrainersMod};
use crate::Result;

/// Yellow's first rival fight decides the rival's starter and stays as is.
const INITIAL_RIVAL_TAG: &str = "IRIVAL";
const UBER_TAG: &str = "UBER";
const EARLY_WONDER_GUARD_LEVEL: u8 = 20;

const MIDDLE_STAGE_LEVEL: u8 = 16;
const FINAL_STAGE_LEVEL: u8 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainerOptions {
    pub mode: TrainersMod,
    pub power_levels: bool,
    pub no_legendaries: bool,
    pub block_early_wonder_guard: bool,
    /// Level from which roster entries are forced to their final form.
    pub force_fully_evolved: Option<u8>,
}

impl TrainerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        TrainerOptions {
            mode: settings.trainers_mod,
            power_levels: settings.trainers_use_pokemon_of_similar_strength,
            no_legendaries: settings.trainers_block_legendaries,
            block_early_wonder_guard: settings.trainers_block_early_wonder_guard,
            force_fully_evolved: settings
                .trainers_force_fully_evolved
                .then_some(settings.trainers_force_fully_evolved_level),
        }
    }
}

fn is_initial_rival(trainer: &Trainer) -> bool {
    trainer.tag.as_deref() == Some(INITIAL_RIVAL_TAG)
}

/// Random ability slot (1-based) that holds an ability, or 0 when the
/// generation has none.
pub fn random_ability_slot<R: Rng + ?Sized>(
    generation: Generation,
    species: &Species,
    rng: &mut R,
) -> u8 {
    let slots = generation.abilities_per_species();
    if slots == 0 || species.abilities[..slots].iter().all(|&a| a == 0) {
        return 0;
    }
    loop {
        let slot = rng.gen_range(0..slots);
        if species.abilities[slot] != 0 {
            return slot as u8 + 1;
        }
    }
}

/// Type for each themed trainer group, keyed by position in `trainers`.
fn group_types<R: Rng + ?Sized>(
    trainers: &[Trainer],
    generation: Generation,
    gyms_and_elites_only: bool,
    used_uber_types: &mut BTreeSet<Type>,
    rng: &mut R,
) -> BTreeMap<usize, Type> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (pos, trainer) in trainers.iter().enumerate() {
        if is_initial_rival(trainer) {
            continue;
        }
        let tag = trainer.tag.as_deref().unwrap_or("");
        let group = tag.split('-').next().unwrap_or(tag);
        let themed = group.starts_with("GYM")
            || group.starts_with("ELITE")
            || (!gyms_and_elites_only
                && (group.starts_with("CHAMPION") || group.starts_with("THEMED")));
        if themed {
            groups.entry(group.to_string()).or_default().push(pos);
        } else if group.starts_with("GIO") {
            groups.entry("GYM8".to_string()).or_default().push(pos);
        }
    }

    let mut used_gym_types = BTreeSet::new();
    let mut used_elite_types = BTreeSet::new();
    let mut types = BTreeMap::new();
    for (group, members) in groups.iter_mut() {
        members.shuffle(rng);
        let mut t = random_type(generation, rng);
        if group.starts_with("GYM") {
            while used_gym_types.contains(&t) {
                t = random_type(generation, rng);
            }
            used_gym_types.insert(t);
        }
        if group.starts_with("ELITE") {
            while used_elite_types.contains(&t) {
                t = random_type(generation, rng);
            }
            used_elite_types.insert(t);
        }
        if group == "CHAMPION" {
            used_uber_types.insert(t);
        }
        log::debug!("trainer group {group} themed {t}");
        for &pos in members.iter() {
            types.insert(pos, t);
        }
    }
    types
}

/// Typed candidates whose final form drops the theme.
fn wrong_type_finals<R: Rng + ?Sized>(
    ctx: &mut PoolContext,
    dex: &Pokedex,
    theme: Type,
    no_legendaries: bool,
    trainer_index: usize,
    rng: &mut R,
) -> Result<BTreeSet<SpeciesId>> {
    let offset = ctx.fully_evolve_offset(rng);
    let mut wrong = BTreeSet::new();
    for id in ctx.pokemon_of_type(dex, theme, no_legendaries) {
        let last = fully_evolve(dex, id, offset, trainer_index)?;
        if !dex.species(last)?.has_type(theme) {
            wrong.insert(id);
        }
    }
    Ok(wrong)
}

/// Replaces every roster species. Trainers are visited in a shuffled
/// order but stay in place in `trainers`.
pub fn randomise_trainer_pokemon<R: Rng + ?Sized>(
    trainers: &mut [Trainer],
    dex: &Pokedex,
    generation: Generation,
    ctx: &mut PoolContext,
    options: &TrainerOptions,
    rng: &mut R,
) -> Result<()> {
    let mut used_uber_types = BTreeSet::new();
    let types = if options.mode.is_type_themed() {
        group_types(
            trainers,
            generation,
            options.mode == TrainersMod::TypeThemedElite4Gyms,
            &mut used_uber_types,
            rng,
        )
    } else {
        BTreeMap::new()
    };

    let mut order: Vec<usize> = (0..trainers.len()).collect();
    order.shuffle(rng);

    let distributed = options.mode.is_distributed();

    for pos in order {
        if is_initial_rival(&trainers[pos]) {
            continue;
        }
        let mut theme = types.get(&pos).copied();
        if theme.is_none() && options.mode == TrainersMod::TypeThemed {
            let mut t = random_type(generation, rng);
            if trainers[pos].tag.as_deref() == Some(UBER_TAG) {
                while used_uber_types.contains(&t) {
                    t = random_type(generation, rng);
                }
                used_uber_types.insert(t);
            }
            theme = Some(t);
        }

        let mut banned = BTreeSet::new();
        if let (Some(t), Some(_)) = (theme, options.force_fully_evolved) {
            let index = trainers[pos].index;
            banned.extend(wrong_type_finals(ctx, dex, t, options.no_legendaries, index, rng)?);
        }

        for tp in trainers[pos].pokemon.iter_mut() {
            let request = TrainerRequest {
                current: tp.species,
                power_levels: options.power_levels,
                theme,
                no_legendaries: options.no_legendaries,
                wonder_guard_allowed: !options.block_early_wonder_guard
                    || tp.level >= EARLY_WONDER_GUARD_LEVEL,
                distributed,
            };
            let picked = pick_trainer_replacement(ctx, dex, &request, &banned, rng)?;
            if distributed {
                ctx.record_placement(picked);
            }
            tp.species = picked;
            tp.ability_slot = random_ability_slot(generation, dex.species(picked)?, rng);
            tp.reset_moves = true;
        }
    }
    log::info!("randomised {} trainers", trainers.len());
    Ok(())
}

/// Every roster entry at or above `level` becomes its final evolution.
pub fn force_fully_evolved<R: Rng + ?Sized>(
    trainers: &mut [Trainer],
    dex: &Pokedex,
    ctx: &mut PoolContext,
    level: u8,
    rng: &mut R,
) -> Result<()> {
    let offset = ctx.fully_evolve_offset(rng);
    let mut changed = 0;
    for trainer in trainers.iter_mut() {
        let index = trainer.index;
        for tp in trainer.pokemon.iter_mut().filter(|tp| tp.level >= level) {
            let evolved = fully_evolve(dex, tp.species, offset, index)?;
            if evolved != tp.species {
                tp.species = evolved;
                tp.reset_moves = true;
                changed += 1;
            }
        }
    }
    log::debug!("forced {changed} trainer pokemon to their final form from level {level}");
    Ok(())
}

/// Highest-level entry, with the last slot getting a +2 edge and ties
/// going to the earlier slot.
fn ace_position(pokemon: &[TrainerPokemon]) -> Option<usize> {
    let first = pokemon.first()?;
    let last = pokemon.len() - 1;
    let mut best = 0;
    let mut best_level = first.level as u16;
    for (i, tp) in pokemon.iter().enumerate().skip(1) {
        let bonus = if i == last { 2 } else { 0 };
        if tp.level as u16 + bonus > best_level {
            best = i;
            best_level = tp.level as u16;
        }
    }
    Some(best)
}

/// Ace level of the first trainer with this exact tag, 0 when absent.
fn level_of_starter(trainers: &[Trainer], tag: &str) -> u8 {
    trainers
        .iter()
        .find(|t| t.tag.as_deref() == Some(tag))
        .and_then(|t| ace_position(&t.pokemon).map(|i| t.pokemon[i].level))
        .unwrap_or(0)
}

fn change_starter_with_tag(trainers: &mut [Trainer], tag: &str, starter: SpeciesId, ability_slot: u8) {
    for trainer in trainers.iter_mut().filter(|t| t.tag.as_deref() == Some(tag)) {
        if let Some(i) = ace_position(&trainer.pokemon) {
            let ace = &mut trainer.pokemon[i];
            ace.species = starter;
            ace.reset_moves = true;
            ace.ability_slot = ability_slot;
        }
    }
}

/// Largest `N` among tags shaped `{prefix}N-...`.
fn highest_battle_number(trainers: &[Trainer], prefix: &str) -> u32 {
    trainers
        .iter()
        .filter_map(|t| t.tag.as_deref()?.strip_prefix(prefix))
        .filter_map(|rest| rest.split('-').next()?.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// Gives rival (or friend) teams the starter our choice leaves them,
/// evolving it as their levels rise. `offset` is how far along the
/// starter list their pick sits from the player's.
pub fn rival_carries_starter<R: Rng + ?Sized>(
    trainers: &mut [Trainer],
    dex: &Pokedex,
    generation: Generation,
    starters: &[SpeciesId],
    prefix: &str,
    offset: usize,
    rng: &mut R,
) -> Result<()> {
    let highest = highest_battle_number(trainers, prefix);
    if highest == 0 || starters.is_empty() {
        return Ok(());
    }

    if starters.len() == 2 {
        return yellow_rival(trainers, dex, starters[1], prefix, rng);
    }

    for team in 0..3 {
        let Some(&starter) = starters.get((team + offset) % starters.len()) else {
            continue;
        };
        if num_evolutions(dex, starter, 2) != 2 {
            continue;
        }
        let ability_slot = random_ability_slot(generation, dex.species(starter)?, rng);
        let tag = |battle: u32| format!("{prefix}{battle}-{team}");

        let mut battle = 1;
        let mut current = starter;
        while battle <= highest && level_of_starter(trainers, &tag(battle)) < MIDDLE_STAGE_LEVEL {
            change_starter_with_tag(trainers, &tag(battle), current, ability_slot);
            battle += 1;
        }
        current = pick_random_evolution_of(dex, current, true, rng)?;
        while battle <= highest && level_of_starter(trainers, &tag(battle)) < FINAL_STAGE_LEVEL {
            change_starter_with_tag(trainers, &tag(battle), current, ability_slot);
            battle += 1;
        }
        current = pick_random_evolution_of(dex, current, false, rng)?;
        while battle <= highest {
            change_starter_with_tag(trainers, &tag(battle), current, ability_slot);
            battle += 1;
        }
        log::debug!("{prefix} team {team} carries {}", dex.name(starter));
    }
    Ok(())
}

/// Yellow's rival always has team 0 and follows a fixed evolution
/// schedule by battle number.
fn yellow_rival<R: Rng + ?Sized>(
    trainers: &mut [Trainer],
    dex: &Pokedex,
    starter: SpeciesId,
    prefix: &str,
    rng: &mut R,
) -> Result<()> {
    if num_evolutions(dex, starter, 2) != 2 {
        return Ok(());
    }
    for battle in 1..=2 {
        change_starter_with_tag(trainers, &format!("{prefix}{battle}-0"), starter, 0);
    }
    let middle = pick_random_evolution_of(dex, starter, true, rng)?;
    change_starter_with_tag(trainers, &format!("{prefix}3-0"), middle, 0);
    for variant in 0..3 {
        change_starter_with_tag(trainers, &format!("{prefix}4-{variant}"), middle, 0);
    }
    let last = pick_random_evolution_of(dex, middle, false, rng)?;
    for battle in 5..=7 {
        for variant in 0..3 {
            change_starter_with_tag(trainers, &format!("{prefix}{battle}-{variant}"), last, 0);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        ace_position, force_fully_evolved, highest_battle_number, random_ability_slot,
        randomise_trainer_pokemon, rival_carries_starter, TrainerOptions,
    };
    use crate::evolution::fully_evolve;
    use crate::model::{
        Evolution, EvolutionMethod, Generation, Pokedex, Species, Trainer, TrainerPokemon, Type,
    };
    use crate::selector::PoolContext;
    use crate::settings::{Settings, TrainersMod};
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::BTreeSet;

    // 1 -> 2 -> 3 fire line, 4 -> {5, 6} water split, 7..=12 mixed
    // singles, 10 grass that evolves into 11 poison.
    fn dex() -> Pokedex {
        let types = [
            Type::Fire,
            Type::Fire,
            Type::Fire,
            Type::Water,
            Type::Water,
            Type::Water,
            Type::Water,
            Type::Grass,
            Type::Grass,
            Type::Grass,
            Type::Poison,
            Type::Normal,
        ];
        let mut dex = Pokedex::new(types.len());
        for (i, t) in types.iter().enumerate() {
            let id = i as u16 + 1;
            let mut s = Species::new(id, format!("S{id}"), *t);
            s.hp = 40 + id as u8 * 5;
            s.attack = 50;
            s.defense = 50;
            s.speed = 50;
            s.sp_atk = 50;
            s.sp_def = 50;
            s.abilities = [7, 9, 0];
            dex.insert(s);
        }
        dex.add_evolution(Evolution::new(1, 2, EvolutionMethod::Level, 16));
        dex.add_evolution(Evolution::new(2, 3, EvolutionMethod::Level, 36));
        dex.add_evolution(Evolution::new(4, 5, EvolutionMethod::Stone, 1));
        dex.add_evolution(Evolution::new(4, 6, EvolutionMethod::Stone, 2));
        dex.add_evolution(Evolution::new(10, 11, EvolutionMethod::Level, 30));
        dex.mark_split_evolutions();
        dex
    }

    fn trainer(index: usize, tag: Option<&str>, levels: &[u8]) -> Trainer {
        let mut t = Trainer::new(index, 0);
        t.tag = tag.map(str::to_string);
        t.pokemon = levels.iter().map(|&l| TrainerPokemon::new(12, l)).collect();
        t
    }

    fn options(mode: TrainersMod) -> TrainerOptions {
        TrainerOptions {
            mode,
            power_levels: false,
            no_legendaries: true,
            block_early_wonder_guard: true,
            force_fully_evolved: None,
        }
    }

    #[test]
    fn options_follow_settings() {
        let settings = Settings {
            trainers_mod: TrainersMod::Distributed,
            trainers_force_fully_evolved: true,
            trainers_force_fully_evolved_level: 40,
            ..Settings::default()
        };
        let options = TrainerOptions::from_settings(&settings);
        assert_eq!(options.force_fully_evolved, Some(40));
        assert!(options.mode.is_distributed());
        assert!(TrainerOptions::from_settings(&Settings::default()).force_fully_evolved.is_none());
    }

    #[test]
    fn ability_slots_skip_empty_abilities() {
        let dex = dex();
        let mut rng = StdRng::seed_from_u64(4);
        let species = dex.get(1).unwrap();
        assert_eq!(random_ability_slot(Generation::Gen2, species, &mut rng), 0);
        let mut seen = BTreeSet::new();
        for _ in 0..50 {
            seen.insert(random_ability_slot(Generation::Gen3, species, &mut rng));
        }
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![1, 2]);

        let mut single = species.clone();
        single.abilities = [7, 0, 0];
        for _ in 0..20 {
            assert_eq!(random_ability_slot(Generation::Gen3, &single, &mut rng), 1);
        }
    }

    /// Adds one single-typed species for every gen 1 type so any theme
    /// has candidates.
    fn every_type_dex() -> Pokedex {
        let mut dex = dex();
        let gen1_types = Type::ALL.iter().filter(|t| Generation::Gen1.has_type(**t));
        for (i, t) in gen1_types.enumerate() {
            let id = 13 + i as u16;
            let mut s = Species::new(id, format!("T{id}"), *t);
            s.hp = 60;
            dex.insert(s);
        }
        dex
    }

    #[test]
    fn gym_groups_share_one_type_and_gyms_differ() {
        let dex = every_type_dex();
        let mut ctx = PoolContext::new(&dex);
        let mut rng = StdRng::seed_from_u64(21);
        let mut trainers = vec![
            trainer(1, Some("GYM1-LEADER"), &[20, 22]),
            trainer(2, Some("GYM1"), &[18]),
            trainer(3, Some("GYM2-LEADER"), &[30]),
            trainer(4, Some("GIO1"), &[40]),
            trainer(5, Some("GYM8-LEADER"), &[45]),
            trainer(6, Some("IRIVAL"), &[5]),
            trainer(7, None, &[10, 12]),
        ];
        randomise_trainer_pokemon(
            &mut trainers,
            &dex,
            Generation::Gen1,
            &mut ctx,
            &options(TrainersMod::TypeThemedElite4Gyms),
            &mut rng,
        )
        .unwrap();

        // every species here has a single type, which is the theme
        let theme = |t: &Trainer, slot: usize| dex.get(t.pokemon[slot].species).unwrap().primary_type;
        let gym1 = theme(&trainers[0], 0);
        assert_eq!(theme(&trainers[0], 1), gym1);
        assert_eq!(theme(&trainers[1], 0), gym1);
        assert_ne!(theme(&trainers[2], 0), gym1);
        assert_eq!(theme(&trainers[3], 0), theme(&trainers[4], 0));
        assert_ne!(theme(&trainers[4], 0), gym1);

        // the initial rival is never touched
        assert_eq!(trainers[5].pokemon[0].species, 12);
        assert!(!trainers[5].pokemon[0].reset_moves);
        assert!(trainers[6].pokemon.iter().all(|tp| tp.reset_moves));
    }

    #[test]
    fn random_mode_replaces_every_slot_and_keeps_order() {
        let dex = dex();
        let mut ctx = PoolContext::new(&dex);
        let mut rng = StdRng::seed_from_u64(8);
        let mut trainers: Vec<Trainer> = (1..=6).map(|i| trainer(i, None, &[5, 10, 25])).collect();
        randomise_trainer_pokemon(
            &mut trainers,
            &dex,
            Generation::Gen3,
            &mut ctx,
            &options(TrainersMod::Random),
            &mut rng,
        )
        .unwrap();
        for (i, t) in trainers.iter().enumerate() {
            assert_eq!(t.index, i + 1);
            assert_eq!(t.pokemon.len(), 3);
            for tp in &t.pokemon {
                assert!(tp.reset_moves);
                assert!(tp.ability_slot == 1 || tp.ability_slot == 2);
            }
        }
    }

    #[test]
    fn same_seed_same_rosters() {
        let dex = dex();
        let run = |seed: u64| {
            let mut ctx = PoolContext::new(&dex);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut trainers: Vec<Trainer> = (1..=8).map(|i| trainer(i, None, &[10, 20])).collect();
            randomise_trainer_pokemon(
                &mut trainers,
                &dex,
                Generation::Gen2,
                &mut ctx,
                &options(TrainersMod::Distributed),
                &mut rng,
            )
            .unwrap();
            trainers
        };
        assert_eq!(run(99), run(99));
    }

    #[test]
    fn fully_evolve_is_stable_per_trainer() {
        let dex = dex();
        let first = fully_evolve(&dex, 4, 5, 3).unwrap();
        for _ in 0..5 {
            assert_eq!(fully_evolve(&dex, 4, 5, 3).unwrap(), first);
        }
        // index 3 and index 4 land on opposite branches of a two-way split
        assert_ne!(fully_evolve(&dex, 4, 5, 4).unwrap(), first);
    }

    #[test]
    fn forcing_evolves_high_level_entries_only() {
        let dex = dex();
        let mut ctx = PoolContext::new(&dex);
        let mut rng = StdRng::seed_from_u64(1);
        let mut t = trainer(3, None, &[20, 40]);
        t.pokemon[0].species = 1;
        t.pokemon[1].species = 1;
        let mut trainers = vec![t];
        force_fully_evolved(&mut trainers, &dex, &mut ctx, 30, &mut rng).unwrap();
        assert_eq!(trainers[0].pokemon[0].species, 1);
        assert!(!trainers[0].pokemon[0].reset_moves);
        assert_eq!(trainers[0].pokemon[1].species, 3);
        assert!(trainers[0].pokemon[1].reset_moves);
    }

    #[test]
    fn themed_forcing_skips_lines_that_leave_the_theme() {
        let dex = every_type_dex();
        let mut forced = options(TrainersMod::TypeThemed);
        forced.force_fully_evolved = Some(5);
        for seed in 0..20u64 {
            let mut ctx = PoolContext::new(&dex);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut trainers: Vec<Trainer> = (1..=4).map(|i| trainer(i, None, &[10, 10, 10])).collect();
            randomise_trainer_pokemon(&mut trainers, &dex, Generation::Gen1, &mut ctx, &forced, &mut rng)
                .unwrap();
            // grass 10 only ever ends up poison
            for t in &trainers {
                assert!(t.pokemon.iter().all(|tp| tp.species != 10));
            }
        }
    }

    #[test]
    fn ace_prefers_last_slot_by_two_levels() {
        let team = |levels: &[u8]| -> Vec<TrainerPokemon> {
            levels.iter().map(|&l| TrainerPokemon::new(1, l)).collect()
        };
        assert_eq!(ace_position(&team(&[20, 21, 20])), Some(2));
        assert_eq!(ace_position(&team(&[20, 25, 25, 10])), Some(1));
        assert_eq!(ace_position(&team(&[25, 25, 20])), Some(0));
        assert_eq!(ace_position(&team(&[20, 22, 21])), Some(2));
        assert_eq!(ace_position(&team(&[30, 30])), Some(1));
        assert_eq!(ace_position(&team(&[30, 25, 27])), Some(0));
        assert_eq!(ace_position(&[]), None);
    }

    #[test]
    fn rival_evolves_starter_with_level() {
        let dex = dex();
        let mut rng = StdRng::seed_from_u64(2);
        let mut trainers = vec![
            trainer(1, Some("RIVAL1-0"), &[5]),
            trainer(2, Some("RIVAL2-0"), &[12, 14]),
            trainer(3, Some("RIVAL3-0"), &[15, 17]),
            trainer(4, Some("RIVAL4-0"), &[30, 40]),
            trainer(5, Some("RIVAL1-1"), &[5]),
            trainer(6, Some("FRIEND1-0"), &[5]),
        ];
        assert_eq!(highest_battle_number(&trainers, "RIVAL"), 4);
        // starter list: our pick at 0, rival team 0 gets index 1
        let starters = [7, 1, 9];
        rival_carries_starter(&mut trainers, &dex, Generation::Gen1, &starters, "RIVAL", 1, &mut rng)
            .unwrap();
        assert_eq!(trainers[0].pokemon[0].species, 1);
        assert_eq!(trainers[1].pokemon[1].species, 1);
        assert_eq!(trainers[1].pokemon[0].species, 12);
        assert_eq!(trainers[2].pokemon[1].species, 2);
        assert_eq!(trainers[3].pokemon[1].species, 3);
        assert!(trainers[3].pokemon[1].reset_moves);
        // team 1 would carry starter 9, which does not evolve twice
        assert_eq!(trainers[4].pokemon[0].species, 12);
        // friend tags are a separate pass
        assert_eq!(trainers[5].pokemon[0].species, 12);
    }

    #[test]
    fn yellow_rival_follows_fixed_schedule() {
        let dex = dex();
        let mut rng = StdRng::seed_from_u64(6);
        let mut trainers = vec![
            trainer(1, Some("RIVAL2-0"), &[9]),
            trainer(2, Some("RIVAL3-0"), &[40]),
            trainer(3, Some("RIVAL4-2"), &[40]),
            trainer(4, Some("RIVAL6-1"), &[5]),
        ];
        rival_carries_starter(&mut trainers, &dex, Generation::Gen1, &[7, 1], "RIVAL", 1, &mut rng)
            .unwrap();
        assert_eq!(trainers[0].pokemon[0].species, 1);
        assert_eq!(trainers[1].pokemon[0].species, 2);
        assert_eq!(trainers[2].pokemon[0].species, 2);
        assert_eq!(trainers[3].pokemon[0].species, 3);
        assert_eq!(trainers[3].pokemon[0].ability_slot, 0);
    }
}
