use std::collections::BTreeSet;

use rand::{rngs::StdRng, SeedableRng};

use crate::encounters::{randomise_encounters, EncounterOptions};
use crate::evolution::condense_level_evolutions;
use crate::handler::RomHandler;
use crate::model::{EncounterSet, EvolutionUpdate, Pokedex, StaticEncounter, Trainer};
use crate::rom::Rom;
use crate::selector::PoolContext;
use crate::settings::{MiscTweak, Settings, StaticPokemonMod, TrainersMod, WildPokemonMod};
use crate::statics::{pick_intro_species, pick_starters, randomise_static_pokemon};
use crate::trainers::{force_fully_evolved, randomise_trainer_pokemon, rival_carries_starter, TrainerOptions};
use crate::Result;

const EASIER_MAX_LEVEL: u16 = 40;
const EASIER_MAX_INTERMEDIATE: u16 = 30;

/// A finished image plus what went into it.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub image: Vec<u8>,
    pub check_value: u32,
    pub log: String,
}

/// Folds one value into the running check value.
pub fn add_to_cv(cv: u32, value: u32) -> u32 {
    cv.rotate_left(3) ^ value
}

fn species_cv(cv: u32, dex: &Pokedex) -> u32 {
    dex.iter().fold(cv, |cv, s| {
        let stats = [s.hp, s.attack, s.defense, s.speed, s.sp_atk, s.sp_def];
        let cv = stats.iter().fold(cv, |cv, &v| add_to_cv(cv, u32::from(v)));
        s.abilities.iter().fold(cv, |cv, &a| add_to_cv(cv, u32::from(a)))
    })
}

fn trainers_cv(cv: u32, trainers: &[Trainer]) -> u32 {
    trainers
        .iter()
        .flat_map(|t| t.pokemon.iter())
        .fold(cv, |cv, tp| add_to_cv(add_to_cv(cv, u32::from(tp.level)), u32::from(tp.species)))
}

fn encounters_cv(cv: u32, sets: &[EncounterSet]) -> u32 {
    sets.iter()
        .flat_map(|s| s.encounters.iter())
        .fold(cv, |cv, e| add_to_cv(add_to_cv(cv, u32::from(e.level)), u32::from(e.species)))
}

fn log_evolution_updates(log: &mut String, title: &str, dex: &Pokedex, updates: &BTreeSet<EvolutionUpdate>) {
    if updates.is_empty() {
        return;
    }
    log.push_str(&format!("--{title}--\n"));
    for u in updates {
        let how = if u.condensed {
            format!("now at level {}", u.extra)
        } else {
            format!("now by {:?} ({})", u.method, u.extra)
        };
        log.push_str(&format!("{} -> {}: {how}\n", dex.name(u.from), dex.name(u.to)));
    }
    log.push('\n');
}

fn log_trainers(log: &mut String, dex: &Pokedex, trainers: &[Trainer]) {
    log.push_str("--Trainers--\n");
    for t in trainers {
        let name = if t.name.is_empty() { "?" } else { t.name.as_str() };
        log.push_str(&format!("#{} {name}", t.index));
        if let Some(tag) = &t.tag {
            log.push_str(&format!(" [{tag}]"));
        }
        log.push_str(" -");
        for tp in &t.pokemon {
            log.push_str(&format!(" {} Lv{}", dex.name(tp.species), tp.level));
        }
        log.push('\n');
    }
    log.push('\n');
}

fn log_statics(log: &mut String, dex: &Pokedex, old: &[StaticEncounter], new: &[StaticEncounter]) {
    log.push_str("--Static Pokemon--\n");
    for (before, after) in old.iter().zip(new) {
        log.push_str(&format!(
            "{} => {} (Lv{})\n",
            dex.name(before.species),
            dex.name(after.species),
            after.level
        ));
    }
    log.push('\n');
}

fn log_encounters(log: &mut String, dex: &Pokedex, sets: &[EncounterSet]) {
    log.push_str("--Wild Pokemon--\n");
    for set in sets {
        log.push_str(&format!("{} (rate {}):", set.name, set.rate));
        for e in &set.encounters {
            if e.max_level > 0 {
                log.push_str(&format!(" {} Lv{}-{}", dex.name(e.species), e.level, e.max_level));
            } else {
                log.push_str(&format!(" {} Lv{}", dex.name(e.species), e.level));
            }
        }
        log.push('\n');
    }
    log.push('\n');
}

/// Runs every enabled pass over `handler` in a fixed order, drawing all
/// randomness from one generator seeded with `seed`, and returns the
/// saved image with the check value written in.
pub fn randomise(
    handler: &mut dyn RomHandler,
    settings: &Settings,
    token: &str,
    seed: u64,
) -> Result<Outcome> {
    let mut rng = StdRng::seed_from_u64(seed);
    let generation = handler.generation();
    handler.pokedex().validate_acyclic()?;

    let mut log = format!("Randomiser seed: {seed}\n");
    log.push_str(&format!("Settings: {token}\n"));
    log.push_str(&format!(
        "ROM: {} (CRC32 {:08X})\n\n",
        handler.rom_name(),
        handler.rom().crc32()
    ));

    let mut ctx = PoolContext::new(handler.pokedex());

    for tweak in MiscTweak::selected(handler.misc_tweaks_available(), settings.current_misc_tweaks) {
        handler.apply_misc_tweak(tweak)?;
        log::info!("applied misc tweak {tweak:?}");
        log.push_str(&format!("Misc tweak: {tweak:?}\n"));
    }

    let mut cv = species_cv(0, handler.pokedex());

    if settings.change_impossible_evolutions {
        let updates = handler.remove_impossible_evolutions();
        log_evolution_updates(&mut log, "Removed Impossible Evolutions", handler.pokedex(), &updates);
    }
    if settings.make_evolutions_easier {
        let updates =
            condense_level_evolutions(handler.pokedex_mut(), EASIER_MAX_LEVEL, EASIER_MAX_INTERMEDIATE);
        if !handler.patch_friendship_threshold()? {
            log::debug!("no friendship routine to patch");
        }
        log_evolution_updates(&mut log, "Condensed Level Evolutions", handler.pokedex(), &updates);
    }
    if settings.remove_time_based_evolutions {
        let updates = handler.remove_time_based_evolutions();
        log_evolution_updates(&mut log, "Removed Time-Based Evolutions", handler.pokedex(), &updates);
    }

    let dex = handler.pokedex().clone();

    if let Some(starters) =
        pick_starters(settings.starters_mod, &dex, &ctx, handler.starter_count(), &mut rng)?
    {
        handler.set_starters(&starters)?;
        let names: Vec<String> = starters.iter().map(|&id| dex.name(id)).collect();
        log.push_str(&format!("--Starters--\n{}\n\n", names.join(", ")));
    }

    if settings.trainers_mod != TrainersMod::Unchanged {
        let options = TrainerOptions::from_settings(settings);
        let mut trainers = handler.trainers()?;
        randomise_trainer_pokemon(&mut trainers, &dex, generation, &mut ctx, &options, &mut rng)?;
        if settings.rival_carries_starter_through_out {
            let starters = handler.starters()?;
            rival_carries_starter(&mut trainers, &dex, generation, &starters, "RIVAL", 1, &mut rng)?;
            rival_carries_starter(&mut trainers, &dex, generation, &starters, "FRIEND", 2, &mut rng)?;
        }
        if let Some(level) = options.force_fully_evolved {
            force_fully_evolved(&mut trainers, &dex, &mut ctx, level, &mut rng)?;
        }
        handler.set_trainers(&trainers)?;
        log_trainers(&mut log, &dex, &trainers);
    }
    cv = trainers_cv(cv, &handler.trainers()?);

    if handler.can_change_static_pokemon() && settings.static_pokemon_mod != StaticPokemonMod::Unchanged {
        let old = handler.static_pokemon()?;
        let mut statics = old.clone();
        randomise_static_pokemon(
            &mut statics,
            &dex,
            &ctx,
            settings.static_pokemon_mod,
            settings.limit_main_game_legendaries,
            &mut rng,
        )?;
        handler.set_static_pokemon(&statics)?;
        cv = statics.iter().fold(cv, |cv, s| add_to_cv(cv, u32::from(s.species)));
        log_statics(&mut log, &dex, &old, &statics);
    }

    let use_time_based = settings.use_time_based_encounters;
    if settings.wild_pokemon_mod != WildPokemonMod::Unchanged {
        let mut sets = handler.encounters(use_time_based)?;
        let options = EncounterOptions::from_settings(settings);
        randomise_encounters(&mut sets, &dex, generation, &mut ctx, &options, &mut rng)?;
        handler.set_encounters(use_time_based, &sets)?;
        log_encounters(&mut log, &dex, &sets);
    }
    cv = encounters_cv(cv, &handler.encounters(use_time_based)?);

    let intro = pick_intro_species(&ctx, |id| handler.intro_allowed(id), &mut rng)?;
    handler.set_intro_species(intro)?;
    log::debug!("intro species {}", dex.name(intro));

    let mut rom = Rom::new(handler.save()?);
    if let Some(at) = handler.check_value_offset() {
        rom.write_u32_be(at, cv)?;
    }
    log.push_str(&format!("Check value: {cv:08X}\n"));
    log::info!("randomisation finished, check value {cv:08X}");

    Ok(Outcome {
        image: rom.into_bytes(),
        check_value: cv,
        log,
    })
}
