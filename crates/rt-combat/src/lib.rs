//! Deterministic, pure combat simulation (spec §4.7). Used as an oracle
//! by the gear planner, the skill-rotation engine's pre-verification
//! step, and event participation — none of those callers touch combat
//! math directly, they all go through `simulate_combat`.
//!
//! Two code paths compute the same per-turn damage formula: a fast
//! path for the common case (neither side carries a status effect)
//! that loops with constant per-turn damage, and an effect path that
//! tracks poison, burn decay, barriers, and the rest turn by turn. They
//! agree exactly when every effect value is zero (see the test at the
//! bottom of this file), so callers never need to pick between them.

use serde::{Deserialize, Serialize};

/// Elemental order used by every per-element sum in this module.
const ELEMENTS: usize = 4; // fire, earth, water, air

/// Either side of a fight: raw per-element attack/defense plus the
/// scalar stats that feed crit EV and initiative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatantStats {
    pub hp: u32,
    pub max_hp: u32,
    pub attack: [i32; ELEMENTS],
    pub dmg_pct: [i32; ELEMENTS],
    pub dmg: i32,
    pub res_pct: [i32; ELEMENTS],
    pub critical_strike: u32,
    pub initiative: i32,
}

/// Monster status effects, all zero meaning "no effect" (spec §4.7
/// effect path enumeration).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonsterEffects {
    pub poison: i32,
    pub healing: i32,
    pub reconstitution_at_turn: Option<u32>,
    pub barrier: i32,
    pub void_drain: i32,
    pub protective_bubble: i32,
    pub corrupted: i32,
    pub berserker_rage: i32,
    pub frenzy: i32,
    pub lifesteal: i32,
}

impl MonsterEffects {
    pub fn is_empty(&self) -> bool {
        *self == MonsterEffects::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Utility {
    /// One-shot heal, triggered the first time HP drops below 50%.
    Restore(u32),
    /// Flat reduction applied to incoming poison damage each turn.
    Antipoison(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Rune {
    Burn(i32),
    Heal(i32),
    Frenzy(i32),
    Lifesteal(i32),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatOptions {
    pub utilities: Vec<Utility>,
    pub rune: Option<Rune>,
}

impl CombatOptions {
    fn restore_amount(&self) -> Option<u32> {
        self.utilities.iter().find_map(|u| match u {
            Utility::Restore(amount) => Some(*amount),
            _ => None,
        })
    }
    fn antipoison(&self) -> i32 {
        self.utilities
            .iter()
            .find_map(|u| match u {
                Utility::Antipoison(v) => Some(*v as i32),
                _ => None,
            })
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatResult {
    pub win: bool,
    pub turns: u32,
    pub remaining_hp: u32,
    pub hp_lost_percent: f64,
}

fn element_damage_total(
    attack: &[i32; ELEMENTS],
    dmg_pct: &[i32; ELEMENTS],
    generic_dmg: i32,
    extra_dmg_pct: f64,
    defender_res: &[i32; ELEMENTS],
    res_reduction: f64,
) -> f64 {
    let mut total = 0.0;
    for i in 0..ELEMENTS {
        let pct = dmg_pct[i] as f64 + generic_dmg as f64 + extra_dmg_pct;
        let base = attack[i] as f64;
        let boosted = base + (base * pct / 100.0).round();
        let res_effective = defender_res[i] as f64 - res_reduction;
        let reduction = (boosted * res_effective / 100.0).round();
        total += (boosted - reduction).max(0.0);
    }
    total
}

fn apply_crit(total: f64, crit_percent: u32) -> f64 {
    let crit_chance = (crit_percent as f64 / 100.0).min(1.0);
    (total * (1.0 + crit_chance * 0.5)).round()
}

/// `true` when the player attacks first this fight (spec §4.7
/// "Initiative"): higher `initiative` goes first; a tie is broken by
/// `max_hp ≥ monster.hp`, and that comparison is itself the
/// false-deterministic fallback when it doesn't hold.
fn player_attacks_first(char_stats: &CombatantStats, monster: &CombatantStats) -> bool {
    use std::cmp::Ordering;
    match char_stats.initiative.cmp(&monster.initiative) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => char_stats.max_hp >= monster.hp,
    }
}

fn hp_lost_percent(max_hp: u32, remaining_hp: f64) -> f64 {
    if max_hp == 0 {
        return 100.0;
    }
    let lost = (max_hp as f64 - remaining_hp.max(0.0)).max(0.0);
    (lost / max_hp as f64 * 100.0).min(100.0)
}

/// Entry point: picks the fast or effect path and runs the fight to a
/// win, a loss, or the 100-turn cap (spec §4.7 "Max 100 turns").
pub fn simulate_combat(
    char_stats: &CombatantStats,
    monster: &CombatantStats,
    effects: &MonsterEffects,
    options: &CombatOptions,
) -> CombatResult {
    if effects.is_empty() && options.rune.is_none() && options.restore_amount().is_none() {
        fast_path(char_stats, monster)
    } else {
        effect_path(char_stats, monster, effects, options)
    }
}

fn fast_path(char_stats: &CombatantStats, monster: &CombatantStats) -> CombatResult {
    let player_dmg = apply_crit(
        element_damage_total(
            &char_stats.attack,
            &char_stats.dmg_pct,
            char_stats.dmg,
            0.0,
            &monster.res_pct,
            0.0,
        ),
        char_stats.critical_strike,
    );
    let monster_dmg = apply_crit(
        element_damage_total(
            &monster.attack,
            &monster.dmg_pct,
            monster.dmg,
            0.0,
            &char_stats.res_pct,
            0.0,
        ),
        monster.critical_strike,
    );

    let player_first = player_attacks_first(char_stats, monster);
    let mut player_hp = char_stats.hp as f64;
    let mut monster_hp = monster.hp as f64;

    for turn in 1..=100u32 {
        let (first_dmg, second_dmg) = if player_first {
            (player_dmg, monster_dmg)
        } else {
            (monster_dmg, player_dmg)
        };
        if player_first {
            monster_hp -= first_dmg;
            if monster_hp <= 0.0 {
                return win_result(char_stats.max_hp, player_hp, turn);
            }
            player_hp -= second_dmg;
            if player_hp <= 0.0 {
                return loss_result(char_stats.max_hp, turn);
            }
        } else {
            player_hp -= first_dmg;
            if player_hp <= 0.0 {
                return loss_result(char_stats.max_hp, turn);
            }
            monster_hp -= second_dmg;
            if monster_hp <= 0.0 {
                return win_result(char_stats.max_hp, player_hp, turn);
            }
        }
    }
    loss_result_remaining(char_stats.max_hp, player_hp, 100)
}

fn effect_path(
    char_stats: &CombatantStats,
    monster: &CombatantStats,
    effects: &MonsterEffects,
    options: &CombatOptions,
) -> CombatResult {
    let player_first = player_attacks_first(char_stats, monster);
    let mut player_hp = char_stats.hp as f64;
    let mut monster_hp = monster.hp as f64;
    let mut corrupted_stacks = 0.0f64;
    let mut burn_value = match options.rune {
        Some(Rune::Burn(v)) => v as f64,
        _ => 0.0,
    };
    let rune_frenzy = match options.rune {
        Some(Rune::Frenzy(v)) => v as f64,
        _ => 0.0,
    };
    let rune_lifesteal = match options.rune {
        Some(Rune::Lifesteal(v)) => v as f64,
        _ => 0.0,
    };
    let rune_heal = match options.rune {
        Some(Rune::Heal(v)) => v as f64,
        _ => 0.0,
    };
    let antipoison = options.antipoison() as f64;
    let restore_amount = options.restore_amount();
    let mut restore_used = false;
    let barrier_bonus = effects.barrier as f64 + effects.protective_bubble as f64 / 4.0;
    let player_crit_chance = (char_stats.critical_strike as f64 / 100.0).min(1.0);
    let monster_crit_chance = (monster.critical_strike as f64 / 100.0).min(1.0);

    for turn in 1..=100u32 {
        if player_first {
            let dmg_to_monster = player_attack_damage(
                char_stats,
                monster,
                barrier_bonus,
                rune_frenzy * player_crit_chance,
            );
            monster_hp -= dmg_to_monster;
            player_hp = (player_hp + dmg_to_monster * player_crit_chance * rune_lifesteal / 100.0)
                .min(char_stats.max_hp as f64);
            player_hp = (player_hp + rune_heal).min(char_stats.max_hp as f64);
            corrupted_stacks += effects.corrupted as f64;
            if monster_hp <= 0.0 {
                return win_result(char_stats.max_hp, player_hp, turn);
            }
        }

        apply_periodic_monster_effects(&mut monster_hp, monster.max_hp, effects, turn);
        let berserker_bonus = if monster_hp < monster.max_hp as f64 * 0.25 {
            effects.berserker_rage as f64
        } else {
            0.0
        };
        let frenzy_bonus = effects.frenzy as f64 * monster_crit_chance;
        let dmg_to_player = monster_attack_damage(
            monster,
            char_stats,
            corrupted_stacks,
            berserker_bonus + frenzy_bonus,
        );
        player_hp -= dmg_to_player;
        monster_hp = (monster_hp
            + dmg_to_player * monster_crit_chance * effects.lifesteal as f64 / 100.0)
            .min(monster.max_hp as f64);
        monster_hp -= burn_value;
        burn_value *= 0.9;
        if monster_hp <= 0.0 {
            return win_result(char_stats.max_hp, player_hp, turn);
        }

        let poison_dmg = (effects.poison as f64 - antipoison).max(0.0);
        player_hp -= poison_dmg;
        if turn % 4 == 0 {
            player_hp -= effects.void_drain as f64;
        }
        if player_hp <= 0.0 {
            return loss_result(char_stats.max_hp, turn);
        }
        if !restore_used {
            if let Some(amount) = restore_amount {
                if player_hp < char_stats.max_hp as f64 * 0.5 {
                    player_hp = (player_hp + amount as f64).min(char_stats.max_hp as f64);
                    restore_used = true;
                }
            }
        }

        if !player_first {
            let dmg_to_monster = player_attack_damage(
                char_stats,
                monster,
                barrier_bonus,
                rune_frenzy * player_crit_chance,
            );
            monster_hp -= dmg_to_monster;
            player_hp = (player_hp + dmg_to_monster * player_crit_chance * rune_lifesteal / 100.0)
                .min(char_stats.max_hp as f64);
            player_hp = (player_hp + rune_heal).min(char_stats.max_hp as f64);
            corrupted_stacks += effects.corrupted as f64;
            if monster_hp <= 0.0 {
                return win_result(char_stats.max_hp, player_hp, turn);
            }
        }
    }
    loss_result_remaining(char_stats.max_hp, player_hp, 100)
}

fn apply_periodic_monster_effects(
    monster_hp: &mut f64,
    monster_max_hp: u32,
    effects: &MonsterEffects,
    turn: u32,
) {
    if turn % 3 == 0 {
        *monster_hp = (*monster_hp + effects.healing as f64).min(monster_max_hp as f64);
    }
    if effects.reconstitution_at_turn == Some(turn) {
        *monster_hp = monster_max_hp as f64;
    }
}

fn player_attack_damage(
    char_stats: &CombatantStats,
    monster: &CombatantStats,
    barrier_bonus: f64,
    extra_dmg_pct: f64,
) -> f64 {
    apply_crit(
        element_damage_total(
            &char_stats.attack,
            &char_stats.dmg_pct,
            char_stats.dmg,
            extra_dmg_pct,
            &monster.res_pct,
            -barrier_bonus,
        ),
        char_stats.critical_strike,
    )
}

fn monster_attack_damage(
    monster: &CombatantStats,
    char_stats: &CombatantStats,
    corrupted_stacks: f64,
    extra_dmg_pct: f64,
) -> f64 {
    apply_crit(
        element_damage_total(
            &monster.attack,
            &monster.dmg_pct,
            monster.dmg,
            extra_dmg_pct,
            &char_stats.res_pct,
            corrupted_stacks,
        ),
        monster.critical_strike,
    )
}

fn win_result(max_hp: u32, remaining_hp: f64, turn: u32) -> CombatResult {
    CombatResult {
        win: true,
        turns: turn,
        remaining_hp: remaining_hp.max(0.0).round() as u32,
        hp_lost_percent: hp_lost_percent(max_hp, remaining_hp),
    }
}

fn loss_result(max_hp: u32, turn: u32) -> CombatResult {
    let _ = max_hp;
    CombatResult {
        win: false,
        turns: turn,
        remaining_hp: 0,
        hp_lost_percent: 100.0,
    }
}

fn loss_result_remaining(max_hp: u32, remaining_hp: f64, turn: u32) -> CombatResult {
    CombatResult {
        win: false,
        turns: turn,
        remaining_hp: remaining_hp.max(0.0).round() as u32,
        hp_lost_percent: hp_lost_percent(max_hp, remaining_hp),
    }
}

/// `result.win && hpLost ≤ 90%` (spec §4.7 helper).
pub fn can_beat_monster(result: &CombatResult) -> bool {
    result.win && result.hp_lost_percent <= 90.0
}

/// Damage the character would take fighting at full HP, plus a 10%
/// crit buffer, or `None` if the fight is unwinnable even at full HP
/// (spec §4.7 helper).
pub fn hp_needed_for_fight(
    char_stats: &CombatantStats,
    monster: &CombatantStats,
    effects: &MonsterEffects,
    options: &CombatOptions,
) -> Option<u32> {
    let at_full_hp = CombatantStats {
        hp: char_stats.max_hp,
        ..*char_stats
    };
    let result = simulate_combat(&at_full_hp, monster, effects, options);
    if !result.win {
        return None;
    }
    let damage_taken = char_stats.max_hp.saturating_sub(result.remaining_hp);
    let crit_buffer = (char_stats.max_hp as f64 * 0.10).ceil() as u32;
    Some(damage_taken + crit_buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(hp: u32, attack: [i32; 4], res: [i32; 4], crit: u32, initiative: i32) -> CombatantStats {
        CombatantStats {
            hp,
            max_hp: hp,
            attack,
            dmg_pct: [0; 4],
            dmg: 0,
            res_pct: res,
            critical_strike: crit,
            initiative,
        }
    }

    #[test]
    fn outcome_is_a_pure_function_of_inputs() {
        let char_stats = stats(100, [20, 0, 0, 0], [0, 0, 0, 0], 0, 10);
        let monster = stats(50, [0, 0, 0, 10], [0, 0, 0, 0], 0, 0);
        let a = simulate_combat(&char_stats, &monster, &MonsterEffects::default(), &CombatOptions::default());
        let b = simulate_combat(&char_stats, &monster, &MonsterEffects::default(), &CombatOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn fast_path_matches_effect_path_when_effects_are_zero() {
        let char_stats = stats(100, [20, 0, 0, 0], [5, 0, 0, 0], 10, 10);
        let monster = stats(50, [0, 0, 0, 10], [0, 0, 0, 0], 5, 0);
        let options = CombatOptions::default();
        let fast = fast_path(&char_stats, &monster);
        let effect = effect_path(&char_stats, &monster, &MonsterEffects::default(), &options);
        assert_eq!(fast, effect);
    }

    #[test]
    fn determinism_example_from_spec() {
        let char_stats = stats(100, [20, 0, 0, 0], [0, 0, 0, 0], 0, 10);
        let monster = stats(50, [0, 0, 0, 10], [0, 0, 0, 0], 0, 0);
        let result = simulate_combat(&char_stats, &monster, &MonsterEffects::default(), &CombatOptions::default());
        // char deals 20/turn (fire), monster deals 10/turn (air); player
        // goes first on higher initiative, so the monster's 50 hp is gone
        // on the third swing before it can land a third hit of its own.
        assert!(result.win);
        assert_eq!(result.turns, 3);
        assert_eq!(result.remaining_hp, 80);
    }

    #[test]
    fn increasing_attacker_hp_never_decreases_remaining_hp() {
        let monster = stats(50, [0, 0, 0, 10], [0, 0, 0, 0], 0, 0);
        let low = stats(60, [20, 0, 0, 0], [0, 0, 0, 0], 0, 10);
        let high = stats(200, [20, 0, 0, 0], [0, 0, 0, 0], 0, 10);
        let r_low = simulate_combat(&low, &monster, &MonsterEffects::default(), &CombatOptions::default());
        let r_high = simulate_combat(&high, &monster, &MonsterEffects::default(), &CombatOptions::default());
        assert!(r_high.remaining_hp >= r_low.remaining_hp);
    }

    #[test]
    fn can_beat_monster_rejects_pyrrhic_wins() {
        let win_clean = CombatResult {
            win: true,
            turns: 3,
            remaining_hp: 50,
            hp_lost_percent: 50.0,
        };
        let win_pyrrhic = CombatResult {
            win: true,
            turns: 3,
            remaining_hp: 5,
            hp_lost_percent: 95.0,
        };
        assert!(can_beat_monster(&win_clean));
        assert!(!can_beat_monster(&win_pyrrhic));
    }

    #[test]
    fn hp_needed_for_fight_is_none_when_unbeatable() {
        let char_stats = stats(100, [1, 0, 0, 0], [0, 0, 0, 0], 0, 0);
        let monster = stats(10000, [0, 0, 0, 1000], [0, 0, 0, 0], 0, 100);
        assert_eq!(
            hp_needed_for_fight(&char_stats, &monster, &MonsterEffects::default(), &CombatOptions::default()),
            None
        );
    }
}
