//! Attack / withdraw decisions from combat-sim verdicts
//!
//! Starting an attack needs one favourable sim. Once attacking, a cluster
//! keeps going through noisy verdicts and only aborts on a stable run of
//! unfavourable ones. Leaving a regroup needs an even longer favourable run
//! and no recent reinforcements still catching up.

use tracing::debug;

use crate::cluster::cluster::{Activity, Cluster};
use crate::cluster::sim_result::CombatSimResult;
use crate::core::config::EngageConfig;

/// Whether a sim result justifies fighting at the given aggression
///
/// Away from chokes, armies are bolder near home and more careful near the
/// enemy; across a narrow choke they are careful at either end.
pub fn should_attack(result: &CombatSimResult, progress: f32, aggression: f64, config: &EngageConfig) -> bool {
    let progress = progress as f64;
    let distance_factor = if result.narrow_choke.is_none() {
        1.2 - 0.4 * progress
    } else if !(0.3..=0.7).contains(&progress) {
        0.8
    } else {
        1.0
    };

    let my_lost = result.my_percent_lost();
    if my_lost <= config.negligible_loss {
        return true;
    }
    if result.enemy_has_undetected_units && my_lost <= config.undetected_loss_tolerance {
        return true;
    }
    if result.percent_gain() > config.attack_gain_threshold / (aggression * distance_factor) {
        return true;
    }
    let total = (result.initial_mine + result.initial_enemy) as f64;
    let my_share = if total > 0.0 { result.initial_mine as f64 / total } else { 0.0 };
    aggression > 0.99
        && result.value_gain() > (result.initial_mine - result.final_mine) / 2
        && (result.percent_gain() > -0.05 || my_share > 0.9)
}

pub fn should_start_attack(cluster: &mut Cluster, result: &CombatSimResult, config: &EngageConfig) -> bool {
    let attack = should_attack(result, cluster.progress(), 1.0, config);
    cluster.sim_history.push(result.clone(), attack);
    attack
}

pub fn should_continue_attack(cluster: &mut Cluster, result: &CombatSimResult, config: &EngageConfig) -> bool {
    let attack = should_attack(result, cluster.progress(), config.continue_aggression, config);
    cluster.sim_history.push(result.clone(), attack);
    if attack {
        return true;
    }

    // First verdict of this fight: nothing to smooth over yet
    let Some(previous) = cluster.sim_history.previous() else {
        return false;
    };
    if result.initial_enemy as f64 > previous.result.initial_enemy as f64 * config.enemy_growth_abort {
        debug!(cluster = %cluster.id, "enemy strength grew, aborting attack");
        return false;
    }
    if result.narrow_choke.is_some() && previous.result.narrow_choke.is_none() {
        debug!(cluster = %cluster.id, "fight moved across a choke, aborting attack");
        return false;
    }

    let (retreat_streak, attacks, retreats) = cluster.sim_history.streak(config.retreat_window);
    retreat_streak < config.retreat_streak || attacks > retreats
}

/// Aggression while regrouping, reduced across narrow or long chokes
pub fn regroup_aggression(result: &CombatSimResult, config: &EngageConfig) -> f64 {
    let mut aggression = config.regroup_aggression;
    if let Some(choke) = &result.narrow_choke {
        aggression -= (0.2 * ((128.0 - choke.width as f64) / 80.0).min(1.0)).max(0.0);
        aggression -= (0.35 * (choke.length() as f64 / 128.0).min(1.0)).max(0.0);
    }
    aggression
}

pub fn should_stop_regrouping(cluster: &mut Cluster, result: &CombatSimResult, config: &EngageConfig) -> bool {
    let aggression = regroup_aggression(result, config);
    let attack = should_attack(result, cluster.progress(), aggression, config);
    cluster.sim_history.push(result.clone(), attack);
    if !attack {
        return false;
    }

    let (attack_streak, attacks, retreats) = cluster.sim_history.streak(config.regroup_window);
    if attack_streak < config.regroup_streak || retreats > attacks {
        return false;
    }
    // Give reinforcements time to link up before re-engaging
    let reinforced = cluster
        .sim_history
        .recent(config.reinforcement_window)
        .any(|v| result.my_unit_count > v.result.my_unit_count);
    !reinforced
}

/// Decide whether to fight this tick given the cluster's current activity
pub fn decide(cluster: &mut Cluster, result: &CombatSimResult, config: &EngageConfig) -> bool {
    let attack = match cluster.activity() {
        Activity::Default => should_start_attack(cluster, result, config),
        Activity::Attacking => should_continue_attack(cluster, result, config),
        Activity::Regrouping => should_stop_regrouping(cluster, result, config),
    };
    debug!(
        cluster = %cluster.id,
        activity = cluster.activity_name(),
        lost = result.my_percent_lost(),
        gain = result.percent_gain(),
        value = result.value_gain(),
        attack,
        "engage verdict"
    );
    attack
}
