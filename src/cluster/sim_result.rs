//! Outcome of a forward combat simulation

use serde::Serialize;

use crate::core::config::CombatSimConfig;
use crate::core::types::Tick;
use crate::world::terrain::Choke;

/// Height of our army relative to the enemy's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ElevationEdge {
    #[default]
    Level,
    /// We hold the higher ground
    Higher,
    /// We stand below the enemy
    Lower,
}

/// Army values before and after a simulated engagement
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CombatSimResult {
    pub tick: Tick,
    pub my_unit_count: usize,
    pub enemy_unit_count: usize,
    pub initial_mine: i32,
    pub initial_enemy: i32,
    pub final_mine: i32,
    pub final_enemy: i32,
    pub enemy_has_undetected_units: bool,
    /// Narrow choke the engagement happens across
    #[serde(skip)]
    pub narrow_choke: Option<Choke>,
    pub elevation: ElevationEdge,
}

impl CombatSimResult {
    /// Result of a simulation with nothing on one side
    pub fn empty(tick: Tick) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    pub fn my_percent_lost(&self) -> f64 {
        percent_lost(self.initial_mine, self.final_mine)
    }

    pub fn enemy_percent_lost(&self) -> f64 {
        percent_lost(self.initial_enemy, self.final_enemy)
    }

    /// Enemy value destroyed minus own value lost
    pub fn value_gain(&self) -> i32 {
        (self.initial_enemy - self.final_enemy) - (self.initial_mine - self.final_mine)
    }

    pub fn percent_gain(&self) -> f64 {
        self.enemy_percent_lost() - self.my_percent_lost()
    }

    /// Discount enemy losses when attacking through a narrow choke
    pub fn adjust_for_choke(&self, attacking: bool, config: &CombatSimConfig) -> Self {
        let mut adjusted = self.clone();
        if attacking && self.narrow_choke.is_some() {
            adjusted.final_enemy =
                adjusted_loss(self.initial_enemy, self.final_enemy, config.choke_attack_factor);
        }
        adjusted
    }

    /// Discount losses for whichever side fights uphill
    pub fn adjust_for_elevation(&self, config: &CombatSimConfig) -> Self {
        let mut adjusted = self.clone();
        match self.elevation {
            ElevationEdge::Higher => {
                adjusted.final_mine =
                    adjusted_loss(self.initial_mine, self.final_mine, config.high_ground_loss_factor);
            }
            ElevationEdge::Lower => {
                adjusted.final_enemy = adjusted_loss(
                    self.initial_enemy,
                    self.final_enemy,
                    config.low_ground_damage_factor,
                );
            }
            ElevationEdge::Level => {}
        }
        adjusted
    }
}

fn percent_lost(initial: i32, remaining: i32) -> f64 {
    if initial <= 0 {
        0.0
    } else {
        1.0 - remaining as f64 / initial as f64
    }
}

/// Scale the loss `initial - final` by `factor`, never exceeding `initial`
fn adjusted_loss(initial: i32, remaining: i32, factor: f32) -> i32 {
    let loss = (initial - remaining) as f64 * factor as f64;
    (initial - loss.round() as i32).min(initial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ChokeId;
    use glam::Vec2;

    fn result(initial_mine: i32, final_mine: i32, initial_enemy: i32, final_enemy: i32) -> CombatSimResult {
        CombatSimResult {
            initial_mine,
            final_mine,
            initial_enemy,
            final_enemy,
            my_unit_count: 1,
            enemy_unit_count: 1,
            ..CombatSimResult::default()
        }
    }

    fn choke() -> Choke {
        Choke {
            id: ChokeId(1),
            center: Vec2::ZERO,
            end1: Vec2::new(0.0, -40.0),
            end2: Vec2::new(0.0, 40.0),
            width: 64.0,
            narrow: true,
        }
    }

    #[test]
    fn test_derived_metrics() {
        let r = result(1000, 800, 500, 100);
        assert!((r.my_percent_lost() - 0.2).abs() < 1e-9);
        assert!((r.enemy_percent_lost() - 0.8).abs() < 1e-9);
        assert_eq!(r.value_gain(), 200);
        assert!((r.percent_gain() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_empty_result_is_neutral() {
        let r = CombatSimResult::empty(7);
        assert_eq!(r.tick, 7);
        assert_eq!(r.my_percent_lost(), 0.0);
        assert_eq!(r.enemy_percent_lost(), 0.0);
        assert_eq!(r.value_gain(), 0);
    }

    #[test]
    fn test_choke_adjustment_only_when_attacking_through_choke() {
        let config = CombatSimConfig::default();
        let mut r = result(1000, 800, 500, 100);
        assert_eq!(r.adjust_for_choke(true, &config), r);

        r.narrow_choke = Some(choke());
        assert_eq!(r.adjust_for_choke(false, &config), r);
        let adjusted = r.adjust_for_choke(true, &config);
        // 400 enemy loss scaled by 0.8 = 320
        assert_eq!(adjusted.final_enemy, 180);
        assert_eq!(adjusted.final_mine, 800);
    }

    #[test]
    fn test_elevation_adjustment() {
        let config = CombatSimConfig::default();
        let mut r = result(1000, 600, 500, 100);
        r.elevation = ElevationEdge::Higher;
        assert_eq!(r.adjust_for_elevation(&config).final_mine, 700);
        r.elevation = ElevationEdge::Lower;
        let adjusted = r.adjust_for_elevation(&config);
        assert_eq!(adjusted.final_enemy, 200);
        assert_eq!(adjusted.final_mine, 600);
    }

    #[test]
    fn test_adjusted_loss_never_exceeds_initial() {
        assert_eq!(adjusted_loss(100, 120, 0.5), 100);
        assert_eq!(adjusted_loss(100, 0, 1.0), 0);
    }
}
