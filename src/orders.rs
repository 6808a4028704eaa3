//! Movement and attack intents emitted by squads
//!
//! The engine never issues game commands itself; it fills a
//! [`CommandBuffer`] that the caller forwards to the game each tick.

use glam::Vec2;
use serde::Serialize;

use crate::core::types::UnitId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Action {
    Move { x: f32, y: f32 },
    Attack(UnitId),
    /// Break a unit free from a stuck state
    Unstick,
}

impl Action {
    pub fn move_to(pos: Vec2) -> Self {
        Action::Move { x: pos.x, y: pos.y }
    }

    pub fn destination(&self) -> Option<Vec2> {
        match self {
            Action::Move { x, y } => Some(Vec2::new(*x, *y)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnitCommand {
    pub unit: UnitId,
    pub action: Action,
}

/// Intents collected during one tick, one per unit at most
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandBuffer {
    commands: Vec<UnitCommand>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an intent, replacing any earlier intent for the same unit
    pub fn issue(&mut self, unit: UnitId, action: Action) {
        if let Some(existing) = self.commands.iter_mut().find(|c| c.unit == unit) {
            existing.action = action;
        } else {
            self.commands.push(UnitCommand { unit, action });
        }
    }

    pub fn move_unit(&mut self, unit: UnitId, pos: Vec2) {
        self.issue(unit, Action::move_to(pos));
    }

    pub fn attack(&mut self, unit: UnitId, target: UnitId) {
        self.issue(unit, Action::Attack(target));
    }

    pub fn unstick(&mut self, unit: UnitId) {
        self.issue(unit, Action::Unstick);
    }

    pub fn for_unit(&self, unit: UnitId) -> Option<Action> {
        self.commands.iter().find(|c| c.unit == unit).map(|c| c.action)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitCommand> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}
