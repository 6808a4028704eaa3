//! Owned collection of the squads active in one match

use tracing::{info, warn};

use crate::core::error::{Result, TacticsError};
use crate::core::types::{SquadId, UnitId};
use crate::orders::CommandBuffer;
use crate::squad::squad::Squad;
use crate::world::context::TickContext;

/// Squads ticked once per frame
///
/// Call [`initialize`](Self::initialize) when a match starts and
/// [`teardown`](Self::teardown) when it ends. Squads are updated in
/// registration order.
#[derive(Debug, Default)]
pub struct SquadRegistry {
    squads: Vec<Squad>,
    active: bool,
}

impl SquadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a match with no squads
    pub fn initialize(&mut self) {
        self.squads.clear();
        self.active = true;
        info!("squad registry initialized");
    }

    /// End the match, dropping every squad
    pub fn teardown(&mut self) {
        let dropped = self.squads.len();
        self.squads.clear();
        self.active = false;
        info!(dropped, "squad registry torn down");
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn add(&mut self, squad: Squad) -> SquadId {
        let id = squad.id;
        info!(squad = %squad.label(), id = %id, policy = squad.policy_name(), "squad registered");
        self.squads.push(squad);
        id
    }

    pub fn remove(&mut self, id: SquadId) -> Result<Squad> {
        let index = self
            .squads
            .iter()
            .position(|s| s.id == id)
            .ok_or(TacticsError::UnknownSquad(id))?;
        let squad = self.squads.remove(index);
        info!(squad = %squad.label(), id = %id, "squad removed");
        Ok(squad)
    }

    pub fn get(&self, id: SquadId) -> Option<&Squad> {
        self.squads.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: SquadId) -> Option<&mut Squad> {
        self.squads.iter_mut().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Squad> {
        self.squads.iter()
    }

    pub fn len(&self) -> usize {
        self.squads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.squads.is_empty()
    }

    /// Squad currently tracking `unit`
    pub fn squad_of(&self, unit: UnitId) -> Option<SquadId> {
        self.squads.iter().find(|s| s.contains(unit)).map(|s| s.id)
    }

    /// Move `unit` into squad `to`, taking it from whichever squad holds it
    ///
    /// Returns false when the unit's current squad keeps it to protect a
    /// small fighting vanguard.
    pub fn assign(&mut self, ctx: &TickContext, to: SquadId, unit: UnitId) -> Result<bool> {
        if !self.squads.iter().any(|s| s.id == to) {
            return Err(TacticsError::UnknownSquad(to));
        }
        if !ctx.exists(unit) {
            warn!(unit = %unit, "cannot assign unknown unit");
            return Err(TacticsError::UnknownUnit(unit));
        }
        match self.squad_of(unit) {
            Some(from) if from == to => return Ok(true),
            Some(from) => {
                let Some(current) = self.get_mut(from) else {
                    return Err(TacticsError::UnknownSquad(from));
                };
                if !current.can_reassign_from_vanguard_cluster(unit) {
                    return Ok(false);
                }
                current.remove_unit(ctx, unit);
            }
            None => {}
        }
        match self.get_mut(to) {
            Some(squad) => squad.add_unit(ctx, unit).map(|_| true),
            None => Err(TacticsError::UnknownSquad(to)),
        }
    }

    /// Update and execute every squad, collecting their intents
    pub fn update(&mut self, ctx: &TickContext) -> CommandBuffer {
        let mut commands = CommandBuffer::new();
        if !self.active {
            warn!(tick = ctx.tick, "squad registry updated before initialize");
        }
        for squad in &mut self.squads {
            squad.update_clusters(ctx);
            squad.execute(ctx, &mut commands);
        }
        commands
    }
}
