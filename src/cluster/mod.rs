//! Clusters: spatially coherent fighting groups within a squad
//!
//! A cluster owns its members' geometry and tactical state. Per tick it
//! picks targets, simulates the fight, and then attacks, advances, or
//! regroups.

pub mod cluster;
pub mod combat_sim;
pub mod engage;
pub mod formation;
pub mod regroup;
pub mod sim_result;
pub mod steering;
pub mod targeting;

pub use cluster::{Activity, Cluster, SubActivity, Verdict, VerdictHistory};
pub use combat_sim::simulate_engagement;
pub use formation::{form_arc, plan_arc};
pub use regroup::Engagement;
pub use sim_result::{CombatSimResult, ElevationEdge};
pub use targeting::{select_targets, PriorityTable, TargetSelector, TargetingStyle};
