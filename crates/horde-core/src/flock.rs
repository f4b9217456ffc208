//! Group formation: BFS component detection over the neighbor graph,
//! deterministic leader election, and the cooldown-gated explore→attack
//! promotion.
//!
//! There is no shared group object. Each agent's manager caches only its
//! last-known leader and cooldown start; consensus emerges because every
//! member runs the same deterministic algorithm over the same neighbor
//! snapshot. The neighbor relation is followed along *outgoing* edges and is
//! not guaranteed symmetric when sensing radii differ.

use crate::world::Roster;
use crate::{AgentId, AgentState, HordeConfig};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Per-agent grouping state. Small and copyable: the world lifts it out of
/// the roster row, runs the update, and writes it back.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupManager {
    /// Last elected leader this agent knows about.
    pub leader: Option<AgentId>,
    /// Simulation time when the current promotion cooldown started.
    pub cooldown_start: Option<f64>,
}

/// Counters reported back to the tick pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct GroupEvents {
    pub promotions: usize,
    pub leader_changes: usize,
}

/// Run one agent's group-manager update against the roster.
///
/// Explorers detect their connected component, elect a provisional leader
/// once it reaches `min_group_size`, and promote the whole component to
/// attack after the cooldown holds. Attackers only react to losing their
/// leader (or never having cached one) by re-electing from the
/// attack-restricted component.
pub(crate) fn update(
    roster: &mut Roster,
    idx: usize,
    config: &HordeConfig,
    now: f64,
) -> GroupEvents {
    let mut events = GroupEvents::default();
    let self_id = roster.handle_at(idx);
    let state = roster.row(idx).state;
    let mut manager = roster.row(idx).group;

    match state {
        AgentState::Dead => {}
        AgentState::Attack => {
            let leader_gone = match manager.leader {
                Some(leader) => roster
                    .get(leader)
                    .is_none_or(|agent| agent.state == AgentState::Dead),
                None => true,
            };
            if leader_gone {
                let component = component_from(roster, self_id, AgentState::Attack);
                if elect_leader(roster, &mut manager, &component) {
                    events.leader_changes += 1;
                }
            }
        }
        AgentState::Explore => {
            let component = component_from(roster, self_id, AgentState::Explore);
            if component.len() < config.min_group_size {
                // Cluster dispersed below the threshold: abandon the countdown.
                manager.cooldown_start = None;
            } else {
                let leader_gone = manager.leader.is_none_or(|leader| {
                    roster
                        .get(leader)
                        .is_none_or(|agent| agent.state == AgentState::Dead)
                });
                if leader_gone && elect_leader(roster, &mut manager, &component) {
                    events.leader_changes += 1;
                }

                match manager.cooldown_start {
                    None => manager.cooldown_start = Some(now),
                    Some(start) if now - start >= config.attack_cooldown => {
                        // Re-verify the component before committing.
                        let component = component_from(roster, self_id, AgentState::Explore);
                        if component.len() >= config.min_group_size {
                            if elect_leader(roster, &mut manager, &component) {
                                events.leader_changes += 1;
                            }
                            if let Some(leader_id) = manager.leader {
                                if let Some(leader_serial) =
                                    roster.get(leader_id).map(|agent| agent.serial)
                                {
                                    for &member in &component {
                                        let Some(agent) = roster.get_mut(member) else {
                                            continue;
                                        };
                                        if agent.state == AgentState::Dead {
                                            continue;
                                        }
                                        agent.state = AgentState::Attack;
                                        agent.attack_group_id = Some(leader_serial);
                                        agent.is_group_leader = member == leader_id;
                                    }
                                    events.promotions += component.len();
                                    debug!(
                                        group_size = component.len(),
                                        leader_serial, "cluster promoted to attack"
                                    );
                                }
                            }
                            manager.cooldown_start = None;
                        }
                    }
                    Some(_) => {}
                }
            }
        }
    }

    roster.row_mut(idx).group = manager;
    events
}

/// Connected component reachable from `start` by following each visited
/// agent's own cached neighbor list, restricted to agents in `restrict`.
/// The start agent is always a member. Stale handles are skipped.
fn component_from(roster: &Roster, start: AgentId, restrict: AgentState) -> Vec<AgentId> {
    let mut visited: HashSet<AgentId> = HashSet::new();
    let mut queue: VecDeque<AgentId> = VecDeque::new();
    let mut members = Vec::new();

    visited.insert(start);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        members.push(current);
        let Some(agent) = roster.get(current) else {
            continue;
        };
        for &neighbor in &agent.neighbors {
            if visited.contains(&neighbor) {
                continue;
            }
            let Some(other) = roster.get(neighbor) else {
                continue;
            };
            if other.state == restrict {
                visited.insert(neighbor);
                queue.push_back(neighbor);
            }
        }
    }

    members
}

/// Elect the alive member with the smallest creation serial and stamp the
/// component's flags: leader bit (only meaningful in attack state), cohort
/// id for attackers, and a cleared follow offset for every non-leader.
/// Returns true when the cached leader actually changed.
fn elect_leader(roster: &mut Roster, manager: &mut GroupManager, component: &[AgentId]) -> bool {
    let mut best: Option<(u64, AgentId)> = None;
    for &member in component {
        let Some(agent) = roster.get(member) else {
            continue;
        };
        if agent.state == AgentState::Dead {
            continue;
        }
        best = match best {
            Some(current) if current.0 <= agent.serial => Some(current),
            _ => Some((agent.serial, member)),
        };
    }

    let Some((leader_serial, leader_id)) = best else {
        manager.leader = None;
        return false;
    };
    let changed = manager.leader != Some(leader_id);
    manager.leader = Some(leader_id);

    for &member in component {
        let Some(agent) = roster.get_mut(member) else {
            continue;
        };
        if agent.state == AgentState::Dead {
            continue;
        }
        let leads = member == leader_id;
        agent.is_group_leader = leads && agent.state == AgentState::Attack;
        agent.attack_group_id = if agent.state == AgentState::Attack {
            Some(leader_serial)
        } else {
            None
        };
        if !leads {
            agent.attack_offset = None;
        }
    }

    if changed {
        debug!(leader_serial, "group leader elected");
    }
    changed
}
