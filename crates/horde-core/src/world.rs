//! The world container: agent roster, staged tick pipeline, and the
//! external mutation surface (spawn, kill, remove).

use crate::agent::{Agent, AgentSnapshot};
use crate::arena::{ArenaMap, PlayerView};
use crate::behavior::{
    self, BehaviorContext,
};
use crate::steering::{Mover, SteeringParams};
use crate::{
    collision, flock, AgentId, AgentState, HordeConfig, HordeStateError, Tick, TickEvents,
    TickSummary,
};
use glam::Vec2;
use horde_index::{BruteForceIndex, NeighborhoodIndex};
use rand::{Rng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, trace};

/// Dense agent storage behind generational handles.
///
/// Rows live in a dense vector for cache-friendly per-tick iteration; the
/// slot map resolves handles to dense indices and keeps removed handles from
/// ever resolving again.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Roster {
    slots: SlotMap<AgentId, usize>,
    handles: Vec<AgentId>,
    rows: Vec<Agent>,
}

impl Roster {
    /// Create an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored agents, dead ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when no agents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns true if `id` refers to a stored agent.
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.slots.contains_key(id)
    }

    /// Dense index for `id`, if present.
    #[must_use]
    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.slots.get(id).copied()
    }

    /// Handle of the agent stored at dense index `idx`.
    #[must_use]
    pub fn handle_at(&self, idx: usize) -> AgentId {
        self.handles[idx]
    }

    /// Borrow an agent by handle.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.index_of(id).map(|idx| &self.rows[idx])
    }

    /// Mutably borrow an agent by handle.
    #[must_use]
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        let idx = self.index_of(id)?;
        Some(&mut self.rows[idx])
    }

    /// Borrow the agent at dense index `idx`.
    #[must_use]
    pub fn row(&self, idx: usize) -> &Agent {
        &self.rows[idx]
    }

    /// Mutably borrow the agent at dense index `idx`.
    pub fn row_mut(&mut self, idx: usize) -> &mut Agent {
        &mut self.rows[idx]
    }

    /// All rows in dense iteration order.
    #[must_use]
    pub fn rows(&self) -> &[Agent] {
        &self.rows
    }

    /// Iterate over `(handle, agent)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.handles.iter().copied().zip(self.rows.iter())
    }

    /// Insert an agent and return its handle.
    pub fn insert(&mut self, agent: Agent) -> AgentId {
        let index = self.rows.len();
        self.rows.push(agent);
        let id = self.slots.insert(index);
        self.handles.push(id);
        id
    }

    /// Remove `id`, returning the agent if it was present. Swap-removes the
    /// dense row and patches the moved agent's slot.
    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        let index = self.slots.remove(id)?;
        let removed = self.rows.swap_remove(index);
        let removed_handle = self.handles.swap_remove(index);
        debug_assert_eq!(removed_handle, id);
        if index < self.handles.len() {
            let moved = self.handles[index];
            if let Some(slot) = self.slots.get_mut(moved) {
                *slot = index;
            }
        }
        Some(removed)
    }
}

/// The horde simulation: call [`HordeState::step`] once per frame with the
/// current map and player snapshot.
pub struct HordeState {
    config: HordeConfig,
    tick: Tick,
    clock: f64,
    rng: SmallRng,
    roster: Roster,
    index: BruteForceIndex,
    next_serial: u64,
    history: VecDeque<TickSummary>,
}

impl fmt::Debug for HordeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HordeState")
            .field("tick", &self.tick)
            .field("clock", &self.clock)
            .field("agent_count", &self.roster.len())
            .finish()
    }
}

impl HordeState {
    /// Instantiate a world from a validated configuration.
    pub fn new(config: HordeConfig) -> Result<Self, HordeStateError> {
        config.validate()?;
        let rng = config.seeded_rng();
        let history_capacity = config.history_capacity;
        Ok(Self {
            config,
            tick: Tick::zero(),
            clock: 0.0,
            rng,
            roster: Roster::new(),
            index: BruteForceIndex::new(),
            next_serial: 0,
            history: VecDeque::with_capacity(history_capacity),
        })
    }

    /// Advance the simulation by one tick of `dt` seconds.
    pub fn step(&mut self, dt: f32, map: &ArenaMap, player: Option<&PlayerView>) -> TickEvents {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.clock += f64::from(dt);

        self.stage_neighbors();
        let (promotions, leader_changes) = self.stage_groups();
        self.stage_move(dt, map, player);
        self.stage_non_penetration(map);
        self.stage_summary();

        self.tick = self.tick.next();
        TickEvents {
            tick: self.tick,
            promotions,
            leader_changes,
        }
    }

    /// Rebuild the spatial index and refresh every live agent's neighbor
    /// snapshot. Dead agents neither sense nor appear as neighbors.
    fn stage_neighbors(&mut self) {
        let count = self.roster.len();
        if count == 0 {
            return;
        }

        let bodies: Vec<(Vec2, f32)> = self
            .roster
            .rows()
            .iter()
            .map(|agent| (agent.position, agent.radius))
            .collect();
        if self.index.rebuild(&bodies).is_err() {
            return;
        }

        let states: Vec<AgentState> = self.roster.rows().iter().map(|a| a.state).collect();
        let sense: Vec<f32> = self.roster.rows().iter().map(|a| a.flocking_radius).collect();
        let handles: Vec<AgentId> = (0..count).map(|idx| self.roster.handle_at(idx)).collect();

        let index = &self.index;
        let lists: Vec<Vec<AgentId>> = (0..count)
            .into_par_iter()
            .map(|idx| {
                if states[idx] == AgentState::Dead {
                    return Vec::new();
                }
                let mut found = Vec::new();
                index.neighbors_within(idx, sense[idx], &mut |other, _dist_sq| {
                    if states[other] != AgentState::Dead {
                        found.push(handles[other]);
                    }
                });
                found
            })
            .collect();

        for (idx, list) in lists.into_iter().enumerate() {
            self.roster.row_mut(idx).neighbors = list;
        }
    }

    /// Run every agent's group manager in dense order.
    fn stage_groups(&mut self) -> (usize, usize) {
        let mut promotions = 0;
        let mut leader_changes = 0;
        for idx in 0..self.roster.len() {
            let events = flock::update(&mut self.roster, idx, &self.config, self.clock);
            promotions += events.promotions;
            leader_changes += events.leader_changes;
        }
        (promotions, leader_changes)
    }

    /// Peek update, force orchestration, integration, and per-agent static
    /// collision handling.
    fn stage_move(&mut self, dt: f32, map: &ArenaMap, player: Option<&PlayerView>) {
        let params = SteeringParams::from(&self.config);
        let player_mover = player.map(PlayerView::mover);

        for idx in 0..self.roster.len() {
            let (state, is_leader, leader_id) = {
                let row = self.roster.row(idx);
                (row.state, row.is_group_leader, row.group.leader)
            };
            if state == AgentState::Dead {
                continue;
            }

            let kin = self.roster.row(idx).kinematics();
            let (neighbor_positions, neighbor_headings): (Vec<Vec2>, Vec<Vec2>) = self
                .roster
                .row(idx)
                .neighbors
                .iter()
                .filter_map(|&id| self.roster.get(id))
                .filter(|other| other.state != AgentState::Dead)
                .map(|other| (other.position, other.heading))
                .unzip();

            let leader_mover: Option<Mover> = if state == AgentState::Attack && !is_leader {
                leader_id
                    .and_then(|id| self.roster.get(id))
                    .filter(|leader| leader.state == AgentState::Attack)
                    .map(Agent::mover)
            } else {
                None
            };
            let needs_offset = leader_mover.is_some()
                && self.roster.row(idx).attack_offset.is_none();
            let sampled_offset =
                needs_offset.then(|| self.config.sample_attack_offset(&mut self.rng));

            let ctx = BehaviorContext {
                config: &self.config,
                params,
                map,
                player: player_mover,
                neighbor_positions: &neighbor_positions,
                neighbor_headings: &neighbor_headings,
            };

            let row = self.roster.row_mut(idx);
            let neighbor_count = row.neighbors.len();
            if let Some(nudge) = row.peek.update(&self.config, dt, neighbor_count, &mut self.rng)
            {
                row.steering.nudge_wander_target(nudge);
            }
            let peeking = row.peek.is_peeking();

            let force = match state {
                AgentState::Explore => behavior::explore_force(
                    &ctx,
                    &kin,
                    &mut row.steering,
                    peeking,
                    dt,
                    &mut self.rng,
                ),
                AgentState::Attack if is_leader => {
                    behavior::attack_leader_force(&ctx, &kin, &mut row.steering)
                }
                AgentState::Attack => match leader_mover {
                    Some(leader) => {
                        let offset = row.attack_offset.or(sampled_offset).unwrap_or_default();
                        row.attack_offset = Some(offset);
                        behavior::attack_follower_force(
                            &ctx,
                            &kin,
                            &mut row.steering,
                            &leader,
                            offset,
                        )
                    }
                    // No live leader resolvable yet: behave like an explorer
                    // until the group manager recovers.
                    None => behavior::explore_force(
                        &ctx,
                        &kin,
                        &mut row.steering,
                        peeking,
                        dt,
                        &mut self.rng,
                    ),
                },
                AgentState::Dead => Vec2::ZERO,
            };

            row.integrate(force, dt);

            let radius = row.radius;
            for obstacle in &map.obstacles {
                collision::resolve_circle_overlap(
                    &mut row.position,
                    radius,
                    obstacle.position,
                    obstacle.radius,
                );
            }
            collision::clamp_to_bounds(&mut row.position, radius, map.width, map.height);
        }
    }

    /// Pairwise agent-agent overlap resolution on final-for-this-tick
    /// positions. Leaders push followers aside and are never displaced
    /// themselves; dead agents are inert.
    fn stage_non_penetration(&mut self, map: &ArenaMap) {
        let count = self.roster.len();
        for i in 0..count {
            if self.roster.row(i).state == AgentState::Dead {
                continue;
            }
            for j in (i + 1)..count {
                if self.roster.row(j).state == AgentState::Dead {
                    continue;
                }
                let (pos_a, radius_a, leader_a) = {
                    let a = self.roster.row(i);
                    (a.position, a.radius, a.is_group_leader)
                };
                let (pos_b, radius_b, leader_b) = {
                    let b = self.roster.row(j);
                    (b.position, b.radius, b.is_group_leader)
                };
                if let Some((shift_a, shift_b)) = collision::separate_pair(
                    pos_a,
                    radius_a,
                    leader_a,
                    pos_b,
                    radius_b,
                    leader_b,
                    &mut self.rng,
                ) {
                    self.roster.row_mut(i).position += shift_a;
                    self.roster.row_mut(j).position += shift_b;
                }
            }
        }

        for idx in 0..count {
            let row = self.roster.row_mut(idx);
            if row.state == AgentState::Dead {
                continue;
            }
            let radius = row.radius;
            collision::clamp_to_bounds(&mut row.position, radius, map.width, map.height);
        }
    }

    /// Record the per-tick population summary.
    fn stage_summary(&mut self) {
        let mut summary = TickSummary {
            tick: self.tick.next(),
            total: self.roster.len(),
            ..TickSummary::default()
        };
        for agent in self.roster.rows() {
            match agent.state {
                AgentState::Explore => summary.exploring += 1,
                AgentState::Attack => summary.attacking += 1,
                AgentState::Dead => summary.dead += 1,
            }
            if agent.is_group_leader {
                summary.leaders += 1;
            }
        }
        if self.history.len() == self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &HordeConfig {
        &self.config
    }

    /// Mutable access to the configuration (for hot edits).
    #[must_use]
    pub fn config_mut(&mut self) -> &mut HordeConfig {
        &mut self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Accumulated simulation time in seconds.
    #[must_use]
    pub const fn clock(&self) -> f64 {
        self.clock
    }

    /// Number of stored agents, dead ones included.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.roster.len()
    }

    /// Read-only access to the agent roster.
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Mutable access to the agent roster.
    #[must_use]
    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    /// Borrow the world RNG mutably for deterministic sampling.
    #[must_use]
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Iterate over retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Spawn an agent at an exact position, returning its handle.
    pub fn spawn_at(&mut self, position: Vec2) -> AgentId {
        let serial = self.next_serial;
        self.next_serial += 1;
        let agent = Agent::spawn(serial, position, &self.config, &mut self.rng);
        let id = self.roster.insert(agent);
        trace!(serial, ?position, "agent spawned");
        id
    }

    /// Spawn an agent at a random collision-free position, retrying up to
    /// the configured attempt budget.
    pub fn try_spawn(&mut self, map: &ArenaMap) -> Result<AgentId, HordeStateError> {
        let radius = self.config.agent_radius;
        let attempts = self.config.spawn_attempts;
        if map.width < radius * 2.0 || map.height < radius * 2.0 {
            return Err(HordeStateError::SpawnExhausted(0));
        }

        for _ in 0..attempts {
            let position = Vec2::new(
                self.rng.random_range(radius..=(map.width - radius)),
                self.rng.random_range(radius..=(map.height - radius)),
            );
            let blocked = map
                .obstacles
                .iter()
                .any(|o| collision::circles_overlap(position, radius, o.position, o.radius))
                || self
                    .roster
                    .rows()
                    .iter()
                    .any(|a| collision::circles_overlap(position, radius, a.position, a.radius));
            if !blocked {
                return Ok(self.spawn_at(position));
            }
        }
        Err(HordeStateError::SpawnExhausted(attempts))
    }

    /// Populate the map with `count` collision-free agents.
    pub fn populate(
        &mut self,
        map: &ArenaMap,
        count: usize,
    ) -> Result<Vec<AgentId>, HordeStateError> {
        (0..count).map(|_| self.try_spawn(map)).collect()
    }

    /// External hit notification: mark the agent dead and strip its leader
    /// flag. Returns false for unknown handles and agents already dead.
    pub fn kill(&mut self, id: AgentId) -> bool {
        match self.roster.get_mut(id) {
            Some(agent) if agent.state != AgentState::Dead => {
                agent.state = AgentState::Dead;
                agent.is_group_leader = false;
                debug!(serial = agent.serial, "agent killed");
                true
            }
            _ => false,
        }
    }

    /// Remove an agent from the roster entirely. Safe between ticks; stale
    /// handles held by other agents stop resolving immediately.
    pub fn remove_agent(&mut self, id: AgentId) -> Option<Agent> {
        let removed = self.roster.remove(id);
        if let Some(agent) = &removed {
            trace!(serial = agent.serial, "agent removed");
        }
        removed
    }

    /// Draw-relevant projection of one agent.
    #[must_use]
    pub fn snapshot(&self, id: AgentId) -> Option<AgentSnapshot> {
        self.roster.get(id).map(|agent| agent.snapshot(id))
    }

    /// Draw-relevant projections of the whole roster in dense order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        self.roster
            .iter()
            .map(|(id, agent)| agent.snapshot(id))
            .collect()
    }

    /// Handles of live agents currently touching the player, for the outer
    /// game's contact-damage pass.
    #[must_use]
    pub fn player_contacts(&self, player: &PlayerView) -> Vec<AgentId> {
        self.roster
            .iter()
            .filter(|(_, agent)| agent.state != AgentState::Dead)
            .filter(|(_, agent)| {
                collision::circles_overlap(
                    agent.position,
                    agent.radius,
                    player.position,
                    player.radius,
                )
            })
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_config() -> HordeConfig {
        HordeConfig {
            rng_seed: Some(0xD00D),
            ..HordeConfig::default()
        }
    }

    #[test]
    fn roster_insert_allocates_unique_handles() {
        let mut world = HordeState::new(seeded_config()).expect("world");
        let a = world.spawn_at(Vec2::new(10.0, 10.0));
        let b = world.spawn_at(Vec2::new(20.0, 10.0));
        assert_ne!(a, b);
        assert_eq!(world.agent_count(), 2);
        assert!(world.roster().contains(a));
        assert_eq!(world.roster().get(a).expect("agent").serial, 0);
        assert_eq!(world.roster().get(b).expect("agent").serial, 1);
    }

    #[test]
    fn roster_remove_keeps_dense_storage_coherent() {
        let mut world = HordeState::new(seeded_config()).expect("world");
        let a = world.spawn_at(Vec2::new(10.0, 10.0));
        let b = world.spawn_at(Vec2::new(20.0, 10.0));
        let c = world.spawn_at(Vec2::new(30.0, 10.0));

        let removed = world.remove_agent(b).expect("removed");
        assert_eq!(removed.serial, 1);
        assert_eq!(world.agent_count(), 2);
        assert!(world.roster().contains(a));
        assert!(world.roster().contains(c));
        assert!(!world.roster().contains(b));
        // The swap-removed agent's slot was patched.
        assert_eq!(world.roster().index_of(c), Some(1));

        let d = world.spawn_at(Vec2::new(40.0, 10.0));
        assert_ne!(b, d, "generational handles must not be reused");
    }

    #[test]
    fn kill_marks_dead_and_strips_leadership() {
        let mut world = HordeState::new(seeded_config()).expect("world");
        let id = world.spawn_at(Vec2::new(10.0, 10.0));
        world.roster_mut().get_mut(id).expect("agent").is_group_leader = true;

        assert!(world.kill(id));
        let agent = world.roster().get(id).expect("agent");
        assert_eq!(agent.state, AgentState::Dead);
        assert!(!agent.is_group_leader);
        // Killing twice is a no-op.
        assert!(!world.kill(id));
    }

    #[test]
    fn try_spawn_avoids_obstacles_and_agents() {
        let mut map = ArenaMap::bounded(200.0, 200.0);
        map.obstacles
            .push(crate::Obstacle::new(Vec2::new(100.0, 100.0), 60.0));
        let mut world = HordeState::new(seeded_config()).expect("world");

        for _ in 0..8 {
            let id = world.try_spawn(&map).expect("spawn");
            let spawned = world.roster().get(id).expect("agent");
            assert!(!collision::circles_overlap(
                spawned.position,
                spawned.radius,
                Vec2::new(100.0, 100.0),
                60.0
            ));
        }
        // Spawned agents never overlap each other either.
        let rows = world.roster().rows();
        for i in 0..rows.len() {
            for j in (i + 1)..rows.len() {
                assert!(!collision::circles_overlap(
                    rows[i].position,
                    rows[i].radius,
                    rows[j].position,
                    rows[j].radius
                ));
            }
        }
    }

    #[test]
    fn try_spawn_fails_in_a_packed_arena() {
        let map = ArenaMap::bounded(50.0, 50.0);
        let mut world = HordeState::new(HordeConfig {
            spawn_attempts: 16,
            ..seeded_config()
        })
        .expect("world");
        // One agent fits; radius 20 in a 50×50 arena leaves no second spot.
        world.try_spawn(&map).expect("first spawn");
        assert!(matches!(
            world.try_spawn(&map),
            Err(HordeStateError::SpawnExhausted(16))
        ));
    }

    #[test]
    fn step_keeps_agents_inside_the_arena() {
        let map = ArenaMap::bounded(400.0, 300.0);
        let mut world = HordeState::new(seeded_config()).expect("world");
        // Force a spawn outside the bounds; the first step clamps it.
        let id = world.spawn_at(Vec2::new(-5.0, 50.0));
        world.step(0.016, &map, None);
        let agent = world.roster().get(id).expect("agent");
        assert!(agent.position.x >= agent.radius);
        assert!(agent.position.x <= map.width - agent.radius);
        assert!(agent.position.y >= agent.radius);
        assert!(agent.position.y <= map.height - agent.radius);
    }

    #[test]
    fn summary_counts_states_and_caps_history() {
        let map = ArenaMap::bounded(400.0, 300.0);
        let mut world = HordeState::new(HordeConfig {
            history_capacity: 4,
            ..seeded_config()
        })
        .expect("world");
        let a = world.spawn_at(Vec2::new(50.0, 50.0));
        world.spawn_at(Vec2::new(300.0, 200.0));
        world.kill(a);

        for _ in 0..8 {
            world.step(0.016, &map, None);
        }
        assert_eq!(world.history().count(), 4);
        let last = world.history().last().expect("summary");
        assert_eq!(last.total, 2);
        assert_eq!(last.dead, 1);
        assert_eq!(last.exploring, 1);
        assert_eq!(last.attacking, 0);
    }

    #[test]
    fn player_contacts_reports_touching_live_agents() {
        let mut world = HordeState::new(seeded_config()).expect("world");
        let touching = world.spawn_at(Vec2::new(100.0, 100.0));
        let distant = world.spawn_at(Vec2::new(300.0, 300.0));
        let corpse = world.spawn_at(Vec2::new(110.0, 100.0));
        world.kill(corpse);

        let player = PlayerView {
            position: Vec2::new(120.0, 100.0),
            velocity: Vec2::ZERO,
            heading: Vec2::X,
            radius: 20.0,
        };
        let contacts = world.player_contacts(&player);
        assert!(contacts.contains(&touching));
        assert!(!contacts.contains(&distant));
        assert!(!contacts.contains(&corpse));
    }

    #[test]
    fn dead_agents_do_not_move_or_appear_as_neighbors() {
        let map = ArenaMap::bounded(400.0, 300.0);
        let mut world = HordeState::new(seeded_config()).expect("world");
        let live = world.spawn_at(Vec2::new(100.0, 100.0));
        let corpse = world.spawn_at(Vec2::new(130.0, 100.0));
        world.kill(corpse);
        let corpse_position = world.roster().get(corpse).expect("agent").position;

        for _ in 0..4 {
            world.step(0.016, &map, None);
        }
        assert_eq!(
            world.roster().get(corpse).expect("agent").position,
            corpse_position
        );
        assert!(
            !world
                .roster()
                .get(live)
                .expect("agent")
                .neighbors
                .contains(&corpse)
        );
    }
}
