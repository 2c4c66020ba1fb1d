//! Tick scheduling for agents.
//!
//! Each agent's turn is split into a compute phase (`Agent::step`, shared
//! access to everything) and a commit phase (`Agent::advance`, mutable access
//! to itself and the grid). Under [`Activation::Simultaneous`] every agent
//! computes before any agent commits, so nothing computed in a tick can see
//! another agent's next-tick state.

use std::collections::HashMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::modules::activation::Activation;
use crate::modules::error::{SimError, SimResult};
use crate::modules::space::{MultiGrid, Position};

pub type AgentId = u64;

pub trait Agent: Sized {
    /// What the compute phase hands to the commit phase.
    type Staged;

    fn unique_id(&self) -> AgentId;

    /// Work out the next state from the current one. Must not mutate.
    fn step(&self, ctx: &StepContext<'_, Self>) -> SimResult<Self::Staged>;

    /// Apply what `step` computed.
    fn advance(&mut self, staged: Self::Staged, ctx: &mut AdvanceContext<'_>) -> SimResult<()>;
}

/// Read-only view of the model handed to `Agent::step`.
pub struct StepContext<'a, A> {
    tick: u64,
    grid: &'a MultiGrid,
    agents: &'a HashMap<AgentId, A>,
}

impl<'a, A> StepContext<'a, A> {
    /// Zero-based index of the tick being computed.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn grid(&self) -> &'a MultiGrid {
        self.grid
    }

    pub fn peer(&self, agent_id: AgentId) -> Option<&'a A> {
        self.agents.get(&agent_id)
    }

    pub fn position_of(&self, agent_id: AgentId) -> Option<Position> {
        self.grid.location_of(agent_id)
    }
}

/// Mutable view handed to `Agent::advance`.
pub struct AdvanceContext<'a> {
    tick: u64,
    grid: &'a mut MultiGrid,
}

impl AdvanceContext<'_> {
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn grid(&self) -> &MultiGrid {
        &*self.grid
    }

    pub fn grid_mut(&mut self) -> &mut MultiGrid {
        &mut *self.grid
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Ready,
    Activating,
}

#[derive(Debug)]
pub struct Scheduler<A> {
    order: Vec<AgentId>,
    agents: HashMap<AgentId, A>,
    activation: Activation,
    state: SchedulerState,
    steps: u64,
    rng: StdRng,
}

impl<A: Agent> Scheduler<A> {
    pub fn new(activation: Activation, seed: u64) -> Self {
        Self {
            order: Vec::new(),
            agents: HashMap::new(),
            activation,
            state: SchedulerState::Ready,
            steps: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of ticks completed without error.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.agents.contains_key(&agent_id)
    }

    pub fn add(&mut self, agent: A) -> SimResult<()> {
        let agent_id = agent.unique_id();
        if self.agents.contains_key(&agent_id) {
            return Err(SimError::DuplicateAgent(agent_id));
        }
        self.order.push(agent_id);
        self.agents.insert(agent_id, agent);
        Ok(())
    }

    pub fn remove(&mut self, agent_id: AgentId) -> SimResult<A> {
        let agent = self
            .agents
            .remove(&agent_id)
            .ok_or(SimError::NotFound(agent_id))?;
        self.order.retain(|id| *id != agent_id);
        Ok(agent)
    }

    pub fn agent(&self, agent_id: AgentId) -> Option<&A> {
        self.agents.get(&agent_id)
    }

    pub fn agent_mut(&mut self, agent_id: AgentId) -> Option<&mut A> {
        self.agents.get_mut(&agent_id)
    }

    /// Registration order.
    pub fn agent_ids(&self) -> &[AgentId] {
        &self.order
    }

    /// Agents in registration order.
    pub fn agents(&self) -> impl Iterator<Item = &A> {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }

    /// Run one tick. The first agent error aborts the rest of the tick and is
    /// returned as [`SimError::AgentFailure`]; commits already applied are kept
    /// (partial tick, no rollback) and the step counter does not advance.
    pub fn step(&mut self, grid: &mut MultiGrid) -> SimResult<()> {
        let tick = self.steps;
        self.state = SchedulerState::Activating;

        let result = match self.activation {
            Activation::Simultaneous => self.step_simultaneous(grid, tick),
            Activation::Sequential => {
                let order = self.order.clone();
                self.step_in_order(&order, grid, tick)
            }
            Activation::Random => {
                let mut order = self.order.clone();
                order.shuffle(&mut self.rng);
                self.step_in_order(&order, grid, tick)
            }
        };

        self.state = SchedulerState::Ready;
        match result {
            Ok(()) => {
                self.steps += 1;
                debug!(tick, agents = self.order.len(), activation = %self.activation, "tick completed");
                Ok(())
            }
            Err(err) => {
                warn!(tick, error = %err, "tick aborted");
                Err(err)
            }
        }
    }

    fn step_simultaneous(&mut self, grid: &mut MultiGrid, tick: u64) -> SimResult<()> {
        let mut staged = Vec::with_capacity(self.order.len());
        {
            let ctx = StepContext {
                tick,
                grid: &*grid,
                agents: &self.agents,
            };
            for agent_id in &self.order {
                let agent = self
                    .agents
                    .get(agent_id)
                    .ok_or(SimError::NotFound(*agent_id))?;
                let next = agent
                    .step(&ctx)
                    .map_err(|e| agent_failure(*agent_id, tick, e))?;
                staged.push((*agent_id, next));
            }
        }

        let mut ctx = AdvanceContext { tick, grid };
        for (agent_id, next) in staged {
            let agent = self
                .agents
                .get_mut(&agent_id)
                .ok_or(SimError::NotFound(agent_id))?;
            agent
                .advance(next, &mut ctx)
                .map_err(|e| agent_failure(agent_id, tick, e))?;
        }
        Ok(())
    }

    fn step_in_order(
        &mut self,
        order: &[AgentId],
        grid: &mut MultiGrid,
        tick: u64,
    ) -> SimResult<()> {
        for agent_id in order {
            let next = {
                let agent = self
                    .agents
                    .get(agent_id)
                    .ok_or(SimError::NotFound(*agent_id))?;
                let ctx = StepContext {
                    tick,
                    grid: &*grid,
                    agents: &self.agents,
                };
                agent
                    .step(&ctx)
                    .map_err(|e| agent_failure(*agent_id, tick, e))?
            };

            let agent = self
                .agents
                .get_mut(agent_id)
                .ok_or(SimError::NotFound(*agent_id))?;
            let mut ctx = AdvanceContext {
                tick,
                grid: &mut *grid,
            };
            agent
                .advance(next, &mut ctx)
                .map_err(|e| agent_failure(*agent_id, tick, e))?;
        }
        Ok(())
    }
}

fn agent_failure(agent_id: AgentId, tick: u64, err: SimError) -> SimError {
    match err {
        SimError::AgentFailure { .. } => err,
        other => SimError::AgentFailure {
            agent_id,
            tick,
            reason: other.to_string(),
        },
    }
}
