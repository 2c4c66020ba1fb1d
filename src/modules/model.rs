use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::modules::activation::Activation;
use crate::modules::error::{SimError, SimResult};
use crate::modules::space::{MultiGrid, Position};
use crate::modules::time::{Agent, AgentId, Scheduler};
use crate::modules::value::Scalar;

/// Named constructor values for a model. Names the model does not know about
/// are carried along untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelParams(BTreeMap<String, Scalar>);

impl ModelParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Option<Scalar> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Scalar)> {
        self.0.iter()
    }

    pub fn i64_or(&self, name: &str, default: i64) -> SimResult<i64> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v
                .as_i64()
                .ok_or_else(|| SimError::range(format!("{} must be an integer, got {}", name, v))),
        }
    }

    pub fn usize_or(&self, name: &str, default: usize) -> SimResult<usize> {
        let v = self.i64_or(name, default as i64)?;
        usize::try_from(v)
            .map_err(|_| SimError::range(format!("{} must be non-negative, got {}", name, v)))
    }

    pub fn f64_or(&self, name: &str, default: f64) -> SimResult<f64> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v
                .as_f64()
                .ok_or_else(|| SimError::range(format!("{} must be a number, got {}", name, v))),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> SimResult<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v
                .as_bool()
                .ok_or_else(|| SimError::range(format!("{} must be true or false, got {}", name, v))),
        }
    }

    pub fn str_or(&self, name: &str, default: &str) -> SimResult<String> {
        match self.get(name) {
            None => Ok(default.to_string()),
            Some(v) => v
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| SimError::range(format!("{} must be text, got {}", name, v))),
        }
    }
}

impl FromIterator<(String, Scalar)> for ModelParams {
    fn from_iter<T: IntoIterator<Item = (String, Scalar)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Surface the scheduler and renderers need from a model.
pub trait Model {
    type Agent: Agent;

    /// Advance by one tick.
    fn step(&mut self) -> SimResult<()>;

    fn grid(&self) -> &MultiGrid;

    fn schedule(&self) -> &Scheduler<Self::Agent>;

    /// A stopped model is not stepped any further by a driver.
    fn running(&self) -> bool {
        true
    }
}

/// A model built from one grid and one scheduler. It is the only writer to
/// both, and adds or removes every agent in both at once.
#[derive(Debug)]
pub struct GridModel<A> {
    grid: MultiGrid,
    schedule: Scheduler<A>,
    params: ModelParams,
    running: bool,
}

impl<A: Agent> GridModel<A> {
    pub fn new(
        width: usize,
        height: usize,
        torus: bool,
        activation: Activation,
        params: ModelParams,
    ) -> SimResult<Self> {
        let seed = params.i64_or("seed", 0)? as u64;
        let grid = MultiGrid::new(width, height, torus)?;
        debug!(width, height, torus, %activation, seed, "grid model created");
        Ok(Self {
            grid,
            schedule: Scheduler::new(activation, seed),
            params,
            running: true,
        })
    }

    /// Build from `width`, `height`, `torus` (default true) and `activation`
    /// (default simultaneous) entries in `params`.
    pub fn from_params(params: ModelParams) -> SimResult<Self> {
        let width = params.usize_or("width", 10)?;
        let height = params.usize_or("height", 10)?;
        let torus = params.bool_or("torus", true)?;
        let activation = params
            .str_or("activation", Activation::default().label())?
            .parse::<Activation>()
            .map_err(|_| SimError::range("activation must be simultaneous, sequential or random"))?;
        Self::new(width, height, torus, activation, params)
    }

    /// Walk the grid in coordinate order and add whatever agent `make` returns
    /// for each cell. Returns how many agents were added.
    pub fn populate<F>(&mut self, mut make: F) -> SimResult<usize>
    where
        F: FnMut(Position, &ModelParams) -> Option<A>,
    {
        let mut added = 0;
        for pos in self.grid.coord_iter() {
            if let Some(agent) = make(pos, &self.params) {
                self.add_agent(agent, pos)?;
                added += 1;
            }
        }
        debug!(added, "grid populated");
        Ok(added)
    }

    /// Place an agent on the grid and register it with the scheduler.
    pub fn add_agent(&mut self, agent: A, pos: Position) -> SimResult<Position> {
        let agent_id = agent.unique_id();
        if self.schedule.contains(agent_id) || self.grid.contains(agent_id) {
            return Err(SimError::DuplicateAgent(agent_id));
        }
        let placed = self.grid.place_agent(agent_id, pos)?;
        self.schedule.add(agent)?;
        Ok(placed)
    }

    /// Take an agent off the grid and out of the scheduler.
    pub fn remove_agent(&mut self, agent_id: AgentId) -> SimResult<A> {
        if !self.schedule.contains(agent_id) {
            return Err(SimError::NotFound(agent_id));
        }
        if self.grid.contains(agent_id) {
            self.grid.remove_agent(agent_id)?;
        }
        self.schedule.remove(agent_id)
    }

    pub fn agent(&self, agent_id: AgentId) -> Option<&A> {
        self.schedule.agent(agent_id)
    }

    pub fn agent_mut(&mut self, agent_id: AgentId) -> Option<&mut A> {
        self.schedule.agent_mut(agent_id)
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn steps(&self) -> u64 {
        self.schedule.steps()
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }
}

impl<A: Agent> Model for GridModel<A> {
    type Agent = A;

    fn step(&mut self) -> SimResult<()> {
        self.schedule.step(&mut self.grid)
    }

    fn grid(&self) -> &MultiGrid {
        &self.grid
    }

    fn schedule(&self) -> &Scheduler<A> {
        &self.schedule
    }

    fn running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::time::{AdvanceContext, StepContext};

    #[derive(Debug)]
    struct Tally {
        id: AgentId,
        val: i64,
    }

    impl Agent for Tally {
        type Staged = i64;

        fn unique_id(&self) -> AgentId {
            self.id
        }

        fn step(&self, _ctx: &StepContext<'_, Self>) -> SimResult<i64> {
            Ok(self.val + 1)
        }

        fn advance(&mut self, staged: i64, _ctx: &mut AdvanceContext<'_>) -> SimResult<()> {
            self.val = staged;
            Ok(())
        }
    }

    fn model(width: usize, height: usize) -> GridModel<Tally> {
        GridModel::new(width, height, true, Activation::Simultaneous, ModelParams::new()).unwrap()
    }

    #[test]
    fn populate_visits_every_cell_in_order() {
        let mut m = model(3, 2);
        let added = m
            .populate(|pos, _| {
                Some(Tally {
                    id: (pos.x + pos.y * 100) as AgentId,
                    val: (pos.x * pos.y * 3) as i64,
                })
            })
            .unwrap();

        assert_eq!(added, 6);
        assert_eq!(m.schedule().agent_ids(), &[0, 100, 1, 101, 2, 102]);
        assert_eq!(m.grid().location_of(101), Some(Position::new(1, 1)));
        assert_eq!(m.agent(102).unwrap().val, 6);
    }

    #[test]
    fn populate_may_skip_cells() {
        let mut m = model(2, 2);
        let added = m
            .populate(|pos, _| (pos.x == pos.y).then(|| Tally { id: pos.x as AgentId, val: 0 }))
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(m.grid().empties().len(), 2);
    }

    #[test]
    fn add_and_remove_keep_grid_and_schedule_in_sync() {
        let mut m = model(2, 2);
        m.add_agent(Tally { id: 1, val: 0 }, Position::new(1, 1)).unwrap();
        assert_eq!(
            m.add_agent(Tally { id: 1, val: 0 }, Position::new(0, 0)),
            Err(SimError::DuplicateAgent(1))
        );
        assert_eq!(m.grid().agent_count(), 1);

        let removed = m.remove_agent(1).unwrap();
        assert_eq!(removed.id, 1);
        assert!(!m.grid().contains(1));
        assert!(m.schedule().is_empty());
        assert!(matches!(m.remove_agent(1), Err(SimError::NotFound(1))));
    }

    #[test]
    fn failed_placement_registers_nothing() {
        let mut m: GridModel<Tally> =
            GridModel::new(2, 2, false, Activation::Sequential, ModelParams::new()).unwrap();
        assert!(m.add_agent(Tally { id: 3, val: 0 }, Position::new(2, 0)).is_err());
        assert!(m.schedule().is_empty());
    }

    #[test]
    fn step_delegates_to_scheduler() {
        let mut m = model(1, 1);
        m.add_agent(Tally { id: 0, val: 0 }, Position::origin()).unwrap();
        m.step().unwrap();
        m.step().unwrap();
        assert_eq!(m.agent(0).unwrap().val, 2);
        assert_eq!(m.steps(), 2);
    }

    #[test]
    fn from_params_reads_dimensions_and_passes_unknowns_through() {
        let params = ModelParams::new()
            .with("width", 4)
            .with("height", 3)
            .with("torus", false)
            .with("activation", "random")
            .with("key1", 103);
        let m: GridModel<Tally> = GridModel::from_params(params).unwrap();
        assert_eq!((m.grid().width(), m.grid().height()), (4, 3));
        assert!(!m.grid().is_torus());
        assert_eq!(m.schedule().activation(), Activation::Random);
        assert_eq!(m.params().i64_or("key1", 0).unwrap(), 103);
    }

    #[test]
    fn typed_getters_reject_wrong_kinds() {
        let params = ModelParams::new().with("width", "wide").with("height", -2);
        assert!(matches!(params.usize_or("width", 1), Err(SimError::Range(_))));
        assert!(matches!(params.usize_or("height", 1), Err(SimError::Range(_))));
        assert_eq!(params.f64_or("missing", 0.5).unwrap(), 0.5);
    }
}
