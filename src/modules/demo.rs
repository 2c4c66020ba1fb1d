//! Random walkers: the model the command-line tool runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::modules::activation::Activation;
use crate::modules::error::{SimError, SimResult};
use crate::modules::model::{GridModel, Model, ModelParams};
use crate::modules::params::{ParamRegistry, UserParam};
use crate::modules::portrayal::{CanvasGrid, LAYER, Portrayal};
use crate::modules::space::{Neighborhood, Position};
use crate::modules::time::{AdvanceContext, Agent, AgentId, StepContext};
use crate::modules::visualization::{TextElement, Visualization, VisualizationElement};

pub const DEMO_NAME: &str = "Random walkers";
const CANVAS_SIZE: usize = 500;

pub type WalkerModel = GridModel<Walker>;

/// Moves to a random Moore neighbor each tick unless it rests.
#[derive(Debug, Clone, PartialEq)]
pub struct Walker {
    id: AgentId,
    seed: u64,
    rest_chance: u8,
    moves: u64,
    resting: bool,
}

impl Walker {
    /// `rest_chance` is a percentage, capped at 100.
    pub fn new(id: AgentId, seed: u64, rest_chance: u8) -> Self {
        Self {
            id,
            seed,
            rest_chance: rest_chance.min(100),
            moves: 0,
            resting: false,
        }
    }

    pub fn moves(&self) -> u64 {
        self.moves
    }

    pub fn is_resting(&self) -> bool {
        self.resting
    }

    fn roll(&self, tick: u64) -> u64 {
        splitmix64(self.seed ^ tick.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ self.id.rotate_left(32))
    }
}

impl Agent for Walker {
    type Staged = Option<Position>;

    fn unique_id(&self) -> AgentId {
        self.id
    }

    fn step(&self, ctx: &StepContext<'_, Self>) -> SimResult<Option<Position>> {
        let pos = ctx.position_of(self.id).ok_or(SimError::NotFound(self.id))?;
        let roll = self.roll(ctx.tick());
        if roll % 100 < u64::from(self.rest_chance) {
            return Ok(None);
        }
        let cells = ctx.grid().neighborhood(pos, Neighborhood::Moore, false, 1)?;
        if cells.is_empty() {
            return Ok(None);
        }
        let pick = splitmix64(roll) % cells.len() as u64;
        Ok(Some(cells[pick as usize]))
    }

    fn advance(&mut self, staged: Option<Position>, ctx: &mut AdvanceContext<'_>) -> SimResult<()> {
        match staged {
            Some(target) => {
                ctx.grid_mut().move_agent(self.id, target)?;
                self.moves += 1;
                self.resting = false;
            }
            None => self.resting = true,
        }
        Ok(())
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Parameters the demo exposes, with their defaults.
pub fn demo_registry() -> SimResult<ParamRegistry> {
    Ok(ParamRegistry::new()
        .with("width", 20)
        .with("height", 20)
        .with(
            "density",
            UserParam::slider("Walker density", 0.3, 0.0, 1.0, 0.05)?
                .with_description("Chance that a cell starts with a walker"),
        )
        .with(
            "rest_chance",
            UserParam::slider("Rest chance (%)", 25, 0, 100, 5)?,
        )
        .with("torus", UserParam::checkbox("Wrap around edges", true))
        .with(
            "activation",
            UserParam::choice(
                "Activation",
                Activation::default().label(),
                [
                    Activation::Simultaneous.label(),
                    Activation::Sequential.label(),
                    Activation::Random.label(),
                ],
            )?,
        )
        .with("seed", UserParam::number_input("Random seed", 42)?)
        .with(
            "info",
            UserParam::static_text("Walkers pick a random neighboring cell every tick."),
        ))
}

/// Build a walker model. Each cell independently starts with a walker with
/// probability `density`; ids follow grid traversal order.
pub fn walker_model(params: &ModelParams) -> SimResult<WalkerModel> {
    let density = params.f64_or("density", 0.3)?;
    if !(0.0..=1.0).contains(&density) {
        return Err(SimError::range(format!(
            "density must be within 0..=1, got {}",
            density
        )));
    }
    let rest_chance = params.i64_or("rest_chance", 25)?;
    let rest_chance = u8::try_from(rest_chance)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| SimError::range(format!("rest_chance must be within 0..=100, got {}", rest_chance)))?;
    let seed = params.i64_or("seed", 42)? as u64;

    let mut model = GridModel::from_params(params.clone().with("seed", seed as i64))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut next_id: AgentId = 0;
    model.populate(|_, _| {
        rng.gen_bool(density).then(|| {
            let walker = Walker::new(next_id, seed, rest_chance);
            next_id += 1;
            walker
        })
    })?;
    Ok(model)
}

pub fn walker_portrayal(walker: &Walker) -> Option<Portrayal> {
    let color = if walker.is_resting() { "#9e9e9e" } else { "#1f77b4" };
    Some(
        Portrayal::circle(0.5, color)
            .with(LAYER, 0)
            .with("id", walker.unique_id() as i64)
            .with("moves", walker.moves() as i64),
    )
}

pub fn summary(model: &WalkerModel) -> String {
    let schedule = model.schedule();
    let resting = schedule.agents().filter(|w| w.is_resting()).count();
    let moves: u64 = schedule.agents().map(Walker::moves).sum();
    format!(
        "Tick {}: {} walkers, {} resting, {} moves so far",
        model.steps(),
        schedule.len(),
        resting,
        moves
    )
}

/// Demo session with `overrides` applied on top of the registry defaults:
/// a canvas grid followed by a text summary.
pub fn demo_visualization(overrides: &ModelParams) -> SimResult<Visualization<WalkerModel>> {
    let mut registry = demo_registry()?;
    registry.apply_overrides(overrides)?;
    let values = registry.values();
    let width = values.usize_or("width", 20)?;
    let height = values.usize_or("height", 20)?;

    let elements: Vec<Box<dyn VisualizationElement<WalkerModel>>> = vec![
        Box::new(CanvasGrid::new(
            walker_portrayal,
            width,
            height,
            CANVAS_SIZE,
            CANVAS_SIZE,
        )),
        Box::new(TextElement::new(summary)),
    ];
    Ok(Visualization::new(DEMO_NAME, walker_model, elements, registry)?
        .with_description("Walkers wander a grid, resting now and then."))
}
