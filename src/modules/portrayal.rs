//! Turning grid occupants into layered draw records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::modules::model::Model;
use crate::modules::value::{Number, Scalar};
use crate::modules::visualization::VisualizationElement;

pub const SHAPE: &str = "Shape";
pub const COLOR: &str = "Color";
pub const FILLED: &str = "Filled";
pub const LAYER: &str = "Layer";

/// Open set of drawing attributes for one agent. Renderers must tolerate
/// keys they do not understand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Portrayal(BTreeMap<String, Scalar>);

impl Portrayal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filled rectangle `w` by `h` cells on layer 0.
    pub fn rect(w: impl Into<Number>, h: impl Into<Number>, color: &str) -> Self {
        Self::new()
            .with(SHAPE, "rect")
            .with("w", w.into())
            .with("h", h.into())
            .with(FILLED, "true")
            .with(LAYER, 0)
            .with(COLOR, color)
    }

    /// Filled circle of radius `r` cells on layer 0.
    pub fn circle(r: impl Into<Number>, color: &str) -> Self {
        Self::new()
            .with(SHAPE, "circle")
            .with("r", r.into())
            .with(FILLED, "true")
            .with(LAYER, 0)
            .with(COLOR, color)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.get(key)
    }

    /// Layer index from the `Layer` key, 0 when missing or not an integer.
    pub fn layer(&self) -> i64 {
        self.get(LAYER).and_then(Scalar::as_i64).unwrap_or(0)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect::<Map<String, Value>>(),
        )
    }
}

/// Portrayals grouped by layer; within a layer, in grid traversal order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridState(BTreeMap<i64, Vec<Portrayal>>);

impl GridState {
    pub fn push(&mut self, portrayal: Portrayal) {
        self.0.entry(portrayal.layer()).or_default().push(portrayal);
    }

    pub fn layer(&self, layer: i64) -> &[Portrayal] {
        self.0.get(&layer).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn layers(&self) -> impl Iterator<Item = (i64, &[Portrayal])> {
        self.0.iter().map(|(layer, items)| (*layer, items.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `{"<layer>": [portrayal, ...], ...}`
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(layer, items)| {
                    (
                        layer.to_string(),
                        Value::Array(items.iter().map(Portrayal::to_json).collect()),
                    )
                })
                .collect::<Map<String, Value>>(),
        )
    }
}

/// Portray every agent on the model's grid. Cells are visited in
/// `coord_iter` order and occupants in placement order; `x`/`y` are set to
/// the agent's cell. Agents the function returns `None` for are skipped, and
/// so are grid occupants with no scheduler entry (ids an agent placed through
/// `AdvanceContext::grid_mut` without registering them).
pub fn render_grid<M, F>(model: &M, portrayal: F) -> GridState
where
    M: Model,
    F: Fn(&M::Agent) -> Option<Portrayal>,
{
    let grid = model.grid();
    let schedule = model.schedule();
    let mut state = GridState::default();

    for pos in grid.coord_iter() {
        let Ok(occupants) = grid.iter_cell_contents(pos) else {
            continue;
        };
        for agent_id in occupants {
            let Some(agent) = schedule.agent(agent_id) else {
                continue;
            };
            if let Some(mut record) = portrayal(agent) {
                record.set("x", pos.x);
                record.set("y", pos.y);
                state.push(record);
            }
        }
    }

    state
}

/// Grid element: renders through a portrayal function.
pub struct CanvasGrid<A> {
    portrayal: Box<dyn Fn(&A) -> Option<Portrayal>>,
    grid_width: usize,
    grid_height: usize,
    canvas_width: usize,
    canvas_height: usize,
}

impl<A> CanvasGrid<A> {
    pub fn new(
        portrayal: impl Fn(&A) -> Option<Portrayal> + 'static,
        grid_width: usize,
        grid_height: usize,
        canvas_width: usize,
        canvas_height: usize,
    ) -> Self {
        Self {
            portrayal: Box::new(portrayal),
            grid_width,
            grid_height,
            canvas_width,
            canvas_height,
        }
    }

    pub fn portray(&self, agent: &A) -> Option<Portrayal> {
        (self.portrayal)(agent)
    }
}

impl<M: Model> VisualizationElement<M> for CanvasGrid<M::Agent> {
    fn render(&self, model: &M) -> Value {
        render_grid(model, |agent| self.portray(agent)).to_json()
    }

    fn descriptor(&self) -> Value {
        json!({
            "type": "canvas_grid",
            "grid_width": self.grid_width,
            "grid_height": self.grid_height,
            "canvas_width": self.canvas_width,
            "canvas_height": self.canvas_height,
        })
    }
}
