//! Render sessions: configured elements, the current model, and the
//! client message protocol that drives them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::modules::error::SimResult;
use crate::modules::model::{Model, ModelParams};
use crate::modules::params::ParamRegistry;
use crate::modules::value::Scalar;

pub const DEFAULT_ELEMENT_TEXT: &str = "<b>VisualizationElement goes here</b>.";

/// One panel of a visualization. `render` must not mutate the model.
pub trait VisualizationElement<M> {
    fn render(&self, model: &M) -> Value;

    /// Static description handed to a client when it connects.
    fn descriptor(&self) -> Value {
        json!({ "type": "element" })
    }
}

/// Text panel. Without a text function it reports a fixed placeholder.
pub struct TextElement<M> {
    text: Option<Box<dyn Fn(&M) -> String>>,
}

impl<M> TextElement<M> {
    pub fn placeholder() -> Self {
        Self { text: None }
    }

    pub fn new(text: impl Fn(&M) -> String + 'static) -> Self {
        Self {
            text: Some(Box::new(text)),
        }
    }
}

impl<M> Default for TextElement<M> {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl<M> VisualizationElement<M> for TextElement<M> {
    fn render(&self, model: &M) -> Value {
        match &self.text {
            Some(text) => Value::String(text(model)),
            None => Value::String(DEFAULT_ELEMENT_TEXT.to_string()),
        }
    }

    fn descriptor(&self) -> Value {
        json!({ "type": "text" })
    }
}

/// One output per element, in configuration order.
pub fn render_model<M>(model: &M, elements: &[Box<dyn VisualizationElement<M>>]) -> Vec<Value> {
    elements.iter().map(|element| element.render(model)).collect()
}

/// Messages a client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    GetStep {
        #[serde(default)]
        step: u64,
    },
    Reset,
    SubmitParams {
        param: String,
        value: Scalar,
    },
    GetParams,
}

/// Messages sent back to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    VizState { data: Vec<Value> },
    ModelParams { params: BTreeMap<String, Value> },
    End,
}

type ModelFactory<M> = Box<dyn Fn(&ModelParams) -> SimResult<M>>;

pub struct Visualization<M> {
    name: String,
    description: String,
    factory: ModelFactory<M>,
    elements: Vec<Box<dyn VisualizationElement<M>>>,
    params: ParamRegistry,
    model: M,
}

impl<M: Model> Visualization<M> {
    /// Build the session and its first model from the registry's values.
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn(&ModelParams) -> SimResult<M> + 'static,
        elements: Vec<Box<dyn VisualizationElement<M>>>,
        params: ParamRegistry,
    ) -> SimResult<Self> {
        let name = name.into();
        let model = factory(&params.values())?;
        info!(%name, elements = elements.len(), "visualization ready");
        Ok(Self {
            name,
            description: String::new(),
            factory: Box::new(factory),
            elements,
            params,
            model,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Replace the model with a fresh one built from current parameter values.
    /// On failure the previous model is kept.
    pub fn reset_model(&mut self) -> SimResult<()> {
        let values = self.params.values();
        self.model = (self.factory)(&values)?;
        info!(name = %self.name, params = values.len(), "model reset");
        Ok(())
    }

    /// Advance one tick. Returns `false` without stepping once the model has
    /// stopped running.
    pub fn step(&mut self) -> SimResult<bool> {
        if !self.model.running() {
            return Ok(false);
        }
        self.model.step()?;
        Ok(true)
    }

    pub fn render_model(&self) -> Vec<Value> {
        render_model(&self.model, &self.elements)
    }

    pub fn user_params(&self) -> BTreeMap<String, Value> {
        self.params.user_params()
    }

    pub fn params(&self) -> &ParamRegistry {
        &self.params
    }

    /// Takes effect on the next `reset_model`.
    pub fn set_user_param(&mut self, name: &str, value: Scalar) -> SimResult<()> {
        self.params.set_value(name, value)
    }

    pub fn element_descriptors(&self) -> Vec<Value> {
        self.elements.iter().map(|e| e.descriptor()).collect()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn handle_message(&mut self, message: ClientMessage) -> SimResult<Vec<ServerMessage>> {
        debug!(?message, "client message");
        match message {
            ClientMessage::GetStep { .. } => {
                if self.step()? {
                    Ok(vec![self.viz_state()])
                } else {
                    Ok(vec![ServerMessage::End])
                }
            }
            ClientMessage::Reset => {
                self.reset_model()?;
                Ok(vec![self.viz_state()])
            }
            ClientMessage::SubmitParams { param, value } => {
                self.set_user_param(&param, value)?;
                Ok(Vec::new())
            }
            ClientMessage::GetParams => Ok(vec![ServerMessage::ModelParams {
                params: self.user_params(),
            }]),
        }
    }

    pub fn viz_state(&self) -> ServerMessage {
        ServerMessage::VizState {
            data: self.render_model(),
        }
    }
}
