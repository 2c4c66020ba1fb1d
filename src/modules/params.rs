//! Adjustable run parameters and their JSON form.
//!
//! Each [`UserParam`] kind serializes to `{"type": <kind>, "label", "value",
//! ...kind fields}`; decoding the same JSON with [`UserParam::from_json`]
//! yields an equal descriptor. A [`ParamRegistry`] mixes these with fixed
//! values and projects them into model constructor values or UI JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};

use crate::modules::error::{SimError, SimResult};
use crate::modules::model::ModelParams;
use crate::modules::value::{Number, Scalar};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NumberInput {
    pub label: String,
    pub value: Number,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Slider {
    pub label: String,
    pub value: Number,
    pub min_value: Number,
    pub max_value: Number,
    pub step: Number,
    #[serde(default)]
    pub description: Option<String>,
}

impl Slider {
    pub fn new(
        label: impl Into<String>,
        value: impl Into<Number>,
        min_value: impl Into<Number>,
        max_value: impl Into<Number>,
        step: impl Into<Number>,
    ) -> SimResult<Self> {
        let slider = Self {
            label: label.into(),
            value: value.into(),
            min_value: min_value.into(),
            max_value: max_value.into(),
            step: step.into(),
            description: None,
        };
        slider.validate()?;
        Ok(slider)
    }

    fn validate(&self) -> SimResult<()> {
        for (field, n) in [
            ("value", self.value),
            ("min_value", self.min_value),
            ("max_value", self.max_value),
            ("step", self.step),
        ] {
            if !n.is_finite() {
                return Err(SimError::range(format!(
                    "slider {}: {} must be finite, got {}",
                    self.label, field, n
                )));
            }
        }
        let (min, max, value) = (
            self.min_value.as_f64(),
            self.max_value.as_f64(),
            self.value.as_f64(),
        );
        if min > max {
            return Err(SimError::range(format!(
                "slider {}: min_value {} is above max_value {}",
                self.label, self.min_value, self.max_value
            )));
        }
        if value < min || value > max {
            return Err(SimError::range(format!(
                "slider {}: value {} is outside [{}, {}]",
                self.label, self.value, self.min_value, self.max_value
            )));
        }
        if self.step.as_f64() <= 0.0 {
            return Err(SimError::range(format!(
                "slider {}: step must be positive, got {}",
                self.label, self.step
            )));
        }
        Ok(())
    }

    /// Set the value, clamped into `[min_value, max_value]`. NaN and
    /// infinities are rejected and leave the slider unchanged.
    pub fn set_value(&mut self, value: Number) -> SimResult<()> {
        if !value.is_finite() {
            return Err(SimError::range(format!(
                "slider {}: value must be finite, got {}",
                self.label, value
            )));
        }
        self.value = if value.as_f64() < self.min_value.as_f64() {
            self.min_value
        } else if value.as_f64() > self.max_value.as_f64() {
            self.max_value
        } else {
            value
        };
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Checkbox {
    pub label: String,
    pub value: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Choice {
    pub label: String,
    pub value: Scalar,
    pub choices: Vec<Scalar>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Choice {
    pub fn new(
        label: impl Into<String>,
        value: impl Into<Scalar>,
        choices: impl IntoIterator<Item = impl Into<Scalar>>,
    ) -> SimResult<Self> {
        let choice = Self {
            label: label.into(),
            value: value.into(),
            choices: choices.into_iter().map(Into::into).collect(),
            description: None,
        };
        choice.validate()?;
        Ok(choice)
    }

    fn validate(&self) -> SimResult<()> {
        if !self.choices.contains(&self.value) {
            return Err(SimError::range(format!(
                "choice {}: {} is not one of the available choices",
                self.label, self.value
            )));
        }
        Ok(())
    }
}

/// Read-only text shown alongside the adjustable parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StaticText {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserParam {
    NumberInput(NumberInput),
    Slider(Slider),
    Checkbox(Checkbox),
    Choice(Choice),
    StaticText(StaticText),
}

impl UserParam {
    pub fn number_input(label: impl Into<String>, value: impl Into<Number>) -> SimResult<Self> {
        let param = UserParam::NumberInput(NumberInput {
            label: label.into(),
            value: value.into(),
            description: None,
        });
        param.validate()?;
        Ok(param)
    }

    pub fn slider(
        label: impl Into<String>,
        value: impl Into<Number>,
        min_value: impl Into<Number>,
        max_value: impl Into<Number>,
        step: impl Into<Number>,
    ) -> SimResult<Self> {
        Slider::new(label, value, min_value, max_value, step).map(UserParam::Slider)
    }

    pub fn checkbox(label: impl Into<String>, value: bool) -> Self {
        UserParam::Checkbox(Checkbox {
            label: label.into(),
            value,
            description: None,
        })
    }

    pub fn choice(
        label: impl Into<String>,
        value: impl Into<Scalar>,
        choices: impl IntoIterator<Item = impl Into<Scalar>>,
    ) -> SimResult<Self> {
        Choice::new(label, value, choices).map(UserParam::Choice)
    }

    pub fn static_text(value: impl Into<String>) -> Self {
        UserParam::StaticText(StaticText {
            value: value.into(),
        })
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match &mut self {
            UserParam::NumberInput(p) => p.description = text,
            UserParam::Slider(p) => p.description = text,
            UserParam::Checkbox(p) => p.description = text,
            UserParam::Choice(p) => p.description = text,
            UserParam::StaticText(_) => {}
        }
        self
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            UserParam::NumberInput(_) => "number_input",
            UserParam::Slider(_) => "slider",
            UserParam::Checkbox(_) => "checkbox",
            UserParam::Choice(_) => "choice",
            UserParam::StaticText(_) => "static_text",
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            UserParam::NumberInput(p) => Some(&p.label),
            UserParam::Slider(p) => Some(&p.label),
            UserParam::Checkbox(p) => Some(&p.label),
            UserParam::Choice(p) => Some(&p.label),
            UserParam::StaticText(_) => None,
        }
    }

    /// Value handed to the model; static text contributes none.
    pub fn value(&self) -> Option<Scalar> {
        match self {
            UserParam::NumberInput(p) => Some(p.value.into()),
            UserParam::Slider(p) => Some(p.value.into()),
            UserParam::Checkbox(p) => Some(p.value.into()),
            UserParam::Choice(p) => Some(p.value.clone()),
            UserParam::StaticText(_) => None,
        }
    }

    /// Update the current value. Sliders clamp, choices must match one of
    /// their options, static text cannot be changed.
    pub fn set_value(&mut self, value: Scalar) -> SimResult<()> {
        let kind = self.kind();
        let mismatch = |expected: &str| {
            SimError::range(format!("{} expects {}, got {}", kind, expected, value))
        };
        match self {
            UserParam::NumberInput(p) => {
                p.value = value
                    .as_number()
                    .filter(|n| n.is_finite())
                    .ok_or_else(|| mismatch("a finite number"))?;
            }
            UserParam::Slider(p) => {
                let n = value.as_number().ok_or_else(|| mismatch("a number"))?;
                p.set_value(n)?;
            }
            UserParam::Checkbox(p) => {
                p.value = value.as_bool().ok_or_else(|| mismatch("true or false"))?;
            }
            UserParam::Choice(p) => {
                if !p.choices.contains(&value) {
                    return Err(mismatch("one of its choices"));
                }
                p.value = value;
            }
            UserParam::StaticText(_) => {
                return Err(SimError::range("static text is not adjustable"));
            }
        }
        Ok(())
    }

    fn validate(&self) -> SimResult<()> {
        match self {
            UserParam::NumberInput(p) if !p.value.is_finite() => Err(SimError::range(format!(
                "number input {}: value must be finite, got {}",
                p.label, p.value
            ))),
            UserParam::Slider(p) => p.validate(),
            UserParam::Choice(p) => p.validate(),
            _ => Ok(()),
        }
    }

    pub fn to_json(&self) -> Value {
        let (mut out, description) = match self {
            UserParam::NumberInput(p) => (
                json!({ "type": self.kind(), "label": p.label, "value": p.value }),
                &p.description,
            ),
            UserParam::Slider(p) => (
                json!({
                    "type": self.kind(),
                    "label": p.label,
                    "value": p.value,
                    "min_value": p.min_value,
                    "max_value": p.max_value,
                    "step": p.step,
                }),
                &p.description,
            ),
            UserParam::Checkbox(p) => (
                json!({ "type": self.kind(), "label": p.label, "value": p.value }),
                &p.description,
            ),
            UserParam::Choice(p) => (
                json!({
                    "type": self.kind(),
                    "label": p.label,
                    "value": p.value,
                    "choices": p.choices,
                }),
                &p.description,
            ),
            UserParam::StaticText(p) => {
                return json!({ "type": self.kind(), "value": p.value });
            }
        };
        if let (Some(text), Some(map)) = (description, out.as_object_mut()) {
            map.insert("description".into(), Value::String(text.clone()));
        }
        out
    }

    /// Decode and re-validate a descriptor.
    pub fn from_json(value: &Value) -> SimResult<Self> {
        let param: UserParam = serde_json::from_value(value.clone())
            .map_err(|e| SimError::range(format!("invalid parameter descriptor: {}", e)))?;
        param.validate()?;
        Ok(param)
    }
}

impl Serialize for UserParam {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// A model constructor argument: either a plain value or a descriptor the
/// user can adjust.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelParam {
    Fixed(Scalar),
    User(UserParam),
}

impl From<UserParam> for ModelParam {
    fn from(p: UserParam) -> Self {
        ModelParam::User(p)
    }
}

impl From<Scalar> for ModelParam {
    fn from(v: Scalar) -> Self {
        ModelParam::Fixed(v)
    }
}

impl From<i32> for ModelParam {
    fn from(v: i32) -> Self {
        ModelParam::Fixed(v.into())
    }
}

impl From<bool> for ModelParam {
    fn from(v: bool) -> Self {
        ModelParam::Fixed(v.into())
    }
}

impl From<&str> for ModelParam {
    fn from(v: &str) -> Self {
        ModelParam::Fixed(v.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamRegistry {
    params: BTreeMap<String, ModelParam>,
}

impl ParamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, param: impl Into<ModelParam>) -> Self {
        self.insert(name, param);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, param: impl Into<ModelParam>) {
        self.params.insert(name.into(), param.into());
    }

    pub fn get(&self, name: &str) -> Option<&ModelParam> {
        self.params.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModelParam)> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Values to construct a model with: fixed values as-is, adjustable ones
    /// at their current value.
    pub fn values(&self) -> ModelParams {
        self.params
            .iter()
            .filter_map(|(name, param)| {
                let value = match param {
                    ModelParam::Fixed(v) => Some(v.clone()),
                    ModelParam::User(p) => p.value(),
                };
                value.map(|v| (name.clone(), v))
            })
            .collect()
    }

    /// JSON for every adjustable parameter, keyed by name.
    pub fn user_params(&self) -> BTreeMap<String, Value> {
        self.params
            .iter()
            .filter_map(|(name, param)| match param {
                ModelParam::User(p) => Some((name.clone(), p.to_json())),
                ModelParam::Fixed(_) => None,
            })
            .collect()
    }

    /// Change one parameter. Adjustable ones go through their own checks,
    /// fixed ones are replaced.
    pub fn set_value(&mut self, name: &str, value: Scalar) -> SimResult<()> {
        let param = self
            .params
            .get_mut(name)
            .ok_or_else(|| SimError::UnknownParam(name.to_string()))?;
        match param {
            ModelParam::User(p) => p.set_value(value),
            ModelParam::Fixed(v) => {
                *v = value;
                Ok(())
            }
        }
    }

    /// Apply command-line or config overrides. Known names go through
    /// `set_value`; unknown names are added as fixed values.
    pub fn apply_overrides(&mut self, overrides: &ModelParams) -> SimResult<()> {
        for (name, value) in overrides.iter() {
            if self.params.contains_key(name) {
                self.set_value(name, value.clone())?;
            } else {
                self.insert(name.clone(), ModelParam::Fixed(value.clone()));
            }
        }
        Ok(())
    }

    /// Values with `overrides` applied, leaving the registry unchanged.
    pub fn resolve_with(&self, overrides: &ModelParams) -> SimResult<ModelParams> {
        let mut resolved = self.clone();
        resolved.apply_overrides(overrides)?;
        Ok(resolved.values())
    }
}
