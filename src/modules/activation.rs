use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How the scheduler walks its agents within one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Every agent computes against pre-tick state, then all commit.
    #[default]
    Simultaneous,
    /// Compute and commit one agent at a time in registration order.
    Sequential,
    /// Like `Sequential`, in a freshly shuffled order each tick.
    Random,
}

impl Activation {
    pub const fn label(self) -> &'static str {
        match self {
            Activation::Simultaneous => "simultaneous",
            Activation::Sequential => "sequential",
            Activation::Random => "random",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Activation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simultaneous" | "staged" => Ok(Activation::Simultaneous),
            "sequential" | "base" => Ok(Activation::Sequential),
            "random" | "shuffled" => Ok(Activation::Random),
            _ => Err(()),
        }
    }
}
