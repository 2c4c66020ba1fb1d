use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::modules::activation::Activation;
use crate::modules::model::ModelParams;

pub const DEFAULT_CONFIG_FILE: &str = "gridsim.json";

/// Settings for a command-line run. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub steps: u64,
    pub seed: Option<u64>,
    pub activation: Option<Activation>,
    pub params: ModelParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            steps: 10,
            seed: None,
            activation: None,
            params: ModelParams::new(),
        }
    }
}

impl RunConfig {
    /// Model parameter overrides: the free-form `params` table with the
    /// dedicated fields layered on top.
    pub fn overrides(&self) -> ModelParams {
        let mut out = self.params.clone();
        if let Some(width) = self.width {
            out.insert("width", width as i64);
        }
        if let Some(height) = self.height {
            out.insert("height", height as i64);
        }
        if let Some(seed) = self.seed {
            out.insert("seed", seed as i64);
        }
        if let Some(activation) = self.activation {
            out.insert("activation", activation.label());
        }
        out
    }
}

/// Missing or empty files load as defaults.
pub fn load_config(path: &Path) -> io::Result<RunConfig> {
    if !path.exists() {
        return Ok(RunConfig::default());
    }

    let bytes = fs::read(path)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunConfig::default());
    }

    serde_json::from_slice(&bytes).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "failed to parse config file {}; fix it or run `gridsim init --force` to rewrite it: {}",
                path.display(),
                e
            ),
        )
    })
}

pub fn save_config(path: &Path, config: &RunConfig) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_vec_pretty(config)?;
    fs::write(path, json)?;
    Ok(())
}
