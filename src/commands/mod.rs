use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use gridsim::{
    Activation, ModelParams, RunConfig, Scalar,
    config::{self, DEFAULT_CONFIG_FILE},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod params;
mod run;

use params::run_params;
use run::run_simulation;

#[derive(Parser)]
#[command(
    name = "gridsim",
    version,
    about = "Grid agent simulation runner (demo model, JSON frames)",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a default run config file
    Init {
        /// Where to write the config
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Build the demo model, step it and print render frames as JSON
    Run {
        #[command(flatten)]
        options: RunOptions,
        /// Print a frame after every step instead of only the last one
        #[arg(long)]
        every: bool,
    },
    /// Print the adjustable parameters as JSON
    Params {
        #[command(flatten)]
        options: RunOptions,
    },
}

/// Flags shared by `run` and `params`. Flags win over the config file.
#[derive(Args, Clone, Debug)]
pub struct RunOptions {
    /// Run config file (missing file means defaults)
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Grid width in cells
    #[arg(long)]
    width: Option<usize>,
    /// Grid height in cells
    #[arg(long)]
    height: Option<usize>,
    /// Number of ticks to run
    #[arg(short = 't', long)]
    steps: Option<u64>,
    /// RNG seed for placement and random activation
    #[arg(long)]
    seed: Option<u64>,
    /// Agent activation order within a tick
    #[arg(long, value_enum)]
    activation: Option<Activation>,
    /// Model parameter override, repeatable
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE")]
    params: Vec<ParamArg>,
}

impl RunOptions {
    fn resolve(&self) -> Result<RunConfig, String> {
        let mut cfg = config::load_config(&self.config).map_err(|e| e.to_string())?;
        for ParamArg(name, value) in &self.params {
            cfg.params.insert(name.clone(), value.clone());
        }
        cfg.width = self.width.or(cfg.width);
        cfg.height = self.height.or(cfg.height);
        cfg.steps = self.steps.unwrap_or(cfg.steps);
        cfg.seed = self.seed.or(cfg.seed);
        cfg.activation = self.activation.or(cfg.activation);
        Ok(cfg)
    }
}

#[derive(Clone, Debug)]
pub struct ParamArg(pub String, pub Scalar);

impl FromStr for ParamArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once('=')
            .ok_or("Param must be formatted as name=value")?;
        let name = name.trim();
        if name.is_empty() {
            return Err("Param name must not be empty".into());
        }
        Ok(ParamArg(name.to_string(), value.parse::<Scalar>()?))
    }
}

pub fn run() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli.command) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn dispatch(command: Command) -> Result<(), String> {
    match command {
        Command::Init { config, force } => run_init(&config, force),
        Command::Run { options, every } => {
            let cfg = options.resolve()?;
            run_simulation(&cfg, every)
        }
        Command::Params { options } => {
            let cfg = options.resolve()?;
            run_params(&cfg.overrides())
        }
    }
}

fn run_init(path: &Path, force: bool) -> Result<(), String> {
    if path.exists() && !force {
        return Err(format!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        ));
    }
    let cfg = RunConfig {
        params: ModelParams::new().with("density", 0.3).with("rest_chance", 25),
        ..RunConfig::default()
    };
    config::save_config(path, &cfg).map_err(|e| e.to_string())?;
    info!(path = %path.display(), "config written");
    println!("Initialized run config at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_arg_parses_typed_values() {
        let ParamArg(name, value) = "density=0.5".parse().unwrap();
        assert_eq!(name, "density");
        assert_eq!(value, Scalar::from(0.5));

        let ParamArg(_, value) = "torus = false".parse().unwrap();
        assert_eq!(value, Scalar::from(false));
    }

    #[test]
    fn param_arg_requires_a_name() {
        assert!("density".parse::<ParamArg>().is_err());
        assert!("=3".parse::<ParamArg>().is_err());
    }

    #[test]
    fn flags_override_config_values() {
        let cli = Cli::try_parse_from([
            "gridsim",
            "run",
            "--config",
            "/nonexistent/gridsim.json",
            "--width",
            "8",
            "-t",
            "3",
            "--activation",
            "random",
            "-p",
            "density=0.9",
        ])
        .unwrap();
        let Command::Run { options, every } = cli.command else {
            panic!("expected run");
        };
        assert!(!every);
        let cfg = options.resolve().unwrap();
        assert_eq!(cfg.width, Some(8));
        assert_eq!(cfg.steps, 3);
        assert_eq!(cfg.activation, Some(Activation::Random));
        assert_eq!(cfg.params.get("density"), Some(&Scalar::from(0.9)));
    }
}
