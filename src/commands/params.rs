use gridsim::{ModelParams, demo};

/// Print the demo's adjustable parameters, with overrides applied, as one
/// pretty JSON object keyed by name.
pub(super) fn run_params(overrides: &ModelParams) -> Result<(), String> {
    let mut registry = demo::demo_registry().map_err(|e| e.to_string())?;
    registry
        .apply_overrides(overrides)
        .map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&registry.user_params()).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}
