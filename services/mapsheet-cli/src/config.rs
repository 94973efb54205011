//! CLI-level configuration: resolving the `Parameters` a `create`
//! invocation should attach, layering environment overrides
//! (`mapsheet_core::config::Parameters::from_env`) under an optional
//! JSON overrides file, env-first-then-file.

use std::path::Path;

use anyhow::{Context, Result};
use mapsheet_core::Parameters;

/// Start from `MAPSHEET_*` environment overrides, then apply a JSON
/// object's fields on top if `overrides_path` is given. The JSON file
/// need only name the fields it wants to change; everything else keeps
/// its environment-resolved value.
pub fn load_parameters(overrides_path: Option<&Path>) -> Result<Parameters> {
    let mut params = Parameters::from_env();
    if let Some(path) = overrides_path {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading parameter overrides {}", path.display()))?;
        let overrides: serde_json::Value =
            serde_json::from_str(&text).context("parsing parameter overrides as JSON")?;
        let mut base = serde_json::to_value(&params).context("encoding default parameters")?;
        merge_json(&mut base, &overrides);
        params = serde_json::from_value(base).context("applying parameter overrides")?;
    }
    params.validate().context("validating resolved parameters")?;
    Ok(params)
}

fn merge_json(base: &mut serde_json::Value, overrides: &serde_json::Value) {
    if let (Some(base_obj), Some(overrides_obj)) = (base.as_object_mut(), overrides.as_object()) {
        for (key, value) in overrides_obj {
            base_obj.insert(key.clone(), value.clone());
        }
    }
}
