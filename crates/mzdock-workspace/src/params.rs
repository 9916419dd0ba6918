//! Per-workspace parameter file.
//!
//! The file is a flat JSON object. Known keys are typed fields of
//! [`Parameters`]; keys owned by other tools ride along in `extra` so a save
//! never drops them. Values set during the session live in
//! [`ParameterOverrides`] and win over the loaded values when saving.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use mzdock_core::{atomic_write_json_pretty, DockError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::workspace::WorkspaceHandle;

const DEFAULT_PARAMS: &str = include_str!("../assets/default-params.json");
const DEFAULTS_SOURCE: &str = "<built-in default parameters>";
const OVERRIDES_SOURCE: &str = "<session overrides>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Svg,
    Png,
    Jpeg,
    Webp,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImageFormat::Svg => "svg",
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Parameters {
    /// Export format for figures.
    #[serde(default)]
    pub image_format: ImageFormat,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Parameters {
    pub fn defaults() -> Result<Self> {
        serde_json::from_str(DEFAULT_PARAMS)
            .map_err(|e| DockError::config_read(Path::new(DEFAULTS_SOURCE), e))
    }
}

/// Values the user changed during the current session, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterOverrides {
    values: BTreeMap<String, Value>,
}

impl ParameterOverrides {
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Parses a `key=value` binding. The value is read as JSON when it parses,
    /// otherwise kept as a plain string.
    pub fn set_binding(&mut self, raw: &str) -> Result<()> {
        let (key, val_raw) = raw.split_once('=').ok_or_else(|| {
            DockError::config_read(
                Path::new(OVERRIDES_SOURCE),
                format!("invalid binding '{}': expected key=value", raw),
            )
        })?;
        if key.trim().is_empty() {
            return Err(DockError::config_read(
                Path::new(OVERRIDES_SOURCE),
                format!("invalid binding '{}': key cannot be empty", raw),
            ));
        }
        let parsed =
            serde_json::from_str::<Value>(val_raw).unwrap_or(Value::String(val_raw.to_string()));
        self.set(key.trim(), parsed);
        Ok(())
    }
}

/// Reads the workspace's parameter file, or the built-in defaults when the
/// file is missing or `use_default` is set. A file that exists but does not
/// hold a valid parameter object is an error.
pub fn load(workspace: &WorkspaceHandle, use_default: bool) -> Result<Parameters> {
    let path = workspace.params_path();
    if use_default || !path.exists() {
        debug!(workspace = %workspace.name(), "using default parameters");
        return Parameters::defaults();
    }
    let raw = fs::read_to_string(&path).map_err(|e| DockError::io(&path, e))?;
    serde_json::from_str(&raw).map_err(|e| DockError::config_read(&path, e))
}

/// Applies session overrides to every key `params` already has.
pub fn merge_overrides(params: &Parameters, overrides: &ParameterOverrides) -> Result<Parameters> {
    let mut doc = serde_json::to_value(params)
        .map_err(|e| DockError::config_read(Path::new(OVERRIDES_SOURCE), e))?;
    if let Value::Object(map) = &mut doc {
        apply_known_keys(map, overrides);
    }
    serde_json::from_value(doc).map_err(|e| DockError::config_read(Path::new(OVERRIDES_SOURCE), e))
}

fn apply_known_keys(map: &mut Map<String, Value>, overrides: &ParameterOverrides) {
    for (key, value) in map.iter_mut() {
        if let Some(over) = overrides.get(key) {
            *value = over.clone();
        }
    }
}

/// Merges overrides into `params` and fully overwrites the parameter file.
pub fn save(
    workspace: &WorkspaceHandle,
    params: &Parameters,
    overrides: &ParameterOverrides,
) -> Result<Parameters> {
    let merged = merge_overrides(params, overrides)?;
    atomic_write_json_pretty(&workspace.params_path(), &merged)?;
    info!(workspace = %workspace.name(), image_format = %merged.image_format, "parameters saved");
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn scratch_workspace(tag: &str) -> WorkspaceHandle {
        let root = std::env::temp_dir().join(format!(
            "mzdock_params_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        let ws = WorkspaceHandle::new(&root, "default");
        fs::create_dir_all(ws.path()).expect("workspace dir");
        ws
    }

    #[test]
    fn missing_file_loads_defaults() {
        let ws = scratch_workspace("defaults");
        let params = load(&ws, false).expect("defaults");
        assert_eq!(params.image_format, ImageFormat::Svg);
        assert!(params.extra.is_empty());
        let _ = fs::remove_dir_all(ws.path().parent().expect("root"));
    }

    #[test]
    fn session_override_wins_over_stale_file_value() {
        let ws = scratch_workspace("override");
        fs::write(ws.params_path(), r#"{"image-format": "svg"}"#).expect("seed");
        let params = load(&ws, false).expect("load");

        let mut overrides = ParameterOverrides::default();
        overrides.set("image-format", json!("png"));
        save(&ws, &params, &overrides).expect("save");

        let on_disk: Value =
            serde_json::from_str(&fs::read_to_string(ws.params_path()).expect("read"))
                .expect("json");
        assert_eq!(on_disk["image-format"], json!("png"));
        assert_eq!(load(&ws, false).expect("reload").image_format, ImageFormat::Png);
        assert_eq!(load(&ws, true).expect("defaults").image_format, ImageFormat::Svg);
        let _ = fs::remove_dir_all(ws.path().parent().expect("root"));
    }

    #[test]
    fn overrides_for_unknown_keys_are_not_added() {
        let params = Parameters::default();
        let mut overrides = ParameterOverrides::default();
        overrides.set("chosen-workspace", json!("other"));
        let merged = merge_overrides(&params, &overrides).expect("merge");
        assert!(!merged.extra.contains_key("chosen-workspace"));
    }

    #[test]
    fn foreign_keys_survive_a_save() {
        let ws = scratch_workspace("extra");
        fs::write(
            ws.params_path(),
            r#"{"image-format": "jpeg", "controllo": true}"#,
        )
        .expect("seed");
        let params = load(&ws, false).expect("load");
        let mut overrides = ParameterOverrides::default();
        overrides.set("controllo", json!(false));
        let merged = save(&ws, &params, &overrides).expect("save");
        assert_eq!(merged.image_format, ImageFormat::Jpeg);
        assert_eq!(merged.extra.get("controllo"), Some(&json!(false)));
        let _ = fs::remove_dir_all(ws.path().parent().expect("root"));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let ws = scratch_workspace("malformed");
        fs::write(ws.params_path(), "{ not json").expect("seed");
        let err = load(&ws, false).expect_err("malformed");
        assert!(matches!(err, DockError::ConfigRead { .. }));

        fs::write(ws.params_path(), r#"{"image-format": "bmp"}"#).expect("seed");
        assert!(load(&ws, false).is_err());
        let _ = fs::remove_dir_all(ws.path().parent().expect("root"));
    }

    #[test]
    fn bindings_parse_json_or_fall_back_to_string() {
        let mut overrides = ParameterOverrides::default();
        overrides.set_binding("image-format=png").expect("plain");
        overrides.set_binding("threshold=0.5").expect("json");
        assert_eq!(overrides.get("image-format"), Some(&json!("png")));
        assert_eq!(overrides.get("threshold"), Some(&json!(0.5)));
        assert!(overrides.set_binding("novalue").is_err());
        assert!(overrides.set_binding("=x").is_err());
    }

    #[test]
    fn invalid_override_type_is_rejected() {
        let mut overrides = ParameterOverrides::default();
        overrides.set("image-format", json!(3));
        assert!(merge_overrides(&Parameters::default(), &overrides).is_err());
    }
}
