pub mod check;
pub mod compile;
pub mod locate;
pub mod probe;
pub mod render;
pub mod validate;

use std::path::Path;

use reelcut_common::AppConfig;
use reelcut_edit_model::EditSpec;

/// Config from `path`, or the standard location when unset.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read config {}: {e}", path.display()))?;
            serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {e}", path.display()))
        }
        None => Ok(AppConfig::load()),
    }
}

pub fn load_spec(path: &Path) -> anyhow::Result<EditSpec> {
    EditSpec::load(path).map_err(|e| anyhow::anyhow!("Failed to load edit spec: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"render": {"fps": 24}}"#).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.render.fps, 24);
        assert_eq!(config.render.default_width, 1920);

        assert!(load_config(Some(&dir.path().join("missing.json"))).is_err());
    }
}
