//! Marker-code → display-glyph table.
//!
//! Resolved once at process start (`config/markers.json` when present,
//! built-in defaults otherwise), then passed around by reference and never
//! mutated. Served verbatim at `/api/markers` and consulted by the markdown
//! renderer.

use std::collections::BTreeMap;
use std::path::Path;

/// Immutable marker lookup table.
#[derive(Debug, Clone)]
pub struct MarkerTable {
    map: BTreeMap<String, String>,
}

impl MarkerTable {
    /// Load the table from `<config_dir>/markers.json`, falling back to the
    /// built-in defaults when the file is missing or unreadable.
    pub fn load(config_dir: &Path) -> Self {
        let path = config_dir.join("markers.json");
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(map) => {
                    log::info!("Loaded {} marker glyphs from {:?}", map.len(), path);
                    MarkerTable { map }
                }
                Err(e) => {
                    log::warn!("Invalid markers.json at {:?}: {}. Using defaults.", path, e);
                    MarkerTable::default()
                }
            },
            Err(_) => {
                log::debug!("No markers.json at {:?}, using built-in table", path);
                MarkerTable::default()
            }
        }
    }

    /// Map a marker code to its glyph; unknown markers pass through verbatim
    /// (the answering UI may already have stored a glyph).
    pub fn resolve<'a>(&'a self, marker: &'a str) -> &'a str {
        self.map.get(marker).map(String::as_str).unwrap_or(marker)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.map
    }
}

impl Default for MarkerTable {
    fn default() -> Self {
        let map = [
            ("\\idea", "💡"),
            ("\\done", "✅"),
            ("\\later", "⏰"),
            ("\\no", "❌"),
            ("\\yes", "✅"),
            ("\\maybe", "🤔"),
            ("\\important", "⚠️"),
            ("\\question", "❓"),
            ("\\love", "❤️"),
            ("\\star", "⭐"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        MarkerTable { map }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_known_and_unknown() {
        let table = MarkerTable::default();
        assert_eq!(table.resolve("\\idea"), "💡");
        // unknown codes and raw glyphs pass through
        assert_eq!(table.resolve("🎉"), "🎉");
        assert_eq!(table.resolve("\\nope"), "\\nope");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let table = MarkerTable::load(dir.path());
        assert!(!table.as_map().is_empty());
        assert_eq!(table.resolve("\\star"), "⭐");
    }

    #[test]
    fn test_load_override_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("markers.json"), r#"{"\\go": "🚀"}"#).unwrap();
        let table = MarkerTable::load(dir.path());
        assert_eq!(table.resolve("\\go"), "🚀");
        assert_eq!(table.as_map().len(), 1);
    }
}
