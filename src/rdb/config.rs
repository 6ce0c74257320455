//! Extractor configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::util::Result;

/// Options controlling how files are opened and read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Memory map files instead of buffered reads
    pub use_mmap: bool,
    /// Report missing files as errors (otherwise skipped with a warning)
    pub must_exist: bool,
    /// Buffer a whole time step per container on first access
    pub pre_read: bool,
    /// Log each distinct failed lookup once as it happens
    pub log_lookup_misses: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            use_mmap: cfg!(feature = "mmap"),
            must_exist: true,
            pre_read: false,
            log_lookup_misses: true,
        }
    }
}

impl ExtractorConfig {
    /// Load from a JSON file. Missing keys take their default.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Error;

    #[test]
    fn test_partial_json() {
        let c = ExtractorConfig::from_json(r#"{ "pre_read": true }"#).unwrap();
        assert!(c.pre_read);
        assert!(c.must_exist);
        assert!(c.log_lookup_misses);
    }

    #[test]
    fn test_round_trip_and_errors() {
        let c = ExtractorConfig { use_mmap: false, ..Default::default() };
        assert_eq!(ExtractorConfig::from_json(&c.to_json().unwrap()).unwrap(), c);

        assert!(matches!(ExtractorConfig::from_json(r#"{ "pre_read": 3 }"#), Err(Error::Json(_))));
        assert!(matches!(ExtractorConfig::from_json("{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rdb.json");
        std::fs::write(&path, r#"{ "use_mmap": false }"#).unwrap();
        assert!(!ExtractorConfig::load(&path).unwrap().use_mmap);
    }
}
