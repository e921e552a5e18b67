// Backend boundary: consumes the rewritten source and analysis metadata.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::{PrepassError, Result};
use crate::pipeline::AnalysisMetadata;

/// Optimizer settings forwarded to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendConfig {
    /// Optimizer iteration count
    pub runs: u32,
    pub yul_details: bool,
    pub inliner: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            runs: 200,
            yul_details: false,
            inliner: false,
        }
    }
}

impl BackendConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Trait for all code generators fed by the prepass
pub trait Backend {
    fn name(&self) -> &'static str;

    /// Produce intermediate representation text
    fn compile(
        &self,
        source: &str,
        metadata: &AnalysisMetadata,
        config: &BackendConfig,
    ) -> Result<String>;
}

/// Emits the compile request as a JSON document
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonBackend;

impl Backend for JsonBackend {
    fn name(&self) -> &'static str {
        "json"
    }

    fn compile(
        &self,
        source: &str,
        metadata: &AnalysisMetadata,
        config: &BackendConfig,
    ) -> Result<String> {
        if source.trim().is_empty() {
            return Err(PrepassError::Backend("empty source".to_string()));
        }
        let document = json!({
            "mainContract": metadata.main_contract,
            "settings": {
                "optimizer": {
                    "runs": config.runs,
                    "details": {
                        "yul": config.yul_details,
                        "inliner": config.inliner,
                    },
                },
            },
            "source": source,
            "metadata": metadata,
        });
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: BackendConfig = serde_json::from_str(r#"{"yulDetails": true}"#).unwrap();
        assert_eq!(
            config,
            BackendConfig {
                runs: 200,
                yul_details: true,
                inliner: false
            }
        );
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"runs": 1000, "inliner": true}}"#).unwrap();
        let config = BackendConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.runs, 1000);
        assert!(config.inliner);
        assert!(!config.yul_details);
    }

    #[test]
    fn test_json_backend_document() {
        let metadata = AnalysisMetadata {
            main_contract: "A".to_string(),
            ..AnalysisMetadata::default()
        };
        let ir = JsonBackend
            .compile("contract A {}", &metadata, &BackendConfig::default())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&ir).unwrap();
        assert_eq!(value["mainContract"], "A");
        assert_eq!(value["settings"]["optimizer"]["runs"], 200);
        assert_eq!(value["source"], "contract A {}");
        assert!(value["metadata"]["marked_functions"]["entries"].is_array());
    }

    #[test]
    fn test_json_backend_rejects_empty_source() {
        let err = JsonBackend
            .compile("  ", &AnalysisMetadata::default(), &BackendConfig::default())
            .unwrap_err();
        assert!(matches!(err, PrepassError::Backend(_)));
    }
}
