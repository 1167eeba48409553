use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level engine configuration (loaded from axc.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AxcConfig {
    pub logging: LoggingConfig,
    pub keywrap: KeyWrapConfig,
    pub pipeline: PipelineConfig,
    pub naming: NamingConfig,
}

impl AxcConfig {
    /// Read and parse a TOML config file. Missing sections take defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file: {}", path.display()))?;
        let config: AxcConfig = toml::from_str(&text)
            .with_context(|| format!("parsing config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pipeline.buffer_size == 0 || self.pipeline.buffer_size % 16 != 0 {
            anyhow::bail!(
                "pipeline.buffer_size must be a non-zero multiple of 16, got {}",
                self.pipeline.buffer_size
            );
        }
        if self.keywrap.minimum_iterations < 6 {
            anyhow::bail!(
                "keywrap.minimum_iterations must be at least 6, got {}",
                self.keywrap.minimum_iterations
            );
        }
        if self.keywrap.calibration_iterations == 0 {
            anyhow::bail!("keywrap.calibration_iterations must be non-zero");
        }
        if self.naming.suffix.is_empty() || self.naming.suffix.contains('.') {
            anyhow::bail!(
                "naming.suffix must be a bare extension without dots, got {:?}",
                self.naming.suffix
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter when RUST_LOG is unset (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Key-wrap cost tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyWrapConfig {
    /// Wall-clock time a single key wrap should take (default: 100ms)
    pub target_millis: u64,
    /// Iteration floor regardless of measured speed (default: 20000)
    pub minimum_iterations: u32,
    /// Iterations timed during calibration (default: 2000)
    pub calibration_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Streaming chunk size in bytes; progress and cancellation are observed
    /// at this granularity (default: 64 KiB)
    pub buffer_size: usize,
    /// zstd level used when compression is requested (default: 3)
    pub compression_level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Extension appended to encrypted file names (default: axx)
    pub suffix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for KeyWrapConfig {
    fn default() -> Self {
        Self {
            target_millis: 100,
            minimum_iterations: 20_000,
            calibration_iterations: 2_000,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,
            compression_level: 3,
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            suffix: "axx".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[logging]
level = "debug"
format = "json"

[keywrap]
target_millis = 250
minimum_iterations = 50000
calibration_iterations = 500

[pipeline]
buffer_size = 4096
compression_level = 9

[naming]
suffix = "vault"
"#;
        let config: AxcConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.keywrap.target_millis, 250);
        assert_eq!(config.keywrap.minimum_iterations, 50000);
        assert_eq!(config.keywrap.calibration_iterations, 500);
        assert_eq!(config.pipeline.buffer_size, 4096);
        assert_eq!(config.pipeline.compression_level, 9);
        assert_eq!(config.naming.suffix, "vault");
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_defaults() {
        let config: AxcConfig = toml::from_str("").unwrap();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.keywrap.target_millis, 100);
        assert_eq!(config.keywrap.minimum_iterations, 20_000);
        assert_eq!(config.pipeline.buffer_size, 64 * 1024);
        assert_eq!(config.naming.suffix, "axx");
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[pipeline]
compression_level = 1
"#;
        let config: AxcConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.pipeline.compression_level, 1);
        // Defaults
        assert_eq!(config.pipeline.buffer_size, 64 * 1024);
        assert_eq!(config.keywrap.minimum_iterations, 20_000);
    }

    #[test]
    fn test_validate_rejects_unaligned_buffer() {
        let mut config = AxcConfig::default();
        config.pipeline.buffer_size = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_low_iteration_floor() {
        let mut config = AxcConfig::default();
        config.keywrap.minimum_iterations = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[naming]\nsuffix = \"enc\"").unwrap();

        let config = AxcConfig::load(file.path()).unwrap();
        assert_eq!(config.naming.suffix, "enc");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = AxcConfig::load(&dir.path().join("absent.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = AxcConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: AxcConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.keywrap.target_millis, parsed.keywrap.target_millis);
        assert_eq!(config.pipeline.buffer_size, parsed.pipeline.buffer_size);
        assert_eq!(config.naming.suffix, parsed.naming.suffix);
    }
}
