use super::CompositorConfig;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of configuration snapshots, polled by the render loop once per
/// tick. Implementations decide where the snapshot comes from; the loop only
/// ever sees the latest value.
pub trait ConfigProvider {
    fn snapshot(&mut self) -> CompositorConfig;
}

/// Fixed configuration assembled once from CLI flags.
pub struct StaticConfig {
    config: CompositorConfig,
}

impl StaticConfig {
    pub fn new(config: CompositorConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }
}

impl ConfigProvider for StaticConfig {
    fn snapshot(&mut self) -> CompositorConfig {
        self.config.clone()
    }
}

/// Configuration backed by a flat JSON file, re-read whenever the file
/// changes on disk. A missing or malformed file keeps the last good snapshot
/// so a half-saved edit never blanks the bubble mid-session.
pub struct JsonFileConfig {
    path: PathBuf,
    current: CompositorConfig,
    fingerprint: Option<(SystemTime, u64)>,
}

impl JsonFileConfig {
    pub fn new(path: PathBuf) -> Self {
        let mut provider = Self {
            path,
            current: CompositorConfig::default(),
            fingerprint: None,
        };
        match provider.read_file() {
            Ok(config) => {
                provider.current = config;
                provider.fingerprint = provider.current_fingerprint();
            }
            Err(err) => {
                tracing::warn!("using default config: {err:#}");
            }
        }
        provider
    }

    fn read_file(&mut self) -> Result<CompositorConfig, ConfigError> {
        let data = fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        let config: CompositorConfig =
            serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(config.normalized())
    }

    /// Cheap change check: modification time plus file length. Either moving
    /// means the settings were re-saved.
    fn current_fingerprint(&self) -> Option<(SystemTime, u64)> {
        let meta = fs::metadata(&self.path).ok()?;
        Some((meta.modified().ok()?, meta.len()))
    }
}

impl ConfigProvider for JsonFileConfig {
    fn snapshot(&mut self) -> CompositorConfig {
        let fingerprint = self.current_fingerprint();
        if fingerprint != self.fingerprint {
            self.fingerprint = fingerprint;
            match self.read_file() {
                Ok(config) => {
                    if config != self.current {
                        tracing::info!("config reloaded from {}", self.path.display());
                        self.current = config;
                    }
                }
                Err(err) => {
                    tracing::warn!("keeping previous config: {err:#}");
                }
            }
        }
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BubbleShape, ZOOM_MAX};
    use std::io::Write;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("bubblecam-{}-{}", std::process::id(), name));
        path
    }

    #[test]
    fn static_provider_normalizes_once() {
        let mut provider = StaticConfig::new(CompositorConfig {
            zoom_factor: 9.0,
            ..CompositorConfig::default()
        });
        assert_eq!(provider.snapshot().zoom_factor, ZOOM_MAX);
    }

    #[test]
    fn file_provider_loads_initial_snapshot() {
        let path = temp_path("load.json");
        fs::write(
            &path,
            "{\"shape\": \"rounded-rect\", \"zoom_factor\": 1.5}",
        )
        .unwrap();

        let mut provider = JsonFileConfig::new(path.clone());
        let config = provider.snapshot();
        assert_eq!(config.shape, BubbleShape::RoundedRect);
        assert_eq!(config.zoom_factor, 1.5);

        fs::remove_file(path).ok();
    }

    #[test]
    fn file_provider_defaults_when_file_missing() {
        let mut provider = JsonFileConfig::new(temp_path("missing.json"));
        assert_eq!(provider.snapshot(), CompositorConfig::default());
    }

    #[test]
    fn file_provider_keeps_last_good_on_parse_failure() {
        let path = temp_path("garbage.json");
        fs::write(&path, "{\"zoom_factor\": 2.0}").unwrap();

        let mut provider = JsonFileConfig::new(path.clone());
        assert_eq!(provider.snapshot().zoom_factor, 2.0);

        // Overwrite with garbage of a different length so the fingerprint
        // definitely changes even on coarse mtime filesystems.
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"{ this is not json at all }").unwrap();
        drop(file);

        assert_eq!(provider.snapshot().zoom_factor, 2.0);

        fs::remove_file(path).ok();
    }

    #[test]
    fn file_provider_picks_up_rewrites() {
        let path = temp_path("reload.json");
        fs::write(&path, "{\"zoom_factor\": 1.0}").unwrap();

        let mut provider = JsonFileConfig::new(path.clone());
        assert_eq!(provider.snapshot().zoom_factor, 1.0);

        fs::write(&path, "{\"zoom_factor\": 2.25}").unwrap();
        assert_eq!(provider.snapshot().zoom_factor, 2.25);

        fs::remove_file(path).ok();
    }
}
