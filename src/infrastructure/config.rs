// Application configuration: config/dashboard.toml layered with DASHBOARD__* env vars
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub sources: SourceSettings,
    pub display: DisplaySettings,
    pub analysis: AnalysisSettings,
    pub playback: PlaybackSettings,
    pub brush: BrushSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Where catalog and signal data come from, in the order they are tried.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceSettings {
    pub processed_dir: PathBuf,
    pub raw_dir: PathBuf,
    pub remote_enabled: bool,
    pub remote_base_url: String,
    pub request_timeout_secs: u64,
    /// Parse the case list off the async runtime.
    pub parse_worker: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            processed_dir: PathBuf::from("data/processed"),
            raw_dir: PathBuf::from("data"),
            remote_enabled: true,
            remote_base_url: "https://api.vitaldb.net".to_string(),
            request_timeout_secs: 30,
            parse_worker: true,
        }
    }
}

impl SourceSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplaySettings {
    pub overview_points: usize,
    pub detailed_points: usize,
    pub brush_points: usize,
    /// Row count above which signal CSV is converted in chunks.
    pub progressive_threshold: usize,
    pub progressive_chunk: usize,
    /// Shorter windows are replaced by synthetic data.
    pub min_signal_points: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            overview_points: 500,
            detailed_points: 2000,
            brush_points: 300,
            progressive_threshold: 10_000,
            progressive_chunk: 5_000,
            min_signal_points: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisSettings {
    pub anomaly: AnomalySettings,
    pub annotation_sensitivity: f64,
    pub moving_average_windows: Vec<f64>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            anomaly: AnomalySettings::default(),
            annotation_sensitivity: 50.0,
            moving_average_windows: vec![60.0, 300.0],
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnomalySettings {
    pub window_seconds: f64,
    pub min_points: usize,
    pub warning_sigma: f64,
    pub critical_sigma: f64,
    pub dedup_seconds: f64,
}

impl Default for AnomalySettings {
    fn default() -> Self {
        Self {
            window_seconds: 10.0,
            min_points: 3,
            warning_sigma: 2.0,
            critical_sigma: 3.0,
            dedup_seconds: 2.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlaybackSettings {
    pub tick_millis: u64,
    /// Seconds of signal time advanced per tick at speed 1.
    pub step_seconds: f64,
    pub jump_seconds: f64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_millis: 50,
            step_seconds: 1.5,
            jump_seconds: 5.0,
        }
    }
}

impl PlaybackSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BrushSettings {
    pub throttle_millis: u64,
    /// Snap distance as a fraction of the overview timeline.
    pub snap_fraction: f64,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            throttle_millis: 50,
            snap_fraction: 0.02,
        }
    }
}

impl BrushSettings {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_millis)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheSettings {
    pub expiry_minutes: u64,
    /// Entries otherwise live until invalidated.
    pub enforce_expiry: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            expiry_minutes: 30,
            enforce_expiry: false,
        }
    }
}

impl CacheSettings {
    pub fn expiry(&self) -> Option<Duration> {
        self.enforce_expiry
            .then(|| Duration::from_secs(self.expiry_minutes.max(1) * 60))
    }
}

impl AppConfig {
    /// Rejects settings the analysis code cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(window) = self
            .analysis
            .moving_average_windows
            .iter()
            .find(|w| !(w.is_finite() && **w >= 1.0))
        {
            anyhow::bail!(
                "analysis.moving_average_windows: {} is not a window of at least one second",
                window
            );
        }
        Ok(())
    }
}

pub fn load_config() -> anyhow::Result<AppConfig> {
    load_config_from("config/dashboard")
}

/// Loads `path` (any format the config crate knows, extension optional) if it
/// exists, then applies `DASHBOARD__SECTION__KEY` overrides.
pub fn load_config_from(path: &str) -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("DASHBOARD")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config_from("config/does-not-exist").unwrap();
        assert_eq!(config.display.overview_points, 500);
        assert_eq!(config.display.detailed_points, 2000);
        assert_eq!(config.display.brush_points, 300);
        assert_eq!(config.analysis.anomaly, AnomalySettings::default());
        assert_eq!(config.analysis.moving_average_windows, vec![60.0, 300.0]);
        assert_eq!(config.playback.tick(), Duration::from_millis(50));
        assert_eq!(config.cache.expiry_minutes, 30);
        assert!(config.cache.expiry().is_none());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let toml = r#"
            [analysis]
            annotation_sensitivity = 20.0

            [analysis.anomaly]
            critical_sigma = 4.0

            [sources]
            remote_enabled = false
        "#;
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.analysis.annotation_sensitivity, 20.0);
        assert_eq!(config.analysis.anomaly.critical_sigma, 4.0);
        assert_eq!(config.analysis.anomaly.warning_sigma, 2.0);
        assert!(!config.sources.remote_enabled);
        assert_eq!(config.sources.remote_base_url, "https://api.vitaldb.net");
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_moving_average_windows_must_be_positive() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.analysis.moving_average_windows = vec![60.0, 0.0];
        assert!(config.validate().is_err());
        config.analysis.moving_average_windows = vec![-5.0];
        assert!(config.validate().is_err());
    }
}
