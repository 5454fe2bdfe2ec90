use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use dirs::home_dir;
use layerscope_core::AggregationStrategy;
use layerscope_core::DriverConfig;
use layerscope_core::MeasurementConfig;
use layerscope_core::SamplingConfig;
use layerscope_core::ScaleType;
use layerscope_core::SonificationPolicy;
use serde::Deserialize;

use crate::error::DashboardError;
use crate::error::Result;
use crate::panels::PanelKind;
use crate::panels::RenderOptions;

const CONFIG_TOML_FILE: &str = "config.toml";

pub const DEFAULT_PROMPT: &str = "Once upon a timeline ";

pub const DEFAULT_PANELS: &[PanelKind] = &[
    PanelKind::GENERATED_TEXT,
    PanelKind::TOP_PREDICTIONS,
    PanelKind::OUTPUT_DISTRIBUTION,
    PanelKind::LAYER_ACTIVATIONS,
    PanelKind::ATTENTION_ENTROPY,
];

/// Application configuration loaded from disk and merged with overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub prompt: String,
    pub measurement: MeasurementConfig,
    pub render: RenderOptions,
    pub refresh_interval: Duration,
    /// Wait for an acknowledgment after every frame instead of sleeping.
    pub interactive: bool,
    pub num_grid_rows: usize,
    /// Requested panel names, unresolved. Unknown names are reported when the
    /// registry resolves them.
    pub panels: Vec<String>,
    pub driver: DriverConfig,
    pub audio: AudioConfig,
    /// Directory holding `config.toml` and `log/`.
    pub layerscope_home: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioConfig {
    pub enabled: bool,
    pub policy: SonificationPolicy,
    /// Seconds per tone.
    pub duration: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            policy: SonificationPolicy::default(),
            duration: 0.1,
        }
    }
}

/// Base config deserialized from `config.toml`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConfigToml {
    pub prompt: Option<String>,
    pub aggregation: Option<AggregationStrategy>,
    pub scale: Option<ScaleType>,
    pub linear_scale: Option<f32>,
    pub max_bar_length: Option<usize>,
    pub limit_chars: Option<usize>,
    /// Seconds between frames.
    pub refresh_rate: Option<f64>,
    pub interactive: Option<bool>,
    pub num_grid_rows: Option<usize>,
    pub panels: Option<Vec<String>>,
    pub max_new_tokens: Option<usize>,
    pub seed: Option<u64>,

    #[serde(default)]
    pub sampling: SamplingToml,

    #[serde(default)]
    pub audio: AudioToml,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SamplingToml {
    pub temperature: Option<f32>,
    pub top_k: Option<usize>,
    pub top_p: Option<f32>,
    pub min_p: Option<f32>,
    pub repetition_penalty: Option<f32>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AudioToml {
    pub enabled: Option<bool>,
    pub policy: Option<SonificationPolicy>,
    pub duration: Option<f32>,
}

/// Optional overrides for user configuration (e.g., from CLI flags).
#[derive(Default, Debug, Clone)]
pub struct ConfigOverrides {
    pub prompt: Option<String>,
    pub aggregation: Option<AggregationStrategy>,
    pub scale: Option<ScaleType>,
    pub max_bar_length: Option<usize>,
    pub limit_chars: Option<usize>,
    pub refresh_rate: Option<f64>,
    pub interactive: Option<bool>,
    pub num_grid_rows: Option<usize>,
    pub panels: Option<Vec<String>>,
    pub max_new_tokens: Option<usize>,
    pub seed: Option<u64>,
    pub temperature: Option<f32>,
    pub top_k: Option<usize>,
    pub top_p: Option<f32>,
    pub min_p: Option<f32>,
    pub repetition_penalty: Option<f32>,
    pub audio: Option<bool>,
    pub audio_policy: Option<SonificationPolicy>,
    pub audio_duration: Option<f32>,
    /// Read this file instead of `config.toml` in the layerscope home.
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Resolve the layerscope home, read its `config.toml` (or the explicit
    /// `config_file` override) and apply `overrides` on top.
    ///
    /// The precedence order is: built-in defaults < `config.toml` <
    /// `ConfigOverrides`.
    pub fn load_with_overrides(overrides: ConfigOverrides) -> Result<Self> {
        let layerscope_home = find_layerscope_home()?;
        let config_path = overrides
            .config_file
            .clone()
            .unwrap_or_else(|| layerscope_home.join(CONFIG_TOML_FILE));
        let cfg = load_config_as_toml(&config_path)?;
        Self::load_from_base_config_with_overrides(cfg, overrides, layerscope_home)
    }

    /// Meant to be used directly only by tests: `load_with_overrides()` should
    /// be used in all other cases.
    pub fn load_from_base_config_with_overrides(
        cfg: ConfigToml,
        overrides: ConfigOverrides,
        layerscope_home: PathBuf,
    ) -> Result<Self> {
        // Destructure ConfigOverrides fully to ensure all overrides are applied.
        let ConfigOverrides {
            prompt,
            aggregation,
            scale,
            max_bar_length,
            limit_chars,
            refresh_rate,
            interactive,
            num_grid_rows,
            panels,
            max_new_tokens,
            seed,
            temperature,
            top_k,
            top_p,
            min_p,
            repetition_penalty,
            audio,
            audio_policy,
            audio_duration,
            config_file: _,
        } = overrides;

        let measurement_defaults = MeasurementConfig::default();
        let render_defaults = RenderOptions::default();
        let driver_defaults = DriverConfig::default();
        let sampling_defaults = SamplingConfig::default();
        let audio_defaults = AudioConfig::default();

        let prompt = prompt
            .or(cfg.prompt)
            .unwrap_or_else(|| DEFAULT_PROMPT.to_string());
        if prompt.is_empty() {
            return Err(DashboardError::Config("prompt cannot be empty".to_string()));
        }

        let max_bar_length = max_bar_length
            .or(cfg.max_bar_length)
            .unwrap_or(measurement_defaults.max_bar_length);
        if max_bar_length == 0 {
            return Err(DashboardError::Config(
                "max_bar_length must be at least 1".to_string(),
            ));
        }

        let linear_scale = cfg.linear_scale.unwrap_or(measurement_defaults.linear_scale);
        if !linear_scale.is_finite() || linear_scale <= 0.0 {
            return Err(DashboardError::Config(format!(
                "linear_scale must be a positive number, got {linear_scale}"
            )));
        }

        let refresh_rate = refresh_rate.or(cfg.refresh_rate).unwrap_or(0.1);
        let refresh_interval = Duration::try_from_secs_f64(refresh_rate).map_err(|_| {
            DashboardError::Config(format!(
                "refresh_rate must be a finite number of seconds >= 0, got {refresh_rate}"
            ))
        })?;

        let audio_duration = audio_duration
            .or(cfg.audio.duration)
            .unwrap_or(audio_defaults.duration);
        if !audio_duration.is_finite() || audio_duration < 0.0 {
            return Err(DashboardError::Config(format!(
                "audio duration must be a finite number of seconds >= 0, got {audio_duration}"
            )));
        }

        let panels = panels.or(cfg.panels).unwrap_or_else(|| {
            DEFAULT_PANELS
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect()
        });

        let sampling = SamplingConfig {
            temperature: temperature
                .or(cfg.sampling.temperature)
                .unwrap_or(sampling_defaults.temperature),
            top_k: top_k.or(cfg.sampling.top_k).unwrap_or(sampling_defaults.top_k),
            top_p: top_p.or(cfg.sampling.top_p).unwrap_or(sampling_defaults.top_p),
            min_p: min_p.or(cfg.sampling.min_p).unwrap_or(sampling_defaults.min_p),
            repetition_penalty: repetition_penalty
                .or(cfg.sampling.repetition_penalty)
                .unwrap_or(sampling_defaults.repetition_penalty),
        };

        Ok(Self {
            prompt,
            measurement: MeasurementConfig {
                aggregation: aggregation
                    .or(cfg.aggregation)
                    .unwrap_or(measurement_defaults.aggregation),
                scale: scale.or(cfg.scale).unwrap_or(measurement_defaults.scale),
                max_bar_length,
                linear_scale,
            },
            render: RenderOptions {
                max_bar_length,
                limit_chars: limit_chars
                    .or(cfg.limit_chars)
                    .unwrap_or(render_defaults.limit_chars),
            },
            refresh_interval,
            interactive: interactive.or(cfg.interactive).unwrap_or(false),
            num_grid_rows: num_grid_rows.or(cfg.num_grid_rows).unwrap_or(2),
            panels,
            driver: DriverConfig {
                max_steps: max_new_tokens
                    .or(cfg.max_new_tokens)
                    .unwrap_or(driver_defaults.max_steps),
                sampling,
                seed: seed.or(cfg.seed).unwrap_or(driver_defaults.seed),
            },
            audio: AudioConfig {
                enabled: audio.or(cfg.audio.enabled).unwrap_or(audio_defaults.enabled),
                policy: audio_policy
                    .or(cfg.audio.policy)
                    .unwrap_or(audio_defaults.policy),
                duration: audio_duration,
            },
            layerscope_home,
        })
    }
}

/// Parse the TOML file at `path`. A missing file yields the defaults.
pub fn load_config_as_toml(path: &Path) -> Result<ConfigToml> {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str::<ConfigToml>(&contents).map_err(|source| {
            tracing::error!("Failed to parse {}: {source}", path.display());
            DashboardError::ConfigParse {
                path: path.to_path_buf(),
                source,
            }
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("{} not found, using defaults", path.display());
            Ok(ConfigToml::default())
        }
        Err(e) => {
            tracing::error!("Failed to read {}: {e}", path.display());
            Err(e.into())
        }
    }
}

/// Returns the path to the layerscope configuration directory, which can be
/// specified by the `LAYERSCOPE_HOME` environment variable. If not set,
/// defaults to `~/.layerscope`.
///
/// - If `LAYERSCOPE_HOME` is set, the value is used as is and does not need
///   to exist.
/// - If `LAYERSCOPE_HOME` is not set, this function does not verify that the
///   directory exists.
pub fn find_layerscope_home() -> std::io::Result<PathBuf> {
    if let Ok(val) = std::env::var("LAYERSCOPE_HOME")
        && !val.is_empty()
    {
        return Ok(PathBuf::from(val));
    }

    let mut p = home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    p.push(".layerscope");
    Ok(p)
}

/// Returns the path to the folder where layerscope logs are stored. Does not
/// verify that the directory exists.
pub fn log_dir(cfg: &Config) -> PathBuf {
    cfg.layerscope_home.join("log")
}
