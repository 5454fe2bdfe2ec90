use std::path::PathBuf;

use clap::Parser;
use layerscope_core::AggregationStrategy;
use layerscope_core::ScaleType;
use layerscope_core::SonificationPolicy;

use crate::config::ConfigOverrides;

/// Watch a language model think, one generation step at a time.
#[derive(Parser, Debug, Default)]
#[command(version)]
pub struct Cli {
    /// Initial prompt for text generation.
    #[arg(long)]
    pub prompt: Option<String>,

    /// Number of tokens to generate.
    #[arg(long = "max-new-tokens", value_name = "N")]
    pub max_new_tokens: Option<usize>,

    /// How each layer's hidden state is reduced to one value: l2 or max_abs.
    #[arg(long)]
    pub aggregation: Option<AggregationStrategy>,

    /// How values are scaled onto bars: linear, log or minmax.
    #[arg(long)]
    pub scale: Option<ScaleType>,

    /// Seconds between frames.
    #[arg(long = "refresh-rate", value_name = "SECONDS")]
    pub refresh_rate: Option<f64>,

    /// Wait for Enter after every frame; `q` then Enter quits.
    #[arg(long, default_value_t = false)]
    pub interactive: bool,

    /// How many characters of generated text to show.
    #[arg(long = "limit-chars")]
    pub limit_chars: Option<usize>,

    /// Longest bar drawn by the layer panels.
    #[arg(long = "max-bar-length")]
    pub max_bar_length: Option<usize>,

    /// Rows in the panel grid.
    #[arg(long = "num-grid-rows")]
    pub num_grid_rows: Option<usize>,

    /// Panels to show, in order.
    #[arg(long, value_name = "PANEL", num_args = 1..)]
    pub panels: Option<Vec<String>>,

    #[arg(long = "temp")]
    pub temperature: Option<f32>,

    #[arg(long = "top-k")]
    pub top_k: Option<usize>,

    #[arg(long = "top-p")]
    pub top_p: Option<f32>,

    #[arg(long = "min-p")]
    pub min_p: Option<f32>,

    #[arg(long = "repetition-penalty")]
    pub repetition_penalty: Option<f32>,

    /// Seed for sampling the next token.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Play a tone for every generated token.
    #[arg(long, default_value_t = false)]
    pub audio: bool,

    #[arg(long = "audio-policy")]
    pub audio_policy: Option<SonificationPolicy>,

    /// Seconds per tone.
    #[arg(long = "audio-duration", value_name = "SECONDS")]
    pub audio_duration: Option<f32>,

    /// Read configuration from this file instead of `config.toml` in the
    /// layerscope home.
    #[arg(long = "config", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Print the available panels and exit.
    #[arg(long = "list-panels", default_value_t = false)]
    pub list_panels: bool,
}

impl Cli {
    /// Flags left unset fall through to `config.toml` and then the defaults.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            prompt: self.prompt.clone(),
            aggregation: self.aggregation,
            scale: self.scale,
            max_bar_length: self.max_bar_length,
            limit_chars: self.limit_chars,
            refresh_rate: self.refresh_rate,
            interactive: self.interactive.then_some(true),
            num_grid_rows: self.num_grid_rows,
            panels: self.panels.clone(),
            max_new_tokens: self.max_new_tokens,
            seed: self.seed,
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
            min_p: self.min_p,
            repetition_penalty: self.repetition_penalty,
            audio: self.audio.then_some(true),
            audio_policy: self.audio_policy,
            audio_duration: self.audio_duration,
            config_file: self.config_file.clone(),
        }
    }
}
