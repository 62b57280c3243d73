//! Configuration loading and typed config structures for spikegraph.
//!
//! The configuration lives in `spikegraph-config.yaml` (path overridable
//! with `SPIKEGRAPH_CONFIG`). This module defines strongly-typed structs
//! that mirror the YAML structure, and provides a loader that reads and
//! validates the file. Every field has a default, so an absent file or an
//! empty section yields a working configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Number of ticks the layout energy needs to decay from 1 to `alpha_min`
/// when no explicit decay rate is configured.
const DEFAULT_SETTLE_TICKS: f64 = 300.0;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is outside its valid range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level spikegraph configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpikegraphConfig {
    /// Canvas size the layout is computed for.
    pub viewport: ViewportConfig,

    /// Force layout parameters.
    pub layout: LayoutConfig,

    /// Session and ingestion parameters.
    pub session: SessionConfig,

    /// Observer server settings.
    pub observer: ObserverConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl SpikegraphConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `SPIKEGRAPH_OBSERVER_PORT` overrides `observer.port` when set to a
    /// valid port number.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.observer.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let viewport = self.viewport;
        if !(viewport.width.is_finite()
            && viewport.height.is_finite()
            && viewport.width > 0.0
            && viewport.height > 0.0)
        {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "viewport must be positive and finite, got {}x{}",
                    viewport.width, viewport.height
                ),
            });
        }

        let layout = &self.layout;
        require(
            layout.repulsion.is_finite() && layout.repulsion >= 0.0,
            "layout.repulsion must be finite and not negative",
        )?;
        require(
            layout.major_radius.is_finite()
                && layout.minor_radius.is_finite()
                && layout.major_radius >= 0.0
                && layout.minor_radius >= 0.0,
            "collision radii must be finite and not negative",
        )?;
        require(
            layout.link_distance_ratio.is_finite() && layout.link_distance_ratio > 0.0,
            "layout.link_distance_ratio must be finite and positive",
        )?;
        require(
            (0.0..=1.0).contains(&layout.velocity_decay),
            "layout.velocity_decay must be within [0, 1]",
        )?;
        require(
            layout.alpha_min > 0.0 && layout.alpha_min < 1.0,
            "layout.alpha_min must be within (0, 1)",
        )?;
        let decay = layout.effective_alpha_decay();
        require(
            decay > 0.0 && decay <= 1.0,
            "layout.alpha_decay must be within (0, 1]",
        )?;
        require(
            layout.settle_floor >= 0.0 && layout.settle_floor < 1.0,
            "layout.settle_floor must be within [0, 1)",
        )?;
        require(
            (0.0..=1.0).contains(&layout.reheat_alpha),
            "layout.reheat_alpha must be within [0, 1]",
        )?;
        require(
            self.session.tick_interval_ms > 0,
            "session.tick_interval_ms must be positive",
        )?;
        Ok(())
    }
}

fn require(ok: bool, reason: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            reason: reason.to_owned(),
        })
    }
}

/// Canvas size in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ViewportConfig {
    /// Canvas width.
    #[serde(default = "default_viewport_width")]
    pub width: f64,

    /// Canvas height.
    #[serde(default = "default_viewport_height")]
    pub height: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: default_viewport_width(),
            height: default_viewport_height(),
        }
    }
}

/// Force layout parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayoutConfig {
    /// Magnitude of the pairwise repulsion between all nodes.
    #[serde(default = "default_repulsion")]
    pub repulsion: f64,

    /// Collision radius of state and activation nodes.
    #[serde(default = "default_major_radius")]
    pub major_radius: f64,

    /// Collision radius of signal, property and spike nodes.
    #[serde(default = "default_minor_radius")]
    pub minor_radius: f64,

    /// Link rest distance as a fraction of the viewport height.
    #[serde(default = "default_link_distance_ratio")]
    pub link_distance_ratio: f64,

    /// Energy below which the simulation stops integrating.
    #[serde(default = "default_alpha_min")]
    pub alpha_min: f64,

    /// Per-tick energy decay rate. Derived from `alpha_min` when absent.
    #[serde(default)]
    pub alpha_decay: Option<f64>,

    /// Fraction of velocity lost per tick.
    #[serde(default = "default_velocity_decay")]
    pub velocity_decay: f64,

    /// Energy floor the simulation decays toward after a drag ends.
    #[serde(default = "default_settle_floor")]
    pub settle_floor: f64,

    /// Minimum energy restored when nodes or edges are added.
    #[serde(default = "default_reheat_alpha")]
    pub reheat_alpha: f64,

    /// Seed of the jiggle generator that separates coincident nodes.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl LayoutConfig {
    /// Effective energy decay rate per tick.
    pub fn effective_alpha_decay(&self) -> f64 {
        self.alpha_decay
            .unwrap_or_else(|| 1.0 - self.alpha_min.powf(1.0 / DEFAULT_SETTLE_TICKS))
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            repulsion: default_repulsion(),
            major_radius: default_major_radius(),
            minor_radius: default_minor_radius(),
            link_distance_ratio: default_link_distance_ratio(),
            alpha_min: default_alpha_min(),
            alpha_decay: None,
            velocity_decay: default_velocity_decay(),
            settle_floor: default_settle_floor(),
            reheat_alpha: default_reheat_alpha(),
            seed: default_seed(),
        }
    }
}

/// Session and ingestion parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Real-time milliseconds between layout ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Stop after this many ticks (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,

    /// Number of pass-through messages retained.
    #[serde(default = "default_passthrough_capacity")]
    pub passthrough_capacity: usize,

    /// Resolve dangling parent and binding references when the referenced
    /// spike arrives later, instead of dropping them.
    #[serde(default)]
    pub resolve_deferred_references: bool,

    /// Optional JSON file of static link descriptors applied at startup.
    #[serde(default)]
    pub static_links_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: 0,
            passthrough_capacity: default_passthrough_capacity(),
            resolve_deferred_references: false,
            static_links_path: None,
        }
    }
}

/// Observer server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Whether to start the observer server.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind address.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl ObserverConfig {
    /// Override the port with `SPIKEGRAPH_OBSERVER_PORT` when it holds a
    /// valid port number.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SPIKEGRAPH_OBSERVER_PORT")
            && let Ok(port) = val.parse::<u16>()
        {
            self.port = port;
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_observer_host(),
            port: default_observer_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_viewport_width() -> f64 {
    1280.0
}

const fn default_viewport_height() -> f64 {
    720.0
}

const fn default_repulsion() -> f64 {
    30.0
}

const fn default_major_radius() -> f64 {
    70.0
}

const fn default_minor_radius() -> f64 {
    50.0
}

const fn default_link_distance_ratio() -> f64 {
    1.0 / 6.0
}

const fn default_alpha_min() -> f64 {
    0.001
}

const fn default_velocity_decay() -> f64 {
    0.4
}

const fn default_settle_floor() -> f64 {
    0.1
}

const fn default_reheat_alpha() -> f64 {
    0.3
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_interval_ms() -> u64 {
    16
}

const fn default_passthrough_capacity() -> usize {
    200
}

fn default_observer_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    42424
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SpikegraphConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.observer.port, 42424);
        assert_eq!(config.session.passthrough_capacity, 200);
        assert!(!config.session.resolve_deferred_references);
        assert!(config.layout.major_radius > config.layout.minor_radius);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
viewport:
  width: 800
  height: 600

layout:
  repulsion: 45.0
  major_radius: 35.0
  minor_radius: 25.0
  alpha_min: 0.01
  alpha_decay: 0.05
  velocity_decay: 0.3
  seed: 9

session:
  tick_interval_ms: 33
  max_ticks: 500
  passthrough_capacity: 10
  resolve_deferred_references: true
  static_links_path: "links.json"

observer:
  enabled: false
  host: "127.0.0.1"

logging:
  level: "debug"
  format: json
"#;

        let config = SpikegraphConfig::parse(yaml).unwrap();
        assert!((config.viewport.height - 600.0).abs() < f64::EPSILON);
        assert!((config.layout.effective_alpha_decay() - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.layout.seed, 9);
        assert_eq!(config.session.max_ticks, 500);
        assert!(config.session.resolve_deferred_references);
        assert_eq!(
            config.session.static_links_path.as_deref(),
            Some(Path::new("links.json"))
        );
        assert!(!config.observer.enabled);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SpikegraphConfig::parse("viewport:\n  height: 900\n").unwrap();
        assert!((config.viewport.height - 900.0).abs() < f64::EPSILON);
        // Everything else uses defaults
        assert!((config.viewport.width - 1280.0).abs() < f64::EPSILON);
        assert_eq!(config.session.tick_interval_ms, 16);
    }

    #[test]
    fn derived_decay_reaches_alpha_min_in_three_hundred_ticks() {
        let layout = LayoutConfig::default();
        let decay = layout.effective_alpha_decay();
        let remaining = (1.0 - decay).powi(300);
        assert!((remaining - layout.alpha_min).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_positive_viewport() {
        let result = SpikegraphConfig::parse("viewport:\n  width: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    fn rejected(yaml: &str) -> bool {
        matches!(SpikegraphConfig::parse(yaml), Err(ConfigError::Invalid { .. }))
    }

    #[test]
    fn rejects_alpha_decay_outside_unit_interval() {
        assert!(rejected("layout:\n  alpha_decay: -0.5\n"));
        assert!(rejected("layout:\n  alpha_decay: 0\n"));
        assert!(rejected("layout:\n  alpha_decay: 1.5\n"));
        assert!(!rejected("layout:\n  alpha_decay: 1\n"));
    }

    #[test]
    fn rejects_reheat_alpha_outside_unit_interval() {
        assert!(rejected("layout:\n  reheat_alpha: -0.1\n"));
        assert!(rejected("layout:\n  reheat_alpha: 2\n"));
    }

    #[test]
    fn rejects_non_positive_link_distance_ratio() {
        assert!(rejected("layout:\n  link_distance_ratio: 0\n"));
        assert!(rejected("layout:\n  link_distance_ratio: .nan\n"));
    }

    #[test]
    fn rejects_negative_or_infinite_repulsion() {
        assert!(rejected("layout:\n  repulsion: -3\n"));
        assert!(rejected("layout:\n  repulsion: .inf\n"));
        assert!(!rejected("layout:\n  repulsion: 0\n"));
    }

    #[test]
    fn rejects_zero_tick_interval() {
        assert!(rejected("session:\n  tick_interval_ms: 0\n"));
    }

    #[test]
    fn rejects_non_finite_viewport_and_radii() {
        assert!(rejected("viewport:\n  width: .inf\n"));
        assert!(rejected("layout:\n  minor_radius: .nan\n"));
    }

    #[test]
    fn rejects_velocity_decay_above_one() {
        let result = SpikegraphConfig::parse("layout:\n  velocity_decay: 1.5\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
