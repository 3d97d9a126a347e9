//! Site configuration module.
//!
//! Handles loading, validating, and merging `figlight.toml`. Stock defaults
//! are overridden by a user file placed in the book's source directory.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [figures]
//! selector = "figure.figure"   # Which elements are figures
//! swipe_threshold = 50.0       # Horizontal swipe distance (px) that navigates
//!
//! [figures.orientation]
//! landscape_ratio = 1.1        # width / height at or above this is landscape
//! ultra_wide_ratio = 2.1       # ... and at or above this also ultra-wide
//!
//! [sidebar]
//! breakpoint = 860.0           # Max viewport width (px) where the sidebar toggles
//!
//! [reveal]
//! fast = [".hero h1", ...]     # Selectors revealed with the fast transition
//! slow = ["figure.figure", ...]
//! threshold = 0.12             # Visible fraction that triggers a reveal
//! bottom_margin = 0.08         # Viewport fraction ignored at the bottom edge
//!
//! [progress]
//! min_scroll_distance = 120.0  # Scrollable px needed before the bar shows
//!
//! [processing]
//! max_processes = 4            # Max parallel page workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [sidebar]
//! breakpoint = 1024.0
//! ```
//!
//! Unknown keys are rejected to catch typos early. Selectors are parsed
//! during validation, so an unsupported selector is reported before any page
//! is touched.

use crate::selector::{Selector, SelectorError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up in the source directory.
pub const CONFIG_FILE: &str = "figlight.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Invalid selector {selector:?} in [{section}]: {source}")]
    Selector {
        section: &'static str,
        selector: String,
        #[source]
        source: SelectorError,
    },
}

/// Configuration loaded from `figlight.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Figure discovery and viewer gestures.
    pub figures: FiguresConfig,
    /// Navigation sidebar toggle.
    pub sidebar: SidebarConfig,
    /// Scroll reveal targets and trigger geometry.
    pub reveal: RevealConfig,
    /// Reading progress indicator.
    pub progress: ProgressConfig,
    /// Parallel page processing settings.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let orientation = &self.figures.orientation;
        if orientation.landscape_ratio <= 0.0 {
            return Err(ConfigError::Validation(
                "figures.orientation.landscape_ratio must be positive".into(),
            ));
        }
        if orientation.ultra_wide_ratio < orientation.landscape_ratio {
            return Err(ConfigError::Validation(
                "figures.orientation.ultra_wide_ratio must not be below landscape_ratio".into(),
            ));
        }
        if self.figures.swipe_threshold <= 0.0 {
            return Err(ConfigError::Validation(
                "figures.swipe_threshold must be positive".into(),
            ));
        }
        if self.sidebar.breakpoint <= 0.0 {
            return Err(ConfigError::Validation(
                "sidebar.breakpoint must be positive".into(),
            ));
        }
        if !(self.reveal.threshold > 0.0 && self.reveal.threshold <= 1.0) {
            return Err(ConfigError::Validation(
                "reveal.threshold must be in (0, 1]".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.reveal.bottom_margin) {
            return Err(ConfigError::Validation(
                "reveal.bottom_margin must be in [0, 1)".into(),
            ));
        }
        if self.progress.min_scroll_distance < 0.0 {
            return Err(ConfigError::Validation(
                "progress.min_scroll_distance must not be negative".into(),
            ));
        }
        self.figures.selector()?;
        self.reveal.fast_selectors()?;
        self.reveal.slow_selectors()?;
        Ok(())
    }
}

fn parse_selector(section: &'static str, source: &str) -> Result<Selector, ConfigError> {
    Selector::parse(source).map_err(|source_err| ConfigError::Selector {
        section,
        selector: source.to_string(),
        source: source_err,
    })
}

/// Figure discovery and viewer gesture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FiguresConfig {
    /// Selector identifying figure elements.
    pub selector: String,
    /// Minimum horizontal swipe distance in CSS pixels.
    pub swipe_threshold: f64,
    /// Aspect-ratio cut-offs for orientation classes.
    pub orientation: OrientationConfig,
}

impl FiguresConfig {
    pub fn selector(&self) -> Result<Selector, ConfigError> {
        parse_selector("figures", &self.selector)
    }
}

impl Default for FiguresConfig {
    fn default() -> Self {
        Self {
            selector: "figure.figure".to_string(),
            swipe_threshold: 50.0,
            orientation: OrientationConfig::default(),
        }
    }
}

/// Aspect-ratio cut-offs, as width / height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrientationConfig {
    pub landscape_ratio: f64,
    pub ultra_wide_ratio: f64,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            landscape_ratio: 1.1,
            ultra_wide_ratio: 2.1,
        }
    }
}

/// Navigation sidebar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SidebarConfig {
    /// Viewport widths at or below this are "mobile": the sidebar toggles.
    pub breakpoint: f64,
}

impl Default for SidebarConfig {
    fn default() -> Self {
        Self { breakpoint: 860.0 }
    }
}

/// Scroll reveal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RevealConfig {
    /// Selectors for elements revealed with the fast transition.
    pub fast: Vec<String>,
    /// Selectors for elements revealed with the slow transition.
    pub slow: Vec<String>,
    /// Fraction of an element that must be visible to reveal it.
    pub threshold: f64,
    /// Fraction of the viewport height ignored at the bottom edge.
    pub bottom_margin: f64,
}

impl RevealConfig {
    pub fn fast_selectors(&self) -> Result<Vec<Selector>, ConfigError> {
        self.fast.iter().map(|s| parse_selector("reveal", s)).collect()
    }

    pub fn slow_selectors(&self) -> Result<Vec<Selector>, ConfigError> {
        self.slow.iter().map(|s| parse_selector("reveal", s)).collect()
    }
}

impl Default for RevealConfig {
    fn default() -> Self {
        let strings = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            fast: strings(&[
                ".hero h1",
                ".hero .subtitle",
                ".hero .author-bio",
                ".hero .description",
                ".download-btn",
                ".toc h2",
                ".toc-part",
                ".integrity",
                ".hash-display",
            ]),
            slow: strings(&[
                ".sealed-proof",
                "figure.figure",
                ".key-findings",
                "table.longtable",
                ".chapter-nav",
            ]),
            threshold: 0.12,
            bottom_margin: 0.08,
        }
    }
}

/// Reading progress settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProgressConfig {
    /// Scrollable distance (px) above which the indicator is shown.
    pub min_scroll_distance: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            min_scroll_distance: 120.0,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel page workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, arrays included.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `figlight.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `figlight.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<Config, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(dir)?)
}

/// Returns a fully-commented stock `figlight.toml` with all keys explained.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# figlight configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Place this file in the book's
# source directory as figlight.toml. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Figures and the figure viewer
# ---------------------------------------------------------------------------
[figures]
# Selector identifying figure elements. Each needs an <img> inside it.
selector = "figure.figure"

# Horizontal swipe distance (CSS px) on the viewer stage that moves to the
# previous (swipe right) or next (swipe left) figure.
swipe_threshold = 50.0

# Aspect ratio (width / height) cut-offs for the is-portrait, is-landscape
# and is-ultra-wide classes. Ultra-wide figures are also landscape.
[figures.orientation]
landscape_ratio = 1.1
ultra_wide_ratio = 2.1

# ---------------------------------------------------------------------------
# Navigation sidebar
# ---------------------------------------------------------------------------
[sidebar]
# Viewport width (CSS px) at or below which the hamburger toggles the
# sidebar. Resizing above it closes the sidebar.
breakpoint = 860.0

# ---------------------------------------------------------------------------
# Scroll reveal
# ---------------------------------------------------------------------------
[reveal]
# Elements revealed with the fast transition.
fast = [
    ".hero h1",
    ".hero .subtitle",
    ".hero .author-bio",
    ".hero .description",
    ".download-btn",
    ".toc h2",
    ".toc-part",
    ".integrity",
    ".hash-display",
]

# Elements revealed with the slow transition.
slow = [
    ".sealed-proof",
    "figure.figure",
    ".key-findings",
    "table.longtable",
    ".chapter-nav",
]

# Visible fraction of an element needed to reveal it.
threshold = 0.12

# Fraction of the viewport height ignored at the bottom edge.
bottom_margin = 0.08

# ---------------------------------------------------------------------------
# Reading progress
# ---------------------------------------------------------------------------
[progress]
# The progress bar only shows on pages that scroll further than this (px).
min_scroll_distance = 120.0

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel page workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
