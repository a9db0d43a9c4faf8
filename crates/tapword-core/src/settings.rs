//! Global settings loaded from TOML.
//!
//! - `init_custom(toml_content)` sets a custom TOML before first `settings()` call
//! - `settings()` returns `&'static Settings` (lazy-init singleton)
//! - Default values are embedded via `include_str!("default_settings.toml")`

use std::sync::OnceLock;

use serde::Deserialize;

use crate::{MAX_GESTURE_SAMPLES, MAX_RESULTS};

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Set custom TOML before first `settings()` call.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Get or initialize the global settings singleton.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let toml_str = CUSTOM_TOML
            .get()
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_SETTINGS_TOML);
        parse_settings_toml(toml_str).expect("settings TOML must be valid")
    })
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub search: SearchSettings,
    pub gesture: GestureSettings,
    pub history: HistorySettings,
    pub gc: GcSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    pub max_results: usize,
    /// Frontier states costlier than the best emitted candidate plus this are dropped.
    pub beam_width: f32,
    pub max_expansions: usize,
    /// Edit budget when full edit distance is not requested.
    pub max_edits: u8,
    /// Multiplier on the proximity model's [0, 1] cost for a near-key hit.
    pub proximity_cost: f32,
    pub substitution_cost: f32,
    pub omission_cost: f32,
    pub insertion_cost: f32,
    pub transposition_cost: f32,
    /// Per code point appended after the typed input is consumed.
    pub completion_cost: f32,
    /// Score points (per probability point scale) removed per unit of traversal cost.
    pub cost_weight: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GestureSettings {
    pub max_skip: usize,
    pub skip_cost: f32,
    pub space_cost: f32,
    pub max_samples: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistorySettings {
    pub boost_per_use: i32,
    pub max_boost: i32,
    pub half_life_hours: f64,
    pub level_up_count: u16,
    pub max_level: u8,
    pub level_down_hours: f64,
    pub forget_after_hours: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GcSettings {
    pub max_garbage_entries: usize,
    pub idle_garbage_entries: usize,
    pub max_unigram_count: usize,
    pub max_bigram_count: usize,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_non_negative {
        ($section:ident . $field:ident) => {
            if s.$section.$field < 0.0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be non-negative".to_string(),
                });
            }
        };
    }
    macro_rules! check_positive {
        ($section:ident . $field:ident, $zero:expr) => {
            if s.$section.$field <= $zero {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        };
    }

    check_positive!(search.max_results, 0);
    if s.search.max_results > MAX_RESULTS {
        return Err(SettingsError::InvalidValue {
            field: "search.max_results".to_string(),
            reason: format!("must not exceed {MAX_RESULTS}"),
        });
    }
    check_non_negative!(search.beam_width);
    check_positive!(search.max_expansions, 0);
    check_non_negative!(search.proximity_cost);
    check_non_negative!(search.substitution_cost);
    check_non_negative!(search.omission_cost);
    check_non_negative!(search.insertion_cost);
    check_non_negative!(search.transposition_cost);
    check_non_negative!(search.completion_cost);
    check_non_negative!(search.cost_weight);

    check_non_negative!(gesture.skip_cost);
    check_non_negative!(gesture.space_cost);
    check_positive!(gesture.max_skip, 0);
    check_positive!(gesture.max_samples, 0);
    if s.gesture.max_samples > MAX_GESTURE_SAMPLES {
        return Err(SettingsError::InvalidValue {
            field: "gesture.max_samples".to_string(),
            reason: format!("must not exceed {MAX_GESTURE_SAMPLES}"),
        });
    }

    if s.history.boost_per_use < 0 || s.history.max_boost < 0 {
        return Err(SettingsError::InvalidValue {
            field: "history.boost_per_use/max_boost".to_string(),
            reason: "must be non-negative".to_string(),
        });
    }
    check_positive!(history.half_life_hours, 0.0);
    check_positive!(history.level_up_count, 0);
    check_positive!(history.level_down_hours, 0.0);
    check_positive!(history.forget_after_hours, 0.0);

    check_positive!(gc.max_garbage_entries, 0);
    check_positive!(gc.idle_garbage_entries, 0);
    check_positive!(gc.max_unigram_count, 0);
    check_positive!(gc.max_bigram_count, 0);
    if s.gc.idle_garbage_entries > s.gc.max_garbage_entries {
        return Err(SettingsError::InvalidValue {
            field: "gc.idle_garbage_entries".to_string(),
            reason: "must not exceed gc.max_garbage_entries".to_string(),
        });
    }

    Ok(())
}
