use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use spintrack_db::state::{HISTORY_CAP, RECENT_CAP};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinConfig {
    pub spins_min: u32,
    pub spins_max: u32,
    pub duration_ms: u64,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            spins_min: 6,
            spins_max: 8,
            duration_ms: 4_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Verrou après une admission de la roue. 0 désactive le verrou.
    pub lock_ms: u64,
    pub dup_window_ms: u64,
    /// Intervalle minimal entre deux admissions, roue ou saisie manuelle.
    pub debounce_ms: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            lock_ms: 12_000,
            dup_window_ms: 12_000,
            debounce_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub trend_window: usize,
    pub hot_window: usize,
    pub pattern_window: usize,
    pub color_window: usize,
    pub lagging_window: usize,
    pub hot_threshold: u32,
    /// Si présent, les `n` numéros les plus fréquents remplacent la règle du seuil.
    pub hot_top_n: Option<usize>,
    pub display_cap: usize,
    pub strong_at: u32,
    pub possible_at: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            trend_window: 11,
            hot_window: 15,
            pattern_window: 8,
            color_window: 10,
            lagging_window: 30,
            hot_threshold: 3,
            hot_top_n: None,
            display_cap: 8,
            strong_at: 4,
            possible_at: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub spin: SpinConfig,
    pub guard: GuardConfig,
    pub analytics: AnalyticsConfig,
    pub history_cap: usize,
    pub recent_cap: usize,
    pub seed: Option<u64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            spin: SpinConfig::default(),
            guard: GuardConfig::default(),
            analytics: AnalyticsConfig::default(),
            history_cap: HISTORY_CAP,
            recent_cap: RECENT_CAP,
            seed: None,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.spin.spins_min > self.spin.spins_max {
            bail!(
                "spins_min ({}) doit être ≤ spins_max ({})",
                self.spin.spins_min,
                self.spin.spins_max
            );
        }
        if self.history_cap == 0 {
            bail!("history_cap doit être > 0");
        }
        if self.recent_cap > self.history_cap {
            bail!("recent_cap ({}) dépasse history_cap ({})", self.recent_cap, self.history_cap);
        }
        let a = &self.analytics;
        if a.possible_at > a.strong_at {
            bail!("possible_at ({}) doit être ≤ strong_at ({})", a.possible_at, a.strong_at);
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<TrackerConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {:?}", path))?;
    let config: TrackerConfig = serde_json::from_str(&json)
        .with_context(|| format!("JSON invalide dans {:?}", path))?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(config: &TrackerConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)
        .with_context(|| format!("Impossible d'écrire {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.history_cap, 500);
        assert_eq!(config.recent_cap, 12);
        assert_eq!(config.guard.lock_ms, 12_000);
        assert_eq!(config.guard.debounce_ms, 500);
        assert_eq!(config.analytics.trend_window, 11);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"analytics":{"hot_window":50,"hot_top_n":5},"guard":{"lock_ms":0}}"#;
        let config: TrackerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.analytics.hot_window, 50);
        assert_eq!(config.analytics.hot_top_n, Some(5));
        assert_eq!(config.analytics.trend_window, 11);
        assert_eq!(config.guard.lock_ms, 0);
        assert_eq!(config.guard.dup_window_ms, 12_000);
        assert_eq!(config.spin, SpinConfig::default());
    }

    #[test]
    fn test_validate_rejects_inverted_spins() {
        let mut config = TrackerConfig::default();
        config.spin.spins_min = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let config = TrackerConfig {
            history_cap: 0,
            recent_cap: 0,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
