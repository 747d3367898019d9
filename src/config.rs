use std::{error, fmt};

use anyhow::{ensure, Context};
use serde::Deserialize;

/// Geometry of one simulated cache: `2^s` sets of `E` lines, `2^b` byte blocks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    name: Option<String>,
    pub s: u32,
    #[serde(rename = "E")]
    pub lines: usize,
    pub b: u32,
}

#[derive(Deserialize)]
pub struct Config {
    pub caches: Vec<CacheConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    NoLines,
    TooWide { s: u32, b: u32 },
    TooLarge { s: u32, lines: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoLines => write!(f, "a set must hold at least one line (E >= 1)"),
            ConfigError::TooWide { s, b } => {
                write!(f, "s + b must not exceed 64 address bits (s={s}, b={b})")
            }
            ConfigError::TooLarge { s, lines } => {
                write!(f, "cannot allocate 2^{s} sets of {lines} lines")
            }
        }
    }
}

impl error::Error for ConfigError {}

impl CacheConfig {
    pub fn new(s: u32, lines: usize, b: u32) -> Self {
        CacheConfig {
            name: None,
            s,
            lines,
            b,
        }
    }

    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("s{}-E{}-b{}", self.s, self.lines, self.b),
        }
    }

    /// Structural checks the cache model itself depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lines == 0 {
            return Err(ConfigError::NoLines);
        }
        if self.s.checked_add(self.b).map_or(true, |width| width > 64) {
            return Err(ConfigError::TooWide {
                s: self.s,
                b: self.b,
            });
        }
        Ok(())
    }

    /// User-supplied geometries must set every parameter to a positive value.
    pub fn require_positive(&self) -> anyhow::Result<()> {
        ensure!(self.s > 0, "{}: -s must be a positive integer", self.name());
        ensure!(self.lines > 0, "{}: -E must be a positive integer", self.name());
        ensure!(self.b > 0, "{}: -b must be a positive integer", self.name());
        Ok(())
    }
}

impl Config {
    pub fn from_json(json: &str) -> anyhow::Result<Config> {
        let config: Config = serde_json::from_str(json).context("invalid cache config json")?;
        ensure!(!config.caches.is_empty(), "config lists no caches");
        for cache in &config.caches {
            cache.require_positive()?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sweep_config() {
        let config = Config::from_json(
            r#"{ "caches": [
                { "name": "small", "s": 1, "E": 1, "b": 1 },
                { "s": 4, "E": 2, "b": 4 }
            ] }"#,
        )
        .unwrap();
        assert_eq!(config.caches.len(), 2);
        assert_eq!(config.caches[0].name(), "small");
        assert_eq!(config.caches[1], CacheConfig::new(4, 2, 4));
        assert_eq!(config.caches[1].name(), "s4-E2-b4");
    }

    #[test]
    fn rejects_zero_parameters() {
        assert!(CacheConfig::new(0, 1, 1).require_positive().is_err());
        assert!(CacheConfig::new(1, 0, 1).require_positive().is_err());
        assert!(CacheConfig::new(1, 1, 0).require_positive().is_err());
        assert!(CacheConfig::new(1, 1, 1).require_positive().is_ok());

        let err = Config::from_json(r#"{ "caches": [ { "s": 0, "E": 1, "b": 4 } ] }"#);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_empty_and_malformed_json() {
        assert!(Config::from_json(r#"{ "caches": [] }"#).is_err());
        assert!(Config::from_json(r#"{ "caches": [ { "s": 1 } ] }"#).is_err());
        assert!(Config::from_json("not json").is_err());
    }

    #[test]
    fn validate_checks_geometry() {
        assert_eq!(CacheConfig::new(0, 1, 0).validate(), Ok(()));
        assert_eq!(CacheConfig::new(32, 1, 32).validate(), Ok(()));
        assert_eq!(CacheConfig::new(2, 0, 2).validate(), Err(ConfigError::NoLines));
        assert_eq!(
            CacheConfig::new(40, 1, 25).validate(),
            Err(ConfigError::TooWide { s: 40, b: 25 })
        );
    }
}
