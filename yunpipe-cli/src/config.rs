//! Configuration module
//!
//! Loads the engine configuration from the environment, with the `--home`
//! flag taking precedence over `YUNPIPE_HOME`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use yunpipe_engine::Config;

/// Loads and validates the configuration
pub fn load(home: Option<PathBuf>) -> Result<Config> {
    let config = load_with(home, |key| std::env::var(key).ok())?;
    config.validate().context("Invalid configuration")?;
    tracing::debug!("Using yunpipe home {}", config.home.display());
    Ok(config)
}

fn load_with(home: Option<PathBuf>, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let home = home.map(|h| h.display().to_string());
    Config::from_lookup(|key| match (key, &home) {
        ("YUNPIPE_HOME", Some(home)) => Some(home.clone()),
        _ => env(key),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_overrides_env_home() {
        let config = load_with(Some(PathBuf::from("/flag/home")), |key| match key {
            "YUNPIPE_HOME" => Some("/env/home".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.home, PathBuf::from("/flag/home"));
        assert_eq!(config.algorithm_dir, PathBuf::from("/flag/home/algorithms"));
    }

    #[test]
    fn test_env_home_without_flag() {
        let config = load_with(None, |key| match key {
            "YUNPIPE_HOME" => Some("/env/home".to_string()),
            "YUNPIPE_ALARM_QUEUE" => Some("alarms".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.home, PathBuf::from("/env/home"));
        assert_eq!(config.alarm_queue, "alarms");
    }
}
