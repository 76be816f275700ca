mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

use crate::metadata::providers::KNOWN_INTEGRATIONS;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&mut config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./reelmatch.toml",
        "~/.config/reelmatch/config.toml",
        "/etc/reelmatch/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration, dropping unknown provider ids from priority lists.
pub fn validate_config(config: &mut Config) -> Result<()> {
    validate_settings(&mut config.metadata)?;

    if config.http.timeout_secs == 0 {
        anyhow::bail!("HTTP timeout cannot be 0");
    }
    if config.http.base_backoff_ms > config.http.max_backoff_ms {
        anyhow::bail!(
            "HTTP base backoff ({}ms) exceeds max backoff ({}ms)",
            config.http.base_backoff_ms,
            config.http.max_backoff_ms
        );
    }

    for (i, integration) in config.integrations.iter().enumerate() {
        if !KNOWN_INTEGRATIONS.contains(&integration.id.as_str()) {
            tracing::warn!("Unknown integration '{}' in config, it will be ignored", integration.id);
        }
        if config.integrations[..i].iter().any(|other| other.id == integration.id) {
            anyhow::bail!("Integration '{}' is configured more than once", integration.id);
        }
    }

    Ok(())
}

/// Validate resolution settings in place.
///
/// Fails on an out-of-range threshold; unknown provider ids in the priority
/// lists are logged and removed.
pub fn validate_settings(settings: &mut MetadataSettings) -> Result<()> {
    let threshold = settings.auto_match_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        anyhow::bail!("Auto-match threshold must be between 0 and 1, got {}", threshold);
    }

    for (name, list) in [
        ("movie", &mut settings.movie_priority),
        ("tv", &mut settings.tv_priority),
        ("anime", &mut settings.anime_priority),
    ] {
        list.retain(|id| {
            let known = KNOWN_INTEGRATIONS.contains(&id.as_str());
            if !known {
                tracing::warn!("Dropping unknown integration '{}' from {} priority", id, name);
            }
            known
        });
    }

    Ok(())
}
