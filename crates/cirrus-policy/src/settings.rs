//! Runner settings files.
//!
//! ```toml
//! region = "ap-southeast-1"
//! max_workers = 4
//! dry_run = true
//! ```

use std::path::Path;

use tracing::debug;

use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    settings::RunnerSettings,
};

/// Parse settings from TOML. Missing keys take their defaults.
pub fn from_toml_str(s: &str) -> CirrusResult<RunnerSettings> {
    let settings: RunnerSettings = toml::from_str(s).map_err(|e| CirrusError::ConfigError {
        reason: format!("failed to parse settings TOML: {e}"),
    })?;
    if settings.tag_batch_size == 0 || settings.max_tags_per_call == 0 {
        return Err(CirrusError::ConfigError {
            reason: "tag_batch_size and max_tags_per_call must be positive".to_string(),
        });
    }
    debug!(region = %settings.region, dry_run = settings.dry_run, "settings loaded");
    Ok(settings)
}

pub fn from_file(path: &Path) -> CirrusResult<RunnerSettings> {
    let contents = std::fs::read_to_string(path).map_err(|e| CirrusError::ConfigError {
        reason: format!("failed to read settings file '{}': {e}", path.display()),
    })?;
    from_toml_str(&contents)
}
