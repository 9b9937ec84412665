//! Configuration validation.

use crate::config::Config;
use crate::error::{Error, Result};

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_defaults(config)?;
    validate_paths(config)?;
    Ok(())
}

/// Validate default settings.
fn validate_defaults(config: &Config) -> Result<()> {
    let defaults = &config.defaults;

    // Same rules as a request carrying these defaults
    defaults
        .request_options()
        .validate()
        .map_err(|e| Error::ConfigValidation {
            message: format!("defaults: {e}"),
        })?;

    if defaults.buffer_size == 0 {
        return Err(Error::ConfigValidation {
            message: "buffer_size must be at least 1".to_string(),
        });
    }

    Ok(())
}

/// Check that configured files exist.
fn validate_paths(config: &Config) -> Result<()> {
    if let Some(path) = &config.geo.elevation_table
        && !path.exists()
    {
        return Err(Error::ConfigValidation {
            message: format!("elevation table not found: {}", path.display()),
        });
    }

    if let Some(path) = &config.taxonomy.path
        && !path.exists()
    {
        return Err(Error::ConfigValidation {
            message: format!("taxonomy file not found: {}", path.display()),
        });
    }

    Ok(())
}
