use super::{types::Config, ConfigError};

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Install root is set
/// - Progress intervals are positive
/// - Speed smoothing is within (0, 1]
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.storage.install_root.as_os_str().is_empty() {
        return Err(invalid("storage.install_root cannot be empty"));
    }

    if config.download.progress_interval_ms == 0 {
        return Err(invalid("download.progress_interval_ms must be positive"));
    }
    if config.extract.progress_interval_ms == 0 {
        return Err(invalid("extract.progress_interval_ms must be positive"));
    }

    let alpha = config.download.speed_smoothing;
    if alpha.is_nan() || alpha <= 0.0 || alpha > 1.0 {
        return Err(invalid("download.speed_smoothing must be within (0, 1]"));
    }
    if config.download.progress_min_delta_pct < 0.0 {
        return Err(invalid("download.progress_min_delta_pct cannot be negative"));
    }

    Ok(())
}
