//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{DispatchConfig, LogOutput, LoggingConfig, SwitchyardConfig};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration.
pub fn validate_config(config: &SwitchyardConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_dispatch_config(&config.dispatch)?;
    Ok(())
}

fn validate_log_level(level: &str) -> ConfigResult<()> {
    if !VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        return Err(ConfigError::validation(format!(
            "Invalid log level: {level}. Valid values are: {VALID_LOG_LEVELS:?}"
        )));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    validate_log_level(&logging.level)?;
    for (module, level) in &logging.filters {
        if module.is_empty() {
            return Err(ConfigError::validation("Log filter module cannot be empty"));
        }
        validate_log_level(level)?;
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "File log output requires logging.file_path",
        ));
    }

    Ok(())
}

fn validate_dispatch_config(dispatch: &DispatchConfig) -> ConfigResult<()> {
    if dispatch.prefix.is_empty() {
        return Err(ConfigError::validation("Command prefix cannot be empty"));
    }

    if dispatch.prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation(
            "Command prefix cannot contain whitespace",
        ));
    }

    if dispatch.await_component_timeout_secs == 0 {
        return Err(ConfigError::validation(
            "Await component timeout must be greater than 0",
        ));
    }

    if dispatch.sweep_interval_secs == 0 {
        return Err(ConfigError::validation(
            "Sweep interval must be greater than 0",
        ));
    }

    if dispatch.event_buffer == 0 {
        return Err(ConfigError::validation(
            "Event buffer must be greater than 0",
        ));
    }

    // Parses the locale tag.
    dispatch.to_settings()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&SwitchyardConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = SwitchyardConfig::default();
        config.logging.level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = SwitchyardConfig::default();
        config
            .logging
            .filters
            .insert("switchyard_framework".into(), "verbose".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_dispatch_limits() {
        let cases: [fn(&mut DispatchConfig); 5] = [
            |d| d.prefix.clear(),
            |d| d.prefix = "! ".into(),
            |d| d.await_component_timeout_secs = 0,
            |d| d.sweep_interval_secs = 0,
            |d| d.default_locale = "??".into(),
        ];
        for mutate in cases {
            let mut config = SwitchyardConfig::default();
            mutate(&mut config.dispatch);
            assert!(
                matches!(validate_config(&config), Err(ConfigError::ValidationError { .. })),
                "{:?}",
                config.dispatch
            );
        }
    }

    #[test]
    fn test_file_output_requires_path() {
        let mut config = SwitchyardConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("switchyard.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
