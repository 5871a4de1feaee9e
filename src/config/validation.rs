//! Configuration validation

use super::{ConfigError, ConfigResult, RegistryConfig};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a complete node configuration.
    pub fn validate(config: &RegistryConfig) -> ConfigResult<()> {
        Self::validate_cluster(config)?;
        Self::validate_periods(config)?;
        Ok(())
    }

    fn validate_cluster(config: &RegistryConfig) -> ConfigResult<()> {
        if config.cluster_mode && config.server_list.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "server_list".to_string(),
            });
        }
        Self::validate_urls(&config.server_list)?;
        if let Some(my_url) = &config.my_url {
            Self::validate_urls(std::slice::from_ref(my_url))?;
        }
        Ok(())
    }

    fn validate_periods(config: &RegistryConfig) -> ConfigResult<()> {
        for (field, value) in [
            ("heartbeat_interval_ms", config.heartbeat_interval_ms),
            ("node_timeout_ms", config.node_timeout_ms),
            ("sweep_interval_ms", config.sweep_interval_ms),
            ("snapshot_interval_secs", config.snapshot_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }

        // A threshold at or below the sweep period would evict instances that
        // heartbeat exactly once per sweep.
        if config.node_timeout_ms <= config.sweep_interval_ms {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "node_timeout_ms ({}) must exceed sweep_interval_ms ({})",
                    config.node_timeout_ms, config.sweep_interval_ms
                ),
            });
        }
        Ok(())
    }

    fn validate_urls(urls: &[String]) -> ConfigResult<()> {
        for url in urls {
            let rest = url
                .strip_prefix("http://")
                .or_else(|| url.strip_prefix("https://"))
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "server_list".to_string(),
                    value: url.clone(),
                    reason: "URL must start with http:// or https://".to_string(),
                })?;

            let port_ok = rest
                .rsplit_once(':')
                .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
                .unwrap_or(false);
            if !port_ok {
                return Err(ConfigError::InvalidValue {
                    field: "server_list".to_string(),
                    value: url.clone(),
                    reason: "URL must be scheme://host:port".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_config(server_list: &[&str]) -> RegistryConfig {
        RegistryConfig {
            server_list: server_list.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn valid_cluster_config_passes() {
        let config = cluster_config(&["http://10.0.0.1:8484", "http://10.0.0.2:8484"]);
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn cluster_mode_requires_servers() {
        let config = cluster_config(&[]);
        assert!(matches!(
            ConfigValidator::validate(&config),
            Err(ConfigError::MissingRequired { .. })
        ));

        let standalone = RegistryConfig {
            cluster_mode: false,
            ..Default::default()
        };
        assert!(ConfigValidator::validate(&standalone).is_ok());
    }

    #[test]
    fn rejects_bad_urls() {
        for bad in ["10.0.0.1:8484", "http://:8484", "http://host", "http://host:notaport"] {
            let config = cluster_config(&[bad]);
            assert!(
                ConfigValidator::validate(&config).is_err(),
                "expected rejection of {bad}"
            );
        }
    }

    #[test]
    fn timeout_must_exceed_sweep_interval() {
        let mut config = cluster_config(&["http://10.0.0.1:8484"]);
        config.node_timeout_ms = 10_000;
        config.sweep_interval_ms = 10_000;
        assert!(matches!(
            ConfigValidator::validate(&config),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn zero_periods_are_rejected() {
        let mut config = cluster_config(&["http://10.0.0.1:8484"]);
        config.heartbeat_interval_ms = 0;
        assert!(matches!(
            ConfigValidator::validate(&config),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
