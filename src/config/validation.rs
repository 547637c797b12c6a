use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::models::{LoggingConfig, ProxyConfig, ServerConfig, SolverConfig};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration, reporting every problem at once
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if let Err(mut proxy_errors) = Self::validate_proxy_config(&config.proxy) {
            errors.append(&mut proxy_errors);
        }

        if let Err(e) = Self::validate_solver_config(&config.solver) {
            errors.push(e);
        }

        if let Err(e) = Self::validate_logging_config(&config.logging) {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_proxy_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if !config.prefix.starts_with('/') || config.prefix.len() < 2 {
            errors.push(ValidationError::InvalidField {
                field: "proxy.prefix".to_string(),
                message: format!(
                    "Prefix must start with '/' and name at least one segment, got '{}'",
                    config.prefix
                ),
            });
        } else if config.prefix.ends_with('/') {
            errors.push(ValidationError::InvalidField {
                field: "proxy.prefix".to_string(),
                message: "Prefix must not end with '/'".to_string(),
            });
        }

        if let Err(e) = Self::validate_url(&config.upstream, "proxy.upstream") {
            errors.push(e);
        }

        if config.max_timeout_ms == 0 {
            errors.push(ValidationError::InvalidField {
                field: "proxy.max_timeout_ms".to_string(),
                message: "Timeout must be greater than 0".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_solver_config(config: &SolverConfig) -> ValidationResult<()> {
        Self::validate_url(&config.url, "solver.url")
    }

    fn validate_logging_config(config: &LoggingConfig) -> ValidationResult<()> {
        EnvFilter::try_new(&config.level)
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidField {
                field: "logging.level".to_string(),
                message: format!("Invalid log filter '{}': {e}", config.level),
            })
    }

    /// Validate URL format
    fn validate_url(url_str: &str, context: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Invalid URL format: {e}"),
            }),
        }
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.is_empty() {
            return "No errors".to_string();
        }

        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
