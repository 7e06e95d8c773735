//! Application state management

use crate::auth::password::PasswordConfig;
use crate::data::Models;
use crate::templates::{TemplateError, Templates};
use concierge_core::AppConfig;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// One store per entity
    pub models: Models,
    /// Parsed HTML templates
    pub templates: Templates,
    /// Argon2 cost used when hashing new passwords
    pub password: PasswordConfig,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state; fails only if the templates do not parse
    pub fn new(config: AppConfig, models: Models) -> Result<Self, TemplateError> {
        Ok(Self {
            templates: Templates::new()?,
            password: PasswordConfig::from(&config.auth.password),
            config,
            models,
            start_time: Instant::now(),
        })
    }

    /// Replace the hashing cost, e.g. with a cheap one in tests
    pub fn with_password_config(mut self, password: PasswordConfig) -> Self {
        self.password = password;
        self
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Lifetime of a login token
    pub fn authentication_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.config.auth.authentication_ttl_hours)
    }

    /// Lifetime of an account activation token
    pub fn activation_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.config.auth.activation_ttl_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttls_follow_config() {
        let mut config = AppConfig::default();
        config.auth.authentication_ttl_hours = 2;
        let state = AppState::new(config, Models::in_memory()).unwrap();

        assert_eq!(state.authentication_ttl(), chrono::Duration::hours(2));
        assert_eq!(state.activation_ttl(), chrono::Duration::hours(72));
    }

    #[test]
    fn test_password_config_from_settings() {
        let mut config = AppConfig::default();
        config.auth.password.memory_kib = 8192;
        let state = AppState::new(config, Models::in_memory()).unwrap();

        assert_eq!(state.password.memory_cost, 8192);
    }
}
