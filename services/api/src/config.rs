use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Who may open teacher test sessions against a module. The original product
/// shipped two contradictory policies; here it is an explicit deployment
/// choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeacherTestScope {
    /// Any teacher may test any module.
    AnyTeacher,
    /// Only the module's author (or an admin) may test it.
    CreatorOnly,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    /// Absent credential is a valid runtime state: the engine then serves
    /// fallback content only.
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    pub chat_model: String,
    pub log_level: Level,
    pub teacher_test_scope: TeacherTestScope,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://lingua.db?mode=rwc".to_string());

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let openai_api_base = std::env::var("OPENAI_API_BASE")
            .unwrap_or_else(|_| "https://api.openai.com/v1/".to_string());

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let scope_str =
            std::env::var("TEACHER_TEST_SCOPE").unwrap_or_else(|_| "any-teacher".to_string());
        let teacher_test_scope = match scope_str.to_lowercase().as_str() {
            "any-teacher" => TeacherTestScope::AnyTeacher,
            "creator-only" => TeacherTestScope::CreatorOnly,
            other => {
                return Err(ConfigError::InvalidValue(
                    "TEACHER_TEST_SCOPE".to_string(),
                    format!("'{}' is not 'any-teacher' or 'creator-only'", other),
                ));
            }
        };

        Ok(Self {
            bind_address,
            database_url,
            openai_api_key,
            openai_api_base,
            chat_model,
            log_level,
            teacher_test_scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("BIND_ADDRESS");
            env::remove_var("DATABASE_URL");
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("OPENAI_API_BASE");
            env::remove_var("CHAT_MODEL");
            env::remove_var("RUST_LOG");
            env::remove_var("TEACHER_TEST_SCOPE");
        }
    }

    #[test]
    #[serial]
    fn defaults_without_any_env() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.database_url, "sqlite://lingua.db?mode=rwc");
        // No credential is a valid state, not an error.
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.teacher_test_scope, TeacherTestScope::AnyTeacher);
    }

    #[test]
    #[serial]
    fn custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("DATABASE_URL", "sqlite:///tmp/custom.db?mode=rwc");
            env::set_var("OPENAI_API_KEY", "test-key");
            env::set_var("CHAT_MODEL", "gpt-4o");
            env::set_var("RUST_LOG", "debug");
            env::set_var("TEACHER_TEST_SCOPE", "creator-only");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.openai_api_key, Some("test-key".to_string()));
        assert_eq!(config.chat_model, "gpt-4o");
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.teacher_test_scope, TeacherTestScope::CreatorOnly);
    }

    #[test]
    #[serial]
    fn invalid_bind_address() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn invalid_teacher_test_scope() {
        clear_env_vars();
        unsafe {
            env::set_var("TEACHER_TEST_SCOPE", "everyone");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "TEACHER_TEST_SCOPE"),
            _ => panic!("Expected InvalidValue for TEACHER_TEST_SCOPE"),
        }
    }

    #[test]
    fn config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );
    }
}
