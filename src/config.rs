use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{0} is invalid: {1}")]
    Invalid(&'static str, String),
    #[error("SESSION_SECRET must be at least 32 bytes")]
    WeakSecret,
}

/// Environment-provided settings; `.env` is honored for local development.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub session_secret: String,
    pub port: u16,
    /// Turns on the secure flag of the session cookie.
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "cinelog_db".to_owned());
        let session_secret =
            env::var("SESSION_SECRET").map_err(|_| ConfigError::Missing("SESSION_SECRET"))?;
        if session_secret.len() < 32 {
            return Err(ConfigError::WeakSecret);
        }
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|err: std::num::ParseIntError| {
                    ConfigError::Invalid("PORT", err.to_string())
                })?,
            Err(_) => 3000,
        };
        let production = env::var("PRODUCTION")
            .map(|raw| parse_flag(&raw))
            .unwrap_or(false);
        Ok(Config {
            database_path,
            session_secret,
            port,
            production,
        })
    }
}

fn parse_flag(raw: &str) -> bool {
    raw == "1" || raw.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing() {
        assert!(parse_flag("1"));
        assert!(parse_flag("true"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("no"));
        assert!(!parse_flag(""));
    }
}
