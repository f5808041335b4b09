use std::env;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub reminders: ReminderConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// Whether the reminder scheduler worker is started.
    pub enabled: bool,
    /// Location used to resolve "today", "tomorrow" and recurrence anchors.
    pub timezone: Tz,
    /// How often (seconds) the scheduler polls for due reminders.
    pub poll_interval_seconds: u64,
    /// Delay (seconds) before a priority reminder that is still pending is escalated.
    pub escalation_delay_seconds: u64,
    /// Time of day used for recurring reminders given without an `at <time>` clause.
    pub default_time: NaiveTime,
}

impl ReminderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn escalation_delay(&self) -> Duration {
        Duration::from_secs(self.escalation_delay_seconds)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
                format!("sqlite://{}/mind.db", data_dir.trim_end_matches('/'))
            }
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            telegram: TelegramConfig {
                bot_token: env::var("BOT_TOKEN")
                    .map_err(|_| ConfigError::MissingEnv("BOT_TOKEN".to_string()))?,
            },
            reminders: ReminderConfig {
                enabled: match env::var("REMINDER_ENABLED") {
                    Ok(v) => match v.to_lowercase().as_str() {
                        "1" | "true" | "yes" => true,
                        "0" | "false" | "no" => false,
                        _ => true,
                    },
                    Err(_) => true,
                },
                timezone: match env::var("TIMEZONE") {
                    Ok(name) if !name.trim().is_empty() => name
                        .trim()
                        .parse::<Tz>()
                        .map_err(|_| ConfigError::InvalidValue("TIMEZONE".to_string()))?,
                    _ => Tz::UTC,
                },
                poll_interval_seconds: parse_poll_interval(
                    env::var("REMINDER_POLL_INTERVAL_SECONDS").ok().as_deref(),
                )?,
                escalation_delay_seconds: env::var("REMINDER_ESCALATION_DELAY_SECONDS")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()
                    .unwrap_or(120u64),
                default_time: match env::var("REMINDER_DEFAULT_TIME") {
                    Ok(v) => NaiveTime::parse_from_str(v.trim(), "%H:%M").map_err(|_| {
                        ConfigError::InvalidValue("REMINDER_DEFAULT_TIME".to_string())
                    })?,
                    Err(_) => default_reminder_time(),
                },
            },
        })
    }
}

/// The scheduler ticks every poll interval, so zero is rejected along with
/// anything that is not a whole number of seconds.
fn parse_poll_interval(raw: Option<&str>) -> Result<u64, ConfigError> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(60);
    };
    match raw.parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(seconds),
        _ => Err(ConfigError::InvalidValue(
            "REMINDER_POLL_INTERVAL_SECONDS".to_string(),
        )),
    }
}

fn default_reminder_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://data/mind.db".to_string(),
                max_connections: 5,
            },
            telegram: TelegramConfig {
                bot_token: String::new(),
            },
            reminders: ReminderConfig::default(),
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        ReminderConfig {
            enabled: true,
            timezone: Tz::UTC,
            poll_interval_seconds: 60,
            escalation_delay_seconds: 120,
            default_time: default_reminder_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.reminders.poll_interval(), Duration::from_secs(60));
        assert_eq!(cfg.reminders.escalation_delay(), Duration::from_secs(120));
        assert_eq!(cfg.reminders.timezone, Tz::UTC);
        assert_eq!(
            cfg.reminders.default_time,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        assert_eq!(cfg.database.url, "sqlite://data/mind.db");
    }

    #[test]
    fn poll_interval_must_be_positive() {
        assert_eq!(parse_poll_interval(None).unwrap(), 60);
        assert_eq!(parse_poll_interval(Some(" 15 ")).unwrap(), 15);
        assert!(matches!(
            parse_poll_interval(Some("0")),
            Err(ConfigError::InvalidValue(name)) if name == "REMINDER_POLL_INTERVAL_SECONDS"
        ));
        assert!(parse_poll_interval(Some("soon")).is_err());
        assert!(parse_poll_interval(Some("-5")).is_err());
    }
}
