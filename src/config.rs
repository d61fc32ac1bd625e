use std::{env, fmt::Display, str::FromStr, time::Duration};

use crate::error::ConfigError;
use crate::marker_sys::LatLon;


const DEFAULT_DATABASE_URL: &'static str = "crisis_map.sqlite";
const DEFAULT_APP_ID: &'static str = "crisis-map";
const DEFAULT_WEATHER_API_URL: &'static str = "https://api.openweathermap.org";
const DEFAULT_GEOCODE_API_URL: &'static str = "https://nominatim.openstreetmap.org";
const DEFAULT_GEOCODE_USER_AGENT: &'static str = "CrisisMapServer/0.1";
// Bulacan, Philippines.
const DEFAULT_LATITUDE: f64 = 14.7921;
const DEFAULT_LONGITUDE: f64 = 120.8782;
const DEFAULT_SESSION_IDLE_MINUTES: u64 = 12 * 60;


pub struct Config {
    pub database_url: String,
    pub secure_password: Option<String>,
    /// Endpoint answering `{"password": "..."}`; replaces `secure_password`.
    pub password_secret_url: Option<String>,
    pub openweather_api_key: Option<String>,
    pub app_id: String,
    pub default_position: LatLon,
    pub weather_api_url: String,
    pub geocode_api_url: String,
    pub geocode_user_agent: String,
    pub session_idle_limit: Duration,
    pub sentry_dsn: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError> where
        F: Fn(&str) -> Option<String> {

        let text = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_owned())
        };
        let secret = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let latitude = parse_or(&lookup, "DEFAULT_LATITUDE", DEFAULT_LATITUDE)?;
        let longitude = parse_or(&lookup, "DEFAULT_LONGITUDE", DEFAULT_LONGITUDE)?;
        let idle_minutes = parse_or(&lookup, "SESSION_IDLE_MINUTES", DEFAULT_SESSION_IDLE_MINUTES)?;
        let idle_secs = idle_minutes.checked_mul(60).ok_or_else(|| ConfigError::Invalid {
            key: "SESSION_IDLE_MINUTES".to_owned(),
            value: idle_minutes.to_string(),
        })?;

        Ok(Config {
            database_url: text("DATABASE_URL", DEFAULT_DATABASE_URL),
            secure_password: secret("SECURE_PASSWORD"),
            password_secret_url: secret("PASSWORD_SECRET_URL"),
            openweather_api_key: secret("OPENWEATHER_API_KEY"),
            app_id: text("APP_ID", DEFAULT_APP_ID),
            default_position: LatLon::new(latitude, longitude),
            weather_api_url: text("WEATHER_API_URL", DEFAULT_WEATHER_API_URL),
            geocode_api_url: text("GEOCODE_API_URL", DEFAULT_GEOCODE_API_URL),
            geocode_user_agent: text("GEOCODE_USER_AGENT", DEFAULT_GEOCODE_USER_AGENT),
            session_idle_limit: Duration::from_secs(idle_secs),
            sentry_dsn: secret("SENTRY_DSN"),
        })
    }

    /// Realtime collection holding the current report of every identity.
    pub fn report_collection(&self) -> String {
        format!("artifacts/{}/public/data/currentFloodStatusByUsers", self.app_id)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError> where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display {

    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_owned(),
            value,
        }),
        None => Ok(default),
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use super::*;

    fn config_of(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_of(&[]).unwrap();

        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.secure_password, None);
        assert_eq!(config.password_secret_url, None);
        assert_eq!(config.default_position, LatLon::new(14.7921, 120.8782));
        assert_eq!(config.session_idle_limit, Duration::from_secs(12 * 60 * 60));
        assert_eq!(config.report_collection(),
            "artifacts/crisis-map/public/data/currentFloodStatusByUsers");
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let config = config_of(&[("SECURE_PASSWORD", "   "), ("APP_ID", "demo")]).unwrap();

        assert_eq!(config.secure_password, None);
        assert_eq!(config.app_id, "demo");
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = config_of(&[("DEFAULT_LATITUDE", "north")]).err().unwrap();

        assert_eq!(err, ConfigError::Invalid {
            key: "DEFAULT_LATITUDE".into(),
            value: "north".into(),
        });
    }

    #[test]
    fn oversized_idle_minutes_is_rejected() {
        let err = config_of(&[("SESSION_IDLE_MINUTES", "307445734561825861")]).err().unwrap();

        assert_eq!(err, ConfigError::Invalid {
            key: "SESSION_IDLE_MINUTES".into(),
            value: "307445734561825861".into(),
        });
    }
}
