use crate::error::ConfigError;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug)]
pub struct Config {
    pub app_name: String,
    pub database_url: String,
    pub server_port: u16,
    pub seed_demo_data: bool,
    pub mqtt: Option<MqttConfig>,
}

/// Transport settings, only present if a broker host is configured
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
    pub circuit_cooldown: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            max_attempts: 10,
            circuit_cooldown: Duration::from_secs(120),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_name =
            lookup("APP_NAME").unwrap_or_else(|| "Eve Aether Home Guardian".to_owned());
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://data/app.db".to_owned());
        let server_port = parse_or(&lookup, "SERVER_PORT", 8000)?;
        let seed_demo_data = parse_or(&lookup, "SEED_DEMO_DATA", true)?;

        let mqtt = match lookup("MQTT_BROKER_HOST").filter(|host| !host.trim().is_empty()) {
            Some(host) => {
                let defaults = ReconnectConfig::default();
                let reconnect = ReconnectConfig {
                    initial_backoff: Duration::from_millis(parse_or(
                        &lookup,
                        "MQTT_BACKOFF_INITIAL_MS",
                        defaults.initial_backoff.as_millis() as u64,
                    )?),
                    max_backoff: Duration::from_millis(parse_or(
                        &lookup,
                        "MQTT_BACKOFF_MAX_MS",
                        defaults.max_backoff.as_millis() as u64,
                    )?),
                    max_attempts: parse_or(&lookup, "MQTT_MAX_ATTEMPTS", defaults.max_attempts)?,
                    circuit_cooldown: Duration::from_secs(parse_or(
                        &lookup,
                        "MQTT_CIRCUIT_COOLDOWN_SECS",
                        defaults.circuit_cooldown.as_secs(),
                    )?),
                };
                if reconnect.max_attempts == 0 {
                    return Err(ConfigError::Invalid("MQTT_MAX_ATTEMPTS", "0".to_owned()));
                }

                Some(MqttConfig {
                    host: host.trim().to_owned(),
                    port: parse_or(&lookup, "MQTT_BROKER_PORT", 1883)?,
                    client_id: lookup("MQTT_CLIENT_ID")
                        .filter(|id| !id.trim().is_empty())
                        .unwrap_or_else(|| format!("aether-{}", uuid::Uuid::new_v4())),
                    keep_alive: Duration::from_secs(parse_or(
                        &lookup,
                        "MQTT_KEEP_ALIVE_SECS",
                        60,
                    )?),
                    reconnect,
                })
            }
            None => None,
        };

        Ok(Config {
            app_name,
            database_url,
            server_port,
            seed_demo_data,
            mqtt,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_broker() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!("Eve Aether Home Guardian", config.app_name);
        assert_eq!("sqlite://data/app.db", config.database_url);
        assert_eq!(8000, config.server_port);
        assert!(config.seed_demo_data);
        assert!(config.mqtt.is_none());
    }

    #[test]
    fn test_broker_enables_transport() {
        let config = Config::from_lookup(lookup_from(&[
            ("MQTT_BROKER_HOST", "mqtt"),
            ("MQTT_BROKER_PORT", "1884"),
            ("MQTT_CLIENT_ID", "aether-test"),
            ("MQTT_MAX_ATTEMPTS", "3"),
        ]))
        .unwrap();

        let mqtt = config.mqtt.unwrap();
        assert_eq!("mqtt", mqtt.host);
        assert_eq!(1884, mqtt.port);
        assert_eq!("aether-test", mqtt.client_id);
        assert_eq!(Duration::from_secs(60), mqtt.keep_alive);
        assert_eq!(3, mqtt.reconnect.max_attempts);
        assert_eq!(
            ReconnectConfig::default().max_backoff,
            mqtt.reconnect.max_backoff
        );
    }

    #[test]
    fn test_generated_client_id() {
        let config = Config::from_lookup(lookup_from(&[("MQTT_BROKER_HOST", "mqtt")])).unwrap();
        assert!(config.mqtt.unwrap().client_id.starts_with("aether-"));
    }

    #[test]
    fn test_invalid_values() {
        let invalid = [
            ("SERVER_PORT", "eighty"),
            ("SEED_DEMO_DATA", "yes"),
        ];
        for (key, value) in invalid {
            let result = Config::from_lookup(lookup_from(&[(key, value)]));
            assert!(matches!(result, Err(ConfigError::Invalid(k, _)) if k == key));
        }

        let result = Config::from_lookup(lookup_from(&[
            ("MQTT_BROKER_HOST", "mqtt"),
            ("MQTT_MAX_ATTEMPTS", "0"),
        ]));
        assert!(result.is_err());
    }
}
