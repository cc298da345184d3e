use std::str::FromStr;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Browser origin allowed by CORS.
    pub cors_origin: String,
    /// Page size of `GET /api/messages`.
    pub history_limit: usize,
    /// Hand relayed messages and read receipts to the message store.
    pub persist_events: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 5000,
            cors_origin: "http://localhost:3000".to_owned(),
            history_limit: 100,
            persist_events: true,
        }
    }
}

fn var_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match dotenv::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Read from the process environment, with `.env` loaded first if present.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: var_or("HOST", defaults.host)?,
            port: var_or("PORT", defaults.port)?,
            cors_origin: var_or("CORS_ORIGIN", defaults.cors_origin)?,
            history_limit: var_or("HISTORY_LIMIT", defaults.history_limit)?,
            persist_events: var_or("PERSIST_EVENTS", defaults.persist_events)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert_eq!(config.history_limit, 100);
        assert!(config.persist_events);
    }

    #[test]
    fn unset_var_falls_back() {
        let port: u16 = var_or("ROOMCAST_TEST_SURELY_UNSET", 1234).unwrap();
        assert_eq!(port, 1234);
    }
}
