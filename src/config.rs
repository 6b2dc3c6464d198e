use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const ADDR_KEY: &str = "SHIFT_SOLVER_ADDR";
pub const THREADS_KEY: &str = "SHIFT_SOLVER_THREADS";
pub const SEED_KEY: &str = "SHIFT_SOLVER_SEED";
pub const LOG_KEY: &str = "SHIFT_SOLVER_LOG";
pub const TIME_LIMIT_KEY: &str = "SHIFT_SOLVER_TIME_LIMIT_SECS";

/// Options forwarded to the MILP backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub threads: i32,
    pub random_seed: i32,
    pub log_to_console: bool,
    /// Used when a request does not carry its own limit.
    pub time_limit: Option<Duration>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            threads: 1,        // limit to 1 thread for reproducibility
            random_seed: 1234, // set seed for reproducibility
            log_to_console: false,
            time_limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub solver: SolverOptions,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            solver: SolverOptions::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(addr) = parse(&lookup, ADDR_KEY)? {
            config.bind_addr = addr;
        }
        if let Some(threads) = parse::<i32>(&lookup, THREADS_KEY)? {
            if threads < 1 {
                return Err(invalid(THREADS_KEY, threads.to_string(), "must be at least 1"));
            }
            config.solver.threads = threads;
        }
        if let Some(seed) = parse(&lookup, SEED_KEY)? {
            config.solver.random_seed = seed;
        }
        if let Some(log) = parse(&lookup, LOG_KEY)? {
            config.solver.log_to_console = log;
        }
        if let Some(secs) = parse::<f64>(&lookup, TIME_LIMIT_KEY)? {
            if secs <= 0.0 {
                return Err(invalid(TIME_LIMIT_KEY, secs.to_string(), "must be positive"));
            }
            let limit = Duration::try_from_secs_f64(secs)
                .map_err(|e| invalid(TIME_LIMIT_KEY, secs.to_string(), &e.to_string()))?;
            config.solver.time_limit = Some(limit);
        }
        Ok(config)
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| invalid(key, raw.clone(), &e.to_string())),
    }
}

fn invalid(key: &'static str, value: String, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.solver.threads, 1);
    }

    #[test]
    fn reads_every_key() {
        let config = ServiceConfig::from_lookup(lookup(&[
            (ADDR_KEY, "0.0.0.0:9000"),
            (THREADS_KEY, "4"),
            (SEED_KEY, "7"),
            (LOG_KEY, "true"),
            (TIME_LIMIT_KEY, "2.5"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.solver.threads, 4);
        assert_eq!(config.solver.random_seed, 7);
        assert!(config.solver.log_to_console);
        assert_eq!(config.solver.time_limit, Some(Duration::from_millis(2500)));
    }

    #[rstest]
    #[case::not_a_number(THREADS_KEY, "many")]
    #[case::no_threads(THREADS_KEY, "0")]
    #[case::bad_addr(ADDR_KEY, "localhost")]
    #[case::negative_limit(TIME_LIMIT_KEY, "-1")]
    #[case::nan_limit(TIME_LIMIT_KEY, "NaN")]
    #[case::infinite_limit(TIME_LIMIT_KEY, "inf")]
    #[case::limit_overflows_duration(TIME_LIMIT_KEY, "1e20")]
    fn rejects_bad_values(#[case] key: &'static str, #[case] value: &str) {
        let err = ServiceConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: k, .. } if k == key));
    }
}
