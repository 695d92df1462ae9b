use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Process configuration, read once from `WASHSLOT_*` environment variables.
/// Unparseable values fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub max_connections: usize,
    pub sweep_interval: Duration,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 7878,
            data_dir: PathBuf::from("./data"),
            max_connections: 256,
            sweep_interval: Duration::from_secs(60),
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|s| parse::<u64>(&s));
        Self {
            bind: lookup("WASHSLOT_BIND").unwrap_or(defaults.bind),
            port: lookup("WASHSLOT_PORT")
                .and_then(|s| parse(&s))
                .unwrap_or(defaults.port),
            data_dir: lookup("WASHSLOT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            max_connections: lookup("WASHSLOT_MAX_CONNECTIONS")
                .and_then(|s| parse(&s))
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_connections),
            sweep_interval: parsed("WASHSLOT_SWEEP_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            metrics_port: lookup("WASHSLOT_METRICS_PORT").and_then(|s| parse(&s)),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), Config::default());
        assert_eq!(Config::default().listen_addr(), "0.0.0.0:7878");
    }

    #[test]
    fn reads_every_variable() {
        let c = config(&[
            ("WASHSLOT_BIND", "127.0.0.1"),
            ("WASHSLOT_PORT", "9000"),
            ("WASHSLOT_DATA_DIR", "/var/lib/washslot"),
            ("WASHSLOT_MAX_CONNECTIONS", "8"),
            ("WASHSLOT_SWEEP_INTERVAL_SECS", "5"),
            ("WASHSLOT_METRICS_PORT", "9100"),
        ]);
        assert_eq!(c.listen_addr(), "127.0.0.1:9000");
        assert_eq!(c.data_dir, PathBuf::from("/var/lib/washslot"));
        assert_eq!(c.max_connections, 8);
        assert_eq!(c.sweep_interval, Duration::from_secs(5));
        assert_eq!(c.metrics_port, Some(9100));
    }

    #[test]
    fn garbage_falls_back() {
        let c = config(&[
            ("WASHSLOT_PORT", "seventy"),
            ("WASHSLOT_MAX_CONNECTIONS", "0"),
            ("WASHSLOT_SWEEP_INTERVAL_SECS", "-1"),
            ("WASHSLOT_METRICS_PORT", "99999"),
        ]);
        assert_eq!(c.port, 7878);
        assert_eq!(c.max_connections, 256);
        assert_eq!(c.sweep_interval, Duration::from_secs(60));
        assert_eq!(c.metrics_port, None);
    }
}
