use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_STAT_PATH: &str = "/proc/stat";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stat_path: PathBuf,
    pub destination: SocketAddr,
    #[serde(with = "interval_serde")]
    pub interval: Duration,
    pub format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stat_path: PathBuf::from(DEFAULT_STAT_PATH),
            destination: SocketAddr::from((Ipv4Addr::LOCALHOST, crate::net::wire::DEFAULT_PORT)),
            interval: crate::net::EMIT_PERIOD,
            format: OutputFormat::Text,
        }
    }
}

impl Config {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))
    }
}

/// Parse a human-readable interval (e.g., "500ms", "2s", "1m"). Bare
/// numbers are seconds.
pub fn parse_interval(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim().to_lowercase();
    let (num_str, unit) = if let Some(n) = s.strip_suffix("ms") {
        (n, "ms")
    } else if let Some(n) = s.strip_suffix('s') {
        (n, "s")
    } else if let Some(n) = s.strip_suffix('m') {
        (n, "m")
    } else {
        (s.as_str(), "s")
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number in interval: {}", s))?;

    let interval = match unit {
        "ms" => Duration::from_millis(num),
        "s" => Duration::from_secs(num),
        "m" => num
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| anyhow::anyhow!("Invalid number in interval: {}", s))?,
        _ => return Err(anyhow::anyhow!("Invalid unit in interval: {}", s)),
    };

    if interval.is_zero() {
        return Err(anyhow::anyhow!("Interval must be greater than zero: {}", s));
    }
    Ok(interval)
}

mod interval_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}ms", value.as_millis()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_interval(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text, // Total:  12.34%  CPU0:   5.00% ...
    Json, // one UsageResult object per line
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid format: {}. Valid options: text, json", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_intervals() {
        assert_eq!(parse_interval("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_interval("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_interval("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_interval(" 1M ").unwrap(), Duration::from_secs(60));
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("fast").is_err());
        assert!(parse_interval("400000000000000000m").is_err());
        assert!(parse_interval(&format!("{}m", u64::MAX)).is_err());
    }

    #[test]
    fn parses_formats() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn defaults_target_localhost() {
        let config = Config::default();
        assert_eq!(config.destination, "127.0.0.1:1234".parse().unwrap());
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.stat_path, PathBuf::from("/proc/stat"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"destination": "10.0.0.5:4000", "interval": "250ms"}}"#).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.destination, "10.0.0.5:4000".parse().unwrap());
        assert_eq!(config.interval, Duration::from_millis(250));
        assert_eq!(config.format, OutputFormat::Text);
    }

    #[test]
    fn invalid_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(Config::load(file.path()).is_err());
    }
}
