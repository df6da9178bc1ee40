use crate::cli::ReportFormat;
use anyhow::{Context, Result, bail};
use hardening::{Baseline, PollConfig, Schema, SectionValues, TopicKey, Value, ValueType};
use nessus::{Credentials, WaitConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("bastion"))
}

/// Expand `~` in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub ssh: SshSettings,
    pub poll: PollSettings,
    pub report: ReportSettings,
    pub scan: ScanSettings,
    /// baseline -> section -> topic -> value
    pub overrides: BTreeMap<String, BTreeMap<String, toml::Table>>,
    /// baseline -> setting -> value
    pub settings: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SshSettings {
    pub user: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<String>,
    pub connect_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_interval_secs: u64,
    pub control_dir: Option<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: None,
            port: None,
            identity_file: None,
            connect_timeout_secs: 30,
            retry_attempts: 5,
            retry_interval_secs: 10,
            control_dir: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 20,
            timeout_secs: 1800,
        }
    }
}

impl PollSettings {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_secs(self.interval_secs),
            Duration::from_secs(self.timeout_secs),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportSettings {
    /// Directory for report files (default: current directory)
    pub dir: Option<String>,
    pub format: ReportFormat,
}

/// Nessus server and polling for `bastion scan`
///
/// Also readable on its own from a `--settings` file, where the keys may be
/// spelled `API_URL`, `ACCESS_KEY` and `SECRET_KEY`.
#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanSettings {
    #[serde(alias = "API_URL")]
    pub api_url: Option<String>,
    #[serde(alias = "ACCESS_KEY")]
    pub access_key: Option<String>,
    #[serde(alias = "SECRET_KEY")]
    pub secret_key: Option<String>,
    /// Set to false for servers with a self-signed certificate
    pub verify_tls: bool,
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            access_key: None,
            secret_key: None,
            verify_tls: true,
            interval_secs: 10,
            timeout_secs: 6 * 3600,
        }
    }
}

impl fmt::Debug for ScanSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "********");
        f.debug_struct("ScanSettings")
            .field("api_url", &self.api_url)
            .field("access_key", &mask(&self.access_key))
            .field("secret_key", &mask(&self.secret_key))
            .field("verify_tls", &self.verify_tls)
            .field("interval_secs", &self.interval_secs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ScanSettings {
    /// Load a standalone settings file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read scan settings {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid scan settings {}", path.display()))
    }

    /// Server URL and API keys, all of which must be set
    pub fn credentials(&self) -> Result<Credentials> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Parameter {name} not defined in scan settings"))
        };
        Ok(Credentials::new(
            required(&self.api_url, "API_URL")?,
            required(&self.access_key, "ACCESS_KEY")?,
            required(&self.secret_key, "SECRET_KEY")?,
        ))
    }

    pub fn wait_config(&self) -> WaitConfig {
        WaitConfig {
            scan_interval: Duration::from_secs(self.interval_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            ..WaitConfig::default()
        }
    }
}

impl Config {
    /// Load the config file
    ///
    /// Without an explicit path a missing default file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = config_dir()?.join("config.toml");
                if !path.exists() {
                    log::debug!("No config at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                path
            }
        };
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply the configured overrides and settings for a baseline
    ///
    /// The result is a baseline derived from `baseline` under the same name, so
    /// bad overrides surface as the usual composition errors.
    pub fn apply(&self, baseline: Baseline, schema: &Schema) -> Result<Baseline> {
        let overrides = lookup(&self.overrides, baseline.name());
        let settings = lookup(&self.settings, baseline.name());
        if overrides.is_none() && settings.is_none() {
            return Ok(baseline);
        }

        let mut derived = baseline.derive(baseline.name());
        for (section, topics) in overrides.into_iter().flatten() {
            let mut values = SectionValues::new();
            for (topic, value) in topics {
                let key = TopicKey::new(section.as_str(), topic.as_str());
                let value = convert(value)
                    .with_context(|| format!("Invalid override for {key}"))?;
                let value = match schema.topic(&key) {
                    Some(spec) if spec.value_type == ValueType::Tuple => into_tuple(value),
                    _ => value,
                };
                values = values.set(topic.as_str(), value);
            }
            log::info!(
                "Overriding {} topic(s) of {section} in {}",
                values.len(),
                baseline.name()
            );
            derived.merge_section(section.as_str(), &values);
        }
        for (key, value) in settings.into_iter().flatten() {
            derived.set_setting(key.as_str(), value.as_str());
        }
        Ok(derived)
    }
}

fn lookup<'a, T>(entries: &'a BTreeMap<String, T>, baseline: &str) -> Option<&'a T> {
    entries
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(baseline))
        .map(|(_, entry)| entry)
}

fn convert(value: &toml::Value) -> Result<Value> {
    Ok(match value {
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Array(items) => {
            Value::List(items.iter().map(convert).collect::<Result<_>>()?)
        }
        toml::Value::Table(table) => Value::Map(
            table
                .iter()
                .map(|(k, v)| Ok((k.clone(), convert(v)?)))
                .collect::<Result<_>>()?,
        ),
        other => bail!("unsupported value type {}", other.type_str()),
    })
}

fn into_tuple(value: Value) -> Value {
    match value {
        Value::List(items) => Value::Tuple(items),
        other => other,
    }
}
