use config::Source;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const CONFIG_FILE: &str = "config/ems";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub influx: InfluxSettings,
    pub tibber: TibberSettings,
    pub solcast: Option<SolcastSettings>,
    pub sonnen: Option<SonnenSettings>,
    pub ems: EmsSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    #[serde(default = "default_influx_url")]
    pub url: String,
    pub token: String,
    #[serde(default = "default_influx_org")]
    pub org: String,
    /// Bucket for prices and PV forecasts
    #[serde(default = "default_influx_bucket")]
    pub bucket: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TibberSettings {
    pub token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SolcastSettings {
    pub api_key: String,
    /// South-east roof
    pub site_1: String,
    /// South-west roof
    pub site_2: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SonnenSettings {
    pub ip: String,
    pub token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmsSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_decision_interval")]
    pub decision_interval_sec: u64,
    #[serde(default = "default_confirm_interval")]
    pub confirm_interval_sec: u64,
    #[serde(default = "default_actuation_interval")]
    pub actuation_interval_sec: u64,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    #[serde(default = "default_status_addr")]
    pub status_addr: String,
    #[serde(default = "default_heartbeat_path")]
    pub heartbeat_path: PathBuf,
}

impl EmsSettings {
    pub fn decision_interval(&self) -> Duration {
        Duration::from_secs(self.decision_interval_sec)
    }

    pub fn confirm_interval(&self) -> Duration {
        Duration::from_secs(self.confirm_interval_sec)
    }

    pub fn actuation_interval(&self) -> Duration {
        Duration::from_secs(self.actuation_interval_sec)
    }
}

fn default_influx_url() -> String {
    "http://influxdb:8086".to_string()
}

fn default_influx_org() -> String {
    "ems".to_string()
}

fn default_influx_bucket() -> String {
    "energy".to_string()
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_decision_interval() -> u64 {
    300
}

fn default_confirm_interval() -> u64 {
    60
}

fn default_actuation_interval() -> u64 {
    10
}

fn default_dry_run() -> bool {
    true
}

fn default_status_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_heartbeat_path() -> PathBuf {
    PathBuf::from("/var/log/ems/heartbeat")
}

/// Subscriber level: `[ems] log_level` once settings are loaded, otherwise
/// `EMS_LOG_LEVEL` so configuration errors are still reported.
pub fn log_level(ems: Option<&EmsSettings>) -> String {
    match ems {
        Some(ems) => ems.log_level.clone(),
        None => std::env::var("EMS_LOG_LEVEL").unwrap_or_else(|_| default_log_level()),
    }
}

/// Load all sections from `config/ems.toml` (optional) and the environment.
pub fn load_settings() -> anyhow::Result<Settings> {
    let file = config::Config::builder()
        .add_source(config::File::with_name(CONFIG_FILE).required(false))
        .build()?;

    Ok(Settings {
        influx: load_section(&file, "influx", config::Environment::with_prefix("INFLUX"))?,
        tibber: load_section(&file, "tibber", config::Environment::with_prefix("TIBBER"))?,
        solcast: load_optional_section(&file, "solcast", config::Environment::with_prefix("SOLCAST"))?,
        sonnen: load_optional_section(&file, "sonnen", config::Environment::with_prefix("SONNEN"))?,
        ems: load_section(&file, "ems", config::Environment::with_prefix("EMS"))?,
    })
}

fn section_config(
    file: &config::Config,
    section: &str,
    env: config::Environment,
) -> anyhow::Result<config::Config> {
    let mut builder = config::Config::builder();
    if let Ok(table) = file.get_table(section) {
        for (key, value) in table {
            builder = builder.set_default(key, value)?;
        }
    }

    Ok(builder.add_source(env.try_parsing(true)).build()?)
}

/// One section of the file, overridden by `PREFIX_KEY` environment variables.
fn load_section<T: DeserializeOwned>(
    file: &config::Config,
    section: &str,
    env: config::Environment,
) -> anyhow::Result<T> {
    let settings = section_config(file, section, env)?;
    settings
        .try_deserialize()
        .map_err(|e| anyhow::anyhow!("invalid [{}] configuration: {}", section, e))
}

/// Like `load_section`, but a section with no keys at all is `None`.
fn load_optional_section<T: DeserializeOwned>(
    file: &config::Config,
    section: &str,
    env: config::Environment,
) -> anyhow::Result<Option<T>> {
    let settings = section_config(file, section, env)?;
    if settings.collect()?.is_empty() {
        return Ok(None);
    }

    settings
        .try_deserialize()
        .map(Some)
        .map_err(|e| anyhow::anyhow!("invalid [{}] configuration: {}", section, e))
}
