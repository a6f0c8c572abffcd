use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub volume: VolumeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Name the audio server shows for this client.
    #[serde(default = "default_client_name")]
    pub name: String,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            server: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_client_name() -> String {
    "sinkctl".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct VolumeConfig {
    /// Percentage points used by relative volume changes.
    #[serde(default = "default_step")]
    pub step: u32,
    #[serde(default = "default_max_percent")]
    pub max_percent: i32,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            step: default_step(),
            max_percent: default_max_percent(),
        }
    }
}

impl VolumeConfig {
    /// `current` raised by `step` (or the configured step), capped at
    /// `max_percent` unless the sink is already above it.
    pub fn raised(&self, current: i32, step: Option<u32>) -> i32 {
        let ceiling = self.max_percent.max(current);
        current.saturating_add(self.step_points(step)).min(ceiling)
    }

    /// `current` lowered by `step` (or the configured step), never below 0.
    pub fn lowered(&self, current: i32, step: Option<u32>) -> i32 {
        current.saturating_sub(self.step_points(step)).max(0)
    }

    fn step_points(&self, step: Option<u32>) -> i32 {
        i32::try_from(step.unwrap_or(self.step)).unwrap_or(i32::MAX)
    }
}

fn default_step() -> u32 {
    5
}

fn default_max_percent() -> i32 {
    100
}

impl Config {
    /// Defaults, then the user config file, then `SINKCTL_` variables
    /// (`SINKCTL_CLIENT__TIMEOUT_MS=2000`).
    pub fn load() -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(dirs) = ProjectDirs::from("org", "sinkctl", "sinkctl") {
            figment = figment.merge(Toml::file(dirs.config_dir().join("config.toml")));
        }

        let config: Config = figment
            .merge(Env::prefixed("SINKCTL_").split("__"))
            .extract()?;

        Ok(config)
    }

    pub fn load_from_path(path: PathBuf) -> Result<Self, figment::Error> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SINKCTL_").split("__"));

        let config: Config = figment.extract()?;

        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.client.timeout_ms)
    }

    /// Server string with a leading `~` expanded to the home directory.
    pub fn server_address(&self) -> Option<String> {
        self.client
            .server
            .as_deref()
            .map(|server| shellexpand::tilde(server).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.client.name, "sinkctl");
        assert_eq!(config.client.server, None);
        assert_eq!(config.timeout(), Duration::from_millis(5000));
        assert_eq!(config.volume.step, 5);
        assert_eq!(config.volume.max_percent, 100);
    }

    #[test]
    fn test_raised_caps_at_max_percent() {
        let volume = VolumeConfig::default();

        assert_eq!(volume.raised(40, None), 45);
        assert_eq!(volume.raised(98, Some(10)), 100);
        // already boosted sinks are not pulled down
        assert_eq!(volume.raised(130, None), 130);
    }

    #[test]
    fn test_huge_step_saturates() {
        let volume = VolumeConfig::default();

        assert_eq!(volume.raised(40, Some(3_000_000_000)), 100);
        assert_eq!(volume.lowered(40, Some(3_000_000_000)), 0);
        assert_eq!(volume.lowered(40, Some(u32::MAX)), 0);
    }

    #[test]
    fn test_lowered_floors_at_zero() {
        let volume = VolumeConfig { step: 15, max_percent: 150 };

        assert_eq!(volume.lowered(40, None), 25);
        assert_eq!(volume.lowered(10, None), 0);
        assert_eq!(volume.raised(140, None), 150);
    }

    #[test]
    fn test_load_from_path_partial_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "sinkctl.toml",
                r#"
                [client]
                name = "mixer"
                timeout_ms = 250
                "#,
            )?;

            let config = Config::load_from_path(PathBuf::from("sinkctl.toml"))?;
            assert_eq!(config.client.name, "mixer");
            assert_eq!(config.timeout(), Duration::from_millis(250));
            assert_eq!(config.volume, VolumeConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("sinkctl.toml", "[volume]\nstep = 2\n")?;
            jail.set_env("SINKCTL_VOLUME__STEP", "10");
            jail.set_env("SINKCTL_CLIENT__SERVER", "tcp:localhost");

            let config = Config::load_from_path(PathBuf::from("sinkctl.toml"))?;
            assert_eq!(config.volume.step, 10);
            assert_eq!(config.client.server.as_deref(), Some("tcp:localhost"));
            Ok(())
        });
    }

    #[test]
    fn test_server_address_expands_home() {
        let mut config = Config::default();
        assert_eq!(config.server_address(), None);

        config.client.server = Some("tcp:127.0.0.1:4713".to_string());
        assert_eq!(config.server_address().as_deref(), Some("tcp:127.0.0.1:4713"));

        config.client.server = Some("~/pulse/native".to_string());
        let expanded = config.server_address().unwrap();
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/pulse/native"));
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[client]"));

        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
