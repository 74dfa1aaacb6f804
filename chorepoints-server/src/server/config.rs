use chorepoints_shared::auth::Role;
use chorepoints_shared::domain::{Child, Chore, SettingSeed};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;
use std::{env, fs, path::Path};

use crate::settlement::DEFAULT_JOB_CODE;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub children: Vec<Child>,
    #[serde(default)]
    pub chores: Vec<Chore>,
    /// Initial values of the numeric settings; edits made through the API win.
    #[serde(default)]
    pub settings: Vec<SettingSeed>,
    pub jwt_secret: String,
    pub users: Vec<UserConfig>,
    /// IANA name, e.g. `Europe/Warsaw`. Settlement dates are local to it.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub settlement: SettlementConfig,
    pub dev_cors_origin: Option<String>,
    pub listen_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub username: String,
    pub password_hash: String, // bcrypt hash
    pub role: Role,
    pub child_id: Option<String>, // required when role == child
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    #[serde(default = "default_job_code")]
    pub job_code: String,
    /// Local wall-clock time, `HH:MM`.
    #[serde(default = "default_run_at")]
    pub run_at: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            job_code: default_job_code(),
            run_at: default_run_at(),
            enabled: true,
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_job_code() -> String {
    DEFAULT_JOB_CODE.to_string()
}

fn default_run_at() -> String {
    "23:30".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Yaml(e) => write!(f, "YAML error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        ConfigError::Yaml(value)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from_path(path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(&path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone {:?}", self.timezone)))
    }

    pub fn run_at(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.settlement.run_at, "%H:%M").map_err(|_| {
            ConfigError::Invalid(format!(
                "settlement.run_at {:?} is not HH:MM",
                self.settlement.run_at
            ))
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;
        self.run_at()?;
        if self.settlement.job_code.trim().is_empty() {
            return Err(ConfigError::Invalid("settlement.job_code is empty".into()));
        }
        for u in &self.users {
            if u.role == Role::Child {
                match &u.child_id {
                    Some(id) if self.children.iter().any(|c| &c.id == id) => {}
                    Some(id) => {
                        return Err(ConfigError::Invalid(format!(
                            "user {} refers to unknown child {}",
                            u.username, id
                        )));
                    }
                    None => {
                        return Err(ConfigError::Invalid(format!(
                            "child user {} has no child_id",
                            u.username
                        )));
                    }
                }
            }
        }
        for chore in &self.chores {
            if let Some(h) = chore.bonus_end_time
                && !(0..=23).contains(&h)
            {
                return Err(ConfigError::Invalid(format!(
                    "chore {}: bonus_end_time {} is not an hour",
                    chore.id, h
                )));
            }
            if let Some(unknown) = chore
                .assigned_children
                .iter()
                .find(|id| !self.children.iter().any(|c| &c.id == *id))
            {
                return Err(ConfigError::Invalid(format!(
                    "chore {} is assigned to unknown child {}",
                    chore.id, unknown
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
children:
  - id: alice
    display_name: Alice
jwt_secret: s3cret
users:
  - username: mum
    password_hash: "$2b$04$abc"
    role: parent
  - username: alice
    password_hash: "$2b$04$abc"
    role: child
    child_id: alice
"#;

    #[test]
    fn defaults_apply() {
        let cfg = AppConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(cfg.tz().unwrap(), chrono_tz::UTC);
        assert_eq!(cfg.run_at().unwrap(), NaiveTime::from_hms_opt(23, 30, 0).unwrap());
        assert_eq!(cfg.settlement.job_code, DEFAULT_JOB_CODE);
        assert!(cfg.settlement.enabled);
        assert!(cfg.chores.is_empty());
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let text = format!("{MINIMAL}timezone: Mars/Olympus\n");
        assert!(matches!(
            AppConfig::from_yaml(&text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn child_user_must_point_at_known_child() {
        let text = MINIMAL.replace("child_id: alice", "child_id: bob");
        assert!(matches!(
            AppConfig::from_yaml(&text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn chores_and_settings_parse() {
        let text = format!(
            "{MINIMAL}{}",
            r#"timezone: Europe/Warsaw
settlement:
  run_at: "22:15"
chores:
  - id: dishes
    name: Dishes
    points: 10
    daily: true
    assignment_type: any_selected
    assigned_children: [alice]
settings:
  - key: daily_bonus
    name: Daily bonus
    value: 1.5
"#
        );
        let cfg = AppConfig::from_yaml(&text).unwrap();
        assert_eq!(cfg.tz().unwrap(), chrono_tz::Europe::Warsaw);
        assert_eq!(cfg.run_at().unwrap(), NaiveTime::from_hms_opt(22, 15, 0).unwrap());
        assert_eq!(cfg.chores[0].assigned_children, vec!["alice".to_string()]);
        assert_eq!(cfg.settings[0].value.to_string(), "1.5");
    }
}
