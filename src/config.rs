use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_JOBS: usize = 4;
const DEFAULT_ROLES_DIR: &str = "roles";

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("rolesync"))
}

/// Default location of the config file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

// ============================================================================
// Config File
// ============================================================================

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub roles_dir: Option<String>,
    pub jobs: Option<usize>,
    pub auto_invite: Option<bool>,
    pub manage_members: Option<bool>,
}

impl FileConfig {
    /// Load the config file, or defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config file at {}", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

// ============================================================================
// Resolved Settings
// ============================================================================

/// Values given on the command line or through environment variables
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub roles: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub auto_invite: bool,
    pub no_members: bool,
}

/// Effective settings after applying precedence:
/// command line / environment, then config file, then defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub roles_path: PathBuf,
    pub jobs: usize,
    pub auto_invite: bool,
    pub manage_members: bool,
}

impl Settings {
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self> {
        let jobs = overrides.jobs.or(file.jobs).unwrap_or(DEFAULT_JOBS);
        if jobs == 0 {
            bail!("jobs must be at least 1");
        }

        let roles_path = match overrides.roles {
            Some(path) => path,
            None => expand_path(file.roles_dir.as_deref().unwrap_or(DEFAULT_ROLES_DIR)),
        };

        Ok(Self {
            api_url: overrides
                .api_url
                .or(file.api_url)
                .map(|u| u.trim_end_matches('/').to_string()),
            api_token: overrides.api_token,
            roles_path,
            jobs,
            auto_invite: overrides.auto_invite || file.auto_invite.unwrap_or(false),
            manage_members: !overrides.no_members && file.manage_members.unwrap_or(true),
        })
    }

    /// The API base URL, or an error explaining how to set it
    pub fn require_api_url(&self) -> Result<&str> {
        self.api_url.as_deref().context(
            "No API URL configured. Use --api-url, ROLESYNC_API_URL, or api_url in config.toml",
        )
    }
}

fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(FileConfig::default(), Overrides::default()).unwrap();
        assert_eq!(settings.jobs, 4);
        assert_eq!(settings.roles_path, PathBuf::from("roles"));
        assert!(!settings.auto_invite);
        assert!(settings.manage_members);
        assert!(settings.require_api_url().is_err());
    }

    #[test]
    fn test_file_values_apply() {
        let file = FileConfig::parse(
            r#"
api_url = "https://rbac.example.com/api/"
roles_dir = "policies"
jobs = 8
auto_invite = true
manage_members = false
"#,
        )
        .unwrap();
        let settings = Settings::resolve(file, Overrides::default()).unwrap();
        assert_eq!(settings.require_api_url().unwrap(), "https://rbac.example.com/api");
        assert_eq!(settings.roles_path, PathBuf::from("policies"));
        assert_eq!(settings.jobs, 8);
        assert!(settings.auto_invite);
        assert!(!settings.manage_members);
    }

    #[test]
    fn test_overrides_win() {
        let file = FileConfig {
            api_url: Some("https://file".into()),
            jobs: Some(8),
            ..Default::default()
        };
        let overrides = Overrides {
            api_url: Some("https://flag".into()),
            jobs: Some(1),
            roles: Some(PathBuf::from("/tmp/roles")),
            no_members: true,
            ..Default::default()
        };
        let settings = Settings::resolve(file, overrides).unwrap();
        assert_eq!(settings.api_url.as_deref(), Some("https://flag"));
        assert_eq!(settings.jobs, 1);
        assert_eq!(settings.roles_path, PathBuf::from("/tmp/roles"));
        assert!(!settings.manage_members);
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let overrides = Overrides {
            jobs: Some(0),
            ..Default::default()
        };
        assert!(Settings::resolve(FileConfig::default(), overrides).is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(FileConfig::parse("api_url = \"x\"\nthreads = 3\n").is_err());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "jobs = 2\n").unwrap();
        assert_eq!(FileConfig::load(&path).unwrap().jobs, Some(2));
    }
}
