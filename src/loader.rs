//! Role files: loading desired roles from YAML and exporting remote ones

use anyhow::{Context, Result};
use rolekit::Role;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A role file that was skipped while loading a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Roles loaded from disk plus the files that could not be parsed
#[derive(Debug, Default)]
pub struct LoadedRoles {
    pub roles: Vec<Role>,
    pub skipped: Vec<SkippedFile>,
}

/// A role file holds one role or a list of roles
#[derive(Deserialize)]
#[serde(untagged)]
enum RoleDocument {
    Many(Vec<Role>),
    One(Role),
}

/// Parse the roles in one YAML document
pub fn parse_roles(content: &str) -> Result<Vec<Role>, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(match serde_yaml::from_str(content)? {
        RoleDocument::Many(roles) => roles,
        RoleDocument::One(role) => vec![role],
    })
}

/// Load roles from a YAML file or a directory of YAML files.
///
/// A single file that fails to parse is an error. In a directory, files that
/// fail to parse are skipped and reported in [`LoadedRoles::skipped`]. The
/// resulting role set is validated before it is returned.
pub fn load_roles(path: &Path) -> Result<LoadedRoles> {
    let mut loaded = LoadedRoles::default();

    if path.is_file() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        loaded.roles = parse_roles(&content)
            .with_context(|| format!("Invalid role file {}", path.display()))?;
    } else if path.is_dir() {
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() || !is_yaml(entry.path()) {
                continue;
            }
            let file = entry.path();
            let parsed = fs::read_to_string(file)
                .map_err(|e| e.to_string())
                .and_then(|content| parse_roles(&content).map_err(|e| e.to_string()));
            match parsed {
                Ok(roles) => {
                    log::debug!("loaded {} roles from {}", roles.len(), file.display());
                    loaded.roles.extend(roles);
                }
                Err(reason) => {
                    log::warn!("skipping {}: {}", file.display(), reason);
                    loaded.skipped.push(SkippedFile {
                        path: file.to_path_buf(),
                        reason,
                    });
                }
            }
        }
    } else {
        anyhow::bail!("Role path {} does not exist", path.display());
    }

    rolekit::validate_roles(&loaded.roles)
        .with_context(|| format!("Invalid roles in {}", path.display()))?;
    Ok(loaded)
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

/// Write roles to `dir`, one `<name>.yaml` per role.
///
/// Lists are sorted and remote ids dropped so the files diff cleanly.
pub fn write_roles(dir: &Path, roles: &[Role]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Could not create {}", dir.display()))?;

    let mut written = Vec::with_capacity(roles.len());
    for role in roles {
        let mut role = role.clone();
        role.id = None;
        role.resources.allowed.sort();
        role.resources.denied.sort();
        role.members.sort();

        let path = dir.join(format!("{}.yaml", file_stem(&role.name)));
        let content = serde_yaml::to_string(&role)
            .with_context(|| format!("Could not serialize role {}", role.name))?;
        fs::write(&path, content).with_context(|| format!("Could not write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// File-system safe name for a role
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_role() {
        let roles = parse_roles(
            r"
name: editor
resources:
  allowed: [read, write]
  denied: [delete]
members:
  - a@example.com
",
        )
        .unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(
            roles[0],
            Role::new("editor")
                .allow(["write", "read"])
                .deny(["delete"])
                .with_members(["a@example.com"])
        );
    }

    #[test]
    fn test_parse_role_list_with_missing_fields() {
        let roles = parse_roles(
            r"
- name: admin
  resources:
    allowed: ['*']
- name: viewer
  resources:
    allowed: [read]
    denied:
",
        )
        .unwrap();
        assert_eq!(roles.len(), 2);
        assert!(roles[0].resources.denied.is_empty());
        assert!(roles[1].resources.denied.is_empty());
        assert!(roles[1].members.is_empty());
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(parse_roles("   \n").unwrap().is_empty());
    }

    #[test]
    fn test_load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("admin.yaml"), "name: admin\n").unwrap();
        fs::create_dir(dir.path().join("team")).unwrap();
        fs::write(
            dir.path().join("team").join("viewers.yml"),
            "- name: viewer\n- name: auditor\n",
        )
        .unwrap();
        fs::write(dir.path().join("broken.yaml"), "name: [unclosed\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a role").unwrap();

        let loaded = load_roles(dir.path()).unwrap();
        let mut names: Vec<&str> = loaded.roles.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["admin", "auditor", "viewer"]);
        assert_eq!(loaded.skipped.len(), 1);
        assert!(loaded.skipped[0].path.ends_with("broken.yaml"));
    }

    #[test]
    fn test_load_rejects_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.yaml"), "name: admin\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "name: admin\n").unwrap();

        let err = load_roles(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate role name: admin"));
    }

    #[test]
    fn test_load_single_file_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roles.yaml");
        fs::write(&path, "name: [unclosed\n").unwrap();
        assert!(load_roles(&path).is_err());
    }

    #[test]
    fn test_load_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_roles(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let roles = vec![
            Role::new("ops/admin").allow(["b", "a"]).with_id("r-1"),
            Role::new("viewer").with_members(["z@example.com", "a@example.com"]),
        ];

        let written = write_roles(dir.path(), &roles).unwrap();
        assert!(written[0].ends_with("ops_admin.yaml"));

        let content = fs::read_to_string(&written[0]).unwrap();
        assert!(!content.contains("r-1"));

        let loaded = load_roles(dir.path()).unwrap();
        assert_eq!(loaded.roles.len(), 2);
        assert!(loaded.roles.contains(&roles[0]));
        assert!(loaded.skipped.is_empty());
    }
}
