pub mod apply;
pub mod export;
pub mod members;
pub mod plan;
pub mod validate;

use anyhow::{Context as AnyhowContext, Result};
use rolekit::{ExecutionResult, Role, RoleClient};

use crate::Context;
use crate::api::HttpClient;
use crate::config::{FileConfig, Overrides, Settings, default_config_path};
use crate::{loader, ui};

impl Context {
    /// Resolve settings from flags, environment and the config file
    pub fn settings(&self, mut overrides: Overrides) -> Result<Settings> {
        let path = match &self.global.config {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        let file = FileConfig::load(&path)?;

        overrides.api_url = self.global.api_url.clone();
        overrides.api_token = self.global.api_token.clone();
        overrides.roles = self.global.roles.clone();
        Settings::resolve(file, overrides)
    }
}

/// HTTP client for the configured service
pub(crate) fn client(settings: &Settings) -> Result<HttpClient> {
    let url = settings.require_api_url()?;
    log::debug!("using API at {url}");
    Ok(HttpClient::new(url, settings.api_token.clone()))
}

/// Load and validate the local role files, reporting skipped ones
pub(crate) fn load_local(ctx: &Context, settings: &Settings) -> Result<Vec<Role>> {
    let loaded = loader::load_roles(&settings.roles_path)?;
    ui::display_skipped(&loaded.skipped);
    if !ctx.quiet {
        ui::info(&format!(
            "Loaded {} roles from {}",
            loaded.roles.len(),
            settings.roles_path.display()
        ));
    }
    Ok(loaded.roles)
}

pub(crate) fn fetch_remote(client: &dyn RoleClient) -> Result<Vec<Role>> {
    client.list_roles().context("Failed to fetch remote roles")
}

/// Confirm with user
pub(crate) fn confirm(prompt: &str, default: bool) -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()?;

    Ok(confirmed)
}

/// Turn the error carried by a sync result into the command's error
pub(crate) fn into_result(result: ExecutionResult) -> Result<()> {
    match result.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
