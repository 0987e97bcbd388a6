//! `rolesync validate` - offline checks of the role files

use anyhow::{Context as AnyhowContext, Result};

use crate::Context;
use crate::config::Overrides;
use crate::{loader, ui};

pub fn run(ctx: &Context) -> Result<()> {
    let settings = ctx.settings(Overrides::default())?;
    let loaded = loader::load_roles(&settings.roles_path)?;
    ui::display_skipped(&loaded.skipped);

    let assignments = rolekit::member_assignments(&loaded.roles)
        .context("Members must belong to exactly one role")?;

    ui::header("Roles");
    for role in &loaded.roles {
        ui::kv(
            &role.name,
            &format!(
                "{} allowed, {} denied, {} members",
                role.resources.allowed.len(),
                role.resources.denied.len(),
                role.members.len()
            ),
        );
    }

    println!();
    if loaded.skipped.is_empty() {
        ui::success(&format!(
            "{} roles valid, {} members assigned",
            loaded.roles.len(),
            assignments.len()
        ));
    } else {
        ui::warn(&format!(
            "{} roles valid, {} files skipped",
            loaded.roles.len(),
            loaded.skipped.len()
        ));
    }
    if ctx.verbose > 0 {
        ui::dim(&settings.roles_path.display().to_string());
    }
    Ok(())
}
