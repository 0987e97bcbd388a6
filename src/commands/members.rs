//! `rolesync members` - membership maintenance

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use rolekit::{LogProgress, MemberClient, delete_members_and_invites, find_orphans};

use crate::Context;
use crate::config::Overrides;
use crate::ui;

/// Remove members and invites that no local role references
pub fn prune(ctx: &Context, yes: bool) -> Result<()> {
    let settings = ctx.settings(Overrides::default())?;
    let local = super::load_local(ctx, &settings)?;
    let client = super::client(&settings)?;

    let members = client
        .get_team_members()
        .context("Failed to fetch team members")?;
    let deletions = find_orphans(&local, &members);

    if deletions.is_empty() {
        println!();
        println!("  {} No orphaned members or invites", "✓".green());
        return Ok(());
    }

    ui::display_orphans(&deletions);
    println!();

    let prompt = format!(
        "Remove {} users and cancel {} invites?",
        deletions.orphaned_users.len(),
        deletions.orphaned_invites.len()
    );
    if !yes && !super::confirm(&prompt, false)? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let summary = delete_members_and_invites(&client, &deletions, &LogProgress)?;
    ui::success(&format!(
        "Removed {} users, cancelled {} invites",
        summary.users_removed, summary.invites_cancelled
    ));
    Ok(())
}
