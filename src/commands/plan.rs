//! `rolesync plan` - preview role and membership changes

use anyhow::Result;
use rolekit::{LogProgress, SyncOptions, compare_roles, sync};

use crate::Context;
use crate::config::{Overrides, Settings};
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let settings = ctx.settings(Overrides::default())?;
    let local = super::load_local(ctx, &settings)?;
    let client = super::client(&settings)?;
    let remote = super::fetch_remote(&client)?;

    let plan = compare_roles(&local, &remote).sorted();
    ui::display_plan(&plan);

    let result = sync(&local, &remote, &client, &preview_options(&settings), &LogProgress);
    ui::display_result(&result);
    super::into_result(result)
}

/// Dry-run options; the plan itself is already on screen, so no diff text
fn preview_options(settings: &Settings) -> SyncOptions {
    SyncOptions {
        dry_run: true,
        show_diff: false,
        jobs: settings.jobs,
        auto_invite: settings.auto_invite,
        manage_members: settings.manage_members,
        cancel: None,
    }
}
