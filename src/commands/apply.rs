//! `rolesync apply` - converge the service to the role files

use anyhow::Result;
use colored::Colorize;
use rolekit::{SyncOptions, compare_roles, sync};

use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::Overrides;
use crate::progress::BarProgress;
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let settings = ctx.settings(Overrides {
        jobs: args.jobs,
        auto_invite: args.auto_invite,
        no_members: args.no_members,
        ..Default::default()
    })?;
    let local = super::load_local(ctx, &settings)?;
    let client = super::client(&settings)?;
    let remote = super::fetch_remote(&client)?;

    let plan = compare_roles(&local, &remote).sorted();
    ui::display_plan(&plan);

    // Membership-only changes are applied without a prompt
    if !args.dry_run
        && !plan.is_empty()
        && !args.yes
        && !super::confirm("Apply these changes?", true)?
    {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let opts = SyncOptions {
        dry_run: args.dry_run,
        show_diff: false,
        jobs: settings.jobs,
        auto_invite: settings.auto_invite,
        manage_members: settings.manage_members,
        cancel: None,
    };
    log::info!(
        "applying with {} jobs (members {})",
        opts.jobs,
        if opts.manage_members { "managed" } else { "untouched" }
    );

    let progress = BarProgress::new(plan.total_changes(), ctx.quiet || args.dry_run);
    let result = sync(&local, &remote, &client, &opts, &progress);
    progress.finish();

    ui::display_result(&result);
    super::into_result(result)
}
