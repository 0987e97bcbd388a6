use colored::Colorize;
use rolekit::{
    DiffSummary, ExecutionResult, MemberDeletions, MemberReport, RoleDiff, SyncPlan,
};

use crate::loader::SkippedFile;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// `[a, b, c]`
pub fn format_list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

// ============================================================================
// Plans and Results
// ============================================================================

/// Print the role plan, one coloured line per operation
pub fn display_plan(plan: &SyncPlan) {
    if plan.is_empty() {
        println!();
        println!("  {} Roles are up to date", "✓".green());
        return;
    }

    header("Role Plan");

    for role in &plan.creates {
        println!("  {} {}", "+".green(), role.name.bold());
        kv("allowed", &format_list(&role.resources.allowed));
        kv("denied", &format_list(&role.resources.denied));
        kv("members", &format_list(&role.members));
    }

    for update in &plan.updates {
        let diff = RoleDiff::from_update(update);
        println!("  {} {}", "~".yellow(), diff.name.bold());
        for change in &diff.added {
            println!(
                "      {} {}: {}",
                "+".green(),
                change.field.as_str().dimmed(),
                change.value
            );
        }
        for change in &diff.removed {
            println!(
                "      {} {}: {}",
                "-".red(),
                change.field.as_str().dimmed(),
                change.value
            );
        }
    }

    for name in &plan.deletes {
        println!("  {} {}", "-".red(), name.bold());
    }

    println!();
    println!("  {}", plan_summary(&DiffSummary::from_plan(plan)));
}

/// One-line plan summary
pub fn plan_summary(summary: &DiffSummary) -> String {
    format!(
        "Plan: {} to create, {} to update, {} to delete ({} additions, {} removals)",
        summary.creates, summary.updates, summary.deletes, summary.additions, summary.removals
    )
}

/// Print membership changes, applied or previewed
pub fn display_members(report: &MemberReport, dry_run: bool) {
    let suffix = if dry_run { " (preview)" } else { "" };
    section("Members");

    for (label, emails) in [
        ("assigned", &report.assigned),
        ("reassigned", &report.reassigned),
        ("invited", &report.invited),
    ] {
        if !emails.is_empty() {
            println!("  {} {} {}{}", "→".cyan(), emails.len(), label, suffix);
            for email in emails {
                dim(email);
            }
        }
    }

    if !report.skipped.is_empty() {
        warn(&format!(
            "{} members not on the team (use --auto-invite to invite them)",
            report.skipped.len()
        ));
        for email in &report.skipped {
            dim(email);
        }
    }

    if report.total_changes() == 0 && report.skipped.is_empty() {
        println!("  {} {} members up to date", "✓".green(), report.unchanged);
    }
}

/// Print members and invites no local role references
pub fn display_orphans(deletions: &MemberDeletions) {
    if deletions.is_empty() {
        return;
    }

    section("Orphaned Members");
    for email in &deletions.orphaned_users {
        println!("  {} {}", "•".yellow(), email);
    }
    for email in &deletions.orphaned_invites {
        println!("  {} {} {}", "•".yellow(), email, "(invite)".dimmed());
    }
}

/// Print files skipped while loading roles
pub fn display_skipped(skipped: &[SkippedFile]) {
    for file in skipped {
        warn(&format!("Skipped {}: {}", file.path.display(), file.reason));
    }
}

/// One-line execution summary
pub fn result_summary(result: &ExecutionResult) -> String {
    let prefix = if result.dry_run { "Would apply" } else { "Applied" };
    format!(
        "{}: {} created, {} updated, {} deleted",
        prefix, result.created, result.updated, result.deleted
    )
}

/// Print the outcome of a sync run
pub fn display_result(result: &ExecutionResult) {
    if let Some(members) = &result.members {
        display_members(members, result.dry_run);
    }
    if let Some(deletions) = &result.member_deletions
        && !deletions.is_empty()
    {
        display_orphans(deletions);
        dim("Not removed. Run 'rolesync members prune' to remove them.");
    }

    println!();
    match &result.error {
        None if result.dry_run => info(&format!("{} (dry run)", result_summary(result))),
        None => success(&result_summary(result)),
        Some(e) => {
            warn(&result_summary(result));
            dim(e.category().advice());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
