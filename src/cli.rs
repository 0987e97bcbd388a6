use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rolesync")]
#[command(version)]
#[command(about = "Declarative sync of roles and team membership", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection and source options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (default: ~/.config/rolesync/config.toml)
    #[arg(long, global = true, env = "ROLESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the role service API
    #[arg(long, global = true, env = "ROLESYNC_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, global = true, env = "ROLESYNC_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Role file or directory of role files
    #[arg(short, long, global = true, env = "ROLESYNC_ROLES")]
    pub roles: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change, without changing anything
    Plan,

    /// Make the remote roles and membership match the role files
    Apply(ApplyArgs),

    /// Manage team members
    #[command(subcommand)]
    Members(MembersCommand),

    /// Check role files without contacting the service
    Validate,

    /// Write the remote roles to YAML files
    Export {
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Args, Debug, Clone, Default)]
pub struct ApplyArgs {
    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,

    /// Maximum concurrent API calls (1 runs sequentially)
    #[arg(short, long, env = "ROLESYNC_JOBS")]
    pub jobs: Option<usize>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Invite members who are not on the team yet
    #[arg(long)]
    pub auto_invite: bool,

    /// Leave team membership untouched
    #[arg(long)]
    pub no_members: bool,
}

// ============================================================================
// Members
// ============================================================================

#[derive(Subcommand)]
pub enum MembersCommand {
    /// Remove members and invites that no role references
    Prune {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
