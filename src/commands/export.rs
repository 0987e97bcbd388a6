//! `rolesync export` - snapshot remote roles as role files

use anyhow::Result;
use std::path::Path;

use crate::Context;
use crate::config::Overrides;
use crate::{loader, ui};

pub fn run(ctx: &Context, out: &Path) -> Result<()> {
    let settings = ctx.settings(Overrides::default())?;
    let client = super::client(&settings)?;
    let remote = super::fetch_remote(&client)?;

    let written = loader::write_roles(out, &remote)?;
    if ctx.verbose > 0 {
        for path in &written {
            ui::dim(&path.display().to_string());
        }
    }
    ui::success(&format!(
        "Exported {} roles to {}",
        written.len(),
        out.display()
    ));
    Ok(())
}
