// SPDX-License-Identifier: Apache-2.0

use std::io::{self, Write};

use console::style;

use crate::cli::OutputContext;
use crate::commands::types::ReleaseResult;

use super::Renderable;

impl Renderable for ReleaseResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        writeln!(w)?;
        writeln!(
            w,
            "{} Released {} {} on {}{}",
            style("*").green().bold(),
            style(&self.app_id).cyan(),
            style(&self.version).bold(),
            self.channel,
            if self.release.prerelease {
                " (pre-release)"
            } else {
                ""
            }
        )?;
        writeln!(w, "  Tag: {}", self.release.tag_name)?;
        writeln!(w, "  {}", style(&self.release.html_url).cyan().underlined())?;
        writeln!(w)?;
        Ok(())
    }
}
