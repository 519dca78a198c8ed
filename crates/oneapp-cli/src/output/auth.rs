// SPDX-License-Identifier: Apache-2.0

use std::io::{self, Write};

use console::style;

use crate::cli::OutputContext;
use crate::commands::types::{AuthStatusResult, LoginResult, LogoutResult, ProfileResult};

use super::Renderable;

impl Renderable for LoginResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        writeln!(w)?;
        if self.already_authenticated {
            writeln!(
                w,
                "{} Already signed in as {}.",
                style("!").yellow().bold(),
                style(&self.profile.github_username).cyan()
            )?;
            writeln!(
                w,
                "Run {} first to sign in with another account.",
                style("oneapp auth logout").cyan()
            )?;
        } else {
            writeln!(
                w,
                "{} Signed in as {} ({})",
                style("*").green().bold(),
                style(&self.profile.github_username).cyan(),
                self.profile.display_name
            )?;
        }
        writeln!(w)?;
        Ok(())
    }
}

impl Renderable for LogoutResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        if self.was_authenticated {
            writeln!(
                w,
                "{} Logged out. Token and cached profile removed.",
                style("*").green().bold()
            )
        } else {
            writeln!(w, "{} No stored session.", style("!").yellow().bold())
        }
    }
}

impl Renderable for AuthStatusResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        writeln!(w)?;
        if self.authenticated {
            writeln!(w, "{} Authenticated with GitHub", style("*").green().bold())?;
            if let Some(ref username) = self.username {
                writeln!(w, "  Username: {}", style(username).cyan())?;
            }
            writeln!(w, "  Token store: {}", self.backend)?;
            if let Some(ref limit) = self.rate_limit {
                let line = limit.message();
                if limit.is_low() {
                    writeln!(w, "  {}", style(line).yellow())?;
                } else {
                    writeln!(w, "  {}", style(line).dim())?;
                }
            }
        } else {
            writeln!(
                w,
                "{} Not authenticated. Run {} to authenticate.",
                style("!").yellow().bold(),
                style("oneapp auth login").cyan()
            )?;
        }
        writeln!(w)?;
        Ok(())
    }
}

impl Renderable for ProfileResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        let p = &self.profile;
        writeln!(w)?;
        writeln!(
            w,
            "{} {}",
            style(&p.display_name).bold(),
            style(format!("@{}", p.github_username)).cyan()
        )?;
        let fields = [
            ("Id", p.id.as_str()),
            ("Bio", p.bio.as_str()),
            ("Email", p.email.as_str()),
            ("Website", p.website.as_str()),
            ("GitHub", p.github_repo_url.as_str()),
        ];
        for (label, value) in fields.iter().filter(|(_, v)| !v.is_empty()) {
            writeln!(w, "  {}  {value}", style(format!("{label:<8}")).dim())?;
        }
        if p.is_verified {
            writeln!(w, "  {}", style("Verified developer").green())?;
        }
        if !self.refreshed {
            writeln!(w)?;
            writeln!(
                w,
                "{}",
                style("Cached profile. Use --refresh to fetch from GitHub.").dim()
            )?;
        }
        writeln!(w)?;
        Ok(())
    }
}
