// SPDX-License-Identifier: Apache-2.0

use std::io::{self, Write};

use comfy_table::presets::{NOTHING, UTF8_FULL_CONDENSED};
use comfy_table::{ContentArrangement, Table};
use console::style;
use oneapp_core::AppMetadata;

use crate::cli::OutputContext;
use crate::commands::types::{AppListResult, AppResult, AppWriteResult, UploadResult};

use super::Renderable;

fn platforms(app: &AppMetadata) -> String {
    if app.platforms.is_empty() {
        return "-".to_string();
    }
    app.platforms
        .iter()
        .map(|p| p.platform.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Renderable for AppListResult {
    fn render_text(&self, w: &mut dyn Write, ctx: &OutputContext) -> io::Result<()> {
        writeln!(w)?;
        if self.apps.is_empty() {
            writeln!(
                w,
                "{} No apps on the {} channel.",
                style("!").yellow().bold(),
                self.channel
            )?;
            writeln!(w)?;
            return Ok(());
        }

        let mut table = Table::new();
        table
            .load_preset(if ctx.is_tty { UTF8_FULL_CONDENSED } else { NOTHING })
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["ID", "NAME", "VERSION", "CATEGORY", "PLATFORMS"]);
        for app in &self.apps {
            table.add_row(vec![
                app.id.clone(),
                app.name.clone(),
                app.version.clone(),
                app.category.clone(),
                platforms(app),
            ]);
        }
        writeln!(w, "{table}")?;
        writeln!(w)?;
        writeln!(
            w,
            "{}",
            style(format!("{} app(s) on {}", self.apps.len(), self.channel)).dim()
        )?;
        Ok(())
    }
}

impl Renderable for AppResult {
    fn render_text(&self, w: &mut dyn Write, ctx: &OutputContext) -> io::Result<()> {
        let app = &self.app;
        writeln!(w)?;
        writeln!(
            w,
            "{} {} {}",
            style(&app.name).bold(),
            style(&app.version).cyan(),
            style(format!("({}, {})", app.id, self.channel)).dim()
        )?;
        if !app.short_description.is_empty() {
            writeln!(w, "{}", app.short_description)?;
        }
        writeln!(w)?;
        writeln!(w, "  {}  {}", style("category:").dim(), app.category)?;
        if !app.tags.is_empty() {
            writeln!(w, "  {}  {}", style("tags:").dim(), app.tags.join(", "))?;
        }
        if !app.release_date.is_empty() {
            writeln!(w, "  {}  {}", style("released:").dim(), app.release_date)?;
        }
        for url in [&app.website_url, &app.support_email, &app.privacy_policy_url] {
            if !url.is_empty() {
                writeln!(w, "  {}", style(url).cyan())?;
            }
        }
        if !app.platforms.is_empty() {
            writeln!(w)?;
            writeln!(w, "{}", style("Packages:").bold())?;
            for p in &app.platforms {
                writeln!(
                    w,
                    "  {:<8} {:>10} bytes  {}",
                    p.platform.as_str(),
                    p.package_size,
                    style(&p.package_url).cyan()
                )?;
            }
        }
        if !app.release_notes.is_empty() {
            writeln!(w)?;
            writeln!(w, "{}", style("Release notes:").bold())?;
            writeln!(w, "{}", app.release_notes)?;
        }
        if ctx.verbose {
            writeln!(w)?;
            writeln!(w, "{}", app.description)?;
            for (platform, version) in &app.min_sdk_version {
                writeln!(w, "  {}  {platform} {version}", style("min sdk:").dim())?;
            }
            for url in &app.screenshot_urls {
                writeln!(w, "  {}  {url}", style("screenshot:").dim())?;
            }
        }
        writeln!(w)?;
        Ok(())
    }
}

impl Renderable for AppWriteResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        write!(
            w,
            "{} App {} {} on {}",
            style("*").green().bold(),
            style(&self.app_id).cyan(),
            self.action,
            self.channel
        )?;
        if let Some(ref sha) = self.commit_sha {
            write!(w, " {}", style(format!("({})", short_sha(sha))).dim())?;
        }
        writeln!(w)
    }
}

impl Renderable for UploadResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        writeln!(
            w,
            "{} Uploaded {} ({} bytes) for {} on {}",
            style("*").green().bold(),
            self.file_name,
            self.size,
            style(self.platform.as_str()).cyan(),
            self.channel
        )?;
        writeln!(w, "  {}", style(&self.url).cyan().underlined())
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
