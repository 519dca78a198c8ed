// SPDX-License-Identifier: Apache-2.0

use std::io::{self, Write};

use console::style;

use crate::cli::OutputContext;
use crate::commands::types::{LinkResult, RepoResult, SetupResult};

use super::Renderable;

impl Renderable for RepoResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        let repo = &self.repository;
        writeln!(
            w,
            "{} Storage repository {} ({}, default branch {})",
            style("*").green().bold(),
            style(&repo.full_name).cyan(),
            if repo.private { "private" } else { "public" },
            repo.default_branch
        )?;
        writeln!(w, "  {}", style(&repo.html_url).cyan().underlined())
    }
}

impl Renderable for SetupResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        if self.created.is_empty() {
            return writeln!(
                w,
                "{} Directory {} is already set up.",
                style("*").green().bold(),
                style(&self.developer_id).cyan()
            );
        }
        writeln!(
            w,
            "{} Set up directory {}:",
            style("*").green().bold(),
            style(&self.developer_id).cyan()
        )?;
        for path in &self.created {
            writeln!(w, "  + {path}")?;
        }
        Ok(())
    }
}

impl Renderable for LinkResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        let link = &self.link;
        let pinned = link.pinned_commit.get(..7).unwrap_or(&link.pinned_commit);
        match link.store_commit {
            Some(ref commit) => writeln!(
                w,
                "{} Submodule {} {} to {} {}",
                style("*").green().bold(),
                style(&link.path).cyan(),
                self.action,
                pinned,
                style(format!("({})", commit.get(..7).unwrap_or(commit))).dim()
            )?,
            None => writeln!(
                w,
                "{} Submodule {} is up to date at {}",
                style("*").green().bold(),
                style(&link.path).cyan(),
                pinned
            )?,
        }
        writeln!(w, "  {}", style(&link.url).cyan().underlined())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::text;

    #[test]
    fn test_setup_lists_created_files() {
        let out = text(&SetupResult {
            developer_id: "42".to_string(),
            created: vec!["42/README.md".to_string()],
        });
        assert!(out.contains("+ 42/README.md"));
    }

    fn link(store_commit: Option<&str>) -> LinkResult {
        LinkResult {
            action: "updated",
            link: oneapp_core::SubmoduleLink {
                path: "developers/42".to_string(),
                url: "https://github.com/dev1/apps.git".to_string(),
                pinned_commit: "0123456789abcdef".to_string(),
                store_commit: store_commit.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_link_changed() {
        let out = text(&link(Some("fedcba9876543210")));
        assert!(out.contains("developers/42 updated to 0123456 (fedcba9)"));
    }

    #[test]
    fn test_link_unchanged() {
        let out = text(&link(None));
        assert!(out.contains("developers/42 is up to date at 0123456"));
    }

    #[test]
    fn test_setup_nothing_created() {
        let out = text(&SetupResult {
            developer_id: "42".to_string(),
            created: Vec::new(),
        });
        assert!(out.contains("already set up"));
    }
}
