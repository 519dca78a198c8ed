// SPDX-License-Identifier: Apache-2.0

//! Shell completion generation and installation.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use console::style;
use tracing::debug;

use crate::cli::Cli;

/// Where a shell's completion script goes and how to enable it.
#[derive(Debug, Clone)]
struct InstallTarget {
    path: PathBuf,
    instructions: &'static str,
    reload: &'static str,
}

fn install_target(shell: Shell, home: &Path) -> Result<InstallTarget> {
    let (relative, instructions, reload) = match shell {
        Shell::Bash => (
            ".bash_completion.d/oneapp",
            "Add to ~/.bashrc or ~/.bash_profile:\n  source ~/.bash_completion.d/oneapp",
            "source ~/.bashrc",
        ),
        Shell::Zsh => (
            ".zsh/completions/_oneapp",
            "Add to ~/.zshrc (before compinit):\n  fpath=(~/.zsh/completions $fpath)\n  \
             autoload -U compinit && compinit -i",
            "exec zsh",
        ),
        Shell::Fish => (
            ".config/fish/completions/oneapp.fish",
            "Completions are loaded from ~/.config/fish/completions/ automatically.",
            "exec fish",
        ),
        Shell::PowerShell => (
            ".config/powershell/oneapp.ps1",
            "Add to your PowerShell profile ($PROFILE):\n  . $HOME/.config/powershell/oneapp.ps1",
            ". $PROFILE",
        ),
        Shell::Elvish => (
            ".config/elvish/lib/oneapp.elv",
            "Add to ~/.config/elvish/rc.elv:\n  use oneapp",
            "Restart your terminal",
        ),
        _ => {
            return Err(anyhow!(
                "Unsupported shell: {shell:?}. Supported shells: bash, zsh, fish, powershell, elvish"
            ));
        }
    };
    Ok(InstallTarget {
        path: home.join(relative),
        instructions,
        reload,
    })
}

/// Maps a `$SHELL` value to a supported shell.
fn shell_from_path(shell_env: &str) -> Result<Shell> {
    let name = Path::new(shell_env)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Could not parse shell name from $SHELL"))?;
    match name {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        "pwsh" | "powershell" => Ok(Shell::PowerShell),
        "elvish" => Ok(Shell::Elvish),
        _ => Err(anyhow!(
            "Unsupported shell: {name}. Supported: bash, zsh, fish, powershell, elvish"
        )),
    }
}

fn script(shell: Shell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    let mut out = Vec::new();
    generate(shell, &mut cmd, name, &mut out);
    out
}

/// Generate completion script to stdout.
pub fn run_generate(shell: Shell) -> Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(&script(shell))?;
    stdout.flush()?;
    Ok(())
}

/// Install completion script to the standard location.
///
/// Detects the shell from `$SHELL` unless given, creates parent directories
/// and prints how to enable the script.
pub fn run_install(shell: Option<Shell>, dry_run: bool) -> Result<()> {
    let shell = match shell {
        Some(s) => s,
        None => {
            let env = std::env::var("SHELL")
                .context("$SHELL environment variable not set. Use --shell to specify.")?;
            shell_from_path(&env)?
        }
    };
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    let target = install_target(shell, &home)?;

    if dry_run {
        println!(
            "{}",
            style("DRY RUN - No files will be modified").yellow().bold()
        );
        println!();
        println!("{}", style(format!("Shell: {shell:?}")).cyan());
        println!(
            "{}",
            style(format!("Completion path: {}", target.path.display())).cyan()
        );
        println!();
        println!("{}", style("Configuration instructions:").bold());
        println!("{}", target.instructions);
        println!();
        return Ok(());
    }

    if let Some(parent) = target.path.parent()
        && !parent.exists()
    {
        debug!("Creating parent directory: {}", parent.display());
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    debug!("Writing completion script to: {}", target.path.display());
    fs::write(&target.path, script(shell))
        .with_context(|| format!("Failed to write {}", target.path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&target.path, fs::Permissions::from_mode(0o644))
            .context("Failed to set file permissions")?;
    }

    println!();
    println!(
        "{}",
        style("Completion script installed successfully!")
            .green()
            .bold()
    );
    println!(
        "  {}",
        style(format!("Location: {}", target.path.display())).cyan()
    );
    println!();
    println!("{}", style("Configuration instructions:").bold());
    println!("{}", target.instructions);
    println!();
    println!(
        "{}",
        style("After updating your shell config, restart your terminal or run:").dim()
    );
    println!("  {}", target.reload);
    println!();

    Ok(())
}
