use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::flows::{self, CliContext};

#[derive(Parser, Debug)]
#[command(name = "plugpack")]
#[command(about = "Package manager for plugin and script ecosystems", long_about = None)]
pub struct Cli {
    /// Prefix directory holding installed files and engine state.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Answer yes to every confirmation prompt.
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize remotes and apply pending updates.
    Sync {
        /// Remote names; every enabled remote when empty.
        names: Vec<String>,
    },
    /// Install packages given as remote/category/package[@version].
    Install {
        specs: Vec<String>,
        /// Keep the installed version out of future updates.
        #[arg(long)]
        pin: bool,
    },
    /// Uninstall packages given as remote/category/package.
    Uninstall { specs: Vec<String> },
    /// Exclude installed packages from updates.
    Pin { specs: Vec<String> },
    /// Include pinned packages in updates again.
    Unpin { specs: Vec<String> },
    /// Show installed packages.
    List {
        /// Limit output to one remote.
        remote: Option<String>,
    },
    /// Manage package remotes.
    #[command(subcommand)]
    Remote(RemoteCommand),
    /// Write a portable archive of every installed package.
    Export { path: PathBuf },
    /// Restore remotes and packages from an archive.
    Import { path: PathBuf },
    /// Print a shell completion script to stdout.
    Completions { shell: Shell },
}

#[derive(Subcommand, Debug)]
pub enum RemoteCommand {
    Add { name: String, url: String },
    Remove {
        name: String,
        /// Also uninstall everything installed from the remote.
        #[arg(long)]
        purge: bool,
    },
    List,
    Enable { name: String },
    Disable { name: String },
}

pub fn run_cli(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "plugpack", &mut io::stdout());
        return Ok(());
    }

    let ctx = CliContext::new(cli.root, cli.yes)?;
    match cli.command {
        Commands::Sync { names } => flows::sync(&ctx, &names),
        Commands::Install { specs, pin } => flows::install(&ctx, &specs, pin),
        Commands::Uninstall { specs } => flows::uninstall(&ctx, &specs),
        Commands::Pin { specs } => flows::set_pinned(&ctx, &specs, true),
        Commands::Unpin { specs } => flows::set_pinned(&ctx, &specs, false),
        Commands::List { remote } => flows::list(&ctx, remote.as_deref()),
        Commands::Remote(command) => flows::remote(&ctx, command),
        Commands::Export { path } => flows::export(&ctx, &path),
        Commands::Import { path } => flows::import(&ctx, &path),
        Commands::Completions { .. } => Ok(()),
    }
}
