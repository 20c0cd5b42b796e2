use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ccasfs::config::CcasConfig;
use ccasfs::fs::{Facade, OpenMode};
use ccasfs::master::Master;
use ccasfs::Client;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a CCASFS TOML configuration file
    #[arg(long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a file's contents, read from `--source` or stdin
    Write {
        path: String,
        #[arg(long)]
        source: Option<PathBuf>,
        /// Append to an existing file instead of overwriting it
        #[arg(long)]
        append: bool,
    },
    /// Print a file's contents to stdout
    Read { path: String },
    /// Tombstone a file
    Delete { path: String },
    /// Rename a file
    Rename { old: String, new: String },
    /// List a directory's shadow-tree entries
    Ls { path: String },
    /// Show size and shadow-tree timestamps for a path
    Stat { path: String },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = CcasConfig::from_toml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    let master = Arc::new(Master::new(&config));
    let client = Client::new(master);
    let facade = Facade::new(client, config.index_path.clone());

    match cli.command {
        Command::Write {
            path,
            source,
            append,
        } => {
            let bytes = match source {
                Some(src) => std::fs::read(&src)
                    .with_context(|| format!("reading source {}", src.display()))?,
                None => {
                    let mut buf = Vec::new();
                    io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };

            let mode = if append {
                OpenMode::Append
            } else {
                OpenMode::Write
            };
            let handle = facade.open(&path, mode)?;
            handle.write(&bytes)?;
            handle.close()?;
        }
        Command::Read { path } => {
            let bytes = facade.getcontents(&path)?;
            io::stdout().write_all(&bytes)?;
        }
        Command::Delete { path } => {
            facade.remove(&path)?;
        }
        Command::Rename { old, new } => {
            facade.rename(&old, &new)?;
        }
        Command::Ls { path } => {
            for name in facade.listdir(&path)? {
                println!("{name}");
            }
        }
        Command::Stat { path } => {
            let info = facade.getinfo(&path)?;
            println!("size: {}", info.size);
            if let Some(modified) = info.modified_time {
                println!("modified: {modified:?}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }
}
