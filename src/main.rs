//! `fridge`: snapshot storage for scientific working directories.
//!
//! Thin binary over the library: parses arguments, opens the repository in
//! the current directory and dispatches to the workspace operations. Every
//! surfaced failure prints a one-line diagnostic and exits non-zero.

use std::{process::ExitCode, rc::Rc};

use clap::Parser;
use colored::Colorize;

use fridge::cli::{self, Cli, FridgeCommand};
use fridge::errors::FridgeError;
use fridge::fridge::Fridge;
use fridge::fs::{FileSystem, OsFileSystem};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fridge: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), FridgeError> {
    let fs: Rc<dyn FileSystem> = Rc::new(OsFileSystem::new());
    let cwd = std::env::current_dir().map_err(|e| FridgeError::io(".", e))?;

    match cli.command {
        FridgeCommand::Init => {
            Fridge::init(&cwd, fs)?;
            println!("initialized empty fridge repository in {}", cwd.display());
        }
        FridgeCommand::Commit { message } => {
            let fridge = Fridge::open(&cwd, fs)?;
            let message = match message {
                Some(message) => message,
                None => cli::message_from_editor()?,
            };
            let key = fridge.commit(&message)?;
            println!("{}", key.yellow());
        }
        FridgeCommand::Checkout { reference } => {
            Fridge::open(&cwd, fs)?.checkout(reference.as_deref())?;
        }
        FridgeCommand::Branch { name } => {
            Fridge::open(&cwd, fs)?.branch(&name)?;
        }
        FridgeCommand::Log => {
            for (key, commit) in Fridge::open(&cwd, fs)?.log()? {
                let seconds = commit.timestamp.trunc() as i64;
                let nanos = (commit.timestamp.fract() * 1e9) as u32;
                let when = chrono::DateTime::from_timestamp(seconds, nanos)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| format!("{:.3}", commit.timestamp));
                println!("{} {}", key.yellow(), when);
                for line in commit.message.lines() {
                    println!("    {line}");
                }
                println!();
            }
        }
        FridgeCommand::Diff => {
            let summary = Fridge::open(&cwd, fs)?.diff()?;
            for path in &summary.added {
                println!("{} {path}", "A".green());
            }
            for path in &summary.updated {
                println!("{} {path}", "M".yellow());
            }
            for path in &summary.removed {
                println!("{} {path}", "D".red());
            }
        }
    }
    Ok(())
}
