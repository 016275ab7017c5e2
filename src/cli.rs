//! Command-line interface definition.
//!
//! All argument parsing lives here so the rest of the crate stays agnostic
//! to `clap`. The `Cli` struct is parsed once in `main` and dispatched to
//! the workspace operations.

use std::process::Command;

use clap::{Parser, Subcommand};

use crate::errors::FridgeError;

/// Top-level CLI arguments.
#[derive(Parser, Debug)]
#[command(
    name = "fridge",
    about = "Fridge stores snapshots of your working directory and keeps them fresh",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: FridgeCommand,
}

/// Subcommands wrapping the core workspace operations.
#[derive(Subcommand, Debug, PartialEq)]
pub enum FridgeCommand {
    /// Create a repository in the current directory.
    Init,
    /// Snapshot the working tree as a new commit.
    Commit {
        /// Commit message. Omit to compose one in $EDITOR.
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Restore a prior state. Omit REF to re-materialize the current HEAD.
    Checkout {
        /// Branch name or commit key.
        reference: Option<String>,
    },
    /// Create a branch at the current commit and switch to it.
    Branch {
        name: String,
    },
    /// Show the history reachable from HEAD.
    Log,
    /// List working-tree changes against the HEAD snapshot.
    Diff,
}

/// Compose a commit message by opening `$EDITOR` on a scratch file, the way
/// every version-control tool does when `-m` is omitted.
pub fn message_from_editor() -> Result<String, FridgeError> {
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let file = tempfile::Builder::new()
        .prefix("fridge-commit-")
        .suffix(".txt")
        .tempfile()
        .map_err(|e| FridgeError::io("fridge-commit.txt", e))?;

    let status = Command::new(&editor)
        .arg(file.path())
        .status()
        .map_err(|e| FridgeError::io(file.path(), e))?;
    if !status.success() {
        return Err(FridgeError::io(
            file.path(),
            std::io::Error::other(format!("{editor} exited with failure")),
        ));
    }

    // Read back by path: editors may replace the file instead of rewriting
    // it in place.
    std::fs::read_to_string(file.path()).map_err(|e| FridgeError::io(file.path(), e))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_parse_commit_with_message() {
        let cli = Cli::parse_from(["fridge", "commit", "-m", "m1"]);
        assert_eq!(
            cli.command,
            FridgeCommand::Commit {
                message: Some("m1".to_string())
            }
        );
    }

    #[test]
    fn test_parse_checkout_without_reference() {
        let cli = Cli::parse_from(["fridge", "checkout"]);
        assert_eq!(cli.command, FridgeCommand::Checkout { reference: None });
    }

    #[test]
    fn test_parse_branch_requires_name() {
        assert!(Cli::try_parse_from(["fridge", "branch"]).is_err());
    }
}
