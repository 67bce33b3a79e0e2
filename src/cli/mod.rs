//! CLI module - Command-line interface for capaccess
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Args, Parser, Subcommand};

/// capaccess - Caselaw Access Project accounts and access control
#[derive(Parser)]
#[command(name = "capaccess")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web server (default)
    #[command(alias = "web")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage the registration email domain blocklist
    Blocklist {
        #[command(subcommand)]
        command: BlocklistCommands,
    },

    /// Manage bulk case exports
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },

    /// Manage research contracts
    Contract {
        #[command(subcommand)]
        command: ContractCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user account
    Create {
        email: String,
        password: String,
        /// Allow the user to approve research requests
        #[arg(long)]
        approver: bool,
        /// Mark the email as verified and provision an API key
        #[arg(long)]
        verified: bool,
    },
    /// Grant or revoke the contract approver role
    Approver {
        email: String,
        #[arg(long)]
        revoke: bool,
    },
}

#[derive(Subcommand)]
pub enum BlocklistCommands {
    /// Block registrations from a domain and its subdomains
    Add { domain: String },
    /// Unblock a domain
    #[command(alias = "rm")]
    Remove { domain: String },
    /// List blocked domains
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Register an export file that already sits under the exports root
    Add(ExportAddArgs),
    /// List registered exports
    #[command(alias = "ls")]
    List,
}

#[derive(Args)]
pub struct ExportAddArgs {
    /// Path relative to `bulk.exports_root`
    pub file: String,
    /// Download file name (defaults to the file's base name)
    #[arg(long)]
    pub name: Option<String>,
    /// "text", "xml", "html" or "metadata"
    #[arg(long, default_value = "text")]
    pub body_format: String,
    /// "jurisdiction" or "reporter"
    #[arg(long, default_value = "jurisdiction")]
    pub filter_type: String,
    #[arg(long, default_value = "")]
    pub filter_slug: String,
    /// Restrict to the owner and users with unlimited access
    #[arg(long)]
    pub private: bool,
    /// Email of the owning user
    #[arg(long)]
    pub owner: Option<String>,
}

#[derive(Subcommand)]
pub enum ContractCommands {
    /// List pending research contracts
    #[command(alias = "ls")]
    List,
    /// Put a decided contract back to pending
    Reset { id: i32 },
}

pub use commands::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_export_add() {
        let cli = Cli::try_parse_from([
            "capaccess",
            "export",
            "add",
            "illinois/text.zip",
            "--private",
            "--owner",
            "owner@example.com",
        ])
        .unwrap();

        let Some(Commands::Export {
            command: ExportCommands::Add(args),
        }) = cli.command
        else {
            panic!("expected export add");
        };
        assert_eq!(args.file, "illinois/text.zip");
        assert!(args.private);
        assert_eq!(args.owner.as_deref(), Some("owner@example.com"));
        assert_eq!(args.body_format, "text");
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["capaccess"]).unwrap();
        assert!(cli.command.is_none());
    }
}
