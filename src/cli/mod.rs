//! Command-line interface for Kinton.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::UserRole;

/// Kinton - restaurant loyalty stamps and rewards
#[derive(Parser)]
#[command(name = "kinton")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API server
    #[command(alias = "daemon")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Manage accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Show or change the runtime loyalty settings stored in the database
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create an account, typically a manager or admin
    Add {
        #[arg(long)]
        phone: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        name: String,

        #[arg(long, value_enum, default_value = "manager")]
        role: RoleArg,
    },

    /// Rotate an account's API key and optionally set a new password
    Reset {
        #[arg(long)]
        phone: String,

        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print the effective settings
    Show,

    /// Update the settings row; omitted values keep their current value
    Set {
        #[arg(long)]
        stamps_for_reward: Option<i32>,

        #[arg(long)]
        code_expiration_minutes: Option<i32>,

        #[arg(long)]
        reward_expiration_days: Option<i32>,

        #[arg(long)]
        maintenance: Option<bool>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RoleArg {
    Customer,
    Manager,
    Admin,
}

impl From<RoleArg> for UserRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Customer => Self::Customer,
            RoleArg::Manager => Self::Manager,
            RoleArg::Admin => Self::Admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_add() {
        let cli = Cli::try_parse_from([
            "kinton",
            "user",
            "add",
            "--phone",
            "5512345678",
            "--password",
            "secret1",
            "--name",
            "Rosa",
            "--role",
            "admin",
        ])
        .unwrap();

        let Some(Commands::User {
            command: UserCommands::Add { phone, role, .. },
        }) = cli.command
        else {
            panic!("expected user add");
        };

        assert_eq!(phone, "5512345678");
        assert_eq!(UserRole::from(role), UserRole::Admin);
    }

    #[test]
    fn test_parse_user_reset_without_password() {
        let cli = Cli::try_parse_from(["kinton", "user", "reset", "--phone", "0000000000"])
            .unwrap();

        let Some(Commands::User {
            command: UserCommands::Reset { phone, password },
        }) = cli.command
        else {
            panic!("expected user reset");
        };

        assert_eq!(phone, "0000000000");
        assert!(password.is_none());
    }

    #[test]
    fn test_user_add_defaults_to_manager() {
        let cli = Cli::try_parse_from([
            "kinton", "user", "add", "--phone", "5512345678", "--password", "secret1", "--name",
            "Rosa",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Some(Commands::User {
                command: UserCommands::Add {
                    role: RoleArg::Manager,
                    ..
                }
            })
        ));
    }
}
