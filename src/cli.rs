use clap::{Parser, Subcommand};

use crate::jobs::MAX_RETENTION_DAYS;

#[derive(Debug, Parser)]
#[command(name = "cercania", about = "Location-aware chat backend", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Delete accepted and rejected invitations older than N days
    PurgeInvitations {
        /// Age threshold in days (defaults to INVITATION_RETENTION_DAYS)
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=MAX_RETENTION_DAYS))]
        days: Option<i64>,
    },
    /// Delete messages older than N days in batches
    PurgeMessages {
        /// Age threshold in days (defaults to MESSAGE_RETENTION_DAYS)
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=MAX_RETENTION_DAYS))]
        days: Option<i64>,
    },
    /// Mark users idle past the activity window as offline
    SweepInactive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["cercania"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn purge_commands_take_days() {
        let cli = Cli::try_parse_from(["cercania", "purge-invitations", "--days", "14"]).unwrap();
        assert_eq!(cli.command, Some(Command::PurgeInvitations { days: Some(14) }));

        let cli = Cli::try_parse_from(["cercania", "purge-messages"]).unwrap();
        assert_eq!(cli.command, Some(Command::PurgeMessages { days: None }));
    }

    #[test]
    fn sweep_inactive_parses() {
        let cli = Cli::try_parse_from(["cercania", "sweep-inactive"]).unwrap();
        assert_eq!(cli.command, Some(Command::SweepInactive));
    }

    #[test]
    fn days_must_be_a_sane_age() {
        for bad in ["-1", "36501", "99999999999999999999"] {
            let res = Cli::try_parse_from(["cercania", "purge-messages", "--days", bad]);
            assert!(res.is_err(), "{bad} accepted");
        }
        let cli = Cli::try_parse_from(["cercania", "purge-invitations", "--days", "0"]).unwrap();
        assert_eq!(cli.command, Some(Command::PurgeInvitations { days: Some(0) }));
    }
}
