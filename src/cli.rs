use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use crate::logic::changes::{parse_assignment, parse_flag_key, ChangeSet, FlagKey, ValueKey};

/// authconf - authentication and identity configuration tool
#[derive(Parser, Debug)]
#[command(name = "authconf")]
#[command(about = "Configure the system authentication and identity stack")]
#[command(version)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["test", "update", "updateall", "probe", "savebackup", "restorebackup", "restorelastbackup"])
))]
pub struct Cli {
    /// Enable a boolean setting (repeatable), e.g. `--enable sssd`
    #[arg(long, value_name = "KEY", value_parser = parse_flag_key)]
    pub enable: Vec<FlagKey>,

    /// Disable a boolean setting (repeatable); wins over --enable
    #[arg(long, value_name = "KEY", value_parser = parse_flag_key)]
    pub disable: Vec<FlagKey>,

    /// Set a value (repeatable), e.g. `--set krb5realm=EXAMPLE.COM`
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(ValueKey, String)>,

    /// Print the resulting settings without writing anything
    #[arg(long)]
    pub test: bool,

    /// Write the artifacts whose settings changed
    #[arg(long)]
    pub update: bool,

    /// Rewrite every artifact
    #[arg(long)]
    pub updateall: bool,

    /// Probe the network for LDAP and Kerberos defaults
    #[arg(long)]
    pub probe: bool,

    /// Save a backup of the configuration under NAME
    #[arg(long, value_name = "NAME")]
    pub savebackup: Option<String>,

    /// Restore the backup saved under NAME
    #[arg(long, value_name = "NAME")]
    pub restorebackup: Option<String>,

    /// Restore the backup taken before the last configuration change
    #[arg(long)]
    pub restorelastbackup: bool,

    /// Do not start, stop or restart services
    #[arg(long)]
    pub nostart: bool,

    /// Operate on the system below this directory
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Tool configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print settings as JSON in --test mode
    #[arg(long)]
    pub json: bool,

    /// Log progress at info level
    #[arg(short, long)]
    pub verbose: bool,
}

/// What one invocation does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Test,
    Update,
    UpdateAll,
    Probe,
    SaveBackup(String),
    RestoreBackup(String),
    RestoreLast,
}

impl Mode {
    /// Returns true if the mode modifies the system.
    pub fn needs_privileges(&self) -> bool {
        !matches!(self, Self::Test | Self::Probe)
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The selected mode; clap guarantees exactly one is present.
    pub fn mode(&self) -> Mode {
        if let Some(name) = &self.savebackup {
            Mode::SaveBackup(name.clone())
        } else if let Some(name) = &self.restorebackup {
            Mode::RestoreBackup(name.clone())
        } else if self.restorelastbackup {
            Mode::RestoreLast
        } else if self.probe {
            Mode::Probe
        } else if self.updateall {
            Mode::UpdateAll
        } else if self.update {
            Mode::Update
        } else {
            Mode::Test
        }
    }

    /// Requested changes in the order given.
    pub fn change_set(&self) -> ChangeSet {
        ChangeSet {
            enable: self.enable.clone(),
            disable: self.disable.clone(),
            values: self.set.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_mode() {
        assert!(Cli::try_parse_from(["authconf"]).is_err());
        assert!(Cli::try_parse_from(["authconf", "--enable", "nis"]).is_err());
    }

    #[test]
    fn test_cli_modes_are_exclusive() {
        assert!(Cli::try_parse_from(["authconf", "--test", "--update"]).is_err());
        assert!(Cli::try_parse_from(["authconf", "--savebackup", "a", "--restorelastbackup"]).is_err());
    }

    #[test]
    fn test_cli_update_with_changes() {
        let cli = Cli::try_parse_from([
            "authconf",
            "--enable",
            "sssd",
            "--enable",
            "usemd5",
            "--disable",
            "nis",
            "--set",
            "krb5realm=EXAMPLE.COM",
            "--update",
            "--nostart",
        ])
        .unwrap();
        assert_eq!(cli.mode(), Mode::Update);
        assert!(cli.nostart);
        let changes = cli.change_set();
        assert_eq!(changes.enable, vec![FlagKey::Sssd, FlagKey::Md5]);
        assert_eq!(changes.disable, vec![FlagKey::Nis]);
        assert_eq!(changes.value(ValueKey::Krb5Realm), Some("EXAMPLE.COM"));
    }

    #[test]
    fn test_cli_rejects_unknown_keys() {
        assert!(Cli::try_parse_from(["authconf", "--enable", "telnet", "--test"]).is_err());
        assert!(Cli::try_parse_from(["authconf", "--set", "bogus=1", "--test"]).is_err());
        assert!(Cli::try_parse_from(["authconf", "--set", "novalue", "--test"]).is_err());
    }

    #[test]
    fn test_cli_backup_modes() {
        let cli = Cli::try_parse_from(["authconf", "--savebackup", "pre"]).unwrap();
        assert_eq!(cli.mode(), Mode::SaveBackup("pre".into()));
        assert!(cli.mode().needs_privileges());

        let cli = Cli::try_parse_from(["authconf", "--restorelastbackup", "--root", "/mnt"]).unwrap();
        assert_eq!(cli.mode(), Mode::RestoreLast);
        assert_eq!(cli.root, Some(PathBuf::from("/mnt")));

        let cli = Cli::try_parse_from(["authconf", "--probe"]).unwrap();
        assert!(!cli.mode().needs_privileges());
    }
}
