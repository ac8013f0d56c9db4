use std::io;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::cleanup::{self, GroupFallback, PurgeOptions, TeardownOptions};
use crate::input;
use crate::lab::LabContext;
use crate::provision::{MembershipOutcome, PolicyOutcome};
use crate::session::{self, CloudSession, ConnectOptions};
use crate::settings::{self, OperatorSettings};
use crate::setup;
use crate::users_file;

#[derive(Parser)]
#[command(name = "lab-operator")]
#[command(about = "Provision and tear down OCI training-lab tenancies", version)]
pub struct Cli {
    #[arg(long, global = true, help = "OCI config profile (default: $OCI_CLI_PROFILE or DEFAULT).")]
    profile: Option<String>,
    #[arg(long, global = true, help = "Path to the OCI config file.")]
    oci_config: Option<PathBuf>,
    #[arg(long, global = true, help = "Region override (default: the profile's region).")]
    region: Option<String>,
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Create the lab group, per-user compartments, the base policy and user accounts")]
    Setup(SetupArgs),
    #[command(about = "Delete a lab's compartments, policies and group")]
    Teardown(TeardownArgs),
    #[command(about = "Delete generative AI agent resources from a lab's compartments")]
    PurgeAi(PurgeArgs),
    #[command(about = "Show or initialise operator settings")]
    Settings(SettingsCommand),
}

#[derive(Parser)]
struct SetupArgs {
    #[arg(long, help = "Lab group name. Prompted for when omitted.")]
    lab: Option<String>,
    #[arg(long, default_value = users_file::DEFAULT_USERS_FILE)]
    users_file: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FallbackArg {
    Scan,
    None,
}

impl From<FallbackArg> for GroupFallback {
    fn from(value: FallbackArg) -> Self {
        match value {
            FallbackArg::Scan => GroupFallback::Scan,
            FallbackArg::None => GroupFallback::None,
        }
    }
}

#[derive(Parser)]
struct TeardownArgs {
    #[arg(long, help = "Lab group name. Prompted for when omitted.")]
    lab: Option<String>,
    #[arg(
        long,
        value_enum,
        default_value_t = FallbackArg::Scan,
        help = "What to do when no group carries the lab name."
    )]
    fallback: FallbackArg,
    #[arg(long, help = "Also remove members from the group and delete their user accounts.")]
    delete_users: bool,
}

#[derive(Parser)]
struct PurgeArgs {
    #[arg(long, help = "Lab group name. Prompted for when omitted.")]
    lab: Option<String>,
    #[arg(long, help = "Leave the emptied compartments in place.")]
    keep_compartments: bool,
    #[arg(
        long,
        requires = "keep_compartments",
        help = "Issue deletes without waiting for them to finish (needs --keep-compartments)."
    )]
    no_wait: bool,
}

#[derive(Parser)]
struct SettingsCommand {
    #[command(subcommand)]
    command: SettingsSubcommand,
}

#[derive(Subcommand)]
enum SettingsSubcommand {
    #[command(about = "Print the effective settings and where they are read from")]
    Show,
    #[command(about = "Write the default settings file")]
    Init(SettingsInitArgs),
}

#[derive(Parser)]
struct SettingsInitArgs {
    #[arg(long, help = "Overwrite an existing settings file.")]
    force: bool,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        init_tracing(self.verbose);
        let connect = ConnectOptions {
            config_file: self.oci_config,
            profile: self.profile,
            region: self.region,
        };
        match self.command {
            Command::Setup(args) => args.run(&connect),
            Command::Teardown(args) => args.run(&connect),
            Command::PurgeAi(args) => args.run(&connect),
            Command::Settings(settings) => settings.run(),
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init()
    {
        eprintln!("lab-operator: tracing initialization failed: {err}");
    }
}

fn open_session(connect: &ConnectOptions) -> anyhow::Result<(CloudSession, OperatorSettings)> {
    let settings = settings::load_settings().context("load operator settings")?;
    let session = session::connect(connect, &settings)?;
    Ok((session, settings))
}

impl SetupArgs {
    fn run(self, connect: &ConnectOptions) -> anyhow::Result<()> {
        let lab_name = input::resolve_lab_name(self.lab.as_deref(), input::SETUP_PROMPT)?;
        let users = users_file::read_users(&self.users_file)?;
        if users.accepted.is_empty() {
            return Err(anyhow!(
                "no valid users in {}; nothing to provision",
                self.users_file.display()
            ));
        }

        let (session, settings) = open_session(connect)?;
        let ctx = LabContext::new(
            &session.identity,
            &session.agents,
            session.tenancy_id.clone(),
            settings.pacing.to_pacing(),
        );
        let report = setup::run_setup(&ctx, &lab_name, &users.accepted)?;

        let policy = match report.policy {
            PolicyOutcome::Created(_) => "created",
            PolicyOutcome::AlreadyExists => "already present",
            PolicyOutcome::InvalidName => "skipped (invalid name)",
        };
        println!("Policy {}: {policy}", report.policy_name);
        for user in &report.users {
            let membership = match user.membership {
                MembershipOutcome::Added => "added to group",
                MembershipOutcome::AlreadyMember => "already in group",
            };
            println!(
                "  {} -> {} ({membership})",
                user.username, user.compartment_name
            );
        }
        if !users.skipped.is_empty() {
            println!("Skipped {} invalid line(s) in {}", users.skipped.len(), self.users_file.display());
        }
        Ok(())
    }
}

impl TeardownArgs {
    fn run(self, connect: &ConnectOptions) -> anyhow::Result<()> {
        let lab_name = input::resolve_lab_name(self.lab.as_deref(), input::TEARDOWN_PROMPT)?;
        let (session, settings) = open_session(connect)?;
        let ctx = LabContext::new(
            &session.identity,
            &session.agents,
            session.tenancy_id.clone(),
            settings.pacing.to_pacing(),
        );
        let options = TeardownOptions {
            fallback: self.fallback.into(),
            delete_users: self.delete_users,
        };
        let report = cleanup::run_teardown(&ctx, &lab_name, options)?;

        println!(
            "Teardown of {lab_name}: {} compartment(s) deleted, {} missing, {} failed, {} polic(ies) deleted",
            report.compartments_deleted.len(),
            report.compartments_missing.len(),
            report.compartment_failures.len(),
            report.policies_deleted.len(),
        );
        if self.delete_users {
            println!("Deleted {} user(s)", report.users_deleted.len());
        }
        for (compartment, error) in &report.compartment_failures {
            println!("  failed: {compartment}: {error}");
        }
        Ok(())
    }
}

impl PurgeArgs {
    fn run(self, connect: &ConnectOptions) -> anyhow::Result<()> {
        let lab_name = input::resolve_lab_name(self.lab.as_deref(), input::PURGE_PROMPT)?;
        let (session, settings) = open_session(connect)?;
        let ctx = LabContext::new(
            &session.identity,
            &session.agents,
            session.tenancy_id.clone(),
            settings.pacing.to_pacing(),
        );
        let options = PurgeOptions {
            delete_compartments: !self.keep_compartments,
            wait: !self.no_wait,
        };
        let report = cleanup::run_purge(&ctx, &lab_name, options)?;
        println!(
            "Purged {} resource(s) across {} compartment(s)",
            report.resources_deleted,
            report.compartments.len()
        );
        for failure in &report.failures {
            println!("  failed: {failure}");
        }
        Ok(())
    }
}

impl SettingsCommand {
    fn run(self) -> anyhow::Result<()> {
        let path = settings::settings_path()?;
        match self.command {
            SettingsSubcommand::Show => {
                let current = settings::load_settings()?;
                let source = if path.exists() {
                    path.display().to_string()
                } else {
                    format!("{} (not present, defaults)", path.display())
                };
                println!("# {source}");
                print!("{}", serde_yaml_bw::to_string(&current)?);
                Ok(())
            }
            SettingsSubcommand::Init(args) => {
                if path.exists() && !args.force {
                    return Err(anyhow!(
                        "settings already exist at {}; pass --force to overwrite",
                        path.display()
                    ));
                }
                settings::save_settings(&OperatorSettings::default())?;
                println!("Wrote default settings to {}", path.display());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_teardown_flags() {
        let cli = Cli::try_parse_from([
            "lab-operator",
            "--profile",
            "TRAINING",
            "teardown",
            "--lab",
            "Lab1",
            "--fallback",
            "none",
            "--delete-users",
        ])
        .unwrap();
        assert_eq!(cli.profile.as_deref(), Some("TRAINING"));
        let Command::Teardown(args) = cli.command else {
            panic!("expected teardown");
        };
        assert_eq!(args.lab.as_deref(), Some("Lab1"));
        assert!(matches!(args.fallback, FallbackArg::None));
        assert!(args.delete_users);
    }

    #[test]
    fn setup_defaults_to_users_txt() {
        let cli = Cli::try_parse_from(["lab-operator", "setup", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Setup(args) = cli.command else {
            panic!("expected setup");
        };
        assert_eq!(args.users_file, PathBuf::from("users.txt"));
        assert!(args.lab.is_none());
    }

    #[test]
    fn purge_flags_map_to_options() {
        let cli = Cli::try_parse_from(["lab-operator", "purge-ai", "--keep-compartments"]).unwrap();
        let Command::PurgeAi(args) = cli.command else {
            panic!("expected purge-ai");
        };
        assert!(args.keep_compartments);
        assert!(!args.no_wait);
    }

    #[test]
    fn no_wait_requires_keep_compartments() {
        let err = Cli::try_parse_from(["lab-operator", "purge-ai", "--no-wait"])
            .err()
            .expect("--no-wait alone should be rejected");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from(["lab-operator", "purge-ai", "--no-wait", "--keep-compartments"])
            .unwrap();
        let Command::PurgeAi(args) = cli.command else {
            panic!("expected purge-ai");
        };
        assert!(args.no_wait && args.keep_compartments);
    }

    #[test]
    fn fallback_defaults_to_scan() {
        let cli = Cli::try_parse_from(["lab-operator", "teardown"]).unwrap();
        let Command::Teardown(args) = cli.command else {
            panic!("expected teardown");
        };
        assert_eq!(GroupFallback::from(args.fallback), GroupFallback::Scan);
    }
}
