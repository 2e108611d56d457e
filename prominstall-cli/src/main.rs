use anyhow::Result;
use clap::error::ErrorKind;
use clap::{ArgGroup, Parser};
use prominstall_common::preflight::{self, REQUIRED_TOOLS};
use prominstall_common::{
    prompt, release, report, Installer, InstallerConfig, ReleaseClient, RunOutcome,
    SystemAccounts, Systemctl, TerminalPrompter,
};
use prominstall_protocol::RemovalMode;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "prominstall")]
#[command(about = "Install, upgrade or remove a Prometheus server running as a systemd service")]
#[command(group(ArgGroup::new("mode").args(["local", "uninstall", "purge"])))]
struct Args {
    /// Install from a local release archive (<product>-X.Y.Z.<os>-<arch>.tar.gz)
    #[arg(short, long, value_name = "FILE")]
    local: Option<PathBuf>,

    /// Remove binaries and the service, keep configuration and data
    #[arg(short, long)]
    uninstall: bool,

    /// Remove everything including data, offering a backup first
    #[arg(short, long)]
    purge: bool,

    /// Installer configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Install,
    Local(PathBuf),
    Uninstall,
    Purge,
}

impl Args {
    fn mode(&self) -> Mode {
        if let Some(path) = &self.local {
            Mode::Local(path.clone())
        } else if self.uninstall {
            Mode::Uninstall
        } else if self.purge {
            Mode::Purge
        } else {
            Mode::Install
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => return argument_error(e),
    };

    match run(args).await {
        Ok(outcome) => {
            tracing::debug!("finished: {:?}", outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            report::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Help exits 0; every other parse problem is an invalid argument (exit 1).
fn argument_exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn argument_error(e: clap::Error) -> ExitCode {
    let code = argument_exit_code(e.kind());
    let _ = e.print();
    if code != 0 {
        report::error("Invalid argument, see --help for usage");
    }
    ExitCode::from(code)
}

async fn run(args: Args) -> Result<RunOutcome> {
    preflight::check(REQUIRED_TOOLS)?;

    let config = InstallerConfig::resolve(args.config.as_deref())?;
    let mode = args.mode();
    if let Mode::Local(path) = &mode {
        release::parse_local_artifact(path, &config)?;
    }

    let services = Systemctl;
    let accounts = SystemAccounts;
    let mut prompter = TerminalPrompter;
    let installer = Installer::new(&config, &services, &accounts);

    match mode {
        Mode::Install => {
            let selector = prompt::resolve_selector(None, &mut prompter, &config)?;
            let client = ReleaseClient::new()?;
            installer.install(selector, &client, &mut prompter).await
        }
        Mode::Local(path) => installer.install_from_local(&path, &mut prompter),
        Mode::Uninstall => installer.remove(RemovalMode::Uninstall, &mut prompter),
        Mode::Purge => installer.remove(RemovalMode::Purge, &mut prompter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("prominstall").chain(argv.iter().copied()))
    }

    #[test]
    fn test_no_arguments_is_interactive_install() {
        assert_eq!(parse(&[]).unwrap().mode(), Mode::Install);
    }

    #[test]
    fn test_short_and_long_flags() {
        assert_eq!(parse(&["-u"]).unwrap().mode(), Mode::Uninstall);
        assert_eq!(parse(&["--uninstall"]).unwrap().mode(), Mode::Uninstall);
        assert_eq!(parse(&["-p"]).unwrap().mode(), Mode::Purge);
        assert_eq!(parse(&["--purge"]).unwrap().mode(), Mode::Purge);
        assert_eq!(
            parse(&["-l", "prometheus-2.45.0.linux-amd64.tar.gz"])
                .unwrap()
                .mode(),
            Mode::Local(PathBuf::from("prometheus-2.45.0.linux-amd64.tar.gz"))
        );
        assert_eq!(
            parse(&["--local", "/tmp/prometheus-2.45.0.linux-amd64.tar.gz"])
                .unwrap()
                .mode(),
            Mode::Local(PathBuf::from("/tmp/prometheus-2.45.0.linux-amd64.tar.gz"))
        );
    }

    #[test]
    fn test_help_is_not_a_failure() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(argument_exit_code(err.kind()), 0);
        assert_eq!(parse(&["-h"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_unknown_argument_fails_with_one() {
        let err = parse(&["--frobnicate"]).unwrap_err();
        assert_eq!(argument_exit_code(err.kind()), 1);
        assert!(parse(&["install"]).is_err());
    }

    #[test]
    fn test_modes_are_exclusive() {
        assert!(parse(&["-u", "-p"]).is_err());
        assert!(parse(&["--local", "a.tar.gz", "--purge"]).is_err());
    }

    #[test]
    fn test_local_requires_a_file() {
        assert!(parse(&["--local"]).is_err());
    }
}
