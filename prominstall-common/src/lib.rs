pub mod archive;
pub mod checksum;
pub mod config;
pub mod installer;
pub mod layout;
pub mod preflight;
pub mod prompt;
pub mod release;
pub mod removal;
pub mod report;
pub mod systemd;
pub mod unit;
pub mod users;
pub mod workdir;

pub use config::InstallerConfig;
pub use installer::{Installer, RunOutcome};
pub use prompt::{Prompter, TerminalPrompter};
pub use release::ReleaseClient;
pub use systemd::{ServiceManager, Systemctl};
pub use users::{AccountManager, SystemAccounts};
