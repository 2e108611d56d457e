use anyhow::Result;
use prominstall_protocol::{ReleaseSelector, Version};
use std::io::{BufRead, IsTerminal};
use std::path::Path;

use crate::config::InstallerConfig;
use crate::report;

/// Source of interactive answers.
pub trait Prompter {
    /// Read one answer line, without the trailing newline.
    fn read_line(&mut self, prompt: &str) -> Result<String>;
}

/// Reads answers from the controlling terminal, or from plain stdin when piped.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        if std::io::stdin().is_terminal() {
            let answer: String = dialoguer::Input::new()
                .with_prompt(prompt)
                .allow_empty(true)
                .interact_text()?;
            return Ok(answer);
        }

        println!("{}: ", prompt);
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "" | "n" | "no" => Some(false),
        _ => None,
    }
}

/// Yes/no question where only an explicit yes proceeds; a bare Enter declines.
pub fn confirm(prompter: &mut dyn Prompter, question: &str) -> Result<bool> {
    let prompt = format!("{} [y/N]", question);
    loop {
        let answer = prompter.read_line(&prompt)?;
        match parse_yes_no(&answer) {
            Some(value) => return Ok(value),
            None => report::warn(format!("Please answer 'y' or 'n' (got '{}')", answer.trim())),
        }
    }
}

pub fn parse_port(answer: &str, config: &InstallerConfig) -> Option<u16> {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return Some(config.default_port);
    }
    let port: u16 = trimmed.parse().ok()?;
    (port >= config.min_port).then_some(port)
}

pub fn select_port(prompter: &mut dyn Prompter, config: &InstallerConfig) -> Result<u16> {
    let prompt = format!(
        "Listen port for {} ({}-65535, blank for {})",
        config.product, config.min_port, config.default_port
    );
    loop {
        let answer = prompter.read_line(&prompt)?;
        match parse_port(&answer, config) {
            Some(port) => return Ok(port),
            None => report::warn(format!(
                "Invalid port '{}': expected a number between {} and 65535",
                answer.trim(),
                config.min_port
            )),
        }
    }
}

/// Blank answer selects the latest release, anything else must be a version.
pub fn select_release(
    prompter: &mut dyn Prompter,
    config: &InstallerConfig,
) -> Result<ReleaseSelector> {
    let prompt = format!(
        "Version of {} to install (e.g. 2.45.0, blank for latest)",
        config.product
    );
    loop {
        let answer = prompter.read_line(&prompt)?;
        if answer.trim().is_empty() {
            return Ok(ReleaseSelector::Latest);
        }
        match answer.parse::<Version>() {
            Ok(version) => return Ok(ReleaseSelector::Pinned { version }),
            Err(e) => report::warn(format!("Invalid version: {}", e)),
        }
    }
}

/// `--local` wins; otherwise the user picks a version interactively.
pub fn resolve_selector(
    local: Option<&Path>,
    prompter: &mut dyn Prompter,
    config: &InstallerConfig,
) -> Result<ReleaseSelector> {
    match local {
        Some(path) => Ok(ReleaseSelector::LocalFile {
            path: path.to_path_buf(),
        }),
        None => select_release(prompter, config),
    }
}
