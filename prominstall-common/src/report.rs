//! User-facing status lines.
//!
//! Every line carries a fixed category prefix so that logs of an installer run
//! can be classified with a plain prefix match. Each line is also mirrored as a
//! debug-level tracing event so `RUST_LOG=debug` interleaves it with diagnostics.

use owo_colors::{OwoColorize, Stream};

pub const INFO_PREFIX: &str = "[INFO]";
pub const WARN_PREFIX: &str = "[WARN]";
pub const ERROR_PREFIX: &str = "[ERROR]";
pub const SUCCESS_PREFIX: &str = "[ OK ]";

pub fn info(message: impl AsRef<str>) {
    let message = message.as_ref();
    tracing::debug!(category = "info", "{}", message);
    println!(
        "{} {}",
        INFO_PREFIX.if_supports_color(Stream::Stdout, |p| p.cyan()),
        message
    );
}

pub fn warn(message: impl AsRef<str>) {
    let message = message.as_ref();
    tracing::debug!(category = "warn", "{}", message);
    println!(
        "{} {}",
        WARN_PREFIX.if_supports_color(Stream::Stdout, |p| p.yellow()),
        message
    );
}

pub fn error(message: impl AsRef<str>) {
    let message = message.as_ref();
    tracing::debug!(category = "error", "{}", message);
    eprintln!(
        "{} {}",
        ERROR_PREFIX.if_supports_color(Stream::Stderr, |p| p.red()),
        message
    );
}

pub fn success(message: impl AsRef<str>) {
    let message = message.as_ref();
    tracing::debug!(category = "success", "{}", message);
    println!(
        "{} {}",
        SUCCESS_PREFIX.if_supports_color(Stream::Stdout, |p| p.green()),
        message
    );
}
