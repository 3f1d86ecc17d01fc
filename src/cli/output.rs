//! Output formatting for the dcforge CLI.
//!
//! Provides colored status lines and a progress spinner for the
//! long-running provisioning steps.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Output formatter for the CLI.
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// Verbosity level
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter.
    pub fn new(use_color: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        if !use_color {
            colored::control::set_override(false);
        }
        Self {
            use_color,
            verbosity,
        }
    }

    /// Print a section banner.
    pub fn banner(&self, title: &str) {
        let line = "=".repeat(title.len() + 8);
        if self.use_color {
            eprintln!("{}", line.bright_blue());
            eprintln!("    {}", title.bright_blue().bold());
            eprintln!("{}", line.bright_blue());
        } else {
            eprintln!("{}", line);
            eprintln!("    {}", title);
            eprintln!("{}", line);
        }
    }

    /// Print an informational message.
    pub fn info(&self, msg: &str) {
        eprintln!("{} {}", "*".cyan(), msg);
    }

    /// Print a success message.
    pub fn success(&self, msg: &str) {
        eprintln!("{} {}", "ok:".green().bold(), msg);
    }

    /// Print a warning.
    pub fn warn(&self, msg: &str) {
        eprintln!("{} {}", "warning:".yellow().bold(), msg);
    }

    /// Print an error.
    pub fn error(&self, msg: &str) {
        eprintln!("{} {}", "error:".red().bold(), msg);
    }

    /// Print only at verbosity >= 1.
    pub fn verbose(&self, msg: &str) {
        if self.verbosity >= 1 {
            eprintln!("  {}", msg.dimmed());
        }
    }

    /// Spinner shown while a long provisioning phase runs. Hidden when
    /// colors are off (CI logs, pipes).
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        if !self.use_color {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(msg.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }
}
