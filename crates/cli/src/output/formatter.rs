//! Output formatter for human-readable and JSON output
//!
//! Every command prints through a `Formatter` so quiet, JSON and no-color
//! modes behave the same everywhere.

use console::Style;
use serde::Serialize;

use super::OutputConfig;

/// Color theme for styled output
#[derive(Debug, Clone)]
pub struct Theme {
    /// Object keys and local paths - bold
    pub key: Style,
    /// Byte counts - green
    pub size: Style,
    /// Timestamps - dim
    pub date: Style,
    /// Owner columns - cyan
    pub owner: Style,
    pub success: Style,
    pub error: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            key: Style::new().bold(),
            size: Style::new().green(),
            date: Style::new().dim(),
            owner: Style::new().cyan(),
            success: Style::new().green(),
            error: Style::new().red(),
        }
    }
}

impl Theme {
    /// Returns a theme with no styling (for no-color mode)
    pub fn plain() -> Self {
        Self {
            key: Style::new(),
            size: Style::new(),
            date: Style::new(),
            owner: Style::new(),
            success: Style::new(),
            error: Style::new(),
        }
    }
}

/// Formatter for CLI output
///
/// When JSON mode is enabled, stdout carries only JSON documents and errors
/// go to stderr as `{"error": ...}` objects.
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
    theme: Theme,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        let theme = if config.no_color || config.json {
            Theme::plain()
        } else {
            Theme::default()
        };
        Self { config, theme }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    /// Whether a live progress indicator may be drawn
    pub fn progress_enabled(&self) -> bool {
        !self.config.quiet && !self.config.json
    }

    // ========== Style helper methods ==========

    pub fn style_key(&self, text: &str) -> String {
        self.theme.key.apply_to(text).to_string()
    }

    pub fn style_size(&self, text: &str) -> String {
        self.theme.size.apply_to(text).to_string()
    }

    pub fn style_date(&self, text: &str) -> String {
        self.theme.date.apply_to(text).to_string()
    }

    pub fn style_owner(&self, text: &str) -> String {
        self.theme.owner.apply_to(text).to_string()
    }

    // ========== Output methods ==========

    /// Output a success message
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }

        let checkmark = self.theme.success.apply_to("✓");
        println!("{checkmark} {message}");
    }

    /// Output an error message
    ///
    /// Errors are always printed, even in quiet mode.
    pub fn error(&self, message: &str) {
        if self.config.json {
            let error = serde_json::json!({
                "error": message
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&error).unwrap_or_else(|_| message.to_string())
            );
        } else {
            let cross = self.theme.error.apply_to("✗");
            eprintln!("{cross} {message}");
        }
    }

    /// Output JSON directly
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Print a line of text (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        println!("{message}");
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatter_default() {
        let formatter = Formatter::default();
        assert!(!formatter.is_json());
        assert!(formatter.progress_enabled());
    }

    #[test]
    fn test_formatter_json_mode() {
        let formatter = Formatter::new(OutputConfig {
            json: true,
            ..Default::default()
        });
        assert!(formatter.is_json());
        assert!(!formatter.progress_enabled());
        assert_eq!(formatter.style_size("1 KiB"), "1 KiB");
    }

    #[test]
    fn test_plain_styles_leave_text_alone() {
        let formatter = Formatter::new(OutputConfig {
            no_color: true,
            ..Default::default()
        });
        assert_eq!(formatter.style_key("photos/a.jpg"), "photos/a.jpg");
        assert_eq!(formatter.style_date("2024-01-01"), "2024-01-01");
        assert_eq!(formatter.style_owner("minio"), "minio");
    }

    #[test]
    fn test_quiet_suppresses_progress() {
        let formatter = Formatter::new(OutputConfig {
            quiet: true,
            ..Default::default()
        });
        assert!(!formatter.progress_enabled());
    }
}
