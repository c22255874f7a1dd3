use crate::{Result, ScanError};
use log::info;
use std::path::Path;
use tokio::fs;

/// Wordlist checks for the ffuf stages
pub mod wordlist {
    use super::*;

    /// Fail early on a wordlist ffuf would not be able to read.
    pub fn validate_wordlist(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(ScanError::InvalidInput(format!("Wordlist file not found: {}", path.display())));
        }
        if !path.is_file() {
            return Err(ScanError::InvalidInput(format!("Wordlist is not a regular file: {}", path.display())));
        }
        Ok(())
    }

    /// Load a wordlist from file, skipping blanks and `#` comments
    pub async fn load_wordlist(path: &Path) -> Result<Vec<String>> {
        validate_wordlist(path)?;

        let content = fs::read_to_string(path).await
            .map_err(|e| ScanError::InvalidInput(format!("Failed to read wordlist {}: {}", path.display(), e)))?;

        let words: Vec<String> = content
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();

        info!("Loaded {} words from {}", words.len(), path.display());
        Ok(words)
    }

    /// Startup check for a wordlist handed to ffuf: readable and not empty.
    pub async fn check_wordlist(path: &Path) -> Result<usize> {
        let words = load_wordlist(path).await?;
        if words.is_empty() {
            return Err(ScanError::InvalidInput(format!("Wordlist has no entries: {}", path.display())));
        }
        Ok(words.len())
    }
}

/// Progress reporting utilities
pub mod progress {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
        let pb = ProgressBar::new(total);

        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.cyan} [{bar:25.green/bright_black}] {pos:>3}/{len:3} {msg}")
                .unwrap()
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );

        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    pub fn create_spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();

        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );

        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    /// Progress that draws nothing, for quiet mode
    pub fn hidden() -> ProgressBar {
        ProgressBar::hidden()
    }
}

/// Time and formatting utilities
pub mod time {
    use chrono::{DateTime, Local};
    use std::time::Duration;

    /// Suffix shared by every file of one run, e.g. `20240131_142501`
    pub fn file_timestamp(at: &DateTime<Local>) -> String {
        at.format("%Y%m%d_%H%M%S").to_string()
    }

    /// Human-readable form used inside reports
    pub fn report_timestamp(at: &DateTime<Local>) -> String {
        at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Format duration as human readable string
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
