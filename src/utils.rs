//! Formatting helpers and run statistics.

use std::time::Duration;

/// Format a duration as hours, minutes, and seconds.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}h {:02}m {:02}s", hours, minutes, seconds)
}

/// Integer part of a total with spaces as thousands separators, e.g. `1 234 567`.
pub fn format_total(total: f64) -> String {
    let value = total as i64;
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }

    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Summary of a finished (or interrupted) search.
#[derive(Debug, Clone)]
pub struct SearchStatistics {
    pub map_name: String,
    pub generations: u32,
    pub commits: u32,
    pub runtime: Duration,
    pub best_total: f64,
    pub best_id: Option<String>,
    pub locations: usize,
    pub converged: bool,
}

impl SearchStatistics {
    /// Format the statistics as a string.
    pub fn format(&self) -> String {
        format!(
            "Search Statistics for {}:
- Generations: {}
- Commits: {}
- Runtime: {}
- Best Total: {}
- Best Id: {}
- Locations: {}
- Converged: {}",
            self.map_name,
            self.generations,
            self.commits,
            format_duration(self.runtime),
            format_total(self.best_total),
            self.best_id.as_deref().unwrap_or("-"),
            self.locations,
            self.converged
        )
    }
}
