//! Terminal rendering helpers for the text output format.

use crate::core::dataset::Status;
use colored::{ColoredString, Colorize};

/// First `shown` skip reasons on one line, each cut to `width` characters.
pub fn summarize_reasons(reasons: &[String], shown: usize, width: usize) -> String {
    let mut parts: Vec<String> = reasons
        .iter()
        .take(shown)
        .map(|reason| shorten(reason, width))
        .collect();
    let hidden = reasons.len().saturating_sub(shown);
    if hidden > 0 {
        parts.push(format!("+{} more", hidden));
    }
    parts.join("; ")
}

fn shorten(reason: &str, width: usize) -> String {
    let mut line = reason.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some((cut, _)) = line.char_indices().nth(width) {
        line.truncate(cut);
        line.push('…');
    }
    line
}

pub fn status_word(status: Status) -> ColoredString {
    match status {
        Status::Success => status.as_str().green().bold(),
        Status::Failure => status.as_str().red().bold(),
        Status::Unknown => status.as_str().yellow(),
    }
}
