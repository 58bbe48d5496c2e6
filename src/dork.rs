//! Dork input-line grammar: one dork per line, trimmed, with
//! comment (`#`) and blank lines ignored. Deliberately simpler than
//! `pool::parse` — a dork has no further structure the core cares about.

/// Parse dork lines out of `text`, trimming whitespace and skipping blank
/// and `#`-comment lines.
pub fn load_dork_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
