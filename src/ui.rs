use colored::{ColoredString, Colorize};
use hardening::TopicStatus;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print the banner of a failed run
pub fn failed_banner(host: &str, msg: &str) {
    let line = "*".repeat(72);
    eprintln!();
    eprintln!("{}", line.red().bold());
    eprintln!("{} {}", "FAILED".red().bold(), host.bold());
    eprintln!("{msg}");
    eprintln!("{}", line.red().bold());
}

// ============================================================================
// Topic status
// ============================================================================

/// Status label colored by outcome
pub fn status(status: TopicStatus) -> ColoredString {
    let label = status.label();
    match status {
        s if s.is_success() => label.green(),
        TopicStatus::Ignored | TopicStatus::Pending => label.dimmed(),
        TopicStatus::CheckIncomplete | TopicStatus::Indeterminate => label.yellow(),
        _ => label.red(),
    }
}

/// Pad or cut `text` to exactly `width` characters
pub fn fit(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        format!("{text}{}", " ".repeat(width - count))
    } else if width <= 3 {
        ".".repeat(width)
    } else {
        let kept: String = text.chars().take(width - 3).collect();
        format!("{kept}...")
    }
}

/// `1 topic`, `3 topics`
pub fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_pads_short_text() {
        assert_eq!(fit("abc", 6), "abc   ");
        assert_eq!(fit("exact", 5), "exact");
    }

    #[test]
    fn test_fit_cuts_long_text() {
        assert_eq!(fit("Ensure that SELinux is enabled.", 12), "Ensure th...");
        assert_eq!(fit("long", 2), "..");
    }

    #[test]
    fn test_fit_counts_characters() {
        assert_eq!(fit("ééé", 4), "ééé ");
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "topic"), "1 topic");
        assert_eq!(plural(0, "topic"), "0 topics");
        assert_eq!(plural(30, "topic"), "30 topics");
    }
}
