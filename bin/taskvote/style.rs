//! Terminal styling for CLI output

/// ANSI color codes
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

use colors::*;

/// Minor units per whole coin (lamports per SOL)
const MINOR_UNITS: f64 = 1_000_000_000.0;

pub fn style_bold(s: &str) -> String {
    format!("{}{}{}", BOLD, s, RESET)
}

pub fn style_dim(s: &str) -> String {
    format!("{}{}{}", DIM, s, RESET)
}

pub fn format_amount(amount: u64) -> String {
    format!("{} ({:.4} SOL)", amount, amount as f64 / MINOR_UNITS)
}

pub fn print_success(msg: &str) {
    println!("{}✓{} {}", GREEN, RESET, msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{}✗{} {}{}{}", RED, RESET, RED, msg, RESET);
}

pub fn print_warning(msg: &str) {
    println!("{}⚠{} {}{}{}", YELLOW, RESET, YELLOW, msg, RESET);
}

pub fn print_info(msg: &str) {
    println!("{}ℹ{} {}", BLUE, RESET, msg);
}

pub fn print_header(title: &str) {
    println!();
    println!(
        "{}{} {} {}{}",
        BOLD,
        CYAN,
        title,
        "─".repeat(50usize.saturating_sub(title.len())),
        RESET
    );
    println!();
}

pub fn print_key_value(key: &str, value: &str) {
    println!("  {}{}:{} {}", GRAY, key, RESET, value);
}

pub fn print_key_value_colored(key: &str, value: &str, color: &str) {
    println!("  {}{}:{} {}{}{}", GRAY, key, RESET, color, value, RESET);
}

pub fn progress_bar(progress: f64, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 1.0)) * width as f64) as usize;
    let empty = width - filled;

    format!(
        "{}{}{}{}{}",
        GREEN,
        "█".repeat(filled),
        GRAY,
        "░".repeat(empty),
        RESET
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(10_000_000), "10000000 (0.0100 SOL)");
        assert_eq!(format_amount(0), "0 (0.0000 SOL)");
    }

    #[test]
    fn test_progress_bar_bounds() {
        let full = progress_bar(1.5, 4);
        assert_eq!(full.matches('█').count(), 4);
        let empty = progress_bar(0.0, 4);
        assert_eq!(empty.matches('░').count(), 4);
    }
}
