use std::fmt::Display;

use colored::*;
use tracing::info;
use unicode_width::UnicodeWidthStr;

use crate::terminal::colors;
use crate::terminal::logging::PRINT_TARGET;

pub const TOTAL_WIDTH: usize = 64;
const KEY_WIDTH: usize = 10;

#[macro_export]
macro_rules! mprint {
    () => {
        $crate::terminal::print::print("");
    };
    ($msg:expr) => {
        $crate::terminal::print::print($msg);
    };
}

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, "{msg}");
}

/// `title` centred on a horizontal rule of `fill`.
fn rule(title: &str, fill: &str) -> String {
    let free: usize = TOTAL_WIDTH.saturating_sub(UnicodeWidthStr::width(title));
    let left: usize = free / 2;
    format!(
        "{}{}{}",
        fill.repeat(left).color(colors::SEPARATOR),
        title.bright_green().bold(),
        fill.repeat(free - left).color(colors::SEPARATOR)
    )
}

pub fn banner(q_level: u8) {
    if q_level > 0 {
        return;
    }
    print(&rule(&format!("⟦ DOORLINK v{} ⟧", env!("CARGO_PKG_VERSION")), "═"));
}

pub fn header(msg: &str, q_level: u8) {
    if q_level > 0 {
        return;
    }
    print(&rule(&format!("⟦ {} ⟧", msg.to_uppercase()), "─"));
}

/// `> Key......: value`
pub fn field(key: &str, value: impl Display) {
    let dots: String = ".".repeat(KEY_WIDTH.saturating_sub(key.len()));
    print(&format!(
        "{} {}{}{} {value}",
        ">".color(colors::SEPARATOR),
        key.color(colors::PRIMARY),
        dots.color(colors::SEPARATOR),
        ":".color(colors::SEPARATOR),
    ));
}

pub fn bullet(msg: impl Display) {
    print(&format!("{} {msg}", ">".color(colors::SEPARATOR)));
}

/// A numbered entry followed by one branch per detail.
pub fn tree(idx: usize, name: &str, details: &[(&str, ColoredString)]) {
    print(&format!(
        "{}{}{} {}",
        "[".color(colors::SEPARATOR),
        idx.to_string().color(colors::ACCENT),
        "]".color(colors::SEPARATOR),
        name.color(colors::PRIMARY)
    ));

    let key_width: usize = details.iter().map(|(key, _)| key.len()).max().unwrap_or(0) + 1;
    for (i, (key, value)) in details.iter().enumerate() {
        let branch: &str = if i + 1 == details.len() { "└─" } else { "├─" };
        print(&format!(
            " {} {}{}{} {value}",
            branch.color(colors::SEPARATOR),
            key.color(colors::TEXT_DEFAULT),
            ".".repeat(key_width - key.len()).color(colors::SEPARATOR),
            ":".color(colors::SEPARATOR),
        ));
    }
}

/// Closing line of a command, centred under a double rule.
pub fn summary(msg: &str) {
    let pad: String = " ".repeat(TOTAL_WIDTH.saturating_sub(console::measure_text_width(msg)) / 2);
    print(&"═".repeat(TOTAL_WIDTH).color(colors::SEPARATOR).to_string());
    print(&format!("{pad}{msg}"));
}

pub fn no_results(what: &str) {
    print(&format!("no {what} found").red().bold().to_string());
}

pub fn end_of_program(q_level: u8) {
    if q_level > 0 {
        return;
    }
    print(&"═".repeat(TOTAL_WIDTH).color(colors::SEPARATOR).to_string());
}
