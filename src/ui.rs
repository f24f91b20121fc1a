use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use terminal_size::{Width, Height, terminal_size};

pub fn print_header(title: &str) {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    let width = (width.0 as usize).min(100);

    let line = "─".repeat(width);
    println!("{}", line.black().bold());

    let name = "Taskboard".blue().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  {} {}  •  {}", name, version, title.cyan());

    println!("{}", line.black().bold());
}

pub fn print_step(msg: &str) {
    println!("  {} {}", "•".green(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg.green());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠️ ".yellow().bold(), msg.yellow());
}

pub fn print_error(msg: &str) {
    println!("  {} {}", "❌".red().bold(), msg.red());
}

pub fn print_thinking(msg: &str) {
    println!("  {} {}...", "∴".magenta(), msg);
}

/// Spinner shown while a request is in flight
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.blue} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
