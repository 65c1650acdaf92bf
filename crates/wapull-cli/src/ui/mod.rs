use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", style("✔").green(), msg);
}

/// Print warning message
pub fn warn(msg: &str) {
    println!("{} {}", style("!").yellow(), msg);
}

/// Print info message (indented)
pub fn info(msg: &str) {
    println!("  {}", msg);
}

/// Print a dimmed detail line (double indented)
pub fn detail(msg: &str) {
    println!("    {}", style(msg).dim());
}

/// Switch an existing bar (usually a spinner) to the bar style
pub fn apply_bar_style(pb: &ProgressBar) {
    let bar_style = ProgressStyle::with_template("⚡ {msg}...  {bar:20.cyan/dim} {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    pb.set_style(bar_style);
}

/// Create a spinner for indeterminate progress
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
