//! CLI output formatting utilities.
//!
//! Colored status lines and human-readable durations, degrading gracefully
//! when the stream is not a terminal.

use std::time::Duration;

use owo_colors::{OwoColorize, Stream};

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}
