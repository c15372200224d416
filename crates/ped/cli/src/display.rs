//! Terminal output helpers

use colored::Colorize;

/// Format a success message
pub(crate) fn success(message: &str) -> String {
    format!("✅ {}", message.green().bold())
}

/// Format a failure with its outcome code
pub(crate) fn failure(message: &str, code: i32) -> String {
    format!("❌ {} (code {code})", message.red().bold())
}

/// Format a titled list of key/value lines
pub(crate) fn key_value_box(title: &str, items: Vec<(&str, String)>) -> String {
    let mut result = format!("{}", title.bold().underline());

    for (key, value) in items {
        result.push_str(&format!("\n  {}: {}", key.bold(), value));
    }

    result
}
