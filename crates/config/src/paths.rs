//! Path utilities

use std::path::PathBuf;

/// Data directory (~/.enrich)
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".enrich"))
        .unwrap_or_else(|| PathBuf::from(".enrich"))
}

/// Config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Where run reports are written by default
pub fn reports_dir() -> PathBuf {
    data_dir().join("reports")
}

/// Turn a topic into something safe to use as a file stem
pub fn safe_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_whitespace() => '_',
            _ => c,
        })
        .collect();

    if cleaned.is_empty() {
        "report".to_string()
    } else {
        cleaned
    }
}
