pub mod branch;
pub mod config_cmd;
pub mod run;

use std::io::Read;
use std::path::Path;

/// Ticket text from a file, or from stdin when no path (or `-`) is given.
pub fn read_ticket(path: Option<&Path>) -> Result<String, Box<dyn std::error::Error>> {
    let text = match path {
        Some(p) if p.as_os_str() != "-" => std::fs::read_to_string(p)
            .map_err(|e| format!("Failed to read ticket file {}: {e}", p.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    if text.trim().is_empty() {
        return Err("Ticket text is empty".into());
    }
    Ok(text)
}
