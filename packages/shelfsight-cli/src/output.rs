use std::io::Write;
use std::path::Path;

/// Write JSON string to stdout or a file.
pub fn write_output(json: &str, output_path: Option<&str>) -> Result<(), String> {
    match output_path {
        Some(path) => std::fs::write(Path::new(path), json)
            .map_err(|e| format!("Failed to write output file '{}': {}", path, e)),
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(json.as_bytes())
                .and_then(|_| handle.write_all(b"\n"))
                .map_err(|e| format!("Failed to write to stdout: {}", e))
        }
    }
}

/// Serialize a value to JSON (pretty or compact).
pub fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<String, String> {
    if compact {
        serde_json::to_string(value).map_err(|e| format!("JSON serialization failed: {}", e))
    } else {
        serde_json::to_string_pretty(value)
            .map_err(|e| format!("JSON serialization failed: {}", e))
    }
}

/// Seconds formatted for report tables, e.g. "4.2s" or "1m 12s".
pub fn format_seconds(secs: f64) -> String {
    if secs >= 60.0 {
        let minutes = (secs / 60.0).floor() as u64;
        let rest = secs - minutes as f64 * 60.0;
        format!("{}m {:.0}s", minutes, rest)
    } else {
        format!("{:.1}s", secs)
    }
}

/// A 0-100 share formatted for report tables, e.g. "37.5%".
pub fn format_share(share: f64) -> String {
    format!("{:.1}%", share)
}
