//! Output formatting for CLI

use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty JSON for `--format json`
pub fn to_json<T: Serialize>(data: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Human-readable seconds; live streams have no finite duration
pub fn seconds(value: f64) -> String {
    if value.is_infinite() {
        "live".to_string()
    } else if value.is_nan() {
        "unknown".to_string()
    } else {
        format!("{value:.3}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("table"), OutputFormat::Text);
    }

    #[test]
    fn test_seconds() {
        assert_eq!(seconds(12.5), "12.500s");
        assert_eq!(seconds(f64::INFINITY), "live");
        assert_eq!(seconds(f64::NAN), "unknown");
    }
}
