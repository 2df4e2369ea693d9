//! Output formats and the gate deciding which non-default formats a site serves.

use serde::{Deserialize, Serialize};

/// Query parameter selecting the output format.
pub const FORMAT_PARAM: &str = "format";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    #[default]
    Html,
    Csv,
}

impl Format {
    /// Parse a requested format. Unknown values are treated as the default format.
    pub fn parse(s: Option<&str>) -> Format {
        match s.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("csv") => Format::Csv,
            _ => Format::Html,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Format::Html
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Csv => "csv",
        }
    }
}

/// Host switch for non-default formats.
#[derive(Clone, Copy, Debug, Default)]
pub struct FormatGate {
    pub csv_enabled: bool,
}

impl FormatGate {
    pub fn new(csv_enabled: bool) -> Self {
        FormatGate { csv_enabled }
    }

    pub fn is_non_default_format_allowed(&self, format: Format) -> bool {
        match format {
            Format::Html => true,
            Format::Csv => self.csv_enabled,
        }
    }
}

/// Location for the same logical action with the format parameter stripped.
/// Other parameters keep their order and repetitions.
pub fn strip_format_location(path: &str, raw_query: &[(String, String)]) -> String {
    let kept: Vec<(&str, &str)> = raw_query
        .iter()
        .filter(|(k, _)| k.as_str() != FORMAT_PARAM)
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    if kept.is_empty() {
        return path.to_string();
    }
    match serde_urlencoded::to_string(&kept) {
        Ok(qs) => format!("{}?{}", path, qs),
        Err(e) => {
            tracing::warn!(error = %e, "could not re-encode query string, dropping it");
            path.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, Format::Html)]
    #[case(Some("csv"), Format::Csv)]
    #[case(Some(" CSV "), Format::Csv)]
    #[case(Some("xlsx"), Format::Html)]
    fn test_parse(#[case] input: Option<&str>, #[case] expected: Format) {
        assert_eq!(Format::parse(input), expected);
    }

    #[test]
    fn test_gate() {
        assert!(FormatGate::new(false).is_non_default_format_allowed(Format::Html));
        assert!(!FormatGate::new(false).is_non_default_format_allowed(Format::Csv));
        assert!(FormatGate::new(true).is_non_default_format_allowed(Format::Csv));
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_strip_format_keeps_other_params() {
        let q = pairs(&[("q", "enterprise crew"), ("format", "csv"), ("sort", "name")]);
        assert_eq!(
            strip_format_location("/admin/members", &q),
            "/admin/members?q=enterprise+crew&sort=name"
        );
    }

    #[test]
    fn test_strip_format_keeps_order_and_repeats() {
        let q = pairs(&[("sort", "name"), ("tag", "b"), ("format", "csv"), ("tag", "a")]);
        assert_eq!(
            strip_format_location("/admin/ships", &q),
            "/admin/ships?sort=name&tag=b&tag=a"
        );
    }

    #[test]
    fn test_strip_format_only_param() {
        let q = pairs(&[("format", "csv")]);
        assert_eq!(strip_format_location("/admin/ships", &q), "/admin/ships");
    }
}
