use crate::core::template::Specification;
use crate::error::Result;
use log::debug;
use std::fs;
use std::path::Path;

const SPEC_SUFFIX: &str = ".spec.json";

pub trait Parser {
    /// Parse a template file into a specification document.
    fn parse<P: AsRef<Path>>(&self, path: P) -> Result<Specification> {
        let path = path.as_ref();
        debug!("reading template {}", path.display());
        let content = fs::read_to_string(path)?;
        self.parse_str(&content)
    }

    fn parse_str(&self, content: &str) -> Result<Specification>;
}

/// Parses `*.spec.json` / `*.json` templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn parse_str(&self, content: &str) -> Result<Specification> {
        let specification: Specification = serde_json::from_str(content)?;
        debug!("parsed template with {} chapters", specification.chapters.len());
        Ok(specification)
    }
}

/// Whether a path looks like a template file.
pub fn is_template_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Title of a template file: its name without `.spec.json` or `.json`.
pub fn template_title(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    strip_suffix_ignore_case(&name, SPEC_SUFFIX)
        .or_else(|| strip_suffix_ignore_case(&name, ".json"))
        .map(str::to_string)
        .unwrap_or(name)
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    (s.is_char_boundary(split) && s[split..].eq_ignore_ascii_case(suffix)).then(|| &s[..split])
}

/// Key a loaded template is known by: lowercase, without `.spec.json`.
pub fn normalize_title(title: &str) -> String {
    let lower = title.to_lowercase();
    lower
        .strip_suffix(SPEC_SUFFIX)
        .map(str::to_string)
        .unwrap_or(lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpecError;
    use std::path::PathBuf;

    #[test]
    fn parses_minimal_template() {
        let spec = JsonParser
            .parse_str(r#"{ "chapters": [{ "id": "c1", "title": "One" }] }"#)
            .unwrap();
        assert_eq!(spec.chapters.len(), 1);
        assert_eq!(spec.chapters[0].node.id, "c1");
        assert!(spec.results.is_none());
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = JsonParser.parse_str("{ \"chapters\": [").unwrap_err();
        assert!(matches!(err, SpecError::MalformedTemplateJson(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = JsonParser.parse("/definitely/not/here.spec.json").unwrap_err();
        assert!(matches!(err, SpecError::Io(_)));
    }

    #[test]
    fn titles_drop_template_suffixes() {
        assert_eq!(template_title(&PathBuf::from("dir/Privacy.spec.json")), "Privacy");
        assert_eq!(template_title(&PathBuf::from("intake.JSON")), "intake");
        assert_eq!(template_title(&PathBuf::from("notes.txt")), "notes.txt");
        assert_eq!(normalize_title("Privacy.spec.json"), "privacy");
        assert_eq!(normalize_title("Intake"), "intake");
        assert!(is_template_path(&PathBuf::from("a.spec.json")));
        assert!(!is_template_path(&PathBuf::from("a.md")));
    }
}
