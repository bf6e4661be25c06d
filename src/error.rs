use thiserror::Error;

/// Errors raised by the template engine.
///
/// Unresolved placeholders and repeat references that point at missing or
/// non-numeric answers are not errors: they make a node invisible or give
/// it zero repeats.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("malformed index: {0:?} (expected chapter.section.question)")]
    MalformedIndex(String),

    #[error("malformed template json: {0}")]
    MalformedTemplateJson(#[from] serde_json::Error),

    #[error("element {0:?} declares more than one of options, choices and elements")]
    AmbiguousElement(String),

    #[error("no {1} named {0:?} in the template")]
    UnknownElement(String, &'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SpecError>;
