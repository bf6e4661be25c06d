pub mod core {
    pub mod answers;
    pub mod form;
    pub mod index;
    pub mod parser;
    pub mod placeholders;
    pub mod pruner;
    pub mod template;
    pub mod visibility;
    pub mod writer;
}

pub mod utils {
    pub mod document_processor;
    pub mod letters;
    pub mod markdown;
}

pub mod error;
pub mod service;
pub mod storage;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub use crate::core::answers::{Answer, AnswerStore, AnswerValue, SetOptions};
pub use crate::core::index::{Index, Level};
pub use crate::core::template::{Chapter, Element, ElementKind, NodeInfo, Section, Specification};
pub use crate::error::SpecError;
pub use crate::service::SpecificationService;

/// Template text: a single string or a list of lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Text {
    Single(String),
    Lines(Vec<String>),
}

impl Text {
    /// The text with lines joined by a newline.
    pub fn joined(&self) -> Cow<'_, str> {
        match self {
            Text::Single(s) => Cow::Borrowed(s.as_str()),
            Text::Lines(lines) => Cow::Owned(lines.join("\n")),
        }
    }
}

impl Default for Text {
    fn default() -> Self {
        Text::Single(String::new())
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text::Single(s.to_string())
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        Text::Single(s)
    }
}
