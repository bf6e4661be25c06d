use crate::core::answers::{AnswerStore, AnswerValue};
use crate::error::SpecError;
use crate::Text;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A complete template document: labels, document info, introduction,
/// the chapter tree and optionally the answers given so far.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Specification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_info: Option<TemplateInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specification_info: Option<DocumentInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction: Option<Text>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default, alias = "answers", skip_serializing_if = "Option::is_none")]
    pub results: Option<AnswerStore>,
}

/// Fields shared by every node of the template tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: Text,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Text>,
    /// Added to the report when the node is answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<Repeat>,
    /// Element ids that must be set: OR over the list, `&` joins ids with AND.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<Show>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mandatory: bool,
    #[serde(default, skip_serializing_if = "ElementData::is_empty")]
    pub data: ElementData,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<Text>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<Text>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<Text>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = Some(repeat);
        self
    }

    pub fn with_show(mut self, show: Show) -> Self {
        self.show = Some(show);
        self
    }

    pub fn with_data(mut self, data: ElementData) -> Self {
        self.data = data;
        self
    }
}

/// How often a node is instantiated: a fixed count or the answer of another element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Repeat {
    Count(i64),
    Reference(String),
}

impl Repeat {
    /// Zero and the empty reference mean "not repeated".
    pub fn is_unset(&self) -> bool {
        match self {
            Repeat::Count(n) => *n == 0,
            Repeat::Reference(id) => id.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Show {
    One(String),
    Any(Vec<String>),
}

impl Show {
    pub fn conditions(&self) -> &[String] {
        match self {
            Show::One(s) => std::slice::from_ref(s),
            Show::Any(list) => list,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Show::One(s) => s.is_empty(),
            Show::Any(list) => list.is_empty(),
        }
    }
}

/// Optional presentation and behaviour hints attached to a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElementData {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// Answers that are set as well when this element is selected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presets: Vec<Preset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ElementData {
    pub fn is_empty(&self) -> bool {
        self.input_type.is_none()
            && self.presets.is_empty()
            && self.placeholder.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.extra.is_empty()
    }

    pub fn is_url(&self) -> bool {
        self.input_type.as_deref() == Some("url")
    }

    /// Default value for an inline input field, taken from the data bag.
    pub fn given_value(&self, field: &str) -> Option<AnswerValue> {
        self.extra
            .get(field)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preset {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AnswerValue>,
}

impl Preset {
    pub fn value_or_default(&self) -> AnswerValue {
        self.value.clone().unwrap_or(AnswerValue::Bool(true))
    }
}

/// A question or sub-element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawElement", into = "RawElement")]
pub struct Element {
    pub node: NodeInfo,
    pub kind: ElementKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    /// Plain text, optionally with inline `_field_` inputs.
    Leaf,
    /// Checkbox-like options, each answered on its own.
    OptionGroup(Vec<Element>),
    /// Mutually exclusive choices.
    SelectionGroup(Vec<Element>),
    ElementGroup(Vec<Element>),
}

impl Element {
    pub fn leaf(node: NodeInfo) -> Self {
        Self {
            node,
            kind: ElementKind::Leaf,
        }
    }

    pub fn options(node: NodeInfo, options: Vec<Element>) -> Self {
        Self {
            node,
            kind: ElementKind::OptionGroup(options),
        }
    }

    pub fn choices(node: NodeInfo, choices: Vec<Element>) -> Self {
        Self {
            node,
            kind: ElementKind::SelectionGroup(choices),
        }
    }

    pub fn group(node: NodeInfo, elements: Vec<Element>) -> Self {
        Self {
            node,
            kind: ElementKind::ElementGroup(elements),
        }
    }

    pub fn id(&self) -> &str {
        &self.node.id
    }

    /// Find a direct or nested sub-element by id.
    pub fn find(&self, id: &str) -> Option<&Element> {
        if self.node.id == id {
            return Some(self);
        }
        match &self.kind {
            ElementKind::Leaf => None,
            ElementKind::OptionGroup(children)
            | ElementKind::SelectionGroup(children)
            | ElementKind::ElementGroup(children) => children.iter().find_map(|c| c.find(id)),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawElement {
    #[serde(flatten)]
    node: NodeInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<Element>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    choices: Option<Vec<Element>>,
    #[serde(default, alias = "questions", skip_serializing_if = "Option::is_none")]
    elements: Option<Vec<Element>>,
}

impl TryFrom<RawElement> for Element {
    type Error = SpecError;

    fn try_from(raw: RawElement) -> Result<Self, Self::Error> {
        let kind = match (raw.options, raw.choices, raw.elements) {
            (None, None, None) => ElementKind::Leaf,
            (Some(options), None, None) => ElementKind::OptionGroup(options),
            (None, Some(choices), None) => ElementKind::SelectionGroup(choices),
            (None, None, Some(elements)) => ElementKind::ElementGroup(elements),
            _ => return Err(SpecError::AmbiguousElement(raw.node.id)),
        };
        Ok(Element {
            node: raw.node,
            kind,
        })
    }
}

impl From<Element> for RawElement {
    fn from(element: Element) -> Self {
        let mut raw = RawElement {
            node: element.node,
            options: None,
            choices: None,
            elements: None,
        };
        match element.kind {
            ElementKind::Leaf => {}
            ElementKind::OptionGroup(options) => raw.options = Some(options),
            ElementKind::SelectionGroup(choices) => raw.choices = Some(choices),
            ElementKind::ElementGroup(elements) => raw.elements = Some(elements),
        }
        raw
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Section {
    #[serde(flatten)]
    pub node: NodeInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Element>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Chapter {
    #[serde(flatten)]
    pub node: NodeInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Element>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Section>,
}

impl Chapter {
    /// Find an element anywhere in this chapter.
    pub fn find_element(&self, id: &str) -> Option<&Element> {
        self.questions
            .iter()
            .chain(self.sections.iter().flat_map(|s| s.questions.iter()))
            .find_map(|q| q.find(id))
    }
}

impl Specification {
    /// Find an element anywhere in the template.
    pub fn find_element(&self, id: &str) -> Option<&Element> {
        self.chapters.iter().find_map(|c| c.find_element(id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabDefinition {
    pub label: String,
    pub icon: String,
}

impl TabDefinition {
    fn new(label: &str, icon: &str) -> Self {
        Self {
            label: label.to_string(),
            icon: icon.to_string(),
        }
    }
}

/// Labels and settings of a template. Keys missing in a template fall back
/// to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub show_template_selector: bool,
    pub and: String,
    pub table_of_content: String,
    pub author: String,
    pub home: TabDefinition,
    pub edit: TabDefinition,
    pub spec: TabDefinition,
    pub about: TabDefinition,
    pub download_json_filename: String,
    pub download_json_label: String,
    pub download_markdown_filename: String,
    pub download_markdown_label: String,
    pub delete_local_storage_label: String,
    pub upload_template_label: String,
    pub upload_tooltip_label: String,
    /// Shown instead of the report when nothing has been answered.
    pub empty_spec_message: String,
    pub doc_info_title: String,
    pub author_label: String,
    pub release_label: String,
    pub version_label: String,
    pub created_label: String,
    pub updated_label: String,
    pub next_label: String,
    pub prev_label: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TemplateInfo {
    fn default() -> Self {
        Self {
            title: None,
            show_template_selector: false,
            and: "and".into(),
            table_of_content: "Table of Content".into(),
            author: "Unknown".into(),
            home: TabDefinition::new("Home", "home"),
            edit: TabDefinition::new("Edit", "create"),
            spec: TabDefinition::new("Spec", "import_contacts"),
            about: TabDefinition::new("About", "info_outline"),
            download_json_filename: "spectool.spec.json".into(),
            download_json_label: "JSON".into(),
            download_markdown_filename: "spectool.spec.md".into(),
            download_markdown_label: "DOC".into(),
            delete_local_storage_label: "CLEAR".into(),
            upload_template_label: "Upload".into(),
            upload_tooltip_label: "Drop or upload a specification file.".into(),
            empty_spec_message: "-- PLEASE ANSWER THE QUESTIONS FIRST --".into(),
            doc_info_title: "Document info".into(),
            author_label: "Author".into(),
            release_label: "Release info".into(),
            version_label: "Version".into(),
            created_label: "Created".into(),
            updated_label: "Updated".into(),
            next_label: "Next".into(),
            prev_label: "Previous".into(),
            extra: Map::new(),
        }
    }
}

/// Information about the document being written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Ids may be written as numbers in templates.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
