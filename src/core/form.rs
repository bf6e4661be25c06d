use crate::core::answers::{compose_id, AnswerStore, AnswerValue};
use crate::core::index::{Index, Level};
use crate::core::placeholders::{resolve, resolve_text};
use crate::core::template::{Chapter, Element, ElementKind, NodeInfo, Section};
use crate::core::visibility::{is_visible, resolve_repeat, RepeatDefault};
use crate::utils::letters::un_camel_case;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// `_field_` markers in a question title.
fn input_regex() -> &'static Regex {
    static INPUT: OnceLock<Regex> = OnceLock::new();
    INPUT.get_or_init(|| Regex::new(r"_([a-zA-Z0-9]+)_").expect("valid regex"))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterForm {
    pub id: String,
    pub index: Index,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub questions: Vec<ElementForm>,
    pub sections: Vec<SectionForm>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SectionForm {
    pub id: String,
    pub index: Index,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub questions: Vec<ElementForm>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElementForm {
    pub id: String,
    pub index: Index,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub mandatory: bool,
    #[serde(flatten)]
    pub kind: FormKind,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FormKind {
    Text { fields: Vec<InputField> },
    Options { options: Vec<OptionForm> },
    Choices {
        choices: Vec<OptionForm>,
        #[serde(skip_serializing_if = "Option::is_none")]
        selected: Option<String>,
    },
    Group { elements: Vec<ElementForm> },
}

/// An inline input, answered under `key`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputField {
    pub key: String,
    pub label: String,
    pub placeholder: String,
    pub input_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<AnswerValue>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OptionForm {
    pub id: String,
    pub key: String,
    pub label: String,
    pub checked: bool,
}

/// What an editor draws for the current answers: the visible instances of
/// every chapter, section and question, unrepeated nodes counting once.
pub fn build_form(chapters: &[Chapter], answers: &AnswerStore) -> Vec<ChapterForm> {
    chapters
        .iter()
        .filter(|c| is_visible(&c.node, answers, Index::DEFAULT, false))
        .flat_map(|c| chapter_forms(c, answers, Index::DEFAULT, true))
        .collect()
}

/// Indices to draw a node at. Expanded instances are filtered on visibility;
/// a single instance is assumed visible by the caller.
fn expand(
    node: &NodeInfo,
    answers: &AnswerStore,
    index: Index,
    level: Level,
    can_repeat: bool,
) -> Vec<Index> {
    let repeat = if can_repeat {
        resolve_repeat(node, answers, index, RepeatDefault::Render)
    } else {
        1
    };
    match repeat {
        0 => vec![],
        1 => vec![index],
        n => (0..n)
            .map(|j| index.with_level(level, j))
            .filter(|&i| is_visible(node, answers, i, false))
            .collect(),
    }
}

fn chapter_forms(chapter: &Chapter, answers: &AnswerStore, index: Index, can_repeat: bool) -> Vec<ChapterForm> {
    expand(&chapter.node, answers, index, Level::Chapter, can_repeat)
        .into_iter()
        .map(|i| ChapterForm {
            id: chapter.node.id.clone(),
            index: i,
            title: resolve_text(Some(&chapter.node.title), answers, i),
            description: description(&chapter.node, answers, i),
            questions: question_forms(&chapter.questions, answers, i),
            sections: chapter
                .sections
                .iter()
                .filter(|s| is_visible(&s.node, answers, i, false))
                .flat_map(|s| section_forms(s, answers, i))
                .collect(),
        })
        .collect()
}

fn section_forms(section: &Section, answers: &AnswerStore, index: Index) -> Vec<SectionForm> {
    expand(&section.node, answers, index, Level::Section, true)
        .into_iter()
        .map(|i| SectionForm {
            id: section.node.id.clone(),
            index: i,
            title: resolve_text(Some(&section.node.title), answers, i),
            description: description(&section.node, answers, i),
            questions: question_forms(&section.questions, answers, i),
        })
        .collect()
}

fn question_forms(questions: &[Element], answers: &AnswerStore, index: Index) -> Vec<ElementForm> {
    questions
        .iter()
        .filter(|q| is_visible(&q.node, answers, index, false))
        .flat_map(|q| element_forms(q, answers, index))
        .collect()
}

/// Instances of a question. Repeated questions are drawn for every index.
pub fn element_forms(element: &Element, answers: &AnswerStore, index: Index) -> Vec<ElementForm> {
    match resolve_repeat(&element.node, answers, index, RepeatDefault::Render) {
        0 => vec![],
        1 if is_visible(&element.node, answers, index, false) => {
            vec![element_form(element, answers, index)]
        }
        1 => vec![],
        n => (0..n)
            .map(|j| index.with_level(Level::Question, j))
            .map(|i| element_form(element, answers, i))
            .collect(),
    }
}

fn element_form(element: &Element, answers: &AnswerStore, index: Index) -> ElementForm {
    let node = &element.node;
    let title = resolve_text(Some(&node.title), answers, index);
    let kind = match &element.kind {
        ElementKind::Leaf => FormKind::Text {
            fields: input_fields(node, &title, answers, index),
        },
        ElementKind::OptionGroup(options) => FormKind::Options {
            options: option_forms(node, options, answers, index),
        },
        ElementKind::SelectionGroup(choices) => {
            let choices = option_forms(node, choices, answers, index);
            let selected = choices.iter().find(|c| c.checked).map(|c| c.id.clone());
            FormKind::Choices { choices, selected }
        }
        ElementKind::ElementGroup(children) => FormKind::Group {
            elements: children
                .iter()
                .flat_map(|child| element_forms(child, answers, index))
                .collect(),
        },
    };
    ElementForm {
        id: node.id.clone(),
        index,
        title,
        description: description(node, answers, index),
        mandatory: node.mandatory,
        kind,
    }
}

fn description(node: &NodeInfo, answers: &AnswerStore, index: Index) -> Option<String> {
    node.description
        .as_ref()
        .map(|d| resolve(&d.joined(), answers, index))
}

fn option_forms(parent: &NodeInfo, options: &[Element], answers: &AnswerStore, index: Index) -> Vec<OptionForm> {
    options
        .iter()
        .filter(|o| is_visible(&o.node, answers, index, false))
        .map(|o| {
            let key = compose_id(&parent.id, o.id());
            OptionForm {
                id: o.id().to_string(),
                checked: answers.get(&key, index).is_some_and(|v| v.is_truthy()),
                label: resolve_text(Some(&o.node.title), answers, index),
                key,
            }
        })
        .collect()
}

/// Inline inputs of a leaf. A field's label is the text before it on the
/// same line, or its un-camel-cased name.
pub fn input_fields(node: &NodeInfo, title: &str, answers: &AnswerStore, index: Index) -> Vec<InputField> {
    let mut fields = Vec::new();
    let mut last_end = 0;
    for caps in input_regex().captures_iter(title) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str();
        let before = &title[last_end..whole.start()];
        let label = before.rsplit('\n').next().unwrap_or(before).trim();
        last_end = whole.end();

        let given = node.data.given_value(name);
        let input_type = match (&node.data.input_type, &given) {
            (Some(t), _) => t.clone(),
            (None, Some(AnswerValue::Number(_))) => "number".to_string(),
            _ => "text".to_string(),
        };
        let key = compose_id(&node.id, name);
        let value = answers
            .get_direct(&key, index)
            .map(|a| a.value.clone())
            .or(given);
        let placeholder = un_camel_case(name);
        fields.push(InputField {
            label: if label.is_empty() {
                placeholder.clone()
            } else {
                label.to_string()
            },
            placeholder,
            input_type,
            value,
            key,
        });
    }
    fields
}
