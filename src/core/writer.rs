use crate::core::answers::AnswerStore;
use crate::core::placeholders::resolve_text;
use crate::core::pruner::{AnsweredChapter, AnsweredElement};
use crate::utils::markdown::{CmarkRenderer, MarkdownRenderer};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// The compiled document: the resolved outputs of the answered tree, or the
/// configured message when nothing was answered.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Document {
    Entries(Vec<String>),
    Empty(String),
}

impl Document {
    pub fn is_empty(&self) -> bool {
        matches!(self, Document::Empty(_))
    }

    pub fn entries(&self) -> &[String] {
        match self {
            Document::Entries(entries) => entries,
            Document::Empty(_) => &[],
        }
    }

    /// Entries joined by newlines, with an extra blank line before every
    /// later entry that contains a heading.
    pub fn to_markdown(&self) -> String {
        match self {
            Document::Empty(message) => message.clone(),
            Document::Entries(entries) => entries
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    if i > 0 && entry.contains('#') {
                        format!("\n{entry}")
                    } else {
                        entry.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Walk the answered tree depth first and collect the resolved outputs:
/// chapter, its questions, then each section followed by its questions.
pub fn assemble(chapters: &[AnsweredChapter], answers: &AnswerStore, empty_message: &str) -> Document {
    let mut entries = Vec::new();
    for chapter in chapters {
        entries.push(resolve_text(chapter.node.output.as_ref(), answers, chapter.index));
        entries.extend(chapter.questions.iter().map(|q| element_output(q, answers)));
        for section in &chapter.sections {
            entries.push(resolve_text(section.node.output.as_ref(), answers, section.index));
            entries.extend(section.questions.iter().map(|q| element_output(q, answers)));
        }
    }
    entries.retain(|entry| !entry.is_empty());

    if entries.is_empty() {
        Document::Empty(empty_message.to_string())
    } else {
        Document::Entries(entries)
    }
}

/// Outputs of an element and its answered descendants.
fn element_output(element: &AnsweredElement, answers: &AnswerStore) -> String {
    element
        .pre_order()
        .into_iter()
        .map(|e| resolve_text(e.node.output.as_ref(), answers, e.index))
        .filter(|output| !output.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Writer turns a compiled document into a report and stores it.
pub trait Writer {
    /// File extension of the produced report, without the dot.
    fn extension(&self) -> &'static str;

    fn format(&self, document: &Document) -> String;

    /// Write the report to `out_path`, replacing it in one step.
    fn write<P: AsRef<Path>>(&self, document: &Document, out_path: P) -> Result<()> {
        let out_path = out_path.as_ref();
        let dir = out_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut file = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
        file.write_all(self.format(document).as_bytes())?;
        file.persist(out_path)
            .with_context(|| format!("failed to write {}", out_path.display()))?;
        Ok(())
    }
}

/// Markdown report, unrendered.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownWriter;

impl Writer for MarkdownWriter {
    fn extension(&self) -> &'static str {
        "md"
    }

    fn format(&self, document: &Document) -> String {
        document.to_markdown()
    }
}

/// Markdown report rendered to HTML.
#[derive(Debug, Clone, Default)]
pub struct HtmlWriter<R = CmarkRenderer> {
    renderer: R,
}

impl<R: MarkdownRenderer> HtmlWriter<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }
}

impl<R: MarkdownRenderer> Writer for HtmlWriter<R> {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn format(&self, document: &Document) -> String {
        self.renderer.render(&document.to_markdown())
    }
}
