use crate::core::parser::{is_template_path, template_title, JsonParser, Parser};
use crate::core::pruner::prune;
use crate::core::writer::{assemble, Document, HtmlWriter, MarkdownWriter, Writer};
use crate::core::template::Specification;
use anyhow::{Context, Result};
use log::{debug, error, info};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Compiles a directory of templates, with their embedded answers, into reports.
#[derive(Debug, Default)]
pub struct DocumentProcessor {
    parser: JsonParser,
    markdown: MarkdownWriter,
    html: HtmlWriter,
}

impl DocumentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every `*.json` template in `input_dir` into `<name>.md` and
    /// `<name>.html` in `output_dir`. Templates that fail are logged and counted.
    pub fn process_templates<P1: AsRef<Path>, P2: AsRef<Path>>(
        &self,
        input_dir: P1,
        output_dir: P2,
    ) -> Result<BatchReport> {
        let input_path = input_dir.as_ref();
        let output_path = output_dir.as_ref();

        info!("Compiling templates from: {}", input_path.display());
        fs::create_dir_all(output_path)
            .with_context(|| format!("Failed to create output directory {}", output_path.display()))?;

        let mut templates = Vec::new();
        let entries = fs::read_dir(input_path)
            .with_context(|| format!("Failed to read input directory {}", input_path.display()))?;
        for entry in entries {
            let file_path = entry.context("Failed to read directory entry")?.path();
            if file_path.is_file() && is_template_path(&file_path) {
                templates.push(file_path);
            } else {
                debug!("Skipping entry: {:?}", file_path.file_name());
            }
        }
        templates.sort();

        let results: Vec<bool> = templates
            .par_iter()
            .map(|path| match self.process_template(path, output_path) {
                Ok(written) => {
                    info!("Compiled {} into {} files", path.display(), written.len());
                    true
                }
                Err(e) => {
                    error!("Failed to compile template {}: {:#}", path.display(), e);
                    false
                }
            })
            .collect();

        let succeeded = results.iter().filter(|ok| **ok).count();
        let report = BatchReport {
            succeeded,
            failed: results.len() - succeeded,
        };
        info!(
            "Completed batch: {} succeeded, {} failed",
            report.succeeded, report.failed
        );
        Ok(report)
    }

    /// Compile one template file, returning the paths written.
    pub fn process_template<P1: AsRef<Path>, P2: AsRef<Path>>(
        &self,
        template: P1,
        output_dir: P2,
    ) -> Result<Vec<PathBuf>> {
        let template = template.as_ref();
        let specification = self
            .parser
            .parse(template)
            .with_context(|| format!("Failed to parse {}", template.display()))?;
        let document = compile(&specification);

        let name = template_title(template);
        let mut written = Vec::with_capacity(2);
        let md_path = output_dir
            .as_ref()
            .join(format!("{name}.{}", self.markdown.extension()));
        self.markdown.write(&document, &md_path)?;
        written.push(md_path);
        let html_path = output_dir
            .as_ref()
            .join(format!("{name}.{}", self.html.extension()));
        self.html.write(&document, &html_path)?;
        written.push(html_path);
        Ok(written)
    }
}

/// The document of a template, using the answers embedded in it.
pub fn compile(specification: &Specification) -> Document {
    let answers = specification.results.clone().unwrap_or_default();
    let empty_message = specification
        .template_info
        .clone()
        .unwrap_or_default()
        .empty_spec_message;
    assemble(&prune(&specification.chapters, &answers), &answers, &empty_message)
}

/// Initialise logging and compile `input_dir` into `output_dir`.
pub fn run_document_processing<P1: AsRef<Path>, P2: AsRef<Path>>(
    input_dir: P1,
    output_dir: P2,
) -> Result<BatchReport> {
    // Logger may already be initialised by the caller.
    let _ = env_logger::try_init();

    info!("Initializing document processor...");
    let processor = DocumentProcessor::new();
    processor.process_templates(input_dir, output_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compile_uses_embedded_answers() {
        let specification: Specification = serde_json::from_value(json!({
            "chapters": [{
                "id": "c", "title": "C", "output": "# Report for &c.name",
                "questions": [{ "id": "c", "title": "_name_" }]
            }],
            "results": { "c.name": { "0.0.0": { "value": "Acme" } } }
        }))
        .unwrap();
        assert_eq!(
            compile(&specification),
            Document::Entries(vec!["# Report for Acme".into()])
        );
    }

    #[test]
    fn compile_without_answers_is_empty() {
        let specification: Specification =
            serde_json::from_value(json!({ "chapters": [{ "id": "c", "output": "x &a.b" }] })).unwrap();
        assert!(compile(&specification).is_empty());
    }
}
