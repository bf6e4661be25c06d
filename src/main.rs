use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use spectool_rs::core::parser::{template_title, JsonParser, Parser as TemplateParser};
use spectool_rs::utils::document_processor::run_document_processing;
use spectool_rs::{AnswerStore, AnswerValue, Index, SpecificationService};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "spectool", version, about = "Compile questionnaire templates into reports")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Compile the report of a template
    Report {
        template: PathBuf,
        /// Answers file, replacing the answers embedded in the template
        #[arg(long)]
        answers: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Markdown)]
        format: Format,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the answered part of the template as JSON
    Prune {
        template: PathBuf,
        #[arg(long)]
        answers: Option<PathBuf>,
    },
    /// Print what an editor would draw as JSON
    Form {
        template: PathBuf,
        #[arg(long)]
        answers: Option<PathBuf>,
    },
    /// Record one answer in an answers file
    Set {
        template: PathBuf,
        /// Answers file, created when missing
        #[arg(long)]
        answers: PathBuf,
        id: String,
        value: String,
        #[arg(long, default_value = "0.0.0")]
        index: String,
    },
    /// Print the template with its answers embedded
    Export {
        template: PathBuf,
        #[arg(long)]
        answers: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compile every template in a directory
    Batch { input: PathBuf, output: PathBuf },
}

#[derive(Copy, Clone, ValueEnum)]
enum Format {
    Markdown,
    Html,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Report {
            template,
            answers,
            format,
            output,
        } => {
            let service = load_service(&template, answers.as_deref())?;
            let report = match format {
                Format::Markdown => service.markdown(),
                Format::Html => service.report(),
            };
            emit(&report, output.as_deref())?;
        }
        Cmd::Prune { template, answers } => {
            let service = load_service(&template, answers.as_deref())?;
            emit(&serde_json::to_string_pretty(&service.pruned())?, None)?;
        }
        Cmd::Form { template, answers } => {
            let service = load_service(&template, answers.as_deref())?;
            emit(&serde_json::to_string_pretty(&service.form())?, None)?;
        }
        Cmd::Set {
            template,
            answers,
            id,
            value,
            index,
        } => {
            let mut specification = JsonParser.parse(&template)?;
            specification.results = Some(if answers.exists() {
                read_answers(&answers)?
            } else {
                AnswerStore::new()
            });
            let mut service = SpecificationService::default();
            service.load(&template_title(&template), specification)?;
            let index = Index::parse(&index)?;
            if !service.answer(&id, parse_value(&value), index)? {
                info!("{id}@{index} keeps its given answer");
            }
            fs::write(&answers, serde_json::to_string_pretty(service.answers())?)
                .with_context(|| format!("Failed to write {}", answers.display()))?;
        }
        Cmd::Export {
            template,
            answers,
            output,
        } => {
            let service = load_service(&template, answers.as_deref())?;
            emit(&serde_json::to_string_pretty(&service.json())?, output.as_deref())?;
        }
        Cmd::Batch { input, output } => {
            let report = run_document_processing(&input, &output)?;
            println!("{} succeeded, {} failed", report.succeeded, report.failed);
        }
    }
    Ok(())
}

fn load_service(template: &Path, answers: Option<&Path>) -> Result<SpecificationService> {
    let mut specification = JsonParser
        .parse(template)
        .with_context(|| format!("Failed to load template {}", template.display()))?;
    if let Some(path) = answers {
        specification.results = Some(read_answers(path)?);
    }
    let mut service = SpecificationService::default();
    service.load(&template_title(template), specification)?;
    Ok(service)
}

fn read_answers(path: &Path) -> Result<AnswerStore> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Malformed answers in {}", path.display()))
}

fn parse_value(value: &str) -> AnswerValue {
    match value {
        "true" => AnswerValue::Bool(true),
        "false" => AnswerValue::Bool(false),
        other => AnswerValue::Text(other.to_string()),
    }
}

fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}
