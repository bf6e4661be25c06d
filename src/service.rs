use crate::core::answers::{compose_id, AnswerStore, AnswerValue, SetOptions};
use crate::core::form::{build_form, ChapterForm};
use crate::core::index::Index;
use crate::core::parser::{normalize_title, template_title, JsonParser, Parser};
use crate::core::placeholders::resolve_markdown;
use crate::core::pruner::{prune, AnsweredChapter};
use crate::core::template::{
    Chapter, DocumentInfo, Element, ElementKind, NodeInfo, Specification, TemplateInfo,
};
use crate::core::writer::{assemble, Document};
use crate::error::{Result, SpecError};
use crate::storage::{AnswerStorage, MemoryStorage};
use crate::utils::markdown::{CmarkRenderer, MarkdownRenderer};
use anyhow::Context;
use chrono::Utc;
use log::{debug, info};
use std::path::Path;

const DEFAULT_INTRODUCTION: &str = "# Welcome to SPECTOOL";

/// A change to the answer table, sent after the change and any preset
/// cascade have completed.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerEvent {
    Set { id: String, index: Index },
    Deleted { id: String, index: Index },
    Cleared,
}

type Observer = Box<dyn Fn(&AnswerEvent)>;

/// One loaded template together with its answers.
pub struct SpecificationService {
    title: String,
    specification: Specification,
    answers: AnswerStore,
    introduction: String,
    template_info: TemplateInfo,
    specification_info: DocumentInfo,
    storage: Box<dyn AnswerStorage>,
    renderer: Box<dyn MarkdownRenderer>,
    observers: Vec<Observer>,
}

impl Default for SpecificationService {
    fn default() -> Self {
        Self::new(MemoryStorage::new())
    }
}

impl SpecificationService {
    pub fn new(storage: impl AnswerStorage + 'static) -> Self {
        Self {
            title: String::new(),
            specification: Specification::default(),
            answers: AnswerStore::new(),
            introduction: DEFAULT_INTRODUCTION.to_string(),
            template_info: TemplateInfo::default(),
            specification_info: DocumentInfo::default(),
            storage: Box::new(storage),
            renderer: Box::new(CmarkRenderer),
            observers: Vec::new(),
        }
    }

    pub fn with_renderer(mut self, renderer: impl MarkdownRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    /// Load a template. Returns `false` when a template with this title is
    /// already loaded. Embedded answers take precedence over stored ones.
    pub fn load(&mut self, title: &str, mut specification: Specification) -> Result<bool> {
        let title = normalize_title(title);
        if !self.title.is_empty() && title == self.title {
            debug!("template {title} already loaded");
            return Ok(false);
        }

        self.answers = match specification.results.take() {
            Some(answers) => answers,
            None => self.storage.load(&title)?.unwrap_or_default(),
        };
        self.introduction = specification
            .introduction
            .as_ref()
            .map(|intro| intro.joined().into_owned())
            .unwrap_or_else(|| DEFAULT_INTRODUCTION.to_string());
        self.template_info = specification.template_info.clone().unwrap_or_default();
        let mut info = specification.specification_info.clone().unwrap_or_default();
        info.created.get_or_insert_with(Utc::now);
        self.specification_info = info;

        info!(
            "loaded template {title}: {} chapters, {} answers",
            specification.chapters.len(),
            self.answers.iter().count()
        );
        self.specification = specification;
        self.title = title;
        Ok(true)
    }

    /// Load a `*.spec.json` file, titled after its file name.
    pub fn load_from_path<P: AsRef<Path>>(&mut self, path: P) -> anyhow::Result<bool> {
        let path = path.as_ref();
        let specification = JsonParser
            .parse(path)
            .with_context(|| format!("failed to load template {}", path.display()))?;
        Ok(self.load(&template_title(path), specification)?)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.specification.chapters
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn template_info(&self) -> &TemplateInfo {
        &self.template_info
    }

    pub fn specification_info(&self) -> &DocumentInfo {
        &self.specification_info
    }

    /// The introduction with placeholders resolved, rendered to HTML.
    pub fn introduction(&self) -> String {
        resolve_markdown(
            &self.introduction,
            &self.answers,
            Index::DEFAULT,
            self.renderer.as_ref(),
        )
    }

    pub fn subscribe(&mut self, observer: impl Fn(&AnswerEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Record an answer, persist the table and notify observers. Returns
    /// `false` when a preset write was suppressed.
    pub fn set_answer(
        &mut self,
        id: &str,
        value: impl Into<AnswerValue>,
        index: Index,
        options: SetOptions<'_>,
    ) -> Result<bool> {
        let written = self.answers.set(id, value, index, options);
        self.after_change(AnswerEvent::Set {
            id: id.to_string(),
            index,
        })?;
        Ok(written)
    }

    pub fn delete_answer(&mut self, id: &str, index: Index) -> Result<bool> {
        let removed = self.answers.delete(id, index);
        self.after_change(AnswerEvent::Deleted {
            id: id.to_string(),
            index,
        })?;
        Ok(removed)
    }

    pub fn clear_answers(&mut self) -> Result<()> {
        self.storage.delete(&self.title)?;
        self.answers.clear();
        info!("cleared answers of {}", self.title);
        self.notify(&AnswerEvent::Cleared);
        Ok(())
    }

    /// Select one choice of a selection: every choice is unset, then the
    /// chosen one is set and its presets applied.
    pub fn select_choice(&mut self, selection_id: &str, choice_id: &str, index: Index) -> Result<bool> {
        let selection = self.element(selection_id)?.clone();
        let ElementKind::SelectionGroup(choices) = &selection.kind else {
            return Err(SpecError::UnknownElement(selection_id.to_string(), "selection"));
        };
        let chosen = choices
            .iter()
            .find(|c| c.id() == choice_id)
            .ok_or_else(|| SpecError::UnknownElement(choice_id.to_string(), "choice"))?;
        for choice in choices {
            self.answers.set(
                &compose_id(selection_id, choice.id()),
                false,
                index,
                SetOptions::default(),
            );
        }
        self.set_answer(
            &compose_id(selection_id, choice_id),
            true,
            index,
            SetOptions::from_source(&chosen.node),
        )
    }

    /// Check or uncheck one option of an option group.
    pub fn toggle_option(
        &mut self,
        group_id: &str,
        option_id: &str,
        checked: bool,
        index: Index,
    ) -> Result<bool> {
        let group = self.element(group_id)?.clone();
        let ElementKind::OptionGroup(options) = &group.kind else {
            return Err(SpecError::UnknownElement(group_id.to_string(), "option group"));
        };
        let option = options
            .iter()
            .find(|o| o.id() == option_id)
            .ok_or_else(|| SpecError::UnknownElement(option_id.to_string(), "option"))?;
        self.set_answer(
            &compose_id(group_id, option_id),
            checked,
            index,
            SetOptions::from_source(&option.node),
        )
    }

    /// Fill in an inline `_field_` input of a question.
    pub fn set_input(
        &mut self,
        element_id: &str,
        field: &str,
        value: impl Into<AnswerValue>,
        index: Index,
    ) -> Result<bool> {
        let element = self.element(element_id)?.clone();
        self.set_answer(
            &compose_id(element_id, field),
            value,
            index,
            SetOptions::from_source(&element.node),
        )
    }

    /// Record `value` for `id` the way an editor would: `true` on a choice
    /// selects it, a boolean on an option toggles it, and anything else takes
    /// its data from the element it names or the question owning the field.
    pub fn answer(&mut self, id: &str, value: impl Into<AnswerValue>, index: Index) -> Result<bool> {
        let value = value.into();
        if let Some((parent, child)) = id.split_once('.') {
            let kind = self.specification.find_element(parent).map(|e| &e.kind);
            let selection = matches!(kind, Some(ElementKind::SelectionGroup(_)));
            let option = matches!(kind, Some(ElementKind::OptionGroup(_)));
            match &value {
                AnswerValue::Bool(true) if selection => {
                    return self.select_choice(parent, child, index);
                }
                &AnswerValue::Bool(checked) if option => {
                    return self.toggle_option(parent, child, checked, index);
                }
                _ => {}
            }
        }
        let source = self.source_of(id).cloned();
        let options = source
            .as_ref()
            .map_or_else(SetOptions::default, SetOptions::from_source);
        self.set_answer(id, value, index, options)
    }

    /// The template with the current answers and document info embedded.
    pub fn json(&self) -> Specification {
        let mut specification = self.specification.clone();
        specification.results = Some(self.answers.clone());
        specification.specification_info = Some(self.specification_info.clone());
        specification
    }

    pub fn pruned(&self) -> Vec<AnsweredChapter> {
        prune(&self.specification.chapters, &self.answers)
    }

    pub fn specs(&self) -> Document {
        assemble(
            &self.pruned(),
            &self.answers,
            &self.template_info.empty_spec_message,
        )
    }

    /// The report as Markdown.
    pub fn markdown(&self) -> String {
        self.specs().to_markdown()
    }

    /// The report rendered to HTML.
    pub fn report(&self) -> String {
        self.renderer.render(&self.markdown())
    }

    pub fn form(&self) -> Vec<ChapterForm> {
        build_form(&self.specification.chapters, &self.answers)
    }

    fn element(&self, id: &str) -> Result<&Element> {
        self.specification
            .find_element(id)
            .ok_or_else(|| SpecError::UnknownElement(id.to_string(), "element"))
    }

    /// Element whose data drives coercion and presets for an answer id: the
    /// named option or choice, or the question owning an input field.
    fn source_of(&self, id: &str) -> Option<&NodeInfo> {
        let Some((parent, child)) = id.split_once('.') else {
            return self.specification.find_element(id).map(|e| &e.node);
        };
        let element = self.specification.find_element(parent)?;
        match element.kind {
            ElementKind::Leaf => Some(&element.node),
            _ => element.find(child).map(|e| &e.node),
        }
    }

    fn after_change(&mut self, event: AnswerEvent) -> Result<()> {
        self.storage.save(&self.title, &self.answers)?;
        self.specification_info.updated = Some(Utc::now());
        self.notify(&event);
        Ok(())
    }

    fn notify(&self, event: &AnswerEvent) {
        debug!("answer event {event:?}");
        for observer in &self.observers {
            observer(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn template() -> Specification {
        serde_json::from_value(json!({
            "templateInfo": { "emptySpecMessage": "EMPTY" },
            "introduction": ["# Intro", "Hello &c1.name"],
            "chapters": [{
                "id": "c1",
                "title": "Company",
                "output": "Chapter: &c1.name",
                "questions": [
                    { "id": "c1", "title": "Name: _name_" },
                    {
                        "id": "x",
                        "title": "Pick",
                        "choices": [
                            { "id": "x1", "title": "One", "output": "One picked", "data": { "presets": [{ "id": "y" }] } },
                            { "id": "x2", "title": "Two", "output": "Two picked", "data": { "presets": [{ "id": "w", "value": 3 }] } }
                        ]
                    },
                    {
                        "id": "tools",
                        "title": "Tools",
                        "options": [{ "id": "git", "title": "Git", "output": "- git" }]
                    }
                ]
            }]
        }))
        .unwrap()
    }

    fn loaded() -> SpecificationService {
        let mut service = SpecificationService::default();
        assert!(service.load("Company.spec.json", template()).unwrap());
        service
    }

    #[test]
    fn load_applies_defaults_and_ignores_same_title() {
        let mut service = loaded();
        assert_eq!(service.title(), "company");
        assert_eq!(service.template_info().empty_spec_message, "EMPTY");
        assert_eq!(service.template_info().next_label, "Next");
        assert!(service.specification_info().created.is_some());
        assert!(!service.load("company", Specification::default()).unwrap());
        assert_eq!(service.chapters().len(), 1);
    }

    #[test]
    fn chapter_appears_once_placeholder_is_answered() {
        let mut service = loaded();
        assert_eq!(service.specs(), Document::Empty("EMPTY".into()));

        service.set_input("c1", "name", "Acme", Index::DEFAULT).unwrap();
        assert_eq!(service.specs().entries()[0], "Chapter: Acme");
        assert!(service.introduction().contains("Hello Acme"));
        assert!(service.specification_info().updated.is_some());
    }

    #[test]
    fn selecting_a_choice_cascades_presets() {
        let mut service = loaded();
        service.select_choice("x", "x1", Index::DEFAULT).unwrap();
        let answers = service.answers();
        assert_eq!(answers.get("x.x1", Index::DEFAULT), Some(&AnswerValue::Bool(true)));
        assert_eq!(answers.get("x.x2", Index::DEFAULT), Some(&AnswerValue::Bool(false)));
        let y = &answers.slots("y").unwrap()[&Index::DEFAULT];
        assert_eq!(y.preset_name.as_deref(), Some("x"));

        service.select_choice("x", "x2", Index::DEFAULT).unwrap();
        assert!(service.answers().slots("y").is_none());
        assert_eq!(service.answers().get("w", Index::DEFAULT), Some(&AnswerValue::Number(3.0)));
        assert_eq!(
            service.answers().get("x.x1", Index::DEFAULT),
            Some(&AnswerValue::Bool(false))
        );
    }

    #[test]
    fn unknown_elements_are_rejected() {
        let mut service = loaded();
        assert!(matches!(
            service.select_choice("tools", "git", Index::DEFAULT),
            Err(SpecError::UnknownElement(_, "selection"))
        ));
        assert!(matches!(
            service.toggle_option("tools", "svn", true, Index::DEFAULT),
            Err(SpecError::UnknownElement(_, "option"))
        ));
        assert!(matches!(
            service.set_input("nope", "f", 1, Index::DEFAULT),
            Err(SpecError::UnknownElement(_, "element"))
        ));
    }

    #[test]
    fn observers_see_every_change() {
        let mut service = loaded();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        service.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        service.toggle_option("tools", "git", true, Index::DEFAULT).unwrap();
        service.delete_answer("tools.git", Index::DEFAULT).unwrap();
        service.clear_answers().unwrap();
        assert_eq!(
            *events.borrow(),
            vec![
                AnswerEvent::Set { id: "tools.git".into(), index: Index::DEFAULT },
                AnswerEvent::Deleted { id: "tools.git".into(), index: Index::DEFAULT },
                AnswerEvent::Cleared,
            ]
        );
    }

    #[test]
    fn answers_are_restored_from_storage() {
        let mut storage = MemoryStorage::new();
        let mut stored = AnswerStore::new();
        stored.set("c1.name", "Stored", Index::DEFAULT, SetOptions::default());
        storage.save("company", &stored).unwrap();

        let mut service = SpecificationService::new(storage);
        service.load("Company", template()).unwrap();
        assert_eq!(service.specs().entries()[0], "Chapter: Stored");
    }

    #[test]
    fn json_export_embeds_answers() {
        let mut service = loaded();
        service.toggle_option("tools", "git", true, Index::DEFAULT).unwrap();
        let export = serde_json::to_value(service.json()).unwrap();
        assert_eq!(export["results"]["tools.git"]["0.0.0"]["value"], true);
        assert!(export["specificationInfo"]["created"].is_string());
        assert_eq!(export["chapters"][0]["id"], "c1");
    }

    #[test]
    fn report_is_rendered() {
        let mut service = loaded();
        service.set_input("c1", "name", "Acme", Index::DEFAULT).unwrap();
        service.toggle_option("tools", "git", true, Index::DEFAULT).unwrap();
        assert_eq!(service.markdown(), "Chapter: Acme\n- git");
        let html = service.report();
        assert!(html.contains("<p>Chapter: Acme</p>"), "{html}");
        assert!(html.contains("<li>git</li>"), "{html}");
    }
}
