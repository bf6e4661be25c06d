use crate::core::answers::{compose_id, Answer, AnswerStore};
use crate::core::index::{Index, Level};
use crate::core::placeholders::is_text_complete;
use crate::core::template::{Chapter, Element, ElementKind, NodeInfo, Section};
use crate::core::visibility::{is_visible, repeat_count};
use log::debug;
use serde::Serialize;

/// A chapter instance that has at least one answered question beneath it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnsweredChapter {
    pub index: Index,
    #[serde(flatten)]
    pub node: NodeInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<AnsweredElement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<AnsweredSection>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnsweredSection {
    pub index: Index,
    #[serde(flatten)]
    pub node: NodeInfo,
    pub questions: Vec<AnsweredElement>,
}

/// An element instance, reduced to the parts that were answered.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(into = "RawAnsweredElement")]
pub struct AnsweredElement {
    pub index: Index,
    pub node: NodeInfo,
    /// Set on answered options and choices.
    pub answer: Option<Answer>,
    pub kind: AnsweredKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnsweredKind {
    Leaf,
    Options(Vec<AnsweredElement>),
    Choices(Vec<AnsweredElement>),
    Group(Vec<AnsweredElement>),
}

impl AnsweredElement {
    fn leaf(node: &NodeInfo, index: Index, answer: Option<Answer>) -> Self {
        Self {
            index,
            node: node.clone(),
            answer,
            kind: AnsweredKind::Leaf,
        }
    }

    /// This element followed by all of its answered descendants, depth first.
    pub fn pre_order(&self) -> Vec<&AnsweredElement> {
        let mut out = vec![self];
        match &self.kind {
            AnsweredKind::Leaf => {}
            AnsweredKind::Options(children)
            | AnsweredKind::Choices(children)
            | AnsweredKind::Group(children) => {
                out.extend(children.iter().flat_map(|c| c.pre_order()));
            }
        }
        out
    }
}

#[derive(Serialize)]
struct RawAnsweredElement {
    index: Index,
    #[serde(flatten)]
    node: NodeInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<Answer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Vec<AnsweredElement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    choices: Option<Vec<AnsweredElement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    questions: Option<Vec<AnsweredElement>>,
}

impl From<AnsweredElement> for RawAnsweredElement {
    fn from(element: AnsweredElement) -> Self {
        let mut raw = RawAnsweredElement {
            index: element.index,
            node: element.node,
            answer: element.answer,
            options: None,
            choices: None,
            questions: None,
        };
        match element.kind {
            AnsweredKind::Leaf => {}
            AnsweredKind::Options(options) => raw.options = Some(options),
            AnsweredKind::Choices(choices) => raw.choices = Some(choices),
            AnsweredKind::Group(questions) => raw.questions = Some(questions),
        }
        raw
    }
}

/// Reduce the chapter tree to the instances that are visible, have a complete
/// output and contain answered questions, in declaration and repeat order.
pub fn prune(chapters: &[Chapter], answers: &AnswerStore) -> Vec<AnsweredChapter> {
    chapters
        .iter()
        .flat_map(|chapter| prune_chapter(chapter, answers, Index::DEFAULT))
        .collect()
}

/// The indices a node is evaluated at: the inherited index when it does not
/// repeat, otherwise one per repeat at the node's own level.
fn instances(
    node: &NodeInfo,
    answers: &AnswerStore,
    index: Index,
    level: Level,
) -> impl Iterator<Item = Index> {
    let repeat = repeat_count(node, answers, index);
    (0..repeat.unwrap_or(1)).map(move |i| match repeat {
        Some(_) => index.with_level(level, i),
        None => index,
    })
}

/// Visible at `index` with a complete output. Questions directly under a
/// chapter or section are included regardless of their `show` conditions.
fn is_included(node: &NodeInfo, answers: &AnswerStore, index: Index, ignore_show: bool) -> bool {
    let included = is_visible(node, answers, index, ignore_show)
        && is_text_complete(node.output.as_ref(), answers, index);
    if !included {
        debug!("pruned {}@{index}", node.id);
    }
    included
}

pub fn prune_chapter(chapter: &Chapter, answers: &AnswerStore, index: Index) -> Vec<AnsweredChapter> {
    instances(&chapter.node, answers, index, Level::Chapter)
        .filter(|&i| is_included(&chapter.node, answers, i, false))
        .filter_map(|i| {
            let questions = prune_questions(&chapter.questions, answers, i);
            let sections: Vec<_> = chapter
                .sections
                .iter()
                .flat_map(|section| prune_section(section, answers, i))
                .collect();
            if questions.is_empty() && sections.is_empty() {
                debug!("chapter {}@{i} has no answers", chapter.node.id);
                return None;
            }
            Some(AnsweredChapter {
                index: i,
                node: chapter.node.clone(),
                questions,
                sections,
            })
        })
        .collect()
}

pub fn prune_section(section: &Section, answers: &AnswerStore, index: Index) -> Vec<AnsweredSection> {
    instances(&section.node, answers, index, Level::Section)
        .filter(|&i| is_included(&section.node, answers, i, false))
        .filter_map(|i| {
            let questions = prune_questions(&section.questions, answers, i);
            (!questions.is_empty()).then(|| AnsweredSection {
                index: i,
                node: section.node.clone(),
                questions,
            })
        })
        .collect()
}

fn prune_questions(questions: &[Element], answers: &AnswerStore, index: Index) -> Vec<AnsweredElement> {
    questions
        .iter()
        .flat_map(|question| prune_question(question, answers, index, true))
        .collect()
}

pub fn prune_question(
    question: &Element,
    answers: &AnswerStore,
    index: Index,
    ignore_show: bool,
) -> Vec<AnsweredElement> {
    instances(&question.node, answers, index, Level::Question)
        .filter(|&i| is_included(&question.node, answers, i, ignore_show))
        .filter_map(|i| clone_answered(question, answers, i))
        .collect()
}

/// Copy of an element holding only its answered parts, or `None` when nothing
/// beneath it was answered. Plain leaves always survive.
pub fn clone_answered(element: &Element, answers: &AnswerStore, index: Index) -> Option<AnsweredElement> {
    let answered_children = |children: &[Element]| -> Vec<AnsweredElement> {
        children
            .iter()
            .filter_map(|child| {
                answers
                    .get_direct(&compose_id(element.id(), child.id()), index)
                    .map(|answer| AnsweredElement::leaf(&child.node, index, Some(answer.clone())))
            })
            .collect()
    };

    let kind = match &element.kind {
        ElementKind::Leaf => return Some(AnsweredElement::leaf(&element.node, index, None)),
        ElementKind::OptionGroup(options) => AnsweredKind::Options(answered_children(options)),
        ElementKind::SelectionGroup(choices) => AnsweredKind::Choices(answered_children(choices)),
        ElementKind::ElementGroup(children) => AnsweredKind::Group(
            children
                .iter()
                .filter(|child| is_included(&child.node, answers, index, false))
                .filter_map(|child| clone_answered(child, answers, index))
                .collect(),
        ),
    };
    let answered = match &kind {
        AnsweredKind::Leaf => true,
        AnsweredKind::Options(c) | AnsweredKind::Choices(c) | AnsweredKind::Group(c) => !c.is_empty(),
    };
    answered.then(|| AnsweredElement {
        index,
        node: element.node.clone(),
        answer: None,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::answers::{SetOptions, MAX_REPEAT};
    use crate::core::template::{Repeat, Show};

    fn chapter(id: &str, output: &str, questions: Vec<Element>) -> Chapter {
        Chapter {
            node: NodeInfo::new(id).with_title(id).with_output(output),
            questions,
            sections: vec![],
        }
    }

    fn choice_question(id: &str) -> Element {
        Element::choices(
            NodeInfo::new(id).with_title("Pick"),
            vec![
                Element::leaf(NodeInfo::new("a").with_output("A chosen")),
                Element::leaf(NodeInfo::new("b").with_output("B chosen")),
            ],
        )
    }

    #[test]
    fn chapter_needs_complete_output() {
        let chapters = vec![chapter(
            "c1",
            "Chapter: &c1.name",
            vec![Element::leaf(NodeInfo::new("name").with_title("Name: _name_"))],
        )];
        let mut answers = AnswerStore::new();
        assert!(prune(&chapters, &answers).is_empty());

        answers.set("c1.name", "Acme", Index::DEFAULT, SetOptions::default());
        let pruned = prune(&chapters, &answers);
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].questions[0].kind, AnsweredKind::Leaf);
    }

    #[test]
    fn only_answered_choices_survive() {
        let chapters = vec![chapter("c", "", vec![choice_question("q")])];
        let mut answers = AnswerStore::new();
        assert!(prune(&chapters, &answers).is_empty());

        answers.set("q.a", false, Index::DEFAULT, SetOptions::default());
        answers.set("q.b", true, Index::DEFAULT, SetOptions::default());
        let pruned = prune(&chapters, &answers);
        match &pruned[0].questions[0].kind {
            AnsweredKind::Choices(choices) => {
                assert_eq!(choices.len(), 1);
                assert_eq!(choices[0].node.id, "b");
                assert!(choices[0].answer.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn literal_repeat_expands_at_own_level() {
        let mut q = choice_question("q");
        q.node.repeat = Some(Repeat::Count(3));
        let chapters = vec![chapter("c", "", vec![q])];
        let mut answers = AnswerStore::new();
        for i in 0..3 {
            answers.set("q.a", true, Index::new(0, 0, i), SetOptions::default());
        }
        let pruned = prune(&chapters, &answers);
        let indices: Vec<_> = pruned[0].questions.iter().map(|q| q.index).collect();
        assert_eq!(
            indices,
            vec![Index::new(0, 0, 0), Index::new(0, 0, 1), Index::new(0, 0, 2)]
        );
    }

    #[test]
    fn unanswered_repeat_driver_drops_descendants() {
        let mut q = choice_question("q");
        q.node.repeat = Some(Repeat::Reference("count".into()));
        let chapters = vec![chapter("c", "", vec![q])];
        let mut answers = AnswerStore::new();
        answers.set("q.a", true, Index::DEFAULT, SetOptions::default());
        assert!(prune(&chapters, &answers).is_empty());

        answers.set("count", 1, Index::DEFAULT, SetOptions::default());
        assert_eq!(prune(&chapters, &answers).len(), 1);
    }

    #[test]
    fn oversized_repeat_driver_is_capped() {
        let section = Section {
            node: NodeInfo::new("team").with_repeat(Repeat::Reference("teams.count".into())),
            questions: vec![choice_question("q")],
        };
        let chapters = vec![Chapter {
            node: NodeInfo::new("c"),
            questions: vec![],
            sections: vec![section],
        }];
        let mut answers = AnswerStore::new();
        answers.set("teams.count", "99999999999999999999", Index::DEFAULT, SetOptions::default());
        for s in [0, 1, MAX_REPEAT - 1, MAX_REPEAT] {
            answers.set("q.a", true, Index::new(0, s, 0), SetOptions::default());
        }
        let pruned = prune(&chapters, &answers);
        let indices: Vec<_> = pruned[0].sections.iter().map(|s| s.index).collect();
        assert_eq!(
            indices,
            vec![
                Index::new(0, 0, 0),
                Index::new(0, 1, 0),
                Index::new(0, MAX_REPEAT - 1, 0)
            ]
        );
    }

    #[test]
    fn question_show_is_ignored_when_compiling() {
        let mut q = choice_question("x");
        q.node.show = Some(Show::One("flag".into()));
        let chapters = vec![chapter("c", "Chapter", vec![q])];
        let mut answers = AnswerStore::new();
        answers.set("x.a", true, Index::DEFAULT, SetOptions::default());

        let pruned = prune(&chapters, &answers);
        assert_eq!(pruned.len(), 1);
        let ids: Vec<_> = pruned[0].questions[0]
            .pre_order()
            .iter()
            .map(|e| e.node.id.as_str())
            .collect();
        assert_eq!(ids, vec!["x", "a"]);
        assert!(prune_question(&chapters[0].questions[0], &answers, Index::DEFAULT, false).is_empty());
    }

    #[test]
    fn group_children_still_honour_show() {
        let mut hidden = choice_question("h");
        hidden.node.show = Some(Show::One("flag".into()));
        let group = Element::group(NodeInfo::new("g"), vec![choice_question("q"), hidden]);
        let mut answers = AnswerStore::new();
        answers.set("q.a", true, Index::DEFAULT, SetOptions::default());
        answers.set("h.b", true, Index::DEFAULT, SetOptions::default());

        let ids = |answers: &AnswerStore| -> Vec<String> {
            clone_answered(&group, answers, Index::DEFAULT)
                .map(|g| g.pre_order().iter().map(|e| e.node.id.clone()).collect())
                .unwrap_or_default()
        };
        assert_eq!(ids(&answers), vec!["g", "q", "a"]);
        answers.set("flag", true, Index::DEFAULT, SetOptions::default());
        assert_eq!(ids(&answers), vec!["g", "q", "a", "h", "b"]);
    }

    #[test]
    fn repeated_sections_carry_their_index() {
        let section = Section {
            node: NodeInfo::new("s").with_repeat(Repeat::Count(2)),
            questions: vec![choice_question("q")],
        };
        let chapters = vec![Chapter {
            node: NodeInfo::new("c"),
            questions: vec![],
            sections: vec![section],
        }];
        let mut answers = AnswerStore::new();
        answers.set("q.b", true, Index::new(0, 1, 0), SetOptions::default());
        let pruned = prune(&chapters, &answers);
        assert_eq!(pruned[0].sections.len(), 1);
        assert_eq!(pruned[0].sections[0].index, Index::new(0, 1, 0));
        assert_eq!(pruned[0].sections[0].questions[0].index, Index::new(0, 1, 0));
    }

    #[test]
    fn groups_keep_visible_answered_children() {
        let group = Element::group(
            NodeInfo::new("g").with_output("Group"),
            vec![
                choice_question("q"),
                Element::leaf(NodeInfo::new("hidden").with_output("needs &x.y")),
            ],
        );
        let mut answers = AnswerStore::new();
        answers.set("q.a", true, Index::DEFAULT, SetOptions::default());
        let cloned = clone_answered(&group, &answers, Index::DEFAULT).unwrap();
        let ids: Vec<_> = cloned.pre_order().iter().map(|e| e.node.id.as_str()).collect();
        assert_eq!(ids, vec!["g", "q", "a"]);
    }

    #[test]
    fn pruned_tree_serializes_with_kind_keys() {
        let chapters = vec![chapter("c", "", vec![choice_question("q")])];
        let mut answers = AnswerStore::new();
        answers.set("q.a", true, Index::DEFAULT, SetOptions::default());
        let json = serde_json::to_value(prune(&chapters, &answers)).unwrap();
        assert_eq!(json[0]["index"], "0.0.0");
        assert_eq!(json[0]["questions"][0]["choices"][0]["id"], "a");
        assert_eq!(json[0]["questions"][0]["choices"][0]["answer"]["value"], true);
    }
}
