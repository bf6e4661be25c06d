use crate::core::answers::{clamp_count, AnswerStore};
use crate::core::index::Index;
use crate::core::placeholders::is_text_complete;
use crate::core::template::{NodeInfo, Repeat, Show};
use log::debug;

/// What an unrepeated node counts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatDefault {
    /// The editor draws an unrepeated node once.
    Render,
    /// The pruner evaluates an unrepeated node once at the inherited index
    /// without expanding it.
    Prune,
}

impl RepeatDefault {
    fn count(self) -> u32 {
        match self {
            RepeatDefault::Render => 1,
            RepeatDefault::Prune => 0,
        }
    }
}

/// Whether a node should be drawn or included at `index`: every placeholder
/// in its title and description is answered and, unless `ignore_show`, one of
/// its `show` conditions holds.
pub fn is_visible(node: &NodeInfo, answers: &AnswerStore, index: Index, ignore_show: bool) -> bool {
    if !is_text_complete(Some(&node.title), answers, index)
        || !is_text_complete(node.description.as_ref(), answers, index)
    {
        return false;
    }
    match &node.show {
        Some(show) if !ignore_show && !show.is_empty() => is_shown(show, answers, index),
        _ => true,
    }
}

/// OR over the conditions; within a condition, `&` separated ids must all be set.
pub fn is_shown(show: &Show, answers: &AnswerStore, index: Index) -> bool {
    show.conditions().iter().any(|condition| {
        condition.split('&').all(|id| {
            answers
                .get(id.trim(), index)
                .is_some_and(|value| value.is_set())
        })
    })
}

/// The declared repeat count of a node, or `None` when the node does not repeat.
/// A reference to a missing or non-numeric answer counts as zero, and counts
/// are capped at `MAX_REPEAT`.
pub fn repeat_count(node: &NodeInfo, answers: &AnswerStore, index: Index) -> Option<u32> {
    let repeat = node.repeat.as_ref().filter(|r| !r.is_unset())?;
    Some(match repeat {
        Repeat::Count(n) => clamp_count(*n),
        Repeat::Reference(id) => match answers.get(id, index) {
            Some(value) => value.as_count(),
            None => {
                debug!("repeat of {} refers to unanswered {id} at {index}", node.id);
                0
            }
        },
    })
}

/// Number of instances of a node, with unrepeated nodes counted per `default`.
pub fn resolve_repeat(
    node: &NodeInfo,
    answers: &AnswerStore,
    index: Index,
    default: RepeatDefault,
) -> u32 {
    repeat_count(node, answers, index).unwrap_or_else(|| default.count())
}
