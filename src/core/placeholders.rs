use crate::core::answers::AnswerStore;
use crate::core::index::{Index, Level};
use crate::utils::letters::to_letters;
use crate::utils::markdown::MarkdownRenderer;
use crate::Text;
use log::trace;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

/// `&id.subid` references to earlier answers.
fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"&([a-zA-Z0-9_]+\.[a-zA-Z0-9_]+)").expect("valid regex"))
}

/// Replace `$chapterIndex`, `$sectionIndex` and `$questionIndex` with the 1-based
/// repeat number, and the `...IndexStr` variants with letters (A, B, ..., AA).
pub fn replace_repeat_index(text: &str, index: Index) -> Cow<'_, str> {
    if !["$chapterIndex", "$sectionIndex", "$questionIndex"]
        .iter()
        .any(|token| text.contains(token))
    {
        return Cow::Borrowed(text);
    }
    const TOKENS: [(&str, &str, Level); 3] = [
        ("$chapterIndexStr", "$chapterIndex", Level::Chapter),
        ("$sectionIndexStr", "$sectionIndex", Level::Section),
        ("$questionIndexStr", "$questionIndex", Level::Question),
    ];
    let number = |level: Level| u64::from(index.component(level)) + 1;
    let mut out = text.to_string();
    // letter forms first, they share a prefix with the numeric ones
    for (letters, _, level) in TOKENS {
        out = out.replace(letters, &to_letters(number(level)));
    }
    for (_, digits, level) in TOKENS {
        out = out.replace(digits, &number(level).to_string());
    }
    Cow::Owned(out)
}

/// Substitute index tokens and answered placeholders. Placeholders without an
/// answer are left as they are.
pub fn resolve(text: &str, answers: &AnswerStore, index: Index) -> String {
    let text = replace_repeat_index(text, index);
    let re = placeholder_regex();

    let mut replacements: HashMap<&str, String> = HashMap::new();
    for caps in re.captures_iter(&text) {
        let Some(id) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if replacements.contains_key(id) {
            continue;
        }
        match answers.get(id, index).filter(|v| v.is_truthy()) {
            Some(value) => {
                replacements.insert(id, value.to_string());
            }
            None => trace!("placeholder &{id} unresolved at {index}"),
        }
    }
    if replacements.is_empty() {
        return text.into_owned();
    }
    re.replace_all(&text, |caps: &Captures| match replacements.get(&caps[1]) {
        Some(value) => value.clone(),
        None => caps[0].to_string(),
    })
    .into_owned()
}

/// [`resolve`], then render the result as Markdown.
pub fn resolve_markdown(
    text: &str,
    answers: &AnswerStore,
    index: Index,
    renderer: &dyn MarkdownRenderer,
) -> String {
    renderer.render(&resolve(text, answers, index))
}

/// Whether every placeholder in the text has an answer.
pub fn is_complete(text: &str, answers: &AnswerStore, index: Index) -> bool {
    placeholder_regex().captures_iter(text).all(|caps| {
        answers
            .get(&caps[1], index)
            .is_some_and(|value| value.is_truthy())
    })
}

/// [`resolve`] for optional template text; missing text resolves to "".
pub fn resolve_text(text: Option<&Text>, answers: &AnswerStore, index: Index) -> String {
    text.map(|t| resolve(&t.joined(), answers, index))
        .unwrap_or_default()
}

/// [`is_complete`] for optional template text; missing text is complete.
pub fn is_text_complete(text: Option<&Text>, answers: &AnswerStore, index: Index) -> bool {
    text.map_or(true, |t| is_complete(&t.joined(), answers, index))
}
