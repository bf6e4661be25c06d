use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};

/// Converts Markdown to HTML.
pub trait MarkdownRenderer {
    fn render(&self, markdown: &str) -> String;
}

/// CommonMark renderer: GFM tables and strikethrough, smart punctuation,
/// unordered lists without the default list styling and no heading ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmarkRenderer;

const UNORDERED_LIST_OPEN: &str = "<ul class=\"browser-default\">\n";

impl MarkdownRenderer for CmarkRenderer {
    fn render(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);

        let events = Parser::new_ext(markdown, options).map(|event| match event {
            Event::Start(Tag::List(None)) => Event::Html(CowStr::Borrowed(UNORDERED_LIST_OPEN)),
            Event::End(TagEnd::List(false)) => Event::Html(CowStr::Borrowed("</ul>\n")),
            other => other,
        });

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events);
        out
    }
}

/// Leaves text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl MarkdownRenderer for PlainRenderer {
    fn render(&self, markdown: &str) -> String {
        markdown.to_string()
    }
}
