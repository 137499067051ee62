use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use scraper::{Html, Node};
use tracing::{info, warn};

use crate::config::{PipelineConfig, SourceConfig};
use crate::util::sha256_text;

const INVISIBLE_CHARS: &[char] = &[
    '\n', '\t', '\r', '\u{a0}', '\u{200b}', '\u{200e}', '\u{200f}', '\u{202a}', '\u{202c}',
    '\u{202d}', '\u{202e}', '\u{2060}', '\u{feff}',
];

pub trait DocumentSource {
    fn fetch(&self, document_id: &str) -> Result<String>;
}

pub struct HttpDocumentSource {
    client: reqwest::blocking::Client,
    config: SourceConfig,
}

impl HttpDocumentSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()
            .context("failed to build document HTTP client")?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn from_pipeline(config: &PipelineConfig) -> Result<Self> {
        Self::new(&config.source)
    }
}

impl DocumentSource for HttpDocumentSource {
    fn fetch(&self, document_id: &str) -> Result<String> {
        let url = self.config.document_url(document_id);
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("document source rejected {url}"))?;

        let body = response
            .text()
            .with_context(|| format!("failed to read body of {url}"))?;
        info!(document_id, bytes = body.len(), "fetched document");
        Ok(body)
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub raw: String,
    pub visible: String,
    pub source_hash: String,
}

impl Document {
    pub fn from_markup(id: &str, raw: String) -> Self {
        let html = Html::parse_document(&raw);
        let visible = visible_text(&html);
        let source_hash = sha256_text(&raw);
        Self {
            id: id.to_string(),
            raw,
            visible,
            source_hash,
        }
    }

    pub fn parse(&self) -> Html {
        Html::parse_document(&self.raw)
    }
}

pub fn fetch_document(source: &dyn DocumentSource, document_id: &str) -> Option<Document> {
    match source.fetch(document_id) {
        Ok(raw) if raw.trim().is_empty() => {
            warn!(document_id, "document source returned empty content");
            None
        }
        Ok(raw) => Some(Document::from_markup(document_id, raw)),
        Err(err) => {
            warn!(document_id, error = %err, "document retrieval failed");
            None
        }
    }
}

pub fn visible_text(html: &Html) -> String {
    let mut out = String::new();
    for node in html.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if has_hidden_ancestor(node.ancestors().map(|ancestor| ancestor.value())) {
            continue;
        }
        out.push_str(text);
    }
    strip_escape_pairs(&out)
}

pub fn strip_escape_pairs(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(character) = chars.next() {
        if character == '\\' {
            chars.next();
            continue;
        }
        out.push(character);
    }
    out
}

pub fn discovery_excerpt(html: &Html, max_elements: usize, max_chars: usize) -> String {
    let mut parts = Vec::<String>::new();
    for node in html.tree.root().descendants() {
        if parts.len() >= max_elements {
            break;
        }
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if text.trim().is_empty()
            || has_hidden_ancestor(node.ancestors().map(|ancestor| ancestor.value()))
        {
            continue;
        }
        let Some(parent) = node.parent() else {
            continue;
        };
        let parent_text = parent
            .descendants()
            .filter_map(|child| child.value().as_text().map(|value| value.to_string()))
            .collect::<String>();
        parts.push(parent_text);
    }

    let joined = parts.concat();
    let truncated = joined.chars().take(max_chars).collect::<String>();
    truncated.replace(INVISIBLE_CHARS, "")
}

fn has_hidden_ancestor<'a>(mut ancestors: impl Iterator<Item = &'a Node>) -> bool {
    ancestors.any(|ancestor| {
        ancestor
            .as_element()
            .map(|element| matches!(element.name(), "script" | "style"))
            .unwrap_or(false)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Span,
    Paragraph,
    Division,
    Table,
}

impl SectionKind {
    pub const ALL: [SectionKind; 4] = [Self::Span, Self::Paragraph, Self::Division, Self::Table];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Span => "span",
            Self::Paragraph => "p",
            Self::Division => "div",
            Self::Table => "table",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub raw_text: String,
    pub spaced_text: String,
    pub next_sibling: Option<usize>,
}

impl Section {
    pub fn new(raw_text: &str, next_sibling: Option<usize>) -> Self {
        let spaced_text = raw_text.split_whitespace().collect::<Vec<&str>>().join(" ");
        Self {
            raw_text: raw_text.to_string(),
            spaced_text,
            next_sibling,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SectionIndex {
    lists: HashMap<SectionKind, Vec<Section>>,
}

impl SectionIndex {
    pub fn from_html(html: &Html) -> Self {
        let mut lists = HashMap::new();
        for kind in SectionKind::ALL {
            lists.insert(kind, collect_sections(html, kind.tag()));
        }
        Self { lists }
    }

    #[cfg(test)]
    pub fn with_sections(kind: SectionKind, sections: Vec<Section>) -> Self {
        let mut lists = HashMap::new();
        lists.insert(kind, sections);
        Self { lists }
    }

    pub fn sections(&self, kind: SectionKind) -> &[Section] {
        self.lists.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }
}

fn collect_sections(html: &Html, tag: &str) -> Vec<Section> {
    let nodes = html
        .tree
        .root()
        .descendants()
        .filter(|node| {
            node.value()
                .as_element()
                .map(|element| element.name() == tag)
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    let mut index_of = HashMap::new();
    for (index, node) in nodes.iter().enumerate() {
        index_of.insert(node.id(), index);
    }

    nodes
        .iter()
        .map(|node| {
            let raw_text = node
                .descendants()
                .filter(|child| !has_hidden_ancestor(child.ancestors().map(|ancestor| ancestor.value())))
                .filter_map(|child| child.value().as_text().map(|value| value.to_string()))
                .collect::<String>();
            let next_sibling = node
                .next_siblings()
                .find(|sibling| {
                    sibling
                        .value()
                        .as_element()
                        .map(|element| element.name() == tag)
                        .unwrap_or(false)
                })
                .and_then(|sibling| index_of.get(&sibling.id()).copied());
            Section::new(&strip_escape_pairs(&raw_text), next_sibling)
        })
        .collect()
}

#[cfg(test)]
pub mod fakes {
    use std::collections::HashMap;

    use anyhow::bail;

    use super::*;

    #[derive(Default)]
    pub struct StaticSource {
        documents: HashMap<String, String>,
    }

    impl StaticSource {
        pub fn with(mut self, document_id: &str, markup: &str) -> Self {
            self.documents
                .insert(document_id.to_string(), markup.to_string());
            self
        }
    }

    impl DocumentSource for StaticSource {
        fn fetch(&self, document_id: &str) -> Result<String> {
            match self.documents.get(document_id) {
                Some(markup) => Ok(markup.clone()),
                None => bail!("document {document_id} not found"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><head><style>p { color: red; }</style><script>var x = 1;</script></head>
        <body>
          <div><p>First <b>bold</b> para</p><p>Second para</p><span>loose</span><p>Third</p></div>
          <div><p>Other parent</p></div>
        </body></html>
    "#;

    #[test]
    fn visible_text_skips_script_and_style() {
        let html = Html::parse_document(SAMPLE);
        let text = visible_text(&html);
        assert!(text.contains("First bold para"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("var x"));
    }

    #[test]
    fn strip_escape_pairs_removes_backslash_and_next_char() {
        assert_eq!(strip_escape_pairs(r"a\nb\\c"), "abc");
        assert_eq!(strip_escape_pairs("plain"), "plain");
    }

    #[test]
    fn section_index_links_same_kind_siblings_only_within_parent() {
        let html = Html::parse_document(SAMPLE);
        let index = SectionIndex::from_html(&html);
        let paragraphs = index.sections(SectionKind::Paragraph);

        assert_eq!(paragraphs.len(), 4);
        assert_eq!(paragraphs[0].spaced_text, "First bold para");
        assert_eq!(paragraphs[0].next_sibling, Some(1));
        assert_eq!(paragraphs[1].next_sibling, Some(2));
        assert_eq!(paragraphs[2].next_sibling, None);
        assert_eq!(paragraphs[3].next_sibling, None);
    }

    #[test]
    fn discovery_excerpt_respects_character_budget_and_drops_invisible_chars() {
        let html = Html::parse_document("<p>Alpha\u{200b} Fund\n</p><p>Beta Fund</p>");
        let excerpt = discovery_excerpt(&html, 50, 8);
        assert_eq!(excerpt, "Alpha F");
    }

    #[test]
    fn document_hash_is_stable_for_identical_markup() {
        let first = Document::from_markup("2854858", "<p>x</p>".to_string());
        let second = Document::from_markup("2854858", "<p>x</p>".to_string());
        assert_eq!(first.source_hash, second.source_hash);
        assert_eq!(first.visible, "x");
    }
}
