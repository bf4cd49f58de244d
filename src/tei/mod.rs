//! TEI extraction: GROBID TEI XML → [`Paper`].
//!
//! ## Field resolution
//!
//! Several fields can live in more than one place in a GROBID document (the
//! main title may or may not carry `type="main"`, a reference's title may sit
//! at article or monograph level, …). Each such field has a named constant
//! listing its lookup paths in preference order. The first path producing a
//! non-empty value wins; when none does, the field is empty. Missing fields
//! are never errors.
//!
//! ## Sections
//!
//! `<div>` containers under `<body>` are walked recursively and emitted in
//! pre-order with a depth `level`, so a parent is immediately followed by its
//! children and then by its next sibling. A `<div>` without heading or
//! paragraphs still produces a (blank) section to keep the depth sequence
//! intact for its children.
//!
//! ## Paragraphs
//!
//! A `<p>` is read as a sequence of [`Inline`] items. Text runs are copied
//! verbatim. `<ref type="bibr" target="…">` spans are bracket-wrapped and
//! recorded as [`Citation`]s; every other inline element contributes its
//! trimmed text and nothing else.

pub mod dom;
pub mod path;

use crate::error::Grobid2MdError;
use crate::paper::{Author, BibEntry, Bibliography, Citation, Paper, Section};
use dom::{Element, Node};
use path::{find, select, Step};
use tracing::debug;

/// `type` attribute value marking an inline reference as a bibliography citation.
pub const CITATION_REF_TYPE: &str = "bibr";

/// Document title: explicit main title first, then any title in the title statement.
pub const TITLE_PATHS: &[&[Step]] = &[
    &[
        Step::descendant("titleStmt"),
        Step::child("title").with_attr("type", "main"),
    ],
    &[Step::descendant("titleStmt"), Step::child("title")],
];

/// Author records of the paper itself.
pub const AUTHOR_PATH: &[Step] = &[Step::descendant("sourceDesc"), Step::descendant("author")];

pub const ABSTRACT_PATH: &[Step] = &[Step::descendant("profileDesc"), Step::child("abstract")];

/// Publication date: the `published` date first, then any date in the source description.
pub const DATE_PATHS: &[&[Step]] = &[
    &[
        Step::descendant("sourceDesc"),
        Step::descendant("date").with_attr("type", "published"),
    ],
    &[Step::descendant("sourceDesc"), Step::descendant("date")],
];

pub const BODY_PATH: &[Step] = &[Step::descendant("body")];

pub const BIBL_ENTRY_PATH: &[Step] = &[Step::descendant("listBibl"), Step::child("biblStruct")];

/// Reference title: article-level main title first, then the monograph title.
pub const BIBL_TITLE_PATHS: &[&[Step]] = &[
    &[
        Step::descendant("analytic"),
        Step::child("title").with_attr("type", "main"),
    ],
    &[Step::descendant("monogr"), Step::child("title")],
];

/// Reference authors: article-level names first, monograph-level names only
/// when the article level has none. The two sets are never merged.
pub const BIBL_AUTHOR_PATHS: &[&[Step]] = &[
    &[
        Step::descendant("analytic"),
        Step::descendant("author"),
        Step::child("persName"),
    ],
    &[
        Step::descendant("monogr"),
        Step::descendant("author"),
        Step::child("persName"),
    ],
];

pub const BIBL_DATE_PATH: &[Step] = &[
    Step::descendant("monogr"),
    Step::child("imprint"),
    Step::child("date"),
];

pub const BIBL_JOURNAL_PATH: &[Step] = &[
    Step::descendant("monogr"),
    Step::child("title").with_attr("level", "j"),
];

pub const BIBL_DOI_PATH: &[Step] = &[Step::descendant("idno").with_attr("type", "DOI")];

/// Parse a GROBID TEI document into a [`Paper`].
///
/// # Errors
/// [`Grobid2MdError::MalformedInput`] when `xml` is not well-formed. Any
/// well-formed document produces a `Paper`, however sparse.
pub fn extract(xml: &str) -> Result<Paper, Grobid2MdError> {
    let root = dom::parse(xml)?;

    let paper = Paper {
        title: first_text(&root, TITLE_PATHS),
        authors: extract_authors(&root),
        abstract_text: find(&root, ABSTRACT_PATH)
            .map(Element::trimmed_text)
            .unwrap_or_default(),
        date: first_date(&root, DATE_PATHS),
        sections: extract_sections(&root),
        bibliography: extract_bibliography(&root),
    };

    debug!(
        "Extracted '{}': {} authors, {} sections, {} citations, {} references",
        paper.title,
        paper.authors.len(),
        paper.sections.len(),
        paper.citation_count(),
        paper.bibliography.len()
    );

    Ok(paper)
}

// ── Field helpers ────────────────────────────────────────────────────────

/// Trimmed text of the first path that yields non-empty text.
fn first_text(context: &Element, paths: &[&[Step]]) -> String {
    paths
        .iter()
        .filter_map(|p| find(context, p))
        .map(Element::trimmed_text)
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

/// Date value of the first path that yields a non-empty date.
fn first_date(context: &Element, paths: &[&[Step]]) -> String {
    paths
        .iter()
        .filter_map(|p| find(context, p))
        .map(date_value)
        .find(|d| !d.is_empty())
        .unwrap_or_default()
}

/// Machine-readable `when` attribute if set, else the rendered text.
fn date_value(date: &Element) -> String {
    match date.attr("when").map(str::trim) {
        Some(when) if !when.is_empty() => when.to_string(),
        _ => date.trimmed_text(),
    }
}

/// `forename surname` of a `<persName>`, trimmed.
fn person_name(pers: &Element) -> String {
    let part = |name: &str| pers.child(name).map(Element::trimmed_text).unwrap_or_default();
    format!("{} {}", part("forename"), part("surname"))
        .trim()
        .to_string()
}

// ── Header ───────────────────────────────────────────────────────────────

fn extract_authors(root: &Element) -> Vec<Author> {
    select(root, AUTHOR_PATH)
        .into_iter()
        .filter_map(|author| {
            let Some(pers) = author.child("persName") else {
                debug!("Skipping author without persName");
                return None;
            };
            let affiliation = author
                .child("affiliation")
                .and_then(|aff| {
                    aff.children_named("orgName")
                        .find(|org| org.attr("type") == Some("institution"))
                })
                .map(Element::trimmed_text)
                .unwrap_or_default();
            Some(Author {
                name: person_name(pers),
                affiliation,
            })
        })
        .collect()
}

// ── Body ─────────────────────────────────────────────────────────────────

fn extract_sections(root: &Element) -> Vec<Section> {
    let mut sections = Vec::new();
    if let Some(body) = find(root, BODY_PATH) {
        walk_divs(body, 1, &mut sections);
    }
    sections
}

fn walk_divs(parent: &Element, level: usize, sections: &mut Vec<Section>) {
    for div in parent.children_named("div") {
        let head = div.child("head");
        let heading = head.map(Element::trimmed_text).unwrap_or_default();
        // The numbering lives on <head n="…">, not on the <div>.
        let section_num = head
            .and_then(|h| h.attr("n"))
            .map(|n| n.trim().to_string())
            .unwrap_or_default();

        let mut paragraphs = Vec::new();
        let mut citations = Vec::new();
        for p in div.children_named("p") {
            let (text, cites) = extract_paragraph(p);
            paragraphs.push(text);
            citations.extend(cites);
        }

        sections.push(Section {
            heading,
            section_num,
            level,
            text: paragraphs.join("\n\n"),
            citations,
        });

        walk_divs(div, level + 1, sections);
    }
}

/// One item of a paragraph's mixed content.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Inline<'a> {
    Text(&'a str),
    Span(Span),
}

/// An inline element, classified by how it renders.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Span {
    /// Bibliography reference: bracket-wrapped and recorded.
    Citation { key: String, label: String },
    /// Anything else: its text, as is.
    Verbatim(String),
}

fn inline_content(p: &Element) -> Vec<Inline<'_>> {
    p.children
        .iter()
        .map(|node| match node {
            Node::Text(text) => Inline::Text(text),
            Node::Element(el) => Inline::Span(classify_span(el)),
        })
        .collect()
}

fn classify_span(el: &Element) -> Span {
    let label = el.trimmed_text();
    if el.name == "ref" && el.attr("type") == Some(CITATION_REF_TYPE) {
        if let Some(target) = el.attr("target").filter(|t| !t.is_empty()) {
            return Span::Citation {
                key: target.to_string(),
                label,
            };
        }
    }
    Span::Verbatim(label)
}

/// Render a `<p>` to text, collecting its citations left to right.
fn extract_paragraph(p: &Element) -> (String, Vec<Citation>) {
    let mut text = String::new();
    let mut citations = Vec::new();

    for inline in inline_content(p) {
        match inline {
            Inline::Text(run) => text.push_str(run),
            Inline::Span(Span::Citation { key, label }) => {
                text.push('[');
                text.push_str(&label);
                text.push(']');
                citations.push(Citation { key, text: label });
            }
            Inline::Span(Span::Verbatim(label)) => text.push_str(&label),
        }
    }

    (text, citations)
}

// ── Back matter ──────────────────────────────────────────────────────────

fn extract_bibliography(root: &Element) -> Bibliography {
    let mut bibliography = Bibliography::new();

    for entry in select(root, BIBL_ENTRY_PATH) {
        let Some(xml_id) = entry.attr("xml:id").filter(|id| !id.is_empty()) else {
            debug!("Dropping biblStruct without xml:id");
            continue;
        };

        let authors = BIBL_AUTHOR_PATHS
            .iter()
            .map(|p| select(entry, p).into_iter().map(person_name).collect::<Vec<_>>())
            .find(|names| !names.is_empty())
            .unwrap_or_default();

        bibliography.insert(
            format!("#{xml_id}"),
            BibEntry {
                title: first_text(entry, BIBL_TITLE_PATHS),
                authors,
                date: find(entry, BIBL_DATE_PATH).map(date_value).unwrap_or_default(),
                journal: find(entry, BIBL_JOURNAL_PATH)
                    .map(Element::trimmed_text)
                    .unwrap_or_default(),
                doi: find(entry, BIBL_DOI_PATH)
                    .map(Element::trimmed_text)
                    .unwrap_or_default(),
            },
        );
    }

    bibliography
}
