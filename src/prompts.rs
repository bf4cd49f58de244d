//! Prompt builders for the LLM analysis step.
//!
//! Every prompt the pipeline sends lives here so the wording can change
//! without touching retry or orchestration code in [`crate::pipeline::llm`]
//! and [`crate::convert`].
//!
//! Prompts that embed the page index serialise it as pretty JSON and cut it
//! at [`MAX_INDEX_CHARS`] characters so a long paper still fits a small
//! local model's context window.

use crate::error::Grobid2MdError;
use crate::paper::Paper;
use crate::pipeline::index::{DocumentIndex, IndexNode};

/// Maximum characters of page-index JSON embedded in a prompt.
pub const MAX_INDEX_CHARS: usize = 12_000;

/// Marker appended after a truncated page index.
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Bibliography entries listed in the citation-analysis prompt.
pub const MAX_PROMPT_BIB_ENTRIES: usize = 30;

/// Authors listed per bibliography entry in the citation-analysis prompt.
pub const MAX_PROMPT_BIB_AUTHORS: usize = 3;

/// Sections listed in the citation-analysis prompt.
pub const MAX_PROMPT_CITING_SECTIONS: usize = 20;

const ASSISTANT_PREAMBLE: &str = "You are an academic research assistant. ";

/// Cut `s` to at most `max` characters, appending [`TRUNCATION_MARKER`]
/// when anything was dropped.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}{}", &s[..byte_idx], TRUNCATION_MARKER),
        None => s.to_string(),
    }
}

/// Pretty JSON of the page index, truncated for prompt use.
pub fn page_index_context(index: &DocumentIndex) -> Result<String, Grobid2MdError> {
    let json = serde_json::to_string_pretty(index)?;
    Ok(truncate_chars(&json, MAX_INDEX_CHARS))
}

fn display_title(paper: &Paper) -> &str {
    if paper.title.is_empty() {
        "Unknown"
    } else {
        &paper.title
    }
}

/// 3-5 sentence summary of the paper from its page index.
pub fn summary_prompt(paper: &Paper, index: &DocumentIndex) -> Result<String, Grobid2MdError> {
    let context = page_index_context(index)?;
    Ok(format!(
        "{ASSISTANT_PREAMBLE}Given the following page index of a research paper, write a brief \
summary (3-5 sentences) that captures the paper's main contribution, methodology, and key \
findings.\n\nPaper Title: {}\n\nPage Index:\n{context}\n\nSummary:",
        display_title(paper)
    ))
}

/// Analysis of how the bibliography supports the paper, section by section.
pub fn citation_prompt(paper: &Paper) -> String {
    let bib_text = paper
        .bibliography
        .iter()
        .take(MAX_PROMPT_BIB_ENTRIES)
        .map(|(key, entry)| {
            let authors = entry
                .authors
                .iter()
                .take(MAX_PROMPT_BIB_AUTHORS)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            format!("  {key}: {authors}. \"{}\" ({})", entry.title, entry.date)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let cite_text = paper
        .sections
        .iter()
        .filter(|s| !s.citations.is_empty())
        .take(MAX_PROMPT_CITING_SECTIONS)
        .map(|s| {
            let heading = if s.heading.is_empty() {
                "Unnamed"
            } else {
                s.heading.as_str()
            };
            let keys: Vec<&str> = s.citations.iter().map(|c| c.key.as_str()).collect();
            format!("  Section \"{heading}\": {keys:?}")
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{ASSISTANT_PREAMBLE}Analyse how the citations in this paper support its arguments.\n\n\
Paper Title: {}\n\n\
Bibliography:\n{bib_text}\n\n\
Citation usage by section:\n{cite_text}\n\n\
Provide a brief analysis of:\n\
1. Which citations are most central to the paper's argument\n\
2. How different sections rely on different citation groups\n\
3. Any patterns in the citation usage\n\n\
Analysis:",
        display_title(paper)
    )
}

/// Free-form question answered from the page index.
pub fn query_prompt(
    paper: &Paper,
    index: &DocumentIndex,
    query: &str,
) -> Result<String, Grobid2MdError> {
    let context = page_index_context(index)?;
    Ok(format!(
        "{ASSISTANT_PREAMBLE}Answer the following question based on the paper's page index.\n\n\
Paper Title: {}\n\nPage Index:\n{context}\n\nQuestion: {query}\n\nAnswer:",
        display_title(paper)
    ))
}

/// Short description of one index node.
pub fn node_summary_prompt(node: &IndexNode) -> String {
    format!(
        "You are given a part of a document. Generate a brief description of the main points \
covered in this section.\n\nSection Text: {}\n\nReturn only the description, no preamble.",
        node.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::{BibEntry, Bibliography, Citation, Section};

    fn paper_with_citations(n_bib: usize, n_sections: usize) -> Paper {
        let mut bibliography = Bibliography::new();
        for i in 0..n_bib {
            bibliography.insert(
                format!("#b{i}"),
                BibEntry {
                    title: format!("Paper {i}"),
                    authors: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                    date: "2017".into(),
                    ..Default::default()
                },
            );
        }
        let sections = (0..n_sections)
            .map(|i| Section {
                heading: if i == 0 { String::new() } else { format!("S{i}") },
                level: 1,
                citations: vec![Citation {
                    key: format!("#b{i}"),
                    text: format!("[{i}]"),
                }],
                ..Default::default()
            })
            .collect();
        Paper {
            title: "Attention".into(),
            sections,
            bibliography,
            ..Default::default()
        }
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        assert_eq!(truncate_chars("héllo", 2), "hé\n... [truncated]");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn summary_prompt_embeds_truncated_index() {
        let index = DocumentIndex {
            doc_name: "paper.md".into(),
            structure: vec![IndexNode {
                title: "T".into(),
                node_id: "0000".into(),
                level: 1,
                text: "x".repeat(20_000),
                summary: None,
                nodes: Vec::new(),
            }],
        };
        let prompt = summary_prompt(&Paper::default(), &index).unwrap();
        assert!(prompt.contains("Paper Title: Unknown"));
        assert!(prompt.contains(TRUNCATION_MARKER));
        assert!(prompt.ends_with("Summary:"));
        assert!(prompt.len() < 13_000);
    }

    #[test]
    fn citation_prompt_limits_entries_authors_and_sections() {
        let prompt = citation_prompt(&paper_with_citations(40, 25));
        assert!(prompt.contains("  #b0: A, B, C. \"Paper 0\" (2017)"));
        assert!(prompt.contains("  #b29:"));
        assert!(!prompt.contains("  #b30:"));
        assert!(!prompt.contains(", D."));
        assert!(prompt.contains("  Section \"Unnamed\": [\"#b0\"]"));
        assert!(prompt.contains("Section \"S19\""));
        assert!(!prompt.contains("Section \"S20\""));
    }

    #[test]
    fn query_prompt_carries_question() {
        let index = DocumentIndex {
            doc_name: "paper.md".into(),
            structure: Vec::new(),
        };
        let paper = paper_with_citations(0, 0);
        let prompt = query_prompt(&paper, &index, "What is multi-head attention?").unwrap();
        assert!(prompt.contains("Paper Title: Attention"));
        assert!(prompt.contains("Question: What is multi-head attention?\n\nAnswer:"));
    }
}
