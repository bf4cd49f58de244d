//! Markdown serialization of a [`Paper`].
//!
//! ## Heading scheme
//!
//! ```text
//! # Title                      one per document
//! ## Abstract                  fixed
//! ## 1 Introduction            section level 1
//! ### 1.1 Motivation           section level 2 (level + 1 hashes)
//! ## References                fixed
//! ```
//!
//! The downstream indexer maps heading depth to tree depth, so the title is
//! the only single-hash heading and section depth is always `level + 1`.
//!
//! Inline citations keep the label they had in the paper (`[Cho et al.,
//! 2014]`) while the References block is numbered positionally (`[1]`, `[2]`,
//! …). The two are deliberately not reconciled.

use crate::paper::{BibEntry, Paper, Section};

const UNTITLED: &str = "Untitled";
const UNTITLED_SECTION: &str = "Untitled Section";

/// Render `paper` as markdown. Every block is followed by one blank line.
pub fn serialize(paper: &Paper) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut block = |line: String| {
        lines.push(line);
        lines.push(String::new());
    };

    let title = if paper.title.is_empty() {
        UNTITLED
    } else {
        paper.title.as_str()
    };
    block(format!("# {title}"));

    if !paper.authors.is_empty() {
        let authors = paper
            .authors
            .iter()
            .map(|a| {
                if a.affiliation.is_empty() {
                    a.name.clone()
                } else {
                    format!("{} ({})", a.name, a.affiliation)
                }
            })
            .collect::<Vec<_>>()
            .join("; ");
        block(format!("**Authors:** {authors}"));
    }

    if !paper.date.is_empty() {
        block(format!("**Date:** {}", paper.date));
    }

    if !paper.abstract_text.is_empty() {
        block("## Abstract".to_string());
        block(paper.abstract_text.clone());
    }

    for section in &paper.sections {
        block(section_heading(section));
        if !section.text.is_empty() {
            block(section.text.clone());
        }
    }

    if !paper.bibliography.is_empty() {
        block("## References".to_string());
        for (n, (_key, entry)) in paper.bibliography.iter().enumerate() {
            block(format_bib_entry(n + 1, entry));
        }
    }

    lines.join("\n")
}

/// Heading line for a section: `level + 1` hashes, then number and heading.
pub fn section_heading(section: &Section) -> String {
    let hashes = "#".repeat(section.level + 1);
    let label = match (section.section_num.is_empty(), section.heading.is_empty()) {
        (false, false) => format!("{} {}", section.section_num, section.heading),
        (false, true) => section.section_num.clone(),
        (true, false) => section.heading.clone(),
        (true, true) => UNTITLED_SECTION.to_string(),
    };
    format!("{hashes} {label}")
}

/// One References line: `[n] Authors. "Title". *Journal*. (Date). DOI: doi`,
/// with each clause omitted when its field is empty.
pub fn format_bib_entry(n: usize, entry: &BibEntry) -> String {
    let mut parts = vec![format!("[{n}]")];
    if !entry.authors.is_empty() {
        parts.push(format!("{}.", entry.authors.join(", ")));
    }
    if !entry.title.is_empty() {
        parts.push(format!("\"{}\".", entry.title));
    }
    if !entry.journal.is_empty() {
        parts.push(format!("*{}*.", entry.journal));
    }
    if !entry.date.is_empty() {
        parts.push(format!("({}).", entry.date));
    }
    if !entry.doi.is_empty() {
        parts.push(format!("DOI: {}", entry.doi));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::{Author, Bibliography};

    fn section(level: usize, num: &str, heading: &str, text: &str) -> Section {
        Section {
            heading: heading.into(),
            section_num: num.into(),
            level,
            text: text.into(),
            citations: Vec::new(),
        }
    }

    #[test]
    fn heading_label_variants() {
        assert_eq!(section_heading(&section(1, "2", "Background", "")), "## 2 Background");
        assert_eq!(section_heading(&section(2, "", "Self-Attention", "")), "### Self-Attention");
        assert_eq!(section_heading(&section(3, "4.1.2", "", "")), "#### 4.1.2");
        assert_eq!(section_heading(&section(1, "", "", "")), "## Untitled Section");
    }

    #[test]
    fn empty_paper_is_just_untitled() {
        assert_eq!(serialize(&Paper::default()), "# Untitled\n");
    }

    #[test]
    fn header_blocks_are_separated_by_blank_lines() {
        let paper = Paper {
            title: "T".into(),
            authors: vec![
                Author {
                    name: "A One".into(),
                    affiliation: "Uni".into(),
                },
                Author {
                    name: "B Two".into(),
                    affiliation: String::new(),
                },
            ],
            abstract_text: "Abs.".into(),
            date: "2020".into(),
            ..Default::default()
        };
        assert_eq!(
            serialize(&paper),
            "# T\n\n**Authors:** A One (Uni); B Two\n\n**Date:** 2020\n\n## Abstract\n\nAbs.\n"
        );
    }

    #[test]
    fn section_without_text_has_only_heading() {
        let paper = Paper {
            title: "T".into(),
            sections: vec![section(1, "1", "Empty", ""), section(2, "1.1", "Full", "Body.")],
            ..Default::default()
        };
        assert_eq!(
            serialize(&paper),
            "# T\n\n## 1 Empty\n\n### 1.1 Full\n\nBody.\n"
        );
    }

    #[test]
    fn bib_entry_full_and_sparse() {
        let full = BibEntry {
            title: "Long Short-Term Memory".into(),
            authors: vec!["Sepp Hochreiter".into(), "Jürgen Schmidhuber".into()],
            date: "1997".into(),
            journal: "Neural Computation".into(),
            doi: "10.1162/neco".into(),
        };
        assert_eq!(
            format_bib_entry(1, &full),
            "[1] Sepp Hochreiter, Jürgen Schmidhuber. \"Long Short-Term Memory\". *Neural Computation*. (1997). DOI: 10.1162/neco"
        );
        assert_eq!(format_bib_entry(7, &BibEntry::default()), "[7]");
    }

    #[test]
    fn references_are_numbered_by_position_not_key() {
        let mut bib = Bibliography::new();
        for (key, title) in [("#b9", "Nine"), ("#b10", "Ten"), ("#b0", "Zero")] {
            bib.insert(
                key,
                BibEntry {
                    title: title.into(),
                    ..Default::default()
                },
            );
        }
        let paper = Paper {
            title: "T".into(),
            bibliography: bib,
            ..Default::default()
        };
        let md = serialize(&paper);
        assert!(md.contains("[1] \"Nine\"."));
        assert!(md.contains("[2] \"Ten\"."));
        assert!(md.contains("[3] \"Zero\"."));
        assert!(md.find("## References").unwrap() < md.find("[1]").unwrap());
    }
}
