//! Lookup paths over the TEI tree.
//!
//! A path is a slice of [`Step`]s evaluated left to right from a context
//! element, in the spirit of `.//a/b[@type='x']`. Fields with more than one
//! possible source location are described as an ordered list of paths in
//! [`crate::tei`]; the first path that yields a non-empty value wins.

use super::dom::Element;
use std::collections::HashSet;

/// Which elements a step considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Direct children of the current element.
    Child,
    /// Every element below the current element, at any depth.
    Descendant,
}

/// One step of a lookup path: an axis, a local name and an optional
/// `[@key='value']` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub axis: Axis,
    pub name: &'static str,
    pub predicate: Option<(&'static str, &'static str)>,
}

impl Step {
    pub const fn child(name: &'static str) -> Self {
        Self {
            axis: Axis::Child,
            name,
            predicate: None,
        }
    }

    pub const fn descendant(name: &'static str) -> Self {
        Self {
            axis: Axis::Descendant,
            name,
            predicate: None,
        }
    }

    /// Restrict the step to elements whose attribute `key` equals `value`.
    pub const fn with_attr(self, key: &'static str, value: &'static str) -> Self {
        Self {
            axis: self.axis,
            name: self.name,
            predicate: Some((key, value)),
        }
    }

    fn matches(&self, el: &Element) -> bool {
        el.name == self.name
            && match self.predicate {
                Some((key, value)) => el.attr(key) == Some(value),
                None => true,
            }
    }
}

/// All elements reached by `path` from `context`, in document order and
/// without duplicates.
pub fn select<'a>(context: &'a Element, path: &[Step]) -> Vec<&'a Element> {
    let mut current = vec![context];
    for step in path {
        let mut seen: HashSet<*const Element> = HashSet::new();
        let mut next = Vec::new();
        for &el in &current {
            let candidates: Box<dyn Iterator<Item = &'a Element> + 'a> = match step.axis {
                Axis::Child => Box::new(el.child_elements()),
                Axis::Descendant => Box::new(el.descendants()),
            };
            for candidate in candidates.filter(|c| step.matches(c)) {
                if seen.insert(candidate as *const Element) {
                    next.push(candidate);
                }
            }
        }
        current = next;
    }
    current
}

/// First element reached by `path`, if any.
pub fn find<'a>(context: &'a Element, path: &[Step]) -> Option<&'a Element> {
    select(context, path).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tei::dom::parse;

    const DOC: &str = r#"<TEI>
        <header>
            <title type="sub">Sub</title>
            <titleStmt><title>Plain</title><title type="main">Main</title></titleStmt>
        </header>
        <body><div><div><head>Nested</head></div></div></body>
    </TEI>"#;

    #[test]
    fn child_step_only_sees_direct_children() {
        let root = parse(DOC).unwrap();
        assert!(find(&root, &[Step::child("title")]).is_none());
        assert!(find(&root, &[Step::child("header"), Step::child("title")]).is_some());
    }

    #[test]
    fn descendant_then_child_with_predicate() {
        let root = parse(DOC).unwrap();
        let path = [
            Step::descendant("titleStmt"),
            Step::child("title").with_attr("type", "main"),
        ];
        assert_eq!(find(&root, &path).unwrap().text_content(), "Main");

        let any = [Step::descendant("titleStmt"), Step::child("title")];
        assert_eq!(find(&root, &any).unwrap().text_content(), "Plain");
    }

    #[test]
    fn nested_descendant_steps_do_not_duplicate() {
        let root = parse(DOC).unwrap();
        let heads = select(&root, &[Step::descendant("div"), Step::descendant("head")]);
        assert_eq!(heads.len(), 1);
    }

    #[test]
    fn predicate_must_match_exactly() {
        let root = parse(DOC).unwrap();
        let path = [Step::descendant("title").with_attr("type", "Main")];
        assert!(select(&root, &path).is_empty());
    }
}
