//! Bracket-notation tokenizer and tree builder.
//!
//! `[S [NP the dog][VP barks]]` → a populated [`ElementArena`]. The scanner
//! is character-synchronized and stateful (escapes change how the very next
//! character tokenizes), so it is hand-rolled rather than grammar-driven;
//! the per-label markup grammar runs over each token afterwards.

use crate::element::{Element, ElementArena};
use crate::errors::Error;
use crate::types::{LayoutContext, TextMeasurer, WHITESPACE_BLOCK};

/// Characters that keep their backslash when escaped, so the markup parser
/// still sees them as literals rather than grammar tokens.
const MARKUP_SPECIALS: &str = "n{}<>^+*_=~|-";

/// Check bracket structure without building anything.
pub fn validate(data: &str) -> Result<(), Error> {
    if data.is_empty() {
        return Err(Error::EmptyInput);
    }
    if has_blank_bracket_body(data) {
        return Err(Error::EmptyBracketBody);
    }

    let mut open = 0usize;
    let mut close = 0usize;
    let mut escape = false;
    for ch in data.trim().chars() {
        if ch == '\\' {
            escape = !escape;
            continue;
        }
        if escape && (ch == '[' || ch == ']') {
            escape = false;
            continue;
        } else if ch == '[' {
            open += 1;
        } else if ch == ']' {
            close += 1;
            // First excess close bracket short-circuits the scan.
            if open < close {
                break;
            }
        }
        escape = false;
    }

    if open == close && open > 0 {
        Ok(())
    } else {
        Err(Error::UnbalancedBrackets)
    }
}

/// A close bracket directly after an open bracket or after whitespace means a
/// bracket body that is empty, or one whose tail label is blank (`[NP ]`).
/// Escaped characters count as label text.
fn has_blank_bracket_body(data: &str) -> bool {
    let mut escape = false;
    let mut blank_before = false;
    for ch in data.chars() {
        if escape {
            escape = false;
            blank_before = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            ']' if blank_before => return true,
            '[' => blank_before = true,
            c if c.is_whitespace() => blank_before = true,
            _ => blank_before = false,
        }
    }
    false
}

/// Normalize raw input before tokenizing: collapse line breaks and
/// whitespace, strip incidental whitespace around brackets, and expand `<N>`
/// padding markers into filler glyphs.
fn preprocess(data: &str) -> String {
    // Runs of newlines -> one newline; backslash-newline -> literal \n marker.
    let mut s = String::with_capacity(data.len());
    let mut chars = data.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\n' | '\r' => {
                while matches!(chars.peek(), Some('\n' | '\r')) {
                    chars.next();
                }
                s.push('\n');
            }
            '\\' if matches!(chars.peek(), Some('\n' | '\r')) => {
                while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                    chars.next();
                }
                s.push_str("\\n");
            }
            _ => s.push(ch),
        }
    }

    // Whitespace runs -> single space.
    let mut collapsed = String::with_capacity(s.len());
    let mut in_ws = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !in_ws {
                collapsed.push(' ');
            }
            in_ws = true;
        } else {
            collapsed.push(ch);
            in_ws = false;
        }
    }

    // Drop spaces adjacent to brackets.
    let chars: Vec<char> = collapsed.chars().collect();
    let mut tight = String::with_capacity(collapsed.len());
    for (i, &ch) in chars.iter().enumerate() {
        if ch == ' ' {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            if matches!(prev, Some('[' | ']')) || matches!(next, Some('[' | ']')) {
                continue;
            }
        }
        tight.push(ch);
    }

    expand_padding_markers(&tight)
}

/// `<N>` -> N filler glyphs (one when N is omitted).
fn expand_padding_markers(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '<' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            if j < chars.len() && chars[j] == '>' {
                let digits: String = chars[i + 1..j].iter().collect();
                let count = digits.parse::<usize>().unwrap_or(0).max(1);
                for _ in 0..count {
                    out.push(WHITESPACE_BLOCK);
                }
                i = j + 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Build the element arena from raw bracket-notation text.
pub fn build(
    data: &str,
    measurer: &dyn TextMeasurer,
    ctx: &LayoutContext,
    font_family: &str,
) -> Result<ElementArena, Error> {
    validate(data)?;
    let mut builder = TreeBuilder {
        data: preprocess(data).chars().collect(),
        pos: 0,
        next_id: 1,
        level: 0,
        arena: ElementArena::new(),
        measurer,
        ctx,
        font_family,
    };
    builder.make_tree(0)?;
    let mut arena = builder.arena;
    arena.set_hierarchy();
    // Everything hangs off one root; a second top-level group would leave
    // layout with siblings that share no parent element.
    if arena.ids().filter(|&id| arena.get(id).parent == 0).count() > 1 {
        return Err(Error::MultipleRoots);
    }
    Ok(arena)
}

struct TreeBuilder<'a> {
    data: Vec<char>,
    pos: usize,
    next_id: usize,
    level: usize,
    arena: ElementArena,
    measurer: &'a dyn TextMeasurer,
    ctx: &'a LayoutContext,
    font_family: &'a str,
}

impl TreeBuilder<'_> {
    /// Scan one token: a bare label run, a `[`-opened group, or the single
    /// close token `]`. Escaped characters are re-escaped where the markup
    /// grammar needs to see them as literals; an escaped space becomes an
    /// in-label line break.
    fn next_token(&mut self) -> String {
        let mut token = String::new();
        let mut i = 0;
        if self.pos + 1 >= self.data.len() {
            return token;
        }

        let mut escape = false;
        let mut got = false;
        while self.pos + i < self.data.len() && !got {
            let ch = self.data[self.pos + i];
            match ch {
                '[' => {
                    if escape {
                        token.push(ch);
                        escape = false;
                    } else if i > 0 {
                        got = true;
                    } else {
                        token.push(ch);
                    }
                }
                ']' => {
                    if escape {
                        token.push(ch);
                        escape = false;
                    } else {
                        if i == 0 {
                            token.push(ch);
                        }
                        got = true;
                    }
                }
                '\\' => {
                    if escape {
                        token.push_str("\\\\");
                        escape = false;
                    } else {
                        escape = true;
                    }
                }
                ' ' => {
                    if escape {
                        token.push_str("\\n");
                        escape = false;
                    } else {
                        token.push(ch);
                    }
                }
                c if MARKUP_SPECIALS.contains(c) => {
                    if escape {
                        token.push('\\');
                        escape = false;
                    }
                    token.push(c);
                }
                c => {
                    escape = false;
                    token.push(c);
                }
            }
            i += 1;
        }

        // Leave the terminator for the next call unless it was consumed as
        // the close token itself.
        self.pos += if i > 1 { i - 1 } else { 1 };
        token
    }

    fn new_element(&mut self, parent: usize, raw: &str, level: usize) -> Result<usize, Error> {
        let element = Element::new(
            self.next_id,
            parent,
            raw,
            level,
            self.measurer,
            self.ctx,
            self.font_family,
        )?;
        let id = element.id;
        self.next_id += 1;
        self.arena.add(element);
        Ok(id)
    }

    /// Depth-first construction. `[head tail]` splits at the first space:
    /// the head becomes the new parent, the tail its first child one level
    /// deeper. A close token or exhausted input ends the current level.
    fn make_tree(&mut self, parent: usize) -> Result<(), Error> {
        let mut token = self.next_token().trim().to_string();

        while !token.is_empty() && token != "]" {
            if let Some(inner) = token.strip_prefix('[') {
                let newparent = if let Some(spaceat) = inner.find(' ') {
                    let head_id = self.new_element(parent, &inner[..spaceat], self.level)?;
                    self.new_element(head_id, &inner[spaceat..], self.level + 1)?;
                    head_id
                } else {
                    self.new_element(parent, inner, self.level)?
                };
                self.level += 1;
                self.make_tree(newparent)?;
            } else if !token.trim().is_empty() {
                self.new_element(parent, &token, self.level)?;
            }
            token = self.next_token();
        }

        self.level = self.level.saturating_sub(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;
    use crate::types::{GlyphMetrics, Options};

    fn build_arena(data: &str) -> Result<ElementArena, Error> {
        let options = Options::default();
        let ctx = LayoutContext::new(&GlyphMetrics, &options);
        build(data, &GlyphMetrics, &ctx, &options.font_family)
    }

    #[test]
    fn validate_accepts_simple_tree() {
        assert!(validate("[NP dog]").is_ok());
    }

    #[test]
    fn validate_rejects_empty_input() {
        assert!(matches!(validate(""), Err(Error::EmptyInput)));
    }

    #[test]
    fn validate_rejects_empty_bracket_body() {
        assert!(matches!(validate("[NP ]"), Err(Error::EmptyBracketBody)));
        assert!(matches!(validate("[ ]"), Err(Error::EmptyBracketBody)));
        assert!(matches!(validate("[]"), Err(Error::EmptyBracketBody)));
        assert!(matches!(
            validate("[S [NP dog][VP ]]"),
            Err(Error::EmptyBracketBody)
        ));
        // An escaped close bracket is label text, not a blank tail.
        assert!(validate("[NP dog\\]]").is_ok());
    }

    #[test]
    fn validate_rejects_unbalanced_brackets() {
        assert!(matches!(validate("[NP dog"), Err(Error::UnbalancedBrackets)));
        assert!(matches!(
            validate("NP dog]"),
            Err(Error::UnbalancedBrackets)
        ));
        assert!(matches!(validate("no brackets"), Err(Error::UnbalancedBrackets)));
    }

    #[test]
    fn build_rejects_second_top_level_group() {
        assert!(matches!(build_arena("[A][B]"), Err(Error::MultipleRoots)));
        assert!(matches!(
            build_arena("[A [B x]][C]"),
            Err(Error::MultipleRoots)
        ));
        assert!(build_arena("[A [B x][C y]]").is_ok());
    }

    #[test]
    fn validate_honors_escaped_brackets() {
        assert!(validate("[NP \\[dog\\]]").is_ok());
    }

    #[test]
    fn preprocess_collapses_whitespace() {
        assert_eq!(preprocess("[S  [NP \n\n dog]]"), "[S[NP dog]]");
    }

    #[test]
    fn preprocess_expands_padding_markers() {
        assert_eq!(preprocess("a<3>b"), format!("a{0}{0}{0}b", WHITESPACE_BLOCK));
        assert_eq!(preprocess("a<>b"), format!("a{WHITESPACE_BLOCK}b"));
    }

    #[test]
    fn builds_five_element_tree() {
        let arena = build_arena("[S [NP the dog][VP barks]]").unwrap();
        assert_eq!(arena.len(), 5);

        let root = arena.get(1);
        assert_eq!(root.parent, 0);
        assert_eq!(root.kind, ElementKind::Node);
        assert_eq!(root.children, vec![2, 4]);

        // Head/tail split nests the phrase one level deeper.
        assert_eq!(arena.get(2).children, vec![3]);
        assert_eq!(arena.get(3).parent, 2);
        assert!(arena.get(3).contains_phrase);
        assert_eq!(arena.get(4).children, vec![5]);
    }

    #[test]
    fn every_parent_resolves_and_levels_increment() {
        let arena = build_arena("[S [NP [Det the][N dog]][VP [V barks]]]").unwrap();
        let roots: Vec<_> = arena.iter().filter(|e| e.parent == 0).collect();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, 1);
        for e in arena.iter() {
            if e.parent != 0 {
                assert_eq!(e.level, arena.get(e.parent).level + 1);
            }
        }
    }

    #[test]
    fn children_match_parent_fields() {
        let arena = build_arena("[S [A x][B y][C z]]").unwrap();
        for e in arena.iter() {
            for &c in &e.children {
                assert_eq!(arena.get(c).parent, e.id);
            }
            let derived: Vec<usize> = arena
                .iter()
                .filter(|o| o.parent == e.id)
                .map(|o| o.id)
                .collect();
            assert_eq!(e.children, derived);
        }
    }

    #[test]
    fn escaped_brackets_become_literal_text() {
        let arena = build_arena("[S [NP \\[x\\]]]").unwrap();
        let leaf = arena.get(3);
        match &leaf.label.lines[0] {
            crate::markup::ContentLine::Text(runs) => assert_eq!(runs[0].text, "[x]"),
            other => panic!("unexpected line {other:?}"),
        }
    }

    #[test]
    fn escaped_space_breaks_line_inside_label() {
        let arena = build_arena("[S [NP two\\ lines]]").unwrap();
        let leaf = arena.get(3);
        assert_eq!(leaf.label.lines.len(), 2);
    }

    #[test]
    fn markup_error_propagates_from_label() {
        let result = build_arena("[S [NP **oops]]");
        assert!(matches!(result, Err(Error::MarkupSyntax { .. })));
    }
}
