//! Tree elements and the arena that owns them.
//!
//! Elements reference each other purely through integer ids; the arena is
//! the sole owner and `set_hierarchy` derives every `children` list from the
//! `parent` fields once the whole tree is built. Content measurement happens
//! at construction so layout only ever reads `content_width` /
//! `content_height`.

use crate::errors::Error;
use crate::markup::{self, ContentLine, Decoration, ParsedLabel};
use crate::types::{
    FontStyle, FontWeight, LayoutContext, SUBSCRIPT_RATIO, TextMeasurer, WHITESPACE_BLOCK,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Node,
    Leaf,
}

/// One node or leaf of the tree, with its parsed label and geometry.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: usize,
    /// Parent id; 0 marks the root.
    pub parent: usize,
    /// Child ids in source order. Populated by [`ElementArena::set_hierarchy`].
    pub children: Vec<usize>,
    /// Leaf until a child is attached.
    pub kind: ElementKind,
    /// Depth in the tree, root = 0.
    pub level: usize,
    pub label: ParsedLabel,
    /// Any run contained a literal space before filler substitution.
    pub contains_phrase: bool,
    pub content_width: f64,
    pub content_height: f64,
    /// Reserved horizontal footprint of the whole subtree.
    pub width: f64,
    /// Vertical extent of the subtree below this element's top edge.
    pub height: f64,
    pub horizontal_indent: f64,
    pub vertical_indent: f64,
}

impl Element {
    pub fn new(
        id: usize,
        parent: usize,
        raw: &str,
        level: usize,
        measurer: &dyn TextMeasurer,
        ctx: &LayoutContext,
        font_family: &str,
    ) -> Result<Element, Error> {
        let raw = raw.trim();
        let label = markup::parse(raw)?;
        let mut element = Element {
            id,
            parent,
            children: Vec::new(),
            kind: ElementKind::Leaf,
            level,
            label,
            contains_phrase: false,
            content_width: 0.0,
            content_height: 0.0,
            width: 0.0,
            height: 0.0,
            horizontal_indent: 0.0,
            vertical_indent: 0.0,
        };
        element.measure(measurer, ctx, font_family);
        Ok(element)
    }

    /// Compute run geometry and the element's intrinsic content size.
    fn measure(&mut self, measurer: &dyn TextMeasurer, ctx: &LayoutContext, family: &str) {
        let mut total_width: f64 = 0.0;
        let mut total_height: f64 = 0.0;
        let mut first_row_margin_pending = true;

        for line in &mut self.label.lines {
            match line {
                ContentLine::Border | ContentLine::BoldBorder | ContentLine::Blank => {
                    total_height += ctx.single_line_height / 2.0;
                }
                ContentLine::Text(runs) => {
                    let mut row_width: f64 = 0.0;
                    let mut row_height: f64 = 0.0;
                    for run in runs.iter_mut() {
                        if run.text.contains(' ') {
                            self.contains_phrase = true;
                            run.text = run.text.replace(' ', &WHITESPACE_BLOCK.to_string());
                        }

                        let d = run.decorations;
                        let mut fontsize = ctx.fontsize;
                        if d.contains(Decoration::Small) {
                            fontsize *= SUBSCRIPT_RATIO;
                        }
                        if d.contains(Decoration::Subscript) || d.contains(Decoration::Superscript)
                        {
                            fontsize *= SUBSCRIPT_RATIO;
                        }
                        let style = if d.contains(Decoration::Italic)
                            || d.contains(Decoration::BoldItalic)
                        {
                            FontStyle::Italic
                        } else {
                            FontStyle::Normal
                        };
                        let weight = if d.contains(Decoration::Bold)
                            || d.contains(Decoration::BoldItalic)
                        {
                            FontWeight::Bold
                        } else {
                            FontWeight::Normal
                        };

                        let standard = measurer.measure(
                            "X",
                            family,
                            fontsize,
                            FontStyle::Normal,
                            FontWeight::Normal,
                        );
                        let height = standard.height;
                        let glyph_count = run.text.chars().count();

                        let mut width =
                            if !run.text.is_empty() && run.text.chars().all(|c| matches!(c, '<' | '>')) {
                                standard.width * glyph_count as f64 / 2.0
                            } else {
                                measurer.measure(&run.text, family, fontsize, style, weight).width
                            };

                        if d.has_shape() {
                            run.content_width = width;
                            width += if glyph_count == 1 {
                                height - width
                            } else {
                                ctx.width_half_x
                            };
                        }

                        if d.contains(Decoration::Whitespace) {
                            width = ctx.width_half_x / 2.0 * glyph_count as f64 / 4.0;
                            run.text.clear();
                        }

                        run.width = width;
                        run.height = height;
                        row_width += width;

                        let effective = if first_row_margin_pending {
                            first_row_margin_pending = false;
                            height + ctx.box_vertical_margin
                        } else {
                            height
                        };
                        row_height = row_height.max(effective);
                    }
                    total_height += row_height;
                    total_width = total_width.max(row_width);
                }
            }
        }

        self.content_width = total_width;
        self.content_height = total_height;
    }
}

/// Arena of elements addressed by 1-based integer id.
#[derive(Debug, Default)]
pub struct ElementArena {
    elements: Vec<Element>,
}

impl ElementArena {
    pub fn new() -> ElementArena {
        ElementArena::default()
    }

    /// Add an element; its parent (if any) is promoted to a node.
    pub fn add(&mut self, element: Element) {
        let parent = element.parent;
        self.elements.push(element);
        if parent != 0 {
            self.get_mut(parent).kind = ElementKind::Node;
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn ids(&self) -> std::ops::RangeInclusive<usize> {
        1..=self.elements.len()
    }

    pub fn get(&self, id: usize) -> &Element {
        &self.elements[id - 1]
    }

    pub fn get_mut(&mut self, id: usize) -> &mut Element {
        &mut self.elements[id - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    /// Derive every `children` list from the `parent` fields. Called once
    /// after the whole tree has been built; the parent/children bijection
    /// holds for every later pass.
    pub fn set_hierarchy(&mut self) {
        let links: Vec<(usize, usize)> = self
            .elements
            .iter()
            .filter(|e| e.parent != 0)
            .map(|e| (e.parent, e.id))
            .collect();
        for (parent, child) in links {
            self.get_mut(parent).children.push(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GlyphMetrics, Options};

    fn ctx() -> LayoutContext {
        LayoutContext::new(&GlyphMetrics, &Options::default())
    }

    fn element(raw: &str) -> Element {
        Element::new(1, 0, raw, 0, &GlyphMetrics, &ctx(), "sans").unwrap()
    }

    #[test]
    fn measures_simple_label() {
        let e = element("NP");
        assert!(e.content_width > 0.0);
        assert!(e.content_height > 0.0);
        assert!(!e.contains_phrase);
    }

    #[test]
    fn phrase_detection_and_filler_substitution() {
        let e = element("the dog");
        assert!(e.contains_phrase);
        match &e.label.lines[0] {
            ContentLine::Text(runs) => {
                assert!(!runs[0].text.contains(' '));
                assert!(runs[0].text.contains(WHITESPACE_BLOCK));
            }
            other => panic!("unexpected line {other:?}"),
        }
    }

    #[test]
    fn subscript_is_narrower() {
        let plain = element("XX");
        let sub = element("_XX_");
        assert!(sub.content_width < plain.content_width);
    }

    #[test]
    fn multi_line_label_is_taller() {
        let one = element("a");
        let two = element("a\\nb");
        assert!(two.content_height > one.content_height);
    }

    #[test]
    fn boxed_run_reserves_padding() {
        let e = element("|NP|");
        match &e.label.lines[0] {
            ContentLine::Text(runs) => {
                assert!(runs[0].width > runs[0].content_width);
            }
            other => panic!("unexpected line {other:?}"),
        }
    }

    #[test]
    fn whitespace_run_is_cleared() {
        let raw = format!("a{WHITESPACE_BLOCK}b");
        let e = element(&raw);
        match &e.label.lines[0] {
            ContentLine::Text(runs) => {
                assert_eq!(runs.len(), 1);
                // single run: filler glyph is mid-text, not a whole run
                assert!(runs[0].text.contains(WHITESPACE_BLOCK));
            }
            other => panic!("unexpected line {other:?}"),
        }
    }

    #[test]
    fn hierarchy_derivation_promotes_parents() {
        let mut arena = ElementArena::new();
        arena.add(Element::new(1, 0, "S", 0, &GlyphMetrics, &ctx(), "f").unwrap());
        arena.add(Element::new(2, 1, "NP", 1, &GlyphMetrics, &ctx(), "f").unwrap());
        arena.add(Element::new(3, 1, "VP", 1, &GlyphMetrics, &ctx(), "f").unwrap());
        arena.set_hierarchy();
        assert_eq!(arena.get(1).children, vec![2, 3]);
        assert_eq!(arena.get(1).kind, ElementKind::Node);
        assert_eq!(arena.get(2).kind, ElementKind::Leaf);
    }
}
