//! Tree geometry: level assignment, width allocation, balancing,
//! horizontal placement, parent centering, normalization, and vertical
//! placement. Every pass mutates the arena in place; coordinates come out
//! in an unmargined space with the leftmost extent sitting one gap inside
//! the origin.

use crate::element::{ElementArena, ElementKind};
use crate::log::debug;
use crate::types::{LayoutContext, LeafStyle, Options};

pub struct LayoutEngine<'a> {
    arena: &'a mut ElementArena,
    ctx: &'a LayoutContext,
    symmetrize: bool,
    leaf_style: LeafStyle,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(arena: &'a mut ElementArena, ctx: &'a LayoutContext, options: &Options) -> Self {
        Self {
            arena,
            ctx,
            symmetrize: options.symmetrize,
            leaf_style: options.leaf_style,
        }
    }

    /// Run all passes. A single-element tree skips straight to
    /// normalization and the height pass.
    pub fn run(&mut self) {
        if self.arena.len() > 1 {
            self.calculate_level();
            self.calculate_width(1);
            if self.symmetrize {
                self.make_balance(1);
            }
            self.calculate_indent();
            self.node_centering();
        }

        // Pin the root to x = 0, then shift the whole tree so the leftmost
        // extent lands one gap inside the left edge.
        let diff = self.arena.get(1).horizontal_indent;
        for id in self.arena.ids() {
            self.arena.get_mut(id).horizontal_indent -= diff;
        }
        let offset =
            (self.arena.get(1).horizontal_indent - leftmost(self.arena, 1)) + self.ctx.h_gap_between_nodes;
        for id in self.arena.ids() {
            self.arena.get_mut(id).horizontal_indent += offset;
        }

        self.calculate_height(1);
        debug!(
            width = self.arena.get(1).width,
            height = self.arena.get(1).height,
            "layout complete"
        );
    }

    /// Leaves sit one level below their parent regardless of bracket depth.
    fn calculate_level(&mut self) {
        for id in self.arena.ids() {
            let e = self.arena.get(id);
            if e.kind == ElementKind::Leaf && e.parent != 0 {
                let level = self.arena.get(e.parent).level + 1;
                self.arena.get_mut(id).level = level;
            }
        }
    }

    /// Post-order width allocation, memoized through the `width` field.
    fn calculate_width(&mut self, id: usize) -> f64 {
        let children = self.arena.get(id).children.clone();
        let gap = self.ctx.h_gap_between_nodes;

        if children.is_empty() {
            let content_width = self.arena.get(id).content_width;
            let mut width = content_width + gap * 4.0;

            // A childless element under a chain of single-child ancestors
            // widens to the widest such ancestor so the chain stays aligned.
            let mut parent = self.arena.get(id).parent;
            while parent != 0 && self.arena.get(parent).children.len() == 1 {
                let ancestor_width = self.arena.get(parent).content_width;
                if ancestor_width > content_width {
                    width = ancestor_width + gap * 4.0;
                }
                parent = self.arena.get(parent).parent;
            }

            self.arena.get_mut(id).width = width;
            return width;
        }

        if self.arena.get(id).width != 0.0 {
            return self.arena.get(id).width;
        }

        let widths: Vec<f64> = children.iter().map(|&c| self.calculate_width(c)).collect();
        let accum = if self.symmetrize {
            widths.iter().copied().fold(0.0, f64::max) * widths.len() as f64
        } else {
            widths.iter().sum()
        };
        let width = accum.max(self.arena.get(id).content_width);
        self.arena.get_mut(id).width = width;
        width
    }

    /// Broadcast the widest sibling width across each sibling group so
    /// symmetric trees get equal partitions.
    fn make_balance(&mut self, id: usize) -> f64 {
        let children = self.arena.get(id).children.clone();

        if children.is_empty() {
            let parent = self.arena.get(id).parent;
            let siblings = self.arena.get(parent).children.clone();
            let max = siblings
                .iter()
                .map(|&s| self.arena.get(s).width)
                .fold(0.0, f64::max);
            for &s in &siblings {
                self.arena.get_mut(s).width = max;
            }
            return max;
        }

        let accum = children
            .iter()
            .map(|&c| self.make_balance(c))
            .fold(0.0, f64::max);
        let max = accum.max(self.arena.get(id).content_width);
        for &c in &children {
            self.arena.get_mut(c).width = max;
        }
        self.arena.get(id).width
    }

    /// Place each sibling group inside its parent's span. Symmetric mode
    /// slices the span into equal partitions; asymmetric mode packs the
    /// children by their own widths.
    fn calculate_indent(&mut self) {
        for parent_id in self.arena.ids() {
            let group = self.arena.get(parent_id).children.clone();
            if group.is_empty() {
                continue;
            }
            let parent = self.arena.get(parent_id);
            let mut left_offset =
                parent.horizontal_indent + parent.content_width / 2.0 - parent.width / 2.0;
            let partition = parent.width / group.len() as f64;

            for &child_id in &group {
                let child = self.arena.get(child_id);
                let indent = if self.symmetrize {
                    left_offset + (partition - child.content_width) / 2.0
                } else {
                    left_offset + (child.width - child.content_width) / 2.0
                };
                let advance = if self.symmetrize { partition } else { child.width };
                self.arena.get_mut(child_id).horizontal_indent = indent;
                left_offset += advance;
            }
        }
    }

    /// Re-center every parent over the midpoint of its children's content
    /// centers, deepest parents first so moves propagate toward the root.
    fn node_centering(&mut self) {
        let mut parents: Vec<usize> = self
            .arena
            .ids()
            .filter(|&id| !self.arena.get(id).children.is_empty())
            .collect();
        parents.sort_unstable_by(|a, b| b.cmp(a));

        for parent_id in parents {
            let children = self.arena.get(parent_id).children.clone();
            let centers: Vec<f64> = children
                .iter()
                .map(|&c| {
                    let e = self.arena.get(c);
                    e.horizontal_indent + e.content_width / 2.0
                })
                .collect();
            let min = centers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = centers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let parent = self.arena.get_mut(parent_id);
            parent.horizontal_indent = min + (max - min - parent.content_width) / 2.0;
        }
    }

    /// Assign vertical positions top-down and element heights bottom-up.
    /// Returns the lowest extent of the subtree.
    fn calculate_height(&mut self, id: usize) -> f64 {
        let vertical = if id == 1 {
            0.0
        } else {
            let parent = self.arena.get(self.arena.get(id).parent);
            let connector = if self.connector_suppressed(id) {
                0.0
            } else {
                self.ctx.height_connector
            };
            parent.vertical_indent + parent.content_height + connector
        };
        self.arena.get_mut(id).vertical_indent = vertical;

        let children = self.arena.get(id).children.clone();
        if children.is_empty() {
            let content_height = self.arena.get(id).content_height;
            self.arena.get_mut(id).height = content_height;
            return vertical + content_height;
        }

        let lowest = children
            .iter()
            .map(|&c| self.calculate_height(c))
            .fold(0.0, f64::max);
        self.arena.get_mut(id).height = lowest - vertical;
        lowest
    }

    /// With the bare leaf style, a lone non-triangle leaf hangs directly
    /// under its parent with no connector gap.
    fn connector_suppressed(&self, id: usize) -> bool {
        let e = self.arena.get(id);
        self.leaf_style == LeafStyle::None
            && e.kind == ElementKind::Leaf
            && !e.label.triangle
            && self.arena.get(e.parent).children.len() == 1
    }

}

/// Largest horizontal extent (right edge of content) of the subtree.
pub fn rightmost(arena: &ElementArena, id: usize) -> f64 {
    let e = arena.get(id);
    e.children
        .iter()
        .map(|&c| rightmost(arena, c))
        .fold(e.horizontal_indent + e.content_width, f64::max)
}

/// Smallest horizontal extent of the subtree rooted at `id`.
pub fn leftmost(arena: &ElementArena, id: usize) -> f64 {
    let e = arena.get(id);
    e.children
        .iter()
        .map(|&c| leftmost(arena, c))
        .fold(e.horizontal_indent, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use crate::types::{GlyphMetrics, LayoutContext, Options};

    fn layout(data: &str, options: &Options) -> (ElementArena, LayoutContext) {
        let ctx = LayoutContext::new(&GlyphMetrics, options);
        let mut arena = parse::build(data, &GlyphMetrics, &ctx, &options.font_family).unwrap();
        LayoutEngine::new(&mut arena, &ctx, options).run();
        (arena, ctx)
    }

    #[test]
    fn leaves_sit_below_their_parents() {
        let (arena, ctx) = layout("[S [NP the dog][VP barks]]", &Options::default());
        for e in arena.iter() {
            if e.parent != 0 {
                let parent = arena.get(e.parent);
                assert!(
                    e.vertical_indent >= parent.vertical_indent + parent.content_height,
                    "child {} overlaps parent {}",
                    e.id,
                    e.parent
                );
            }
        }
        assert!(ctx.height_connector > 0.0);
    }

    #[test]
    fn siblings_do_not_overlap() {
        let (arena, _) = layout("[S [A aaa][B bbbbbb][C c]]", &Options::default());
        let root = arena.get(1);
        for pair in root.children.windows(2) {
            let left = arena.get(pair[0]);
            let right = arena.get(pair[1]);
            assert!(
                left.horizontal_indent + left.content_width <= right.horizontal_indent,
                "{} overlaps {}",
                left.id,
                right.id
            );
        }
    }

    #[test]
    fn symmetrize_gives_equal_partitions() {
        let (arena, _) = layout("[S [A x][B y]]", &Options::default());
        let a = arena.get(arena.get(1).children[0]);
        let b = arena.get(arena.get(1).children[1]);
        assert_eq!(a.width, b.width);
    }

    #[test]
    fn asymmetric_widths_stay_proportional() {
        let options = Options {
            symmetrize: false,
            ..Options::default()
        };
        let (arena, _) = layout("[S [A x][B yyyyyyyyyy]]", &options);
        let a = arena.get(arena.get(1).children[0]);
        let b = arena.get(arena.get(1).children[1]);
        assert!(b.width > a.width);
    }

    #[test]
    fn root_centered_over_children() {
        let (arena, _) = layout("[S [NP x][VP y]]", &Options::default());
        let root = arena.get(1);
        let left = arena.get(root.children[0]);
        let right = arena.get(root.children[1]);
        let left_center = left.horizontal_indent + left.content_width / 2.0;
        let right_center = right.horizontal_indent + right.content_width / 2.0;
        let root_center = root.horizontal_indent + root.content_width / 2.0;
        let mid = (left_center + right_center) / 2.0;
        assert!((root_center - mid).abs() < 1e-9);
    }

    #[test]
    fn leftmost_extent_sits_one_gap_in() {
        let (arena, ctx) = layout("[S [NP the dog][VP barks]]", &Options::default());
        let left = leftmost(&arena, 1);
        assert!((left - ctx.h_gap_between_nodes).abs() < 1e-9);
    }

    #[test]
    fn single_element_tree_lays_out() {
        let (arena, ctx) = layout("[solo]", &Options::default());
        let root = arena.get(1);
        assert_eq!(root.vertical_indent, 0.0);
        assert_eq!(root.height, root.content_height);
        assert!((root.horizontal_indent - ctx.h_gap_between_nodes).abs() < 1e-9);
    }

    #[test]
    fn bare_leaf_style_removes_connector_gap_for_lone_leaf() {
        let default = layout("[NP [N dog]]", &Options::default()).0;
        let options = Options {
            leaf_style: LeafStyle::None,
            ..Options::default()
        };
        let bare = layout("[NP [N dog]]", &options).0;
        let leaf_default = default.iter().find(|e| e.children.is_empty()).unwrap().id;
        assert!(
            bare.get(leaf_default).vertical_indent < default.get(leaf_default).vertical_indent
        );
    }

    #[test]
    fn root_height_covers_deepest_leaf() {
        let (arena, _) = layout("[S [NP [Det the][N dog]][VP barks]]", &Options::default());
        let root = arena.get(1);
        let deepest = arena
            .iter()
            .map(|e| e.vertical_indent + e.content_height)
            .fold(0.0, f64::max);
        assert!((root.height - deepest).abs() < 1e-9);
    }
}
