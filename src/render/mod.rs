//! Drawing pass: turns a laid-out arena into SVG primitives, routes
//! movement paths, then assembles the final document.

pub(crate) mod svg;

use glam::{DVec2, dvec2};
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::element::{ElementArena, ElementKind};
use crate::errors::Error;
use crate::layout::{leftmost, rightmost};
use crate::log::{debug, warn};
use crate::markup::{ContentLine, ContentRun, Decoration, Enclosure};
use crate::types::{
    BOLD_LINE_SCALING, ColorTheme, FONT_SCALING, LINE_SCALING, LayoutContext, LeafStyle, Options,
    Palette, SUBSCRIPT_RATIO,
};
use svg::{Elbow, Line, MidMarker, Polygon, Polyline, Primitive, Rect, TextBlock, Tspan};

const MATH_FONT_FAMILY: &str = "'Noto Sans Math', 'Noto Sans', sans-serif";

#[derive(Clone, Copy, PartialEq, Eq)]
enum PathArrow {
    None,
    Single,
    Double,
}

/// One endpoint of a direct (line-style) connector, with the edge
/// coordinates needed to pick an attachment side.
#[derive(Clone, Copy)]
struct LineEnd {
    left: f64,
    center_x: f64,
    right: f64,
    top: f64,
    center_y: f64,
    bottom: f64,
    arrow: Option<char>,
}

pub(crate) struct Renderer<'a> {
    arena: &'a mut ElementArena,
    ctx: &'a LayoutContext,
    options: &'a Options,
    palette: Palette,
    tree: Vec<Primitive>,
    extra: Vec<Primitive>,
    /// Running lower extent of everything drawn so far; paths route below it.
    height: f64,
    /// Fan-out counters per vertical drop position, keyed by exact bits so
    /// equal coordinates share a counter.
    visited_x: HashMap<u64, usize>,
}

impl<'a> Renderer<'a> {
    pub fn new(arena: &'a mut ElementArena, ctx: &'a LayoutContext, options: &'a Options) -> Self {
        Renderer {
            arena,
            ctx,
            options,
            palette: Palette::new(options.color, options.hide_default_connectors),
            tree: Vec::new(),
            extra: Vec::new(),
            height: 0.0,
            visited_x: HashMap::new(),
        }
    }

    pub fn render(mut self) -> Result<String, Error> {
        for id in self.arena.ids() {
            self.draw_element(id);
        }
        self.draw_connector(1);
        self.draw_paths()?;

        let gap = self.ctx.h_gap_between_nodes;
        let hct = self.ctx.height_connector_to_text;
        let width = rightmost(self.arena, 1) - leftmost(self.arena, 1) + gap * 2.0;
        let tree_height = self.arena.get(1).height;
        if tree_height > self.height {
            self.height = tree_height;
        }
        let height = self.height + hct;

        debug!(
            primitives = self.tree.len() + self.extra.len(),
            width, height, "drawing complete"
        );
        Ok(svg::document(
            width,
            height,
            gap,
            self.options,
            &self.palette,
            &self.tree,
            &self.extra,
        ))
    }

    /// Emit one element: its text block plus any borders, run shapes and
    /// block enclosure. The element's `content_height` is replaced by the
    /// drawn block height so connectors and paths attach below the real
    /// extent of multi-line content.
    fn draw_element(&mut self, id: usize) {
        let ctx = *self.ctx;
        let (top, left, content_width, kind, lines, enclosure) = {
            let e = self.arena.get(id);
            (
                e.vertical_indent,
                e.horizontal_indent,
                e.content_width,
                e.kind,
                e.label.lines.clone(),
                e.label.enclosure,
            )
        };
        let txt_pos = left + content_width / 2.0;
        let col = if kind == ElementKind::Leaf {
            self.palette.leaf
        } else {
            self.palette.node
        };

        let text_x = left;
        let mut text_y = top + ctx.single_line_height - ctx.height_connector_to_text;
        let first_line_y = text_y;
        let mut spans: Vec<Tspan> = Vec::new();

        let bc_x = text_x - ctx.h_gap_between_nodes / 2.0;
        let bc_width = content_width + ctx.h_gap_between_nodes;

        for (idx, line) in lines.iter().enumerate() {
            match line {
                ContentLine::Border | ContentLine::BoldBorder => {
                    let advance = ctx.single_line_height / 2.0;
                    if idx == 0 {
                        text_y -= advance;
                    } else {
                        text_y += advance;
                    }
                    let y = text_y - ctx.single_line_height / 8.0;
                    let width = ctx.linewidth
                        + if matches!(line, ContentLine::BoldBorder) {
                            BOLD_LINE_SCALING
                        } else {
                            LINE_SCALING
                        };
                    self.extra.push(Primitive::Line(Line {
                        from: dvec2(text_x, y),
                        to: dvec2(text_x + content_width, y),
                        stroke: col.to_string(),
                        width,
                        dashed: false,
                        arrow_end: false,
                    }));
                }
                ContentLine::Blank => {
                    let advance = ctx.single_line_height / 2.0;
                    if idx == 0 {
                        text_y -= advance;
                    } else {
                        text_y += advance;
                    }
                }
                ContentLine::Text(runs) => {
                    // Bracketed blocks left-align; everything else centers
                    // on the run widths of this particular line.
                    let mut this_x = if enclosure == Enclosure::Brackets {
                        txt_pos - content_width / 2.0
                    } else {
                        let ewidth: f64 = runs.iter().map(|r| r.width).sum();
                        txt_pos - ewidth / 2.0
                    };
                    if idx != 0 {
                        text_y += runs.iter().map(|r| r.height).fold(0.0, f64::max);
                    }
                    for run in runs {
                        this_x = self.draw_run(run, this_x, text_y, kind, col, &mut spans);
                    }
                }
            }
            if text_y > self.height {
                self.height = text_y;
            }
        }

        let bc_y = top + ctx.height_connector_to_text * 3.0 / 4.0;
        let bc_height = text_y - bc_y + ctx.height_connector_to_text;
        match enclosure {
            Enclosure::Brackets => self.draw_bracket(bc_x, bc_y, bc_width, bc_height, col),
            Enclosure::Rectangle => self.draw_rectangle(bc_x, bc_y, bc_width, bc_height, col, false),
            Enclosure::BoldRectangle => {
                self.draw_rectangle(bc_x, bc_y, bc_width, bc_height, col, true)
            }
            Enclosure::None => {}
        }

        self.arena.get_mut(id).content_height = bc_height;
        self.tree.push(Primitive::Text(TextBlock {
            x: text_x,
            y: first_line_y,
            fill: col.to_string(),
            font_size: ctx.fontsize,
            spans,
        }));
    }

    /// Emit one run at `this_x`, returning the advanced x position.
    fn draw_run(
        &mut self,
        run: &ContentRun,
        mut this_x: f64,
        text_y: f64,
        kind: ElementKind,
        col: &str,
        spans: &mut Vec<Tspan>,
    ) -> f64 {
        let ctx = self.ctx;
        let d = run.decorations;

        let mut style = String::new();
        let this_y = if d.contains(Decoration::Small) {
            let _ = write!(style, "font-size: {}%; ", (SUBSCRIPT_RATIO * 100.0) as u32);
            text_y - (ctx.single_x_height - ctx.single_x_height * SUBSCRIPT_RATIO) / 4.0 + 2.0
        } else if d.contains(Decoration::Superscript) {
            let _ = write!(style, "font-size: {}%; ", (SUBSCRIPT_RATIO * 100.0) as u32);
            text_y - ctx.single_x_height / 4.0 + 1.0
        } else if d.contains(Decoration::Subscript) {
            let _ = write!(style, "font-size: {}%; ", (SUBSCRIPT_RATIO * 100.0) as u32);
            text_y + 4.0
        } else {
            text_y
        };

        if d.contains(Decoration::Bold) || d.contains(Decoration::BoldItalic) {
            let _ = write!(style, "font-weight: bold; fill: {}; ", self.palette.emph);
        }
        if d.contains(Decoration::Italic) || d.contains(Decoration::BoldItalic) {
            style.push_str("font-style: italic; ");
        }

        let mut decorations: Vec<&str> = Vec::new();
        if d.contains(Decoration::Overline) {
            decorations.push("overline");
        }
        if d.contains(Decoration::Underline) {
            decorations.push("underline");
        }
        if d.contains(Decoration::LineThrough) {
            decorations.push("line-through");
        }
        let decoration = decorations.join(" ");

        let font_family = if d.contains(Decoration::Math) {
            MATH_FONT_FAMILY.to_string()
        } else {
            self.options.font_family.clone()
        };

        if d.has_shape() {
            let enc_height = run.height;
            let enc_y = this_y - run.height * 0.8 + FONT_SCALING;
            let enc_width = run.width;
            let enc_x = this_x;

            let fill = if d.contains(Decoration::Hatched) {
                if self.options.color == ColorTheme::Off {
                    "url(#hatchBlack)"
                } else if kind == ElementKind::Leaf {
                    "url(#hatchForLeaf)"
                } else {
                    "url(#hatchForNode)"
                }
            } else {
                "none"
            };
            let stroke_width = ctx.linewidth
                + if d.contains(Decoration::BoldStroke) {
                    BOLD_LINE_SCALING
                } else {
                    LINE_SCALING
                };

            if d.contains(Decoration::Box) {
                self.extra.push(Primitive::Rect(Rect {
                    origin: dvec2(enc_x, enc_y),
                    size: dvec2(enc_width, enc_height),
                    radius: None,
                    stroke: col.to_string(),
                    width: stroke_width,
                    fill: fill.to_string(),
                }));
            } else if d.contains(Decoration::Circle) {
                self.extra.push(Primitive::Rect(Rect {
                    origin: dvec2(enc_x, enc_y),
                    size: dvec2(enc_width, enc_height),
                    radius: Some(enc_height / 2.0),
                    stroke: col.to_string(),
                    width: stroke_width,
                    fill: fill.to_string(),
                }));
            } else if d.contains(Decoration::Bar) {
                let y = enc_y + enc_height / 2.0;
                let x2 = enc_x + enc_width;
                let ar_hwidth = run.width / 4.0;
                self.extra.push(Primitive::Line(Line {
                    from: dvec2(enc_x, y),
                    to: dvec2(x2 - stroke_width / 2.0, y),
                    stroke: col.to_string(),
                    width: stroke_width,
                    dashed: false,
                    arrow_end: false,
                }));
                if d.contains(Decoration::ArrowLeft) {
                    self.extra.push(Primitive::Polyline(Polyline {
                        points: vec![
                            dvec2(enc_x + ar_hwidth, y + ar_hwidth / 2.0),
                            dvec2(enc_x + stroke_width / 2.0, y),
                            dvec2(enc_x + ar_hwidth, y - ar_hwidth / 2.0),
                        ],
                        stroke: col.to_string(),
                        width: stroke_width,
                    }));
                }
                if d.contains(Decoration::ArrowRight) {
                    self.extra.push(Primitive::Polyline(Polyline {
                        points: vec![
                            dvec2(x2 - ar_hwidth, y - ar_hwidth / 2.0),
                            dvec2(x2 - stroke_width / 2.0, y),
                            dvec2(x2 - ar_hwidth, y + ar_hwidth / 2.0),
                        ],
                        stroke: col.to_string(),
                        width: stroke_width,
                    }));
                }
            }

            // Single glyphs center inside the shape; longer text gets a
            // fixed half-glyph inset on both sides.
            let inset = if run.text.chars().count() == 1 {
                (run.height - run.content_width) / 2.0
            } else {
                ctx.width_half_x / 2.0
            };
            this_x += inset;
            spans.push(Tspan {
                x: this_x,
                y: this_y,
                style,
                decoration,
                font_family,
                text: run.text.clone(),
            });
            this_x += run.content_width + inset;
        } else if d.contains(Decoration::Whitespace) {
            this_x += run.width;
        } else {
            spans.push(Tspan {
                x: this_x,
                y: this_y,
                style,
                decoration,
                font_family,
                text: run.text.clone(),
            });
            this_x += run.width;
        }
        this_x
    }

    fn draw_rectangle(&mut self, x: f64, y: f64, width: f64, height: f64, col: &str, bold: bool) {
        let swidth = self.ctx.linewidth + if bold { BOLD_LINE_SCALING } else { LINE_SCALING };
        self.extra.push(Primitive::Polygon(Polygon {
            points: vec![
                dvec2(x, y),
                dvec2(x + width, y),
                dvec2(x + width, y + height),
                dvec2(x, y + height),
            ],
            stroke: col.to_string(),
            width: swidth,
        }));
    }

    /// Square brackets drawn as two facing polylines with short serifs.
    fn draw_bracket(&mut self, x: f64, y: f64, width: f64, height: f64, col: &str) {
        let swidth = self.ctx.linewidth + LINE_SCALING;
        let serif = self.ctx.h_gap_between_nodes / 2.0;
        self.extra.push(Primitive::Polyline(Polyline {
            points: vec![
                dvec2(x + serif, y),
                dvec2(x, y),
                dvec2(x, y + height),
                dvec2(x + serif, y + height),
            ],
            stroke: col.to_string(),
            width: swidth,
        }));
        self.extra.push(Primitive::Polyline(Polyline {
            points: vec![
                dvec2(x + width - serif, y),
                dvec2(x + width, y),
                dvec2(x + width, y + height),
                dvec2(x + width - serif, y + height),
            ],
            stroke: col.to_string(),
            width: swidth,
        }));
    }

    /// Pick a connector per child: triangles for phrases (or explicit
    /// triangle markers), plain lines otherwise, nothing for a bare lone
    /// leaf under the suppressed style.
    fn draw_connector(&mut self, id: usize) {
        let children = self.arena.get(id).children.clone();

        if children.len() == 1 {
            let child_id = children[0];
            let child = self.arena.get(child_id);
            match self.options.leaf_style {
                LeafStyle::Auto => {
                    if child.contains_phrase || child.label.triangle {
                        self.triangle_to_parent(id, child_id);
                    } else {
                        self.line_to_parent(id, child_id);
                    }
                }
                LeafStyle::Bar => {
                    if child.label.triangle {
                        self.triangle_to_parent(id, child_id);
                    } else {
                        self.line_to_parent(id, child_id);
                    }
                }
                LeafStyle::None => {
                    if child.label.triangle {
                        self.triangle_to_parent(id, child_id);
                    } else if child.kind != ElementKind::Leaf {
                        self.line_to_parent(id, child_id);
                    }
                }
            }
        } else {
            for &child_id in &children {
                self.line_to_parent(id, child_id);
            }
        }

        for child_id in children {
            self.draw_connector(child_id);
        }
    }

    fn line_to_parent(&mut self, parent_id: usize, child_id: usize) {
        let ctx = self.ctx;
        let child = self.arena.get(child_id);
        if child.horizontal_indent == 0.0 {
            return;
        }
        let parent = self.arena.get(parent_id);

        let chi = dvec2(
            child.horizontal_indent + child.content_width / 2.0,
            child.vertical_indent + ctx.height_connector_to_text / 2.0,
        );
        let par = dvec2(
            parent.horizontal_indent + parent.content_width / 2.0,
            parent.vertical_indent + parent.content_height + ctx.height_connector_to_text,
        );
        let width = ctx.linewidth + LINE_SCALING;
        let stroke = self.palette.line.to_string();

        if self.options.polyline {
            let mid_y = par.y + (chi.y - par.y) / 2.0;
            self.tree.push(Primitive::Polyline(Polyline {
                points: vec![chi, dvec2(chi.x, mid_y), dvec2(par.x, mid_y), par],
                stroke,
                width,
            }));
        } else {
            self.tree.push(Primitive::Line(Line {
                from: chi,
                to: par,
                stroke,
                width,
                dashed: false,
                arrow_end: false,
            }));
        }
    }

    fn triangle_to_parent(&mut self, parent_id: usize, child_id: usize) {
        let ctx = self.ctx;
        let child = self.arena.get(child_id);
        if child.horizontal_indent == 0.0 {
            return;
        }
        let parent = self.arena.get(parent_id);

        let y_top = child.vertical_indent + ctx.height_connector_to_text / 2.0;
        self.tree.push(Primitive::Polygon(Polygon {
            points: vec![
                dvec2(child.horizontal_indent, y_top),
                dvec2(child.horizontal_indent + child.content_width, y_top),
                dvec2(
                    parent.horizontal_indent + parent.content_width / 2.0,
                    parent.vertical_indent + parent.content_height + ctx.height_connector_to_text,
                ),
            ],
            stroke: self.palette.fg.to_string(),
            width: ctx.linewidth + LINE_SCALING,
        }));
    }

    /// Collect path and line tags across the whole tree, validate end
    /// counts, then route each pair. Pools are insertion-ordered so equal
    /// inputs always emit byte-identical output.
    fn draw_paths(&mut self) -> Result<(), Error> {
        let ctx = *self.ctx;

        let mut paths: Vec<(DVec2, DVec2, PathArrow)> = Vec::new();
        let mut pool_source: Vec<(String, DVec2)> = Vec::new();
        let mut pool_target: Vec<(String, Vec<DVec2>)> = Vec::new();
        let mut pool_other: Vec<(String, Vec<DVec2>)> = Vec::new();
        let mut path_flags: Vec<String> = Vec::new();

        let mut line_pool: Vec<(String, Vec<LineEnd>)> = Vec::new();
        let mut line_flags: Vec<String> = Vec::new();

        for id in self.arena.ids() {
            let e = self.arena.get(id);
            let x0 = e.horizontal_indent - ctx.h_gap_between_nodes;
            let x1 = e.horizontal_indent + e.content_width / 2.0;
            let x2 = e.horizontal_indent + e.content_width + ctx.h_gap_between_nodes;
            let y0 = e.vertical_indent + ctx.height_connector_to_text / 2.0;
            let y1 = e.vertical_indent + e.content_height + ctx.height_connector_to_text;
            let tags = e.label.path_tags.clone();

            for tag in tags {
                if let Some(rest) = tag.strip_prefix('-') {
                    let (arrow, key) = if let Some(k) = rest.strip_prefix('>') {
                        (Some('>'), k)
                    } else if let Some(k) = rest.strip_prefix('<') {
                        (Some('<'), k)
                    } else {
                        (None, rest)
                    };
                    let end = LineEnd {
                        left: x0,
                        center_x: x1,
                        right: x2,
                        top: y0,
                        center_y: y0 + (y1 - y0) / 2.0,
                        bottom: y1,
                        arrow,
                    };
                    match line_pool.iter_mut().find(|(k, _)| k == key) {
                        Some((_, ends)) => ends.push(end),
                        None => line_pool.push((key.to_string(), vec![end])),
                    }
                    line_flags.push(key.to_string());
                } else if let Some(key) = tag.strip_prefix('>').or_else(|| tag.strip_prefix('<')) {
                    match pool_target.iter_mut().find(|(k, _)| k == key) {
                        Some((_, v)) => v.push(dvec2(x1, y1)),
                        None => pool_target.push((key.to_string(), vec![dvec2(x1, y1)])),
                    }
                    path_flags.push(key.to_string());
                } else if pool_source.iter().any(|(k, _)| *k == tag) {
                    match pool_other.iter_mut().find(|(k, _)| *k == tag) {
                        Some((_, v)) => v.push(dvec2(x1, y1)),
                        None => pool_other.push((tag.clone(), vec![dvec2(x1, y1)])),
                    }
                    path_flags.push(tag.clone());
                } else {
                    pool_source.push((tag.clone(), dvec2(x1, y1)));
                    path_flags.push(tag.clone());
                }

                if let Some(over) = overloaded(&path_flags).or_else(|| overloaded(&line_flags)) {
                    warn!(tag = %over, "path tag appears on more than two labels");
                    return Err(Error::TooManyPathEnds { tag: over });
                }
            }
        }

        for flags in [&path_flags, &line_flags] {
            for key in flags.iter() {
                if flags.iter().filter(|f| *f == key).count() == 1 {
                    warn!(tag = %key, "path tag appears on only one label");
                    return Err(Error::DanglingPathEnd { tag: key.clone() });
                }
            }
        }

        for (key, source) in &pool_source {
            path_flags.retain(|f| f != key);
            if let Some((_, targets)) = pool_target.iter().find(|(k, _)| k == key) {
                for &t in targets {
                    paths.push((*source, t, PathArrow::Single));
                }
            } else if let Some((_, others)) = pool_other.iter().find(|(k, _)| k == key) {
                for &t in others {
                    paths.push((*source, t, PathArrow::None));
                }
            }
        }

        // Tags with target markers on both ends get double arrows.
        let mut seen: Vec<&String> = Vec::new();
        for key in &path_flags {
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            if let Some((_, targets)) = pool_target.iter().find(|(k, _)| k == key) {
                if let Some((first, rest)) = targets.split_first() {
                    for &t in rest {
                        paths.push((*first, t, PathArrow::Double));
                    }
                }
            }
        }

        for (source, target, arrow) in paths {
            self.draw_a_path(source, target, arrow);
        }

        for (_, ends) in &line_pool {
            let a = ends[0];
            let b = ends[1];
            if a.top > b.bottom {
                self.direct_connector(
                    dvec2(a.center_x, a.top),
                    dvec2(b.center_x, b.bottom),
                    a.arrow,
                    b.arrow,
                );
            } else if a.bottom < b.top {
                self.direct_connector(
                    dvec2(b.center_x, b.top),
                    dvec2(a.center_x, a.bottom),
                    b.arrow,
                    a.arrow,
                );
            } else if a.center_x < b.center_x {
                if a.top == b.top {
                    let upper_y = a.center_y.min(b.center_y);
                    self.direct_connector(
                        dvec2(a.right, upper_y),
                        dvec2(b.left, upper_y),
                        a.arrow,
                        b.arrow,
                    );
                } else {
                    self.direct_connector(
                        dvec2(a.right, a.center_y),
                        dvec2(b.left, b.center_y),
                        a.arrow,
                        b.arrow,
                    );
                }
            } else if a.top == b.top {
                let upper_y = a.center_y.min(b.center_y);
                self.direct_connector(
                    dvec2(b.right, upper_y),
                    dvec2(a.left, upper_y),
                    b.arrow,
                    a.arrow,
                );
            } else {
                self.direct_connector(
                    dvec2(b.right, b.center_y),
                    dvec2(a.left, a.center_y),
                    b.arrow,
                    a.arrow,
                );
            }
        }

        Ok(())
    }

    /// Route one path as an elbow dropping below everything drawn so far.
    /// Repeated drops at the same x fan out leftward so parallel paths stay
    /// distinguishable.
    fn draw_a_path(&mut self, source: DVec2, target: DVec2, arrow: PathArrow) {
        let ctx = self.ctx;
        let x_spacing = ctx.h_gap_between_nodes * 1.25;
        let y_spacing = ctx.height_connector * 0.75;

        let ymax = source.y.max(target.y);
        let new_y = if ymax < self.height {
            self.height + y_spacing
        } else {
            ymax + y_spacing
        };

        let s_x = self.fan_out(source.x, x_spacing);
        let t_x = self.fan_out(target.x, x_spacing);

        let dashed = arrow == PathArrow::None;
        let stroke = self.palette.path;
        let width = ctx.linewidth + LINE_SCALING;
        let segment = |from: DVec2, to: DVec2, arrow_end: bool| {
            Primitive::Line(Line {
                from,
                to,
                stroke: stroke.to_string(),
                width,
                dashed,
                arrow_end,
            })
        };

        match arrow {
            PathArrow::Single => {
                self.extra.push(segment(dvec2(s_x, source.y), dvec2(s_x, new_y), false));
                self.extra.push(segment(dvec2(s_x, new_y), dvec2(t_x, new_y), false));
                self.extra.push(segment(dvec2(t_x, new_y), dvec2(t_x, target.y), true));
            }
            PathArrow::Double => {
                self.extra.push(segment(dvec2(s_x, new_y), dvec2(s_x, source.y), true));
                self.extra.push(segment(dvec2(s_x, new_y), dvec2(t_x, new_y), false));
                self.extra.push(segment(dvec2(t_x, new_y), dvec2(t_x, target.y), true));
            }
            PathArrow::None => {
                self.extra.push(segment(dvec2(s_x, source.y), dvec2(s_x, new_y), false));
                self.extra.push(segment(dvec2(s_x, new_y), dvec2(t_x, new_y), false));
                self.extra.push(segment(dvec2(t_x, new_y), dvec2(t_x, target.y), false));
            }
        }

        if new_y > self.height {
            self.height = new_y;
        }
    }

    fn fan_out(&mut self, x: f64, spacing: f64) -> f64 {
        let count = self.visited_x.entry(x.to_bits()).or_insert(0);
        let shifted = x - spacing * (*count as f64);
        *count += 1;
        shifted
    }

    /// Straight connector between two line-tag ends. Arrow presence at
    /// either end picks a mid-point marker, which needs an explicit vertex.
    fn direct_connector(
        &mut self,
        from: DVec2,
        to: DVec2,
        s_arrow: Option<char>,
        t_arrow: Option<char>,
    ) {
        let width = self.ctx.linewidth + LINE_SCALING;
        let stroke = self.palette.extra.to_string();
        if s_arrow.is_some() || t_arrow.is_some() {
            let marker = if s_arrow.is_some() && t_arrow.is_some() {
                MidMarker::Bothways
            } else if s_arrow.is_some() {
                MidMarker::Forward
            } else {
                MidMarker::Backward
            };
            self.extra.push(Primitive::Elbow(Elbow {
                from,
                to,
                stroke,
                width,
                marker,
            }));
        } else {
            self.extra.push(Primitive::Line(Line {
                from,
                to,
                stroke,
                width,
                dashed: false,
                arrow_end: false,
            }));
        }
    }
}

/// First tag appearing more than twice, if any.
fn overloaded(flags: &[String]) -> Option<String> {
    flags
        .iter()
        .find(|f| flags.iter().filter(|g| g == f).count() > 2)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutEngine;
    use crate::parse;
    use crate::types::GlyphMetrics;

    fn render(data: &str, options: &Options) -> Result<String, Error> {
        let ctx = LayoutContext::new(&GlyphMetrics, options);
        let mut arena = parse::build(data, &GlyphMetrics, &ctx, &options.font_family)?;
        LayoutEngine::new(&mut arena, &ctx, options).run();
        Renderer::new(&mut arena, &ctx, options).render()
    }

    #[test]
    fn one_text_block_per_element() {
        let out = render("[S [NP the dog][VP barks]]", &Options::default()).unwrap();
        assert_eq!(out.matches("<text ").count(), 5);
    }

    #[test]
    fn phrase_leaf_gets_triangle_in_auto_style() {
        let out = render("[S [NP the dog][VP barks]]", &Options::default()).unwrap();
        assert_eq!(out.matches("<polygon ").count(), 1);
    }

    #[test]
    fn bar_style_draws_line_instead_of_triangle() {
        let options = Options {
            leaf_style: LeafStyle::Bar,
            ..Options::default()
        };
        let out = render("[S [NP the dog][VP barks]]", &options).unwrap();
        assert!(!out.contains("<polygon "));
    }

    #[test]
    fn explicit_triangle_marker_survives_bar_style() {
        let options = Options {
            leaf_style: LeafStyle::Bar,
            ..Options::default()
        };
        let out = render("[S [NP ^the dog][VP barks]]", &options).unwrap();
        assert_eq!(out.matches("<polygon ").count(), 1);
    }

    #[test]
    fn polyline_mode_replaces_straight_connectors() {
        let options = Options {
            polyline: true,
            ..Options::default()
        };
        let out = render("[S [A x][B y]]", &options).unwrap();
        assert!(out.contains("<polyline "));
    }

    #[test]
    fn movement_path_draws_dashed_segments() {
        let out = render("[S [A x+1][B y+1]]", &Options::default()).unwrap();
        assert!(out.contains("stroke-dasharray='8 8'"));
    }

    #[test]
    fn directed_path_carries_arrow_marker() {
        let out = render("[S [A x+1][B y+>1]]", &Options::default()).unwrap();
        assert!(out.contains("marker-end='url(#arrow)'"));
        assert!(!out.contains("stroke-dasharray"));
    }

    #[test]
    fn dangling_path_end_is_an_error() {
        let err = render("[S [A x+1][B y]]", &Options::default()).unwrap_err();
        assert!(matches!(err, Error::DanglingPathEnd { .. }));
    }

    #[test]
    fn three_ends_on_one_tag_is_an_error() {
        let err = render("[S [A x+1][B y+1][C z+1]]", &Options::default()).unwrap_err();
        assert!(matches!(err, Error::TooManyPathEnds { .. }));
    }

    #[test]
    fn transparent_output_omits_background() {
        let opaque = render("[A b]", &Options::default()).unwrap();
        let transparent = render(
            "[A b]",
            &Options {
                transparent: true,
                ..Options::default()
            },
        )
        .unwrap();
        assert!(opaque.contains("fill=\"white\""));
        assert!(!transparent.contains("fill=\"white\""));
    }

    #[test]
    fn hidden_connectors_keep_layout_but_drop_strokes() {
        let options = Options {
            hide_default_connectors: true,
            ..Options::default()
        };
        let out = render("[S [A x][B y]]", &options).unwrap();
        assert!(out.contains("stroke: none"));
    }

    #[test]
    fn output_is_deterministic() {
        let data = "[S [NP^ the \\*dog\\*+1][VP <1>barks+>1]]";
        let a = render(data, &Options::default()).unwrap();
        let b = render(data, &Options::default()).unwrap();
        assert_eq!(a, b);
    }
}
