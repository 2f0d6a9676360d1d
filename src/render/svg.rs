//! SVG primitives and document assembly.
//!
//! Drawing code builds typed primitives; serialization happens in one place
//! so the output stays byte-deterministic for a given input and options.

use enum_dispatch::enum_dispatch;
use glam::DVec2;
use std::fmt::Write;

use crate::types::{Options, Palette, WHITESPACE_BLOCK};

/// Format a number matching C's %g format (6 significant figures, trailing zeros trimmed).
pub(crate) fn fmt_num(value: f64) -> String {
    fmt_num_precision(value, 6)
}

/// Format a number with specified significant figures, trailing zeros trimmed.
fn fmt_num_precision(value: f64, sig_figs: i32) -> String {
    if value == 0.0 {
        return "0".to_string();
    }

    // Round to specified significant figures
    let abs_val = value.abs();
    let magnitude = abs_val.log10().floor() as i32;
    let scale = 10_f64.powi(sig_figs - 1 - magnitude);
    let rounded = (value * scale).round() / scale;

    // Format with enough decimal places, then trim
    let decimals = (sig_figs - 1 - magnitude).max(0) as usize;
    let s = format!("{:.prec$}", rounded, prec = decimals);
    let s = s.trim_end_matches('0');
    let s = s.trim_end_matches('.');
    s.to_string()
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

#[enum_dispatch]
pub(crate) trait WriteSvg {
    fn write_svg(&self, out: &mut String);
}

#[enum_dispatch(WriteSvg)]
pub(crate) enum Primitive {
    Text(TextBlock),
    Line(Line),
    Polyline(Polyline),
    Polygon(Polygon),
    Rect(Rect),
    Elbow(Elbow),
}

/// One `<text>` element holding every positioned `<tspan>` of a node label.
pub(crate) struct TextBlock {
    pub x: f64,
    pub y: f64,
    pub fill: String,
    pub font_size: f64,
    pub spans: Vec<Tspan>,
}

pub(crate) struct Tspan {
    pub x: f64,
    pub y: f64,
    pub style: String,
    pub decoration: String,
    pub font_family: String,
    pub text: String,
}

impl WriteSvg for TextBlock {
    fn write_svg(&self, out: &mut String) {
        let _ = write!(
            out,
            "<text white-space='pre' alignment-baseline='text-top' style='fill: {}; font-size: {}px;' x='{}' y='{}'>",
            self.fill,
            fmt_num(self.font_size),
            fmt_num(self.x),
            fmt_num(self.y)
        );
        for span in &self.spans {
            span.write_svg(out);
        }
        out.push_str("</text>\n");
    }
}

impl Tspan {
    fn write_svg(&self, out: &mut String) {
        let _ = write!(
            out,
            "<tspan x='{}' y='{}' style=\"{}\" text-decoration=\"{}\" font-family=\"{}\">",
            fmt_num(self.x),
            fmt_num(self.y),
            self.style,
            self.decoration,
            self.font_family
        );
        write_with_hidden_fillers(out, &self.text);
        out.push_str("</tspan>\n");
    }
}

/// Filler glyphs pad the layout but must not render; wrap each run in an
/// invisible inner tspan rather than dropping it, so text advances stay put.
fn write_with_hidden_fillers(out: &mut String, text: &str) {
    let escaped = escape_text(text);
    let mut rest = escaped.as_str();
    while let Some(start) = rest.find(WHITESPACE_BLOCK) {
        out.push_str(&rest[..start]);
        let run_len = rest[start..]
            .chars()
            .take_while(|&c| c == WHITESPACE_BLOCK)
            .count();
        out.push_str("<tspan style='fill:none;'>");
        for _ in 0..run_len {
            out.push(WHITESPACE_BLOCK);
        }
        out.push_str("</tspan>");
        rest = &rest[start + run_len * WHITESPACE_BLOCK.len_utf8()..];
    }
    out.push_str(rest);
}

pub(crate) struct Line {
    pub from: DVec2,
    pub to: DVec2,
    pub stroke: String,
    pub width: f64,
    pub dashed: bool,
    pub arrow_end: bool,
}

impl WriteSvg for Line {
    fn write_svg(&self, out: &mut String) {
        let dasharray = if self.dashed {
            " stroke-dasharray='8 8'"
        } else {
            ""
        };
        let marker = if self.arrow_end {
            " marker-end='url(#arrow)'"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "<line x1='{}' y1='{}' x2='{}' y2='{}' style='fill: none; stroke: {}; stroke-width:{}; stroke-linejoin:round; stroke-linecap:round;'{}{} />",
            fmt_num(self.from.x),
            fmt_num(self.from.y),
            fmt_num(self.to.x),
            fmt_num(self.to.y),
            self.stroke,
            fmt_num(self.width),
            dasharray,
            marker
        );
    }
}

pub(crate) struct Polyline {
    pub points: Vec<DVec2>,
    pub stroke: String,
    pub width: f64,
}

impl WriteSvg for Polyline {
    fn write_svg(&self, out: &mut String) {
        let _ = write!(
            out,
            "<polyline style='stroke:{}; stroke-width:{}; fill:none; stroke-linejoin:round; stroke-linecap:round;' points='",
            self.stroke,
            fmt_num(self.width)
        );
        write_points(out, &self.points);
        out.push_str("' />\n");
    }
}

pub(crate) struct Polygon {
    pub points: Vec<DVec2>,
    pub stroke: String,
    pub width: f64,
}

impl WriteSvg for Polygon {
    fn write_svg(&self, out: &mut String) {
        let _ = write!(
            out,
            "<polygon style='fill: none; stroke: {}; stroke-width:{}; stroke-linejoin:round; stroke-linecap:round;' points='",
            self.stroke,
            fmt_num(self.width)
        );
        write_points(out, &self.points);
        out.push_str("' />\n");
    }
}

fn write_points(out: &mut String, points: &[DVec2]) {
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{},{}", fmt_num(p.x), fmt_num(p.y));
    }
}

/// Rounded-corner boxes double as circles: a rect whose corner radius is
/// half its height reads as a stadium, matching the circle decoration.
pub(crate) struct Rect {
    pub origin: DVec2,
    pub size: DVec2,
    pub radius: Option<f64>,
    pub stroke: String,
    pub width: f64,
    pub fill: String,
}

impl WriteSvg for Rect {
    fn write_svg(&self, out: &mut String) {
        let rounding = match self.radius {
            Some(r) => format!(" rx='{}' ry='{}'", fmt_num(r), fmt_num(r)),
            None => String::new(),
        };
        let _ = writeln!(
            out,
            "<rect style='stroke: {}; stroke-linejoin:round; stroke-width:{};' x='{}' y='{}'{} width='{}' height='{}' fill='{}' />",
            self.stroke,
            fmt_num(self.width),
            fmt_num(self.origin.x),
            fmt_num(self.origin.y),
            rounding,
            fmt_num(self.size.x),
            fmt_num(self.size.y),
            self.fill
        );
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum MidMarker {
    Forward,
    Backward,
    Bothways,
}

/// Two-segment path with an arrow marker at its midpoint vertex. Plain
/// `<line>` elements cannot carry `marker-mid`, hence the explicit vertex.
pub(crate) struct Elbow {
    pub from: DVec2,
    pub to: DVec2,
    pub stroke: String,
    pub width: f64,
    pub marker: MidMarker,
}

impl WriteSvg for Elbow {
    fn write_svg(&self, out: &mut String) {
        let mid = self.from + (self.to - self.from) / 2.0;
        let marker = match self.marker {
            MidMarker::Forward => "arrowForward",
            MidMarker::Backward => "arrowBackward",
            MidMarker::Bothways => "arrowBothways",
        };
        let _ = writeln!(
            out,
            "<path d='M{},{} L{},{} L{},{}' style='fill: none; stroke: {}; stroke-width:{}; stroke-linecap:round;' marker-mid='url(#{})' />",
            fmt_num(self.from.x),
            fmt_num(self.from.y),
            fmt_num(mid.x),
            fmt_num(mid.y),
            fmt_num(self.to.x),
            fmt_num(self.to.y),
            self.stroke,
            fmt_num(self.width),
            marker
        );
    }
}

/// Assemble the complete document: header with marker and hatch defs,
/// optional opaque background, tree primitives, then path overlays.
pub(crate) fn document(
    width: f64,
    height: f64,
    gap: f64,
    options: &Options,
    palette: &Palette,
    tree: &[Primitive],
    extra: &[Primitive],
) -> String {
    let margin = options.scaled_margin();
    let view_w = width + margin * 2.0;
    let view_h = height + margin * 2.0;
    // Arrowhead markers scale with the inter-node gap.
    let as2 = gap;
    let as4 = as2 * 3.0;

    let mut out = String::with_capacity(4096);
    out.push_str("<?xml version=\"1.0\" standalone=\"no\"?>\n");
    out.push_str(
        "<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n",
    );
    let _ = writeln!(
        out,
        "<svg width=\"{}\" height=\"{}\" viewBox=\"{}, {}, {}, {}\" version=\"1.1\" xmlns=\"http://www.w3.org/2000/svg\">",
        fmt_num(view_w),
        fmt_num(view_h),
        fmt_num(-margin),
        fmt_num(-margin),
        fmt_num(view_w),
        fmt_num(view_h)
    );

    out.push_str("<defs>\n");
    let _ = writeln!(
        out,
        "<marker id=\"arrow\" markerUnits=\"userSpaceOnUse\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"{0}\" markerHeight=\"{0}\" orient=\"auto\">\n<path d=\"M 0 0 L 10 5 L 0 10\" fill=\"{1}\"/>\n</marker>",
        fmt_num(as2),
        palette.extra
    );
    let _ = writeln!(
        out,
        "<marker id=\"arrowBackward\" markerUnits=\"userSpaceOnUse\" viewBox=\"0 0 10 10\" refX=\"5\" refY=\"5\" markerWidth=\"{0}\" markerHeight=\"{0}\" orient=\"auto\">\n<path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{1}\"/>\n</marker>",
        fmt_num(as2),
        palette.extra
    );
    let _ = writeln!(
        out,
        "<marker id=\"arrowForward\" markerUnits=\"userSpaceOnUse\" viewBox=\"0 0 10 10\" refX=\"5\" refY=\"5\" markerWidth=\"{0}\" markerHeight=\"{0}\" orient=\"auto\">\n<path d=\"M 10 0 L 0 5 L 10 10 z\" fill=\"{1}\"/>\n</marker>",
        fmt_num(as2),
        palette.extra
    );
    let _ = writeln!(
        out,
        "<marker id=\"arrowBothways\" markerUnits=\"userSpaceOnUse\" viewBox=\"0 0 30 10\" refX=\"15\" refY=\"5\" markerWidth=\"{0}\" markerHeight=\"{1}\" orient=\"auto\">\n<path d=\"M 0 5 L 10 0 L 10 5 L 20 5 L 20 0 L 30 5 L 20 10 L 20 5 L 10 5 L 10 10 z\" fill=\"{2}\"/>\n</marker>",
        fmt_num(as4),
        fmt_num(as2),
        palette.extra
    );
    for (id, color) in [
        ("hatchBlack", "black"),
        ("hatchForNode", palette.node),
        ("hatchForLeaf", palette.leaf),
    ] {
        let _ = writeln!(
            out,
            "<pattern id=\"{id}\" x=\"10\" y=\"10\" width=\"10\" height=\"10\" patternUnits=\"userSpaceOnUse\" patternTransform=\"rotate(45)\">\n<line x1=\"0\" y=\"0\" x2=\"0\" y2=\"10\" stroke=\"{color}\" stroke-width=\"4\"></line>\n</pattern>"
        );
    }
    out.push_str("</defs>\n");

    if !options.transparent {
        let _ = writeln!(
            out,
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" stroke=\"none\" fill=\"white\" />",
            fmt_num(-margin),
            fmt_num(-margin),
            fmt_num(view_w),
            fmt_num(view_h)
        );
    }

    for p in tree {
        p.write_svg(&mut out);
    }
    for p in extra {
        p.write_svg(&mut out);
    }

    out.push_str("</svg>\n");
    out
}
