//! Configuration surface, text-metrics interface and per-run typographic
//! constants.
//!
//! Nothing in this module is process-global: every render derives one
//! [`LayoutContext`] from the configured font size and threads it explicitly
//! through layout and emission.

/// Placeholder glyph standing in for reserved whitespace. Produced by the
/// `<N>` padding markers and by shape tokens; never rendered as visible text.
pub const WHITESPACE_BLOCK: char = '\u{ffed}';

/// Ratio applied to the font size of small / subscript / superscript runs.
pub const SUBSCRIPT_RATIO: f64 = 0.7;

/// User-facing font sizes and margins are doubled internally so strokes and
/// glyphs stay crisp when the SVG is rasterized at 1:1.
pub const FONT_SCALING: f64 = 2.0;

/// Added to the configured line width for regular strokes.
pub const LINE_SCALING: f64 = 2.0;

/// Added to the configured line width for bold strokes and separators.
pub const BOLD_LINE_SCALING: f64 = 5.0;

/// Color scheme applied to nodes, leaves and out-of-tree paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorTheme {
    /// Everything black.
    Off,
    /// Blue nodes, green leaves, purple paths, red emphasis.
    Traditional,
    /// Okabe-Ito colorblind-safe palette.
    #[default]
    Modern,
}

/// Policy for the connector between a parent and a lone child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeafStyle {
    /// Triangle for multi-word phrases, straight line otherwise.
    #[default]
    Auto,
    /// Straight line unless the triangle flag forces a triangle.
    Bar,
    /// No connector at all unless the triangle flag forces a triangle.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

/// Option set consumed by the pipeline. Validation and collection of these
/// values belongs to the calling front end; defaults here match the hosted
/// service defaults.
#[derive(Debug, Clone)]
pub struct Options {
    /// Force all sibling subtrees to share equal horizontal width.
    pub symmetrize: bool,
    pub color: ColorTheme,
    pub leaf_style: LeafStyle,
    /// Font family written into text primitives. The built-in measurer does
    /// not consult it; a real metrics provider may.
    pub font_family: String,
    /// Font size in points, before internal scaling.
    pub fontsize: f64,
    /// Stroke width in pixels, before internal scaling.
    pub linewidth: f64,
    /// Extra whitespace around the finished diagram, before internal scaling.
    pub margin: f64,
    /// Multiplier on the parent-to-child connector height.
    pub vheight: f64,
    /// Omit the opaque background rectangle.
    pub transparent: bool,
    /// Draw child-parent connectors as elbowed polylines instead of straight
    /// lines.
    pub polyline: bool,
    /// Draw the default tree connectors in no color (paths stay visible).
    pub hide_default_connectors: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            symmetrize: true,
            color: ColorTheme::Modern,
            leaf_style: LeafStyle::Auto,
            font_family: "'Noto Sans', sans-serif".to_string(),
            fontsize: 16.0,
            linewidth: 2.0,
            margin: 0.0,
            vheight: 1.0,
            transparent: false,
            polyline: false,
            hide_default_connectors: false,
        }
    }
}

impl Options {
    /// Effective font size in pixels after internal scaling.
    pub(crate) fn scaled_fontsize(&self) -> f64 {
        self.fontsize * FONT_SCALING
    }

    /// Effective margin in pixels after internal scaling.
    pub(crate) fn scaled_margin(&self) -> f64 {
        self.margin * FONT_SCALING * 5.0
    }
}

/// Advance width and line height of a measured string, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub width: f64,
    pub height: f64,
}

/// External text-metrics collaborator.
///
/// Implementations must be pure: the same arguments always produce the same
/// metrics, otherwise layout loses its determinism guarantee.
pub trait TextMeasurer {
    fn measure(
        &self,
        text: &str,
        font_family: &str,
        size: f64,
        style: FontStyle,
        weight: FontWeight,
    ) -> Metrics;
}

/// Built-in deterministic measurer based on per-character advance classes.
///
/// This is intentionally font-file free: advances approximate a condensed
/// sans face closely enough for layout, and identical input always yields
/// identical output. Swap in a real provider for print-accurate spacing.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlyphMetrics;

impl GlyphMetrics {
    fn advance_ratio(ch: char) -> f64 {
        match ch {
            WHITESPACE_BLOCK => 0.52,
            ' ' => 0.26,
            'i' | 'j' | 'l' | 'f' | 't' | 'r' | 'I' => 0.30,
            '.' | ',' | ':' | ';' | '\'' | '!' | '|' => 0.26,
            'm' | 'w' | 'M' | 'W' => 0.86,
            '0'..='9' => 0.55,
            'A'..='Z' => 0.70,
            _ if (ch as u32) >= 0x2E80 => 1.0, // CJK and beyond: full width
            _ => 0.52,
        }
    }
}

impl TextMeasurer for GlyphMetrics {
    fn measure(
        &self,
        text: &str,
        _font_family: &str,
        size: f64,
        style: FontStyle,
        weight: FontWeight,
    ) -> Metrics {
        let mut width: f64 = text.chars().map(Self::advance_ratio).sum::<f64>() * size;
        if weight == FontWeight::Bold {
            width *= 1.05;
        }
        if style == FontStyle::Italic {
            width *= 1.02;
        }
        Metrics {
            width,
            height: size * 1.2,
        }
    }
}

/// Typographic constants derived once per render from the metrics of a
/// reference glyph, then threaded explicitly into every layout and emit call.
#[derive(Debug, Clone, Copy)]
pub struct LayoutContext {
    /// Effective font size in pixels.
    pub fontsize: f64,
    /// Effective stroke width in pixels.
    pub linewidth: f64,
    pub single_x_width: f64,
    pub single_x_height: f64,
    /// Vertical clearance between a connector end and the text it reaches.
    pub height_connector_to_text: f64,
    pub single_line_height: f64,
    pub width_half_x: f64,
    /// Vertical extent of a parent-to-child connector.
    pub height_connector: f64,
    pub h_gap_between_nodes: f64,
    pub box_vertical_margin: f64,
}

impl LayoutContext {
    pub fn new(measurer: &dyn TextMeasurer, options: &Options) -> LayoutContext {
        let fontsize = options.scaled_fontsize();
        let x = measurer.measure(
            "X",
            &options.font_family,
            fontsize,
            FontStyle::Normal,
            FontWeight::Normal,
        );
        LayoutContext {
            fontsize,
            linewidth: options.linewidth,
            single_x_width: x.width,
            single_x_height: x.height,
            height_connector_to_text: x.height / 2.0,
            single_line_height: x.height * 2.0,
            width_half_x: x.width / 2.0,
            height_connector: x.height * options.vheight,
            h_gap_between_nodes: x.width * 0.8,
            box_vertical_margin: x.height * 0.8,
        }
    }
}

/// Resolved colors for one render.
#[derive(Debug, Clone)]
pub struct Palette {
    pub node: &'static str,
    pub leaf: &'static str,
    pub path: &'static str,
    pub extra: &'static str,
    pub emph: &'static str,
    pub fg: &'static str,
    /// Stroke for default tree connectors; `none` when they are hidden.
    pub line: &'static str,
}

impl Palette {
    pub fn new(theme: ColorTheme, hide_default_connectors: bool) -> Palette {
        let (node, leaf, path, extra, emph) = match theme {
            // Okabe-Ito: blue, bluish green, reddish purple, vermillion
            ColorTheme::Modern => ("#0072B2", "#009E73", "#CC79A7", "#CC79A7", "#D55E00"),
            ColorTheme::Traditional => ("blue", "green", "purple", "purple", "red"),
            ColorTheme::Off => ("black", "black", "black", "black", "black"),
        };
        Palette {
            node,
            leaf,
            path,
            extra,
            emph,
            fg: "black",
            line: if hide_default_connectors {
                "none"
            } else {
                "black"
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyph_metrics_are_deterministic() {
        let m = GlyphMetrics;
        let a = m.measure("the dog", "x", 32.0, FontStyle::Normal, FontWeight::Normal);
        let b = m.measure("the dog", "x", 32.0, FontStyle::Normal, FontWeight::Normal);
        assert_eq!(a, b);
        assert!(a.width > 0.0 && a.height > 0.0);
    }

    #[test]
    fn bold_is_wider_than_normal() {
        let m = GlyphMetrics;
        let normal = m.measure("NP", "x", 32.0, FontStyle::Normal, FontWeight::Normal);
        let bold = m.measure("NP", "x", 32.0, FontStyle::Normal, FontWeight::Bold);
        assert!(bold.width > normal.width);
    }

    #[test]
    fn layout_context_derives_from_reference_glyph() {
        let ctx = LayoutContext::new(&GlyphMetrics, &Options::default());
        assert_eq!(ctx.fontsize, 32.0);
        assert_eq!(ctx.width_half_x, ctx.single_x_width / 2.0);
        assert_eq!(ctx.single_line_height, ctx.single_x_height * 2.0);
        assert!(ctx.h_gap_between_nodes < ctx.single_x_width);
    }

    #[test]
    fn hidden_connectors_use_no_stroke() {
        let p = Palette::new(ColorTheme::Modern, true);
        assert_eq!(p.line, "none");
        assert_eq!(p.node, "#0072B2");
    }
}
