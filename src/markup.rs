//! Inline markup parser for node labels.
//!
//! Turns one element's raw label text into a [`ParsedLabel`]: lines of
//! styled runs plus the enclosure kind, the triangle flag and any path tags.
//! The grammar proper lives in `markup.pest`; this module strips the affix
//! syntax (path tags, `^`, `#` prefixes), splits lines on `\n` markers and
//! folds the parse tree into decorated runs.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::errors::Error;
use crate::types::WHITESPACE_BLOCK;

#[derive(Parser)]
#[grammar = "markup.pest"]
struct LabelParser;

/// One styling flag on a content run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Decoration {
    Bold,
    Italic,
    BoldItalic,
    Small,
    Subscript,
    Superscript,
    Overline,
    Underline,
    LineThrough,
    Box,
    Circle,
    Bar,
    Hatched,
    BoldStroke,
    ArrowLeft,
    ArrowRight,
    Whitespace,
    Math,
}

/// Set of [`Decoration`] flags, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecorationSet(u32);

impl DecorationSet {
    pub const EMPTY: DecorationSet = DecorationSet(0);

    pub fn insert(&mut self, d: Decoration) {
        self.0 |= 1 << d as u32;
    }

    #[must_use]
    pub fn with(mut self, d: Decoration) -> DecorationSet {
        self.insert(d);
        self
    }

    pub fn contains(self, d: Decoration) -> bool {
        self.0 & (1 << d as u32) != 0
    }

    /// True for box, circle and bar runs, which reserve extra width.
    pub fn has_shape(self) -> bool {
        self.contains(Decoration::Box)
            || self.contains(Decoration::Circle)
            || self.contains(Decoration::Bar)
    }
}

/// A run of glyphs sharing one decoration set. Geometry fields are zero
/// until the element measurement step fills them in.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRun {
    pub text: String,
    pub decorations: DecorationSet,
    pub width: f64,
    pub height: f64,
    /// Inner text width of a box/circle/bar run, before shape padding.
    pub content_width: f64,
}

impl ContentRun {
    fn new(text: String, decorations: DecorationSet) -> ContentRun {
        ContentRun {
            text,
            decorations,
            width: 0.0,
            height: 0.0,
            content_width: 0.0,
        }
    }
}

/// One line of an element's content block.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentLine {
    Text(Vec<ContentRun>),
    /// Thin horizontal separator (`----`).
    Border,
    /// Thick horizontal separator (`====`).
    BoldBorder,
    /// Empty spacer produced by a doubled line break.
    Blank,
}

/// Decorative frame around an element's whole content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Enclosure {
    #[default]
    None,
    Brackets,
    Rectangle,
    BoldRectangle,
}

/// Parsed form of one raw label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedLabel {
    pub lines: Vec<ContentLine>,
    pub enclosure: Enclosure,
    pub triangle: bool,
    /// Path tags stripped from the end of the label, without the leading
    /// `+`: `3` / `>3` / `<3` are path ends, `-3` / `->3` / `-<3` line ends.
    pub path_tags: Vec<String>,
}

/// Parse one raw label into structured content.
pub fn parse(raw: &str) -> Result<ParsedLabel, Error> {
    let (rest, path_tags, mut triangle) = strip_path_tags(raw);

    let mut body = rest;
    if let Some(stripped) = body.strip_prefix('^') {
        triangle = true;
        body = stripped;
    }

    let mut enclosure = Enclosure::None;
    for (prefix, kind) in [
        ("###", Enclosure::BoldRectangle),
        ("##", Enclosure::Rectangle),
        ("#", Enclosure::Brackets),
    ] {
        if let Some(stripped) = body.strip_prefix(prefix) {
            enclosure = kind;
            body = stripped;
            break;
        }
    }

    if body.is_empty() {
        return Err(Error::markup_syntax(raw));
    }

    let mut lines = Vec::new();
    let mut segments = split_line_markers(body);
    // A trailing marker terminates the last line rather than opening a
    // blank one.
    if segments.len() > 1 && segments.last().is_some_and(|s| s.is_empty()) {
        segments.pop();
    }
    for segment in &segments {
        if segment.is_empty() {
            lines.push(ContentLine::Blank);
            continue;
        }
        lines.push(parse_line(segment).map_err(|_| Error::markup_syntax(raw))?);
    }

    Ok(ParsedLabel {
        lines,
        enclosure,
        triangle,
        path_tags,
    })
}

/// Split on literal `\n` markers, honoring backslash escapes.
fn split_line_markers(s: &str) -> Vec<String> {
    let mut segments = vec![String::new()];
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            segments.last_mut().unwrap().push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => segments.push(String::new()),
            Some(other) => {
                let last = segments.last_mut().unwrap();
                last.push('\\');
                last.push(other);
            }
            None => segments.last_mut().unwrap().push('\\'),
        }
    }
    segments
}

fn parse_line(segment: &str) -> Result<ContentLine, pest::error::Error<Rule>> {
    let mut pairs = LabelParser::parse(Rule::line, segment)?;
    let line = pairs.next().expect("line rule always yields one pair");

    let mut runs = Vec::new();
    for pair in line.into_inner() {
        match pair.as_rule() {
            Rule::border => return Ok(ContentLine::Border),
            Rule::bold_border => return Ok(ContentLine::BoldBorder),
            Rule::EOI => {}
            _ => collect_runs(pair, DecorationSet::EMPTY, &mut runs),
        }
    }
    Ok(ContentLine::Text(runs))
}

/// Fold a token pair into runs, accumulating decoration flags while
/// descending through nested markup.
fn collect_runs(pair: Pair<'_, Rule>, decos: DecorationSet, runs: &mut Vec<ContentRun>) {
    let deco = match pair.as_rule() {
        Rule::text => {
            let mut run = ContentRun::new(unescape(pair.as_str()), decos);
            classify_run(&mut run);
            runs.push(run);
            return;
        }
        Rule::shape => {
            for inner in pair.into_inner() {
                collect_runs(inner, decos, runs);
            }
            return;
        }
        Rule::bstroke_shape => {
            let core = pair
                .into_inner()
                .next()
                .expect("bold-stroke shape has a core token");
            runs.push(shape_run(
                core.as_rule(),
                decos.with(Decoration::BoldStroke),
            ));
            return;
        }
        Rule::plain_shape => {
            let core = pair.into_inner().next().expect("shape has a core token");
            runs.push(shape_run(core.as_rule(), decos));
            return;
        }
        Rule::bolditalic => Decoration::BoldItalic,
        Rule::bold => Decoration::Bold,
        Rule::italic => Decoration::Italic,
        Rule::small => Decoration::Small,
        Rule::superscript => Decoration::Superscript,
        Rule::subscript => Decoration::Subscript,
        Rule::overline => Decoration::Overline,
        Rule::underline => Decoration::Underline,
        Rule::strike => Decoration::LineThrough,
        Rule::boxed => Decoration::Box,
        Rule::circle => Decoration::Circle,
        other => unreachable!("unexpected markup rule {other:?}"),
    };
    let decos = decos.with(deco);
    for inner in pair.into_inner() {
        collect_runs(inner, decos, runs);
    }
}

/// Build the placeholder run for a literal shape token.
fn shape_run(core: Rule, mut decos: DecorationSet) -> ContentRun {
    match core {
        Rule::bar => decos.insert(Decoration::Bar),
        Rule::arrow_left => {
            decos.insert(Decoration::Bar);
            decos.insert(Decoration::ArrowLeft);
        }
        Rule::arrow_right => {
            decos.insert(Decoration::Bar);
            decos.insert(Decoration::ArrowRight);
        }
        Rule::arrow_both => {
            decos.insert(Decoration::Bar);
            decos.insert(Decoration::ArrowLeft);
            decos.insert(Decoration::ArrowRight);
        }
        Rule::circle_empty => decos.insert(Decoration::Circle),
        Rule::circle_hatched => {
            decos.insert(Decoration::Circle);
            decos.insert(Decoration::Hatched);
        }
        Rule::box_empty => decos.insert(Decoration::Box),
        Rule::box_hatched => {
            decos.insert(Decoration::Box);
            decos.insert(Decoration::Hatched);
        }
        other => unreachable!("unexpected shape core {other:?}"),
    }
    ContentRun::new(WHITESPACE_BLOCK.to_string(), decos)
}

/// Flags derived from the run text itself: padding fillers and math glyphs.
fn classify_run(run: &mut ContentRun) {
    if !run.decorations.has_shape()
        && !run.text.is_empty()
        && run.text.chars().all(|c| c == WHITESPACE_BLOCK)
    {
        run.decorations.insert(Decoration::Whitespace);
    }
    if run.text.chars().any(is_math_glyph) {
        run.decorations.insert(Decoration::Math);
    }
}

fn is_math_glyph(ch: char) -> bool {
    matches!(ch as u32, 0x2200..=0x22FF | 0x1D400..=0x1D7FF)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Strip the trailing path-tag suffix (`+N` / `+>N` / `+-N` …), returning
/// the remaining text, the tags in source order, and whether a trailing
/// triangle marker followed the tags.
fn strip_path_tags(raw: &str) -> (&str, Vec<String>, bool) {
    let trailing_caret = raw.ends_with('^') && !raw.ends_with("\\^");
    let candidate = if trailing_caret {
        &raw[..raw.len() - 1]
    } else {
        raw
    };

    let mut tags_start = candidate.len();
    while let Some(start) = match_tag_before(candidate, tags_start) {
        tags_start = start;
    }

    if tags_start == candidate.len() {
        // No tags; a bare trailing caret stays literal text.
        return (raw, Vec::new(), false);
    }

    let tags = candidate[tags_start..]
        .split('+')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    (&candidate[..tags_start], tags, trailing_caret)
}

/// If `s[..end]` ends with one `\+ -? [<>]? digits+` tag group preceded by at
/// least one character of label text, return the tag's start index.
fn match_tag_before(s: &str, end: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = end;
    let digits_end = i;
    while i > 0 && bytes[i - 1].is_ascii_digit() {
        i -= 1;
    }
    if i == digits_end {
        return None;
    }
    if i > 0 && (bytes[i - 1] == b'>' || bytes[i - 1] == b'<') {
        i -= 1;
    }
    if i > 0 && bytes[i - 1] == b'-' {
        i -= 1;
    }
    if i == 0 || bytes[i - 1] != b'+' {
        return None;
    }
    i -= 1;
    // Tags are never the whole label, and an escaped plus is literal.
    if i == 0 || bytes[i - 1] == b'\\' {
        return None;
    }
    Some(i)
}
