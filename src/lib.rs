//! Bracket-notation linguistic trees rendered as SVG.
//!
//! Input is the labelled bracket notation used for constituent trees:
//!
//! ```text
//! [S [NP the dog][VP barks]]
//! ```
//!
//! Node labels carry an inline markup language for emphasis, scripts,
//! multi-line content, shapes and movement paths. Rendering is fully
//! deterministic: the same input and [`Options`] always produce the same
//! SVG bytes.
//!
//! ```
//! let svg = treedown::render("[S [NP the dog][VP barks]]", &treedown::Options::default())?;
//! assert!(svg.starts_with("<?xml"));
//! # Ok::<(), treedown::Error>(())
//! ```
//!
//! Text metrics come from a pluggable [`TextMeasurer`]; the built-in
//! [`GlyphMetrics`] needs no font files. Use [`render_with`] to supply a
//! measurer backed by real font data.

pub mod element;
pub mod errors;
mod layout;
mod log;
pub mod markup;
mod parse;
mod render;
pub mod types;

pub use errors::Error;
pub use parse::validate;
pub use types::{
    ColorTheme, FontStyle, FontWeight, GlyphMetrics, LayoutContext, LeafStyle, Metrics, Options,
    TextMeasurer,
};

/// Render bracket-notation text to an SVG document with built-in metrics.
pub fn render(data: &str, options: &Options) -> Result<String, Error> {
    render_with(data, &GlyphMetrics, options)
}

/// Render with a caller-supplied text measurer.
pub fn render_with(
    data: &str,
    measurer: &dyn TextMeasurer,
    options: &Options,
) -> Result<String, Error> {
    let ctx = LayoutContext::new(measurer, options);
    let mut arena = parse::build(data, measurer, &ctx, &options.font_family)?;
    layout::LayoutEngine::new(&mut arena, &ctx, options).run();
    render::Renderer::new(&mut arena, &ctx, options).render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_simple_tree() {
        let svg = render("[S [NP the dog][VP barks]]", &Options::default()).unwrap();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn render_propagates_validation_errors() {
        assert!(matches!(
            render("", &Options::default()),
            Err(Error::EmptyInput)
        ));
        assert!(matches!(
            render("[S [NP dog", &Options::default()),
            Err(Error::UnbalancedBrackets)
        ));
    }

    #[test]
    fn validate_is_exposed_standalone() {
        assert!(validate("[S ok]").is_ok());
        assert!(validate("[S ok").is_err());
    }
}
