//! End-to-end properties of the public rendering pipeline.

use regex_lite::Regex;
use treedown::markup::{ContentLine, Decoration};
use treedown::{ColorTheme, Error, LeafStyle, Options, render, validate};

fn count(haystack: &str, pattern: &str) -> usize {
    Regex::new(pattern).unwrap().find_iter(haystack).count()
}

#[test]
fn five_labels_emit_five_text_primitives() {
    let svg = render("[S [NP the dog][VP barks]]", &Options::default()).unwrap();
    assert_eq!(count(&svg, "<text "), 5);
}

#[test]
fn document_declares_matching_bounds() {
    let svg = render("[S [NP the dog][VP barks]]", &Options::default()).unwrap();
    let re = Regex::new(r#"<svg width="([0-9.]+)" height="([0-9.]+)" viewBox="([-0-9.]+), ([-0-9.]+), ([0-9.]+), ([0-9.]+)""#).unwrap();
    let caps = re.captures(&svg).expect("svg root with bounds");
    assert_eq!(&caps[1], &caps[5]);
    assert_eq!(&caps[2], &caps[6]);
    assert_eq!(&caps[3], "0");
    assert_eq!(&caps[4], "0");
}

#[test]
fn margin_shifts_the_view_box() {
    let options = Options {
        margin: 1.0,
        ..Options::default()
    };
    let svg = render("[A b]", &options).unwrap();
    assert!(svg.contains("viewBox=\"-10, -10,"));
}

#[test]
fn rendering_twice_is_byte_identical() {
    let data = "[S [NP^ the **dog**+1][VP [V chases+>1][NP _cats_]]]";
    let options = Options::default();
    let first = render(data, &options).unwrap();
    let second = render(data, &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn validation_cases() {
    assert!(validate("[NP dog]").is_ok());
    assert!(matches!(validate("[NP ]"), Err(Error::EmptyBracketBody)));
    assert!(matches!(validate("[NP dog"), Err(Error::UnbalancedBrackets)));
}

#[test]
fn multiple_top_level_brackets_are_an_error() {
    // Two roots must come back as a structured error, never a crash.
    assert!(matches!(
        render("[A][B]", &Options::default()),
        Err(Error::MultipleRoots)
    ));
}

#[test]
fn auto_leaf_style_picks_triangle_for_phrases() {
    let phrase = render("[NP [N a big dog]]", &Options::default()).unwrap();
    assert_eq!(count(&phrase, "<polygon "), 1);

    let word = render("[NP [N dog]]", &Options::default()).unwrap();
    assert_eq!(count(&word, "<polygon "), 0);
    assert!(count(&word, "<line ") >= 1);
}

#[test]
fn matched_path_tags_route_one_connector() {
    let svg = render("[S [A x+1][B y+1]]", &Options::default()).unwrap();
    // One undirected path: three dashed elbow segments, no arrow marker use.
    assert_eq!(count(&svg, "stroke-dasharray='8 8'"), 3);
    assert_eq!(count(&svg, "marker-end"), 0);
}

#[test]
fn directed_path_ends_with_arrow() {
    let svg = render("[S [A x+1][B y+>1]]", &Options::default()).unwrap();
    assert_eq!(count(&svg, "marker-end='url\\(#arrow\\)'"), 1);
}

#[test]
fn unmatched_path_tag_is_rejected() {
    match render("[S [A x+1][B y]]", &Options::default()) {
        Err(Error::DanglingPathEnd { tag }) => assert_eq!(tag, "1"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn triple_path_tag_is_rejected() {
    match render("[S [A x+1][B y+1][C z+1]]", &Options::default()) {
        Err(Error::TooManyPathEnds { tag }) => assert_eq!(tag, "1"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn bold_markup_becomes_one_emphasized_run() {
    let label = treedown::markup::parse("**bold**").unwrap();
    assert_eq!(label.lines.len(), 1);
    match &label.lines[0] {
        ContentLine::Text(runs) => {
            assert_eq!(runs.len(), 1);
            assert_eq!(runs[0].text, "bold");
            assert!(runs[0].decorations.contains(Decoration::Bold));
        }
        other => panic!("unexpected line {other:?}"),
    }
}

#[test]
fn escaped_markup_stays_literal() {
    let label = treedown::markup::parse("\\*literal\\*").unwrap();
    match &label.lines[0] {
        ContentLine::Text(runs) => {
            assert_eq!(runs.len(), 1);
            assert_eq!(runs[0].text, "*literal*");
            assert_eq!(runs[0].decorations, Default::default());
        }
        other => panic!("unexpected line {other:?}"),
    }
}

#[test]
fn modern_theme_uses_okabe_ito_palette() {
    let svg = render("[S [NP the dog][VP barks]]", &Options::default()).unwrap();
    assert!(svg.contains("#0072B2"));
    assert!(svg.contains("#009E73"));
}

#[test]
fn monochrome_theme_renders_black_only() {
    let options = Options {
        color: ColorTheme::Off,
        ..Options::default()
    };
    let svg = render("[S [NP the dog][VP barks]]", &options).unwrap();
    assert!(!svg.contains("#0072B2"));
    assert!(!svg.contains("blue"));
}

#[test]
fn transparent_mode_drops_background_rect() {
    let options = Options {
        transparent: true,
        ..Options::default()
    };
    let svg = render("[A b]", &options).unwrap();
    assert!(!svg.contains("fill=\"white\""));
}

#[test]
fn polyline_mode_emits_elbowed_connectors() {
    let options = Options {
        polyline: true,
        ..Options::default()
    };
    let svg = render("[S [A x][B y]]", &options).unwrap();
    // One polyline per parent-child edge: S-A, S-B, A-x, B-y.
    assert_eq!(count(&svg, "<polyline "), 4);
}

#[test]
fn bare_leaf_style_suppresses_lone_leaf_connector() {
    let options = Options {
        leaf_style: LeafStyle::None,
        ..Options::default()
    };
    let bare = render("[NP [N dog]]", &options).unwrap();
    let default = render("[NP [N dog]]", &Options::default()).unwrap();
    assert!(count(&bare, "<line ") < count(&default, "<line "));
}

#[test]
fn multiline_label_renders_every_line() {
    let svg = render("[S [NP first\\ second]]", &Options::default()).unwrap();
    assert!(svg.contains(">first<"));
    assert!(svg.contains(">second<"));
}

#[test]
fn markup_error_names_the_offending_label() {
    let err = render("[S [NP **oops]]", &Options::default()).unwrap_err();
    match err {
        Error::MarkupSyntax { label } => assert!(label.contains("**oops")),
        other => panic!("unexpected error: {other:?}"),
    }
}
