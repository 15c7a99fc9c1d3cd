//! Safe HTML filtering for imported free text.
//!
//! Markup is parsed as an HTML fragment and re-serialised through an
//! allowlist. Unknown elements are unwrapped (their text survives), while
//! script-like elements are dropped together with their content.

use std::fmt::Write as _;

use itertools::Itertools as _;
use scraper::{ElementRef, Html, Node};

const VOID_TAGS: &[&str] = &["br", "hr", "img"];

const DROPPED_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "form", "input",
    "button", "select", "textarea", "head", "title", "meta", "link", "svg", "math",
];

const GLOBAL_ATTRS: &[&str] = &["class", "title", "lang", "dir"];

fn allowed_attrs(tag: &str) -> Option<&'static [&'static str]> {
    Some(match tag {
        "a" => &["href", "target", "rel", "name"],
        "img" => &["src", "alt", "width", "height"],
        "td" | "th" => &["colspan", "rowspan", "scope"],
        "ol" => &["start", "type", "reversed"],
        "abbr" | "acronym" | "b" | "blockquote" | "br" | "caption" | "cite" | "code" | "dd"
        | "del" | "div" | "dl" | "dt" | "em" | "figcaption" | "figure" | "h1" | "h2" | "h3"
        | "h4" | "h5" | "h6" | "hr" | "i" | "ins" | "li" | "mark" | "p" | "pre" | "q" | "s"
        | "small" | "span" | "strong" | "sub" | "sup" | "table" | "tbody" | "tfoot"
        | "thead" | "tr" | "u" | "ul" => &[],
        _ => return None,
    })
}

fn is_url_attr(name: &str) -> bool {
    matches!(name, "href" | "src")
}

fn is_safe_url(value: &str) -> bool {
    let value = value.trim();
    match value.split_once(':') {
        Some((scheme, _)) if !scheme.contains(['/', '?', '#']) => matches!(
            scheme.to_ascii_lowercase().as_str(),
            "http" | "https" | "mailto" | "tel"
        ),
        _ => true,
    }
}

fn write_children(out: &mut String, element: ElementRef) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(&html_escape::encode_text(&**text));
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(out, child);
                }
            }
            _ => {}
        }
    }
}

fn write_element(out: &mut String, element: ElementRef) {
    let tag = element.value().name();
    if DROPPED_TAGS.contains(&tag) {
        return;
    }
    let Some(attrs) = allowed_attrs(tag) else {
        write_children(out, element);
        return;
    };
    out.push('<');
    out.push_str(tag);
    for (name, value) in element.value().attrs() {
        if !(attrs.contains(&name) || GLOBAL_ATTRS.contains(&name)) {
            continue;
        }
        if is_url_attr(name) && !is_safe_url(value) {
            continue;
        }
        write!(
            out,
            " {name}=\"{}\"",
            html_escape::encode_double_quoted_attribute(value)
        )
        .ok();
    }
    out.push('>');
    if VOID_TAGS.contains(&tag) {
        return;
    }
    write_children(out, element);
    write!(out, "</{tag}>").ok();
}

/// Keep the permitted HTML subset of `input`.
pub fn sanitize(input: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(input);
    let mut out = String::with_capacity(input.len());
    write_children(&mut out, fragment.root_element());
    out.trim().to_owned()
}

/// Remove all markup and collapse whitespace.
pub fn strip_tags(input: &str) -> String {
    if !input.contains(['<', '&']) {
        return input.split_whitespace().join(" ");
    }
    let fragment = Html::parse_fragment(input);
    let mut text = String::new();
    collect_text(&mut text, fragment.root_element());
    text.split_whitespace().join(" ")
}

fn collect_text(out: &mut String, element: ElementRef) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if !DROPPED_TAGS.contains(&el.name()) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(out, child);
                }
                if matches!(el.name(), "br" | "p" | "div" | "li") {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}
