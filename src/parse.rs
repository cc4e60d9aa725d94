//! Template Parse Module
//!
//! Turns template markup into [`ElementUsage`] observations. html5ever
//! decides which tags are real elements; names and positions are re-read from
//! the original source because html5ever lowercases names and keeps no
//! offsets.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;

use crate::error::AnalysisError;
use crate::validate::{ElementUsage, LineIndex, SourceSpan, TemplateElement};
use crate::visitor::walk_elements;

/// Marker attribute carrying the byte offset of an opening tag.
const OFFSET_ATTR: &str = "data-mic-at";

lazy_static! {
    static ref TAG_OPEN_RE: Regex = Regex::new(r"<([A-Za-z][A-Za-z0-9_.:\-]*)(\s|/|>)").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE PRE-PASS
// ═══════════════════════════════════════════════════════════════════════════════

/// Tag every opening tag with its source offset so positions survive parsing.
/// The value is unquoted so markers landing inside quoted attribute values
/// cannot terminate them.
fn mark_tag_offsets(html: &str) -> String {
    TAG_OPEN_RE
        .replace_all(html, |caps: &regex::Captures| {
            let offset = caps.get(0).map_or(0, |m| m.start());
            format!("<{} {}={} {}", &caps[1], OFFSET_ATTR, offset, &caps[2])
        })
        .to_string()
}

/// Tag name and attribute names of the opening tag at `offset`, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScannedTag {
    name: String,
    attributes: Vec<String>,
    end: usize,
}

fn scan_tag(source: &str, offset: usize) -> Option<ScannedTag> {
    let bytes = source.as_bytes();
    if bytes.get(offset) != Some(&b'<') {
        return None;
    }

    let is_space = |b: u8| b.is_ascii_whitespace();
    let mut i = offset + 1;

    let name_start = i;
    while i < bytes.len() && !is_space(bytes[i]) && bytes[i] != b'>' && bytes[i] != b'/' {
        i += 1;
    }
    let name = source[name_start..i].to_string();
    if name.is_empty() {
        return None;
    }

    let mut attributes = Vec::new();
    loop {
        while i < bytes.len() && is_space(bytes[i]) {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        if bytes[i] == b'>' {
            i += 1;
            break;
        }
        if bytes[i] == b'/' {
            i += 1;
            continue;
        }

        let attr_start = i;
        while i < bytes.len()
            && !is_space(bytes[i])
            && bytes[i] != b'='
            && bytes[i] != b'>'
            && !(bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>'))
        {
            i += 1;
        }
        if i == attr_start {
            // stray '='
            i += 1;
            continue;
        }
        attributes.push(source[attr_start..i].to_string());

        while i < bytes.len() && is_space(bytes[i]) {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && is_space(bytes[i]) {
                i += 1;
            }
            match bytes.get(i) {
                Some(&quote) if quote == b'"' || quote == b'\'' => {
                    i += 1;
                    while i < bytes.len() && bytes[i] != quote {
                        i += 1;
                    }
                    i += 1;
                }
                _ => {
                    while i < bytes.len() && !is_space(bytes[i]) && bytes[i] != b'>' {
                        i += 1;
                    }
                }
            }
        }
    }

    Some(ScannedTag {
        name,
        attributes,
        end: i.min(bytes.len()),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINDING NAMES
// ═══════════════════════════════════════════════════════════════════════════════

/// The input an attribute supplies, if any.
///
/// `foo`, `[foo]`, `[(foo)]`, `bind-foo` and `bindon-foo` supply `foo`.
/// Event, structural, reference, animation and `attr.`/`class.`/`style.`
/// bindings supply nothing.
pub fn supplied_input_name(attribute: &str) -> Option<String> {
    let name = if let Some(inner) = attribute
        .strip_prefix("[(")
        .and_then(|rest| rest.strip_suffix(")]"))
    {
        inner
    } else if let Some(inner) = attribute
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        if ["attr.", "class.", "style.", "@"]
            .iter()
            .any(|prefix| inner.starts_with(prefix))
        {
            return None;
        }
        inner
    } else if let Some(inner) = attribute.strip_prefix("bindon-") {
        inner
    } else if let Some(inner) = attribute.strip_prefix("bind-") {
        inner
    } else {
        let non_input = ['(', '*', '#', '@', '['];
        if attribute.starts_with(non_input)
            || ["on-", "ref-", "let-"]
                .iter()
                .any(|prefix| attribute.starts_with(prefix))
            || attribute == OFFSET_ATTR
        {
            return None;
        }
        attribute
    };

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREE BUILDING
// ═══════════════════════════════════════════════════════════════════════════════

fn collect_elements(handle: &Handle, source: &str, out: &mut Vec<TemplateElement>) {
    match &handle.data {
        NodeData::Document => {
            for child in handle.children.borrow().iter() {
                collect_elements(child, source, out);
            }
        }
        NodeData::Element {
            attrs,
            template_contents,
            ..
        } => {
            let offset = attrs
                .borrow()
                .iter()
                .find(|attr| attr.name.local.to_string() == OFFSET_ATTR)
                .and_then(|attr| attr.value.to_string().parse::<usize>().ok());

            let mut children = Vec::new();
            for child in handle.children.borrow().iter() {
                collect_elements(child, source, &mut children);
            }
            if let Some(contents) = template_contents.borrow().as_ref() {
                for child in contents.children.borrow().iter() {
                    collect_elements(child, source, &mut children);
                }
            }

            match offset.and_then(|o| scan_tag(source, o).map(|tag| (o, tag))) {
                Some((start, tag)) => out.push(TemplateElement {
                    tag: tag.name,
                    attributes: tag.attributes,
                    span: SourceSpan::new(start as u32, tag.end as u32),
                    children,
                }),
                // Implied by the parser (html/head/body): keep only the children.
                None => out.extend(children),
            }
        }
        _ => {}
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN PARSING FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse template markup into a tree of source elements.
pub fn parse_template(source: &str, file_path: &str) -> Result<Vec<TemplateElement>, AnalysisError> {
    let marked = mark_tag_offsets(source);

    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut marked.as_bytes())
        .map_err(|e| AnalysisError::io(file_path, e))?;

    let mut elements = Vec::new();
    collect_elements(&dom.document, source, &mut elements);
    Ok(elements)
}

/// Usage observations for every element of a template embedded at
/// `base_offset` in `source_file`, whose full text `lines` indexes.
pub fn extract_usages(
    source_file: &str,
    template: &str,
    base_offset: u32,
    lines: &LineIndex,
) -> Result<Vec<ElementUsage>, AnalysisError> {
    let elements = parse_template(template, source_file)?;

    let mut usages = Vec::new();
    walk_elements(&elements, &mut |element| {
        let span = SourceSpan::new(
            base_offset + element.span.start,
            base_offset + element.span.end,
        );
        usages.push(ElementUsage::new(
            source_file,
            element.tag.clone(),
            span,
            lines.location(span.start),
            element
                .attributes
                .iter()
                .filter_map(|attr| supplied_input_name(attr)),
        ));
    });

    Ok(usages)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn usages_of(template: &str) -> Vec<ElementUsage> {
        extract_usages("t.html", template, 0, &LineIndex::new(template)).unwrap()
    }

    #[test]
    fn test_mark_tag_offsets() {
        let marked = mark_tag_offsets("<a>x</a><br/>");
        assert_eq!(marked, "<a data-mic-at=0 >x</a><br data-mic-at=8 />");
    }

    #[test]
    fn test_scan_tag_preserves_case() {
        let src = r#"<my-widget [fooBar]="x > 1" (valueChange)='y' disabled/>"#;
        let tag = scan_tag(src, 0).unwrap();
        assert_eq!(tag.name, "my-widget");
        assert_eq!(tag.attributes, vec!["[fooBar]", "(valueChange)", "disabled"]);
        assert_eq!(tag.end, src.len());
    }

    #[test]
    fn test_supplied_input_name() {
        let cases = [
            ("foo", Some("foo")),
            ("[foo]", Some("foo")),
            ("[(foo)]", Some("foo")),
            ("bind-foo", Some("foo")),
            ("bindon-foo", Some("foo")),
            ("(foo)", None),
            ("on-foo", None),
            ("*ngIf", None),
            ("#ref", None),
            ("ref-x", None),
            ("let-item", None),
            ("@fade", None),
            ("[@fade]", None),
            ("[attr.aria-label]", None),
            ("[class.active]", None),
            ("[style.width]", None),
            ("[]", None),
        ];
        for (attr, expected) in cases {
            assert_eq!(
                supplied_input_name(attr).as_deref(),
                expected,
                "attribute {attr}"
            );
        }
    }

    #[test]
    fn test_extract_usages_in_document_order() {
        let template = "<div>\n  <foobar [foo]=\"42\"></foobar>\n  <app-item title=\"x\"><foobar></foobar></app-item>\n</div>";
        let usages = usages_of(template);
        let tags: Vec<&str> = usages.iter().map(|u| u.tag_name.as_str()).collect();
        assert_eq!(tags, vec!["div", "foobar", "app-item", "foobar"]);

        assert!(usages[1].supplied_names.contains("foo"));
        assert_eq!(usages[1].location.line, 2);
        assert_eq!(usages[1].location.column, 3);
        assert!(usages[3].supplied_names.is_empty());
        assert_eq!(usages[3].location.line, 3);
    }

    #[test]
    fn test_camel_case_binding_survives() {
        let usages = usages_of(r#"<foobar [fooBar]="1" [(isOpen)]="open"></foobar>"#);
        assert_eq!(usages.len(), 1);
        assert!(usages[0].supplied_names.contains("fooBar"));
        assert!(usages[0].supplied_names.contains("isOpen"));
        assert!(!usages[0].supplied_names.contains(OFFSET_ATTR));
    }

    #[test]
    fn test_comments_and_attribute_text_are_not_usages() {
        let usages = usages_of(
            r#"<!-- <foobar></foobar> --><p title="<foobar >">hi</p><textarea><foobar></foobar></textarea>"#,
        );
        let tags: Vec<&str> = usages.iter().map(|u| u.tag_name.as_str()).collect();
        assert_eq!(tags, vec!["p", "textarea"]);
    }

    #[test]
    fn test_template_contents_are_traversed() {
        let usages = usages_of("<template><foobar></foobar></template>");
        let tags: Vec<&str> = usages.iter().map(|u| u.tag_name.as_str()).collect();
        assert_eq!(tags, vec!["template", "foobar"]);
    }

    #[test]
    fn test_base_offset_shifts_positions() {
        let file = "const x = `\n<foobar></foobar>`;";
        let template = "\n<foobar></foobar>";
        let usages = extract_usages("x.ts", template, 11, &LineIndex::new(file)).unwrap();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].span.start, 12);
        assert_eq!(usages[0].location.line, 2);
    }
}
