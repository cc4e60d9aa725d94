use crate::validate::TemplateElement;

/// Walks a template element tree in document order (pre-order), handing each
/// element to `on_element`.
///
/// This is the only traversal of template trees; callers supply behaviour as a
/// closure instead of overriding a walker.
pub fn walk_elements<'t, F>(elements: &'t [TemplateElement], on_element: &mut F)
where
    F: FnMut(&'t TemplateElement),
{
    for element in elements {
        on_element(element);
        walk_elements(&element.children, on_element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::SourceSpan;

    fn element(tag: &str, children: Vec<TemplateElement>) -> TemplateElement {
        TemplateElement {
            tag: tag.to_string(),
            attributes: vec![],
            span: SourceSpan::default(),
            children,
        }
    }

    #[test]
    fn test_walk_is_document_order() {
        let tree = vec![
            element("a", vec![element("b", vec![element("c", vec![])])]),
            element("d", vec![]),
        ];
        let mut seen = Vec::new();
        walk_elements(&tree, &mut |el| seen.push(el.tag.as_str()));
        assert_eq!(seen, vec!["a", "b", "c", "d"]);
    }
}
