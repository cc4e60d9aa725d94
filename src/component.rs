//! Component declaration collaborator.
//!
//! Parses TypeScript sources with oxc and turns every `@Component` /
//! `@Directive` class into analysis events: usages from its inline template,
//! one [`InputMember`] per `@Input` member, then a class-end marker.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    CallExpression, Class, ClassElement, Decorator, Expression, MethodDefinitionKind,
    ObjectExpression, PropertyKey,
};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::parse::extract_usages;
use crate::session::{AnalysisEvent, InputMember};
use crate::validate::{DeclarationHandle, LineIndex, SourceSpan};

lazy_static! {
    static ref ELEMENT_SELECTOR_RE: Regex = Regex::new(r"^[a-zA-Z][\w-]*$").unwrap();
}

const COMPONENT_DECORATORS: [&str; 2] = ["Component", "Directive"];

// ═══════════════════════════════════════════════════════════════════════════════
// DECORATOR METADATA
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct ComponentMeta {
    selectors: Vec<String>,
    /// Inline template text and its byte offset in the file.
    template: Option<(String, u32)>,
}

#[derive(Debug, Default)]
struct InputOptions {
    alias: Option<String>,
    required: bool,
}

fn decorator_call<'b, 'a>(
    decorators: &'b [Decorator<'a>],
    names: &[&str],
) -> Option<&'b CallExpression<'a>> {
    decorators.iter().find_map(|decorator| match &decorator.expression {
        Expression::CallExpression(call) => match &call.callee {
            Expression::Identifier(id) if names.contains(&id.name.as_str()) => Some(&**call),
            _ => None,
        },
        _ => None,
    })
}

fn first_object_argument<'b, 'a>(call: &'b CallExpression<'a>) -> Option<&'b ObjectExpression<'a>> {
    match call.arguments.first()?.as_expression()? {
        Expression::ObjectExpression(obj) => Some(&**obj),
        _ => None,
    }
}

fn object_property<'b, 'a>(obj: &'b ObjectExpression<'a>, name: &str) -> Option<&'b Expression<'a>> {
    obj.properties.iter().find_map(|prop| match prop {
        oxc_ast::ast::ObjectPropertyKind::ObjectProperty(p)
            if p.key.static_name().is_some_and(|key| key == name) =>
        {
            Some(&p.value)
        }
        _ => None,
    })
}

/// Text of a string literal or an interpolation-free template literal,
/// exactly as written, with the offset of its first character.
fn literal_text(expr: &Expression, source: &str) -> Option<(String, u32)> {
    let span = match expr {
        Expression::StringLiteral(lit) => lit.span,
        Expression::TemplateLiteral(tpl) if tpl.expressions.is_empty() => tpl.span,
        _ => return None,
    };
    let start = span.start + 1;
    let end = span.end.checked_sub(1)?;
    source
        .get(start as usize..end as usize)
        .map(|text| (text.to_string(), start))
}

/// Decodes template escapes without changing the text's width, so offsets
/// into the result stay offsets into the literal. Two-byte escapes become the
/// escaped character padded with a space; longer ones are left as written.
fn decode_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let decoded = match chars.peek() {
            Some('n') => Some('\n'),
            Some('r') => Some('\r'),
            Some('t') => Some('\t'),
            Some(&other @ ('\'' | '"' | '`' | '\\' | '/' | '\n')) => Some(other),
            _ => None,
        };
        match decoded {
            Some(ch) => {
                chars.next();
                out.push(ch);
                out.push(' ');
            }
            None => out.push(c),
        }
    }
    out
}

fn component_meta(call: &CallExpression, source: &str) -> ComponentMeta {
    let Some(options) = first_object_argument(call) else {
        return ComponentMeta::default();
    };

    let selectors = object_property(options, "selector")
        .and_then(|expr| literal_text(expr, source))
        .map(|(text, _)| {
            text.split(',')
                .map(str::trim)
                .filter(|s| ELEMENT_SELECTOR_RE.is_match(s))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ComponentMeta {
        selectors,
        template: object_property(options, "template")
            .and_then(|expr| literal_text(expr, source))
            .map(|(text, offset)| (decode_escapes(&text), offset)),
    }
}

fn input_options(call: &CallExpression, source: &str) -> InputOptions {
    let Some(arg) = call.arguments.first().and_then(|a| a.as_expression()) else {
        return InputOptions::default();
    };
    match arg {
        Expression::ObjectExpression(obj) => InputOptions {
            alias: object_property(obj, "alias")
                .and_then(|expr| literal_text(expr, source))
                .map(|(text, _)| text),
            required: matches!(
                object_property(obj, "required"),
                Some(Expression::BooleanLiteral(b)) if b.value
            ),
        },
        other => InputOptions {
            alias: literal_text(other, source).map(|(text, _)| text),
            required: false,
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASS WALKER
// ═══════════════════════════════════════════════════════════════════════════════

struct ComponentCollector<'s> {
    file_path: &'s str,
    source: &'s str,
    lines: LineIndex,
    comments: Vec<Span>,
    events: Vec<AnalysisEvent>,
    error: Option<AnalysisError>,
}

impl<'s> ComponentCollector<'s> {
    fn has_newline(&self, start: u32, end: u32) -> bool {
        self.source
            .get(start as usize..end as usize)
            .is_some_and(|between| between.contains('\n'))
    }

    fn comment_text(&self, span: Span) -> &'s str {
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or("")
    }

    /// Comments before the member name (and after the previous member's line)
    /// plus comments trailing the member on its last line.
    fn member_comments(
        &self,
        prev_end: Option<u32>,
        region_start: u32,
        key_start: u32,
        member_end: u32,
        next_start: u32,
    ) -> String {
        let leading = self.comments.iter().filter(|c| {
            c.start >= region_start
                && c.end <= key_start
                && prev_end.map_or(true, |end| self.has_newline(end, c.start))
        });
        let trailing = self.comments.iter().filter(|c| {
            c.start >= member_end && c.end <= next_start && !self.has_newline(member_end, c.start)
        });
        leading
            .chain(trailing)
            .map(|c| self.comment_text(*c))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn collect_class(&mut self, class: &Class) {
        let Some(call) = decorator_call(&class.decorators[..], &COMPONENT_DECORATORS) else {
            return;
        };
        let meta = component_meta(call, self.source);
        let class_name = class.id.as_ref().map(|id| id.name.to_string());
        debug!(
            file = self.file_path,
            class = class_name.as_deref().unwrap_or("<anonymous>"),
            selectors = ?meta.selectors,
            "component class"
        );

        if let Some((template, offset)) = &meta.template {
            match extract_usages(self.file_path, template, *offset, &self.lines) {
                Ok(usages) => self
                    .events
                    .extend(usages.into_iter().map(AnalysisEvent::ElementVisited)),
                Err(e) => {
                    self.error.get_or_insert(e);
                }
            }
        }

        let elements = &class.body.body;
        let mut prev_end = None;
        let mut region_start = class.body.span.start + 1;
        for (i, element) in elements.iter().enumerate() {
            let span = element.span();
            let next_start = elements
                .get(i + 1)
                .map_or(class.body.span.end, |next| next.span().start);

            if let Some((decorators, key, has_default)) = input_candidate(element) {
                if let (Some(input), Some(name)) = (
                    decorator_call(decorators, &["Input"]),
                    key.static_name(),
                ) {
                    let options = input_options(input, self.source);
                    let key_span = key.span();
                    let comment_text = self.member_comments(
                        prev_end,
                        region_start,
                        key_span.start,
                        span.end,
                        next_start,
                    );
                    self.events.push(AnalysisEvent::InputMemberVisited(InputMember {
                        class_name: class_name.clone(),
                        selectors: meta.selectors.clone(),
                        member_name: name.to_string(),
                        alias: options.alias,
                        comment_text,
                        has_default,
                        decorator_required: options.required,
                        declaration: DeclarationHandle {
                            file: self.file_path.to_string(),
                            span: SourceSpan::new(key_span.start, key_span.end),
                            location: self.lines.location(key_span.start),
                        },
                    }));
                }
            }

            prev_end = Some(span.end);
            region_start = span.end;
        }

        self.events.push(AnalysisEvent::ClassEnd);
    }
}

/// Decorators, key and default-value presence of members that can carry `@Input`.
fn input_candidate<'b, 'a>(
    element: &'b ClassElement<'a>,
) -> Option<(&'b [Decorator<'a>], &'b PropertyKey<'a>, bool)> {
    match element {
        ClassElement::PropertyDefinition(p) => Some((&p.decorators[..], &p.key, p.value.is_some())),
        ClassElement::AccessorProperty(a) => Some((&a.decorators[..], &a.key, a.value.is_some())),
        ClassElement::MethodDefinition(m) if m.kind == MethodDefinitionKind::Set => {
            Some((&m.decorators[..], &m.key, false))
        }
        _ => None,
    }
}

impl<'a, 's> Visit<'a> for ComponentCollector<'s> {
    fn visit_class(&mut self, class: &Class<'a>) {
        self.collect_class(class);
        oxc_ast_visit::walk::walk_class(self, class);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Events for one TypeScript file, terminated by [`AnalysisEvent::FileEnd`].
/// A file the parser gives up on contributes nothing but the terminator.
pub fn extract_component_events(
    file_path: &str,
    source: &str,
) -> Result<Vec<AnalysisEvent>, AnalysisError> {
    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_typescript(true)
        .with_module(true);
    let ret = Parser::new(&allocator, source, source_type).parse();

    if ret.panicked {
        warn!(file = file_path, errors = ret.errors.len(), "unparseable source skipped");
        return Ok(vec![AnalysisEvent::FileEnd]);
    }
    if !ret.errors.is_empty() {
        debug!(file = file_path, errors = ret.errors.len(), "recovered from parse errors");
    }

    let mut collector = ComponentCollector {
        file_path,
        source,
        lines: LineIndex::new(source),
        comments: ret.program.comments.iter().map(|c| c.span).collect(),
        events: Vec::new(),
        error: None,
    };
    collector.visit_program(&ret.program);

    if let Some(e) = collector.error {
        return Err(e);
    }
    collector.events.push(AnalysisEvent::FileEnd);
    Ok(collector.events)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
