use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ═══════════════════════════════════════════════════════════════════════════════
// FINDING CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const MISSING_REQUIRED_INPUT: &str = "MI001";
pub const MISSING_CONDITIONAL_INPUT: &str = "MI002";

fn get_guarantee(code: &str) -> &'static str {
    match code {
        MISSING_REQUIRED_INPUT => "Every usage supplies the inputs its component marks as required.",
        MISSING_CONDITIONAL_INPUT => {
            "Every usage supplies the inputs whose requiredness condition holds for that usage."
        }
        _ => "Unknown finding.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE POSITIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// 1-based line and column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// Byte range into a source file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpan {
    pub start: u32,
    pub end: u32,
}

impl SourceSpan {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// Maps byte offsets of one file to line/column pairs.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self { line_starts }
    }

    pub fn location(&self, offset: u32) -> SourceLocation {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        SourceLocation {
            line: line as u32 + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE TREE
// ═══════════════════════════════════════════════════════════════════════════════

/// An element as written in template source. Names keep their source casing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateElement {
    pub tag: String,
    /// Raw attribute names, e.g. `[(value)]`, `(click)`, `title`.
    pub attributes: Vec<String>,
    /// Opening tag, relative to the template text.
    pub span: SourceSpan,
    pub children: Vec<TemplateElement>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// OBSERVATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// One template tag instantiating (possibly) a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementUsage {
    pub source_file: String,
    pub tag_name: String,
    pub span: SourceSpan,
    pub location: SourceLocation,
    /// Public input names bound or set on the element.
    pub supplied_names: HashSet<String>,
}

impl ElementUsage {
    pub fn new(
        source_file: impl Into<String>,
        tag_name: impl Into<String>,
        span: SourceSpan,
        location: SourceLocation,
        supplied_names: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            tag_name: tag_name.into(),
            span,
            location,
            supplied_names: supplied_names.into_iter().collect(),
        }
    }
}

/// Where an input was declared. Only used to enrich findings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationHandle {
    pub file: String,
    pub span: SourceSpan,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Requiredness {
    Static(bool),
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDeclaration {
    /// Member name on the component class.
    pub name: String,
    /// Public binding name; equals `name` unless the decorator renames it.
    pub alias: String,
    pub requiredness: Requiredness,
    #[serde(default)]
    pub declaration: DeclarationHandle,
}

impl InputDeclaration {
    pub fn new(name: impl Into<String>, requiredness: Requiredness) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            requiredness,
            declaration: DeclarationHandle::default(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn with_declaration(mut self, declaration: DeclarationHandle) -> Self {
        self.declaration = declaration;
        self
    }
}

/// The complete input list of one component, keyed by its element selector.
/// Input order fixes the presence-vector layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDeclaration {
    pub tag_name: String,
    pub inputs: Vec<InputDeclaration>,
}

impl ComponentDeclaration {
    pub fn new(tag_name: impl Into<String>, inputs: Vec<InputDeclaration>) -> Self {
        Self {
            tag_name: tag_name.into(),
            inputs,
        }
    }

    pub fn input_names(&self) -> Vec<String> {
        self.inputs.iter().map(|i| i.name.clone()).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FINDING
// ═══════════════════════════════════════════════════════════════════════════════

/// A usage site that omits a required input. Anchored at the usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi_derive::napi(object))]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub code: String,
    pub message: String,
    pub guarantee: String,
    pub component: String,
    pub input: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub start: u32,
    pub end: u32,
    pub hints: Vec<String>,
}

impl Finding {
    pub fn at_usage(
        code: &str,
        message: String,
        component: &str,
        input: &str,
        usage: &ElementUsage,
        hints: Vec<String>,
    ) -> Self {
        Finding {
            code: code.to_string(),
            message,
            guarantee: get_guarantee(code).to_string(),
            component: component.to_string(),
            input: input.to_string(),
            file: usage.source_file.clone(),
            line: usage.location.line,
            column: usage.location.column,
            start: usage.span.start,
            end: usage.span.end,
            hints,
        }
    }
}
