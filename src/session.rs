//! Analysis session: the event sink the collaborators feed.
//!
//! Usage events go straight to the [`TagRegistry`]. Input-member events are
//! buffered per class by the [`DeclarationAggregator`] and handed over as one
//! [`ComponentDeclaration`] when the class (or, failing that, the file) ends.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CheckOptions, RequirednessMode};
use crate::error::AnalysisError;
use crate::registry::{SkipList, TagRegistry};
use crate::validate::{
    ComponentDeclaration, DeclarationHandle, ElementUsage, Finding, InputDeclaration, Requiredness,
};

lazy_static! {
    static ref MARKER_RE: Regex = Regex::new(r"(?:^|[^\w@.])@(required|optional)\b").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// One `@Input` member of a component class, with its raw requiredness evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputMember {
    pub class_name: Option<String>,
    /// Element selectors of the enclosing class.
    pub selectors: Vec<String>,
    pub member_name: String,
    pub alias: Option<String>,
    /// Leading and trailing comment text of the member.
    #[serde(default)]
    pub comment_text: String,
    #[serde(default)]
    pub has_default: bool,
    /// The decorator options set `required: true`.
    #[serde(default)]
    pub decorator_required: bool,
    #[serde(default)]
    pub declaration: DeclarationHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AnalysisEvent {
    ElementVisited(ElementUsage),
    InputMemberVisited(InputMember),
    ClassEnd,
    FileEnd,
}

// ═══════════════════════════════════════════════════════════════════════════════
// REQUIREDNESS RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
enum Marker {
    Required,
    RequiredWhen(String),
    Optional,
}

/// Index one past the `)` matching the `(` at `start`, if balanced.
fn find_balanced_paren_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[start..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn scan_marker(comment_text: &str) -> Option<Marker> {
    let caps = MARKER_RE.captures(comment_text)?;
    if &caps[1] == "optional" {
        return Some(Marker::Optional);
    }

    let rest = &comment_text[caps.get(0)?.end()..];
    let trimmed = rest.trim_start();
    if !trimmed.starts_with('(') {
        return Some(Marker::Required);
    }

    let open = rest.len() - trimmed.len();
    let expression = match find_balanced_paren_end(rest, open) {
        Some(end) => join_comment_lines(&rest[open + 1..end - 1]),
        // Unbalanced: keep the raw text so compilation reports it.
        None => trimmed.lines().next().unwrap_or("").trim().to_string(),
    };

    if expression.is_empty() {
        Some(Marker::Required)
    } else {
        Some(Marker::RequiredWhen(expression))
    }
}

/// Join an expression that wraps across comment lines, dropping the `*` or
/// `//` continuation prefix of every line after the first.
fn join_comment_lines(text: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| {
            let line = line.trim();
            if i == 0 {
                line
            } else {
                line.trim_start_matches(['*', '/']).trim_start()
            }
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decide an input's requiredness: comment marker, then the decorator's
/// `required` flag, then the mode default.
pub fn resolve_requiredness(member: &InputMember, mode: RequirednessMode) -> Requiredness {
    match scan_marker(&member.comment_text) {
        Some(Marker::Required) => Requiredness::Static(true),
        Some(Marker::RequiredWhen(expr)) => Requiredness::Expression(expr),
        Some(Marker::Optional) => Requiredness::Static(false),
        None if member.decorator_required => Requiredness::Static(true),
        None => match mode {
            RequirednessMode::Tagged => Requiredness::Static(false),
            RequirednessMode::AllWithoutDefaults => Requiredness::Static(!member.has_default),
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECLARATION AGGREGATOR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct PendingClass {
    file: String,
    class_name: Option<String>,
    selectors: Vec<String>,
    inputs: Vec<InputDeclaration>,
}

impl PendingClass {
    fn owns(&self, member: &InputMember) -> bool {
        self.file == member.declaration.file
            && self.class_name == member.class_name
            && self.selectors == member.selectors
    }
}

/// Buffers the inputs of the class currently being visited.
#[derive(Debug)]
pub struct DeclarationAggregator {
    mode: RequirednessMode,
    current: Option<PendingClass>,
}

impl DeclarationAggregator {
    pub fn new(mode: RequirednessMode) -> Self {
        Self {
            mode,
            current: None,
        }
    }

    pub fn pending_inputs(&self) -> usize {
        self.current.as_ref().map_or(0, |c| c.inputs.len())
    }

    /// Append one input. A member of a different class first flushes the
    /// previous class, which tolerates a missing class-end signal.
    pub fn add_member(
        &mut self,
        member: InputMember,
        registry: &mut TagRegistry,
    ) -> Result<Vec<Finding>, AnalysisError> {
        let mut findings = Vec::new();
        if self.current.as_ref().is_some_and(|c| !c.owns(&member)) {
            findings = self.flush(registry)?;
        }

        let requiredness = resolve_requiredness(&member, self.mode);
        let current = self.current.get_or_insert_with(|| PendingClass {
            file: member.declaration.file.clone(),
            class_name: member.class_name.clone(),
            selectors: member.selectors.clone(),
            inputs: Vec::new(),
        });

        let alias = member
            .alias
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| member.member_name.clone());
        current.inputs.push(
            InputDeclaration::new(member.member_name, requiredness)
                .with_alias(alias)
                .with_declaration(member.declaration),
        );

        Ok(findings)
    }

    /// Emit the buffered class, one declaration per element selector.
    pub fn flush(&mut self, registry: &mut TagRegistry) -> Result<Vec<Finding>, AnalysisError> {
        let Some(pending) = self.current.take() else {
            return Ok(Vec::new());
        };
        if pending.inputs.is_empty() {
            return Ok(Vec::new());
        }
        if pending.selectors.is_empty() {
            debug!(
                class = pending.class_name.as_deref().unwrap_or("<anonymous>"),
                "class has inputs but no element selector; not tracked"
            );
            return Ok(Vec::new());
        }

        let mut findings = Vec::new();
        for selector in &pending.selectors {
            let decl = ComponentDeclaration::new(selector.clone(), pending.inputs.clone());
            findings.extend(registry.observe_declaration(decl)?);
        }
        Ok(findings)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Owns all per-run state. One session per analysis run.
#[derive(Debug)]
pub struct AnalysisSession {
    registry: TagRegistry,
    aggregator: DeclarationAggregator,
    findings: Vec<Finding>,
}

impl AnalysisSession {
    pub fn new(options: &CheckOptions) -> Self {
        Self {
            registry: TagRegistry::new(SkipList::new(options.skip_tags.iter().cloned())),
            aggregator: DeclarationAggregator::new(options.mode),
            findings: Vec::new(),
        }
    }

    pub fn dispatch(&mut self, event: AnalysisEvent) -> Result<(), AnalysisError> {
        match event {
            AnalysisEvent::ElementVisited(usage) => {
                self.on_element_visited(usage);
                Ok(())
            }
            AnalysisEvent::InputMemberVisited(member) => self.on_input_member_visited(member),
            AnalysisEvent::ClassEnd => self.on_class_end(),
            AnalysisEvent::FileEnd => self.on_file_end(),
        }
    }

    pub fn on_element_visited(&mut self, usage: ElementUsage) {
        let found = self.registry.observe_usage(usage);
        self.findings.extend(found);
    }

    pub fn on_input_member_visited(&mut self, member: InputMember) -> Result<(), AnalysisError> {
        let found = self.aggregator.add_member(member, &mut self.registry)?;
        self.findings.extend(found);
        Ok(())
    }

    pub fn on_class_end(&mut self) -> Result<(), AnalysisError> {
        let found = self.aggregator.flush(&mut self.registry)?;
        self.findings.extend(found);
        Ok(())
    }

    pub fn on_file_end(&mut self) -> Result<(), AnalysisError> {
        self.on_class_end()
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Flush any unfinished class and return all findings in report order.
    pub fn finish(mut self) -> Result<Vec<Finding>, AnalysisError> {
        self.on_file_end()?;
        Ok(self.findings)
    }
}

/// Run a complete event stream through a fresh session.
pub fn analyze_events(
    options: &CheckOptions,
    events: impl IntoIterator<Item = AnalysisEvent>,
) -> Result<Vec<Finding>, AnalysisError> {
    let mut session = AnalysisSession::new(options);
    for event in events {
        session.dispatch(event)?;
    }
    session.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{SourceLocation, SourceSpan};

    fn member(name: &str, comment: &str, has_default: bool) -> InputMember {
        InputMember {
            class_name: Some("FoobarComponent".to_string()),
            selectors: vec!["foobar".to_string()],
            member_name: name.to_string(),
            alias: None,
            comment_text: comment.to_string(),
            has_default,
            decorator_required: false,
            declaration: DeclarationHandle {
                file: "foobar.component.ts".to_string(),
                ..Default::default()
            },
        }
    }

    fn usage(supplied: &[&str]) -> AnalysisEvent {
        AnalysisEvent::ElementVisited(ElementUsage::new(
            "app.html",
            "foobar",
            SourceSpan::new(10, 18),
            SourceLocation { line: 2, column: 5 },
            supplied.iter().map(|s| s.to_string()),
        ))
    }

    #[test]
    fn test_scan_marker() {
        assert_eq!(scan_marker("/** plain docs */"), None);
        assert_eq!(scan_marker("/** @required */"), Some(Marker::Required));
        assert_eq!(scan_marker("// @required()"), Some(Marker::Required));
        assert_eq!(scan_marker("// @optional"), Some(Marker::Optional));
        assert_eq!(
            scan_marker("/** Size. @required(!(a && b)) */"),
            Some(Marker::RequiredWhen("!(a && b)".to_string()))
        );
        assert_eq!(
            scan_marker("// @required (!bar) see docs (v2)"),
            Some(Marker::RequiredWhen("!bar".to_string()))
        );
        assert_eq!(
            scan_marker("// @required(!bar"),
            Some(Marker::RequiredWhen("(!bar".to_string()))
        );
        assert_eq!(scan_marker("// @requiredness"), None);
    }

    #[test]
    fn test_marker_inside_word_is_ignored() {
        assert_eq!(scan_marker("/** mail ops@required.example.com */"), None);
        assert_eq!(scan_marker("/** see pkg.@optional */"), None);
        assert_eq!(scan_marker("/**@required*/"), Some(Marker::Required));
        assert_eq!(
            scan_marker("/** Contact ops@required.example.com.\n * @optional */"),
            Some(Marker::Optional)
        );
    }

    #[test]
    fn test_wrapped_expression_drops_continuation_prefixes() {
        assert_eq!(
            scan_marker("/**\n   * Shown when empty. @required(!a &&\n   *   !b)\n   */"),
            Some(Marker::RequiredWhen("!a && !b".to_string()))
        );
        assert_eq!(
            scan_marker("// @required(a ||\n// b)"),
            Some(Marker::RequiredWhen("a || b".to_string()))
        );
    }

    #[test]
    fn test_tagged_mode() {
        let mode = RequirednessMode::Tagged;
        assert_eq!(
            resolve_requiredness(&member("foo", "", false), mode),
            Requiredness::Static(false)
        );
        assert_eq!(
            resolve_requiredness(&member("foo", "/** @required */", true), mode),
            Requiredness::Static(true)
        );

        let mut flagged = member("foo", "", false);
        flagged.decorator_required = true;
        assert_eq!(resolve_requiredness(&flagged, mode), Requiredness::Static(true));
    }

    #[test]
    fn test_all_without_defaults_mode() {
        let mode = RequirednessMode::AllWithoutDefaults;
        assert_eq!(
            resolve_requiredness(&member("foo", "", false), mode),
            Requiredness::Static(true)
        );
        assert_eq!(
            resolve_requiredness(&member("foo", "", true), mode),
            Requiredness::Static(false)
        );
        assert_eq!(
            resolve_requiredness(&member("foo", "// @required", true), mode),
            Requiredness::Static(true)
        );
        assert_eq!(
            resolve_requiredness(&member("foo", "// @optional", false), mode),
            Requiredness::Static(false)
        );
        assert_eq!(
            resolve_requiredness(&member("foo", "// @required(!bar)", true), mode),
            Requiredness::Expression("!bar".to_string())
        );
    }

    #[test]
    fn test_class_without_inputs_emits_nothing() {
        let mut session = AnalysisSession::new(&CheckOptions::default());
        session.on_class_end().unwrap();
        session.dispatch(usage(&[])).unwrap();
        assert_eq!(session.registry().get("foobar").unwrap().pending_len(), 1);
        assert!(!session.registry().get("foobar").unwrap().is_resolved());
    }

    #[test]
    fn test_declaration_is_atomic_at_class_end() {
        let mut session = AnalysisSession::new(&CheckOptions::default());
        session
            .on_input_member_visited(member("foo", "// @required", false))
            .unwrap();
        assert!(session.registry().get("foobar").is_none());

        session
            .on_input_member_visited(member("bar", "", false))
            .unwrap();
        assert_eq!(session.aggregator.pending_inputs(), 2);
        session.on_class_end().unwrap();
        assert!(session.registry().get("foobar").unwrap().is_resolved());

        session.dispatch(usage(&["bar"])).unwrap();
        assert_eq!(session.findings().len(), 1);
        assert_eq!(session.findings()[0].input, "foo");
    }

    #[test]
    fn test_file_end_flushes_unfinished_class() {
        let events = vec![
            usage(&[]),
            AnalysisEvent::InputMemberVisited(member("foo", "// @required", false)),
            AnalysisEvent::FileEnd,
        ];
        let findings = analyze_events(&CheckOptions::default(), events).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].message,
            "Component <foobar> is missing required input `foo` (used in app.html:2)"
        );
    }

    #[test]
    fn test_member_of_new_class_flushes_previous() {
        let mut other = member("baz", "// @required", false);
        other.class_name = Some("OtherComponent".to_string());
        other.selectors = vec!["other-thing".to_string()];

        let mut session = AnalysisSession::new(&CheckOptions::default());
        session
            .on_input_member_visited(member("foo", "// @required", false))
            .unwrap();
        session.on_input_member_visited(other).unwrap();
        assert!(session.registry().get("foobar").unwrap().is_resolved());
        assert!(session.registry().get("other-thing").is_none());

        let findings = session.finish().unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_alias_is_reported() {
        let mut aliased = member("foo", "// @required", false);
        aliased.alias = Some("fooAlias".to_string());
        let events = vec![
            AnalysisEvent::InputMemberVisited(aliased),
            AnalysisEvent::ClassEnd,
            usage(&["foo"]),
        ];
        let findings = analyze_events(&CheckOptions::default(), events).unwrap();
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("`fooAlias`"));
    }

    #[test]
    fn test_multiple_selectors_share_inputs() {
        let mut multi = member("foo", "// @required", false);
        multi.selectors = vec!["foobar".to_string(), "foo-bar".to_string()];
        let mut session = AnalysisSession::new(&CheckOptions::default());
        session.on_input_member_visited(multi).unwrap();
        session.on_class_end().unwrap();
        assert!(session.registry().get("foobar").unwrap().is_resolved());
        assert!(session.registry().get("foo-bar").unwrap().is_resolved());
    }

    #[test]
    fn test_invalid_expression_aborts() {
        let events = vec![
            AnalysisEvent::InputMemberVisited(member("foo", "// @required(!missing)", false)),
            AnalysisEvent::ClassEnd,
        ];
        let err = analyze_events(&CheckOptions::default(), events).unwrap_err();
        match err {
            AnalysisError::InvalidRequirement {
                component,
                input,
                expression,
                ..
            } => {
                assert_eq!(component, "foobar");
                assert_eq!(input, "foo");
                assert_eq!(expression, "!missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
