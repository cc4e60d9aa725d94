//! Per-tag correlation of usages with the component declaration.
//!
//! Usages seen before the declaration are queued and drained exactly once when
//! the declaration arrives; later usages are evaluated on arrival.

use tracing::{debug, trace, warn};

use crate::error::AnalysisError;
use crate::requirements::{Failure, RequirementSet};
use crate::validate::{ComponentDeclaration, ElementUsage, Finding};

#[derive(Debug)]
pub enum TrackerState {
    Unresolved { pending: Vec<ElementUsage> },
    Resolved { requirements: RequirementSet },
}

#[derive(Debug)]
pub struct CorrelationTracker {
    tag_name: String,
    state: TrackerState,
}

impl CorrelationTracker {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            state: TrackerState::Unresolved {
                pending: Vec::new(),
            },
        }
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, TrackerState::Resolved { .. })
    }

    /// Number of usages waiting for the declaration.
    pub fn pending_len(&self) -> usize {
        match &self.state {
            TrackerState::Unresolved { pending } => pending.len(),
            TrackerState::Resolved { .. } => 0,
        }
    }

    pub fn observe_usage(&mut self, usage: ElementUsage) -> Vec<Finding> {
        match &mut self.state {
            TrackerState::Unresolved { pending } => {
                trace!(
                    tag = %self.tag_name,
                    file = %usage.source_file,
                    line = usage.location.line,
                    "deferring usage until declaration is seen"
                );
                pending.push(usage);
                Vec::new()
            }
            TrackerState::Resolved { requirements } => {
                evaluate_usage(&self.tag_name, requirements, &usage)
            }
        }
    }

    /// Register the component's inputs and drain any queued usages.
    ///
    /// Only the first declaration for a tag is kept; later ones are ignored.
    pub fn observe_declaration(
        &mut self,
        decl: ComponentDeclaration,
    ) -> Result<Vec<Finding>, AnalysisError> {
        if self.is_resolved() {
            warn!(
                tag = %self.tag_name,
                "ignoring duplicate declaration; the first declaration wins"
            );
            return Ok(Vec::new());
        }

        let requirements = RequirementSet::compile(&decl)?;
        let pending = match &mut self.state {
            TrackerState::Unresolved { pending } => std::mem::take(pending),
            TrackerState::Resolved { .. } => Vec::new(),
        };

        debug!(
            tag = %self.tag_name,
            inputs = decl.inputs.len(),
            checks = requirements.checks().len(),
            pending = pending.len(),
            "component declaration resolved"
        );

        let findings = pending
            .iter()
            .flat_map(|usage| evaluate_usage(&self.tag_name, &requirements, usage))
            .collect();
        self.state = TrackerState::Resolved { requirements };
        Ok(findings)
    }
}

fn evaluate_usage(
    tag_name: &str,
    requirements: &RequirementSet,
    usage: &ElementUsage,
) -> Vec<Finding> {
    requirements
        .evaluate(&usage.supplied_names)
        .into_iter()
        .map(|failure| anchor_failure(tag_name, failure, usage))
        .collect()
}

fn anchor_failure(tag_name: &str, failure: Failure, usage: &ElementUsage) -> Finding {
    let message = format!(
        "Component <{}> {} (used in {}:{})",
        tag_name, failure.message, usage.source_file, usage.location.line
    );
    let mut hints = Vec::new();
    if !failure.declaration.file.is_empty() {
        hints.push(format!(
            "`{}` is declared in {}:{}",
            failure.input_name, failure.declaration.file, failure.declaration.location.line
        ));
    }
    Finding::at_usage(
        failure.code,
        message,
        tag_name,
        &failure.input_name,
        usage,
        hints,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{
        DeclarationHandle, InputDeclaration, Requiredness, SourceLocation, SourceSpan,
    };

    fn usage(line: u32, supplied: &[&str]) -> ElementUsage {
        ElementUsage::new(
            "app.html",
            "foobar",
            SourceSpan::new(0, 8),
            SourceLocation { line, column: 1 },
            supplied.iter().map(|s| s.to_string()),
        )
    }

    fn foobar_decl() -> ComponentDeclaration {
        ComponentDeclaration::new(
            "foobar",
            vec![InputDeclaration::new("foo", Requiredness::Static(true))],
        )
    }

    #[test]
    fn test_usage_before_declaration_is_deferred() {
        let mut tracker = CorrelationTracker::new("foobar");
        assert!(tracker.observe_usage(usage(3, &[])).is_empty());
        assert!(tracker.observe_usage(usage(4, &["foo"])).is_empty());
        assert_eq!(tracker.pending_len(), 2);
        assert!(!tracker.is_resolved());
        assert_eq!(tracker.tag_name(), "foobar");
        assert!(matches!(
            tracker.state(),
            TrackerState::Unresolved { pending } if pending[0].location.line == 3
        ));

        let findings = tracker.observe_declaration(foobar_decl()).unwrap();
        assert!(tracker.is_resolved());
        assert_eq!(tracker.pending_len(), 0);
        assert!(matches!(
            tracker.state(),
            TrackerState::Resolved { requirements } if requirements.checks().len() == 1
        ));
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].message,
            "Component <foobar> is missing required input `foo` (used in app.html:3)"
        );
        assert_eq!(findings[0].line, 3);
    }

    #[test]
    fn test_usage_after_declaration_is_immediate() {
        let mut tracker = CorrelationTracker::new("foobar");
        assert!(tracker.observe_declaration(foobar_decl()).unwrap().is_empty());

        let findings = tracker.observe_usage(usage(12, &[]));
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].message,
            "Component <foobar> is missing required input `foo` (used in app.html:12)"
        );
        assert!(tracker.observe_usage(usage(13, &["foo"])).is_empty());
    }

    #[test]
    fn test_duplicate_declaration_keeps_first() {
        let mut tracker = CorrelationTracker::new("foobar");
        tracker.observe_declaration(foobar_decl()).unwrap();

        let relaxed = ComponentDeclaration::new(
            "foobar",
            vec![InputDeclaration::new("foo", Requiredness::Static(false))],
        );
        assert!(tracker.observe_declaration(relaxed).unwrap().is_empty());
        assert_eq!(tracker.observe_usage(usage(1, &[])).len(), 1);
    }

    #[test]
    fn test_declaration_hint() {
        let mut tracker = CorrelationTracker::new("foobar");
        let decl = ComponentDeclaration::new(
            "foobar",
            vec![
                InputDeclaration::new("foo", Requiredness::Static(true)).with_declaration(
                    DeclarationHandle {
                        file: "foobar.component.ts".to_string(),
                        span: SourceSpan::new(120, 140),
                        location: SourceLocation { line: 7, column: 3 },
                    },
                ),
            ],
        );
        tracker.observe_declaration(decl).unwrap();
        let findings = tracker.observe_usage(usage(2, &[]));
        assert_eq!(
            findings[0].hints,
            vec!["`foo` is declared in foobar.component.ts:7".to_string()]
        );
    }

    #[test]
    fn test_invalid_expression_is_fatal() {
        let mut tracker = CorrelationTracker::new("foobar");
        tracker.observe_usage(usage(1, &[]));
        let decl = ComponentDeclaration::new(
            "foobar",
            vec![InputDeclaration::new(
                "foo",
                Requiredness::Expression("foo &&".to_string()),
            )],
        );
        assert!(matches!(
            tracker.observe_declaration(decl),
            Err(AnalysisError::InvalidRequirement { .. })
        ));
        assert!(!tracker.is_resolved());
    }
}
