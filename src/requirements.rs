//! Input requirement sets.
//!
//! Turns one component's ordered input list into the checks run against
//! every usage of that component.

use std::collections::HashSet;

use crate::error::AnalysisError;
use crate::predicate::{self, Predicate};
use crate::validate::{
    ComponentDeclaration, DeclarationHandle, Requiredness, MISSING_CONDITIONAL_INPUT,
    MISSING_REQUIRED_INPUT,
};

/// A failed check, before it is anchored at a usage site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub code: &'static str,
    pub input_name: String,
    pub declaration: DeclarationHandle,
    pub message: String,
}

#[derive(Debug, Clone)]
enum CheckRule {
    /// Fails when the input is absent.
    Present,
    /// Fails when the predicate holds and the input is absent.
    When(Predicate),
}

/// One requiredness check bound to a position in the presence vector.
#[derive(Debug, Clone)]
pub struct CompiledCheck {
    index: usize,
    input_name: String,
    alias: String,
    declaration: DeclarationHandle,
    rule: CheckRule,
}

impl CompiledCheck {
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn run(&self, presence: &[bool]) -> Option<Failure> {
        let supplied = presence.get(self.index).copied().unwrap_or(false);
        if supplied {
            return None;
        }

        let (code, message) = match &self.rule {
            CheckRule::Present => (
                MISSING_REQUIRED_INPUT,
                format!("is missing required input `{}`", self.alias),
            ),
            CheckRule::When(predicate) => {
                if !predicate.evaluate(presence) {
                    return None;
                }
                (
                    MISSING_CONDITIONAL_INPUT,
                    format!(
                        "is missing input `{}` required when `{}`",
                        self.alias,
                        predicate.source()
                    ),
                )
            }
        };

        Some(Failure {
            code,
            input_name: self.input_name.clone(),
            declaration: self.declaration.clone(),
            message,
        })
    }
}

/// Everything needed to evaluate usages of one resolved component.
#[derive(Debug, Clone)]
pub struct RequirementSet {
    /// Public binding names, in declaration order.
    public_names: Vec<String>,
    checks: Vec<CompiledCheck>,
}

impl RequirementSet {
    /// Compile every non-trivial requiredness rule of `decl`.
    pub fn compile(decl: &ComponentDeclaration) -> Result<Self, AnalysisError> {
        let sibling_names = decl.input_names();
        let aliases: Vec<(String, usize)> = decl
            .inputs
            .iter()
            .enumerate()
            .filter(|(_, input)| input.alias != input.name)
            .map(|(index, input)| (input.alias.clone(), index))
            .collect();

        let mut checks = Vec::new();
        for (index, input) in decl.inputs.iter().enumerate() {
            let rule = match &input.requiredness {
                Requiredness::Static(false) => continue,
                Requiredness::Static(true) => CheckRule::Present,
                Requiredness::Expression(expr) => {
                    let compiled = predicate::compile_with_aliases(&sibling_names, &aliases, expr)
                        .map_err(|source| AnalysisError::InvalidRequirement {
                            component: decl.tag_name.clone(),
                            input: input.name.clone(),
                            expression: expr.clone(),
                            source,
                        })?;
                    CheckRule::When(compiled)
                }
            };

            checks.push(CompiledCheck {
                index,
                input_name: input.name.clone(),
                alias: input.alias.clone(),
                declaration: input.declaration.clone(),
                rule,
            });
        }

        Ok(Self {
            public_names: decl.inputs.iter().map(|i| i.alias.clone()).collect(),
            checks,
        })
    }

    pub fn checks(&self) -> &[CompiledCheck] {
        &self.checks
    }

    /// One flag per declared input, true when the usage supplies it.
    pub fn presence_vector(&self, supplied: &HashSet<String>) -> Vec<bool> {
        self.public_names
            .iter()
            .map(|name| supplied.contains(name))
            .collect()
    }

    pub fn evaluate(&self, supplied: &HashSet<String>) -> Vec<Failure> {
        let presence = self.presence_vector(supplied);
        self.checks
            .iter()
            .filter_map(|check| check.run(&presence))
            .collect()
    }
}
