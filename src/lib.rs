//! # Missing Required Input Check
//!
//! Reports template usage sites of a component that omit an input the
//! component declares as required.
//!
//! ## Analysis Invariants
//!
//! 1. **Order Independence**: Usages and declarations arrive in any order.
//!    A usage seen before its component's declaration is buffered by that
//!    tag's tracker and checked exactly once when the declaration arrives.
//!
//! 2. **Atomic Declarations**: A component's inputs are handed over as one
//!    declaration when its class ends. A tracker never sees a partial input
//!    list.
//!
//! 3. **Compile Once**: Requiredness expressions are compiled when the
//!    declaration is observed. Names resolve to presence-vector slots at that
//!    point; evaluating a usage is a walk over booleans.
//!
//! 4. **Requiredness Resolution**: For each input, in this order:
//!    1. `@optional` / `@required` / `@required(<expr>)` in the member's comments
//!    2. `required: true` in the `@Input({...})` options
//!    3. The mode default (`tagged`: optional, `all-without-defaults`:
//!       required unless the member has an initializer)
//!
//! 5. **Skipped Tags**: Known HTML/SVG elements, `ng-*`, `svg:*`, `math:*`
//!    and configured extras are never tracked, even if a component declares
//!    one of those names as its selector.
//!
//! ## Entry Points
//!
//! - [`check_directory`] walks a project tree.
//! - [`check_sources`] analyses in-memory files.
//! - [`analyze_events`] drives the analysis from a pre-extracted event stream.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod component;
mod config;
mod discovery;
mod error;
mod parse;
mod predicate;
mod registry;
mod requirements;
mod session;
mod tracker;
mod validate;
mod visitor;


pub use component::extract_component_events;
pub use config::{CheckOptions, RequirednessMode};
pub use discovery::{check_directory, check_sources, extract_file_events};
pub use error::{AnalysisError, ExpressionError};
pub use parse::{extract_usages, parse_template, supplied_input_name};
pub use predicate::{compile as compile_predicate, compile_with_aliases, Predicate};
pub use registry::{SkipList, TagRegistry};
pub use requirements::{CompiledCheck, Failure, RequirementSet};
pub use session::{
    analyze_events, resolve_requiredness, AnalysisEvent, AnalysisSession, DeclarationAggregator,
    InputMember,
};
pub use tracker::{CorrelationTracker, TrackerState};
pub use validate::*;
pub use visitor::walk_elements;

/// Node entry point: analyse `base_dir` and return the findings as JSON.
/// `options_json` follows [`CheckOptions`] (camelCase keys).
#[cfg(feature = "napi")]
#[napi]
pub fn check_required_inputs_native(
    base_dir: String,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options = CheckOptions::from_json(options_json.as_deref().unwrap_or(""))
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let findings =
        check_directory(&base_dir, &options).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(findings).map_err(|e| napi::Error::from_reason(e.to_string()))
}
