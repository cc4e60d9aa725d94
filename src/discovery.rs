//! Discovery Module
//!
//! Walks a project tree for templates (`.html`) and component sources
//! (`.ts`), extracts each file's events in parallel, then replays them through
//! a single [`AnalysisSession`] in sorted path order so reports are stable.

use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::component::extract_component_events;
use crate::config::CheckOptions;
use crate::error::AnalysisError;
use crate::parse::extract_usages;
use crate::session::{AnalysisEvent, AnalysisSession};
use crate::validate::{Finding, LineIndex};

// ═══════════════════════════════════════════════════════════════════════════════
// FILE KINDS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Template,
    Script,
}

fn source_kind(path: &str) -> Option<SourceKind> {
    if path.ends_with(".d.ts") {
        None
    } else if path.ends_with(".ts") {
        Some(SourceKind::Script)
    } else if path.ends_with(".html") {
        Some(SourceKind::Template)
    } else {
        None
    }
}

/// Events for one file, ending with [`AnalysisEvent::FileEnd`]. Files that
/// are neither templates nor TypeScript yield no events.
pub fn extract_file_events(
    file_path: &str,
    source: &str,
) -> Result<Vec<AnalysisEvent>, AnalysisError> {
    match source_kind(file_path) {
        Some(SourceKind::Script) => extract_component_events(file_path, source),
        Some(SourceKind::Template) => {
            let lines = LineIndex::new(source);
            let mut events: Vec<AnalysisEvent> = extract_usages(file_path, source, 0, &lines)?
                .into_iter()
                .map(AnalysisEvent::ElementVisited)
                .collect();
            events.push(AnalysisEvent::FileEnd);
            Ok(events)
        }
        None => Ok(Vec::new()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANALYSIS ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Analyse in-memory sources. Files are replayed in the order given.
pub fn check_sources<P, S>(
    sources: &[(P, S)],
    options: &CheckOptions,
) -> Result<Vec<Finding>, AnalysisError>
where
    P: AsRef<str> + Sync,
    S: AsRef<str> + Sync,
{
    let batches: Vec<Vec<AnalysisEvent>> = sources
        .par_iter()
        .map(|(path, text)| extract_file_events(path.as_ref(), text.as_ref()))
        .collect::<Result<_, _>>()?;

    replay(batches, options)
}

/// Analyse every template and component source under `base_dir`.
pub fn check_directory(
    base_dir: impl AsRef<Path>,
    options: &CheckOptions,
) -> Result<Vec<Finding>, AnalysisError> {
    let base_dir = base_dir.as_ref();
    let files = find_source_files(base_dir, options)?;
    info!(dir = %base_dir.display(), files = files.len(), "checking required inputs");

    let sources: Vec<(String, String)> = files
        .par_iter()
        .filter_map(|path| match fs::read_to_string(path) {
            Ok(text) => Some((relative_path(base_dir, path), text)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                None
            }
        })
        .collect();

    let findings = check_sources(&sources, options)?;
    info!(findings = findings.len(), "required-input check finished");
    Ok(findings)
}

fn replay(
    batches: Vec<Vec<AnalysisEvent>>,
    options: &CheckOptions,
) -> Result<Vec<Finding>, AnalysisError> {
    let mut session = AnalysisSession::new(options);
    for event in batches.into_iter().flatten() {
        session.dispatch(event)?;
    }
    let registry = session.registry();
    debug!(tags = registry.len(), "registry populated");
    session.finish()
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE WALKING
// ═══════════════════════════════════════════════════════════════════════════════

/// Sorted list of analysable files under `dir`, skipping ignored directories.
fn find_source_files(dir: &Path, options: &CheckOptions) -> Result<Vec<PathBuf>, AnalysisError> {
    if !dir.is_dir() {
        return Err(AnalysisError::config(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(options.follow_links)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !options
                    .ignore_dirs
                    .iter()
                    .any(|ignored| entry.file_name().to_str() == Some(ignored.as_str()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_file()
            && path
                .to_str()
                .is_some_and(|name| source_kind(name).is_some())
        {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn relative_path(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
