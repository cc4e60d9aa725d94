//! Tag name -> correlation tracker map.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

use crate::error::AnalysisError;
use crate::tracker::CorrelationTracker;
use crate::validate::{ComponentDeclaration, ElementUsage, Finding};

lazy_static! {
    /// Standard HTML and SVG elements. No component selector uses these, so
    /// their usages are dropped before a tracker is created.
    static ref KNOWN_ELEMENTS: HashSet<&'static str> = [
        "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base", "bdi",
        "bdo", "blockquote", "body", "br", "button", "canvas", "caption", "cite", "code",
        "col", "colgroup", "data", "datalist", "dd", "del", "details", "dfn", "dialog",
        "div", "dl", "dt", "em", "embed", "fieldset", "figcaption", "figure", "footer",
        "form", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hgroup", "hr",
        "html", "i", "iframe", "img", "input", "ins", "kbd", "label", "legend", "li",
        "link", "main", "map", "mark", "menu", "meta", "meter", "nav", "noscript",
        "object", "ol", "optgroup", "option", "output", "p", "param", "picture", "pre",
        "progress", "q", "rp", "rt", "ruby", "s", "samp", "script", "search", "section",
        "select", "slot", "small", "source", "span", "strong", "style", "sub", "summary",
        "sup", "table", "tbody", "td", "template", "textarea", "tfoot", "th", "thead",
        "time", "title", "tr", "track", "u", "ul", "var", "video", "wbr",
        // SVG
        "svg", "g", "path", "circle", "ellipse", "line", "polyline", "polygon", "rect",
        "defs", "use", "symbol", "mask", "pattern", "marker", "stop", "filter", "image",
        "text", "tspan", "clipPath", "linearGradient", "radialGradient", "foreignObject",
    ]
    .into_iter()
    .collect();

    /// Framework-internal tags (`ng-container`, `ng-template`, `ng-content`)
    /// and namespaced elements (`svg:rect`, `:svg:g`).
    static ref INTERNAL_TAG_RE: Regex = Regex::new(r"^(?:ng-|:?svg:|:?math:)").unwrap();
}

/// Drops usages that can never name a component.
#[derive(Debug, Clone, Default)]
pub struct SkipList {
    extra: HashSet<String>,
}

impl SkipList {
    pub fn new(extra: impl IntoIterator<Item = String>) -> Self {
        Self {
            extra: extra.into_iter().collect(),
        }
    }

    pub fn contains(&self, tag_name: &str) -> bool {
        KNOWN_ELEMENTS.contains(tag_name)
            || INTERNAL_TAG_RE.is_match(tag_name)
            || self.extra.contains(tag_name)
    }
}

#[derive(Debug, Default)]
pub struct TagRegistry {
    trackers: HashMap<String, CorrelationTracker>,
    skip: SkipList,
}

impl TagRegistry {
    pub fn new(skip: SkipList) -> Self {
        Self {
            trackers: HashMap::new(),
            skip,
        }
    }

    /// Create-or-lookup. Tag names match exactly and case-sensitively.
    pub fn for_tag(&mut self, tag_name: &str) -> &mut CorrelationTracker {
        if !self.trackers.contains_key(tag_name) {
            debug!(tag = tag_name, "tracking new tag");
        }
        self.trackers
            .entry(tag_name.to_string())
            .or_insert_with(|| CorrelationTracker::new(tag_name))
    }

    pub fn get(&self, tag_name: &str) -> Option<&CorrelationTracker> {
        self.trackers.get(tag_name)
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    pub fn is_skipped(&self, tag_name: &str) -> bool {
        self.skip.contains(tag_name)
    }

    pub fn observe_usage(&mut self, usage: ElementUsage) -> Vec<Finding> {
        if self.is_skipped(&usage.tag_name) {
            trace!(tag = %usage.tag_name, "skip-listed tag");
            return Vec::new();
        }
        let tag_name = usage.tag_name.clone();
        self.for_tag(&tag_name).observe_usage(usage)
    }

    pub fn observe_declaration(
        &mut self,
        decl: ComponentDeclaration,
    ) -> Result<Vec<Finding>, AnalysisError> {
        let tag_name = decl.tag_name.clone();
        self.for_tag(&tag_name).observe_declaration(decl)
    }
}
