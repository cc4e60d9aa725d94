use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AnalysisError;

/// How requiredness is decided for inputs without an explicit marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequirednessMode {
    /// Only explicitly marked inputs are required.
    #[default]
    Tagged,
    /// Inputs without a default value are required.
    AllWithoutDefaults,
}

impl FromStr for RequirednessMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "tagged" => Ok(Self::Tagged),
            "all-without-defaults" => Ok(Self::AllWithoutDefaults),
            other => Err(AnalysisError::config(format!(
                "unknown requiredness mode \"{}\"; expected \"tagged\" or \"all-without-defaults\"",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckOptions {
    pub mode: RequirednessMode,
    /// Extra literal tag names never tracked.
    pub skip_tags: Vec<String>,
    /// Directory names not descended into during discovery.
    pub ignore_dirs: Vec<String>,
    pub follow_links: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        CheckOptions {
            mode: RequirednessMode::Tagged,
            skip_tags: Vec::new(),
            ignore_dirs: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "dist".to_string(),
            ],
            follow_links: false,
        }
    }
}

impl CheckOptions {
    pub fn with_mode(mode: RequirednessMode) -> Self {
        CheckOptions {
            mode,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!(
            "tagged".parse::<RequirednessMode>().unwrap(),
            RequirednessMode::Tagged
        );
        assert_eq!(
            "all-without-defaults".parse::<RequirednessMode>().unwrap(),
            RequirednessMode::AllWithoutDefaults
        );
        assert!(matches!(
            "everything".parse::<RequirednessMode>(),
            Err(AnalysisError::Config(_))
        ));
    }

    #[test]
    fn test_options_from_json() {
        let options =
            CheckOptions::from_json(r#"{"mode": "all-without-defaults", "skipTags": ["mat-icon"]}"#)
                .unwrap();
        assert_eq!(options.mode, RequirednessMode::AllWithoutDefaults);
        assert_eq!(options.skip_tags, vec!["mat-icon".to_string()]);
        // unspecified fields keep their defaults
        assert!(options.ignore_dirs.contains(&"node_modules".to_string()));

        assert_eq!(CheckOptions::from_json("").unwrap(), CheckOptions::default());
        assert!(matches!(
            CheckOptions::from_json(r#"{"mode": "loose"}"#),
            Err(AnalysisError::Json(_))
        ));
    }
}
