//! Augmentation configuration

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::core::aggregator::DEFAULT_ROLLING_WINDOW;
use crate::core::extractor::FieldProjection;
use crate::error::{validate_window, FeatureError};
use crate::models::EntityKind;

/// Label of the per-kind recent window (`{kind}_recent_i`)
pub const RECENT_LABEL: &str = "recent";
/// Label of the competitor's previous-race chain (`competitor_prev_i`)
pub const PREV_LABEL: &str = "prev";

const DEFAULT_RECENT_K: usize = 3;
const DEFAULT_PREV_K: usize = 5;

/// One named recent-history extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSpec {
    pub label: String,
    pub k: usize,
    pub fields: FieldProjection,
}

impl ExtractionSpec {
    pub fn new(label: impl Into<String>, k: usize, fields: FieldProjection) -> Self {
        Self {
            label: label.into(),
            k,
            fields,
        }
    }

    pub fn recent(k: usize) -> Self {
        Self::new(RECENT_LABEL, k, FieldProjection::basic())
    }
}

/// What to compute for one entity kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindPlan {
    pub kind: EntityKind,
    #[serde(default)]
    pub extractions: Vec<ExtractionSpec>,
}

impl KindPlan {
    /// Default plan for a kind; competitors also get the previous-race chain
    pub fn default_for(kind: EntityKind) -> Self {
        let mut extractions = vec![ExtractionSpec::recent(DEFAULT_RECENT_K)];
        if kind == EntityKind::Competitor {
            extractions.push(ExtractionSpec::new(
                PREV_LABEL,
                DEFAULT_PREV_K,
                FieldProjection::full(),
            ));
        }
        Self { kind, extractions }
    }
}

/// Batch augmentation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentConfig {
    /// Entity kinds to compute, in output order
    pub kinds: Vec<KindPlan>,
    /// Number of most recent races for rolling statistics
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
    /// Dedicated worker count (None uses the global rayon pool)
    #[serde(default)]
    pub workers: Option<usize>,
}

fn default_rolling_window() -> usize {
    DEFAULT_ROLLING_WINDOW
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            kinds: EntityKind::ALL.iter().map(|&k| KindPlan::default_for(k)).collect(),
            rolling_window: DEFAULT_ROLLING_WINDOW,
            workers: None,
        }
    }
}

impl AugmentConfig {
    /// Config computing only the given kinds with default plans
    pub fn for_kinds(kinds: &[EntityKind]) -> Self {
        Self {
            kinds: kinds.iter().map(|&k| KindPlan::default_for(k)).collect(),
            ..Default::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Load from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, FeatureError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| FeatureError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| FeatureError::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BOATRACE_WORKERS` and `BOATRACE_ROLLING_WINDOW` if set
    pub fn with_env_overrides(mut self) -> Result<Self, FeatureError> {
        if let Some(workers) = env_usize("BOATRACE_WORKERS")? {
            self.workers = Some(workers);
        }
        if let Some(window) = env_usize("BOATRACE_ROLLING_WINDOW")? {
            self.rolling_window = window;
        }
        Ok(self)
    }

    pub fn plan(&self, kind: EntityKind) -> Option<&KindPlan> {
        self.kinds.iter().find(|p| p.kind == kind)
    }

    /// Reject settings that would produce duplicate output columns
    pub fn validate(&self) -> Result<(), FeatureError> {
        validate_window(self.rolling_window)?;
        if self.workers == Some(0) {
            return Err(FeatureError::Config("workers must be at least 1".to_string()));
        }

        let mut kinds = HashSet::new();
        for plan in &self.kinds {
            if !kinds.insert(plan.kind) {
                return Err(FeatureError::Config(format!("kind {} listed twice", plan.kind)));
            }
            let mut labels = HashSet::new();
            for spec in &plan.extractions {
                if spec.label.is_empty() {
                    return Err(FeatureError::Config(format!(
                        "empty extraction label for {}",
                        plan.kind
                    )));
                }
                if !labels.insert(spec.label.as_str()) {
                    return Err(FeatureError::Config(format!(
                        "extraction label {} listed twice for {}",
                        spec.label, plan.kind
                    )));
                }
            }
        }
        Ok(())
    }
}

fn env_usize(name: &str) -> Result<Option<usize>, FeatureError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| FeatureError::Config(format!("{} must be a non-negative integer, got {}", name, value))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan() {
        let config = AugmentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.kinds.len(), 3);
        assert_eq!(config.rolling_window, 30);

        let competitor = config.plan(EntityKind::Competitor).unwrap();
        assert_eq!(competitor.extractions.len(), 2);
        assert_eq!(competitor.extractions[1].label, "prev");
        assert_eq!(competitor.extractions[1].k, 5);

        let handler = config.plan(EntityKind::Handler).unwrap();
        assert_eq!(handler.extractions, vec![ExtractionSpec::recent(3)]);
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut config = AugmentConfig::for_kinds(&[EntityKind::Operator, EntityKind::Operator]);
        assert!(config.validate().is_err());

        config = AugmentConfig::for_kinds(&[EntityKind::Operator]);
        config.kinds[0].extractions.push(ExtractionSpec::recent(2));
        assert!(config.validate().is_err());

        config = AugmentConfig::default().with_workers(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "kinds": [
                {"kind": "handler", "extractions": [{"label": "recent", "k": 2, "fields": ["finish_rank"]}]},
                {"kind": "competitor"}
            ],
            "workers": 4
        }"#;
        let config: AugmentConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.rolling_window, 30);
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.kinds[0].extractions[0].k, 2);
        assert!(config.kinds[1].extractions.is_empty());
    }
}
