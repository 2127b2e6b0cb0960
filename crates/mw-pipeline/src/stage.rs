//! Pipeline stage definitions.
//!
//! A [`Pipeline`] is the fixed, ordered list of stages executed by every run
//! attempt: `extractor`, then `validator` (if configured), then `indexer`.
//! Stages are built once from configuration and never change at runtime.

use std::fmt;

use mw_core::Config;
use smallvec::SmallVec;

/// The three stage slots of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    /// Extracts content from the workspace.
    Extractor,
    /// Validates extracted content. Optional.
    Validator,
    /// Indexes validated content.
    Indexer,
}

impl StageKind {
    /// Returns the label used in logs and by stage runners.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Extractor => "extractor",
            Self::Validator => "validator",
            Self::Indexer => "indexer",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One stage: its slot and the fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStage {
    kind: StageKind,
    command: Vec<String>,
}

impl PipelineStage {
    /// Creates a stage from an already resolved argv.
    #[must_use]
    pub const fn new(kind: StageKind, command: Vec<String>) -> Self {
        Self { kind, command }
    }

    /// Returns the stage slot.
    #[must_use]
    pub const fn kind(&self) -> StageKind {
        self.kind
    }

    /// Returns the stage label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.kind.label()
    }

    /// Returns the argv to execute.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }
}

/// The ordered stage list executed by each run attempt.
///
/// # Examples
///
/// ```
/// use mw_pipeline::{Pipeline, StageKind};
///
/// let pipeline = Pipeline::new(
///     vec!["extract".into()],
///     None,
///     vec!["index".into()],
/// );
/// let kinds: Vec<_> = pipeline.stages().iter().map(|s| s.kind()).collect();
/// assert_eq!(kinds, [StageKind::Extractor, StageKind::Indexer]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: SmallVec<[PipelineStage; 3]>,
}

impl Pipeline {
    /// Builds a pipeline from resolved commands.
    ///
    /// The order is fixed regardless of argument values; a `None` validator
    /// is simply left out.
    #[must_use]
    pub fn new(
        extractor: Vec<String>,
        validator: Option<Vec<String>>,
        indexer: Vec<String>,
    ) -> Self {
        let mut stages = SmallVec::new();
        stages.push(PipelineStage::new(StageKind::Extractor, extractor));
        if let Some(validator) = validator {
            stages.push(PipelineStage::new(StageKind::Validator, validator));
        }
        stages.push(PipelineStage::new(StageKind::Indexer, indexer));
        Self { stages }
    }

    /// Builds the pipeline described by `config`, prefixing every stage with
    /// the compose invocation.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let compose = &config.compose;
        let stages = &config.stages;
        Self::new(
            compose.invocation(&stages.extractor),
            stages
                .validator
                .as_deref()
                .map(|args| compose.invocation(args)),
            compose.invocation(&stages.indexer),
        )
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    /// Returns the number of stages (2 or 3).
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always `false`; a pipeline has at least the extractor and indexer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mw_core::{ComposeConfig, StageCommands, WatchConfig};

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(StageKind::Extractor.to_string(), "extractor");
        assert_eq!(StageKind::Validator.label(), "validator");
        assert_eq!(StageKind::Indexer.label(), "indexer");
        assert!(StageKind::Extractor < StageKind::Validator);
        assert!(StageKind::Validator < StageKind::Indexer);
    }

    #[test]
    fn test_pipeline_with_validator() {
        let pipeline = Pipeline::new(args(&["e"]), Some(args(&["v"])), args(&["i"]));
        let labels: Vec<_> = pipeline.stages().iter().map(PipelineStage::label).collect();
        assert_eq!(labels, ["extractor", "validator", "indexer"]);
        assert_eq!(pipeline.len(), 3);
        assert!(!pipeline.is_empty());
    }

    #[test]
    fn test_pipeline_without_validator() {
        let pipeline = Pipeline::new(args(&["e"]), None, args(&["i"]));
        let labels: Vec<_> = pipeline.stages().iter().map(PipelineStage::label).collect();
        assert_eq!(labels, ["extractor", "indexer"]);
    }

    #[test]
    fn test_pipeline_from_config() {
        let config = Config {
            watch: WatchConfig::new("/srv/docs"),
            compose: ComposeConfig {
                directory: "/srv".into(),
                command: args(&["podman-compose"]),
                service_name: "kb".to_owned(),
            },
            stages: StageCommands {
                extractor: args(&["python", "extract.py"]),
                validator: Some(args(&["python", "validate.py"])),
                indexer: args(&["python", "index.py"]),
            },
        };

        let pipeline = Pipeline::from_config(&config);
        let stages = pipeline.stages();
        assert_eq!(
            stages[0].command(),
            args(&["podman-compose", "run", "--rm", "kb", "python", "extract.py"])
        );
        assert_eq!(stages[1].kind(), StageKind::Validator);
        assert_eq!(
            stages[2].command(),
            args(&["podman-compose", "run", "--rm", "kb", "python", "index.py"])
        );
    }
}
