//! Run-scoped types produced by the orchestrator.

use crate::artifacts::{ArtifactName, OutputArtifactSet, RunSummary};
use serde::{Deserialize, Serialize};

/// Identity of one run and the artifacts it must publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: String,
    pub profile: String,
    pub artifacts: OutputArtifactSet,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, profile: impl Into<String>, artifacts: OutputArtifactSet) -> Self {
        Self {
            run_id: run_id.into(),
            profile: profile.into(),
            artifacts,
        }
    }

    pub fn object_key(&self, artifact: ArtifactName) -> String {
        artifact.object_key(&self.run_id)
    }
}

/// One object written to the results store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedArtifact {
    pub name: ArtifactName,
    pub key: String,
    pub size_bytes: usize,
}

/// Outcome of a fully successful job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub profile: String,
    pub output_container: String,
    pub summary: RunSummary,
    /// In publish order
    pub published: Vec<PublishedArtifact>,
}

impl RunReport {
    pub fn published_keys(&self) -> Vec<&str> {
        self.published.iter().map(|a| a.key.as_str()).collect()
    }

    pub fn has_merge_map(&self) -> bool {
        self.published
            .iter()
            .any(|a| a.name == ArtifactName::MergeMap)
    }
}
