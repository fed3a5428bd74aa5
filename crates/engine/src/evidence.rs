//! Screenshot evidence written alongside step results

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use stepwise_common::ScreenshotArtifact;
use tracing::debug;

use crate::browser::Page;
use crate::error::StepError;

/// Where one case's screenshots go: `<root>/<run id>/<case id>/`
#[derive(Debug, Clone)]
pub struct EvidenceDir {
    dir: PathBuf,
}

impl EvidenceDir {
    pub fn new(root: &Path, run_id: &str, case_id: &str) -> Self {
        Self {
            dir: root.join(sanitize(run_id)).join(sanitize(case_id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Take a full-page screenshot and persist it as `step-<n>.png`
    pub async fn capture(&self, page: &dyn Page, index: usize) -> Result<ScreenshotArtifact, StepError> {
        let bytes = page
            .screenshot(true)
            .await
            .map_err(|e| StepError::EvidenceCaptureFailure(e.to_string()))?;
        self.save(index, &bytes).await
    }

    pub async fn save(&self, index: usize, bytes: &[u8]) -> Result<ScreenshotArtifact, StepError> {
        let failure = |e: std::io::Error| StepError::EvidenceCaptureFailure(e.to_string());

        tokio::fs::create_dir_all(&self.dir).await.map_err(failure)?;
        let path = self.dir.join(format!("step-{}.png", index + 1));
        tokio::fs::write(&path, bytes).await.map_err(failure)?;

        let sha256 = hex::encode(Sha256::digest(bytes));
        debug!("Saved screenshot {} ({} bytes)", path.display(), bytes.len());

        Ok(ScreenshotArtifact {
            path,
            bytes: bytes.len(),
            sha256,
        })
    }
}

/// Make `component` safe as one path segment.
///
/// A rewritten id gets a digest suffix so distinct ids never share a directory.
fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if !cleaned.is_empty() && cleaned == component {
        return cleaned;
    }
    let digest = hex::encode(Sha256::digest(component.as_bytes()));
    format!("{}-{}", if cleaned.is_empty() { "_" } else { cleaned.as_str() }, &digest[..8])
}
