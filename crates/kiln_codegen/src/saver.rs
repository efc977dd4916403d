//! Artifact persistence.
//!
//! Output directories are named `{type}_{id}` under the output root, where
//! the id is either the application id (session-keyed path, overwritten on
//! each generation) or a freshly generated snowflake id (single-shot path).
//! Files are written into a staging directory that is renamed into place,
//! so readers never observe a half-written artifact.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use kiln_core::{AppId, GenerationType};

use crate::artifact::CodeArtifact;
use crate::error::{CodegenError, CodegenResult};

/// 2024-01-01T00:00:00Z in milliseconds.
const ID_EPOCH_MS: i64 = 1_704_067_200_000;

/// Writes artifacts below an output root.
#[derive(Debug, Clone)]
pub struct CodeFileSaver {
    root: PathBuf,
}

impl CodeFileSaver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory an application's artifact of this type lives in.
    pub fn output_dir(&self, generation_type: GenerationType, app_id: AppId) -> PathBuf {
        self.root.join(generation_type.dir_name(app_id))
    }

    /// Write an artifact to its session-keyed directory, replacing the previous one.
    pub fn save_for_app(&self, artifact: &CodeArtifact, app_id: AppId) -> CodegenResult<PathBuf> {
        let target = self.output_dir(artifact.generation_type(), app_id);
        self.write(artifact, &target, true)
    }

    /// Write an artifact to a fresh uniquely-named directory.
    pub fn save_unique(&self, artifact: &CodeArtifact) -> CodegenResult<PathBuf> {
        let target = self
            .root
            .join(artifact.generation_type().dir_name(next_snowflake_id()));
        self.write(artifact, &target, false)
    }

    fn write(&self, artifact: &CodeArtifact, target: &Path, replace: bool) -> CodegenResult<PathBuf> {
        if artifact.html().map_or(true, |h| h.trim().is_empty()) {
            return Err(CodegenError::MissingField("htmlCode"));
        }

        fs::create_dir_all(&self.root)?;
        let staging = self.root.join(format!(".staging-{}", Uuid::new_v4().simple()));
        fs::create_dir_all(&staging)?;

        if let Err(e) = Self::write_files(artifact, &staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if replace && target.exists() {
            debug!("Replacing previous artifact at {:?}", target);
            fs::remove_dir_all(target)?;
        }
        if let Err(e) = fs::rename(&staging, target) {
            warn!("Could not move staged artifact into {:?}: {}", target, e);
            let _ = fs::remove_dir_all(&staging);
            return Err(e.into());
        }

        info!("Saved {} artifact to {:?}", artifact.generation_type(), target);
        Ok(target.to_path_buf())
    }

    fn write_files(artifact: &CodeArtifact, dir: &Path) -> CodegenResult<()> {
        for (file, content) in artifact.files() {
            fs::write(dir.join(file.file_name()), content)?;
        }
        Ok(())
    }
}

/// Time-ordered unique id: milliseconds since [`ID_EPOCH_MS`] in the high
/// bits, bumped monotonically when two ids land in the same millisecond.
pub fn next_snowflake_id() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);

    let millis = (Utc::now().timestamp_millis() - ID_EPOCH_MS).max(0) as u64;
    let candidate = millis << 22;
    let previous = LAST
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(if candidate > last { candidate } else { last + 1 })
        })
        .unwrap_or_else(|last| last);
    if candidate > previous {
        candidate
    } else {
        previous + 1
    }
}
