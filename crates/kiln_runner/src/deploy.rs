//! Deployment of generated output into the served directory.
//!
//! The generated directory for a session (or its `dist/` for projects) is
//! copied to `{deploy_dir}/{deploy_key}`. A missing source fails the deploy;
//! nothing is copied in that case.

use std::path::{Path, PathBuf};

use fs_extra::dir::CopyOptions;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use kiln_core::{AppId, GenerationType};

use crate::build::DIST_DIR;
use crate::error::{RunnerError, RunnerResult};

pub const DEPLOY_KEY_LEN: usize = 6;

/// A completed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub deploy_key: String,
    pub path: PathBuf,
    pub url: Option<String>,
}

/// Copies generated output into the deploy root.
#[derive(Debug, Clone)]
pub struct Deployer {
    output_dir: PathBuf,
    deploy_dir: PathBuf,
    base_url: Option<String>,
}

impl Deployer {
    pub fn new(output_dir: impl Into<PathBuf>, deploy_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            deploy_dir: deploy_dir.into(),
            base_url: None,
        }
    }

    /// Public address the deploy root is served from.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// The directory a deploy of this session copies from.
    pub fn source_dir(&self, generation_type: GenerationType, app_id: AppId) -> PathBuf {
        let dir = self.output_dir.join(generation_type.dir_name(app_id));
        if generation_type.needs_build() {
            dir.join(DIST_DIR)
        } else {
            dir
        }
    }

    /// Deploy a session's output, reusing `existing_key` when it is valid.
    pub async fn deploy(
        &self,
        generation_type: GenerationType,
        app_id: AppId,
        existing_key: Option<&str>,
    ) -> RunnerResult<Deployment> {
        let source = self.source_dir(generation_type, app_id);
        if !source.is_dir() {
            return Err(RunnerError::MissingOutput(source));
        }

        let deploy_key = match existing_key {
            Some(key) if is_valid_key(key) => key.to_string(),
            Some(key) => {
                warn!(app_id, "Ignoring malformed deploy key {:?}", key);
                generate_deploy_key()
            }
            None => generate_deploy_key(),
        };
        let target = self.deploy_dir.join(&deploy_key);

        let copy_target = target.clone();
        tokio::task::spawn_blocking(move || replace_dir(&source, &copy_target))
            .await
            .map_err(|e| RunnerError::Deploy(e.to_string()))??;

        info!(app_id, "Deployed {} to {}", generation_type, target.display());
        Ok(Deployment {
            url: self
                .base_url
                .as_ref()
                .map(|base| format!("{}/{}/", base.trim_end_matches('/'), deploy_key)),
            deploy_key,
            path: target,
        })
    }
}

/// A fresh lowercase alphanumeric key.
pub fn generate_deploy_key() -> String {
    Uuid::new_v4().simple().to_string()[..DEPLOY_KEY_LEN].to_string()
}

fn is_valid_key(key: &str) -> bool {
    key.len() == DEPLOY_KEY_LEN && key.chars().all(|c| c.is_ascii_alphanumeric())
}

fn replace_dir(source: &Path, target: &Path) -> RunnerResult<()> {
    if target.exists() {
        std::fs::remove_dir_all(target)?;
    }
    std::fs::create_dir_all(target)?;

    let options = CopyOptions::new().content_only(true).overwrite(true);
    if let Err(e) = fs_extra::dir::copy(source, target, &options) {
        // Leave no half-copied deploy behind.
        let _ = std::fs::remove_dir_all(target);
        return Err(e.into());
    }
    Ok(())
}
