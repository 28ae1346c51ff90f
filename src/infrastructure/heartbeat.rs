// Heartbeat file touched periodically for container liveness probes
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub struct Heartbeat {
    path: PathBuf,
}

impl Heartbeat {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn run_forever(self) -> Result<()> {
        tracing::info!(path = %self.path().display(), "heartbeat.start");
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        loop {
            if let Err(e) = self.touch().await {
                tracing::warn!(path = %self.path.display(), error = %format!("{e:#}"), "heartbeat.error");
            }
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
        }
    }

    /// Create the file if needed and bump its modification time.
    pub async fn touch(&self) -> Result<()> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let file = file.into_std().await;
        tokio::task::spawn_blocking(move || file.set_modified(std::time::SystemTime::now()))
            .await?
            .with_context(|| format!("Failed to touch {}", self.path.display()))
    }
}
