use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shortlink_common::{ShortlinkError, ShortlinkResult};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::event::ClickEvent;

/// Destination for recorded clicks.
///
/// Implementations must be safe for concurrent use. The recorder calls
/// `append_click` at most once per event and never retries.
#[async_trait]
pub trait ClickStore: Send + Sync {
    async fn append_click(&self, event: &ClickEvent) -> ShortlinkResult<()>;
}

/// Appends each click as one JSON object per line.
pub struct JsonLinesStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesStore {
    /// Open (or create) `path` for appending.
    pub async fn open(path: impl AsRef<Path>) -> ShortlinkResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ShortlinkError::Store(format!("failed to open {}: {}", path.display(), e)))?;

        tracing::info!(path = %path.display(), "click log opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ClickStore for JsonLinesStore {
    async fn append_click(&self, event: &ClickEvent) -> ShortlinkResult<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        // One writer at a time keeps lines from interleaving.
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ClickMetadata;
    use shortlink_geoip::Region;
    use std::sync::Arc;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("shortlink-clicks-{}.jsonl", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn appends_one_line_per_event() {
        let path = temp_path();
        let store = Arc::new(JsonLinesStore::open(&path).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..20u64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let mut event = ClickEvent::capture(
                    i,
                    ClickMetadata {
                        source_address: "8.8.8.8".into(),
                        user_agent: "curl/8.5.0".into(),
                        referer: String::new(),
                    },
                );
                event.resolved_region = Region::Resolved("United States".into());
                store.append_click(&event).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let mut subjects: Vec<u64> = content
            .lines()
            .map(|line| serde_json::from_str::<ClickEvent>(line).unwrap().subject_id)
            .collect();
        subjects.sort_unstable();
        assert_eq!(subjects, (0..20).collect::<Vec<_>>());

        let first: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first["resolved_region"], "United States");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn open_fails_for_missing_directory() {
        let result = JsonLinesStore::open("/nonexistent-dir/clicks.jsonl").await;
        assert!(matches!(result, Err(ShortlinkError::Store(_))));
    }
}
