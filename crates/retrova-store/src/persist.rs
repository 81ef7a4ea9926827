use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use retrova_core::{Point, RetrovaResult};
use tokio::io::AsyncWriteExt;

/// File name of the collection manifest inside a store directory.
const MANIFEST_FILE: &str = "manifest.json";

/// Collection name -> dimension, persisted as a single JSON document.
pub type Manifest = BTreeMap<String, usize>;

/// Reads the manifest from a store directory. A missing file is an empty
/// manifest.
pub async fn load_manifest(dir: &Path) -> RetrovaResult<Manifest> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(Manifest::new());
    }
    let data = tokio::fs::read_to_string(&path).await?;
    Ok(serde_json::from_str(&data)?)
}

/// Writes the manifest to a store directory.
pub async fn store_manifest(dir: &Path, manifest: &Manifest) -> RetrovaResult<()> {
    let json = serde_json::to_string_pretty(manifest)?;
    tokio::fs::write(dir.join(MANIFEST_FILE), json).await?;
    Ok(())
}

/// Append-mostly JSONL log holding one collection's points.
///
/// Inserts append a line; updates and deletes rewrite the file from the
/// in-memory point map. The whole log is loaded once when the store opens.
/// Callers serialize access by holding the collection's write lock across
/// the mutation and the log write, so the file never interleaves.
#[derive(Debug)]
pub struct PointLog {
    path: PathBuf,
}

impl PointLog {
    /// Creates a log handle for a collection inside a store directory.
    pub fn new(dir: &Path, collection: &str) -> Self {
        Self {
            path: dir.join(format!("{collection}.points.jsonl")),
        }
    }

    /// Loads every point from the log. A missing file yields no points;
    /// later lines win when a line repeats an id.
    pub async fn load(&self) -> RetrovaResult<BTreeMap<String, Point>> {
        let mut points = BTreeMap::new();
        if !self.path.exists() {
            return Ok(points);
        }
        let data = tokio::fs::read_to_string(&self.path).await?;
        for line in data.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let point: Point = serde_json::from_str(line)?;
            points.insert(point.id.clone(), point);
        }
        Ok(points)
    }

    /// Appends a single point to the log.
    pub async fn append(&self, point: &Point) -> RetrovaResult<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut line = serde_json::to_string(point)?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Rewrites the log from the full point map.
    pub async fn rewrite(&self, points: &BTreeMap<String, Point>) -> RetrovaResult<()> {
        let mut data = String::new();
        for point in points.values() {
            data.push_str(&serde_json::to_string(point)?);
            data.push('\n');
        }
        tokio::fs::write(&self.path, data.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use retrova_core::Payload;

    fn point(id: &str) -> Point {
        Point::new(id, vec![1.0, 0.0], Payload::new())
    }

    #[tokio::test]
    async fn load_of_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let log = PointLog::new(tmp.path(), "docs");
        assert!(log.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let log = PointLog::new(tmp.path(), "docs");
        log.append(&point("a")).await.unwrap();
        log.append(&point("b")).await.unwrap();

        let loaded = log.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains_key("a"));
        assert!(loaded.contains_key("b"));
    }

    #[tokio::test]
    async fn later_lines_win_on_duplicate_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let log = PointLog::new(tmp.path(), "docs");
        log.append(&point("a")).await.unwrap();
        let mut newer = point("a");
        newer.embedding = vec![0.0, 1.0];
        log.append(&newer).await.unwrap();

        let loaded = log.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["a"].embedding, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn rewrite_replaces_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let log = PointLog::new(tmp.path(), "docs");
        log.append(&point("a")).await.unwrap();
        log.append(&point("b")).await.unwrap();

        let mut remaining = BTreeMap::new();
        remaining.insert("b".to_string(), point("b"));
        log.rewrite(&remaining).await.unwrap();

        let loaded = log.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("b"));
    }

    #[tokio::test]
    async fn manifest_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_manifest(tmp.path()).await.unwrap().is_empty());

        let mut manifest = Manifest::new();
        manifest.insert("docs".to_string(), 1536);
        store_manifest(tmp.path(), &manifest).await.unwrap();

        let loaded = load_manifest(tmp.path()).await.unwrap();
        assert_eq!(loaded.get("docs"), Some(&1536));
    }
}
