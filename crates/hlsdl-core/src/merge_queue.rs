//! Buffers out-of-order segment completions; emits an in-order file list (C10).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeQueueError {
    #[error("segment {0} was never completed")]
    MissingSegment(usize),
    #[error("segment {index} path does not exist on disk: {path}")]
    PathMissing { index: usize, path: String },
    #[error("segment {index} file is empty: {path}")]
    PathEmpty { index: usize, path: String },
}

#[derive(Default)]
pub struct MergeQueue {
    entries: Mutex<BTreeMap<usize, PathBuf>>,
}

impl MergeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed segment. Idempotent: re-adding the same
    /// `(index, path)` pair is a no-op; adding a different path for an
    /// already-recorded index replaces it (the engine never does this in
    /// practice, but it keeps the contract well-defined).
    pub fn add(&self, index: usize, path: PathBuf) {
        let mut entries = self.entries.lock().expect("merge queue mutex poisoned");
        entries.insert(index, path);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("merge queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.lock().expect("merge queue mutex poisoned").contains_key(&index)
    }

    /// All `segment_count` paths in ascending index order. Fails if any
    /// index in `[0, segment_count)` is unfilled.
    pub fn all_in_order(&self, segment_count: usize) -> Result<Vec<PathBuf>, MergeQueueError> {
        let entries = self.entries.lock().expect("merge queue mutex poisoned");
        let mut out = Vec::with_capacity(segment_count);
        for i in 0..segment_count {
            match entries.get(&i) {
                Some(p) => out.push(p.clone()),
                None => return Err(MergeQueueError::MissingSegment(i)),
            }
        }
        Ok(out)
    }

    /// Verify every referenced path exists on disk and is non-empty.
    pub fn validate(&self) -> Result<(), MergeQueueError> {
        let entries = self.entries.lock().expect("merge queue mutex poisoned");
        for (&index, path) in entries.iter() {
            let meta = std::fs::metadata(path).map_err(|_| MergeQueueError::PathMissing {
                index,
                path: path.display().to_string(),
            })?;
            if meta.len() == 0 {
                return Err(MergeQueueError::PathEmpty {
                    index,
                    path: path.display().to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn all_in_order_returns_ascending_paths() {
        let q = MergeQueue::new();
        q.add(2, PathBuf::from("/tmp/segment_000002.ts"));
        q.add(0, PathBuf::from("/tmp/segment_000000.ts"));
        q.add(1, PathBuf::from("/tmp/segment_000001.ts"));
        let ordered = q.all_in_order(3).unwrap();
        assert_eq!(
            ordered,
            vec![
                PathBuf::from("/tmp/segment_000000.ts"),
                PathBuf::from("/tmp/segment_000001.ts"),
                PathBuf::from("/tmp/segment_000002.ts"),
            ]
        );
    }

    #[test]
    fn all_in_order_fails_on_gap() {
        let q = MergeQueue::new();
        q.add(0, PathBuf::from("/tmp/segment_000000.ts"));
        q.add(2, PathBuf::from("/tmp/segment_000002.ts"));
        assert!(matches!(
            q.all_in_order(3),
            Err(MergeQueueError::MissingSegment(1))
        ));
    }

    #[test]
    fn add_is_idempotent_on_same_pair() {
        let q = MergeQueue::new();
        q.add(0, PathBuf::from("/tmp/a.ts"));
        q.add(0, PathBuf::from("/tmp/a.ts"));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn validate_rejects_missing_file() {
        let q = MergeQueue::new();
        q.add(0, PathBuf::from("/nonexistent/path/segment.ts"));
        assert!(q.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment_000000.ts");
        std::fs::File::create(&path).unwrap();
        let q = MergeQueue::new();
        q.add(0, path);
        assert!(q.validate().is_err());
    }

    #[test]
    fn validate_accepts_non_empty_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment_000000.ts");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"data").unwrap();
        let q = MergeQueue::new();
        q.add(0, path);
        assert!(q.validate().is_ok());
    }
}
