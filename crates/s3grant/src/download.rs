//! Sample downloader
//!
//! Proves that at least one object under the target prefix is readable without
//! transferring whole objects. Folders are expanded breadth-first, newest name first.
//! Within a folder the most recent files are tried newest first, and each read is
//! stopped as soon as the first non-empty chunk arrives.

use crate::backend::{ChunkObserver, ListingEntry, ReadOutcome, StorageBackend};
use crate::config::ProbeConfig;
use crate::report::{CandidateObject, DownloadAttempt, ReportBuilder};

use std::collections::VecDeque;
use std::ops::ControlFlow;

use time::OffsetDateTime;
use tracing::{debug, info};

/// Fixed-capacity rolling buffer. Once full, each push evicts the oldest entry.
#[derive(Debug)]
pub struct CandidateWindow {
    buf: VecDeque<CandidateObject>,
    capacity: usize,
}

impl CandidateWindow {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, candidate: CandidateObject) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(candidate);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Empties the window, returning candidates newest first.
    ///
    /// Candidates without a timestamp sort last. Ties are broken by key, descending.
    pub fn drain_newest_first(&mut self) -> Vec<CandidateObject> {
        let mut candidates: Vec<_> = self.buf.drain(..).collect();
        candidates.sort_by(|a, b| (b.last_modified, &b.key).cmp(&(a.last_modified, &a.key)));
        candidates
    }
}

/// Stops the read at the first non-empty chunk.
#[derive(Debug, Default)]
pub struct FirstChunk {
    verified: bool,
}

impl FirstChunk {
    #[must_use]
    pub fn verified(&self) -> bool {
        self.verified
    }
}

impl ChunkObserver for FirstChunk {
    fn on_chunk(&mut self, bytes_read: u64, _total_bytes: Option<u64>) -> ControlFlow<()> {
        if bytes_read > 0 {
            self.verified = true;
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// How a folder visit ended.
enum Visit {
    Downloaded,
    Exhausted { subfolders: Vec<String> },
}

pub struct SampleDownloader<'a> {
    storage: &'a dyn StorageBackend,
    config: &'a ProbeConfig,
    cutoff: OffsetDateTime,
}

impl<'a> SampleDownloader<'a> {
    #[must_use]
    pub fn new(storage: &'a dyn StorageBackend, config: &'a ProbeConfig, now: OffsetDateTime) -> Self {
        Self {
            storage,
            config,
            cutoff: now - config.age_leniency(),
        }
    }

    /// Searches below `prefix`, starting from its already-fetched listing.
    ///
    /// Returns the number of successful downloads, which is zero or one.
    #[tracing::instrument(skip(self, entries, report), fields(entries = entries.len()))]
    pub async fn run(&self, bucket: &str, prefix: &str, entries: Vec<ListingEntry>, report: &mut ReportBuilder) -> usize {
        let mut frontier = match self.visit(bucket, prefix, entries, report).await {
            Visit::Downloaded => return 1,
            Visit::Exhausted { subfolders } => subfolders,
        };

        let mut expansions = 0;
        while !frontier.is_empty() {
            sort_newest_first(&mut frontier);
            let mut next = Vec::new();

            for folder in frontier {
                if expansions >= self.config.max_folder_expansions {
                    info!(expansions, "stopping download search at expansion limit");
                    return 0;
                }
                expansions += 1;

                let listing = self
                    .storage
                    .list_children(bucket, &folder, &self.config.delimiter, self.config.list_max_keys)
                    .await;
                let entries = match listing {
                    Ok(entries) => entries,
                    Err(err) => {
                        debug!(%folder, %err, "skipping unlistable folder");
                        continue;
                    }
                };

                match self.visit(bucket, &folder, entries, report).await {
                    Visit::Downloaded => return 1,
                    Visit::Exhausted { subfolders } => next.extend(subfolders),
                }
            }

            frontier = next;
        }

        0
    }

    async fn visit(&self, bucket: &str, folder: &str, entries: Vec<ListingEntry>, report: &mut ReportBuilder) -> Visit {
        let mut subfolders = Vec::new();
        let mut window = CandidateWindow::new(self.config.candidate_window);

        for entry in entries {
            match entry {
                ListingEntry::Folder { prefix } => {
                    if prefix != folder {
                        subfolders.push(prefix);
                    }
                }
                // zero-byte folder markers
                ListingEntry::File { key, .. } if key.ends_with(self.config.delimiter.as_str()) => {}
                ListingEntry::File { key, last_modified } => window.push(CandidateObject { key, last_modified }),
            }
        }

        debug!(%folder, files = window.len(), folders = subfolders.len(), "visiting folder");

        for candidate in window.drain_newest_first() {
            let attempt = self.try_download(bucket, candidate).await;
            let (succeeded, excused) = (attempt.succeeded, attempt.excused);
            report.record_download(attempt);

            if succeeded {
                return Visit::Downloaded;
            }
            if !excused {
                debug!(%folder, "recent object is unreadable, abandoning folder");
                break;
            }
        }

        Visit::Exhausted { subfolders }
    }

    async fn try_download(&self, bucket: &str, object: CandidateObject) -> DownloadAttempt {
        let mut observer = FirstChunk::default();
        let result = self.storage.partial_read(bucket, &object.key, &mut observer).await;

        match result {
            Ok(ReadOutcome::Stopped { bytes_read } | ReadOutcome::Completed { bytes_read }) => {
                info!(key = %object.key, bytes_read, "verified download");
                DownloadAttempt {
                    object,
                    succeeded: true,
                    excused: false,
                    reason: None,
                }
            }
            Err(err) => {
                let excused = object.last_modified.is_some_and(|t| t < self.cutoff);
                debug!(key = %object.key, %err, excused, "download failed");
                DownloadAttempt {
                    object,
                    succeeded: false,
                    excused,
                    reason: Some(err.to_string()),
                }
            }
        }
    }
}

fn sort_newest_first(folders: &mut [String]) {
    folders.sort_unstable_by(|a, b| b.cmp(a));
}

#[cfg(test)]
mod tests {
    use super::*;

    use time::macros::datetime;

    fn candidate(key: &str, last_modified: Option<OffsetDateTime>) -> CandidateObject {
        CandidateObject {
            key: key.into(),
            last_modified,
        }
    }

    #[test]
    fn window_keeps_most_recent() {
        let mut window = CandidateWindow::new(100);
        for i in 0..250 {
            window.push(candidate(&format!("k{i:03}"), None));
        }
        assert_eq!(window.len(), 100);

        let keys: Vec<_> = window.drain_newest_first().into_iter().map(|c| c.key).collect();
        assert_eq!(keys.first().map(String::as_str), Some("k249"));
        assert_eq!(keys.last().map(String::as_str), Some("k150"));
        assert!(window.is_empty());
    }

    #[test]
    fn window_orders_by_timestamp() {
        let mut window = CandidateWindow::new(10);
        window.push(candidate("undated", None));
        window.push(candidate("old", Some(datetime!(2020-01-01 0:00 UTC))));
        window.push(candidate("new", Some(datetime!(2024-06-01 0:00 UTC))));
        window.push(candidate("mid", Some(datetime!(2022-03-01 0:00 UTC))));

        let keys: Vec<_> = window.drain_newest_first().into_iter().map(|c| c.key).collect();
        assert_eq!(keys, ["new", "mid", "old", "undated"]);
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut window = CandidateWindow::new(0);
        window.push(candidate("a", None));
        window.push(candidate("b", None));
        assert_eq!(window.len(), 1);
        assert_eq!(window.drain_newest_first()[0].key, "b");
    }

    #[test]
    fn first_chunk_stops_read() {
        let mut observer = FirstChunk::default();
        assert_eq!(observer.on_chunk(0, Some(10)), ControlFlow::Continue(()));
        assert!(!observer.verified());
        assert_eq!(observer.on_chunk(4, Some(10)), ControlFlow::Break(()));
        assert!(observer.verified());
    }

    #[test]
    fn folders_newest_name_first() {
        let mut folders = vec!["raw/2023/".to_owned(), "raw/2025/".to_owned(), "raw/2024/".to_owned()];
        sort_newest_first(&mut folders);
        assert_eq!(folders, ["raw/2025/", "raw/2024/", "raw/2023/"]);
    }
}
