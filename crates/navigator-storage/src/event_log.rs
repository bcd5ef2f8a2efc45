//! Append-only per-instance event log.
//!
//! One newline-delimited JSON file per instance at
//! `tenants/{tenant}/events/{kind}/{instance_id}.jsonl`. Writes append a
//! single line and optionally fsync; a crash mid-write leaves at most one
//! partial trailing line, which reads silently skip.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use navigator_types::LifecycleRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed json in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Filters for [`EventLog::list`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub limit: Option<usize>,
    pub since_ts: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct EventLog {
    root: PathBuf,
}

impl EventLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, tenant_id: &str, kind: &str, instance_id: &str) -> PathBuf {
        self.root
            .join("tenants")
            .join(tenant_id)
            .join("events")
            .join(kind)
            .join(format!("{instance_id}.jsonl"))
    }

    /// Appends one record as a single JSON line, fsyncing when `fsync` is set.
    pub fn append(
        &self,
        tenant_id: &str,
        kind: &str,
        instance_id: &str,
        record: &LifecycleRecord,
        fsync: bool,
    ) -> Result<usize, EventLogError> {
        let path = self.path_for(tenant_id, kind, instance_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| EventLogError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut line = serde_json::to_vec(record).map_err(|source| EventLogError::Malformed {
            path: path.clone(),
            source,
        })?;
        let bytes_written = line.len() + 1;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| EventLogError::Io {
                path: path.clone(),
                source,
            })?;
        file.write_all(&line).map_err(|source| EventLogError::Io {
            path: path.clone(),
            source,
        })?;
        if fsync {
            file.sync_all().map_err(|source| EventLogError::Io {
                path: path.clone(),
                source,
            })?;
        }
        Ok(bytes_written)
    }

    /// Lists records for an instance, newest-last, applying `opts`. A
    /// partial trailing line (no final newline at crash time) is skipped.
    pub fn list(
        &self,
        tenant_id: &str,
        kind: &str,
        instance_id: &str,
        opts: &ListOptions,
    ) -> Result<Vec<LifecycleRecord>, EventLogError> {
        let path = self.path_for(tenant_id, kind, instance_id);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(EventLogError::Io {
                    path: path.clone(),
                    source,
                })
            }
        };

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| EventLogError::Io {
                path: path.clone(),
                source,
            })?;
            if line.is_empty() {
                continue;
            }
            let record: LifecycleRecord = match serde_json::from_str(&line) {
                Ok(record) => record,
                // A truncated trailing line from a crash mid-write; not an error.
                Err(_) => break,
            };
            if let Some(since) = opts.since_ts {
                if record.ts < since {
                    continue;
                }
            }
            records.push(record);
        }

        if let Some(limit) = opts.limit {
            let start = records.len().saturating_sub(limit);
            records.drain(..start);
        }

        Ok(records)
    }

    /// Removes the event-log file for one instance entirely.
    pub fn remove(&self, tenant_id: &str, kind: &str, instance_id: &str) -> Result<(), EventLogError> {
        let path = self.path_for(tenant_id, kind, instance_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(EventLogError::Io { path, source }),
        }
    }

    /// Deletes event-log files for `tenant_id` whose most recent record is
    /// older than `keep_days`. Returns the number of files removed.
    pub fn prune(&self, tenant_id: &str, keep_days: i64, now: DateTime<Utc>) -> Result<usize, EventLogError> {
        let tenant_events_dir = self.root.join("tenants").join(tenant_id).join("events");
        let cutoff = now - chrono::Duration::days(keep_days);
        let mut removed = 0;

        let kind_dirs = match fs::read_dir(&tenant_events_dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(EventLogError::Io {
                    path: tenant_events_dir,
                    source,
                })
            }
        };

        for kind_dir in kind_dirs {
            let kind_dir = kind_dir
                .map_err(|source| EventLogError::Io {
                    path: tenant_events_dir.clone(),
                    source,
                })?
                    .path();
            if !kind_dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&kind_dir).map_err(|source| EventLogError::Io {
                path: kind_dir.clone(),
                source,
            })? {
                let path = entry
                    .map_err(|source| EventLogError::Io {
                        path: kind_dir.clone(),
                        source,
                    })?
                        .path();
                if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                    continue;
                }
                if last_record_ts(&path)?.is_some_and(|ts| ts < cutoff) {
                    fs::remove_file(&path).map_err(|source| EventLogError::Io {
                        path: path.clone(),
                        source,
                    })?;
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

fn last_record_ts(path: &Path) -> Result<Option<DateTime<Utc>>, EventLogError> {
    let file = fs::File::open(path).map_err(|source| EventLogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut last = None;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| EventLogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if let Ok(record) = serde_json::from_str::<LifecycleRecord>(&line) {
            last = Some(record.ts);
        }
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use navigator_types::{InstanceId, LifecycleKind, TenantId};

    fn record(ts: DateTime<Utc>) -> LifecycleRecord {
        LifecycleRecord {
            ts,
            kind: LifecycleKind::Transition,
            instance_id: InstanceId::generate(),
            tenant_id: TenantId::from("acme"),
            payload: serde_json::Map::new(),
        }
    }

    #[test]
    fn append_then_list_round_trips_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path());
        let t0 = Utc::now();
        let r1 = record(t0);
        let r2 = record(t0 + chrono::Duration::seconds(1));

        log.append("acme", "door", "inst-1", &r1, false).unwrap();
        log.append("acme", "door", "inst-1", &r2, false).unwrap();

        let listed = log
            .list("acme", "door", "inst-1", &ListOptions::default())
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].ts, r1.ts);
        assert_eq!(listed[1].ts, r2.ts);
    }

    #[test]
    fn list_respects_limit_and_keeps_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path());
        let t0 = Utc::now();
        for i in 0..5 {
            let r = record(t0 + chrono::Duration::seconds(i));
            log.append("acme", "door", "inst-1", &r, false).unwrap();
        }

        let opts = ListOptions {
            limit: Some(2),
            since_ts: None,
        };
        let listed = log.list("acme", "door", "inst-1", &opts).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].ts, t0 + chrono::Duration::seconds(3));
        assert_eq!(listed[1].ts, t0 + chrono::Duration::seconds(4));
    }

    #[test]
    fn list_respects_since_ts() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path());
        let t0 = Utc::now();
        for i in 0..3 {
            let r = record(t0 + chrono::Duration::seconds(i));
            log.append("acme", "door", "inst-1", &r, false).unwrap();
        }

        let opts = ListOptions {
            limit: None,
            since_ts: Some(t0 + chrono::Duration::seconds(1)),
        };
        let listed = log.list("acme", "door", "inst-1", &opts).unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn list_for_missing_instance_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path());
        let listed = log
            .list("acme", "door", "ghost", &ListOptions::default())
            .unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn partial_trailing_line_is_skipped_not_errored() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path());
        let r1 = record(Utc::now());
        log.append("acme", "door", "inst-1", &r1, false).unwrap();

        let path = log.path_for("acme", "door", "inst-1");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"ts\":\"truncated").unwrap();

        let listed = log
            .list("acme", "door", "inst-1", &ListOptions::default())
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn prune_removes_logs_older_than_keep_days() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path());
        let now = Utc::now();
        let old = record(now - chrono::Duration::days(40));
        let fresh = record(now - chrono::Duration::days(1));

        log.append("acme", "door", "old-inst", &old, false).unwrap();
        log.append("acme", "door", "fresh-inst", &fresh, false)
            .unwrap();

        let removed = log.prune("acme", 30, now).unwrap();
        assert_eq!(removed, 1);
        assert!(log
            .list("acme", "door", "old-inst", &ListOptions::default())
            .unwrap()
            .is_empty());
        assert!(!log
            .list("acme", "door", "fresh-inst", &ListOptions::default())
            .unwrap()
            .is_empty());
    }
}
