//! File-backed trust storage.
//!
//! Layout under `root`:
//!
//! ```text
//! scorecards/<agent_id>/<scorecard_id>.json
//! scorecards/<agent_id>/latest.json
//! scorecards/history.jsonl
//! lineage/by_id/<lineage_id>.json
//! lineage/by_source/<agent_id>/<lineage_id>.json
//! lineage/by_target/<agent_id>/<lineage_id>.json
//! lineage/pair_index.json
//! ```
//!
//! `latest.json` and `pair_index.json` are replaced via temp file + rename.
//! Writes are serialized through a single async mutex.

use crate::traits::{newest_first_lineage, newest_first_scorecards, LineageStore, ScorecardStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use governance_types::{AgentId, Scorecard, TimeWindow, TrustLineageRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const LATEST_FILE: &str = "latest.json";
const HISTORY_FILE: &str = "history.jsonl";
const PAIR_INDEX_FILE: &str = "pair_index.json";

/// source -> target -> most recent lineage id
type PairIndex = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Serialize, Deserialize)]
struct HistoryEntry {
    agent_id: AgentId,
    scorecard_id: String,
}

pub struct FileTrustStorage {
    root: PathBuf,
    pair_index: Mutex<PairIndex>,
    write_lock: Mutex<()>,
}

impl FileTrustStorage {
    /// Open (creating if needed) a storage tree rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        for dir in [
            root.join("scorecards"),
            root.join("lineage").join("by_id"),
            root.join("lineage").join("by_source"),
            root.join("lineage").join("by_target"),
        ] {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StorageError::io(&dir, e))?;
        }

        let index_path = root.join("lineage").join(PAIR_INDEX_FILE);
        let pair_index = read_json::<PairIndex>(&index_path)
            .await?
            .unwrap_or_default();
        debug!(root = %root.display(), "Opened file trust storage");

        Ok(Self {
            root,
            pair_index: Mutex::new(pair_index),
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scorecard_root(&self) -> PathBuf {
        self.root.join("scorecards")
    }

    fn agent_dir(&self, agent_id: &AgentId) -> StorageResult<PathBuf> {
        Ok(self.scorecard_root().join(segment(agent_id.as_str())?))
    }

    fn lineage_dir(&self, index: &str) -> PathBuf {
        self.root.join("lineage").join(index)
    }
}

#[async_trait]
impl ScorecardStore for FileTrustStorage {
    async fn store_scorecard(&self, scorecard: Scorecard) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let dir = self.agent_dir(&scorecard.agent_id)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;

        let path = dir.join(format!("{}.json", segment(&scorecard.scorecard_id)?));
        let body = to_json(&scorecard)?;
        write_new(&path, &body).await?;

        // The scorecard only counts as stored once latest points at it.
        if let Err(e) = replace_file(&dir.join(LATEST_FILE), &body).await {
            if let Err(cleanup) = fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %cleanup, "Failed to roll back scorecard");
            }
            return Err(e);
        }

        let entry = HistoryEntry {
            agent_id: scorecard.agent_id.clone(),
            scorecard_id: scorecard.scorecard_id.clone(),
        };
        let history = self.scorecard_root().join(HISTORY_FILE);
        if let Err(e) = append_line(&history, &to_json(&entry)?).await {
            warn!(path = %history.display(), error = %e, "Failed to append global history");
        }
        Ok(())
    }

    async fn latest_scorecard(&self, agent_id: &AgentId) -> StorageResult<Option<Scorecard>> {
        read_json(&self.agent_dir(agent_id)?.join(LATEST_FILE)).await
    }

    async fn get_scorecard(
        &self,
        agent_id: &AgentId,
        scorecard_id: &str,
    ) -> StorageResult<Option<Scorecard>> {
        let path = self
            .agent_dir(agent_id)?
            .join(format!("{}.json", segment(scorecard_id)?));
        read_json(&path).await
    }

    async fn scorecard_history(
        &self,
        agent_id: &AgentId,
        window: TimeWindow,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Scorecard>> {
        let mut values: Vec<Scorecard> = read_json_dir(&self.agent_dir(agent_id)?)
            .await?
            .into_iter()
            .filter(|sc: &Scorecard| window.contains(&sc.timestamp))
            .collect();
        newest_first_scorecards(&mut values);
        if let Some(limit) = limit {
            values.truncate(limit);
        }
        Ok(values)
    }

    async fn global_history(&self, limit: usize) -> StorageResult<Vec<Scorecard>> {
        let path = self.scorecard_root().join(HISTORY_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        let mut out = Vec::new();
        for line in content.lines().rev() {
            if out.len() >= limit {
                break;
            }
            let entry: HistoryEntry = match serde_json::from_str(line) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed history line");
                    continue;
                }
            };
            if let Some(sc) = self
                .get_scorecard(&entry.agent_id, &entry.scorecard_id)
                .await?
            {
                out.push(sc);
            }
        }
        Ok(out)
    }

    async fn list_agents(&self) -> StorageResult<Vec<AgentId>> {
        let root = self.scorecard_root();
        let mut entries = fs::read_dir(&root)
            .await
            .map_err(|e| StorageError::io(&root, e))?;
        let mut agents = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&root, e))?
        {
            let path = entry.path();
            if path.is_dir() && path.join(LATEST_FILE).exists() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    agents.push(AgentId::new(name));
                }
            }
        }
        agents.sort();
        Ok(agents)
    }
}

#[async_trait]
impl LineageStore for FileTrustStorage {
    async fn store_lineage(&self, record: TrustLineageRecord) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let file_name = format!("{}.json", segment(&record.lineage_id)?);
        let source = segment(record.source_agent.id.as_str())?.to_string();
        let target = segment(record.target_agent.id.as_str())?.to_string();
        let body = to_json(&record)?;

        let mut written = Vec::new();
        let result = self
            .write_lineage_files(&record, &file_name, &source, &target, &body, &mut written)
            .await;
        if let Err(e) = result {
            for path in written.iter().rev() {
                if let Err(cleanup) = fs::remove_file(path).await {
                    warn!(path = %path.display(), error = %cleanup, "Failed to roll back lineage file");
                }
            }
            return Err(e);
        }
        Ok(())
    }

    async fn get_lineage(&self, lineage_id: &str) -> StorageResult<Option<TrustLineageRecord>> {
        let path = self
            .lineage_dir("by_id")
            .join(format!("{}.json", segment(lineage_id)?));
        read_json(&path).await
    }

    async fn lineage_by_source(
        &self,
        agent_id: &AgentId,
    ) -> StorageResult<Vec<TrustLineageRecord>> {
        let dir = self.lineage_dir("by_source").join(segment(agent_id.as_str())?);
        let mut records = read_json_dir(&dir).await?;
        newest_first_lineage(&mut records);
        Ok(records)
    }

    async fn lineage_by_target(
        &self,
        agent_id: &AgentId,
    ) -> StorageResult<Vec<TrustLineageRecord>> {
        let dir = self.lineage_dir("by_target").join(segment(agent_id.as_str())?);
        let mut records = read_json_dir(&dir).await?;
        newest_first_lineage(&mut records);
        Ok(records)
    }

    async fn pair_lookup(
        &self,
        source: &AgentId,
        target: &AgentId,
    ) -> StorageResult<Option<String>> {
        let index = self.pair_index.lock().await;
        Ok(index
            .get(source.as_str())
            .and_then(|targets| targets.get(target.as_str()))
            .cloned())
    }
}

/// Reject ids that would escape their directory.
fn segment(id: &str) -> StorageResult<&str> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(StorageError::InvalidInput(format!(
            "'{}' is not usable as a storage key",
            id
        )));
    }
    Ok(id)
}

fn to_json<T: Serialize>(value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::Serialization(format!("{}: {}", path.display(), e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

/// Every `*.json` record in `dir` except the latest pointer.
async fn read_json_dir<T: DeserializeOwned>(dir: &Path) -> StorageResult<Vec<T>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io(dir, e)),
    };
    let mut out = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::io(dir, e))?
    {
        let path = entry.path();
        let is_record = path.extension().map_or(false, |ext| ext == "json")
            && path.file_name().map_or(false, |name| name != LATEST_FILE);
        if !is_record {
            continue;
        }
        if let Some(value) = read_json(&path).await? {
            out.push(value);
        }
    }
    Ok(out)
}

impl FileTrustStorage {
    /// Writes the lineage copies and the pair index. Every file created is
    /// pushed onto `written` so the caller can undo a partial write.
    async fn write_lineage_files(
        &self,
        record: &TrustLineageRecord,
        file_name: &str,
        source: &str,
        target: &str,
        body: &str,
        written: &mut Vec<PathBuf>,
    ) -> StorageResult<()> {
        let by_id = self.lineage_dir("by_id").join(file_name);
        write_new(&by_id, body).await?;
        written.push(by_id);
        for dir in [
            self.lineage_dir("by_source").join(source),
            self.lineage_dir("by_target").join(target),
        ] {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StorageError::io(&dir, e))?;
            let path = dir.join(file_name);
            write_new(&path, body).await?;
            written.push(path);
        }

        let mut index = self.pair_index.lock().await;
        let mut updated = index.clone();
        updated
            .entry(source.to_string())
            .or_default()
            .insert(target.to_string(), record.lineage_id.clone());
        let index_path = self.lineage_dir(PAIR_INDEX_FILE);
        replace_file(&index_path, &to_json(&updated)?).await?;
        *index = updated;
        Ok(())
    }
}

async fn write_new(path: &Path, body: &str) -> StorageResult<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                StorageError::Conflict(format!("{} already exists", path.display()))
            } else {
                StorageError::io(path, e)
            }
        })?;
    file.write_all(body.as_bytes())
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.flush().await.map_err(|e| StorageError::io(path, e))
}

async fn replace_file(path: &Path, body: &str) -> StorageResult<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body)
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| StorageError::io(path, e))
}

async fn append_line(path: &Path, line: &str) -> StorageResult<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.write_all(format!("{}\n", line).as_bytes())
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.flush().await.map_err(|e| StorageError::io(path, e))
}
