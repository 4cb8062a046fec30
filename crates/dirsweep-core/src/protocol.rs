/// Coordinator <-> worker message protocol.
///
/// Workers and the coordinator exchange nothing but these values. In-process
/// they travel over crossbeam channels; [`encode`] / [`decode`] give the JSON
/// form (`{"type": <tag>, "value": <payload>}`) for a worker hosted in another
/// process.
use crate::config::WorkerScanOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One child directory found while reading a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub path: PathBuf,
    pub is_target: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeResult {
    pub path: PathBuf,
    /// Bytes.
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Explore,
    GetSize,
}

/// A unit of work owned by exactly one worker until acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub kind: JobKind,
    pub path: PathBuf,
}

impl Job {
    pub fn explore(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: JobKind::Explore,
            path: path.into(),
        }
    }

    pub fn get_size(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: JobKind::GetSize,
            path: path.into(),
        }
    }

    pub fn into_message(self) -> WorkerMessage {
        match self.kind {
            JobKind::Explore => WorkerMessage::Explore { path: self.path },
            JobKind::GetSize => WorkerMessage::GetSize { path: self.path },
        }
    }
}

/// Every message that crosses the worker boundary, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "value",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum WorkerMessage {
    /// Coordinator -> worker, first message. The channels themselves are
    /// handed over when the worker thread is spawned.
    Startup { id: usize },
    /// Worker -> coordinator, reply to `Startup`.
    Alive,
    ExploreConfig(WorkerScanOptions),
    Explore { path: PathBuf },
    /// One directory read. `pending` is the worker's queue depth after it.
    ScanResult {
        results: Vec<ResultEntry>,
        worker_id: usize,
        pending: usize,
    },
    GetSize { path: PathBuf },
    GetSizeResult {
        results: SizeResult,
        worker_id: usize,
        pending: usize,
    },
    Stop,
    Error { worker_id: usize, message: String },
}

impl WorkerMessage {
    /// Wire tag, also used in log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Startup { .. } => "startup",
            Self::Alive => "alive",
            Self::ExploreConfig(_) => "exploreConfig",
            Self::Explore { .. } => "explore",
            Self::ScanResult { .. } => "scanResult",
            Self::GetSize { .. } => "getSize",
            Self::GetSizeResult { .. } => "getSizeResult",
            Self::Stop => "stop",
            Self::Error { .. } => "error",
        }
    }
}

pub fn encode(message: &WorkerMessage) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

pub fn decode(line: &str) -> serde_json::Result<WorkerMessage> {
    serde_json::from_str(line)
}
