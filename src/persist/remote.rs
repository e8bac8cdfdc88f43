//! Best-effort remote mirror of the local collections.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{attendance::AttendanceRecord, student::Student, types::Collection};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote rejected sync: {0}")]
    Rejected(String),
    #[error("remote sync timed out after {0:?}")]
    Timeout(Duration),
}

/// Body posted to the remote store, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncPayload {
    /// Full attendance ledger.
    SaveAttendance {
        /// Every record.
        records: Vec<AttendanceRecord>,
    },
    /// Full roster.
    SaveStudents {
        /// Every student.
        students: Vec<Student>,
    },
}

impl SyncPayload {
    pub fn collection(&self) -> Collection {
        match self {
            SyncPayload::SaveAttendance { .. } => Collection::Ledger,
            SyncPayload::SaveStudents { .. } => Collection::Roster,
        }
    }
}

/// A secondary store that mirrors local state. Failures are never fatal.
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    async fn sync_remote(&self, payload: &SyncPayload) -> Result<(), SyncError>;
}

#[derive(Debug, Deserialize)]
struct RemoteReply {
    success: bool,
    #[serde(default)]
    message: String,
}

/// Posts payloads as JSON to an HTTP endpoint.
pub struct HttpMirror {
    client: Client,
    endpoint: String,
}

impl HttpMirror {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteMirror for HttpMirror {
    async fn sync_remote(&self, payload: &SyncPayload) -> Result<(), SyncError> {
        let resp = self.client.post(&self.endpoint).json(payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::Rejected(format!("http status {status}")));
        }
        // Endpoints that answer with an empty body are treated as accepting.
        let body = resp.bytes().await?;
        if body.is_empty() {
            return Ok(());
        }
        match serde_json::from_slice::<RemoteReply>(&body) {
            Ok(reply) if !reply.success => Err(SyncError::Rejected(reply.message)),
            _ => Ok(()),
        }
    }
}
