use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};
use tracing::{debug, error, info, warn};

use crate::{
    attendance::{AttendanceRecord, RegisterOutcome},
    core::registrar::{CoreError, Registrar},
    op::Op,
    persist::{
        Gateway, PersistError,
        remote::{RemoteMirror, SyncError, SyncPayload},
    },
    report::Dataset,
    student::{Student, StudentDetails, StudentDraft, StudentFilter},
    types::{AttendanceStatus, Collection, RecordId},
};

use super::events::AttendanceEvent;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("local save failed: {0}")]
    Persist(#[from] PersistError),
    #[error("registrar runtime is not running")]
    ChannelClosed,
}

/// When a mutation is acknowledged to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// After the local gateway stored it; a failed save reverts the mutation.
    #[default]
    Durable,
    /// As soon as memory is updated; saves happen in the background.
    InMemory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub ack_mode: AckMode,
    /// In `InMemory` mode, write each save immediately instead of batching.
    pub flush_on_write: bool,
    pub batch_max_latency_ms: u64,
    pub persist_queue_bound: usize,
    pub sync_queue_bound: usize,
    pub remote_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ack_mode: AckMode::Durable,
            flush_on_write: true,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
            sync_queue_bound: 16,
            remote_timeout_ms: 5_000,
        }
    }
}

#[derive(Clone)]
pub struct RegistrarHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<AttendanceEvent>,
}

enum Command {
    Register {
        code: String,
        now: NaiveDateTime,
        status: AttendanceStatus,
        notes: Option<String>,
        resp: oneshot::Sender<Result<RegisterOutcome, RuntimeError>>,
    },
    RemoveRecord {
        id: RecordId,
        resp: oneshot::Sender<Result<AttendanceRecord, RuntimeError>>,
    },
    AddStudent {
        draft: StudentDraft,
        now: NaiveDateTime,
        resp: oneshot::Sender<Result<Student, RuntimeError>>,
    },
    UpdateStudent {
        code: String,
        details: StudentDetails,
        today: NaiveDate,
        resp: oneshot::Sender<Result<Student, RuntimeError>>,
    },
    SetActive {
        code: String,
        active: bool,
        resp: oneshot::Sender<Result<Student, RuntimeError>>,
    },
    FindStudent {
        code: String,
        resp: oneshot::Sender<Option<Student>>,
    },
    ListStudents {
        filter: StudentFilter,
        resp: oneshot::Sender<Vec<Student>>,
    },
    ListAttendance {
        date: NaiveDate,
        resp: oneshot::Sender<Vec<AttendanceRecord>>,
    },
    ListForStudent {
        code: String,
        resp: oneshot::Sender<Vec<AttendanceRecord>>,
    },
    Suggest {
        query: String,
        limit: usize,
        resp: oneshot::Sender<Vec<Student>>,
    },
    Snapshot {
        resp: oneshot::Sender<Dataset>,
    },
    Flush {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

/// Latest contents of each collection awaiting a local write.
#[derive(Debug, Default)]
struct SaveBatch {
    roster: Option<Vec<Student>>,
    ledger: Option<Vec<AttendanceRecord>>,
}

impl SaveBatch {
    fn for_ops(store: &Registrar, ops: &[Op]) -> Self {
        let mut batch = Self::default();
        for op in ops {
            match op.collection() {
                Collection::Roster if batch.roster.is_none() => {
                    batch.roster = Some(store.directory().export());
                }
                Collection::Ledger if batch.ledger.is_none() => {
                    batch.ledger = Some(store.ledger().export());
                }
                _ => {}
            }
        }
        batch
    }

    /// Newer contents replace older ones per collection.
    fn merge(&mut self, newer: SaveBatch) {
        if newer.roster.is_some() {
            self.roster = newer.roster;
        }
        if newer.ledger.is_some() {
            self.ledger = newer.ledger;
        }
    }

    fn is_empty(&self) -> bool {
        self.roster.is_none() && self.ledger.is_none()
    }

    fn into_payloads(self) -> Vec<SyncPayload> {
        let mut out = Vec::new();
        if let Some(students) = self.roster {
            out.push(SyncPayload::SaveStudents { students });
        }
        if let Some(records) = self.ledger {
            out.push(SyncPayload::SaveAttendance { records });
        }
        out
    }
}

enum PersistMsg {
    Save {
        batch: SaveBatch,
        resp: Option<oneshot::Sender<Result<(), PersistError>>>,
    },
    Flush {
        resp: oneshot::Sender<Result<(), PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

struct LoopCtx {
    events_tx: broadcast::Sender<AttendanceEvent>,
    persist_tx: Option<mpsc::Sender<PersistMsg>>,
    sync_tx: Option<mpsc::Sender<SyncPayload>>,
    config: RuntimeConfig,
}

/// Starts the single-writer loop that owns `registrar`.
///
/// `gateway` is the local durable tier; `mirror` is the optional best-effort
/// remote copy fed after every successful local save.
pub fn spawn_registrar(
    registrar: Registrar,
    gateway: Option<Box<dyn Gateway>>,
    mirror: Option<Arc<dyn RemoteMirror>>,
    config: RuntimeConfig,
) -> RegistrarHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<AttendanceEvent>(1024);

    let sync_tx = mirror.map(|mirror| {
        let (tx, rx) = mpsc::channel::<SyncPayload>(config.sync_queue_bound.max(1));
        spawn_sync_worker(
            mirror,
            rx,
            events_tx.clone(),
            Duration::from_millis(config.remote_timeout_ms),
        );
        tx
    });

    let persist_tx = gateway.map(|gateway| {
        let (tx, rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound.max(1));
        spawn_persistence_worker(
            gateway,
            rx,
            events_tx.clone(),
            sync_tx.clone(),
            config.clone(),
        );
        tx
    });

    let ctx = LoopCtx {
        events_tx: events_tx.clone(),
        persist_tx,
        sync_tx,
        config,
    };

    tokio::spawn(async move {
        let mut store = registrar;
        while let Some(cmd) = cmd_rx.recv().await {
            if handle_command(cmd, &mut store, &ctx).await {
                break;
            }
        }
        debug!("registrar loop stopped");
    });

    RegistrarHandle { cmd_tx, events_tx }
}

impl RegistrarHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<AttendanceEvent> {
        self.events_tx.subscribe()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Checks a student in using the local wall clock.
    pub async fn register(&self, code: impl Into<String>) -> Result<RegisterOutcome, RuntimeError> {
        self.register_at(code, Local::now().naive_local()).await
    }

    pub async fn register_at(
        &self,
        code: impl Into<String>,
        now: NaiveDateTime,
    ) -> Result<RegisterOutcome, RuntimeError> {
        self.register_with(code, now, AttendanceStatus::Present, None)
            .await
    }

    pub async fn register_with(
        &self,
        code: impl Into<String>,
        now: NaiveDateTime,
        status: AttendanceStatus,
        notes: Option<String>,
    ) -> Result<RegisterOutcome, RuntimeError> {
        let code = code.into();
        self.request(|resp| Command::Register {
            code,
            now,
            status,
            notes,
            resp,
        })
        .await?
    }

    pub async fn remove_record(&self, id: RecordId) -> Result<AttendanceRecord, RuntimeError> {
        self.request(|resp| Command::RemoveRecord { id, resp }).await?
    }

    pub async fn add_student(&self, draft: StudentDraft) -> Result<Student, RuntimeError> {
        let now = Local::now().naive_local();
        self.add_student_at(draft, now).await
    }

    pub async fn add_student_at(
        &self,
        draft: StudentDraft,
        now: NaiveDateTime,
    ) -> Result<Student, RuntimeError> {
        self.request(|resp| Command::AddStudent { draft, now, resp })
            .await?
    }

    pub async fn update_student(
        &self,
        code: impl Into<String>,
        details: StudentDetails,
    ) -> Result<Student, RuntimeError> {
        let code = code.into();
        let today = Local::now().date_naive();
        self.request(|resp| Command::UpdateStudent {
            code,
            details,
            today,
            resp,
        })
        .await?
    }

    pub async fn set_active(
        &self,
        code: impl Into<String>,
        active: bool,
    ) -> Result<Student, RuntimeError> {
        let code = code.into();
        self.request(|resp| Command::SetActive { code, active, resp })
            .await?
    }

    pub async fn find_student(&self, code: impl Into<String>) -> Result<Option<Student>, RuntimeError> {
        let code = code.into();
        self.request(|resp| Command::FindStudent { code, resp }).await
    }

    pub async fn list_students(&self, filter: StudentFilter) -> Result<Vec<Student>, RuntimeError> {
        self.request(|resp| Command::ListStudents { filter, resp })
            .await
    }

    pub async fn list_attendance(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, RuntimeError> {
        self.request(|resp| Command::ListAttendance { date, resp })
            .await
    }

    pub async fn list_for_student(
        &self,
        code: impl Into<String>,
    ) -> Result<Vec<AttendanceRecord>, RuntimeError> {
        let code = code.into();
        self.request(|resp| Command::ListForStudent { code, resp })
            .await
    }

    pub async fn suggest(
        &self,
        query: impl Into<String>,
        limit: usize,
    ) -> Result<Vec<Student>, RuntimeError> {
        let query = query.into();
        self.request(|resp| Command::Suggest { query, limit, resp })
            .await
    }

    /// Copies roster and ledger for read-only reporting.
    pub async fn snapshot(&self) -> Result<Dataset, RuntimeError> {
        self.request(|resp| Command::Snapshot { resp }).await
    }

    /// Waits until pending background saves reached the local store.
    pub async fn flush(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Flush { resp }).await?
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await?
    }
}

async fn handle_command(cmd: Command, store: &mut Registrar, ctx: &LoopCtx) -> bool {
    match cmd {
        Command::Register {
            code,
            now,
            status,
            notes,
            resp,
        } => {
            let res = match store.register_attendance_with(&code, now, status, notes) {
                Ok(outcome) => commit(store, ctx).await.map(|()| outcome),
                Err(err) => Err(RuntimeError::from(err)),
            };
            match &res {
                Ok(RegisterOutcome::Registered(rec)) => {
                    let _ = ctx.events_tx.send(AttendanceEvent::Registered {
                        id: rec.id,
                        code: rec.student_code.clone(),
                    });
                }
                Ok(RegisterOutcome::AlreadyRegistered(rec)) => {
                    let _ = ctx.events_tx.send(AttendanceEvent::AlreadyRegistered {
                        id: rec.id,
                        code: rec.student_code.clone(),
                    });
                }
                _ => {}
            }
            let _ = resp.send(res);
        }
        Command::RemoveRecord { id, resp } => {
            let res = mutate(store, ctx, |s| s.remove_record(id)).await;
            if res.is_ok() {
                let _ = ctx.events_tx.send(AttendanceEvent::RecordRemoved { id });
            }
            let _ = resp.send(res);
        }
        Command::AddStudent { draft, now, resp } => {
            let res = mutate(store, ctx, |s| s.add_student(draft, now)).await;
            if let Ok(student) = &res {
                let _ = ctx.events_tx.send(AttendanceEvent::StudentAdded {
                    code: student.code.clone(),
                });
            }
            let _ = resp.send(res);
        }
        Command::UpdateStudent {
            code,
            details,
            today,
            resp,
        } => {
            let res = mutate(store, ctx, |s| s.update_student(&code, details, today)).await;
            if res.is_ok() {
                let _ = ctx.events_tx.send(AttendanceEvent::StudentUpdated { code });
            }
            let _ = resp.send(res);
        }
        Command::SetActive { code, active, resp } => {
            let res = mutate(store, ctx, |s| s.set_active(&code, active)).await;
            if res.is_ok() {
                let _ = ctx
                    .events_tx
                    .send(AttendanceEvent::StudentActiveChanged { code, active });
            }
            let _ = resp.send(res);
        }
        Command::FindStudent { code, resp } => {
            let _ = resp.send(store.find_student(&code).cloned());
        }
        Command::ListStudents { filter, resp } => {
            let _ = resp.send(store.list_students(&filter));
        }
        Command::ListAttendance { date, resp } => {
            let _ = resp.send(store.list_attendance(date));
        }
        Command::ListForStudent { code, resp } => {
            let _ = resp.send(store.list_for_student(&code));
        }
        Command::Suggest { query, limit, resp } => {
            let _ = resp.send(store.suggest(&query, limit));
        }
        Command::Snapshot { resp } => {
            let _ = resp.send(Dataset::from_registrar(store));
        }
        Command::Flush { resp } => {
            let out = match &ctx.persist_tx {
                Some(tx) => {
                    let (flush_tx, flush_rx) = oneshot::channel();
                    if tx.send(PersistMsg::Flush { resp: flush_tx }).await.is_err() {
                        Err(RuntimeError::ChannelClosed)
                    } else {
                        flush_rx
                            .await
                            .map_err(|_| RuntimeError::ChannelClosed)
                            .and_then(|r| r.map_err(RuntimeError::from))
                    }
                }
                None => Ok(()),
            };
            let _ = resp.send(out);
        }
        Command::Shutdown { resp } => {
            let out = match &ctx.persist_tx {
                Some(tx) => {
                    let (done_tx, done_rx) = oneshot::channel();
                    if tx.send(PersistMsg::Shutdown { resp: done_tx }).await.is_err() {
                        Err(RuntimeError::ChannelClosed)
                    } else {
                        done_rx.await.map_err(|_| RuntimeError::ChannelClosed)
                    }
                }
                None => Ok(()),
            };
            info!("registrar shutting down");
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

async fn mutate<T>(
    store: &mut Registrar,
    ctx: &LoopCtx,
    f: impl FnOnce(&mut Registrar) -> Result<T, CoreError>,
) -> Result<T, RuntimeError> {
    let value = f(store)?;
    commit(store, ctx).await?;
    Ok(value)
}

/// Hands the collections touched by pending ops to the local tier.
///
/// In `Durable` mode a failed save reverts those ops before the error is
/// returned, so memory never runs ahead of the local store.
async fn commit(store: &mut Registrar, ctx: &LoopCtx) -> Result<(), RuntimeError> {
    let ops = store.drain_pending_ops();
    if ops.is_empty() {
        return Ok(());
    }
    let batch = SaveBatch::for_ops(store, &ops);

    let Some(tx) = &ctx.persist_tx else {
        if let Some(sync_tx) = &ctx.sync_tx {
            enqueue_sync(sync_tx, batch);
        }
        return Ok(());
    };

    match ctx.config.ack_mode {
        AckMode::InMemory => tx
            .send(PersistMsg::Save { batch, resp: None })
            .await
            .map_err(|_| RuntimeError::ChannelClosed),
        AckMode::Durable => {
            let (resp_tx, resp_rx) = oneshot::channel();
            tx.send(PersistMsg::Save {
                batch,
                resp: Some(resp_tx),
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
            let saved = resp_rx.await.map_err(|_| RuntimeError::ChannelClosed)?;
            if let Err(err) = saved {
                error!(error = %err, "local save failed, reverting mutation");
                for op in ops.into_iter().rev() {
                    if let Err(revert_err) = store.revert(op) {
                        error!(error = %revert_err, "revert after failed save did not apply");
                    }
                }
                return Err(RuntimeError::Persist(err));
            }
            Ok(())
        }
    }
}

fn enqueue_sync(sync_tx: &mpsc::Sender<SyncPayload>, batch: SaveBatch) {
    for payload in batch.into_payloads() {
        let collection = payload.collection();
        if let Err(err) = sync_tx.try_send(payload) {
            warn!(%collection, error = %err, "remote sync dropped, queue unavailable");
        }
    }
}

fn spawn_persistence_worker(
    gateway: Box<dyn Gateway>,
    mut rx: mpsc::Receiver<PersistMsg>,
    events_tx: broadcast::Sender<AttendanceEvent>,
    sync_tx: Option<mpsc::Sender<SyncPayload>>,
    config: RuntimeConfig,
) {
    let gateway = Arc::new(Mutex::new(gateway));
    let latency = Duration::from_millis(config.batch_max_latency_ms);
    tokio::spawn(async move {
        let mut pending = SaveBatch::default();
        let mut deadline = Instant::now() + latency;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = write_pending(&gateway, &mut pending, &events_tx, sync_tx.as_ref(), true).await;
                        break;
                    };

                    match msg {
                        PersistMsg::Save { batch, resp: Some(resp) } => {
                            pending.merge(batch);
                            let result = write_pending(&gateway, &mut pending, &events_tx, sync_tx.as_ref(), false).await;
                            let _ = resp.send(result);
                        }
                        PersistMsg::Save { batch, resp: None } => {
                            if pending.is_empty() {
                                deadline = Instant::now() + latency;
                            }
                            pending.merge(batch);
                            if config.flush_on_write {
                                let _ = write_pending(&gateway, &mut pending, &events_tx, sync_tx.as_ref(), true).await;
                            }
                        }
                        PersistMsg::Flush { resp } => {
                            let result = write_pending(&gateway, &mut pending, &events_tx, sync_tx.as_ref(), true).await;
                            let _ = resp.send(result);
                        }
                        PersistMsg::Shutdown { resp } => {
                            let _ = write_pending(&gateway, &mut pending, &events_tx, sync_tx.as_ref(), true).await;
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !pending.is_empty() => {
                    let _ = write_pending(&gateway, &mut pending, &events_tx, sync_tx.as_ref(), true).await;
                    deadline = Instant::now() + latency;
                }
            }
        }
    });
}

/// Writes whatever is pending. With `keep_on_failure` the batch stays queued
/// for the next attempt; otherwise it is discarded because the caller reverts.
async fn write_pending(
    gateway: &Arc<Mutex<Box<dyn Gateway>>>,
    pending: &mut SaveBatch,
    events_tx: &broadcast::Sender<AttendanceEvent>,
    sync_tx: Option<&mpsc::Sender<SyncPayload>>,
    keep_on_failure: bool,
) -> Result<(), PersistError> {
    if pending.is_empty() {
        return Ok(());
    }

    let batch = std::mem::take(pending);
    let gateway_ref = Arc::clone(gateway);
    let joined = tokio::task::spawn_blocking(move || {
        let mut gateway = gateway_ref.blocking_lock();
        let result = save_batch(&mut **gateway, &batch);
        (batch, result)
    })
    .await;

    let (batch, result) = match joined {
        Ok(out) => out,
        Err(e) => return Err(PersistError::Message(format!("join error: {e}"))),
    };

    match result {
        Ok(()) => {
            for collection in touched(&batch) {
                debug!(%collection, "collection saved locally");
                let _ = events_tx.send(AttendanceEvent::Saved { collection });
            }
            if let Some(sync_tx) = sync_tx {
                enqueue_sync(sync_tx, batch);
            }
            Ok(())
        }
        Err((collection, err)) => {
            error!(%collection, error = %err, "local save failed");
            let _ = events_tx.send(AttendanceEvent::PersistFailed {
                collection,
                message: err.to_string(),
            });
            if keep_on_failure {
                let newer = std::mem::take(pending);
                *pending = batch;
                pending.merge(newer);
            }
            Err(err)
        }
    }
}

fn save_batch(
    gateway: &mut dyn Gateway,
    batch: &SaveBatch,
) -> Result<(), (Collection, PersistError)> {
    if let Some(students) = &batch.roster {
        gateway
            .save_roster(students)
            .map_err(|e| (Collection::Roster, e))?;
    }
    if let Some(records) = &batch.ledger {
        gateway
            .save_ledger(records)
            .map_err(|e| (Collection::Ledger, e))?;
    }
    Ok(())
}

fn touched(batch: &SaveBatch) -> Vec<Collection> {
    let mut out = Vec::new();
    if batch.roster.is_some() {
        out.push(Collection::Roster);
    }
    if batch.ledger.is_some() {
        out.push(Collection::Ledger);
    }
    out
}

fn spawn_sync_worker(
    mirror: Arc<dyn RemoteMirror>,
    mut rx: mpsc::Receiver<SyncPayload>,
    events_tx: broadcast::Sender<AttendanceEvent>,
    timeout: Duration,
) {
    tokio::spawn(async move {
        while let Some(first) = rx.recv().await {
            // Only the newest state of each collection is worth sending.
            let mut roster = None;
            let mut ledger = None;
            let mut next = Some(first);
            while let Some(payload) = next.take() {
                match payload.collection() {
                    Collection::Roster => roster = Some(payload),
                    Collection::Ledger => ledger = Some(payload),
                }
                next = rx.try_recv().ok();
            }

            for payload in [roster, ledger].into_iter().flatten() {
                let collection = payload.collection();
                let result = match tokio::time::timeout(timeout, mirror.sync_remote(&payload)).await {
                    Ok(inner) => inner,
                    Err(_) => Err(SyncError::Timeout(timeout)),
                };
                match result {
                    Ok(()) => {
                        debug!(%collection, "remote mirror updated");
                        let _ = events_tx.send(AttendanceEvent::Synced { collection });
                    }
                    Err(err) => {
                        warn!(%collection, error = %err, "remote sync failed, local copy kept");
                        let _ = events_tx.send(AttendanceEvent::SyncWarning {
                            collection,
                            message: err.to_string(),
                        });
                    }
                }
            }
        }
    });
}
