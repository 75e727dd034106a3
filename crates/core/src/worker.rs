use crate::config::AppConfig;
use crate::conflict::{ConflictDecision, ConflictHandler, Resolution};
use crate::processor::{FileProcessor, PlannedOperation, ProcessResult, Progress, RunError};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug)]
pub enum WorkerEvent {
    Progress(Progress),
    /// The worker is parked until this request is answered or dropped.
    Conflict(ConflictRequest),
    Discovered(Vec<PlannedOperation>),
    Executed(Vec<ProcessResult>),
    Failed(String),
    Cancelled,
}

#[derive(Debug)]
pub struct ConflictRequest {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    reply: SyncSender<ConflictDecision>,
}

impl ConflictRequest {
    /// Wakes the worker with `decision`. Dropping the request instead counts as `Resolution::Error`.
    pub fn respond(self, decision: ConflictDecision) {
        if self.reply.send(decision).is_err() {
            tracing::debug!("応答先のワーカーは既に終了しています");
        }
    }
}

struct ChannelConflictHandler {
    events: Sender<WorkerEvent>,
}

impl ConflictHandler for ChannelConflictHandler {
    fn resolve(&self, source: &Path, destination: &Path) -> ConflictDecision {
        let (reply, answer) = mpsc::sync_channel(1);
        let request = ConflictRequest {
            source_path: source.to_path_buf(),
            destination_path: destination.to_path_buf(),
            reply,
        };
        if self.events.send(WorkerEvent::Conflict(request)).is_err() {
            return ConflictDecision::once(Resolution::Error);
        }
        answer.recv().unwrap_or_else(|_| {
            tracing::warn!(destination = %destination.display(), "競合への応答がないためエラーとして扱います");
            ConflictDecision::once(Resolution::Error)
        })
    }
}

pub struct RunHandle {
    events: Receiver<WorkerEvent>,
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl RunHandle {
    pub fn recv(&self) -> Option<WorkerEvent> {
        self.events.recv().ok()
    }

    pub fn events(&self) -> mpsc::Iter<'_, WorkerEvent> {
        self.events.iter()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn join(self) -> Result<(), RunError> {
        self.thread
            .join()
            .map_err(|_| RunError::Fatal(anyhow::anyhow!("ワーカースレッドが異常終了しました")))
    }
}

pub fn spawn_discovery(
    config: &AppConfig,
    paths: Vec<PathBuf>,
    rule_id: String,
) -> Result<RunHandle> {
    let processor = FileProcessor::from_config(config);
    spawn_run("discovery", move |events, cancel| {
        let plans = processor.discover(
            &paths,
            &rule_id,
            |progress| {
                let _ = events.send(WorkerEvent::Progress(progress));
            },
            || cancel.load(Ordering::SeqCst),
        )?;
        if cancel.load(Ordering::SeqCst) {
            return Err(RunError::Cancelled);
        }
        Ok(WorkerEvent::Discovered(plans))
    })
}

pub fn spawn_execution(config: &AppConfig, plans: Vec<PlannedOperation>) -> Result<RunHandle> {
    let rules = config.rules.clone();
    spawn_run("execution", move |events, cancel| {
        let mut processor = FileProcessor::new(rules).with_conflict_handler(
            ChannelConflictHandler {
                events: events.clone(),
            },
        );
        let results = processor.execute(
            &plans,
            |progress| {
                let _ = events.send(WorkerEvent::Progress(progress));
            },
            || cancel.load(Ordering::SeqCst),
        )?;
        Ok(WorkerEvent::Executed(results))
    })
}

fn spawn_run<F>(kind: &'static str, task: F) -> Result<RunHandle>
where
    F: FnOnce(&Sender<WorkerEvent>, &AtomicBool) -> Result<WorkerEvent, RunError> + Send + 'static,
{
    let (events_tx, events_rx) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);

    let thread = thread::Builder::new()
        .name(format!("shiwake-{kind}"))
        .spawn(move || {
            tracing::debug!(kind, "ワーカーを開始します");
            let last = match task(&events_tx, &worker_cancel) {
                Ok(event) => event,
                Err(RunError::Cancelled) => {
                    tracing::info!(kind, "処理がキャンセルされました");
                    WorkerEvent::Cancelled
                }
                Err(RunError::Fatal(err)) => {
                    tracing::error!(kind, error = %format!("{err:#}"), "ワーカーでエラーが発生しました");
                    WorkerEvent::Failed(format!("{err:#}"))
                }
            };
            let _ = events_tx.send(last);
            tracing::debug!(kind, "ワーカーを終了します");
        })
        .context("ワーカースレッドを起動できませんでした")?;

    Ok(RunHandle {
        events: events_rx,
        cancel,
        thread,
    })
}
