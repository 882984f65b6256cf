//! Debounced, coalescing auto-save for manual entry
//!
//! Edits are buffered by field. Every edit restarts the quiet-period timer;
//! when it expires, one save carries the latest non-blank value of every
//! buffered field. Save failures are logged and dropped so that typing is
//! never interrupted.
//!
//! The timer lives in a task owned by [`AutoSaver`]. Dropping the saver
//! aborts the task, so nothing fires after the owning form is gone.

use crate::backend::IntakeBackend;
use crate::gate::non_blank;
use agrisk_model::{AssessmentId, IntakeAnswers};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Quiet period used by manual entry
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

enum Command {
    Edit { field: String, value: String },
    Flush(oneshot::Sender<()>),
}

/// Handle to a running auto-save task
#[derive(Debug)]
pub struct AutoSaver {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl AutoSaver {
    /// Start the task on the current runtime
    #[must_use]
    pub fn spawn(
        backend: Arc<dyn IntakeBackend>,
        assessment: AssessmentId,
        debounce: Duration,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(backend, assessment, debounce, rx));
        Self { commands, task }
    }

    /// Buffer an edit and restart the quiet period
    pub fn record(&self, field: impl Into<String>, value: impl Into<String>) {
        let command = Command::Edit {
            field: field.into(),
            value: value.into(),
        };
        if self.commands.send(command).is_err() {
            tracing::debug!("auto-save task gone; edit not buffered");
        }
    }

    /// Save buffered edits now and wait for the attempt to finish
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    backend: Arc<dyn IntakeBackend>,
    assessment: AssessmentId,
    debounce: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut buffered: BTreeMap<String, String> = BTreeMap::new();
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Edit { field, value }) => {
                    buffered.insert(field, value);
                    deadline = Some(Instant::now() + debounce);
                }
                Some(Command::Flush(done)) => {
                    deadline = None;
                    save(backend.as_ref(), assessment, &mut buffered).await;
                    let _ = done.send(());
                }
                None => break,
            },
            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                save(backend.as_ref(), assessment, &mut buffered).await;
            }
        }
    }
}

async fn save(
    backend: &dyn IntakeBackend,
    assessment: AssessmentId,
    buffered: &mut BTreeMap<String, String>,
) {
    let answers = non_blank(&std::mem::take(buffered));
    if answers.is_empty() {
        return;
    }
    let fields = answers.len();
    match backend
        .save_answers(assessment, &IntakeAnswers::new(answers))
        .await
    {
        Ok(()) => tracing::debug!(%assessment, fields, "auto-saved"),
        Err(e) => tracing::warn!(%assessment, fields, error = %e, "auto-save failed"),
    }
}
