use chrono::Local;
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::api::SessionNotifier;
use crate::error::Result;
use crate::game::{Effect, EndedReport};
use crate::history::{HistoryLog, HistoryRecord};
use crate::session::SessionStatus;
use crate::store::{KvStore, SessionArchive};

/// Everything an effect can touch
pub struct ReportSinks<S: KvStore> {
    pub archive: SessionArchive<S>,
    pub history: Option<HistoryLog>,
    pub keylog_dir: Option<PathBuf>,
    pub notifier: Box<dyn SessionNotifier>,
}

impl<S: KvStore> ReportSinks<S> {
    /// Run one effect. Each step is independent: a failure is logged and
    /// the remaining steps still run.
    pub fn execute(&self, effect: Effect) {
        match effect {
            Effect::SessionStarted(session) => {
                if let Err(e) = self.notifier.session_started(&session) {
                    warn!(session_id = %session.session_id(), error = %e, "session start notification failed");
                }
            }
            Effect::SessionEnded(report) => self.session_ended(&report),
        }
    }

    fn session_ended(&self, report: &EndedReport) {
        let session_id = report.session.session_id();

        if let Err(e) = self.persist(report) {
            warn!(%session_id, error = %e, "failed to store session");
        }
        if let Some(history) = &self.history {
            if let Err(e) = history.append(&HistoryRecord::from_report(report, Local::now())) {
                warn!(%session_id, error = %e, "failed to append history");
            }
        }
        if let Err(e) = self.write_keylog(report) {
            warn!(%session_id, error = %e, "failed to write keystroke log");
        }
        if let Err(e) = self.notifier.session_ended(report) {
            warn!(%session_id, error = %e, "session end notification failed");
        }
    }

    fn persist(&self, report: &EndedReport) -> Result<()> {
        match report.session.status() {
            SessionStatus::Anky => self.archive.push_anky(&report.session)?,
            SessionStatus::Draft => self.archive.push_draft(&report.session)?,
            other => {
                debug!(status = %other, "nothing to store");
                return Ok(());
            }
        }
        self.archive.mark_wrote(Local::now().date_naive())?;
        // the continuation replaces the draft it was resumed from
        if let Some(resumed) = &report.resumed_from {
            if self.archive.discard_draft(resumed)? {
                debug!(draft_id = %resumed, "resumed draft replaced");
            }
        }
        Ok(())
    }

    fn write_keylog(&self, report: &EndedReport) -> Result<()> {
        let (Some(dir), Some(log)) = (&self.keylog_dir, &report.keylog) else {
            return Ok(());
        };
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.txt", report.session.session_id()));
        fs::write(&path, log)?;
        debug!(path = %path.display(), "keystroke log written");
        Ok(())
    }
}

enum Task {
    Run(Effect),
    Shutdown,
}

/// Executes effects on a single worker thread, in the order they were
/// dispatched. Callers never wait for an effect to finish.
pub struct Reporter {
    tx: Sender<Task>,
    worker: Option<JoinHandle<()>>,
}

impl Reporter {
    pub fn spawn<S: KvStore + 'static>(sinks: ReportSinks<S>) -> Self {
        let (tx, rx) = mpsc::channel::<Task>();

        let worker = thread::spawn(move || {
            for task in rx {
                match task {
                    Task::Run(effect) => sinks.execute(effect),
                    Task::Shutdown => break,
                }
            }
            debug!("reporter stopped");
        });

        Self {
            tx,
            worker: Some(worker),
        }
    }

    pub fn dispatch(&self, effect: Effect) {
        if self.tx.send(Task::Run(effect)).is_err() {
            warn!("reporter is gone, dropping effect");
        }
    }

    /// Finish every queued effect, then stop the worker
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.tx.send(Task::Shutdown);
        if worker.join().is_err() {
            warn!("reporter worker panicked");
        } else {
            info!("reporter drained");
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.stop();
    }
}
