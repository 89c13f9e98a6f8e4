use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::config::ExtractionMode;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::models::ids::SurfaceId;
use crate::core::surface::mesh::Mesh;
use crate::core::surface::{self, ExtractionStage, SurfaceAtom, SurfaceInput, SurfaceParams};

/// Lifecycle of a surface's mesh.
///
/// `Pending` moves to `Ready` or `Cancelled` exactly once. A `Ready` surface may
/// later become `Invalidated`. No state ever moves back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceStatus {
    Pending,
    Ready,
    Cancelled,
    Invalidated,
}

impl SurfaceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SurfaceStatus::Cancelled | SurfaceStatus::Invalidated)
    }
}

/// Sent to subscribers whenever a surface changes status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceEvent {
    pub id: SurfaceId,
    pub status: SurfaceStatus,
}

/// Owned inputs for one extraction, detached from the models they came from.
#[derive(Debug, Clone)]
pub struct SurfaceTask {
    pub id: SurfaceId,
    pub context: Vec<SurfaceAtom>,
    pub shown: Vec<bool>,
    pub focus: Option<Vec<SurfaceAtom>>,
    pub params: SurfaceParams,
}

#[derive(Debug)]
struct Slot {
    status: SurfaceStatus,
    mesh: Option<Arc<Mesh>>,
    subscribers: Vec<Sender<SurfaceEvent>>,
}

#[derive(Debug)]
struct Shared {
    id: SurfaceId,
    slot: Mutex<Slot>,
    changed: Condvar,
    cancel: AtomicBool,
}

/// Handle to one surface computation and its published mesh.
///
/// Clones share the same state. The mesh is visible only while the status is
/// [`SurfaceStatus::Ready`].
#[derive(Debug, Clone)]
pub struct SurfaceJob {
    shared: Arc<Shared>,
}

impl SurfaceJob {
    pub(crate) fn pending(id: SurfaceId) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                slot: Mutex::new(Slot {
                    status: SurfaceStatus::Pending,
                    mesh: None,
                    subscribers: Vec::new(),
                }),
                changed: Condvar::new(),
                cancel: AtomicBool::new(false),
            }),
        }
    }

    /// Starts `task`. In sync mode the call returns once the mesh is published;
    /// in async mode it returns immediately with a pending job.
    pub fn spawn(
        task: SurfaceTask,
        mode: ExtractionMode,
        reporter: Arc<ProgressReporter<'static>>,
    ) -> Result<Self, EngineError> {
        let job = Self::pending(task.id);
        match mode {
            ExtractionMode::Sync => job.run(task, &reporter),
            ExtractionMode::Async => {
                let worker = job.clone();
                thread::Builder::new()
                    .name(format!("molview-surface-{}", task.id.0))
                    .spawn(move || worker.run(task, &reporter))
                    .map_err(|e| {
                        EngineError::Internal(format!("Failed to start surface worker: {e}"))
                    })?;
            }
        }
        Ok(job)
    }

    pub(crate) fn run(&self, task: SurfaceTask, reporter: &ProgressReporter) {
        reporter.report(Progress::PhaseStart {
            name: "Surface extraction",
        });
        reporter.report(Progress::TaskStart {
            total_steps: ExtractionStage::COUNT,
        });

        let input = SurfaceInput {
            context: &task.context,
            shown: &task.shown,
            focus: task.focus.as_deref(),
        };
        let result = surface::extract_observed(&input, &task.params, &self.shared.cancel, |_| {
            reporter.report(Progress::TaskIncrement)
        });
        drop(task);

        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::PhaseFinish);

        match result {
            Ok(mesh) => {
                let triangles = mesh.triangle_count();
                if self.publish(mesh) {
                    info!(surface = %self.shared.id, triangles, "Surface ready");
                } else {
                    debug!(surface = %self.shared.id, "Surface finished after cancellation, mesh discarded");
                }
            }
            Err(_) => debug!(surface = %self.shared.id, "Surface computation cancelled"),
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.shared.id
    }

    pub fn status(&self) -> SurfaceStatus {
        self.lock().status
    }

    /// The published mesh, if the surface is ready.
    pub fn mesh(&self) -> Option<Arc<Mesh>> {
        let slot = self.lock();
        match slot.status {
            SurfaceStatus::Ready => slot.mesh.clone(),
            _ => None,
        }
    }

    /// Blocks until the surface leaves `Pending`.
    pub fn wait(&self) -> SurfaceStatus {
        let slot = self
            .shared
            .changed
            .wait_while(self.lock(), |slot| slot.status == SurfaceStatus::Pending)
            .unwrap_or_else(PoisonError::into_inner);
        slot.status
    }

    /// Like [`SurfaceJob::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> SurfaceStatus {
        let (slot, _) = self
            .shared
            .changed
            .wait_timeout_while(self.lock(), timeout, |slot| {
                slot.status == SurfaceStatus::Pending
            })
            .unwrap_or_else(PoisonError::into_inner);
        slot.status
    }

    /// Channel of future status changes. A surface that already left `Pending`
    /// reports its current status straight away.
    pub fn subscribe(&self) -> Receiver<SurfaceEvent> {
        let (tx, rx) = mpsc::channel();
        let mut slot = self.lock();
        if slot.status != SurfaceStatus::Pending {
            let _ = tx.send(SurfaceEvent {
                id: self.shared.id,
                status: slot.status,
            });
        }
        if !slot.status.is_terminal() {
            slot.subscribers.push(tx);
        }
        rx
    }

    /// Cancels a pending computation. Returns whether anything changed.
    pub fn cancel(&self) -> bool {
        let mut slot = self.lock();
        if slot.status != SurfaceStatus::Pending {
            return false;
        }
        self.shared.cancel.store(true, Ordering::Relaxed);
        self.transition(&mut slot, SurfaceStatus::Cancelled);
        true
    }

    /// Retires the surface: a pending job is cancelled, a ready mesh is dropped.
    pub fn invalidate(&self) -> bool {
        let mut slot = self.lock();
        match slot.status {
            SurfaceStatus::Pending => {
                self.shared.cancel.store(true, Ordering::Relaxed);
                self.transition(&mut slot, SurfaceStatus::Cancelled);
                true
            }
            SurfaceStatus::Ready => {
                slot.mesh = None;
                self.transition(&mut slot, SurfaceStatus::Invalidated);
                true
            }
            SurfaceStatus::Cancelled | SurfaceStatus::Invalidated => false,
        }
    }

    fn publish(&self, mesh: Mesh) -> bool {
        let mut slot = self.lock();
        if slot.status != SurfaceStatus::Pending {
            return false;
        }
        slot.mesh = Some(Arc::new(mesh));
        self.transition(&mut slot, SurfaceStatus::Ready);
        true
    }

    fn transition(&self, slot: &mut Slot, status: SurfaceStatus) {
        slot.status = status;
        let event = SurfaceEvent {
            id: self.shared.id,
            status,
        };
        slot.subscribers.retain(|tx| tx.send(event).is_ok());
        if status.is_terminal() {
            slot.subscribers.clear();
        }
        self.shared.changed.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.shared.slot.lock().unwrap_or_else(|poisoned| {
            warn!(surface = %self.shared.id, "Surface state lock was poisoned");
            poisoned.into_inner()
        })
    }
}
