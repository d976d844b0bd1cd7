//! Editor actor: the single owner of the mutable model
//!
//! Worker tasks post closures and await their result; the actor applies
//! them FIFO, which serializes every mutation and snapshot. This replaces
//! the host editor's UI-thread dispatch.

use archihub_core_types::{HubError, HubResult};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::model::Model;
use crate::snapshot::Snapshot;

type EditorTask = Box<dyn FnOnce(&mut Model) + Send>;

/// Cloneable handle for posting work onto the editor actor
#[derive(Clone)]
pub struct EditorHandle {
    tx: mpsc::UnboundedSender<EditorTask>,
}

/// Spawn the actor task owning `model` and return its handle
pub fn spawn_editor(model: Model) -> EditorHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<EditorTask>();
    tokio::spawn(async move {
        let mut model = model;
        info!(model = %model.name, "editor actor started");
        while let Some(task) = rx.recv().await {
            task(&mut model);
        }
        debug!("editor actor stopped");
    });
    EditorHandle { tx }
}

impl EditorHandle {
    /// Run `f` on the editor actor and await its result.
    ///
    /// The requesting task suspends until the actor has applied and
    /// acknowledged the closure; tasks run in post order.
    pub async fn dispatch<R, F>(&self, f: F) -> HubResult<R>
    where
        F: FnOnce(&mut Model) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Box::new(move |model| {
                let _ = done_tx.send(f(model));
            }))
            .map_err(|_| HubError::Fatal("editor actor is gone".into()))?;
        done_rx
            .await
            .map_err(|_| HubError::Fatal("editor actor dropped the task".into()))
    }

    /// Point-in-time structural copy for read endpoints
    pub async fn snapshot(&self) -> HubResult<Snapshot> {
        self.dispatch(|model| model.snapshot()).await
    }
}
