use std::sync::Arc;

use tokio::sync::watch;

/// Owning side of one cancellable request.
///
/// The store keeps exactly one of these per outstanding task fetch and hands
/// the matching [`CancelToken`] down to the adapter. Dropping the handle does
/// not cancel; call [`CancelHandle::cancel`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    id: u64,
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new(id: u64) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            id,
            tx: Arc::new(tx),
        }
    }

    /// Request id this handle was issued for.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observer side handed to adapters.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the owning handle is cancelled.
    ///
    /// Never resolves if the handle is dropped without cancelling, so it is
    /// safe to race against the request itself in `tokio::select!`.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let sender_dropped = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if sender_dropped {
            std::future::pending::<()>().await;
        }
    }
}
