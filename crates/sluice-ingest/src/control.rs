//! Pause, resume and stop for a running ingestion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Cloneable handle shared by the scheduler, its tasks and the operator.
///
/// Stop is honoured at file boundaries; files already running finish.
/// Pause blocks at file and embedding-batch boundaries.
#[derive(Debug, Clone)]
pub struct RunControl {
    inner: Arc<ControlInner>,
}

#[derive(Debug)]
struct ControlInner {
    stopped: AtomicBool,
    paused_tx: watch::Sender<bool>,
    paused_rx: watch::Receiver<bool>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        let (paused_tx, paused_rx) = watch::channel(false);
        Self {
            inner: Arc::new(ControlInner {
                stopped: AtomicBool::new(false),
                paused_tx,
                paused_rx,
            }),
        }
    }

    pub fn pause(&self) {
        info!("Ingestion paused");
        self.inner.paused_tx.send_replace(true);
    }

    pub fn resume(&self) {
        info!("Ingestion resumed");
        self.inner.paused_tx.send_replace(false);
    }

    /// Request a stop. Also releases anything blocked on pause.
    pub fn stop(&self) {
        info!("Ingestion stop requested");
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.paused_tx.send_replace(false);
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused_rx.borrow()
    }

    /// Wait until not paused.
    pub async fn wait_while_paused(&self) {
        let mut rx = self.inner.paused_rx.clone();
        // Sender lives in `inner`, so the channel cannot close under us.
        let _ = rx.wait_for(|paused| !*paused).await;
    }

    /// File boundary: wait out a pause, then report whether work may continue.
    pub async fn checkpoint(&self) -> bool {
        self.wait_while_paused().await;
        !self.is_stopped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_checkpoint_passes_when_running() {
        let control = RunControl::new();
        assert!(control.checkpoint().await);
        assert!(!control.is_paused());
    }

    #[tokio::test]
    async fn test_pause_blocks_until_resume() {
        let control = RunControl::new();
        control.pause();

        let waiting = {
            let control = control.clone();
            tokio::spawn(async move { control.checkpoint().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        control.resume();
        assert!(waiting.await.unwrap());
    }

    #[tokio::test]
    async fn test_stop_releases_paused_checkpoint() {
        let control = RunControl::new();
        control.pause();

        let waiting = {
            let control = control.clone();
            tokio::spawn(async move { control.checkpoint().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        control.stop();

        assert!(!waiting.await.unwrap());
        assert!(control.is_stopped());
    }
}
