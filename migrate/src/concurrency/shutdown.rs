use tokio::sync::watch;

/// Sending half of the shutdown signal.
///
/// Cloning is cheap, every clone triggers the same signal.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Signals shutdown to every receiver, including ones subscribed later.
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    /// Creates a receiver that already observes a shutdown signalled earlier.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiving half of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Whether shutdown has been signalled, without waiting.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Completes once shutdown has been signalled.
    ///
    /// If every sender is dropped without signalling, this never completes.
    pub async fn wait(&mut self) {
        if self.0.wait_for(|shutdown| *shutdown).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a shutdown channel that has not been signalled yet.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn late_subscribers_observe_shutdown() {
        let (tx, _rx) = create_shutdown_channel();
        tx.shutdown();

        let mut late = tx.subscribe();
        assert!(late.is_shutdown());
        tokio::time::timeout(Duration::from_secs(1), late.wait())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn wait_blocks_until_signalled() {
        let (tx, mut rx) = create_shutdown_channel();

        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.wait())
                .await
                .is_err()
        );

        tx.shutdown();
        rx.wait().await;
        assert!(rx.is_shutdown());
    }
}
