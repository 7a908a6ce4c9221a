//! Cancelable periodic tasks.
//!
//! Each polling loop runs on its own tokio task driven by
//! `interval_at(now + period, period)`, so the first tick lands one period
//! after start. The returned [`TaskHandle`] is the only way to stop it;
//! dropping the handle stops the loop as well.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::warn;

pub struct TaskHandle<T> {
    cancel_tx: Option<oneshot::Sender<()>>,
    join_handle: JoinHandle<Option<T>>,
}

impl<T: Send + 'static> TaskHandle<T> {
    /// Run `tick` every `period` until it breaks with a value or the handle cancels.
    pub fn every<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<T>> + Send,
    {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let join_handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut cancel_rx => return None,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = &mut cancel_rx => return None,
                    flow = tick() => {
                        if let ControlFlow::Break(value) = flow {
                            return Some(value);
                        }
                    }
                }
            }
        });
        Self { cancel_tx: Some(cancel_tx), join_handle }
    }

    /// Stop the loop and wait until it has exited.
    pub async fn cancel(mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.join_handle).await;
    }

    /// Wait for the loop to finish on its own. `None` if it was canceled.
    pub async fn join(mut self) -> Option<T> {
        match (&mut self.join_handle).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "scheduled task aborted");
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}
