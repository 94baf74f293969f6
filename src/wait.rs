//! Waiting on the first of a timer tick, an event or a cancellation.

use std::future::Future;

use tokio::sync::watch;
use tokio::time::Interval;

/// Creates a cancellation signal and its trigger.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Fires the paired [`Shutdown`] signals.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown { rx: self.tx.subscribe() }
    }
}

/// Cancellation signal. Once triggered it stays triggered.
///
/// If the trigger is dropped without firing, the signal never fires.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// A signal that is never triggered.
    pub fn never() -> Self {
        shutdown_channel().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal has been triggered.
    pub async fn cancelled(&mut self) {
        let triggered = self.rx.wait_for(|v| *v).await.is_ok();
        if !triggered {
            std::future::pending::<()>().await;
        }
    }
}

/// What ended a [`next_wake`] wait.
#[derive(Debug, PartialEq)]
pub enum Wake<T> {
    Tick,
    Event(T),
    Cancelled,
}

/// Waits for whichever comes first: cancellation, `event` completing, or the
/// next `ticker` tick. When several are ready, that is also the order of
/// priority.
///
/// `event` is borrowed so it can be awaited again after a tick; it must not
/// be polled once it returned [`Wake::Event`].
pub async fn next_wake<F>(ticker: &mut Interval, event: &mut F, shutdown: &mut Shutdown) -> Wake<F::Output>
where
    F: Future + Unpin,
{
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Wake::Cancelled,
        out = event => Wake::Event(out),
        _ = ticker.tick() => Wake::Tick,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ticker() -> Interval {
        let mut t = tokio::time::interval(Duration::from_secs(1));
        t.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        t
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_when_nothing_else() {
        let mut t = ticker();
        let mut event = Box::pin(std::future::pending::<()>());
        let mut shutdown = Shutdown::never();
        assert_eq!(next_wake(&mut t, &mut event, &mut shutdown).await, Wake::Tick);
        assert_eq!(next_wake(&mut t, &mut event, &mut shutdown).await, Wake::Tick);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_before_tick() {
        let mut t = ticker();
        t.tick().await;
        let mut event = Box::pin(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            42
        });
        let mut shutdown = Shutdown::never();
        assert_eq!(next_wake(&mut t, &mut event, &mut shutdown).await, Wake::Event(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wins() {
        let mut t = ticker();
        let (trigger, mut shutdown) = shutdown_channel();
        let mut event = Box::pin(async { 1 });
        trigger.trigger();
        assert!(shutdown.is_cancelled());
        assert_eq!(next_wake(&mut t, &mut event, &mut shutdown).await, Wake::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trigger_never_cancels() {
        let (trigger, mut shutdown) = shutdown_channel();
        drop(trigger);
        let done = tokio::time::timeout(Duration::from_secs(5), shutdown.cancelled()).await;
        assert!(done.is_err());
        assert!(!shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_subscribe_sees_trigger() {
        let (trigger, _shutdown) = shutdown_channel();
        let mut other = trigger.subscribe();
        trigger.trigger();
        other.cancelled().await;
        assert!(other.is_cancelled());
    }
}
