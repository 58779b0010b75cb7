//! One-shot readiness signal
//!
//! `ReadyNotifier::notify` consumes the notifier, so a signal fires at most once.
//! Waiters observe either the published value or, if the notifier is dropped
//! without firing, `None`.

use tokio::sync::watch;

/// Create a linked notifier/signal pair
pub fn ready_signal<T: Clone>() -> (ReadyNotifier<T>, ReadySignal<T>) {
    let (tx, rx) = watch::channel(None);
    (ReadyNotifier { tx }, ReadySignal { rx })
}

/// Firing half
#[derive(Debug)]
pub struct ReadyNotifier<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> ReadyNotifier<T> {
    pub fn notify(self, value: T) {
        // send only fails when every waiter is gone
        let _ = self.tx.send(Some(value));
    }
}

/// Waiting half, cheap to clone
#[derive(Debug, Clone)]
pub struct ReadySignal<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> ReadySignal<T> {
    /// Wait until fired. `None` if the notifier was dropped first.
    pub async fn wait(&self) -> Option<T> {
        let mut rx = self.rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        }
    }

    /// Current value without waiting
    pub fn get(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.rx.borrow().is_some()
    }
}
