//! Periodic local-clock ticks for live displays.
//!
//! The dashboard holds no timers; a presentation layer that wants a ticking
//! clock subscribes here and drops the [`Subscription`] when done.

use chrono::{DateTime, Local};
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};

pub struct Ticker;

impl Ticker {
    /// Tick every `period`, starting immediately. Must be called inside a tokio runtime.
    pub fn subscribe(period: Duration) -> Subscription {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                // A full channel means the consumer is behind; skip this tick.
                match tx.try_send(Local::now()) {
                    Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        });
        Subscription { rx, task }
    }
}

pub struct Subscription {
    rx: mpsc::Receiver<DateTime<Local>>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Wait for the next tick; `None` once unsubscribed.
    pub async fn next(&mut self) -> Option<DateTime<Local>> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
