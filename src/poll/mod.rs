mod client;

pub use client::ApiClient;

use crate::models::Room;
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const STATUS_BOARD_INTERVAL: Duration = Duration::from_secs(1);
pub const ROOM_VIEW_INTERVAL: Duration = Duration::from_secs(2);

/// Re-fetches a full snapshot on a fixed interval and publishes it.
///
/// A failed fetch keeps the previous snapshot. Local snapshots pushed with
/// `apply_local` are visible immediately and stand until the next tick.
/// Polling stops when the poller is dropped; a fetch still in flight at
/// that point is discarded.
pub struct Poller<T> {
    sender: watch::Sender<Option<T>>,
    task: JoinHandle<()>,
}

impl<T: Clone + Send + Sync + 'static> Poller<T> {
    pub fn spawn<F, Fut>(period: Duration, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (sender, _) = watch::channel(None);
        let publisher = sender.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match fetch().await {
                    Ok(snapshot) => {
                        publisher.send_replace(Some(snapshot));
                    }
                    Err(e) => tracing::warn!("Poll failed, keeping last snapshot: {:#}", e),
                }
            }
        });

        Self { sender, task }
    }

    pub fn snapshot(&self) -> Option<T> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.sender.subscribe()
    }

    pub fn apply_local(&self, snapshot: T) {
        self.sender.send_replace(Some(snapshot));
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Status board: every room, once a second.
pub fn status_board(client: ApiClient) -> Poller<Vec<Room>> {
    Poller::spawn(STATUS_BOARD_INTERVAL, move || {
        let client = client.clone();
        async move { client.list_rooms().await }
    })
}

/// Room view: one room, every two seconds.
pub fn room_view(client: ApiClient, room_id: String) -> Poller<Room> {
    Poller::spawn(ROOM_VIEW_INTERVAL, move || {
        let client = client.clone();
        let room_id = room_id.clone();
        async move { client.get_room(&room_id).await }
    })
}

/// Flip a panel and show the server's answer without waiting for the next tick.
pub async fn toggle_panel(client: &ApiClient, view: &Poller<Room>, panel_id: &str) -> Result<Room> {
    let current = view
        .snapshot()
        .ok_or_else(|| anyhow::anyhow!("Room has not loaded yet"))?;
    let panel = current
        .panel(panel_id)
        .ok_or_else(|| anyhow::anyhow!("Panel {} not found in {}", panel_id, current.room_id))?;

    let updated = client
        .update_panel_status(&current.room_id, panel_id, panel.status.toggled())
        .await?;
    view.apply_local(updated.clone());
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn counting_poller(period: Duration, fail_on: Option<usize>) -> (Poller<usize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let poller = Poller::spawn(period, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if Some(n) == fail_on {
                    anyhow::bail!("network down");
                }
                Ok(n)
            }
        });
        (poller, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_tick_replaces_snapshot() {
        let start = Instant::now();
        let (poller, _) = counting_poller(STATUS_BOARD_INTERVAL, None);
        let mut rx = poller.subscribe();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(0));

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(1));
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_keeps_previous_snapshot() {
        let start = Instant::now();
        let (poller, _) = counting_poller(ROOM_VIEW_INTERVAL, Some(1));
        let mut rx = poller.subscribe();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(0));

        // tick 1 fails silently, tick 2 is the next publish
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(2));
        assert!(start.elapsed() >= 2 * ROOM_VIEW_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_snapshot_stands_until_next_tick() {
        let (poller, _) = counting_poller(ROOM_VIEW_INTERVAL, None);
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();
        rx.borrow_and_update();

        poller.apply_local(99);
        assert_eq!(poller.snapshot(), Some(99));

        rx.changed().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let (poller, calls) = counting_poller(STATUS_BOARD_INTERVAL, None);
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();

        drop(poller);
        let seen = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }
}
