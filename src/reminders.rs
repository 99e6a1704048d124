//! Feeding reminders
//!
//! A poller checks the feeding schedule once a minute and queues a reminder
//! for every feeding due in 15 minutes. Workers drain the queue through
//! `GET /api/worker/reminders`. Entries expire after a TTL and the queue is
//! capped so an unattended server does not grow it without bound.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use serde::Serialize;
use tokio::sync::Mutex;
use crate::storage::{DueFeeding, SqliteStore};

pub const DEFAULT_REMINDER_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_REMINDER_CAPACITY: usize = 256;
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reminder {
    #[serde(rename = "feeding_ID")]
    pub feeding_id: i64,
    #[serde(rename = "pond_ID")]
    pub pond_id: i64,
    pub reminder_time: String,
    pub message: String,
}

impl Reminder {
    pub fn for_feeding(feeding: &DueFeeding, reminder_time: &str) -> Self {
        Self {
            feeding_id: feeding.feeding_id,
            pond_id: feeding.pond_id,
            reminder_time: reminder_time.to_string(),
            message: format!(
                "Feeding reminder: Pond {} needs feeding at {}",
                feeding.pond_id, feeding.feeding_time
            ),
        }
    }
}

/// Process-scoped reminder queue with expiry and a size cap
#[derive(Debug)]
pub struct ReminderQueue {
    entries: Mutex<VecDeque<(Instant, Reminder)>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for ReminderQueue {
    fn default() -> Self {
        Self::new(DEFAULT_REMINDER_TTL, DEFAULT_REMINDER_CAPACITY)
    }
}

impl ReminderQueue {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub async fn push(&self, reminder: Reminder) {
        self.push_at(Instant::now(), reminder).await;
    }

    async fn push_at(&self, now: Instant, reminder: Reminder) {
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, now, self.ttl);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back((now, reminder));
    }

    /// Take every live reminder, oldest first, leaving the queue empty
    pub async fn drain(&self) -> Vec<Reminder> {
        self.drain_at(Instant::now()).await
    }

    async fn drain_at(&self, now: Instant) -> Vec<Reminder> {
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, now, self.ttl);
        entries.drain(..).map(|(_, reminder)| reminder).collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

fn evict_expired(entries: &mut VecDeque<(Instant, Reminder)>, now: Instant, ttl: Duration) {
    while let Some((created, _)) = entries.front() {
        if now.saturating_duration_since(*created) < ttl {
            break;
        }
        entries.pop_front();
    }
}

/// Queue reminders for feedings due 15 minutes after `now` (`HH:MM:SS`)
pub async fn check_feedings(database_path: PathBuf, queue: &ReminderQueue, now: String) -> crate::Result<usize> {
    let at = now.clone();
    let due = tokio::task::spawn_blocking(move || {
        let store = SqliteStore::open_read_only(&database_path)?;
        store.feedings_due(&at)
    })
    .await
    .map_err(|e| crate::Error::Io(std::io::Error::other(e)))??;

    for feeding in &due {
        let reminder = Reminder::for_feeding(feeding, &now);
        tracing::info!(pond = feeding.pond_id, feeding_time = feeding.feeding_time.as_str(), "Reminder created");
        queue.push(reminder).await;
    }
    Ok(due.len())
}

/// Poll the feeding schedule every minute until the task is dropped
pub fn spawn_poller(database_path: PathBuf, queue: Arc<ReminderQueue>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            ticker.tick().await;
            let now = chrono::Local::now().format("%H:%M:00").to_string();
            if let Err(e) = check_feedings(database_path.clone(), &queue, now).await {
                tracing::error!("Error checking reminders: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reminder(pond: i64) -> Reminder {
        Reminder::for_feeding(
            &DueFeeding { feeding_id: pond, pond_id: pond, feeding_time: "06:00:00".to_string() },
            "05:45:00",
        )
    }

    #[test]
    fn test_reminder_message_and_json() {
        let json = serde_json::to_value(reminder(2)).unwrap();
        assert_eq!(json["feeding_ID"], 2);
        assert_eq!(json["pond_ID"], 2);
        assert_eq!(json["reminder_time"], "05:45:00");
        assert_eq!(json["message"], "Feeding reminder: Pond 2 needs feeding at 06:00:00");
    }

    #[tokio::test]
    async fn test_drain_empties_queue() {
        let queue = ReminderQueue::default();
        queue.push(reminder(1)).await;
        queue.push(reminder(2)).await;

        let drained = queue.drain().await;
        assert_eq!(drained.iter().map(|r| r.pond_id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(queue.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_expired_reminders_are_dropped() {
        let queue = ReminderQueue::new(Duration::from_secs(60), 10);
        let start = Instant::now();
        queue.push_at(start, reminder(1)).await;
        queue.push_at(start + Duration::from_secs(30), reminder(2)).await;

        let drained = queue.drain_at(start + Duration::from_secs(61)).await;
        assert_eq!(drained.iter().map(|r| r.pond_id).collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn test_capacity_drops_oldest() {
        let queue = ReminderQueue::new(Duration::from_secs(60), 2);
        for pond in 1..=3 {
            queue.push(reminder(pond)).await;
        }

        assert_eq!(queue.len().await, 2);
        let drained = queue.drain().await;
        assert_eq!(drained.iter().map(|r| r.pond_id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_check_feedings_queues_due_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("farm.db");
        SqliteStore::open(&path).unwrap().initialize_demo_schema(true).unwrap();

        let queue = ReminderQueue::default();
        let count = check_feedings(path.clone(), &queue, "17:45:00".to_string()).await.unwrap();
        assert_eq!(count, 1);

        let drained = queue.drain().await;
        assert_eq!(drained[0].message, "Feeding reminder: Pond 1 needs feeding at 18:00:00");
    }

    #[tokio::test]
    async fn test_check_feedings_reports_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        SqliteStore::open(&path).unwrap().execute_batch("CREATE TABLE t (x INTEGER)").unwrap();

        let queue = ReminderQueue::default();
        assert!(check_feedings(path, &queue, "17:45:00".to_string()).await.is_err());
        assert_eq!(queue.len().await, 0);
    }
}
