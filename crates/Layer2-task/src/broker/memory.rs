//! In-process broker

use super::{Broker, Job};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use taskhook_foundation::Result;
use tokio::time::Instant;

/// Stand-in deadline for delays too large to add to `Instant::now()`
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

struct Entry {
    ready_at: Instant,
    seq: u64,
    job: Job,
}

#[derive(Default)]
struct Queue {
    entries: Vec<Entry>,
    next_seq: u64,
}

/// Delayed FIFO queue; earliest `ready_at` first, ties in enqueue order
#[derive(Default)]
pub struct MemoryBroker {
    queue: Mutex<Queue>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn enqueue(&self, job: Job, delay: Duration) -> Result<()> {
        let mut queue = self.queue.lock();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        let now = Instant::now();
        queue.entries.push(Entry {
            ready_at: now.checked_add(delay).unwrap_or(now + FAR_FUTURE),
            seq,
            job,
        });
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Job>> {
        let now = Instant::now();
        let mut queue = self.queue.lock();
        let next = queue
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.ready_at <= now)
            .min_by_key(|(_, e)| (e.ready_at, e.seq))
            .map(|(idx, _)| idx);

        Ok(next.map(|idx| queue.entries.swap_remove(idx).job))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.queue.lock().entries.len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
