use log::{info, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::runner::DetectionRun;

#[derive(Default)]
struct Pending {
    runs: VecDeque<DetectionRun>,
    /// Most recent registration, cleared once collected through `take_latest`.
    latest: Option<Uuid>,
}

/// Finished runs whose predictions have not been collected yet.
///
/// Each run is handed out at most once; taking it removes it. Only the most
/// recent run is reachable without an id.
#[derive(Clone)]
pub struct DetectionRegistry {
    pending: Arc<Mutex<Pending>>,
    capacity: usize,
}

impl DetectionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: Arc::new(Mutex::new(Pending::default())),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the run evicted to stay within capacity, if any.
    pub fn register(&self, run: DetectionRun) -> Option<DetectionRun> {
        let mut pending = self.lock();
        info!("Registering detection run {}", run.id);
        pending.latest = Some(run.id);
        pending.runs.push_back(run);
        if pending.runs.len() > self.capacity {
            let evicted = pending.runs.pop_front();
            if let Some(old) = &evicted {
                warn!(
                    "Evicting uncollected detection run {} ({}) from {}",
                    old.id,
                    old.source.display(),
                    old.created_at
                );
            }
            return evicted;
        }
        None
    }

    /// Takes the most recently registered run, if it has not been collected yet.
    pub fn take_latest(&self) -> Option<DetectionRun> {
        let mut pending = self.lock();
        let id = pending.latest.take()?;
        let index = pending.runs.iter().position(|run| run.id == id)?;
        pending.runs.remove(index)
    }

    pub fn take(&self, id: Uuid) -> Option<DetectionRun> {
        let mut pending = self.lock();
        let index = pending.runs.iter().position(|run| run.id == id)?;
        if pending.latest == Some(id) {
            pending.latest = None;
        }
        pending.runs.remove(index)
    }

    pub fn len(&self) -> usize {
        self.lock().runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().runs.is_empty()
    }
}
