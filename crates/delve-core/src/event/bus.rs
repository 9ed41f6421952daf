//! Broadcast bus distributing `ResearchEvent`s to live observers.
//!
//! Built on `tokio::sync::broadcast`. Publishing never blocks and never
//! fails: with no subscribers the event is dropped, and a subscriber that
//! falls behind by more than the channel capacity sees `Lagged` and skips
//! ahead.

use delve_types::research::{JobId, ResearchEvent};
use tokio::sync::broadcast;

/// Multi-consumer bus for research progress events.
///
/// Cloning the bus clones the sender.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ResearchEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every event published from now on, for all jobs.
    pub fn subscribe(&self) -> broadcast::Receiver<ResearchEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ResearchEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

/// Wait for the next event belonging to `job_id`, skipping other jobs and
/// lag notifications. Returns `None` once the bus is closed.
pub async fn next_for_job(
    rx: &mut broadcast::Receiver<ResearchEvent>,
    job_id: JobId,
) -> Option<ResearchEvent> {
    loop {
        match rx.recv().await {
            Ok(event) if event.job_id() == job_id => return Some(event),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(%job_id, skipped, "progress subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_types::research::{JobStatus, ResearchStep};

    fn step_event(job_id: JobId, label: &str) -> ResearchEvent {
        ResearchEvent::Step {
            job_id,
            step: ResearchStep::new(label, "detail"),
        }
    }

    #[tokio::test]
    async fn subscribers_each_receive_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let id = JobId::new();

        bus.publish(step_event(id, "Starting research"));

        assert_eq!(rx1.recv().await.unwrap().job_id(), id);
        assert_eq!(rx2.recv().await.unwrap().job_id(), id);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let bus = EventBus::new(16);
        bus.publish(step_event(JobId::new(), "Starting research"));
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn next_for_job_filters_other_jobs() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let mine = JobId::new();
        let other = JobId::new();

        bus.publish(step_event(other, "Starting research"));
        bus.publish(ResearchEvent::Finished {
            job_id: mine,
            status: JobStatus::Completed,
            error: None,
        });

        let event = next_for_job(&mut rx, mine).await.unwrap();
        assert!(matches!(
            event,
            ResearchEvent::Finished {
                status: JobStatus::Completed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn next_for_job_survives_lag() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        let id = JobId::new();

        for i in 0..6 {
            bus.publish(step_event(id, &format!("step {i}")));
        }

        let event = next_for_job(&mut rx, id).await.unwrap();
        match event {
            ResearchEvent::Step { step, .. } => assert_eq!(step.label, "step 4"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn next_for_job_returns_none_when_closed() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        drop(bus);
        assert!(next_for_job(&mut rx, JobId::new()).await.is_none());
    }
}
