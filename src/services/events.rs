use std::sync::{Arc, Mutex};

use tracing::info;

/// State transitions reported to observers after the owning transaction commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowEvent {
    OrderCreated { order_id: i32, order_number: String },
    OrderDeleted { order_id: i32 },
    PlanCreated { plan_id: i32, order_id: i32 },
    PlanDeleted { plan_id: i32 },
    PlanPublished { plan_id: i32 },
    PlanCompleted { plan_id: i32 },
    PlanReopened { plan_id: i32 },
    PlanFrozen { plan_id: i32 },
    LayoutCreated { layout_id: i32, plan_id: i32 },
    LayoutDeleted { layout_id: i32 },
    TaskCreated { task_id: i32, layout_id: i32 },
    TaskDeleted { task_id: i32 },
    LogCreated { log_id: i32, task_id: i32, layers: i32 },
    LogVoided { log_id: i32, task_id: i32, voided_by: Option<i32> },
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::OrderCreated { .. } => "order_created",
            WorkflowEvent::OrderDeleted { .. } => "order_deleted",
            WorkflowEvent::PlanCreated { .. } => "plan_created",
            WorkflowEvent::PlanDeleted { .. } => "plan_deleted",
            WorkflowEvent::PlanPublished { .. } => "plan_published",
            WorkflowEvent::PlanCompleted { .. } => "plan_completed",
            WorkflowEvent::PlanReopened { .. } => "plan_reopened",
            WorkflowEvent::PlanFrozen { .. } => "plan_frozen",
            WorkflowEvent::LayoutCreated { .. } => "layout_created",
            WorkflowEvent::LayoutDeleted { .. } => "layout_deleted",
            WorkflowEvent::TaskCreated { .. } => "task_created",
            WorkflowEvent::TaskDeleted { .. } => "task_deleted",
            WorkflowEvent::LogCreated { .. } => "log_created",
            WorkflowEvent::LogVoided { .. } => "log_voided",
        }
    }
}

pub trait WorkflowObserver: Send + Sync {
    fn notify(&self, event: &WorkflowEvent);
}

/// Emits one `info!` line per event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl WorkflowObserver for TracingObserver {
    fn notify(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::OrderCreated {
                order_id,
                order_number,
            } => info!(event = event.name(), order_id, %order_number, "Order created"),
            WorkflowEvent::OrderDeleted { order_id } => {
                info!(event = event.name(), order_id, "Order deleted")
            }
            WorkflowEvent::PlanCreated { plan_id, order_id } => {
                info!(event = event.name(), plan_id, order_id, "Plan created")
            }
            WorkflowEvent::PlanDeleted { plan_id }
            | WorkflowEvent::PlanPublished { plan_id }
            | WorkflowEvent::PlanCompleted { plan_id }
            | WorkflowEvent::PlanReopened { plan_id }
            | WorkflowEvent::PlanFrozen { plan_id } => {
                info!(event = event.name(), plan_id, "Plan status event")
            }
            WorkflowEvent::LayoutCreated { layout_id, plan_id } => {
                info!(event = event.name(), layout_id, plan_id, "Layout created")
            }
            WorkflowEvent::LayoutDeleted { layout_id } => {
                info!(event = event.name(), layout_id, "Layout deleted")
            }
            WorkflowEvent::TaskCreated { task_id, layout_id } => {
                info!(event = event.name(), task_id, layout_id, "Task created")
            }
            WorkflowEvent::TaskDeleted { task_id } => {
                info!(event = event.name(), task_id, "Task deleted")
            }
            WorkflowEvent::LogCreated {
                log_id,
                task_id,
                layers,
            } => info!(event = event.name(), log_id, task_id, layers, "Log created"),
            WorkflowEvent::LogVoided {
                log_id,
                task_id,
                voided_by,
            } => info!(
                event = event.name(),
                log_id,
                task_id,
                voided_by = ?voided_by,
                "Log voided"
            ),
        }
    }
}

/// Keeps every event in memory. Used by tests to assert on transitions.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(WorkflowEvent::name).collect()
    }
}

impl WorkflowObserver for RecordingObserver {
    fn notify(&self, event: &WorkflowEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

pub(crate) fn default_observer() -> Arc<dyn WorkflowObserver> {
    Arc::new(TracingObserver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        observer.notify(&WorkflowEvent::PlanPublished { plan_id: 1 });
        observer.notify(&WorkflowEvent::PlanCompleted { plan_id: 1 });

        assert_eq!(observer.names(), vec!["plan_published", "plan_completed"]);
    }
}
