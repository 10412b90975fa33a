pub mod auth_service;
pub mod events;
mod lineage;
pub mod layout_service;
pub mod log_service;
pub mod order_service;
pub mod plan_service;
pub mod progress;
pub mod task_service;
pub mod user_service;

pub use auth_service::{AuthService, LoginResult, TokenPair};
pub use events::{RecordingObserver, TracingObserver, WorkflowEvent, WorkflowObserver};
pub use layout_service::LayoutService;
pub use log_service::{
    LogCreateRequest, LogFilter, LogOutcome, LogPage, LogService, SelfServiceVoid, VoidRequest,
};
pub use order_service::{OrderCreateRequest, OrderItemInput, OrderService, OrderWithItems};
pub use plan_service::{PlanCreateRequest, PlanService};
pub use progress::PlanTransition;
pub use task_service::TaskService;
pub use user_service::{ProfileUpdate, UserCreateRequest, UserFilter, UserService};
