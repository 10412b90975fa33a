pub mod layout_size_ratios;
pub mod layouts;
pub mod order_items;
pub mod orders;
pub mod plans;
pub mod production_logs;
pub mod tasks;
pub mod users;

pub use plans::PlanStatus;
pub use tasks::TaskStatus;
pub use users::UserRole;
