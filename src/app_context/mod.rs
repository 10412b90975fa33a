use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::{Actor, Authorizer, RolePermissions};
use crate::config::{AppConfig, ConfigError, VoidPolicy};
use crate::errors::{CoreError, CoreResult};
use crate::services::{
    AuthService, LayoutService, LogService, OrderService, PlanService, TaskService,
    TracingObserver, UserService, WorkflowObserver,
};

mod layout_operations;
mod log_operations;
mod order_operations;
mod plan_operations;
mod session_operations;
mod task_operations;
mod user_operations;

/// Actor-aware entry point for every core operation.
///
/// Each call rejects inactive actors, checks the role permission table, then
/// delegates to the owning service. Self-service rules for workers are
/// applied here as well.
#[derive(Clone)]
pub struct AppContext {
    db: DatabaseConnection,
    authorizer: Arc<dyn Authorizer>,
    void_policy: VoidPolicy,
    observer: Arc<dyn WorkflowObserver>,
    auth_service: Arc<AuthService>,
    user_service: Arc<UserService>,
    order_service: Arc<OrderService>,
    plan_service: Arc<PlanService>,
    layout_service: Arc<LayoutService>,
    task_service: Arc<TaskService>,
    log_service: Arc<LogService>,
}

impl AppContext {
    pub fn new(db: DatabaseConnection, auth_service: AuthService) -> Self {
        let observer: Arc<dyn WorkflowObserver> = Arc::new(TracingObserver);
        Self {
            user_service: Arc::new(UserService::new(db.clone())),
            order_service: Arc::new(OrderService::new(db.clone()).with_observer(observer.clone())),
            plan_service: Arc::new(PlanService::new(db.clone()).with_observer(observer.clone())),
            layout_service: Arc::new(
                LayoutService::new(db.clone()).with_observer(observer.clone()),
            ),
            task_service: Arc::new(TaskService::new(db.clone()).with_observer(observer.clone())),
            log_service: Arc::new(LogService::new(db.clone()).with_observer(observer.clone())),
            auth_service: Arc::new(auth_service),
            authorizer: Arc::new(RolePermissions::default()),
            void_policy: VoidPolicy::default(),
            observer,
            db,
        }
    }

    pub fn from_config(db: DatabaseConnection, config: &AppConfig) -> Result<Self, ConfigError> {
        let permissions = config.load_permissions()?;
        let auth_service = AuthService::from_config(db.clone(), config);
        Ok(Self::new(db, auth_service).with_authorizer(Arc::new(permissions)))
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_void_policy(mut self, policy: VoidPolicy) -> Self {
        self.void_policy = policy;
        self
    }

    /// Rebuilds the workflow services so they report to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        let db = &self.db;
        self.order_service = Arc::new(OrderService::new(db.clone()).with_observer(observer.clone()));
        self.plan_service = Arc::new(PlanService::new(db.clone()).with_observer(observer.clone()));
        self.layout_service =
            Arc::new(LayoutService::new(db.clone()).with_observer(observer.clone()));
        self.task_service = Arc::new(TaskService::new(db.clone()).with_observer(observer.clone()));
        self.log_service = Arc::new(LogService::new(db.clone()).with_observer(observer.clone()));
        self.observer = observer;
        self
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn void_policy(&self) -> VoidPolicy {
        self.void_policy
    }

    pub fn observer(&self) -> &Arc<dyn WorkflowObserver> {
        &self.observer
    }

    pub fn auth_service(&self) -> &Arc<AuthService> {
        &self.auth_service
    }

    pub fn user_service(&self) -> &Arc<UserService> {
        &self.user_service
    }

    pub fn order_service(&self) -> &Arc<OrderService> {
        &self.order_service
    }

    pub fn plan_service(&self) -> &Arc<PlanService> {
        &self.plan_service
    }

    pub fn layout_service(&self) -> &Arc<LayoutService> {
        &self.layout_service
    }

    pub fn task_service(&self) -> &Arc<TaskService> {
        &self.task_service
    }

    pub fn log_service(&self) -> &Arc<LogService> {
        &self.log_service
    }

    fn ensure_active(actor: &Actor) -> CoreResult<()> {
        if actor.is_active() {
            Ok(())
        } else {
            Err(CoreError::forbidden(format!(
                "User {} is inactive",
                actor.user_id
            )))
        }
    }

    pub(crate) fn authorize(&self, actor: &Actor, permission: &str) -> CoreResult<()> {
        Self::ensure_active(actor)?;
        self.authorizer.authorize(actor, permission)
    }

    pub(crate) fn require_supervisor(actor: &Actor) -> CoreResult<()> {
        Self::ensure_active(actor)?;
        if actor.is_supervisor() {
            Ok(())
        } else {
            Err(CoreError::forbidden("Requires the admin or manager role")
                .with_field("role", actor.role().as_str()))
        }
    }
}
