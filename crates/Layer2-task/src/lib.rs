//! # taskhook-task
//!
//! Task lifecycle for Taskhook: everything between "a client asked for
//! work" and "the worker reported how it went".
//!
//! ## Features
//!
//! - Task Service: ownership-checked create/read/delete, callback updates
//! - Task kinds (`think`, `trends`) with request validation
//! - Broker (in-process or SQLite) and dispatcher with `schedule_at` delays
//! - Lifecycle hooks reporting through signed HTTP callbacks
//! - Worker loop with fixed-backoff retries

pub mod broker;
pub mod callback;
pub mod dispatcher;
pub mod handler;
pub mod lifecycle;
pub mod service;
pub mod state;
pub mod task;
pub mod worker;

// Service
pub use service::{Actor, TaskService};
pub use task::{TaskCreate, TaskRequest, ThinkRequest};

// Execution adapter
pub use broker::{open_broker, Broker, Job, MemoryBroker, SqliteBroker};
pub use dispatcher::TaskDispatcher;
pub use handler::{HandlerRegistry, TaskHandler, ThinkHandler, TrendsHandler};
pub use lifecycle::{CallbackHooks, LifecycleHooks, Outcome, TaskLifecycle};
pub use state::LifecycleEvent;
pub use worker::Worker;

// Callback protocol
pub use callback::{callback_path, CallbackClient, CallbackRequest};
