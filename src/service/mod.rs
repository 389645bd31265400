//! Service specs and process supervision.

pub mod spec;
pub mod supervisor;

pub use spec::{CommandSpec, ServiceSpec};
pub use supervisor::{EventSink, Service, ServiceError, ServiceEvent, ServiceStatus};
