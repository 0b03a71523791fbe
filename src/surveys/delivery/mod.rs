//! Delivery configuration and the pure scheduling decisions over it.

mod config;
pub mod scheduler;

pub use config::{
    DeliveryConfig, DeliveryConfigError, DeliverySchedule, DeliveryTrigger, ScheduleCadence,
    TriggerEvent,
};
pub use scheduler::{is_due, next_due_instant, on_event};
