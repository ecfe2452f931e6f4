pub mod batch_bus;
pub mod batch_manager;
pub mod event_bus;
pub mod tracker;

pub use crate::domain::model::{Batch, DeviceInformation, Event, ForgetRequest};
pub use crate::domain::ports::{ConfigProvider, Transport};
pub use crate::utils::error::Result;
pub use batch_bus::BatchBus;
pub use batch_manager::{BatchManager, DispatchOutcome};
pub use event_bus::EventBus;
