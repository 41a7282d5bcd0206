// Use cases layer: game registry workflows and daily scheduling.

pub mod daily;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use daily::{DailyHandle, DailyScheduler};
pub use registry::{GameRegistry, RegistryError, RegistrySettings, daily_tick_worker};
