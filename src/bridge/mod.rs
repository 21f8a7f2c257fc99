//! Sensor-to-UDP bridge
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │                 Supervisor                  │
//! │  cancel check → acquire → stream → backoff  │
//! └──────────────┬───────────────┬──────────────┘
//!                │               │
//!                ▼               ▼
//!         ┌───────────┐   ┌──────────────┐
//!         │ Connector │   │ StreamSession│
//!         │ - scan    │   │ - subscribe  │
//!         │ - connect │   │ - deadline   │
//!         └───────────┘   │ - forward    │
//!                         │ - teardown   │
//!                         └──────────────┘
//! ```

pub mod connector;
pub mod session;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use supervisor::Supervisor;
