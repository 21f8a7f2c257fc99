//! Bluetooth Module
//!
//! Heart Rate Profile access over BLE.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     BleSensorLink                        │
//! │        (SensorLink / Link implementation, WinRT)         │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌────────────┐
//! │  Scanner  │  │ Connection │  │  Protocol  │
//! │           │  │            │  │            │
//! │ - name    │  │ - open     │  │ - UUIDs    │
//! │   filter  │  │ - GATT     │  │ - HR meas. │
//! │           │  │ - CCCD     │  │   codec    │
//! └───────────┘  └────────────┘  └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Heart Rate service UUIDs and measurement codec (all platforms)
//! - `scanner` - BLE device discovery (Windows)
//! - `connection` - Device connection and GATT access (Windows)
//! - `service` - Sensor link implementation (Windows)

pub mod protocol;

#[cfg(windows)]
pub mod connection;
#[cfg(windows)]
pub mod scanner;
#[cfg(windows)]
pub mod service;

#[cfg(windows)]
pub use service::BleSensorLink;
