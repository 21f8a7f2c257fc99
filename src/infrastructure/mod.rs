pub mod bluetooth;
pub mod control;
pub mod logging;
pub mod simulated;
pub mod udp;
