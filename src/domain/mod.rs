pub mod models;
pub mod publisher;
pub mod sensor;
pub mod settings;
