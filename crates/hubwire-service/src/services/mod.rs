pub mod dev;

pub use dev::{DevRegistry, DevServer, DeviceRecord};
