pub mod address;
pub mod config;
pub mod error;
pub mod settings;
pub mod violation;

pub use address::normalize_address;
pub use config::Config;
pub use error::*;
pub use settings::{ScheduleSettings, SettingsPatch};
pub use violation::ViolationRecord;
