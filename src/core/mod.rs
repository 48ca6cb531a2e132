pub mod discovery;
pub mod health;
pub mod paths;
pub mod stack;
pub mod transfer;

pub use crate::domain::model::{DownloadResult, HealthReport, HealthStatus, PathKind};
pub use crate::domain::ports::{FileSystem, Probe};
pub use crate::utils::error::Result;
