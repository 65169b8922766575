pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod session;
pub mod store;
pub mod upload;
pub mod views;

pub use api::AnalysisApi;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use models::*;
pub use orchestrator::SessionManager;
pub use progress::ProgressGauge;
pub use session::{SessionPhase, SessionSnapshot};
pub use store::{StoredResult, ViewMode};
pub use upload::{StagedVideo, UploadManager, VideoSource};
