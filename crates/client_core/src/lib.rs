pub mod analyze;
pub mod cache;
pub mod config;
pub mod controller;
pub mod identity;
pub mod render;
pub mod session;
pub mod workflow;

pub use analyze::{AnalyzeApi, HttpAnalyzeClient};
pub use cache::TokenCache;
pub use config::{load_config, load_config_from, ClientConfig};
pub use controller::{StartOutcome, UploadController};
pub use identity::{FileIdentityProvider, IdentityProvider, MissingIdentityProvider, Session};
pub use render::{ConsoleRenderer, EntryState, ResultEntry, ResultRenderer, ResultsBoard};
pub use session::{AuthContext, GuardOutcome, LoginReason, SessionGuard};
pub use workflow::{
    logout, FileOutcome, Navigation, SelectedFile, SubmissionSummary, UploadWorkflow,
    WorkflowInitializer,
};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
