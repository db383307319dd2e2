pub mod config;
pub mod dispatch;
pub mod event;
pub mod recovery;
pub mod tenant;
pub mod trace;

pub use config::ReportingConfig;
pub use event::{FailureEvent, FailureKind, RequestMeta};
pub use recovery::{RecoveryService, ReportContext, install_panic_hook};
pub use trace::SourceLocation;
