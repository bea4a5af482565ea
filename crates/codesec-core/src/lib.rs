pub mod artifacts;
pub mod compare;
pub mod error;
pub mod fix;
pub mod git;
pub mod github;
pub mod sarif;
pub mod scanner;
pub mod telemetry;
pub mod workflow;

pub use compare::{Issue, ToolKind, ToolReport};
pub use error::{CodesecError, Result};
pub use github::{GitHubClient, RepoContext};
pub use sarif::SarifLog;
pub use scanner::ScannerCli;
