mod repo;
mod snapshot;
mod summary;

pub use repo::{language_scope, Contributor, Period, RepoRecord};
pub use snapshot::{format_capture_time, AnchorFilter, Batch, GenerationRow};
pub use summary::{ProviderId, Summary};
