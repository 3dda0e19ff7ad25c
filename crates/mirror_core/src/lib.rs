//! Pluginmirror core: pure record types, URL helpers and the per-repository
//! archive state machine. Nothing in this crate performs IO.
mod archive_name;
mod effect;
mod msg;
mod pagination;
mod record;
mod repo;
mod resume;
mod state;
mod update;

pub use archive_name::archive_file_name;
pub use effect::{ArtifactKind, RepoEffect};
pub use msg::RepoMsg;
pub use pagination::next_link;
pub use record::{flag, ArchiveRecord, MirrorStatus, PluginRecord};
pub use repo::RepoRef;
pub use resume::SeenPages;
pub use state::{Endpoints, RepoJob, RepoStage};
pub use update::update;
