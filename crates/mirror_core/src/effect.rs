#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Tag,
    DefaultBranch,
}

/// IO the archiver must perform on behalf of a [`crate::RepoJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoEffect {
    FetchTagPage { url: String },
    Download { url: String, kind: ArtifactKind },
    Finished,
}
