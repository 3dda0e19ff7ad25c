#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoMsg {
    /// Begin processing: resolve owner/repo from the row's URL.
    Start,
    /// A tag page arrived. `archive_urls` may be empty.
    TagPageLoaded {
        archive_urls: Vec<String>,
        next: Option<String>,
    },
    /// The tag API answered with something other than a usable page.
    TagPageFailed,
    /// A download finished; `obtained` covers both fresh and already-present files.
    ArtifactFinished {
        kind: crate::ArtifactKind,
        obtained: bool,
    },
}
