use anyhow::Result;

use crate::{FilesystemEnumerator, Output};

/// Enumerates both a directory's Git history and its current working tree in a single pass.
///
/// `FilesystemEnumerator`'s walk already does this: a discovered Git repository's history is
/// enumerated via [`crate::GitRepoEnumerator`]/[`crate::GitRepoWithMetadataEnumerator`] and the
/// walk then continues into that same directory's entries, producing a `FileResult` for each
/// tracked working-tree file as well. This type exists to give that combination an explicit name
/// at the API boundary; it does not change the walk's behavior.
///
/// The same content reachable both as a tracked blob and as a file on disk is intentionally
/// emitted twice here — content-level deduplication happens downstream, at the datastore's
/// blob-ID primary key, where a blob already recorded from one provenance gains the other as an
/// additional provenance row rather than a second copy.
pub struct CombinedEnumerator(FilesystemEnumerator);

impl CombinedEnumerator {
    pub fn new(inner: FilesystemEnumerator) -> Self {
        Self(inner)
    }

    pub fn run(&self, output: Output) -> Result<()> {
        self.0.run(output)
    }
}

impl From<FilesystemEnumerator> for CombinedEnumerator {
    fn from(inner: FilesystemEnumerator) -> Self {
        Self::new(inner)
    }
}
