use bstr::ByteSlice;
use titus_core::Provenance;

/// The decomposed, column-oriented form of a `Provenance` entry as stored in the `provenance`
/// table. `File` and `GitRepo` are projected onto `path`/`repo_path`/`commit_hash`; `Extended`'s
/// arbitrary payload has no dedicated columns, so it is round-tripped through `path` as its full
/// JSON encoding rather than just the payload's own `path` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceRow {
    pub kind: &'static str,
    pub path: Option<String>,
    pub repo_path: Option<String>,
    pub commit_hash: Option<String>,
}

impl ProvenanceRow {
    pub fn from_provenance(p: &Provenance) -> Self {
        match p {
            Provenance::File(e) => ProvenanceRow {
                kind: "file",
                path: Some(e.path.to_string_lossy().into_owned()),
                repo_path: None,
                commit_hash: None,
            },
            Provenance::GitRepo(e) => {
                let (path, commit_hash) = match &e.first_commit {
                    Some(c) => (
                        Some(c.blob_path.to_str_lossy().into_owned()),
                        Some(c.commit_metadata.commit_id.to_string()),
                    ),
                    None => (None, None),
                };
                ProvenanceRow {
                    kind: "git",
                    path,
                    repo_path: Some(e.repo_path.to_string_lossy().into_owned()),
                    commit_hash,
                }
            }
            Provenance::Extended(e) => ProvenanceRow {
                kind: "extended",
                path: Some(
                    serde_json::to_string(&e.0).expect("serde_json::Value always serializes"),
                ),
                repo_path: None,
                commit_hash: None,
            },
        }
    }
}
