use indoc::indoc;

/// The schema version implemented by this crate.
///
/// This number is part of the on-disk format's external contract: datastores produced by this
/// implementation must be tagged with this value so that tooling built against the same schema
/// can open them interchangeably.
pub const SCHEMA_VERSION: u64 = 70;

/// DDL for a freshly-created datastore, applied inside a single transaction.
///
/// Table order matters here even though SQLite does not validate foreign key targets at
/// `CREATE TABLE` time: `findings` is created before `matches` so that `matches.finding_id`'s
/// reference reads naturally top-to-bottom.
pub const CREATE_SCHEMA: &str = indoc! {r#"
    create table blobs
    (
        id text primary key,
        size integer not null,

        constraint valid_blob_id check (
            length(id) == 40 and not glob('*[^0123456789abcdefABCDEF]*', id)
        ),
        constraint valid_size check (0 <= size)
    ) strict;

    create table rules
    (
        id text primary key,
        name text not null,
        pattern text not null,
        structural_id text unique not null
    ) strict;

    create table findings
    (
        id integer primary key,
        structural_id text unique not null,
        rule_id text not null references rules (id),
        groups_json text not null
    ) strict;

    create table matches
    (
        id integer primary key,
        blob_id text not null references blobs (id),
        rule_id text not null references rules (id),
        structural_id text unique not null,

        offset_start integer not null,
        offset_end integer not null,

        snippet_before blob not null,
        snippet_matching blob not null,
        snippet_after blob not null,

        groups_json text not null,

        validation_status text,
        validation_confidence real,
        validation_message text,
        validation_timestamp integer,

        finding_id text references findings (structural_id),

        start_line integer,
        start_column integer,
        end_line integer,
        end_column integer,

        constraint valid_offsets check (0 <= offset_start and offset_start <= offset_end)
    ) strict;

    create table provenance
    (
        id integer primary key,
        blob_id text not null references blobs (id),
        type text not null,
        path text,
        repo_path text,
        commit_hash text,

        unique (blob_id, type, path, repo_path, commit_hash),
        constraint valid_type check (type in ('file', 'git', 'extended'))
    ) strict;

    create table annotations
    (
        id integer primary key,
        target text not null,
        target_id text not null,
        status text,
        comment text,

        unique (target, target_id),
        constraint valid_target check (target in ('finding', 'match'))
    ) strict;

    create table schema_version
    (
        version integer not null
    ) strict;

    insert into schema_version (version) values (70);
"#};
