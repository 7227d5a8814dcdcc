use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, Sender};
use rayon::prelude::*;
use tracing::{debug, debug_span, error, info, warn};

use input_enumerator::blob_appearance::BlobAppearanceSet;
use input_enumerator::{
    open_git_repo, CancellationToken, CloneEnumerator, EnumeratorResult, FilesystemEnumerator,
    GitRepoResult, RepoInfo,
};
use titus_core::{
    Blob, BlobId, BlobIdSet, LocationMapping, Match, Matcher, MatcherStats, NullValidator,
    Provenance, ProvenanceSet, RulesDatabase, Validator,
};
use titus_store::{BatchEntry, Datastore, RecordStats};

use crate::args::{self, GitHistoryMode};
use crate::rule_loader::RuleLoader;

/// One blob's worth of content, ready to be handed to a `Matcher`.
struct ScanJob {
    blob: Blob,
    provenance: ProvenanceSet,
}

/// How many items a worker accumulates locally before committing a batch to the datastore.
const BATCH_CAPACITY: usize = 64;

/// How many validator threads to run, independent of the number of scan workers.
const VALIDATOR_THREADS: usize = 4;

pub fn run(global_args: &args::GlobalArgs, args: &args::ScanArgs) -> Result<()> {
    let _span = debug_span!("cmd_scan").entered();
    debug!("Args:\n{global_args:#?}\n{args:#?}");

    // This orchestrator manages its own producer/worker threads rather than driving `rayon`
    // directly, but we still configure the global pool up front, mirroring the convention of
    // configuring it once at startup rather than letting it lazily initialize with defaults.
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(args.num_jobs)
        .thread_name(|idx| format!("scanner-{idx}"))
        .build_global();

    let validation_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(VALIDATOR_THREADS)
        .thread_name(|idx| format!("validator-{idx}"))
        .build()
        .context("Failed to initialize validator thread pool")?;

    // ---------------------------------------------------------------------------------------
    // Open datastore, load and record rules
    // ---------------------------------------------------------------------------------------
    let mut datastore =
        Datastore::create_or_open(&args.datastore, global_args.advanced.sqlite_cache_size)
            .with_context(|| format!("Failed to open datastore at {}", args.datastore.display()))?;

    let rules = RuleLoader::from_rule_specifiers(&args.rules)
        .load()
        .context("Failed to load rules")?;
    if rules.is_empty() {
        bail!("No rules to scan with; check your rule selection options");
    }

    let rules_db =
        RulesDatabase::from_rules(rules.rules.clone()).context("Failed to compile rules")?;

    datastore
        .exec_batch(|tx| tx.store_rules(&rules.rules))
        .context("Failed to record rules to the datastore")?;

    info!("Loaded {} rules", rules_db.num_rules());

    // ---------------------------------------------------------------------------------------
    // Set up input enumeration
    // ---------------------------------------------------------------------------------------
    let cancellation = CancellationToken::new();
    let enumerate_git_history = matches!(args.input_specifier_args.git_history, GitHistoryMode::Full);
    let include_hidden = args.input_specifier_args.include_hidden;
    let max_file_size = args.content_filtering_args.max_file_size_bytes();

    let fs_enumerator = if args.input_specifier_args.path_inputs.is_empty() {
        None
    } else {
        let mut e = FilesystemEnumerator::new(&args.input_specifier_args.path_inputs)?;
        e.enumerate_git_history(enumerate_git_history)
            .include_hidden(include_hidden)
            .max_filesize(max_file_size)
            .cancellation(cancellation.clone());
        for ignore_path in &args.content_filtering_args.ignore {
            e.add_ignore(ignore_path).with_context(|| {
                format!("Failed to load ignore rules from {}", ignore_path.display())
            })?;
        }
        Some(e)
    };

    let repo_infos: Vec<RepoInfo> = args
        .input_specifier_args
        .git_url
        .iter()
        .map(|url| RepoInfo::new(repo_name_from_url(url.as_str()), url.as_str()))
        .collect::<Result<Vec<_>>>()
        .context("Failed to resolve --git-url repositories")?;

    let clone_enumerator = if repo_infos.is_empty() {
        None
    } else {
        let mut e = CloneEnumerator::new(repo_infos);
        e.enumerate_git_history(enumerate_git_history)
            .include_hidden(include_hidden)
            .max_filesize(max_file_size)
            .cancellation(cancellation.clone());
        Some(e)
    };

    // ---------------------------------------------------------------------------------------
    // Shared scan state
    // ---------------------------------------------------------------------------------------
    let seen_blobs = BlobIdSet::new();
    let global_stats: Mutex<MatcherStats> = Mutex::new(MatcherStats::default());
    let record_stats: Mutex<RecordStats> = Mutex::new(RecordStats::default());
    let skipped_count = AtomicU64::new(0);
    let incremental = args.incremental;
    let datastore = Mutex::new(datastore);
    let first_error: Mutex<Option<anyhow::Error>> = Mutex::new(None);
    let validator: &dyn Validator = &NullValidator;

    let channel_capacity = args.num_jobs * 2;
    let (raw_tx, raw_rx) = bounded::<EnumeratorResult>(channel_capacity);
    let (job_tx, job_rx) = bounded::<ScanJob>(channel_capacity);

    std::thread::scope(|scope| {
        // ---- producer: run the configured enumerators, feeding raw results downstream ----
        {
            let enum_cancellation = cancellation.clone();
            let raw_tx = raw_tx.clone();
            scope.spawn(move || {
                let _span = debug_span!("enumerate").entered();
                if let Some(e) = &fs_enumerator {
                    if let Err(err) = e.run(raw_tx.clone()) {
                        error!("Filesystem enumeration failed: {err}");
                        enum_cancellation.cancel();
                    }
                }
                if !enum_cancellation.is_cancelled() {
                    if let Some(e) = &clone_enumerator {
                        if let Err(err) = e.run(raw_tx.clone()) {
                            error!("Git repository enumeration failed: {err}");
                            enum_cancellation.cancel();
                        }
                    }
                }
            });
        }
        drop(raw_tx);

        // ---- flatten: turn each enumerator result into one job per blob ----
        {
            let flatten_cancellation = cancellation.clone();
            let job_tx = job_tx.clone();
            scope.spawn(move || {
                let _span = debug_span!("flatten").entered();
                for result in raw_rx {
                    if flatten_cancellation.is_cancelled() {
                        break;
                    }
                    match result {
                        EnumeratorResult::File(f) => match Blob::from_file(&f.path) {
                            Ok(blob) => {
                                let provenance =
                                    ProvenanceSet::single(Provenance::from_file(f.path.clone()));
                                if job_tx.send(ScanJob { blob, provenance }).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Failed to load blob from {}: {e}", f.path.display());
                            }
                        },
                        EnumeratorResult::GitRepo(result) => {
                            if let Err(e) =
                                enqueue_git_repo_blobs(&result, &job_tx, &flatten_cancellation)
                            {
                                warn!(
                                    "Failed to enumerate Git repository at {}: {e}",
                                    result.path.display()
                                );
                            }
                        }
                    }
                }
            });
        }
        drop(job_tx);

        // ---- workers: match, validate, and batch-commit ----
        for worker_id in 0..args.num_jobs.max(1) {
            let job_rx = job_rx.clone();
            let cancellation = cancellation.clone();
            let rules_db = &rules_db;
            let seen_blobs = &seen_blobs;
            let global_stats = &global_stats;
            let record_stats = &record_stats;
            let skipped_count = &skipped_count;
            let datastore = &datastore;
            let first_error = &first_error;
            let validation_pool = &validation_pool;
            let context_lines = args.context_lines;

            scope.spawn(move || {
                let _span = debug_span!("scan-worker", worker_id).entered();

                let mut matcher =
                    match Matcher::new(rules_db, context_lines, seen_blobs, Some(global_stats)) {
                        Ok(m) => m,
                        Err(e) => {
                            record_first_error(
                                first_error,
                                e.context("Failed to initialize matcher"),
                            );
                            cancellation.cancel();
                            return;
                        }
                    };

                let mut batch: Vec<BatchEntry> = Vec::with_capacity(BATCH_CAPACITY);

                for job in job_rx {
                    if cancellation.is_cancelled() {
                        break;
                    }

                    let ScanJob { blob, provenance } = job;
                    let blob_id = blob.id;
                    let blob_size = blob.len() as u64;

                    // Step 1 of the per-blob pipeline: count the blob, then — in incremental
                    // mode — skip it without matching if the datastore already has it recorded
                    // from a prior run.
                    if incremental {
                        let already_recorded = match datastore.lock().unwrap().blob_exists(&blob_id)
                        {
                            Ok(exists) => exists,
                            Err(e) => {
                                record_first_error(
                                    first_error,
                                    e.context("Failed to check blob_exists for incremental scan"),
                                );
                                cancellation.cancel();
                                break;
                            }
                        };
                        if already_recorded {
                            let mut stats = global_stats.lock().unwrap();
                            stats.blobs_seen += 1;
                            stats.bytes_seen += blob_size;
                            drop(stats);
                            skipped_count.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    }

                    let blob_matches = match matcher.scan_blob(&blob) {
                        Ok(m) => m,
                        Err(e) => {
                            warn!("Failed to scan blob {blob_id}: {e}");
                            continue;
                        }
                    };

                    if blob_matches.is_empty() {
                        continue;
                    }

                    let max_end = blob_matches
                        .iter()
                        .map(|m| m.matching_input_offset_span.end)
                        .max()
                        .unwrap_or(0);
                    let loc_mapping = LocationMapping::new(&blob.bytes[0..max_end]);

                    // Run every match's validator submission concurrently, joining all of
                    // them before this blob's batch entry is assembled, so a validation
                    // result is always durable with the match it belongs to.
                    let matches: Vec<Match> = validation_pool.install(|| {
                        blob_matches
                            .par_iter()
                            .map(|bm| {
                                let mut m = Match::convert(&loc_mapping, bm, context_lines);
                                let result =
                                    validator.validate(&m.rule_text_id, &m.groups, &m.named_groups);
                                m.validation_result = Some(result);
                                m
                            })
                            .collect()
                    });

                    batch.push(BatchEntry {
                        blob_id,
                        blob_size,
                        provenance,
                        matches,
                    });

                    if batch.len() >= BATCH_CAPACITY {
                        match commit_batch(datastore, &mut batch) {
                            Ok(stats) => *record_stats.lock().unwrap() += stats,
                            Err(e) => {
                                record_first_error(first_error, e);
                                cancellation.cancel();
                                break;
                            }
                        }
                    }
                }

                if !batch.is_empty() {
                    match commit_batch(datastore, &mut batch) {
                        Ok(stats) => *record_stats.lock().unwrap() += stats,
                        Err(e) => {
                            record_first_error(first_error, e);
                            cancellation.cancel();
                        }
                    }
                }
            });
        }
    });

    if let Some(e) = first_error.into_inner().unwrap() {
        return Err(e).context("Scan failed");
    }

    let stats = global_stats.into_inner().unwrap();
    let record_stats = record_stats.into_inner().unwrap();
    let skipped_count = skipped_count.load(Ordering::Relaxed);

    // Blobs that reached the matcher but were already present in this run's in-process
    // `seen_blobs` set (content-identical to one already matched this run) are exactly those
    // counted by the matcher but not actually matched against: `blobs_seen` includes both these
    // and the blobs this loop skipped outright for being incremental, so subtract both off
    // `blobs_scanned` to get the dedup-only count.
    let dedup_skipped = stats.blobs_seen - skipped_count - stats.blobs_scanned;

    info!(
        "Scanned {} bytes from {} blobs ({} newly scanned, {} blobs skipped as content-identical to one already seen this run, {} blobs skipped as already recorded from a previous incremental run); \
         found {} matches total, recorded {} new matches ({} new findings) from {} newly-recorded blobs",
        stats.bytes_seen,
        stats.blobs_seen,
        stats.blobs_scanned,
        dedup_skipped,
        skipped_count,
        stats.matches_found,
        record_stats.matches_inserted,
        record_stats.findings_inserted,
        record_stats.blobs_inserted,
    );

    Ok(())
}

/// Open a previously-discovered Git repository, read each of its candidate blobs, and enqueue a
/// scan job for each one.
fn enqueue_git_repo_blobs(
    result: &GitRepoResult,
    job_tx: &Sender<ScanJob>,
    cancellation: &CancellationToken,
) -> Result<()> {
    let repository = match open_git_repo(&result.path)? {
        Some(repo) => repo.into_sync(),
        None => bail!("repository vanished before it could be re-opened"),
    };
    let repo = repository.to_thread_local();

    for md in &result.blobs {
        if cancellation.is_cancelled() {
            break;
        }

        let blob_oid = md.blob_oid;
        let blob = match repo.find_object(blob_oid) {
            Ok(mut obj) => {
                let data = std::mem::take(&mut obj.data); // avoid a copy
                Blob::new(BlobId::from(&blob_oid), data)
            }
            Err(e) => {
                warn!(
                    "Failed to read blob {blob_oid} from Git repository at {}: {e}",
                    result.path.display()
                );
                continue;
            }
        };

        let provenance = provenance_for_git_blob(&result.path, &md.first_seen);
        if job_tx.send(ScanJob { blob, provenance }).is_err() {
            break;
        }
    }

    Ok(())
}

/// Build the `ProvenanceSet` for a blob found at the given path(s) within a Git repo's history.
fn provenance_for_git_blob(repo_path: &Path, first_seen: &BlobAppearanceSet) -> ProvenanceSet {
    let mut it = first_seen.iter();
    match it.next() {
        Some(first) => {
            let p = Provenance::from_git_repo_with_first_commit(
                repo_path.to_path_buf(),
                (*first.commit_metadata).clone(),
                first.path.clone(),
            );
            let rest = it
                .map(|e| {
                    Provenance::from_git_repo_with_first_commit(
                        repo_path.to_path_buf(),
                        (*e.commit_metadata).clone(),
                        e.path.clone(),
                    )
                })
                .collect();
            ProvenanceSet::new(p, rest)
        }
        None => ProvenanceSet::single(Provenance::from_git_repo(repo_path.to_path_buf())),
    }
}

/// Derive a short human-readable name for a repository from its clone URL, for use in log
/// messages; has no bearing on where the repository ends up on disk.
fn repo_name_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .unwrap_or(url)
        .trim_end_matches(".git")
        .to_owned()
}

/// Commit one worker's batch to the datastore, serialized against all other workers.
fn commit_batch(datastore: &Mutex<Datastore>, batch: &mut Vec<BatchEntry>) -> Result<RecordStats> {
    let mut ds = datastore.lock().unwrap();
    let stats = ds
        .exec_batch(|tx| tx.record(batch.as_slice()))
        .context("Failed to record batch to the datastore")?;
    batch.clear();
    Ok(stats)
}

/// Record the first error encountered by any worker; later errors are logged but dropped.
fn record_first_error(first_error: &Mutex<Option<anyhow::Error>>, e: anyhow::Error) {
    let mut guard = first_error.lock().unwrap();
    if guard.is_none() {
        *guard = Some(e);
    } else {
        warn!("Additional error after scan was already failing: {e}");
    }
}
