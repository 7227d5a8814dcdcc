//! Titus's command-line interface is specified here in one monolithic file.
//!
//! The command-line interface is defined using `clap`.

use clap::{crate_description, crate_version, ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use lazy_static::lazy_static;
use std::io::IsTerminal;
use std::path::PathBuf;
use strum::Display;

use input_enumerator::GitUrl;

use crate::util::get_writer_for_file_or_stdout;

// -----------------------------------------------------------------------------
// system information
// -----------------------------------------------------------------------------
lazy_static! {
    /// How much RAM is installed in the system?
    static ref RAM_GB: Option<f64> = {
        if sysinfo::IS_SUPPORTED_SYSTEM {
            use sysinfo::{System, RefreshKind, MemoryRefreshKind};
            let s = System::new_with_specifics(
                RefreshKind::default().with_memory(MemoryRefreshKind::default().with_ram()),
            );
            Some(s.total_memory() as f64 / 1024.0 / 1024.0 / 1024.0)
        } else {
            None
        }
    };
}

const DEFAULT_DATASTORE: &str = "datastore.titus";

/// How many parallel scan jobs should be used by default?
///
/// This is based on the number of available vCPUs, and also takes into account the amount of
/// memory per core.
fn default_scan_jobs() -> usize {
    match (std::thread::available_parallelism(), *RAM_GB) {
        (Ok(v), Some(ram_gb)) => {
            let n: usize = v.into();
            let max_n = (ram_gb / 3.0).ceil().max(1.0) as usize;
            n.clamp(1, max_n)
        }
        (Ok(v), None) => v.into(),
        (Err(_e), _) => 1,
    }
}

// -----------------------------------------------------------------------------
// command-line args
// -----------------------------------------------------------------------------
#[derive(Parser, Debug)]
#[command(
    name("titus"),
    bin_name("titus"),
    author,
    about,
    version = crate_version!(),
    long_about = concat!(crate_description!()),
)]
#[deny(missing_docs)]
/// Find secrets and sensitive information in textual data
pub struct CommandLineArgs {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global_args: GlobalArgs,
}

impl CommandLineArgs {
    pub fn parse_args() -> Self {
        let mut args = Self::parse();

        // If `NO_COLOR` is set in the environment, disable colored output
        //
        // https://no-color.org/
        if std::env::var("NO_COLOR").is_ok() {
            args.global_args.color = Mode::Never;
        }

        args
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan content for secrets
    ///
    /// This command uses regex-based rules to identify hardcoded secrets and other potentially
    /// sensitive information in textual content.
    ///
    /// The findings from scanning are recorded into a datastore. The recorded findings can later
    /// be reported in several formats using the `report` command.
    ///
    /// Several types of inputs can be specified:
    ///
    /// - Positional input arguments can be either files or directories. Files are scanned
    ///   directly; directories are recursively enumerated and scanned. Any directories
    ///   encountered that are Git repositories will have their entire history scanned.
    ///
    /// - A Git repository URL can be specified with the `--git-url=URL` argument. This will
    ///   cause Titus to clone that repository to a temporary workspace and scan its history.
    ///
    /// The `git` binary on the PATH is used to clone any required Git repositories. It is
    /// carefully invoked to avoid using any system-wide or user-specific configuration.
    #[command(display_order = 1)]
    Scan(ScanArgs),

    /// Report detailed scan findings
    #[command(display_order = 2)]
    Report(ReportArgs),

    /// Manage rules and rulesets
    #[command(display_order = 3, alias = "rule")]
    Rules(RulesArgs),

    /// Merge the findings from one or more datastores into a destination datastore
    #[command(display_order = 4)]
    Merge(MergeArgs),

    /// Interact with GitHub repositories
    ///
    /// Not implemented in this build.
    #[command(display_order = 20, hide = true)]
    GitHub(StubArgs),

    /// Interact with GitLab repositories
    ///
    /// Not implemented in this build.
    #[command(display_order = 21, hide = true)]
    GitLab(StubArgs),

    /// Interactively explore scan findings
    ///
    /// Not implemented in this build.
    #[command(display_order = 22, hide = true)]
    Explore(StubArgs),

    /// Run a long-lived findings server
    ///
    /// Not implemented in this build.
    #[command(display_order = 23, hide = true)]
    Serve(StubArgs),
}

// -----------------------------------------------------------------------------
// global options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Global Options")]
pub struct GlobalArgs {
    /// Enable verbose output
    ///
    /// This can be repeated up to 3 times to enable successively more output.
    #[arg(global = true, long, short, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error feedback messages
    ///
    /// This silences WARNING, INFO, DEBUG, and TRACE messages.
    #[arg(global = true, long, short)]
    pub quiet: bool,

    /// Enable or disable colored output
    ///
    /// When this is "auto", colors are enabled for stdout and stderr when they are terminals.
    ///
    /// If the `NO_COLOR` environment variable is set, it takes precedence and is equivalent to
    /// `--color=never`.
    #[arg(global = true, long, default_value_t = Mode::Auto, value_name = "MODE", alias = "colour")]
    pub color: Mode,

    /// Ignore validation of TLS certificates
    #[arg(global = true, long)]
    pub ignore_certs: bool,

    #[command(flatten)]
    pub advanced: AdvancedArgs,
}

#[derive(Args, Debug)]
#[command(next_help_heading = "Advanced Global Options")]
/// These are advanced options that should not need to be used in normal circumstances.
pub struct AdvancedArgs {
    /// Set the rlimit for number of open files to LIMIT
    ///
    /// This should not need to be changed from the default unless you run into crashes from
    /// running out of file descriptors.
    #[arg(hide_short_help = true, global = true, long, default_value_t = 16384, value_name = "LIMIT")]
    pub rlimit_nofile: u64,

    /// Set the cache size for SQLite connections to SIZE
    ///
    /// This has the effect of setting SQLite's `pragma cache_size=SIZE`. The default value is
    /// set to use a maximum of 1GiB for database cache.
    /// See <https://sqlite.org/pragma.html#pragma_cache_size> for more details.
    #[arg(
        hide_short_help = true,
        global = true,
        long,
        default_value_t = -1 * 1024 * 1024,
        value_name = "SIZE",
        allow_negative_numbers = true,
    )]
    pub sqlite_cache_size: i64,

    /// Enable or disable backtraces on panic
    ///
    /// This has the effect of setting the `RUST_BACKTRACE` environment variable to 1.
    #[arg(hide_short_help = true, global = true, long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub enable_backtraces: bool,
}

impl GlobalArgs {
    pub fn use_color<T: IsTerminal>(&self, out: T) -> bool {
        match self.color {
            Mode::Never => false,
            Mode::Always => true,
            Mode::Auto => out.is_terminal(),
        }
    }
}

/// A generic auto/never/always mode value
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
#[strum(serialize_all = "kebab-case")]
pub enum Mode {
    Auto,
    Never,
    Always,
}

// -----------------------------------------------------------------------------
// stub subcommands
// -----------------------------------------------------------------------------
/// Arguments for a subcommand that parses but does not execute in this build.
///
/// `trailing_var_arg` and `allow_hyphen_values` let any combination of flags and positionals
/// through without `clap` rejecting them, so the user reaches the "not implemented" diagnostic
/// instead of a parse error that looks like a bug.
#[derive(Args, Debug)]
pub struct StubArgs {
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

// -----------------------------------------------------------------------------
// `scan` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Use the specified datastore
    ///
    /// The datastore will be created if it does not exist.
    #[arg(
        long,
        short,
        value_name = "PATH",
        value_hint = ValueHint::DirPath,
        env("TITUS_DATASTORE"),
        default_value = DEFAULT_DATASTORE,
    )]
    pub datastore: PathBuf,

    /// Use N parallel scanning threads
    #[arg(long("jobs"), short('j'), value_name = "N", default_value_t = default_scan_jobs())]
    pub num_jobs: usize,

    #[command(flatten)]
    pub rules: RuleSpecifierArgs,

    #[command(flatten)]
    pub input_specifier_args: InputSpecifierArgs,

    #[command(flatten)]
    pub content_filtering_args: ContentFilteringArgs,

    /// Include the specified number of complete lines of context before and after each match
    #[arg(
        long,
        value_name = "N",
        default_value_t = titus_core::DEFAULT_CONTEXT_LINES,
        help_heading = "Data Collection Options"
    )]
    pub context_lines: usize,

    /// Skip blobs already present in the datastore from a previous scan
    ///
    /// Without this flag, every scanned blob is re-matched even if it was recorded by an earlier
    /// run against the same datastore.
    #[arg(long, help_heading = "Data Collection Options")]
    pub incremental: bool,
}

#[derive(Args, Debug)]
#[command(next_help_heading = "Rule Selection Options")]
pub struct RuleSpecifierArgs {
    /// Load additional rules and rulesets from the specified file or directory
    ///
    /// The paths can be either files or directories. Directories are recursively walked and all
    /// discovered YAML files of rules will be loaded.
    ///
    /// This option can be repeated.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::AnyPath)]
    pub rules_path: Vec<PathBuf>,

    /// Control whether built-in rules are loaded.
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub load_builtins: bool,
}

/// The mode to use for cloning a Git repository
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
#[strum(serialize_all = "kebab-case")]
pub enum GitCloneMode {
    /// Match the behavior of `git clone --bare`
    Bare,

    /// Match the behavior of `git clone --mirror`
    Mirror,
}

/// The method of handling history in discovered Git repositories
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
#[strum(serialize_all = "kebab-case")]
pub enum GitHistoryMode {
    /// Scan all history
    Full,

    /// Scan no history
    None,
}

#[derive(Args, Debug)]
#[command(next_help_heading = "Input Specifier Options")]
pub struct InputSpecifierArgs {
    /// Scan the specified file, directory, or local Git repository
    #[arg(
        value_name = "INPUT",
        value_hint = ValueHint::AnyPath,
        required_unless_present = "git_url",
        display_order = 1,
    )]
    pub path_inputs: Vec<PathBuf>,

    /// Clone and scan the Git repository at the specified URL
    ///
    /// Only https URLs without credentials, query parameters, or fragment identifiers are
    /// supported.
    ///
    /// This option can be repeated.
    #[arg(long, value_name = "URL", value_hint = ValueHint::Url, display_order = 10)]
    pub git_url: Vec<GitUrl>,

    /// Recursively enumerate hidden (dot-prefixed) files and directories
    #[arg(long, display_order = 15)]
    pub include_hidden: bool,

    /// Use the specified method for cloning Git repositories
    #[arg(long, value_name = "MODE", display_order = 40, default_value_t = GitCloneMode::Bare, alias = "git-clone-mode")]
    pub git_clone: GitCloneMode,

    /// Use the specified mode for handling Git history
    #[arg(long, value_name = "MODE", display_order = 50, default_value_t = GitHistoryMode::Full)]
    pub git_history: GitHistoryMode,
}

/// This struct represents options to control content discovery.
#[derive(Args, Debug)]
#[command(next_help_heading = "Content Filtering Options")]
pub struct ContentFilteringArgs {
    /// Do not scan files larger than the specified size
    ///
    /// The value is parsed as a floating point literal, and hence fractional values can be
    /// supplied. A non-positive value means "no limit".
    #[arg(long("max-file-size"), default_value_t = 100.0, value_name = "MEGABYTES", allow_negative_numbers = true)]
    pub max_file_size_mb: f64,

    /// Use custom path-based ignore rules from the specified file
    ///
    /// The ignore file should contain gitignore-style rules.
    ///
    /// This option can be repeated.
    #[arg(long, short, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub ignore: Vec<PathBuf>,
}

impl ContentFilteringArgs {
    pub fn max_file_size_bytes(&self) -> Option<u64> {
        if self.max_file_size_mb < 0.0 {
            None
        } else {
            Some((self.max_file_size_mb * 1024.0 * 1024.0) as u64)
        }
    }
}

// -----------------------------------------------------------------------------
// `rules` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// List available rules
    List(RulesListArgs),
}

#[derive(Args, Debug)]
pub struct RulesListArgs {
    #[command(flatten)]
    pub rules: RuleSpecifierArgs,

    #[command(flatten)]
    pub output_args: OutputArgs<RulesListOutputFormat>,
}

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
#[strum(serialize_all = "kebab-case")]
pub enum RulesListOutputFormat {
    /// A text-based format designed for humans
    Human,

    /// Pretty-printed JSON format
    Json,

    /// JSON Lines format
    Jsonl,
}

// -----------------------------------------------------------------------------
// `report` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Use the specified datastore
    #[arg(
        long,
        short,
        value_name = "PATH",
        value_hint = ValueHint::DirPath,
        env("TITUS_DATASTORE"),
        default_value = DEFAULT_DATASTORE,
    )]
    pub datastore: PathBuf,

    #[command(flatten)]
    pub filter_args: ReportFilterArgs,

    #[command(flatten)]
    pub output_args: OutputArgs<ReportOutputFormat>,
}

#[derive(Args, Debug)]
#[command(next_help_heading = "Filtering Options")]
pub struct ReportFilterArgs {
    /// Limit the number of matches per finding to at most N
    ///
    /// A non-positive value means "no limit".
    #[arg(long, default_value_t = 3, value_name = "N", allow_negative_numbers = true)]
    pub max_matches: i64,

    /// Limit the number of provenance entries per match to at most N
    ///
    /// A non-positive value means "no limit".
    #[arg(long, default_value_t = 3, value_name = "N", allow_negative_numbers = true)]
    pub max_provenance: i64,
}

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
#[strum(serialize_all = "kebab-case")]
pub enum ReportOutputFormat {
    /// A text-based format designed for humans
    Human,

    /// Pretty-printed JSON format
    Json,

    /// JSON Lines format
    Jsonl,

    /// SARIF 2.1.0, for consumption by code-scanning tooling
    Sarif,
}

// -----------------------------------------------------------------------------
// `merge` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Source datastores to merge from
    #[arg(required = true, value_name = "DATASTORE", value_hint = ValueHint::DirPath)]
    pub sources: Vec<PathBuf>,

    /// Merge into the specified destination datastore
    ///
    /// The destination datastore will be created if it does not exist.
    #[arg(long, short, value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub output: PathBuf,
}

// -----------------------------------------------------------------------------
// output options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Output Options")]
pub struct OutputArgs<Format: ValueEnum + Send + Sync + 'static> {
    /// Write output to the specified path
    ///
    /// If this argument is not provided, stdout will be used.
    #[arg(long, short, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Write output in the specified format
    #[arg(long, short, value_name = "FORMAT", default_value = "human")]
    pub format: Format,
}

impl<Format: ValueEnum + Send + Sync> OutputArgs<Format> {
    /// Get a writer for the specified output destination.
    pub fn get_writer(&self) -> std::io::Result<Box<dyn std::io::Write>> {
        get_writer_for_file_or_stdout(self.output.as_ref())
    }
}
