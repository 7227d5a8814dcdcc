use anyhow::{bail, Context, Result};
use indenter::indented;
use lazy_static::lazy_static;
use serde::Serialize;
use serde_sarif::sarif;
use std::fmt::{Display, Formatter, Write};
use tracing::debug;

use titus_core::bstring_escape::Escaped;
use titus_store::{Datastore, FindingSummary, MatchRecord, ProvenanceRecord, RuleSummary};

use crate::args::{GlobalArgs, ReportArgs, ReportOutputFormat};
use crate::reportable::Reportable;

pub fn run(global_args: &GlobalArgs, args: &ReportArgs) -> Result<()> {
    debug!("Args:\n{global_args:#?}\n{args:#?}");

    let datastore = Datastore::open(&args.datastore, global_args.advanced.sqlite_cache_size)
        .with_context(|| format!("Failed to open datastore at {}", args.datastore.display()))?;
    let output = args
        .output_args
        .get_writer()
        .context("Failed to get output writer")?;

    let max_matches = non_positive_as_none(args.filter_args.max_matches);
    let max_provenance = non_positive_as_none(args.filter_args.max_provenance);

    let reporter = DetailsReporter {
        datastore,
        max_matches,
        max_provenance,
    };
    reporter.report(args.output_args.format, output)
}

fn non_positive_as_none(n: i64) -> Option<usize> {
    if n <= 0 {
        None
    } else {
        Some(n.try_into().unwrap())
    }
}

struct DetailsReporter {
    datastore: Datastore,
    max_matches: Option<usize>,
    max_provenance: Option<usize>,
}

impl DetailsReporter {
    fn get_finding(&self, summary: FindingSummary) -> Result<Finding> {
        let all_matches = self
            .datastore
            .get_matches_for_finding(&summary.structural_id)
            .with_context(|| format!("Failed to get matches for finding {}", summary.structural_id))?;

        let matches = all_matches
            .into_iter()
            .take(self.max_matches.unwrap_or(usize::MAX))
            .map(|m| self.get_report_match(m))
            .collect::<Result<Vec<_>>>()?;

        Ok(Finding { summary, matches })
    }

    fn get_report_match(&self, m: MatchRecord) -> Result<ReportMatch> {
        let all_provenance = self
            .datastore
            .get_all_provenance(&m.blob_id)
            .with_context(|| format!("Failed to get provenance for blob {}", m.blob_id))?;
        let total_provenance = all_provenance.len();
        let provenance = all_provenance
            .into_iter()
            .take(self.max_provenance.unwrap_or(usize::MAX))
            .collect();
        Ok(ReportMatch {
            provenance,
            total_provenance,
            m,
        })
    }
}

impl Reportable for DetailsReporter {
    type Format = ReportOutputFormat;

    fn report<W: std::io::Write>(&self, format: Self::Format, writer: W) -> Result<()> {
        match format {
            ReportOutputFormat::Human => self.human_format(writer),
            ReportOutputFormat::Json => self.json_format(writer),
            ReportOutputFormat::Jsonl => self.jsonl_format(writer),
            ReportOutputFormat::Sarif => self.sarif_format(writer),
        }
    }
}

impl DetailsReporter {
    fn human_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        let summaries = self
            .datastore
            .get_findings()
            .context("Failed to get findings from datastore")?;
        let num_findings = summaries.len();

        for (finding_num, summary) in summaries.into_iter().enumerate() {
            let finding_num = finding_num + 1;
            let finding = self.get_finding(summary)?;
            writeln!(
                &mut writer,
                "{} {}",
                STYLE_FINDING_HEADING.apply_to(format!("Finding {finding_num}/{num_findings}:")),
                finding,
            )?;
        }
        Ok(())
    }

    /// Write findings in JSON-like format to `writer`.
    ///
    /// If `begin` is supplied, it is written before any finding is. If `sep` is supplied, it is
    /// written to separate each finding. If `end` is supplied, it is written after all findings
    /// have been. This is flexible enough to express both JSON and JSONL output without
    /// accumulating every finding in memory at once.
    fn write_json_findings<W: std::io::Write>(
        &self,
        mut writer: W,
        begin: Option<&str>,
        sep: Option<&str>,
        end: Option<&str>,
    ) -> Result<()> {
        let summaries = self
            .datastore
            .get_findings()
            .context("Failed to get findings from datastore")?;

        if let Some(begin) = begin {
            write!(writer, "{}", begin)?;
        }

        let mut first = true;
        for summary in summaries {
            if !first {
                if let Some(sep) = sep {
                    write!(writer, "{}", sep)?;
                }
            }
            first = false;

            let finding = self.get_finding(summary)?;
            serde_json::to_writer(&mut writer, &FindingReport::Finding(finding))?;
        }

        if let Some(end) = end {
            write!(writer, "{}", end)?;
        }

        Ok(())
    }

    fn json_format<W: std::io::Write>(&self, writer: W) -> Result<()> {
        self.write_json_findings(writer, Some("[\n"), Some(",\n"), Some("\n]"))
    }

    fn jsonl_format<W: std::io::Write>(&self, writer: W) -> Result<()> {
        self.write_json_findings(writer, None, Some("\n"), Some("\n"))
    }

    fn make_sarif_result(&self, finding: &Finding) -> Result<sarif::Result> {
        let matches = &finding.matches;
        let summary = &finding.summary;

        let first_blob_id = match matches.first() {
            Some(entry) => entry.m.blob_id.to_string(),
            None => bail!("Finding {} has no matches", summary.structural_id),
        };
        let message = sarif::MessageBuilder::default()
            .text(format!(
                "Rule {:?} found {} {}.\nFirst blob id matched: {}",
                summary.rule_name,
                summary.num_matches,
                if summary.num_matches == 1 { "match" } else { "matches" },
                first_blob_id,
            ))
            .build()?;

        let locations: Vec<sarif::Location> = matches
            .iter()
            .flat_map(|rm| {
                rm.provenance.iter().map(move |p| {
                    let source_span = rm
                        .m
                        .source_span
                        .as_ref()
                        .map(|s| format!("{s}"))
                        .unwrap_or_default();

                    let mut additional_properties = vec![(
                        String::from("blob_id"),
                        serde_json::json!(rm.m.blob_id.to_string()),
                    )];
                    if let Some(commit_hash) = &p.commit_hash {
                        additional_properties
                            .push((String::from("commit_hash"), serde_json::json!(commit_hash)));
                    }

                    let uri = match &p.path {
                        Some(path) => path.clone(),
                        None => p.repo_path.clone().unwrap_or_else(|| source_span.clone()),
                    };

                    let additional_properties =
                        std::collections::BTreeMap::from_iter(additional_properties);
                    let properties = sarif::PropertyBagBuilder::default()
                        .additional_properties(additional_properties)
                        .build()?;

                    let mut region_builder = sarif::RegionBuilder::default();
                    if let Some(span) = &rm.m.source_span {
                        region_builder
                            .start_line(span.start.line as i64)
                            .start_column(span.start.column as i64)
                            .end_line(span.end.line as i64)
                            .end_column(span.end.column as i64 + 1);
                    }
                    region_builder.snippet(
                        sarif::ArtifactContentBuilder::default()
                            .text(rm.m.snippet.matching.to_string())
                            .build()?,
                    );

                    let location = sarif::LocationBuilder::default()
                        .physical_location(
                            sarif::PhysicalLocationBuilder::default()
                                .artifact_location(
                                    sarif::ArtifactLocationBuilder::default().uri(uri).build()?,
                                )
                                .region(region_builder.build()?)
                                .build()?,
                        )
                        .logical_locations([sarif::LogicalLocationBuilder::default()
                            .kind("blob")
                            .name(rm.m.blob_id.to_string())
                            .properties(properties)
                            .build()?])
                        .build()?;
                    Ok(location)
                })
            })
            .collect::<Result<_>>()?;

        let result = sarif::ResultBuilder::default()
            .rule_id(&summary.rule_id)
            .message(message)
            .kind(sarif::ResultKind::Review.to_string())
            .locations(locations)
            .level(sarif::ResultLevel::Warning.to_string())
            .partial_fingerprints([(
                "finding_structural_id/v1".to_string(),
                summary.structural_id.clone(),
            )])
            .build()?;
        Ok(result)
    }

    fn sarif_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        let summaries = self
            .datastore
            .get_findings()
            .context("Failed to get findings from datastore")?;

        let mut results = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let finding = self.get_finding(summary)?;
            results.push(self.make_sarif_result(&finding)?);
        }

        let rules = self
            .datastore
            .get_rules()
            .context("Failed to get rules from datastore")?;

        let run = sarif::RunBuilder::default()
            .tool(titus_sarif_tool(&rules)?)
            .results(results)
            .build()?;

        let sarif = sarif::SarifBuilder::default()
            .version(sarif::Version::V2_1_0.to_string())
            .schema(sarif::SCHEMA_URL)
            .runs([run])
            .build()?;

        serde_json::to_writer(&mut writer, &sarif)?;
        writeln!(writer)?;

        Ok(())
    }
}

/// Build the runs.tool.driver.rules array property from the rules actually recorded in this
/// datastore, rather than reloading rule files from disk: this is exactly the rule set the scan
/// that produced this datastore ran with, custom rules included.
fn titus_sarif_rules(rules: &[RuleSummary]) -> Result<Vec<sarif::ReportingDescriptor>> {
    rules
        .iter()
        .map(|rule| {
            let description = sarif::MultiformatMessageStringBuilder::default()
                .text(&rule.pattern)
                .build()?;
            let reporting_descriptor = sarif::ReportingDescriptorBuilder::default()
                .id(&rule.id)
                .name(&rule.name)
                .short_description(description)
                .build()?;
            Ok(reporting_descriptor)
        })
        .collect::<Result<Vec<_>>>()
}

fn titus_sarif_tool(rules: &[RuleSummary]) -> Result<sarif::Tool> {
    sarif::ToolBuilder::default()
        .driver(
            sarif::ToolComponentBuilder::default()
                .name(env!("CARGO_PKG_NAME").to_string())
                .semantic_version(env!("CARGO_PKG_VERSION").to_string())
                .information_uri(env!("CARGO_PKG_HOMEPAGE").to_string())
                .short_description(
                    sarif::MultiformatMessageStringBuilder::default()
                        .text(env!("CARGO_PKG_DESCRIPTION"))
                        .build()?,
                )
                .rules(titus_sarif_rules(rules)?)
                .build()?,
        )
        .build()
        .map_err(|e| e.into())
}

/// A wrapper tagging each report entry with its kind, so the JSON/JSONL output formats leave room
/// for other kinds of report entries in the future without an incompatible schema change.
#[derive(Serialize)]
#[serde(tag = "type")]
enum FindingReport {
    #[serde(rename = "finding")]
    Finding(Finding),
}

#[derive(Serialize)]
struct Finding {
    #[serde(flatten)]
    summary: FindingSummary,

    /// At most `--max-matches` of this finding's matches; `summary.num_matches` carries the true
    /// total when this list has been truncated.
    matches: Vec<ReportMatch>,
}

#[derive(Serialize)]
struct ReportMatch {
    provenance: Vec<ProvenanceRecord>,

    /// How many provenance entries this match has in total, which may be more than
    /// `provenance.len()` if the report was run with a `--max-provenance` limit.
    total_provenance: usize,

    #[serde(flatten)]
    m: MatchRecord,
}

lazy_static! {
    static ref STYLE_FINDING_HEADING: console::Style = console::Style::new().bold().bright().white();
    static ref STYLE_RULE: console::Style = console::Style::new().bright().bold().blue();
    static ref STYLE_HEADING: console::Style = console::Style::new().bold();
    static ref STYLE_MATCH: console::Style = console::Style::new().yellow();
    static ref STYLE_METADATA: console::Style = console::Style::new().bright().blue();
}

impl Display for Finding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", STYLE_RULE.apply_to(&self.summary.rule_name))?;

        // Render the finding's content on one line if it's single-line, multiple lines otherwise.
        // The finding's content is taken from its first match's capture groups.
        let group_text = self
            .matches
            .first()
            .and_then(|rm| rm.m.groups.0.first())
            .and_then(|g| g.as_ref())
            .map(|g| g.0.as_slice())
            .unwrap_or(&[]);

        let match_heading = STYLE_HEADING.apply_to("Match:");
        if group_text.contains(&b'\n') {
            writeln!(f, "{match_heading}")?;
            writeln!(f)?;
            writeln!(indented(f).with_str("    "), "{}", STYLE_MATCH.apply_to(Escaped(group_text)))?;
            writeln!(f)?;
        } else {
            writeln!(f, "{} {}", match_heading, STYLE_MATCH.apply_to(Escaped(group_text)))?;
        }

        let total_matches = self.summary.num_matches as usize;
        if self.matches.len() != total_matches {
            writeln!(
                f,
                "{}",
                STYLE_HEADING.apply_to(format!(
                    "Showing {}/{} occurrences:",
                    self.matches.len(),
                    total_matches
                ))
            )?;
        }
        writeln!(f)?;

        let mut f = indented(f).with_str("    ");
        for (i, rm) in self.matches.iter().enumerate() {
            let i = i + 1;
            writeln!(
                f,
                "{}",
                STYLE_HEADING.apply_to(format!("Occurrence {i}/{total_matches}")),
            )?;

            for p in &rm.provenance {
                match p.kind.as_str() {
                    "file" => {
                        writeln!(
                            f,
                            "{} {}",
                            STYLE_HEADING.apply_to("File:"),
                            STYLE_METADATA.apply_to(p.path.as_deref().unwrap_or("?")),
                        )?;
                    }
                    "git" => {
                        writeln!(
                            f,
                            "{} {}",
                            STYLE_HEADING.apply_to("Git repo:"),
                            STYLE_METADATA.apply_to(p.repo_path.as_deref().unwrap_or("?")),
                        )?;
                        if let Some(commit_hash) = &p.commit_hash {
                            writeln!(
                                f,
                                "{} {} as {}",
                                STYLE_HEADING.apply_to("Commit:"),
                                STYLE_METADATA.apply_to(commit_hash),
                                p.path.as_deref().unwrap_or("?"),
                            )?;
                        }
                    }
                    _ => {
                        writeln!(
                            f,
                            "{} {}",
                            STYLE_HEADING.apply_to("Source:"),
                            STYLE_METADATA.apply_to(p.path.as_deref().unwrap_or("?")),
                        )?;
                    }
                }
            }
            if rm.provenance.len() != rm.total_provenance {
                writeln!(
                    f,
                    "{}",
                    STYLE_HEADING.apply_to(format!(
                        "(showing {}/{} provenance entries)",
                        rm.provenance.len(),
                        rm.total_provenance
                    ))
                )?;
            }

            writeln!(f, "{} {}", STYLE_HEADING.apply_to("Blob:"), STYLE_METADATA.apply_to(&rm.m.blob_id),)?;

            if let Some(validation) = &rm.m.validation_result {
                writeln!(
                    f,
                    "{} {} ({:.0}% confidence{})",
                    STYLE_HEADING.apply_to("Validation:"),
                    validation.status,
                    validation.confidence * 100.0,
                    validation
                        .message
                        .as_deref()
                        .map(|m| format!(": {m}"))
                        .unwrap_or_default(),
                )?;
            }

            if let Some(source_span) = &rm.m.source_span {
                writeln!(f, "{} {}", STYLE_HEADING.apply_to("Lines:"), source_span)?;
            }
            writeln!(f)?;
            writeln!(
                indented(&mut f).with_str("    "),
                "{}{}{}",
                Escaped(&rm.m.snippet.before),
                STYLE_MATCH.apply_to(Escaped(&rm.m.snippet.matching)),
                Escaped(&rm.m.snippet.after),
            )?;
            writeln!(f)?;
        }

        Ok(())
    }
}
