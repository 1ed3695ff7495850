//! Markdown and JSON report generation.
//!
//! The report carries every series the study charts are drawn from:
//! per-participant averages and bests, daily steps per condition, the
//! attribute scatters with their best-fit lines, and the pooled daily-step
//! distributions.

use crate::analysis::top_improvers;
use crate::config::ReportConfig;
use crate::models::{
    AttributeAssociation, ConditionDistributions, Distribution, ImprovementSummary, Outcome,
    ParticipantRecord, Report, ReportMetadata, Summary,
};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportConfig) -> String {
    let p = options.precision;
    let mut output = String::new();

    // Title
    output.push_str("# Stepstat Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report, options));
    output.push_str(&generate_overview_section(&report.overview, p));
    output.push_str(&generate_participants_section(&report.summaries, options));
    output.push_str(&generate_associations_section(
        &report.associations,
        &report.summaries,
        p,
    ));

    if options.include_daily {
        output.push_str(&generate_daily_section(
            &report.participants,
            &report.day_labels,
            &report.series_day_labels,
        ));
    }

    if options.include_distribution {
        if let Some(ref distributions) = report.distributions {
            output.push_str(&generate_distribution_section(distributions, p));
        }
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Participants:** {}\n", metadata.participants));
    section.push_str(&format!(
        "- **Days per Condition:** {}\n",
        metadata.days_per_condition
    ));
    if metadata.associations_failed > 0 {
        section.push_str(&format!(
            "- **Associations Not Computed:** {}\n",
            metadata.associations_failed
        ));
    }
    section.push_str(&format!(
        "- **Analysis Duration:** {:.3}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &Report, options: &ReportConfig) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Overview](#overview)\n");
    toc.push_str("- [Participants](#participants)\n");

    for outcome in [Outcome::Improvement, Outcome::AverageSteps] {
        if report.associations.iter().any(|a| a.outcome == outcome) {
            toc.push_str(&toc_entry(associations_title(outcome)));
        }
    }

    if options.include_daily {
        toc.push_str("- [Daily Steps](#daily-steps)\n");
        for record in &report.participants {
            toc.push_str(&format!("  {}", toc_entry(&record.id)));
        }
    }

    if options.include_distribution && report.distributions.is_some() {
        toc.push_str("- [Distribution of Daily Steps](#distribution-of-daily-steps)\n");
    }

    toc.push('\n');

    toc
}

/// Generate the headline overview.
fn generate_overview_section(overview: &ImprovementSummary, p: usize) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");
    if overview.participants == 0 {
        section.push_str("No participant has baseline steps, so no improvement is reported.\n\n");
        return section;
    }

    section.push_str("| 📈 Improved | 📉 Declined | ➖ Unchanged | **Total** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        overview.improved, overview.declined, overview.unchanged, overview.participants
    ));
    section.push_str(&format!(
        "Mean improvement across participants: **{:+.p$}** steps/day.\n\n",
        overview.mean_improvement,
        p = p
    ));

    section
}

/// Generate the per-participant summary table and top improvers.
fn generate_participants_section(summaries: &[Summary], options: &ReportConfig) -> String {
    let p = options.precision;
    let mut section = String::new();

    section.push_str("## Participants\n\n");
    section.push_str("### Average and Best Daily Steps\n\n");
    section.push_str(
        "| Participant | Avg Baseline | Avg While Playing | Improvement | Best Baseline | Best While Playing | Level | Balance |\n",
    );
    section.push_str("|:---|---:|---:|---:|---:|---:|---:|---:|\n");

    for s in summaries {
        section.push_str(&format!(
            "| {} | {} | {:.p$} | {} | {} | {} | {} | {} |\n",
            s.id,
            or_dash(s.avg_baseline.map(|v| format!("{:.p$}", v, p = p))),
            s.avg_treatment,
            or_dash(s.improvement.map(|v| format!("{:+.p$}", v, p = p))),
            or_dash(s.best_baseline.map(|v| v.to_string())),
            s.best_treatment,
            s.level,
            s.balance,
            p = p
        ));
    }
    section.push('\n');

    let top = top_improvers(summaries, options.top_improvers);
    if !top.is_empty() {
        section.push_str("### Top Improvers\n\n");
        for (i, s) in top.iter().enumerate() {
            section.push_str(&format!(
                "{}. **{}**: {:+.p$} steps/day\n",
                i + 1,
                s.id,
                s.improvement.unwrap_or_default(),
                p = p
            ));
        }
        section.push('\n');
    }

    section
}

fn associations_title(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Improvement => "Improvement vs. Game Attributes",
        Outcome::AverageSteps => "User Level vs. Average Daily Steps",
    }
}

/// Generate one section per outcome, each holding its attribute blocks.
fn generate_associations_section(
    associations: &[AttributeAssociation],
    summaries: &[Summary],
    p: usize,
) -> String {
    let mut section = String::new();

    for outcome in [Outcome::Improvement, Outcome::AverageSteps] {
        let mut blocks = associations.iter().filter(|a| a.outcome == outcome).peekable();
        if blocks.peek().is_none() {
            continue;
        }

        section.push_str(&format!("## {}\n\n", associations_title(outcome)));
        for assoc in blocks {
            section.push_str(&generate_association_block(assoc, summaries, p));
        }
    }

    section
}

/// Generate a single attribute block: coefficient, fit, and scatter points.
fn generate_association_block(
    assoc: &AttributeAssociation,
    summaries: &[Summary],
    p: usize,
) -> String {
    let mut block = String::new();
    let label = assoc.attribute.label();
    let with_steps_today = assoc.outcome == Outcome::AverageSteps;

    block.push_str(&format!("### {} vs. {}\n\n", assoc.outcome.label(), label));

    match (assoc.correlation, assoc.fit) {
        (Some(r), Some(fit)) => {
            block.push_str(&format!("- **Pearson R:** {:.p$}\n", r, p = p));
            block.push_str(&format!(
                "- **Best Fit Line:** {} = {:.p$} × {} {} {:.p$}\n\n",
                assoc.outcome,
                fit.slope,
                assoc.attribute,
                if fit.intercept < 0.0 { "-" } else { "+" },
                fit.intercept.abs(),
                p = p
            ));
        }
        _ => {
            let reason = assoc.error.as_deref().unwrap_or("unknown error");
            block.push_str(&format!("> ⚠️ **Not computed:** {}\n\n", reason));
        }
    }

    let y_header = match assoc.outcome {
        Outcome::Improvement => "Improvement",
        Outcome::AverageSteps => "Avg Steps",
    };
    block.push_str(&format!("| Participant | {} | {} |", label, y_header));
    if with_steps_today {
        block.push_str(" Steps Today |");
    }
    if assoc.fit.is_some() {
        block.push_str(" Fitted |");
    }
    block.push('\n');
    block.push_str("|:---|---:|---:|");
    if with_steps_today {
        block.push_str("---:|");
    }
    if assoc.fit.is_some() {
        block.push_str("---:|");
    }
    block.push('\n');

    for s in summaries {
        let Some(y) = assoc.outcome.value_of(s) else {
            continue;
        };
        let x = assoc.attribute.value_of(s);

        let y = match assoc.outcome {
            Outcome::Improvement => format!("{:+.p$}", y, p = p),
            Outcome::AverageSteps => format!("{:.p$}", y, p = p),
        };
        block.push_str(&format!("| {} | {} | {} |", s.id, x, y));
        if with_steps_today {
            block.push_str(&format!(
                " {} |",
                or_dash(s.total_steps_today.map(|t| t.to_string()))
            ));
        }
        if let Some(fit) = assoc.fit {
            block.push_str(&format!(" {:+.p$} |", fit.predict(x), p = p));
        }
        block.push('\n');
    }
    block.push('\n');

    block
}

/// Generate the daily steps tables, one per participant.
///
/// Paired records show both conditions against `day_labels`; single-series
/// records show their one series against `series_day_labels`.
fn generate_daily_section(
    records: &[ParticipantRecord],
    day_labels: &[String],
    series_day_labels: &[String],
) -> String {
    let mut section = String::new();

    section.push_str("## Daily Steps\n\n");

    for record in records {
        section.push_str(&format!("### {}\n\n", record.id));

        match record.baseline {
            Some(ref baseline) => {
                section.push_str("| Day | Baseline | While Playing | Change |\n");
                section.push_str("|:---|---:|---:|---:|\n");

                for (i, (before, during)) in baseline.iter().zip(&record.treatment).enumerate() {
                    let change = i64::from(*during) - i64::from(*before);
                    section.push_str(&format!(
                        "| {} | {} | {} | {:+} |\n",
                        day_label(day_labels, i),
                        before,
                        during,
                        change
                    ));
                }
            }
            None => {
                section.push_str("| Day | Steps |\n");
                section.push_str("|:---|---:|\n");

                for (i, steps) in record.treatment.iter().enumerate() {
                    section.push_str(&format!(
                        "| {} | {} |\n",
                        day_label(series_day_labels, i),
                        steps
                    ));
                }
            }
        }
        section.push('\n');
    }

    section
}

fn day_label(labels: &[String], i: usize) -> String {
    labels
        .get(i)
        .cloned()
        .unwrap_or_else(|| format!("Day {}", i + 1))
}

/// Generate the pooled distribution (box plot) table.
fn generate_distribution_section(distributions: &ConditionDistributions, p: usize) -> String {
    let mut section = String::new();

    section.push_str("## Distribution of Daily Steps\n\n");
    section.push_str("| Statistic | Baseline | While Playing |\n");
    section.push_str("|:---|---:|---:|\n");

    let rows: [(&str, fn(&Distribution) -> f64); 6] = [
        ("Min", |d| d.min),
        ("Lower Quartile", |d| d.lower_quartile),
        ("Median", |d| d.median),
        ("Upper Quartile", |d| d.upper_quartile),
        ("Max", |d| d.max),
        ("Mean", |d| d.mean),
    ];

    let baseline = distributions.baseline.as_ref();
    section.push_str(&format!(
        "| Days | {} | {} |\n",
        baseline.map_or(0, |d| d.count),
        distributions.treatment.count
    ));
    for (name, get) in rows {
        section.push_str(&format!(
            "| {} | {} | {:.p$} |\n",
            name,
            or_dash(baseline.map(|d| format!("{:.p$}", get(d), p = p))),
            get(&distributions.treatment),
            p = p
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by stepstat v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

fn or_dash(value: Option<String>) -> String {
    value.unwrap_or_else(|| "–".to_string())
}

/// A table-of-contents line linking to the heading `title`.
fn toc_entry(title: &str) -> String {
    format!("- [{}](#{})\n", title, github_slug(title))
}

/// The anchor GitHub generates for a heading: lowercased, punctuation
/// other than `-` and `_` dropped, spaces turned into hyphens.
fn github_slug(heading: &str) -> String {
    heading
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            '-' | '_' => Some(c),
            c if c.is_alphanumeric() => Some(c),
            _ => None,
        })
        .collect()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
