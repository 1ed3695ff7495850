//! Participant aggregation.
//!
//! This module turns loaded participant records into per-participant
//! summaries and relates game attributes to the change in daily steps and
//! to the average daily steps while playing.

use super::stats::{correlate, distribution, fit_line, mean};
use crate::error::{AnalysisError, Result};
use crate::models::{
    Attribute, AttributeAssociation, ConditionDistributions, Outcome, ParticipantRecord, Summary,
};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Compute per-participant means, bests and improvement.
///
/// The output has one summary per record, in input order. Single-series
/// records get no baseline figures and no improvement. Fails with
/// `InvalidRecord` if a record's sequences are empty or differ in length,
/// or if an id appears twice.
pub fn summarize(records: &[ParticipantRecord]) -> Result<Vec<Summary>> {
    let mut seen = HashSet::new();

    records
        .iter()
        .map(|record| {
            if !seen.insert(record.id.as_str()) {
                return Err(AnalysisError::invalid(&record.id, "duplicate participant id"));
            }
            summarize_record(record)
        })
        .collect()
}

fn summarize_record(record: &ParticipantRecord) -> Result<Summary> {
    record.validate(None)?;

    let avg_treatment = mean(&as_f64(&record.treatment))?;
    let avg_baseline = match record.baseline {
        Some(ref baseline) => Some(mean(&as_f64(baseline))?),
        None => None,
    };
    let improvement = avg_baseline.map(|avg| avg_treatment - avg);

    match (avg_baseline, improvement) {
        (Some(avg_baseline), Some(improvement)) => debug!(
            "{}: baseline {:.1}, treatment {:.1}, improvement {:+.1}",
            record.id, avg_baseline, avg_treatment, improvement
        ),
        _ => debug!("{}: {:.1} steps/day, no baseline", record.id, avg_treatment),
    }

    Ok(Summary {
        id: record.id.clone(),
        avg_baseline,
        avg_treatment,
        improvement,
        best_baseline: record.baseline.as_deref().map(best_day),
        best_treatment: best_day(&record.treatment),
        level: record.level,
        balance: record.balance,
        total_steps_today: record.total_steps_today,
    })
}

fn as_f64(steps: &[u32]) -> Vec<f64> {
    steps.iter().map(|&s| f64::from(s)).collect()
}

fn best_day(steps: &[u32]) -> u32 {
    steps.iter().copied().max().unwrap_or(0)
}

/// `(attribute, outcome)` points for every summary that has the outcome,
/// in order.
pub fn points(
    summaries: &[Summary],
    attribute: Attribute,
    outcome: Outcome,
) -> (Vec<f64>, Vec<f64>) {
    summaries
        .iter()
        .filter_map(|s| outcome.value_of(s).map(|y| (attribute.value_of(s), y)))
        .unzip()
}

/// Correlation and best-fit line of `outcome` against `attribute`.
///
/// A failure is recorded in the returned association rather than raised,
/// so one degenerate attribute does not hide the others.
pub fn associate(
    summaries: &[Summary],
    attribute: Attribute,
    outcome: Outcome,
) -> AttributeAssociation {
    let (xs, ys) = points(summaries, attribute, outcome);

    let stats = correlate(&xs, &ys).and_then(|r| fit_line(&xs, &ys).map(|fit| (r, fit)));

    match stats {
        Ok((r, fit)) => {
            debug!("{} vs {}: R = {:.3}", attribute, outcome, r);
            AttributeAssociation {
                attribute,
                outcome,
                correlation: Some(r),
                fit: Some(fit),
                successful: true,
                error: None,
            }
        }
        Err(e) => {
            warn!("Cannot relate {} to {}: {}", attribute, outcome, e);
            AttributeAssociation::failed(attribute, outcome, e.to_string())
        }
    }
}

/// Associations in report order: every attribute against the improvement,
/// then the level against the average daily steps.
///
/// The improvement associations are left out when no summary has a
/// baseline.
pub fn associations(summaries: &[Summary]) -> Vec<AttributeAssociation> {
    let any_paired = summaries.iter().any(|s| s.improvement.is_some());
    if !any_paired {
        debug!("No participant has a baseline, skipping improvement correlations");
    }

    Attribute::ALL
        .iter()
        .filter(|_| any_paired)
        .map(|&attribute| associate(summaries, attribute, Outcome::Improvement))
        .chain(std::iter::once(associate(
            summaries,
            Attribute::Level,
            Outcome::AverageSteps,
        )))
        .collect()
}

/// Pool every participant's daily steps per condition and summarize them.
///
/// Only paired records contribute baseline days.
pub fn pooled_distributions(records: &[ParticipantRecord]) -> Result<ConditionDistributions> {
    let baseline: Vec<f64> = records
        .iter()
        .filter_map(|r| r.baseline.as_deref())
        .flat_map(as_f64)
        .collect();
    let treatment: Vec<f64> = records.iter().flat_map(|r| as_f64(&r.treatment)).collect();

    Ok(ConditionDistributions {
        baseline: if baseline.is_empty() {
            None
        } else {
            Some(distribution(&baseline)?)
        },
        treatment: distribution(&treatment)?,
    })
}

/// Participants with the largest improvement, highest first. Single-series
/// participants have no improvement and are never listed.
pub fn top_improvers(summaries: &[Summary], n: usize) -> Vec<&Summary> {
    let mut ranked: Vec<(f64, &Summary)> = summaries
        .iter()
        .filter_map(|s| s.improvement.map(|improvement| (improvement, s)))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    ranked.into_iter().take(n).map(|(_, s)| s).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, baseline: Vec<u32>, treatment: Vec<u32>, level: f64) -> ParticipantRecord {
        ParticipantRecord::new(id, baseline, treatment, level, level * 100.0)
    }

    fn cohort() -> Vec<ParticipantRecord> {
        (1..=5)
            .map(|i| {
                let base = 1000 * i;
                record(
                    &format!("Participant{}", i),
                    vec![base; 7],
                    vec![base + 10 * i; 7],
                    i as f64,
                )
            })
            .collect()
    }

    #[test]
    fn test_summarize_constant_days() {
        let records = vec![record("p1", vec![100; 7], vec![200; 7], 1.0)];
        let summaries = summarize(&records).unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].avg_baseline, Some(100.0));
        assert_eq!(summaries[0].avg_treatment, 200.0);
        assert_eq!(summaries[0].improvement, Some(100.0));
        assert_eq!(summaries[0].best_baseline, Some(100));
        assert_eq!(summaries[0].best_treatment, 200);
    }

    #[test]
    fn test_summarize_improvement_is_difference_of_means() {
        let records = vec![
            record(
                "a",
                vec![3120, 4012, 2877, 5021, 3990, 1204, 2210],
                vec![4410, 3981, 5120, 6022, 2990, 3311, 4780],
                2.0,
            ),
            record(
                "b",
                vec![8000, 7200, 6543, 9100, 5000, 4300, 7777],
                vec![6000, 5400, 7000, 8100, 6600, 3900, 5100],
                4.0,
            ),
        ];

        for s in summarize(&records).unwrap() {
            assert_eq!(Some(s.avg_treatment - s.avg_baseline.unwrap()), s.improvement);
        }
    }

    #[test]
    fn test_summarize_best_day() {
        let records = vec![record("p", vec![10, 50, 30], vec![70, 20, 60], 1.0)];
        let s = &summarize(&records).unwrap()[0];
        assert_eq!(s.best_baseline, Some(50));
        assert_eq!(s.best_treatment, 70);
    }

    #[test]
    fn test_summarize_single_series() {
        let mut single = ParticipantRecord::single_series("s", vec![1000, 3000, 2000], 4.0, 80.0);
        single.total_steps_today = Some(2500);
        let records = vec![record("p", vec![10, 20, 30], vec![20, 30, 40], 1.0), single];

        let summaries = summarize(&records).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].improvement, Some(10.0));

        let s = &summaries[1];
        assert_eq!(s.avg_baseline, None);
        assert_eq!(s.improvement, None);
        assert_eq!(s.best_baseline, None);
        assert_eq!(s.avg_treatment, 2000.0);
        assert_eq!(s.best_treatment, 3000);
        assert_eq!(s.total_steps_today, Some(2500));
    }

    #[test]
    fn test_summarize_preserves_order_and_count() {
        let records = cohort();
        let summaries = summarize(&records).unwrap();

        assert_eq!(summaries.len(), records.len());
        for (record, summary) in records.iter().zip(&summaries) {
            assert_eq!(record.id, summary.id);
            assert_eq!(record.level, summary.level);
            assert_eq!(record.balance, summary.balance);
        }
    }

    #[test]
    fn test_summarize_rejects_length_mismatch() {
        let records = vec![
            record("ok", vec![1; 7], vec![2; 7], 1.0),
            record("bad", vec![1; 7], vec![2; 6], 2.0),
        ];

        match summarize(&records) {
            Err(AnalysisError::InvalidRecord { id, .. }) => assert_eq!(id, "bad"),
            other => panic!("expected InvalidRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_summarize_rejects_duplicate_ids() {
        let records = vec![
            record("same", vec![1; 7], vec![2; 7], 1.0),
            record("same", vec![1; 7], vec![2; 7], 2.0),
        ];
        assert!(matches!(
            summarize(&records),
            Err(AnalysisError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn test_summarize_empty_batch() {
        assert!(summarize(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_level_correlates_with_improvement() {
        let summaries = summarize(&cohort()).unwrap();

        let (levels, improvements) = points(&summaries, Attribute::Level, Outcome::Improvement);
        assert_eq!(levels, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(improvements, vec![10.0, 20.0, 30.0, 40.0, 50.0]);

        let assoc = associate(&summaries, Attribute::Level, Outcome::Improvement);
        assert!(assoc.successful);
        assert_eq!(assoc.outcome, Outcome::Improvement);
        assert_eq!(assoc.correlation, Some(1.0));
        let fit = assoc.fit.unwrap();
        assert!((fit.slope - 10.0).abs() < 1e-9);
        assert!(fit.intercept.abs() < 1e-9);
    }

    #[test]
    fn test_associate_degenerate_attribute() {
        let records: Vec<_> = (1..=3)
            .map(|i| {
                ParticipantRecord::new(format!("p{}", i), vec![100; 7], vec![100 + i; 7], 2.0, 50.0)
            })
            .collect();
        let summaries = summarize(&records).unwrap();

        let all = associations(&summaries);
        assert_eq!(all.len(), 3);
        for assoc in all {
            assert!(!assoc.successful);
            assert!(assoc.correlation.is_none());
            assert!(assoc.error.unwrap().contains("Degenerate"));
        }
    }

    #[test]
    fn test_associate_single_participant() {
        let summaries = summarize(&[record("solo", vec![1; 7], vec![2; 7], 1.0)]).unwrap();
        let assoc = associate(&summaries, Attribute::Balance, Outcome::Improvement);
        assert!(!assoc.successful);
        assert!(assoc.error.unwrap().contains("Insufficient"));
    }

    #[test]
    fn test_level_vs_average_steps() {
        // Average steps 1000, 2000, 3000 at levels 1, 2, 3 across both shapes
        let records = vec![
            record("p1", vec![500; 7], vec![1000; 7], 1.0),
            ParticipantRecord::single_series("s2", vec![2000; 7], 2.0, 10.0),
            ParticipantRecord::single_series("s3", vec![3000; 7], 3.0, 10.0),
        ];
        let summaries = summarize(&records).unwrap();

        let assoc = associate(&summaries, Attribute::Level, Outcome::AverageSteps);
        assert!(assoc.successful);
        assert_eq!(assoc.correlation, Some(1.0));
        let fit = assoc.fit.unwrap();
        assert!((fit.slope - 1000.0).abs() < 1e-9);
        assert!(fit.intercept.abs() < 1e-9);

        // Only p1 has an improvement
        let improvement = associate(&summaries, Attribute::Level, Outcome::Improvement);
        assert!(improvement.error.unwrap().contains("Insufficient"));
    }

    #[test]
    fn test_associations_without_baselines() {
        let records: Vec<_> = (1..=3)
            .map(|i| {
                ParticipantRecord::single_series(format!("s{}", i), vec![1000 * i; 7], i as f64, 5.0)
            })
            .collect();
        let summaries = summarize(&records).unwrap();

        let all = associations(&summaries);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].attribute, Attribute::Level);
        assert_eq!(all[0].outcome, Outcome::AverageSteps);
        assert!(all[0].successful);
    }

    #[test]
    fn test_pooled_distributions() {
        let records = vec![
            record("a", vec![1, 2, 3], vec![10, 20, 30], 1.0),
            record("b", vec![4, 5, 6], vec![40, 50, 60], 2.0),
        ];

        let dists = pooled_distributions(&records).unwrap();
        let baseline = dists.baseline.unwrap();
        assert_eq!(baseline.count, 6);
        assert_eq!(baseline.min, 1.0);
        assert_eq!(baseline.max, 6.0);
        assert_eq!(dists.treatment.max, 60.0);
        assert!(dists.treatment.median > baseline.median);
    }

    #[test]
    fn test_pooled_distributions_single_series() {
        let records = vec![
            record("a", vec![1, 2, 3], vec![10, 20, 30], 1.0),
            ParticipantRecord::single_series("b", vec![40, 50, 60], 2.0, 0.0),
        ];
        let dists = pooled_distributions(&records).unwrap();
        assert_eq!(dists.baseline.unwrap().count, 3);
        assert_eq!(dists.treatment.count, 6);

        let only_single = [ParticipantRecord::single_series("b", vec![40, 50], 2.0, 0.0)];
        let dists = pooled_distributions(&only_single).unwrap();
        assert!(dists.baseline.is_none());
        assert_eq!(dists.treatment.count, 2);
    }

    #[test]
    fn test_top_improvers() {
        let summaries = summarize(&cohort()).unwrap();
        let top = top_improvers(&summaries, 2);

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].id, "Participant5");
        assert_eq!(top[1].id, "Participant4");

        let mut records = cohort();
        records.push(ParticipantRecord::single_series("s", vec![99_999; 7], 9.0, 0.0));
        let summaries = summarize(&records).unwrap();
        let top = top_improvers(&summaries, 10);
        assert_eq!(top.len(), 5);
        assert!(top.iter().all(|s| s.id != "s"));
    }
}
