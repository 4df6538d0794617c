mod config;
pub mod builder;
pub mod manual;

use log::{debug, info, warn};

use std::collections::{BTreeMap, HashMap};

pub use crate::config::*;

/// Runs one full aggregation pass over the given snapshot pair.
///
/// Arguments:
/// * `candidates` the candidate snapshot. Any order is acceptable; the order
/// is what stable tie-breaks fall back to.
/// * `reports` the report snapshot.
/// * `options` the projection threshold and the tie-break mode.
///
/// This is a pure function of its inputs and it never fails: malformed vote
/// entries and unknown candidate ids contribute zero instead of aborting the
/// pass. It is meant to be invoked again from scratch every time either
/// snapshot changes.
pub fn run_tally(
    candidates: &[Candidate],
    reports: &[Report],
    options: &TallyOptions,
) -> AggregationResult {
    info!(
        "run_tally: {:?} candidates, {:?} reports, options: {:?}",
        candidates.len(),
        reports.len(),
        options
    );

    // Intern the candidate ids to dense indices for the counting pass.
    // A duplicated id keeps its first counter; the builder API rejects
    // duplicates upfront.
    let mut index_of: HashMap<&str, usize> = HashMap::new();
    let mut interned: Vec<&Candidate> = Vec::new();
    for cand in candidates.iter() {
        if index_of.contains_key(cand.id.as_str()) {
            warn!(
                "run_tally: duplicate candidate id {:?}, keeping the first occurrence",
                cand.id
            );
            continue;
        }
        index_of.insert(cand.id.as_str(), interned.len());
        interned.push(cand);
    }

    let mut counters: Vec<u64> = vec![0; interned.len()];
    let mut total_votes: u64 = 0;
    let mut blank_votes: u64 = 0;
    let mut active_alerts: usize = 0;
    let mut declared_mismatches: usize = 0;

    for report in reports.iter() {
        // Sum of the well-formed entries of this report, blank included.
        // Only used to check the submitter-declared total.
        let mut report_sum: u64 = 0;
        for (key, entry) in report.votes.iter() {
            let count = match entry {
                VoteEntry::Count(c) => *c,
                VoteEntry::Malformed => {
                    debug!(
                        "run_tally: malformed entry for {:?} in report {:?}",
                        key, report.id
                    );
                    continue;
                }
            };
            // Counts come from untrusted submissions: saturate rather than
            // overflow, the pass must never panic on data-shape problems.
            report_sum = report_sum.saturating_add(count);
            if key == BLANK_KEY {
                blank_votes = blank_votes.saturating_add(count);
            } else if let Some(&idx) = index_of.get(key.as_str()) {
                counters[idx] = counters[idx].saturating_add(count);
                total_votes = total_votes.saturating_add(count);
            } else {
                // The two snapshot streams are independent: a report may
                // reference a candidate the current snapshot does not have.
                debug!(
                    "run_tally: unknown candidate id {:?} in report {:?}",
                    key, report.id
                );
            }
        }

        if report.has_irregularity && !report.resolved {
            active_alerts += 1;
        }
        if let Some(declared) = report.declared_total {
            if declared != report_sum {
                warn!(
                    "run_tally: report {:?} declares {:?} votes, recomputed {:?}",
                    report.id, declared, report_sum
                );
                declared_mismatches += 1;
            }
        }
    }

    let mut standings: Vec<CandidateStanding> = interned
        .iter()
        .zip(counters.iter())
        .map(|(cand, &votes)| CandidateStanding {
            candidate: (*cand).clone(),
            votes,
        })
        .collect();
    if options.tiebreak_mode == TieBreakMode::UseBallotNumber {
        standings.sort_by_key(|s| s.candidate.ballot_number);
    }
    // The descending sort is stable: ties keep the order established above.
    standings.sort_by(|a, b| b.votes.cmp(&a.votes));

    let winner = match options.projection_threshold {
        Some(threshold) if total_votes >= threshold => {
            standings.first().map(|s| s.candidate.clone())
        }
        _ => None,
    };

    debug!(
        "run_tally: total: {:?} blank: {:?} alerts: {:?} winner: {:?}",
        total_votes,
        blank_votes,
        active_alerts,
        winner.as_ref().map(|c| &c.id)
    );

    AggregationResult {
        total_votes,
        blank_votes,
        standings,
        winner,
        reported_tables: reports.len(),
        active_alerts,
        declared_mismatches,
    }
}

/// Groups the reports by municipality and runs one aggregation pass per
/// group. Reports without a municipality attribute end up under
/// [UNASSIGNED_MUNICIPALITY]. Groups are returned in key order.
///
/// The report sets are tiny (at most a few thousand polling tables), so the
/// repeated full passes are deliberate. There is no incremental path.
pub fn municipal_breakdown(
    candidates: &[Candidate],
    reports: &[Report],
    options: &TallyOptions,
) -> Vec<(String, AggregationResult)> {
    let mut groups: BTreeMap<String, Vec<Report>> = BTreeMap::new();
    for report in reports.iter() {
        let key = report
            .municipality
            .clone()
            .unwrap_or_else(|| UNASSIGNED_MUNICIPALITY.to_string());
        groups.entry(key).or_default().push(report.clone());
    }
    groups
        .into_iter()
        .map(|(muni, group)| {
            let res = run_tally(candidates, &group, options);
            (muni, res)
        })
        .collect()
}
