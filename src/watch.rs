use log::{debug, info, warn};

use vote_tally::*;

use snafu::{prelude::*, Snafu};

use std::fs;
use std::thread;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::watch::municipalities::Municipality;
use crate::watch::snapshot_reader::*;

#[derive(Debug, Snafu)]
pub enum WatchError {
    #[snafu(display("Error opening snapshot {path}"))]
    OpeningSnapshot {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing snapshot {path}"))]
    ParsingSnapshot {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing summary {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display(""))]
    SerializingSummary { source: serde_json::Error },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type WatchResult<T> = Result<T, WatchError>;

pub mod snapshot_reader {
    use crate::watch::*;

    /// A candidate document, as stored by the administration form of the
    /// dashboard.
    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct CandidateDoc {
        pub id: String,
        pub name: String,
        pub party: Option<String>,
        #[serde(rename = "ballotNumber")]
        pub ballot_number: Option<u32>,
        pub color: Option<String>,
        /// The election type this candidate runs for.
        pub position: Option<String>,
        #[serde(rename = "imageUrl")]
        pub image_url: Option<String>,
        pub active: Option<bool>,
    }

    /// A witness report document. Every field is optional: the store does
    /// not enforce any schema on the submissions.
    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ReportDoc {
        pub id: Option<String>,
        #[serde(default)]
        pub votes: JSValue,
        #[serde(rename = "totalVotes", default)]
        pub total_votes: JSValue,
        #[serde(rename = "hasIrregularity")]
        pub has_irregularity: Option<bool>,
        #[serde(rename = "irregularityType")]
        pub irregularity_type: Option<String>,
        pub observation: Option<String>,
        pub resolved: Option<bool>,
        pub municipality: Option<String>,
        #[serde(rename = "tableNumber", default)]
        pub table_number: JSValue,
        #[serde(rename = "votingPlace")]
        pub voting_place: Option<String>,
        #[serde(rename = "witnessName")]
        pub witness_name: Option<String>,
    }

    pub fn read_candidates(path: &str, election_type: Option<&str>) -> WatchResult<Vec<Candidate>> {
        let contents = fs::read_to_string(path).context(OpeningSnapshotSnafu {
            path: path.to_string(),
        })?;
        let docs: Vec<CandidateDoc> =
            serde_json::from_str(&contents).context(ParsingSnapshotSnafu {
                path: path.to_string(),
            })?;
        debug!("read_candidates: {:?} documents", docs.len());

        let mut selected: Vec<&CandidateDoc> = docs
            .iter()
            .filter(|d| d.active.unwrap_or(true))
            .filter(|d| match election_type {
                Some(p) => d.position.as_deref() == Some(p),
                None => true,
            })
            .collect();
        // The public results screen lists candidates by ballot number; the
        // same order here makes stable tie-breaks match the displayed order.
        selected.sort_by_key(|d| d.ballot_number.unwrap_or(u32::MAX));

        Ok(selected
            .iter()
            .enumerate()
            .map(|(idx, d)| Candidate {
                id: d.id.clone(),
                name: d.name.clone(),
                party: d.party.clone().unwrap_or_default(),
                ballot_number: d.ballot_number.unwrap_or(idx as u32 + 1),
                color: d.color.clone(),
            })
            .collect())
    }

    pub fn read_reports(path: &str) -> WatchResult<Vec<Report>> {
        let contents = fs::read_to_string(path).context(OpeningSnapshotSnafu {
            path: path.to_string(),
        })?;
        let docs: Vec<JSValue> = serde_json::from_str(&contents).context(ParsingSnapshotSnafu {
            path: path.to_string(),
        })?;

        let mut reports: Vec<Report> = Vec::new();
        for (idx, doc) in docs.iter().enumerate() {
            match serde_json::from_value::<ReportDoc>(doc.clone()) {
                Ok(rd) => reports.push(convert_report(&rd)),
                Err(e) => {
                    // One malformed submission must not hide the rest of
                    // the tally.
                    warn!("read_reports: skipping malformed report at index {}: {}", idx, e);
                }
            }
        }
        debug!("read_reports: {:?} reports decoded", reports.len());
        Ok(reports)
    }

    pub(crate) fn convert_report(doc: &ReportDoc) -> Report {
        let mut votes: Vec<(String, VoteEntry)> = Vec::new();
        if let Some(map) = doc.votes.as_object() {
            for (key, value) in map.iter() {
                votes.push((key.clone(), read_vote_count(value)));
            }
        }
        Report {
            id: doc.id.clone(),
            votes,
            declared_total: doc.total_votes.as_u64(),
            has_irregularity: doc.has_irregularity.unwrap_or(false),
            irregularity_type: doc.irregularity_type.clone(),
            resolved: doc.resolved.unwrap_or(false),
            municipality: doc.municipality.clone(),
            table_number: read_table_number(&doc.table_number),
        }
    }

    // Anything that is not a non-negative integer degrades to a malformed
    // entry, which the tally counts as zero.
    fn read_vote_count(value: &JSValue) -> VoteEntry {
        match value {
            JSValue::Number(n) => match n.as_u64() {
                Some(c) => VoteEntry::Count(c),
                None => VoteEntry::Malformed,
            },
            _ => VoteEntry::Malformed,
        }
    }

    // Table numbers show up both as strings and as bare numbers.
    fn read_table_number(value: &JSValue) -> Option<String> {
        match value {
            JSValue::String(s) => Some(s.clone()),
            JSValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

pub mod municipalities {
    use crate::watch::*;

    /// One municipality of the monitored department, with its number of
    /// registered polling tables.
    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct Municipality {
        pub id: String,
        pub name: String,
        pub tables: u32,
    }

    // Registry for the department of Caldas. The table counts come from the
    // registrar's polling-place listings for the current cycle.
    const REGISTRY: &[(&str, &str, u32)] = &[
        ("aguadas", "Aguadas", 36),
        ("anserma", "Anserma", 54),
        ("aranzazu", "Aranzazu", 21),
        ("belalcazar", "Belalcázar", 18),
        ("chinchina", "Chinchiná", 107),
        ("filadelfia", "Filadelfia", 19),
        ("la-dorada", "La Dorada", 160),
        ("la-merced", "La Merced", 14),
        ("manizales", "Manizales", 902),
        ("manzanares", "Manzanares", 31),
        ("marmato", "Marmato", 15),
        ("marquetalia", "Marquetalia", 22),
        ("marulanda", "Marulanda", 8),
        ("neira", "Neira", 34),
        ("norcasia", "Norcasia", 12),
        ("pacora", "Pácora", 23),
        ("palestina", "Palestina", 26),
        ("pensilvania", "Pensilvania", 33),
        ("riosucio", "Riosucio", 77),
        ("risaralda", "Risaralda", 16),
        ("salamina", "Salamina", 27),
        ("samana", "Samaná", 35),
        ("san-jose", "San José", 11),
        ("supia", "Supía", 38),
        ("victoria", "Victoria", 14),
        ("villamaria", "Villamaría", 72),
        ("viterbo", "Viterbo", 19),
    ];

    pub fn default_registry() -> Vec<Municipality> {
        REGISTRY
            .iter()
            .map(|(id, name, tables)| Municipality {
                id: id.to_string(),
                name: name.to_string(),
                tables: *tables,
            })
            .collect()
    }

    pub fn read_registry(path: &str) -> WatchResult<Vec<Municipality>> {
        let contents = fs::read_to_string(path).context(OpeningSnapshotSnafu {
            path: path.to_string(),
        })?;
        serde_json::from_str(&contents).context(ParsingSnapshotSnafu {
            path: path.to_string(),
        })
    }

    pub fn total_tables(registry: &[Municipality]) -> u64 {
        registry.iter().map(|m| m.tables as u64).sum()
    }
}

// A negative threshold has no sensible meaning. Treat it as disabled rather
// than failing on election night.
pub(crate) fn resolve_threshold(threshold: Option<i64>) -> Option<u64> {
    match threshold {
        Some(t) if t < 0 => {
            warn!("Ignoring negative projection threshold {}", t);
            None
        }
        Some(t) => Some(t as u64),
        None => None,
    }
}

fn tally_options(args: &Args) -> TallyOptions {
    TallyOptions {
        projection_threshold: resolve_threshold(args.threshold),
        tiebreak_mode: if args.tiebreak_ballot_number {
            TieBreakMode::UseBallotNumber
        } else {
            TieBreakMode::UseInputOrder
        },
    }
}

fn summary_to_json(
    result: &AggregationResult,
    breakdown: Option<&[(String, AggregationResult)]>,
    registry: &[Municipality],
) -> JSValue {
    let standings: Vec<JSValue> = result
        .standings
        .iter()
        .map(|s| {
            json!({
                "id": s.candidate.id,
                "name": s.candidate.name,
                "party": s.candidate.party,
                "ballotNumber": s.candidate.ballot_number,
                "color": s.candidate.color,
                "votes": s.votes,
            })
        })
        .collect();

    let mut js = json!({
        "totalVotes": result.total_votes,
        "blankVotes": result.blank_votes,
        "standings": standings,
        "winner": result.winner.as_ref().map(|c| c.name.clone()),
        "reportedTables": result.reported_tables,
        "totalTables": municipalities::total_tables(registry),
        "activeAlerts": result.active_alerts,
        "declaredMismatches": result.declared_mismatches,
    });

    if let Some(groups) = breakdown {
        let mut by_muni: JSMap<String, JSValue> = JSMap::new();
        for (muni, res) in groups.iter() {
            by_muni.insert(
                muni.clone(),
                json!({
                    "totalVotes": res.total_votes,
                    "blankVotes": res.blank_votes,
                    "reportedTables": res.reported_tables,
                    "activeAlerts": res.active_alerts,
                }),
            );
        }
        js["municipalities"] = JSValue::Object(by_muni);
    }
    js
}

fn compute_summary(
    args: &Args,
    options: &TallyOptions,
    registry: &[Municipality],
) -> WatchResult<JSValue> {
    let candidates = read_candidates(&args.candidates, args.election_type.as_deref())?;
    let reports = read_reports(&args.reports)?;
    info!(
        "Tallying {} reports over {} candidates",
        reports.len(),
        candidates.len()
    );

    let result = run_tally(&candidates, &reports, options);
    if let Some(winner) = &result.winner {
        info!("Projected winner: {} ({})", winner.name, winner.party);
    }

    let breakdown = if args.by_municipality {
        Some(municipal_breakdown(&candidates, &reports, options))
    } else {
        None
    };
    Ok(summary_to_json(&result, breakdown.as_deref(), registry))
}

fn write_summary(pretty: &str, out: &Option<String>) -> WatchResult<()> {
    match out.as_deref() {
        None | Some("stdout") => {
            println!("{}", pretty);
        }
        Some(path) => {
            fs::write(path, pretty).context(WritingSummarySnafu {
                path: path.to_string(),
            })?;
            info!("Summary written to {}", path);
        }
    }
    Ok(())
}

fn check_reference(pretty: &str, reference_path: &str) -> WatchResult<()> {
    let contents = fs::read_to_string(reference_path).context(OpeningSnapshotSnafu {
        path: reference_path.to_string(),
    })?;
    let reference: JSValue = serde_json::from_str(&contents).context(ParsingSnapshotSnafu {
        path: reference_path.to_string(),
    })?;
    let pretty_ref = serde_json::to_string_pretty(&reference).context(SerializingSummarySnafu)?;
    if pretty_ref != pretty {
        warn!("Found differences with the reference summary");
        print_diff(pretty_ref.as_str(), pretty, "\n");
        whatever!("Difference detected between computed summary and reference summary")
    }
    Ok(())
}

fn run_once(args: &Args, options: &TallyOptions, registry: &[Municipality]) -> WatchResult<()> {
    let summary = compute_summary(args, options, registry)?;
    let pretty = serde_json::to_string_pretty(&summary).context(SerializingSummarySnafu)?;
    write_summary(&pretty, &args.out)?;
    if let Some(reference_path) = &args.reference {
        check_reference(&pretty, reference_path)?;
    }
    Ok(())
}

// Models the store subscription at the caller: each time a snapshot file
// changes, the whole pair is re-read and the tally recomputed from scratch.
fn run_watch(
    args: &Args,
    options: &TallyOptions,
    registry: &[Municipality],
    interval: u64,
) -> WatchResult<()> {
    let interval = Duration::from_secs(interval.max(1));
    let mut last_seen: Option<(SystemTime, SystemTime)> = None;
    info!(
        "Watching {} and {} every {:?}",
        args.candidates, args.reports, interval
    );
    loop {
        match (
            snapshot_mtime(&args.candidates),
            snapshot_mtime(&args.reports),
        ) {
            (Ok(c), Ok(r)) if last_seen != Some((c, r)) => {
                last_seen = Some((c, r));
                match compute_summary(args, options, registry) {
                    Ok(summary) => {
                        let pretty = serde_json::to_string_pretty(&summary)
                            .context(SerializingSummarySnafu)?;
                        write_summary(&pretty, &args.out)?;
                    }
                    // A half-written snapshot will be complete on the next
                    // pass. Keep the last summary until then.
                    Err(e) => warn!("Recomputation failed, keeping the last summary: {}", e),
                }
            }
            (Ok(_), Ok(_)) => {}
            _ => warn!("Snapshot file not readable, retrying"),
        }
        thread::sleep(interval);
    }
}

fn snapshot_mtime(path: &str) -> std::io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

pub fn run(args: &Args) -> WatchResult<()> {
    let options = tally_options(args);
    let registry = match &args.municipalities {
        Some(path) => municipalities::read_registry(path)?,
        None => municipalities::default_registry(),
    };
    match args.watch {
        Some(interval) => run_watch(args, &options, &registry, interval),
        None => run_once(args, &options, &registry),
    }
}

#[cfg(test)]
mod tests {
    use super::snapshot_reader::*;
    use super::*;

    // A snapshot file that cleans up after itself once the test is done.
    struct TempSnapshot(std::path::PathBuf);

    impl TempSnapshot {
        fn new(name: &str, contents: &str) -> TempSnapshot {
            let mut p = std::env::temp_dir();
            p.push(format!("e14watch-test-{}-{}", std::process::id(), name));
            fs::write(&p, contents).unwrap();
            TempSnapshot(p)
        }

        fn path(&self) -> &str {
            self.0.to_str().unwrap()
        }
    }

    impl Drop for TempSnapshot {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    #[test]
    fn reads_candidate_snapshot_in_ballot_order() {
        let snapshot = TempSnapshot::new(
            "candidates.json",
            r#"[
                {"id": "c2", "name": "María López", "party": "Cambio Radical",
                 "ballotNumber": 2, "position": "gobernacion"},
                {"id": "c3", "name": "Juan Ramírez", "position": "senado"},
                {"id": "c1", "name": "Carlos Gómez", "party": "Partido Verde",
                 "ballotNumber": 1, "position": "gobernacion"},
                {"id": "c4", "name": "Ana Castro", "position": "gobernacion",
                 "active": false}
            ]"#,
        );
        let candidates = read_candidates(snapshot.path(), Some("gobernacion")).unwrap();
        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(candidates[0].ballot_number, 1);
        assert_eq!(candidates[0].party, "Partido Verde");

        let all = read_candidates(snapshot.path(), None).unwrap();
        // c3 has no ballot number and sorts last.
        let ids: Vec<&str> = all.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(all[2].ballot_number, 3);
    }

    #[test]
    fn malformed_vote_entries_degrade_to_zero() {
        let snapshot = TempSnapshot::new(
            "reports.json",
            r#"[
                {"votes": {"c1": 10, "c2": "many", "blank": 3}, "totalVotes": 13,
                 "municipality": "manizales"},
                {"votes": {"c1": -4}},
                {"hasIrregularity": true, "irregularityType": "presion"}
            ]"#,
        );
        let reports = read_reports(snapshot.path()).unwrap();
        assert_eq!(reports.len(), 3);

        let candidates = vec![
            Candidate::new("c1", "Ana", 1),
            Candidate::new("c2", "Bob", 2),
        ];
        let result = run_tally(&candidates, &reports, &TallyOptions::DEFAULT_OPTIONS);
        assert_eq!(result.total_votes, 10);
        assert_eq!(result.blank_votes, 3);
        assert_eq!(result.active_alerts, 1);
        assert_eq!(result.declared_mismatches, 0);
    }

    #[test]
    fn undecodable_report_documents_are_skipped() {
        let snapshot = TempSnapshot::new(
            "reports-broken.json",
            r#"[
                {"votes": {"c1": 2}},
                {"resolved": "yes"},
                {"votes": "not-a-map", "hasIrregularity": true}
            ]"#,
        );
        let reports = read_reports(snapshot.path()).unwrap();
        // The string-typed `resolved` drops its document; the string-typed
        // vote map decodes to an irregularity-only report.
        assert_eq!(reports.len(), 2);
        assert!(reports[1].votes.is_empty());
        assert!(reports[1].has_irregularity);
    }

    #[test]
    fn negative_threshold_disables_projection() {
        assert_eq!(resolve_threshold(Some(-5)), None);
        assert_eq!(resolve_threshold(Some(0)), Some(0));
        assert_eq!(resolve_threshold(Some(1000)), Some(1000));
        assert_eq!(resolve_threshold(None), None);
    }

    #[test]
    fn summary_reports_table_coverage() {
        let candidates = vec![Candidate::new("c1", "Ana", 1)];
        let reports = vec![Report::with_votes(vec![(
            "c1".to_string(),
            VoteEntry::Count(7),
        )])];
        let result = run_tally(&candidates, &reports, &TallyOptions::DEFAULT_OPTIONS);
        let registry = municipalities::default_registry();
        let js = summary_to_json(&result, None, &registry);
        assert_eq!(js["totalVotes"], 7);
        assert_eq!(js["reportedTables"], 1);
        assert_eq!(
            js["totalTables"].as_u64().unwrap(),
            municipalities::total_tables(&registry)
        );
        assert_eq!(js["winner"], JSValue::Null);
        assert_eq!(js["standings"][0]["id"], "c1");
    }

    #[test]
    fn reference_mismatch_is_detected() {
        let reference = TempSnapshot::new("reference.json", r#"{"totalVotes": 3}"#);
        let matching = serde_json::to_string_pretty(&json!({"totalVotes": 3})).unwrap();
        assert!(check_reference(&matching, reference.path()).is_ok());
        let differing = serde_json::to_string_pretty(&json!({"totalVotes": 4})).unwrap();
        assert!(check_reference(&differing, reference.path()).is_err());
    }
}
