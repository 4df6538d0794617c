// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// Reserved key in a report's vote map that holds the count of blank ballots.
///
/// Blank ballots are never attributed to a candidate and do not enter the
/// per-candidate grand total. They are reported separately.
pub const BLANK_KEY: &str = "blank";

/// Group key used for reports that carry no municipality attribute.
pub const UNASSIGNED_MUNICIPALITY: &str = "unassigned";

/// A contestant with a stable identifier and display attributes.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Candidate {
    /// Opaque identifier, stable for the election cycle.
    pub id: String,
    pub name: String,
    pub party: String,
    /// Positive, unique per election type. Used for display ordering and the
    /// explicit tie-break mode only, never in the aggregation arithmetic.
    pub ballot_number: u32,
    /// Display attribute, irrelevant to aggregation.
    pub color: Option<String>,
}

impl Candidate {
    /// Convenience constructor with empty display attributes.
    pub fn new(id: &str, name: &str, ballot_number: u32) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: name.to_string(),
            party: String::new(),
            ballot_number,
            color: None,
        }
    }
}

/// One entry of a report's vote map, after boundary decoding.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum VoteEntry {
    /// A well-formed non-negative count.
    Count(u64),
    /// A value that was negative or not a number in the submitted document.
    /// Contributes zero to every total, never fails the pass.
    Malformed,
}

/// One witness submission: a vote tally for a polling table, an irregularity
/// notice, or both.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Report {
    pub id: Option<String>,
    /// Sparse mapping from candidate id to count. May be empty for
    /// irregularity-only reports, and may reference candidate ids that are
    /// not in the current candidate snapshot.
    pub votes: Vec<(String, VoteEntry)>,
    /// The total declared by the submitter. Kept for mismatch detection,
    /// never used in the tally arithmetic.
    pub declared_total: Option<u64>,
    pub has_irregularity: bool,
    pub irregularity_type: Option<String>,
    /// Set by a separate resolution workflow. Irrelevant to vote totals.
    pub resolved: bool,
    pub municipality: Option<String>,
    pub table_number: Option<String>,
}

impl Report {
    /// A plain vote tally with no irregularity and no location attributes.
    pub fn with_votes(votes: Vec<(String, VoteEntry)>) -> Report {
        Report {
            id: None,
            votes,
            declared_total: None,
            has_irregularity: false,
            irregularity_type: None,
            resolved: false,
            municipality: None,
            table_number: None,
        }
    }
}

// ******** Output data structures *********

/// A candidate annotated with its aggregated vote count.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateStanding {
    pub candidate: Candidate,
    pub votes: u64,
}

/// The outcome of one aggregation pass over a snapshot pair.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AggregationResult {
    /// Sum of all counted per-candidate votes. Blank ballots excluded.
    pub total_votes: u64,
    /// Blank ballots, from the reserved key in the vote maps.
    pub blank_votes: u64,
    /// Every candidate of the input snapshot, sorted by vote count
    /// descending. Ties keep the order established by the tie-break mode.
    pub standings: Vec<CandidateStanding>,
    /// The top-ranked candidate, present only once the projection threshold
    /// is met.
    pub winner: Option<Candidate>,
    /// Number of reports in the snapshot.
    pub reported_tables: usize,
    /// Reports flagged with an irregularity and not yet resolved.
    pub active_alerts: usize,
    /// Reports whose declared total differs from the recomputed sum of their
    /// own well-formed entries.
    pub declared_mismatches: usize,
}

/// Errors for caller bugs when assembling the inputs.
///
/// The aggregation itself never fails: malformed report data degrades to a
/// zero contribution so that one bad submission cannot hide the tally.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TallyErrors {
    DuplicateCandidateId(String),
}

impl Error for TallyErrors {}

impl Display for TallyErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TallyErrors::DuplicateCandidateId(id) => {
                write!(f, "duplicate candidate id: {}", id)
            }
        }
    }
}

// ********* Configuration **********

/// How candidates with equal vote counts are ordered in the standings.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TieBreakMode {
    /// Keep the input order of the candidate snapshot (stable sort).
    UseInputOrder,
    /// Order ties by ascending ballot number. Deterministic regardless of
    /// the order in which the snapshot delivered the candidates.
    UseBallotNumber,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct TallyOptions {
    /// Grand total at which a winner projection is produced. Disabled when
    /// absent.
    pub projection_threshold: Option<u64>,
    pub tiebreak_mode: TieBreakMode,
}

impl TallyOptions {
    pub const DEFAULT_OPTIONS: TallyOptions = TallyOptions {
        projection_threshold: None,
        tiebreak_mode: TieBreakMode::UseInputOrder,
    };
}
