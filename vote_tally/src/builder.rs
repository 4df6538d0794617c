pub use crate::config::*;

use crate::run_tally;

use std::collections::HashSet;

/// A builder for assembling the two snapshots of a tally pass.
///
/// ```
/// pub use vote_tally::builder::Builder;
/// pub use vote_tally::{Candidate, TallyOptions};
/// # use vote_tally::TallyErrors;
///
/// let mut builder = Builder::new(&TallyOptions::DEFAULT_OPTIONS)
///     .candidates(&[Candidate::new("c1", "Anna", 1), Candidate::new("c2", "Bob", 2)])?;
///
/// builder.add_report_simple(&[("c1", 10), ("c2", 5)]);
/// builder.add_report_simple(&[("c1", 3)]);
///
/// let result = builder.tally();
/// assert_eq!(result.total_votes, 18);
/// assert_eq!(result.standings[0].votes, 13);
/// # Ok::<(), TallyErrors>(())
/// ```
pub struct Builder {
    pub(crate) _options: TallyOptions,
    pub(crate) _candidates: Vec<Candidate>,
    pub(crate) _reports: Vec<Report>,
}

impl Builder {
    pub fn new(options: &TallyOptions) -> Builder {
        Builder {
            _options: *options,
            _candidates: Vec::new(),
            _reports: Vec::new(),
        }
    }

    /// Registers the candidate snapshot. Candidate ids must be unique.
    pub fn candidates(self, cands: &[Candidate]) -> Result<Builder, TallyErrors> {
        let mut seen: HashSet<&str> = HashSet::new();
        for c in cands.iter() {
            if !seen.insert(c.id.as_str()) {
                return Err(TallyErrors::DuplicateCandidateId(c.id.clone()));
            }
        }
        Ok(Builder {
            _options: self._options,
            _candidates: cands.to_vec(),
            _reports: self._reports,
        })
    }

    /// Adds a plain vote tally.
    ///
    /// It is the simplest use case for most cases. The entries do not need to
    /// reference known candidates; unknown ids are ignored by the tally.
    pub fn add_report_simple(&mut self, votes: &[(&str, u64)]) {
        let entries: Vec<(String, VoteEntry)> = votes
            .iter()
            .map(|(id, count)| (id.to_string(), VoteEntry::Count(*count)))
            .collect();
        self.add_report(Report::with_votes(entries));
    }

    pub fn add_report(&mut self, report: Report) {
        self._reports.push(report);
    }

    /// Runs a full aggregation pass over everything added so far.
    ///
    /// Safe to call repeatedly as more reports arrive; each call recomputes
    /// from the complete report list.
    pub fn tally(&self) -> AggregationResult {
        run_tally(&self._candidates, &self._reports, &self._options)
    }
}
