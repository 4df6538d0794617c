use clap::Parser;

/// Election-night tally monitor for witness-reported vote counts.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) JSON snapshot of the registered candidates, as exported
    /// from the document store backing the dashboard.
    #[clap(short, long, value_parser)]
    pub candidates: String,

    /// (file path) JSON snapshot of the witness reports.
    #[clap(short, long, value_parser)]
    pub reports: String,

    /// (file path, 'stdout' or empty) If specified, the tally summary will be written in JSON
    /// format to the given location instead of the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference summary in JSON format. If provided, e14watch will check that
    /// the computed summary matches the reference.
    #[clap(long, value_parser)]
    pub reference: Option<String>,

    /// Vote count at which a winner projection is shown. Omitted or negative values disable
    /// the projection.
    #[clap(short, long, value_parser, allow_hyphen_values = true)]
    pub threshold: Option<i64>,

    /// Break ties in the standings by ballot number instead of candidate snapshot order.
    #[clap(long, takes_value = false)]
    pub tiebreak_ballot_number: bool,

    /// If specified, restricts the tally to the candidates running for this election type
    /// (presidencia, gobernacion, alcaldia, ...).
    #[clap(long, value_parser)]
    pub election_type: Option<String>,

    /// (file path) Overrides the built-in municipality registry used for table coverage.
    #[clap(long, value_parser)]
    pub municipalities: Option<String>,

    /// Include the per-municipality breakdown in the summary.
    #[clap(long, takes_value = false)]
    pub by_municipality: bool,

    /// (seconds) Re-read the snapshot files at this interval and recompute the summary when
    /// either of them changed.
    #[clap(short, long, value_parser)]
    pub watch: Option<u64>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
