// ********* Input data structures ***********

use std::cmp::Ordering;
use std::error::Error;
use std::fmt::Display;

/// A candidate registered for an electorate.
///
/// The full name is the canonical identity. The TCP label is the short form
/// (usually the surname in capitals) used by two-candidate-preferred reporting.
/// Candidates sharing a party are grouped in the party totals; a candidate
/// without a party stands as their own group.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub tcp_label: Option<String>,
    pub party: Option<String>,
    pub ballot_position: Option<u32>,
}

impl Candidate {
    pub fn new(name: &str) -> Candidate {
        Candidate {
            name: name.to_string(),
            tcp_label: None,
            party: None,
            ballot_position: None,
        }
    }

    pub fn with_tcp_label(name: &str, label: &str) -> Candidate {
        Candidate {
            tcp_label: Some(label.to_string()),
            ..Candidate::new(name)
        }
    }
}

/// A count as it arrives from data entry.
///
/// Upstream submissions are loosely typed: a count may be a number, a string
/// typed into a form, or not there at all. The normalizer turns every variant
/// into a non-negative integer.
#[derive(PartialEq, Debug, Clone)]
pub enum RawCount {
    Integer(i64),
    Float(f64),
    Text(String),
    Missing,
}

impl RawCount {
    /// Coerces to a vote count. Anything negative or unreadable is 0, and
    /// anything too large for a `u64` is `u64::MAX`.
    pub fn to_count(&self) -> u64 {
        match self {
            RawCount::Integer(i) if *i > 0 => *i as u64,
            RawCount::Integer(_) => 0,
            RawCount::Float(f) if f.is_finite() && *f > 0.0 => f.trunc() as u64,
            RawCount::Float(_) => 0,
            RawCount::Text(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    RawCount::Integer(i).to_count()
                } else if let Ok(f) = s.parse::<f64>() {
                    RawCount::Float(f).to_count()
                } else {
                    0
                }
            }
            RawCount::Missing => 0,
        }
    }
}

impl From<u64> for RawCount {
    fn from(x: u64) -> Self {
        RawCount::Integer(x as i64)
    }
}

/// One booth submission before normalization.
///
/// Maps are stored as ordered pairs so that the output does not depend on hash
/// ordering. A TCP entry maps a TCP label to the votes each source candidate
/// contributed to it.
#[derive(PartialEq, Debug, Clone)]
pub struct RawBooth {
    pub booth_id: String,
    pub booth_name: String,
    pub timestamp: Option<String>,
    pub primary: Vec<(String, RawCount)>,
    pub tcp: Vec<(String, Vec<(String, RawCount)>)>,
    pub formal: RawCount,
    pub informal: RawCount,
    pub total: RawCount,
}

impl RawBooth {
    pub fn new(booth_id: &str, booth_name: &str) -> RawBooth {
        RawBooth {
            booth_id: booth_id.to_string(),
            booth_name: booth_name.to_string(),
            timestamp: None,
            primary: Vec::new(),
            tcp: Vec::new(),
            formal: RawCount::Missing,
            informal: RawCount::Missing,
            total: RawCount::Missing,
        }
    }
}

// ******** Normalized data structures *********

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct BoothTotals {
    pub formal: u64,
    pub informal: u64,
    pub total: u64,
}

/// The votes received by one TCP candidate, broken down by the candidate whose
/// ballots they came from. Covers the whole roster, in roster order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TcpDistribution {
    pub candidate: String,
    pub received: Vec<(String, u64)>,
}

/// Soft invariants of a booth submission. They are reported, never enforced.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ConsistencyIssue {
    PrimaryFormalMismatch { primary_sum: u64, formal: u64 },
    FormalInformalTotalMismatch { formal: u64, informal: u64, total: u64 },
}

impl Display for ConsistencyIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyIssue::PrimaryFormalMismatch { primary_sum, formal } => write!(
                f,
                "primary votes add up to {} but formal is {}",
                primary_sum, formal
            ),
            ConsistencyIssue::FormalInformalTotalMismatch {
                formal,
                informal,
                total,
            } => write!(
                f,
                "formal {} + informal {} does not equal total {}",
                formal, informal, total
            ),
        }
    }
}

/// A booth submission keyed by canonical candidate names.
///
/// Invariant: `primary` and every `TcpDistribution::received` list the full
/// roster in roster order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BoothRecord {
    pub booth_id: String,
    pub booth_name: String,
    pub timestamp: Option<String>,
    pub primary: Vec<(String, u64)>,
    pub tcp: Vec<TcpDistribution>,
    pub totals: BoothTotals,
    pub issues: Vec<ConsistencyIssue>,
}

// ********* Options **********

/// Fixed left-right order of the TCP candidates, for display.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TcpDisplayOrder {
    /// The order of the candidate roster.
    CandidateOrder,
    /// By ballot position. Candidates without one follow in roster order.
    BallotPosition,
    /// The listed names or TCP labels first, in that order. Unlisted candidates
    /// follow in roster order.
    Explicit(Vec<String>),
}

impl TcpDisplayOrder {
    // Entries match like TCP labels do: same name or label, or contained in the name.
    fn rank(&self, c: &Candidate) -> usize {
        match self {
            TcpDisplayOrder::CandidateOrder => 0,
            TcpDisplayOrder::BallotPosition => {
                c.ballot_position.map(|p| p as usize).unwrap_or(usize::MAX)
            }
            TcpDisplayOrder::Explicit(names) => {
                let name = c.name.to_lowercase();
                names
                    .iter()
                    .map(|n| n.trim().to_lowercase())
                    .position(|n| {
                        !n.is_empty()
                            && (name.contains(&n)
                                || c.tcp_label
                                    .as_deref()
                                    .map(|l| l.trim().to_lowercase() == n)
                                    .unwrap_or(false))
                    })
                    .unwrap_or(names.len())
            }
        }
    }

    pub fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        self.rank(a).cmp(&self.rank(b))
    }
}

/// Which vote share a swing is measured on.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SwingBasis {
    Primary,
    TwoCandidatePreferred,
}

#[derive(PartialEq, Debug, Clone)]
pub struct AggregateOptions {
    /// Enrolled voters for the electorate. Turnout is not reported without it.
    pub enrolled_voters: Option<u64>,
    /// Reference percentage shares, by candidate name or TCP label.
    pub baseline_shares: Vec<(String, f64)>,
    pub swing_basis: SwingBasis,
    pub tcp_display_order: TcpDisplayOrder,
    /// Size of the booth roster, when known.
    pub total_booths: Option<u32>,
    /// Reference shares of single booths, by booth id. Booth swings are
    /// measured on the same basis as the electorate swing.
    pub booth_baseline_shares: Vec<(String, Vec<(String, f64)>)>,
}

impl AggregateOptions {
    pub const DEFAULT: AggregateOptions = AggregateOptions {
        enrolled_voters: None,
        baseline_shares: Vec::new(),
        swing_basis: SwingBasis::TwoCandidatePreferred,
        tcp_display_order: TcpDisplayOrder::CandidateOrder,
        total_booths: None,
        booth_baseline_shares: Vec::new(),
    };
}

impl Default for AggregateOptions {
    fn default() -> Self {
        AggregateOptions::DEFAULT
    }
}

// ******** Output data structures *********

#[derive(PartialEq, Debug, Clone)]
pub struct CandidateTally {
    pub name: String,
    pub votes: u64,
    pub percentage: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct PartyTally {
    pub party: String,
    pub votes: u64,
    pub percentage: f64,
}

/// The head of the two-candidate-preferred count.
#[derive(PartialEq, Debug, Clone)]
pub struct NetPosition {
    pub leader: String,
    pub leader_votes: u64,
    pub runner_up: Option<String>,
    pub runner_up_votes: u64,
    pub margin: u64,
    /// Difference of the TCP percentages, in points.
    pub margin_percentage: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Swing {
    pub candidate: String,
    pub basis: SwingBasis,
    pub current: f64,
    pub baseline: f64,
    /// Positive when the share moved toward the candidate.
    pub swing: f64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BoothIssue {
    pub booth_id: String,
    pub issue: ConsistencyIssue,
}

/// The results of one booth, derived the same way as the electorate results.
#[derive(PartialEq, Debug, Clone)]
pub struct BoothSummary {
    pub booth_id: String,
    pub booth_name: String,
    pub timestamp: Option<String>,
    pub primary: Vec<CandidateTally>,
    /// The TCP candidates of this booth, in display order.
    pub tcp: Vec<CandidateTally>,
    pub net_position: Option<NetPosition>,
    pub formal_votes: u64,
    pub informal_votes: u64,
    pub total_votes: u64,
    pub informal_percentage: f64,
    pub swings: Vec<Swing>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ElectorateSummary {
    pub total_booths: Option<u32>,
    pub booths_reporting: u32,
    pub reporting_percentage: Option<f64>,
    pub primary: Vec<CandidateTally>,
    /// In display order.
    pub tcp: Vec<CandidateTally>,
    /// In order of first appearance on the roster.
    pub parties: Vec<PartyTally>,
    pub net_position: Option<NetPosition>,
    pub formal_votes: u64,
    pub informal_votes: u64,
    pub total_votes: u64,
    pub informal_percentage: f64,
    pub turnout: Option<f64>,
    pub swings: Vec<Swing>,
    pub issues: Vec<BoothIssue>,
    /// One entry per booth, in input order.
    pub booths: Vec<BoothSummary>,
}

/// Errors signalled by the engine. Everything else in the input is repaired.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AggregationError {
    /// A label matches none of the candidates.
    UnresolvedCandidate { label: String },
    /// A label matches several candidates.
    AmbiguousCandidate { label: String, matches: Vec<String> },
    /// No candidates are configured for the electorate.
    EmptyCandidateList,
}

impl Error for AggregationError {}

impl Display for AggregationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationError::UnresolvedCandidate { label } => {
                write!(f, "no candidate matches the label {:?}", label)
            }
            AggregationError::AmbiguousCandidate { label, matches } => write!(
                f,
                "the label {:?} matches several candidates: {}",
                label,
                matches.join(", ")
            ),
            AggregationError::EmptyCandidateList => {
                write!(f, "no candidates are configured for this electorate")
            }
        }
    }
}
