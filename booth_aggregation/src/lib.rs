mod config;
mod normalize;
pub mod builder;
pub mod manual;

use log::{debug, info, warn};

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    fmt::Display,
    ops::{Add, AddAssign},
};

pub use crate::config::*;
pub use crate::normalize::*;

// **** Private structures ****

// Counts saturate at u64::MAX.
#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteCount(u64);

impl VoteCount {
    const EMPTY: VoteCount = VoteCount(0);
}

impl std::iter::Sum for VoteCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(VoteCount::EMPTY, |acc, vc| acc + vc)
    }
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Add for VoteCount {
    type Output = VoteCount;
    fn add(self: VoteCount, rhs: VoteCount) -> VoteCount {
        VoteCount(self.0.saturating_add(rhs.0))
    }
}

// Running sums over the booths, indexed by roster position.
struct Accumulator {
    primary: Vec<VoteCount>,
    // received[c][x]: votes from the ballots of x that ended with c.
    received: Vec<Vec<VoteCount>>,
    is_tcp: Vec<bool>,
    formal: VoteCount,
    informal: VoteCount,
    total: VoteCount,
}

impl Accumulator {
    fn new(num_candidates: usize) -> Accumulator {
        Accumulator {
            primary: vec![VoteCount::EMPTY; num_candidates],
            received: vec![vec![VoteCount::EMPTY; num_candidates]; num_candidates],
            is_tcp: vec![false; num_candidates],
            formal: VoteCount::EMPTY,
            informal: VoteCount::EMPTY,
            total: VoteCount::EMPTY,
        }
    }

    fn add_booth(&mut self, booth: &BoothRecord, positions: &HashMap<&str, usize>) {
        for (name, count) in booth.primary.iter() {
            match positions.get(name.as_str()) {
                Some(idx) => self.primary[*idx] += VoteCount(*count),
                None => warn!(
                    "aggregate: booth {}: ignoring primary votes for unknown candidate {:?}",
                    booth.booth_id, name
                ),
            }
        }
        for dist in booth.tcp.iter() {
            let c_idx = match positions.get(dist.candidate.as_str()) {
                Some(idx) => *idx,
                None => {
                    warn!(
                        "aggregate: booth {}: ignoring distribution to unknown candidate {:?}",
                        booth.booth_id, dist.candidate
                    );
                    continue;
                }
            };
            self.is_tcp[c_idx] = true;
            for (name, count) in dist.received.iter() {
                if let Some(x_idx) = positions.get(name.as_str()) {
                    self.received[c_idx][*x_idx] += VoteCount(*count);
                }
            }
        }
        self.formal += VoteCount(booth.totals.formal);
        self.informal += VoteCount(booth.totals.informal);
        self.total += VoteCount(booth.totals.total);
    }

    // Own primary votes plus everything distributed by the other candidates.
    // A distribution to self is never read.
    fn tcp_total(&self, c_idx: usize) -> VoteCount {
        let distributed: VoteCount = self.received[c_idx]
            .iter()
            .enumerate()
            .filter(|(x_idx, _)| *x_idx != c_idx)
            .map(|(_, vc)| *vc)
            .sum();
        self.primary[c_idx] + distributed
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Percentage of `votes` in `total`, rounded to 2 decimals. 0 when the total is 0.
fn share(votes: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(votes as f64 * 100.0 / total as f64)
    }
}

fn tallies(candidates: &[Candidate], order: &[usize], counts: &[VoteCount]) -> Vec<CandidateTally> {
    let total: VoteCount = order.iter().map(|idx| counts[*idx]).sum();
    order
        .iter()
        .map(|idx| CandidateTally {
            name: candidates[*idx].name.clone(),
            votes: counts[*idx].0,
            percentage: share(counts[*idx].0, total.0),
        })
        .collect()
}

fn primary_tallies(candidates: &[Candidate], acc: &Accumulator) -> Vec<CandidateTally> {
    let roster_order: Vec<usize> = (0..candidates.len()).collect();
    tallies(candidates, &roster_order, &acc.primary)
}

fn tcp_tallies<F>(candidates: &[Candidate], acc: &Accumulator, display_order: &F) -> Vec<CandidateTally>
where
    F: Fn(&Candidate, &Candidate) -> Ordering,
{
    let mut tcp_order: Vec<usize> = (0..candidates.len()).filter(|idx| acc.is_tcp[*idx]).collect();
    tcp_order.sort_by(|a, b| display_order(&candidates[*a], &candidates[*b]));
    let tcp_counts: Vec<VoteCount> = (0..candidates.len()).map(|idx| acc.tcp_total(idx)).collect();
    tallies(candidates, &tcp_order, &tcp_counts)
}

fn party_tallies(candidates: &[Candidate], primary: &[CandidateTally]) -> Vec<PartyTally> {
    let mut groups: Vec<(String, VoteCount)> = Vec::new();
    for (c, t) in candidates.iter().zip(primary.iter()) {
        let party = c
            .party
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(c.name.as_str());
        match groups.iter_mut().find(|(p, _)| p.eq_ignore_ascii_case(party)) {
            Some((_, votes)) => *votes += VoteCount(t.votes),
            None => groups.push((party.to_string(), VoteCount(t.votes))),
        }
    }
    let total: VoteCount = groups.iter().map(|(_, vc)| *vc).sum();
    groups
        .into_iter()
        .map(|(party, vc)| PartyTally {
            party,
            votes: vc.0,
            percentage: share(vc.0, total.0),
        })
        .collect()
}

// The display order is kept for ties.
fn net_position(tcp: &[CandidateTally]) -> Option<NetPosition> {
    let mut ranked: Vec<&CandidateTally> = tcp.iter().collect();
    ranked.sort_by(|a, b| b.votes.cmp(&a.votes));
    let leader = ranked.first()?;
    let runner_up = ranked.get(1);
    Some(NetPosition {
        leader: leader.name.clone(),
        leader_votes: leader.votes,
        runner_up: runner_up.map(|t| t.name.clone()),
        runner_up_votes: runner_up.map(|t| t.votes).unwrap_or(0),
        margin: leader.votes - runner_up.map(|t| t.votes).unwrap_or(0),
        margin_percentage: round2(leader.percentage - runner_up.map(|t| t.percentage).unwrap_or(0.0)),
    })
}

fn swings(
    candidates: &[Candidate],
    baseline_shares: &[(String, f64)],
    basis: SwingBasis,
    primary: &[CandidateTally],
    tcp: &[CandidateTally],
) -> Vec<Swing> {
    let mut res: Vec<Swing> = Vec::new();
    for (label, baseline) in baseline_shares.iter() {
        let candidate = match resolve_candidate(label, candidates) {
            Ok(c) => c,
            Err(e) => {
                warn!("aggregate: skipping baseline share {:?}: {}", label, e);
                continue;
            }
        };
        let current = match basis {
            SwingBasis::Primary => primary.iter(),
            SwingBasis::TwoCandidatePreferred => tcp.iter(),
        }
        .find(|t| t.name == candidate.name)
        .map(|t| t.percentage);
        match current {
            Some(current) => res.push(Swing {
                candidate: candidate.name.clone(),
                basis,
                current,
                baseline: *baseline,
                swing: round2(current - baseline),
            }),
            None => warn!(
                "aggregate: no current {:?} share for {}, skipping its swing",
                basis, candidate.name
            ),
        }
    }
    res
}

fn booth_summary<F>(
    candidates: &[Candidate],
    booth: &BoothRecord,
    positions: &HashMap<&str, usize>,
    options: &AggregateOptions,
    display_order: &F,
) -> BoothSummary
where
    F: Fn(&Candidate, &Candidate) -> Ordering,
{
    let mut acc = Accumulator::new(candidates.len());
    acc.add_booth(booth, positions);
    let primary = primary_tallies(candidates, &acc);
    let tcp = tcp_tallies(candidates, &acc, display_order);
    let baseline_shares: &[(String, f64)] = options
        .booth_baseline_shares
        .iter()
        .find(|(booth_id, _)| *booth_id == booth.booth_id)
        .map(|(_, shares)| shares.as_slice())
        .unwrap_or(&[]);
    BoothSummary {
        booth_id: booth.booth_id.clone(),
        booth_name: booth.booth_name.clone(),
        timestamp: booth.timestamp.clone(),
        net_position: net_position(&tcp),
        swings: swings(candidates, baseline_shares, options.swing_basis, &primary, &tcp),
        primary,
        tcp,
        formal_votes: acc.formal.0,
        informal_votes: acc.informal.0,
        total_votes: acc.total.0,
        informal_percentage: share(acc.informal.0, acc.total.0),
    }
}

/// Aggregates normalized booth records into an electorate summary.
///
/// The TCP candidates are listed in the display order given by the options.
/// The summary is a pure function of the arguments: calling it again with the
/// same input gives the same output.
pub fn aggregate(
    candidates: &[Candidate],
    booths: &[BoothRecord],
    options: &AggregateOptions,
) -> Result<ElectorateSummary, AggregationError> {
    let order = options.tcp_display_order.clone();
    aggregate_by(candidates, booths, options, |a, b| order.compare(a, b))
}

/// Same as [aggregate], with a caller-supplied display order for the TCP
/// candidates. Vote totals never affect the display order.
///
/// Every record is counted. Resubmissions of a booth should be resolved
/// beforehand, see [builder::Builder].
pub fn aggregate_by<F>(
    candidates: &[Candidate],
    booths: &[BoothRecord],
    options: &AggregateOptions,
    display_order: F,
) -> Result<ElectorateSummary, AggregationError>
where
    F: Fn(&Candidate, &Candidate) -> Ordering,
{
    info!(
        "Aggregating {:?} booths, candidates: {:?}",
        booths.len(),
        candidates.len()
    );
    if candidates.is_empty() {
        return Err(AggregationError::EmptyCandidateList);
    }

    let positions: HashMap<&str, usize> = candidates
        .iter()
        .enumerate()
        .map(|(idx, c)| (c.name.as_str(), idx))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut acc = Accumulator::new(candidates.len());
    for booth in booths.iter() {
        debug!("aggregate: adding booth {} ({})", booth.booth_id, booth.booth_name);
        if !seen.insert(booth.booth_id.as_str()) {
            warn!("aggregate: booth {} is counted more than once", booth.booth_id);
        }
        acc.add_booth(booth, &positions);
    }

    let primary = primary_tallies(candidates, &acc);
    let tcp = tcp_tallies(candidates, &acc, &display_order);
    debug!("aggregate: tcp tally: {:?}", tcp);

    let turnout = match options.enrolled_voters {
        Some(enrolled) if enrolled > 0 => Some(round2(acc.total.0 as f64 * 100.0 / enrolled as f64)),
        _ => None,
    };

    let booths_reporting = u32::try_from(booths.len()).unwrap_or(u32::MAX);
    let reporting_percentage = match options.total_booths {
        Some(n) if n > 0 => Some(share(booths_reporting as u64, n as u64)),
        _ => None,
    };

    let issues: Vec<BoothIssue> = booths
        .iter()
        .flat_map(|b| {
            b.issues.iter().map(move |issue| BoothIssue {
                booth_id: b.booth_id.clone(),
                issue: issue.clone(),
            })
        })
        .collect();

    let booth_summaries: Vec<BoothSummary> = booths
        .iter()
        .map(|b| booth_summary(candidates, b, &positions, options, &display_order))
        .collect();

    let summary = ElectorateSummary {
        total_booths: options.total_booths,
        booths_reporting,
        reporting_percentage,
        net_position: net_position(&tcp),
        swings: swings(
            candidates,
            &options.baseline_shares,
            options.swing_basis,
            &primary,
            &tcp,
        ),
        parties: party_tallies(candidates, &primary),
        primary,
        tcp,
        formal_votes: acc.formal.0,
        informal_votes: acc.informal.0,
        total_votes: acc.total.0,
        informal_percentage: share(acc.informal.0, acc.total.0),
        turnout,
        issues,
        booths: booth_summaries,
    };
    info!(
        "Aggregated {} booths: {} formal votes, net position {:?}",
        summary.booths_reporting, summary.formal_votes, summary.net_position
    );
    Ok(summary)
}

// **** Fingerprint ****

fn opt<T: Display>(x: Option<T>) -> String {
    x.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn pct(x: f64) -> String {
    format!("{:.2}", x)
}

fn tally_lines(section: &str, ts: &[CandidateTally]) -> Vec<String> {
    ts.iter()
        .map(|t| format!("{}\t{}\t{}\t{}", section, t.name, t.votes, pct(t.percentage)))
        .collect()
}

fn net_position_line(np: &Option<NetPosition>) -> String {
    match np {
        Some(np) => format!(
            "net\t{}\t{}\t{}\t{}\t{}\t{}",
            np.leader,
            np.leader_votes,
            opt(np.runner_up.as_deref()),
            np.runner_up_votes,
            np.margin,
            pct(np.margin_percentage)
        ),
        None => "net\t-".to_string(),
    }
}

fn swing_lines(sws: &[Swing]) -> Vec<String> {
    sws.iter()
        .map(|sw| {
            format!(
                "swing\t{}\t{:?}\t{}\t{}\t{}",
                sw.candidate,
                sw.basis,
                pct(sw.current),
                pct(sw.baseline),
                pct(sw.swing)
            )
        })
        .collect()
}

impl ElectorateSummary {
    // One line per figure, with fixed number formats.
    fn canonical_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "booths\t{}\t{}\t{}",
                self.booths_reporting,
                opt(self.total_booths),
                opt(self.reporting_percentage.map(pct))
            ),
            format!(
                "votes\t{}\t{}\t{}\t{}",
                self.formal_votes,
                self.informal_votes,
                self.total_votes,
                pct(self.informal_percentage)
            ),
            format!("turnout\t{}", opt(self.turnout.map(pct))),
        ];
        lines.extend(tally_lines("primary", &self.primary));
        lines.extend(tally_lines("tcp", &self.tcp));
        lines.extend(
            self.parties
                .iter()
                .map(|p| format!("party\t{}\t{}\t{}", p.party, p.votes, pct(p.percentage))),
        );
        lines.push(net_position_line(&self.net_position));
        lines.extend(swing_lines(&self.swings));
        lines.extend(
            self.issues
                .iter()
                .map(|bi| format!("issue\t{}\t{}", bi.booth_id, bi.issue)),
        );
        for b in self.booths.iter() {
            lines.push(format!(
                "booth\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                b.booth_id,
                b.booth_name,
                opt(b.timestamp.as_deref()),
                b.formal_votes,
                b.informal_votes,
                b.total_votes,
                pct(b.informal_percentage)
            ));
            lines.extend(tally_lines("booth primary", &b.primary));
            lines.extend(tally_lines("booth tcp", &b.tcp));
            lines.push(net_position_line(&b.net_position));
            lines.extend(swing_lines(&b.swings));
        }
        lines
    }

    /// A sha256 digest of a canonical text rendering of the summary. Two
    /// summaries computed from the same input have the same fingerprint, so a
    /// refresh that changes nothing can be detected without comparing the
    /// structures. Percentages enter the rendering with 2 decimals.
    pub fn fingerprint(&self) -> String {
        sha256::digest(self.canonical_lines().join("\n"))
    }
}
