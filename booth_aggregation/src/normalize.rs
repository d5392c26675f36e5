use log::{debug, warn};

use crate::config::*;

/// What to do with a booth whose candidate labels cannot be resolved.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum UnresolvedPolicy {
    /// The first failing booth fails the whole batch.
    Fail,
    /// Failing booths are set aside, with their error.
    SkipBooth,
}

/// The outcome of normalizing a batch of submissions.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NormalizedBatch {
    pub records: Vec<BoothRecord>,
    /// Booth ids that were skipped, with the reason.
    pub skipped: Vec<(String, AggregationError)>,
}

/// Resolves a full name or a TCP label to a candidate of the roster.
///
/// The label must be contained, ignoring case, in exactly one full name. A
/// label that is also a full name is still ambiguous when another name
/// contains it.
pub fn resolve_candidate<'a>(
    label: &str,
    candidates: &'a [Candidate],
) -> Result<&'a Candidate, AggregationError> {
    resolve_index(label, candidates).map(|idx| &candidates[idx])
}

pub(crate) fn resolve_index(label: &str, candidates: &[Candidate]) -> Result<usize, AggregationError> {
    let needle = label.trim().to_lowercase();
    if needle.is_empty() {
        return Err(AggregationError::UnresolvedCandidate {
            label: label.to_string(),
        });
    }

    let matches: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.name.to_lowercase().contains(&needle))
        .map(|(idx, _)| idx)
        .collect();

    match matches.as_slice() {
        [] => Err(AggregationError::UnresolvedCandidate {
            label: label.to_string(),
        }),
        [idx] => Ok(*idx),
        _ => Err(AggregationError::AmbiguousCandidate {
            label: label.to_string(),
            matches: matches
                .iter()
                .map(|idx| candidates[*idx].name.clone())
                .collect(),
        }),
    }
}

// Sums the counts per roster position. Keys resolving to the same candidate are merged.
fn resolve_counts(
    counts: &[(String, RawCount)],
    candidates: &[Candidate],
) -> Result<Vec<u64>, AggregationError> {
    let mut res: Vec<u64> = vec![0; candidates.len()];
    for (label, raw) in counts.iter() {
        let idx = resolve_index(label, candidates)?;
        res[idx] = res[idx].saturating_add(raw.to_count());
    }
    Ok(res)
}

fn with_names(counts: &[u64], candidates: &[Candidate]) -> Vec<(String, u64)> {
    candidates
        .iter()
        .zip(counts.iter())
        .map(|(c, vc)| (c.name.clone(), *vc))
        .collect()
}

/// Normalizes one booth submission against the candidate roster.
///
/// Every count is coerced to a non-negative integer and every key is bound to a
/// canonical full name. Absent entries are filled with 0. The only failures are
/// candidate labels that do not resolve to exactly one candidate.
pub fn normalize(raw: &RawBooth, candidates: &[Candidate]) -> Result<BoothRecord, AggregationError> {
    let primary = resolve_counts(&raw.primary, candidates)?;

    // TCP candidates by roster position, in roster order.
    let mut tcp: Vec<Option<Vec<u64>>> = vec![None; candidates.len()];
    for (label, distribution) in raw.tcp.iter() {
        let idx = resolve_index(label, candidates)?;
        let received = resolve_counts(distribution, candidates)?;
        match tcp[idx].as_mut() {
            Some(existing) => {
                for (e, r) in existing.iter_mut().zip(received.iter()) {
                    *e = e.saturating_add(*r);
                }
            }
            None => {
                tcp[idx] = Some(received);
            }
        }
    }
    let tcp: Vec<TcpDistribution> = tcp
        .iter()
        .enumerate()
        .filter_map(|(idx, received)| {
            received.as_ref().map(|r| TcpDistribution {
                candidate: candidates[idx].name.clone(),
                received: with_names(r, candidates),
            })
        })
        .collect();

    let totals = BoothTotals {
        formal: raw.formal.to_count(),
        informal: raw.informal.to_count(),
        total: raw.total.to_count(),
    };

    // Only the figures that were actually submitted are checked.
    let mut issues: Vec<ConsistencyIssue> = Vec::new();
    let primary_sum: u64 = primary.iter().fold(0, |acc, x| acc.saturating_add(*x));
    if raw.formal != RawCount::Missing && primary_sum != totals.formal {
        issues.push(ConsistencyIssue::PrimaryFormalMismatch {
            primary_sum,
            formal: totals.formal,
        });
    }
    if raw.total != RawCount::Missing && totals.formal.saturating_add(totals.informal) != totals.total {
        issues.push(ConsistencyIssue::FormalInformalTotalMismatch {
            formal: totals.formal,
            informal: totals.informal,
            total: totals.total,
        });
    }
    for issue in issues.iter() {
        warn!("normalize: booth {} ({}): {}", raw.booth_id, raw.booth_name, issue);
    }

    let record = BoothRecord {
        booth_id: raw.booth_id.clone(),
        booth_name: raw.booth_name.clone(),
        timestamp: raw.timestamp.clone(),
        primary: with_names(&primary, candidates),
        tcp,
        totals,
        issues,
    };
    debug!("normalize: booth {}: {:?}", raw.booth_id, record);
    Ok(record)
}

/// Normalizes a batch of submissions, applying the given policy to booths that
/// cannot be resolved.
pub fn normalize_all(
    raws: &[RawBooth],
    candidates: &[Candidate],
    policy: UnresolvedPolicy,
) -> Result<NormalizedBatch, AggregationError> {
    let mut records: Vec<BoothRecord> = Vec::new();
    let mut skipped: Vec<(String, AggregationError)> = Vec::new();
    for raw in raws.iter() {
        match (normalize(raw, candidates), policy) {
            (Ok(record), _) => records.push(record),
            (Err(e), UnresolvedPolicy::Fail) => return Err(e),
            (Err(e), UnresolvedPolicy::SkipBooth) => {
                warn!(
                    "normalize_all: skipping booth {} ({}): {}",
                    raw.booth_id, raw.booth_name, e
                );
                skipped.push((raw.booth_id.clone(), e));
            }
        }
    }
    Ok(NormalizedBatch { records, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ns: &[&str]) -> Vec<Candidate> {
        ns.iter().map(|n| Candidate::new(n)).collect()
    }

    #[test]
    fn resolves_surname_label() {
        let cands = names(&["Zali Steggall", "Katherine Deves"]);
        let c = resolve_candidate("STEGGALL", &cands).unwrap();
        assert_eq!(c.name, "Zali Steggall");
    }

    #[test]
    fn short_label_is_ambiguous() {
        let cands = names(&["Alice Smith", "Amy Jones"]);
        assert_eq!(
            resolve_candidate("A", &cands),
            Err(AggregationError::AmbiguousCandidate {
                label: "A".to_string(),
                matches: vec!["Alice Smith".to_string(), "Amy Jones".to_string()],
            })
        );
    }

    #[test]
    fn unknown_label_is_unresolved() {
        let cands = names(&["Alice Smith", "Amy Jones"]);
        assert_eq!(
            resolve_candidate("ZZZ", &cands),
            Err(AggregationError::UnresolvedCandidate {
                label: "ZZZ".to_string()
            })
        );
        assert!(matches!(
            resolve_candidate("  ", &cands),
            Err(AggregationError::UnresolvedCandidate { .. })
        ));
    }

    #[test]
    fn full_name_contained_in_another_is_ambiguous() {
        let cands = names(&["Amy Jones", "Amy Jones-Smith"]);
        assert_eq!(
            resolve_candidate("amy jones", &cands),
            Err(AggregationError::AmbiguousCandidate {
                label: "amy jones".to_string(),
                matches: vec!["Amy Jones".to_string(), "Amy Jones-Smith".to_string()],
            })
        );
        assert_eq!(
            resolve_candidate("Amy Jones-Smith", &cands).unwrap().name,
            "Amy Jones-Smith"
        );

        // A configured TCP label does not override containment.
        let cands = vec![
            Candidate::with_tcp_label("Bob Li", "LI"),
            Candidate::new("Alison Clive"),
        ];
        assert!(matches!(
            resolve_candidate("LI", &cands),
            Err(AggregationError::AmbiguousCandidate { .. })
        ));
    }

    #[test]
    fn coerces_malformed_counts() {
        assert_eq!(RawCount::Integer(-4).to_count(), 0);
        assert_eq!(RawCount::Float(12.9).to_count(), 12);
        assert_eq!(RawCount::Float(f64::NAN).to_count(), 0);
        assert_eq!(RawCount::Text(" 42 ".to_string()).to_count(), 42);
        assert_eq!(RawCount::Text("7.5".to_string()).to_count(), 7);
        assert_eq!(RawCount::Text("n/a".to_string()).to_count(), 0);
        assert_eq!(RawCount::Missing.to_count(), 0);
    }

    #[test]
    fn fills_and_merges_counts() {
        let cands = names(&["Zali Steggall", "Katherine Deves", "Jane Doe"]);
        let mut raw = RawBooth::new("1", "Manly");
        raw.primary = vec![
            ("zali steggall".to_string(), RawCount::Integer(10)),
            ("STEGGALL".to_string(), RawCount::Text("5".to_string())),
            ("Katherine Deves".to_string(), RawCount::Integer(-3)),
        ];
        raw.tcp = vec![(
            "DEVES".to_string(),
            vec![("Jane Doe".to_string(), RawCount::Integer(4))],
        )];
        let rec = normalize(&raw, &cands).unwrap();
        assert_eq!(
            rec.primary,
            vec![
                ("Zali Steggall".to_string(), 15),
                ("Katherine Deves".to_string(), 0),
                ("Jane Doe".to_string(), 0)
            ]
        );
        assert_eq!(rec.tcp.len(), 1);
        assert_eq!(rec.tcp[0].candidate, "Katherine Deves");
        assert_eq!(rec.tcp[0].received.len(), 3);
        assert_eq!(rec.tcp[0].received[2], ("Jane Doe".to_string(), 4));
        // No totals were submitted, so nothing is flagged.
        assert!(rec.issues.is_empty());
        assert_eq!(rec.totals, BoothTotals::default());
    }

    #[test]
    fn flags_inconsistent_totals() {
        let cands = names(&["A", "B"]);
        let mut raw = RawBooth::new("1", "Booth");
        raw.primary = vec![
            ("A".to_string(), RawCount::from(100)),
            ("B".to_string(), RawCount::from(50)),
        ];
        raw.formal = RawCount::from(140);
        raw.informal = RawCount::from(5);
        raw.total = RawCount::from(150);
        let rec = normalize(&raw, &cands).unwrap();
        assert_eq!(
            rec.issues,
            vec![
                ConsistencyIssue::PrimaryFormalMismatch {
                    primary_sum: 150,
                    formal: 140
                },
                ConsistencyIssue::FormalInformalTotalMismatch {
                    formal: 140,
                    informal: 5,
                    total: 150
                }
            ]
        );
        // The literal figures are kept.
        assert_eq!(rec.totals.formal, 140);
    }

    #[test]
    fn normalization_is_deterministic() {
        let cands = names(&["Zali Steggall", "Katherine Deves"]);
        let mut raw = RawBooth::new("7", "Dee Why");
        raw.tcp = vec![
            (
                "STEGGALL".to_string(),
                vec![("Katherine Deves".to_string(), RawCount::from(3))],
            ),
            (
                "DEVES".to_string(),
                vec![("Zali Steggall".to_string(), RawCount::from(2))],
            ),
        ];
        assert_eq!(normalize(&raw, &cands), normalize(&raw, &cands));
        let rec = normalize(&raw, &cands).unwrap();
        // Roster order, whatever the submission order.
        assert_eq!(rec.tcp[0].candidate, "Zali Steggall");
        assert_eq!(rec.tcp[1].candidate, "Katherine Deves");
    }

    #[test]
    fn oversized_counts_saturate() {
        let cands = names(&["A", "B"]);
        let mut raw = RawBooth::new("1", "Booth");
        raw.primary = vec![
            ("A".to_string(), RawCount::Text("1e30".to_string())),
            ("a".to_string(), RawCount::Integer(1)),
            ("B".to_string(), RawCount::Integer(i64::MAX)),
        ];
        raw.tcp = vec![
            ("A".to_string(), vec![("B".to_string(), RawCount::Float(1e30))]),
            ("A".to_string(), vec![("B".to_string(), RawCount::Integer(7))]),
        ];
        raw.formal = RawCount::Float(1e30);
        raw.informal = RawCount::Integer(5);
        raw.total = RawCount::Integer(5);
        let rec = normalize(&raw, &cands).unwrap();
        assert_eq!(rec.primary[0], ("A".to_string(), u64::MAX));
        assert_eq!(rec.primary[1], ("B".to_string(), i64::MAX as u64));
        assert_eq!(rec.tcp[0].received[1], ("B".to_string(), u64::MAX));
        assert_eq!(rec.totals.formal, u64::MAX);
        // Both sides of the primary check saturate, only the totals disagree.
        assert_eq!(
            rec.issues,
            vec![ConsistencyIssue::FormalInformalTotalMismatch {
                formal: u64::MAX,
                informal: 5,
                total: 5
            }]
        );
    }

    #[test]
    fn batch_policies() {
        let cands = names(&["Alice Smith", "Amy Jones"]);
        let good = RawBooth::new("1", "Good");
        let mut bad = RawBooth::new("2", "Bad");
        bad.primary = vec![("ZZZ".to_string(), RawCount::from(1))];
        let raws = vec![good, bad];

        assert!(normalize_all(&raws, &cands, UnresolvedPolicy::Fail).is_err());

        let batch = normalize_all(&raws, &cands, UnresolvedPolicy::SkipBooth).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].0, "2");
    }
}
