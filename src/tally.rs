use log::{debug, info, warn};

use booth_aggregation::builder::Builder;
use booth_aggregation::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

pub mod config_reader;
pub mod io_common;
pub mod io_json;
pub mod io_xlsx;

use crate::tally::config_reader::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TallyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Empty or missing worksheet"))]
    EmptyExcel {},
    #[snafu(display("Worksheet {path}: the workbook has several worksheets, excelWorksheetName must be provided"))]
    ExcelAmbiguousWorksheet { path: String },
    #[snafu(display("Cannot find a column {column:?} in the header of the worksheet"))]
    ExcelMissingColumn { column: String },
    #[snafu(display("Cannot read the {column} cell at line {lineno}: {content}"))]
    ExcelWrongCellType {
        lineno: u64,
        column: String,
        content: String,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Unexpected JSON content: {content}"))]
    JsonWrongShape { content: String },
    #[snafu(display("Expected a non-negative integer"))]
    ParsingJsonNumber {},
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Unknown booth data provider {provider:?}"))]
    UnknownProvider { provider: String },
    #[snafu(display("Aggregation failed"))]
    Aggregation { source: AggregationError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type TallyResult<T> = Result<T, TallyError>;
pub type BTallyResult<T> = Result<T, Box<TallyError>>;

fn tallies_to_json(ts: &[CandidateTally]) -> Vec<JSValue> {
    ts.iter()
        .map(|t| json!({"candidate": t.name, "votes": t.votes, "percentage": t.percentage}))
        .collect()
}

fn swing_basis_name(basis: SwingBasis) -> &'static str {
    match basis {
        SwingBasis::Primary => "primary",
        SwingBasis::TwoCandidatePreferred => "tcp",
    }
}

fn net_position_to_json(np: &Option<NetPosition>) -> JSValue {
    match np {
        Some(np) => json!({
            "leader": np.leader,
            "leaderVotes": np.leader_votes,
            "runnerUp": np.runner_up,
            "runnerUpVotes": np.runner_up_votes,
            "margin": np.margin,
            "marginPercentage": np.margin_percentage,
        }),
        None => JSValue::Null,
    }
}

fn swings_to_json(sws: &[Swing]) -> Vec<JSValue> {
    sws.iter()
        .map(|sw| {
            json!({
                "candidate": sw.candidate,
                "basis": swing_basis_name(sw.basis),
                "current": sw.current,
                "baseline": sw.baseline,
                "swing": sw.swing,
            })
        })
        .collect()
}

fn booth_to_json(b: &BoothSummary) -> JSValue {
    json!({
        "boothId": b.booth_id,
        "boothName": b.booth_name,
        "timestamp": b.timestamp,
        "primaryVotes": tallies_to_json(&b.primary),
        "tcpVotes": tallies_to_json(&b.tcp),
        "netPosition": net_position_to_json(&b.net_position),
        "formalVotes": b.formal_votes,
        "informalVotes": b.informal_votes,
        "totalVotes": b.total_votes,
        "informalPercentage": b.informal_percentage,
        "swings": swings_to_json(&b.swings),
    })
}

fn summary_to_json(s: &ElectorateSummary, skipped: &[(String, AggregationError)]) -> JSValue {
    let parties: Vec<JSValue> = s
        .parties
        .iter()
        .map(|p| json!({"party": p.party, "votes": p.votes, "percentage": p.percentage}))
        .collect();
    let issues: Vec<JSValue> = s
        .issues
        .iter()
        .map(|bi| json!({"boothId": bi.booth_id, "issue": bi.issue.to_string()}))
        .collect();
    let skipped_booths: Vec<JSValue> = skipped
        .iter()
        .map(|(booth_id, e)| json!({"boothId": booth_id, "reason": e.to_string()}))
        .collect();

    json!({
        "boothsReporting": s.booths_reporting,
        "totalBooths": s.total_booths,
        "reportingPercentage": s.reporting_percentage,
        "primaryVotes": tallies_to_json(&s.primary),
        "tcpVotes": tallies_to_json(&s.tcp),
        "partyVotes": parties,
        "netPosition": net_position_to_json(&s.net_position),
        "formalVotes": s.formal_votes,
        "informalVotes": s.informal_votes,
        "totalVotes": s.total_votes,
        "informalPercentage": s.informal_percentage,
        "turnout": s.turnout,
        "swings": swings_to_json(&s.swings),
        "issues": issues,
        "skippedBooths": skipped_booths,
        "booths": s.booths.iter().map(booth_to_json).collect::<Vec<JSValue>>(),
    })
}

fn build_summary_js(
    config: &ElectorateConfig,
    summary: &ElectorateSummary,
    skipped: &[(String, AggregationError)],
) -> TallyResult<JSValue> {
    let c = OutputConfig {
        electorate: config.output_settings.electorate_name.clone(),
        date: config.output_settings.election_date.clone(),
        enrolled_voters: config.rules.enrolled_voters()?,
        total_booths: config.rules.total_booths()?,
    };
    Ok(json!({
        "config": c,
        "results": summary_to_json(summary, skipped),
        "fingerprint": summary.fingerprint(),
    }))
}

fn read_booth_data(root_path: &Path, cfs: &FileSource) -> BTallyResult<Vec<RawBooth>> {
    let p: PathBuf = root_path.join(&cfs.file_path);
    let p2 = p.as_path().display().to_string();
    info!("Attempting to read booth file {:?}", p2);
    match cfs.provider.as_str() {
        "json" => io_json::read_json_booths(p2),
        "xlsx" => io_xlsx::read_xlsx_booths(p2, cfs),
        x => Err(Box::new(TallyError::UnknownProvider {
            provider: x.to_string(),
        })),
    }
}

fn candidates_from_config(config: &ElectorateConfig) -> Vec<Candidate> {
    config
        .candidates
        .iter()
        .map(|c| Candidate {
            name: c.name.clone(),
            tcp_label: match c.tcp_label.clone() {
                Some(x) if x.trim().is_empty() => None,
                x => x,
            },
            party: c.party.clone(),
            ballot_position: c.ballot_position,
        })
        .collect()
}

fn validate_rules(rules: &TallyRules) -> TallyResult<AggregateOptions> {
    Ok(AggregateOptions {
        enrolled_voters: rules.enrolled_voters()?,
        baseline_shares: rules
            .baseline_shares
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect(),
        swing_basis: rules.swing_basis()?,
        tcp_display_order: rules.tcp_display_order()?,
        total_booths: rules.total_booths()?,
        booth_baseline_shares: rules
            .booth_baseline_shares
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|(booth_id, shares)| (booth_id, shares.into_iter().collect()))
            .collect(),
    })
}

// Both sides are compared without the fingerprint.
fn comparable_js(js: &JSValue) -> TallyResult<String> {
    let mut res = js.clone();
    if let Some(obj) = res.as_object_mut() {
        obj.remove("fingerprint");
    }
    serde_json::to_string_pretty(&res).context(ParsingJsonSnafu {})
}

/// Computes the summary of one electorate as described by the configuration file.
pub fn tally_electorate(config_path: &str) -> BTallyResult<JSValue> {
    let config = read_config(config_path)?;
    tally_config(config_path, &config)
}

fn tally_config(config_path: &str, config: &ElectorateConfig) -> BTallyResult<JSValue> {
    let config_p = Path::new(config_path);
    info!("config: {:?}", config);

    let options = validate_rules(&config.rules)?;
    let candidates = candidates_from_config(config);
    let mut builder = Builder::new(&candidates)
        .context(AggregationSnafu {})?
        .options(&options);

    if config.booth_file_sources.is_empty() {
        warn!("no booth file sources detected, no booth has reported");
    }

    let root_p = config_p.parent().context(MissingParentDirSnafu {})?;
    let mut data: Vec<RawBooth> = Vec::new();
    for cfs in config.booth_file_sources.iter() {
        let mut file_data = read_booth_data(root_p, cfs)?;
        data.append(&mut file_data);
    }
    debug!("data: {:?}", data);

    let policy = if config.rules.skip_unresolved_booths.unwrap_or(false) {
        UnresolvedPolicy::SkipBooth
    } else {
        UnresolvedPolicy::Fail
    };
    let batch = normalize_all(&data, &candidates, policy).context(AggregationSnafu {})?;
    // Later submissions of a booth, in the same file or in a later one, are corrections.
    for record in batch.records {
        builder.add_record(record);
    }
    let summary = builder.build().context(AggregationSnafu {})?;
    info!("summary: {:?}", summary);

    Ok(build_summary_js(config, &summary, &batch.skipped)?)
}

fn write_output(
    config_path: &str,
    settings: &OutputSettings,
    out: Option<&str>,
    pretty_js: &str,
) -> BTallyResult<()> {
    let target: Option<String> = match (out, settings.output_directory.clone()) {
        (Some("stdout"), _) => None,
        (Some(p), _) => Some(p.to_string()),
        (None, Some(dir)) => {
            let root_p = Path::new(config_path)
                .parent()
                .context(MissingParentDirSnafu {})?;
            let p: PathBuf = root_p.join(dir).join(format!(
                "{}_summary.json",
                settings.electorate_name
            ));
            Some(p.as_path().display().to_string())
        }
        (None, None) => None,
    };
    match target {
        Some(path) => {
            info!("Writing summary to {:?}", path);
            fs::write(&path, pretty_js).context(WritingOutputSnafu { path: path.clone() })?;
        }
        None => {
            println!("{}", pretty_js);
        }
    }
    Ok(())
}

pub fn run_electorate(
    config_path: &str,
    reference_path: Option<&str>,
    out: Option<&str>,
) -> BTallyResult<()> {
    let config = read_config(config_path)?;
    let result_js = tally_config(config_path, &config)?;
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    write_output(config_path, &config.output_settings, out, &pretty_js_stats)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = reference_path {
        check_reference(&result_js, summary_p)?;
    }
    Ok(())
}

fn check_reference(result_js: &JSValue, summary_p: &str) -> BTallyResult<()> {
    let summary_ref = read_summary(summary_p)?;
    debug!("reference summary: {:?}", summary_ref);
    let pretty_js_summary_ref = comparable_js(&summary_ref)?;
    let pretty_js_stats = comparable_js(result_js)?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference string");
        print_diff(
            pretty_js_summary_ref.as_str(),
            pretty_js_stats.as_ref(),
            "\n",
        );
        return Err(Box::new(TallyError::Whatever {
            message: "Difference detected between calculated summary and reference summary"
                .to_string(),
            source: None,
        }));
    }
    info!("The summary matches the reference {:?}", summary_p);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir() -> String {
        format!("{}/tests/data", env!("CARGO_MANIFEST_DIR"))
    }

    fn test_wrapper(test_name: &str) {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = test_dir();
        let config = format!("{}/{}/{}_config.json", dir, test_name, test_name);
        let reference = format!("{}/{}/{}_expected_summary.json", dir, test_name, test_name);
        let res = tally_electorate(&config).and_then(|js| check_reference(&js, &reference));
        if let Err(e) = &res {
            eprintln!("An error occured {}", e);
        }
        assert!(res.is_ok());
    }

    #[test]
    fn warringah() {
        test_wrapper("warringah");
    }

    #[test]
    fn warringah_twice_gives_the_same_summary() {
        let config = format!("{}/warringah/warringah_config.json", test_dir());
        let s1 = tally_electorate(&config).unwrap();
        let s2 = tally_electorate(&config).unwrap();
        assert_eq!(
            serde_json::to_string_pretty(&s1).unwrap(),
            serde_json::to_string_pretty(&s2).unwrap()
        );
    }

    #[test]
    fn strict_mode_fails_on_unresolved_booth() {
        let config = format!("{}/strict/strict_config.json", test_dir());
        let res = tally_electorate(&config);
        assert!(matches!(
            res.as_ref().map_err(|e| e.as_ref()),
            Err(TallyError::Aggregation {
                source: AggregationError::UnresolvedCandidate { .. }
            })
        ));
    }

    #[test]
    fn reference_mismatch_is_an_error() {
        let config = format!("{}/warringah/warringah_config.json", test_dir());
        let js = tally_electorate(&config).unwrap();
        let other = format!("{}/strict/strict_config.json", test_dir());
        assert!(check_reference(&js, &other).is_err());
    }

    #[test]
    fn resubmitted_booths_replace_earlier_ones() {
        let config = format!("{}/corrections/corrections_config.json", test_dir());
        let js = tally_electorate(&config).unwrap();
        let results = &js["results"];
        assert_eq!(results["boothsReporting"], json!(2));
        assert_eq!(results["reportingPercentage"], json!(100.0));
        assert_eq!(
            results["primaryVotes"],
            json!([
                {"candidate": "Anna Lee", "votes": 135, "percentage": 54.0},
                {"candidate": "Bob Ray", "votes": 115, "percentage": 46.0}
            ])
        );
        assert_eq!(results["totalVotes"], json!(262));
        assert_eq!(results["booths"][0]["boothId"], json!("1"));
        assert_eq!(results["booths"][0]["primaryVotes"][0]["votes"], json!(90));
        assert_eq!(results["booths"][1]["informalVotes"], json!(2));
        assert_eq!(results["partyVotes"][1]["party"], json!("Labor"));
    }

    #[test]
    fn empty_roster_is_a_configuration_error() {
        let config = format!("{}/no_candidates/no_candidates_config.json", test_dir());
        let res = tally_electorate(&config);
        assert!(matches!(
            res.as_ref().map_err(|e| e.as_ref()),
            Err(TallyError::Aggregation {
                source: AggregationError::EmptyCandidateList
            })
        ));
    }
}
