use crate::tally::*;
use booth_aggregation::{SwingBasis, TcpDisplayOrder};
use snafu::prelude::*;

use std::collections::BTreeMap;
use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "electorateName")]
    pub electorate_name: String,
    #[serde(rename = "electionDate")]
    pub election_date: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub electorate: String,
    pub date: Option<String>,
    #[serde(rename = "enrolledVoters")]
    pub enrolled_voters: Option<u64>,
    #[serde(rename = "totalBooths")]
    pub total_booths: Option<u32>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "tcpWorksheetName")]
    pub tcp_worksheet_name: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ConfigCandidate {
    pub name: String,
    #[serde(rename = "tcpLabel")]
    pub tcp_label: Option<String>,
    pub party: Option<String>,
    #[serde(rename = "ballotPosition")]
    pub ballot_position: Option<u32>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TallyRules {
    #[serde(rename = "enrolledVoters")]
    _enrolled_voters: Option<JSValue>,
    #[serde(rename = "totalBooths")]
    _total_booths: Option<JSValue>,
    #[serde(rename = "baselineShares")]
    pub baseline_shares: Option<BTreeMap<String, f64>>,
    #[serde(rename = "swingBasis")]
    _swing_basis: Option<String>,
    #[serde(rename = "boothBaselineShares")]
    pub booth_baseline_shares: Option<BTreeMap<String, BTreeMap<String, f64>>>,
    #[serde(rename = "tcpDisplayOrder")]
    _tcp_display_order: Option<JSValue>,
    #[serde(rename = "skipUnresolvedBooths")]
    pub skip_unresolved_booths: Option<bool>,
}

impl TallyRules {
    pub fn enrolled_voters(&self) -> TallyResult<Option<u64>> {
        read_js_int(&self._enrolled_voters)
    }

    pub fn total_booths(&self) -> TallyResult<Option<u32>> {
        read_js_int(&self._total_booths)?
            .map(|n| u32::try_from(n).ok().context(ParsingJsonNumberSnafu {}))
            .transpose()
    }

    /// A list of names or labels, `"ballot"` or `"roster"`.
    pub fn tcp_display_order(&self) -> TallyResult<TcpDisplayOrder> {
        match &self._tcp_display_order {
            None | Some(JSValue::Null) => Ok(TcpDisplayOrder::CandidateOrder),
            Some(JSValue::String(s)) if s == "roster" => Ok(TcpDisplayOrder::CandidateOrder),
            Some(JSValue::String(s)) if s == "ballot" => Ok(TcpDisplayOrder::BallotPosition),
            Some(JSValue::Array(items)) => {
                let mut names: Vec<String> = Vec::new();
                for item in items.iter() {
                    match item.as_str() {
                        Some(name) => names.push(name.to_string()),
                        None => whatever!("tcpDisplayOrder: expected a name, found {}", item),
                    }
                }
                if names.is_empty() {
                    Ok(TcpDisplayOrder::CandidateOrder)
                } else {
                    Ok(TcpDisplayOrder::Explicit(names))
                }
            }
            Some(x) => whatever!("unknown TCP display order: {}", x),
        }
    }

    pub fn swing_basis(&self) -> TallyResult<SwingBasis> {
        match self._swing_basis.as_deref() {
            None | Some("tcp") => Ok(SwingBasis::TwoCandidatePreferred),
            Some("primary") => Ok(SwingBasis::Primary),
            Some(x) => whatever!("unknown swing basis: {}", x),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectorateConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "boothFileSources")]
    pub booth_file_sources: Vec<FileSource>,
    pub candidates: Vec<ConfigCandidate>,
    pub rules: TallyRules,
}

pub fn read_config(path: &str) -> BTallyResult<ElectorateConfig> {
    let config_str = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: ElectorateConfig =
        serde_json::from_str(&config_str).context(ParsingJsonSnafu {})?;
    Ok(config)
}

pub fn read_summary(path: &str) -> BTallyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

// Counts in the configuration may be written as numbers or as strings.
fn read_js_int(x: &Option<JSValue>) -> TallyResult<Option<u64>> {
    match x {
        None | Some(JSValue::Null) => Ok(None),
        Some(JSValue::Number(n)) => n.as_u64().map(Some).context(ParsingJsonNumberSnafu {}),
        Some(JSValue::String(s)) => s
            .trim()
            .parse::<u64>()
            .ok()
            .map(Some)
            .context(ParsingJsonNumberSnafu {}),
        _ => None.context(ParsingJsonNumberSnafu {}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rules() {
        let js = r#"{
            "enrolledVoters": "1200",
            "totalBooths": 12,
            "baselineShares": {"STEGGALL": 60.5},
            "swingBasis": "primary"
        }"#;
        let rules: TallyRules = serde_json::from_str(js).unwrap();
        assert_eq!(rules.enrolled_voters().unwrap(), Some(1200));
        assert_eq!(rules.total_booths().unwrap(), Some(12));
        assert_eq!(rules.swing_basis().unwrap(), SwingBasis::Primary);
        assert_eq!(
            rules.tcp_display_order().unwrap(),
            TcpDisplayOrder::CandidateOrder
        );

        let rules: TallyRules = serde_json::from_str(
            r#"{"tcpDisplayOrder": "ballot", "boothBaselineShares": {"12": {"DEVES": 41.5}}}"#,
        )
        .unwrap();
        assert_eq!(
            rules.tcp_display_order().unwrap(),
            TcpDisplayOrder::BallotPosition
        );
        assert_eq!(rules.booth_baseline_shares.unwrap()["12"]["DEVES"], 41.5);
    }

    #[test]
    fn rejects_bad_rules() {
        let rules: TallyRules =
            serde_json::from_str(r#"{"enrolledVoters": -3, "swingBasis": "2pp"}"#).unwrap();
        assert!(rules.enrolled_voters().is_err());
        assert!(rules.swing_basis().is_err());
        let rules: TallyRules =
            serde_json::from_str(r#"{"totalBooths": 5000000000, "tcpDisplayOrder": 3}"#).unwrap();
        assert!(matches!(
            rules.total_booths(),
            Err(TallyError::ParsingJsonNumber {})
        ));
        assert!(rules.tcp_display_order().is_err());
        let rules: TallyRules = serde_json::from_str("{}").unwrap();
        assert_eq!(rules.enrolled_voters().unwrap(), None);
        assert_eq!(rules.swing_basis().unwrap(), SwingBasis::TwoCandidatePreferred);
    }
}
