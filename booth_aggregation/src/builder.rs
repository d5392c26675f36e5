use log::info;

pub use crate::config::*;
use crate::{aggregate, normalize};

/// A builder that collects booth submissions as they come in.
///
/// A submission for a booth that is already known replaces it: this is how
/// corrections are applied.
///
/// ```
/// pub use booth_aggregation::builder::Builder;
/// pub use booth_aggregation::{Candidate, RawBooth, RawCount};
/// # use booth_aggregation::AggregationError;
///
/// let mut builder = Builder::new(&[Candidate::new("Anna Lee"), Candidate::new("Bob Ray")])?;
///
/// let mut booth = RawBooth::new("1", "Town Hall");
/// booth.primary = vec![("LEE".to_string(), RawCount::Integer(120))];
/// builder.add_booth(&booth)?;
///
/// let summary = builder.build()?;
/// assert_eq!(summary.primary[0].votes, 120);
///
/// # Ok::<(), AggregationError>(())
/// ```
pub struct Builder {
    pub(crate) _candidates: Vec<Candidate>,
    pub(crate) _options: AggregateOptions,
    pub(crate) _booths: Vec<BoothRecord>,
}

impl Builder {
    pub fn new(candidates: &[Candidate]) -> Result<Builder, AggregationError> {
        if candidates.is_empty() {
            return Err(AggregationError::EmptyCandidateList);
        }
        Ok(Builder {
            _candidates: candidates.to_vec(),
            _options: AggregateOptions::DEFAULT,
            _booths: Vec::new(),
        })
    }

    pub fn options(self, options: &AggregateOptions) -> Builder {
        Builder {
            _options: options.clone(),
            ..self
        }
    }

    /// Normalizes and adds a booth submission.
    ///
    /// On failure the builder is left unchanged, and the previous submission for
    /// that booth (if any) is kept.
    pub fn add_booth(&mut self, raw: &RawBooth) -> Result<(), AggregationError> {
        let record = normalize(raw, &self._candidates)?;
        self.add_record(record);
        Ok(())
    }

    pub fn add_record(&mut self, record: BoothRecord) {
        match self
            ._booths
            .iter_mut()
            .find(|b| b.booth_id == record.booth_id)
        {
            Some(existing) => {
                info!(
                    "Booth {} ({}) resubmitted, replacing the previous submission",
                    record.booth_id, record.booth_name
                );
                *existing = record;
            }
            None => self._booths.push(record),
        }
    }

    pub fn booths(&self) -> &[BoothRecord] {
        &self._booths
    }

    pub fn build(&self) -> Result<ElectorateSummary, AggregationError> {
        aggregate(&self._candidates, &self._booths, &self._options)
    }
}
