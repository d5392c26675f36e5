use clap::Parser;

/// This program computes the live results of an electorate from the counts of its polling booths.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The file describing the electorate: candidates, booth data files and rules.
    /// For more information about the file format, read the documentation of the `booth_aggregation` crate.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path) A reference file containing the summary of the electorate in JSON format. If provided,
    /// boothtally will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the electorate will be written in JSON format to the given
    /// location. Setting this option overrides the output directory that may be specified in the configuration.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// Logs every booth as it is read and normalized, regardless of RUST_LOG.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
