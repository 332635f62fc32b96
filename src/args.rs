use clap::Parser;

pub const UPLOAD_FILENAME: &str = "survey-data.json";
pub const DEFAULT_DESCRIPTION: &str = "Project survey data.";
pub const DEFAULT_TAGS: &str = "json survey";
pub const DEFAULT_BASE_URL: &str = "https://www.openhumans.org";

/// Upload survey data from a CSV file to the Open Humans accounts of project members.
///
/// The data is uploaded in JSON format, one file per member. If more than one row
/// contains responses for a given member, only the last one is uploaded. If a file
/// with the same name already exists in the member's account, it is removed and replaced.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Project master access token
    #[clap(long, value_parser)]
    pub mastertoken: String,

    /// (file path) Path to the survey data CSV file. The file needs a header row, and one of
    /// its columns must hold the 8-digit project member IDs.
    #[clap(long, value_parser)]
    pub surveydata: String,

    /// Name for the uploaded file.
    #[clap(long, value_parser, default_value = UPLOAD_FILENAME)]
    pub filename: String,

    /// File description.
    #[clap(long, value_parser, default_value = DEFAULT_DESCRIPTION)]
    pub description: String,

    /// String with space-separated tags for the file.
    #[clap(long, value_parser, default_value = DEFAULT_TAGS)]
    pub tags: String,

    /// (column name, optional) If specified, this column is used for the project member IDs
    /// without asking for a confirmation. Its value in the first row must still look like an ID.
    #[clap(long, value_parser)]
    pub id_column: Option<String>,

    /// Root URL of the Open Humans API.
    #[clap(long, value_parser, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// If passed as an argument, the files that would be deleted and uploaded are only logged.
    #[clap(long, takes_value = false)]
    pub dry_run: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
