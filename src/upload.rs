use log::{debug, info, warn};
use snafu::{prelude::*, Snafu};

use std::path::Path;

use serde::Serialize;
use survey_data::*;

use crate::args::Args;
use crate::upload::listing::MemberListing;
use crate::upload::open_humans::OpenHumansClient;
use crate::upload::prompt::PromptConfirm;

pub mod listing;
pub mod open_humans;
pub mod prompt;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum UploadError {
    #[snafu(display("Error loading survey data from {path}"))]
    LoadingSurvey { source: SurveyError, path: String },
    #[snafu(display("Could not set up the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("Error fetching page {page} of the project member list"))]
    FetchingMembers { source: reqwest::Error, page: usize },
    #[snafu(display("API response status code {status}{detail}"))]
    MembersStatus { status: u16, detail: String },
    #[snafu(display("Error deleting {basename} for {member}"))]
    DeletingFile {
        source: reqwest::Error,
        member: String,
        basename: String,
    },
    #[snafu(display("Error uploading {filename} for {member}"))]
    UploadingFile {
        source: reqwest::Error,
        member: String,
        filename: String,
    },
    #[snafu(display("Error serializing the data for {member}"))]
    SerializingJson {
        source: serde_json::Error,
        member: String,
    },
}

pub type UploadResult<T> = Result<T, UploadError>;

/// The description attached to every uploaded file.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct FileMetadata {
    pub tags: Vec<String>,
    pub description: String,
}

/// A file to store in a member's account.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    /// The content of the file.
    pub data: String,
    /// The JSON encoding of the `FileMetadata`.
    pub metadata: String,
}

/// Where the files of the project members live.
///
/// The delete and upload calls return the HTTP status code of the response.
/// Errors are reserved to failures of the transport, and they stop the run.
pub trait ProjectStore {
    fn member_listing(&self) -> UploadResult<MemberListing>;
    fn delete_file(&self, member: &ProjectMemberId, basename: &str) -> UploadResult<u16>;
    fn upload_file(&self, member: &ProjectMemberId, upload: &FileUpload) -> UploadResult<u16>;
}

/// Splits a tag string on whitespace.
pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split_whitespace().map(|s| s.to_string()).collect()
}

/// The settings shared by all the uploads of a run.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct UploadSettings {
    pub filename: String,
    pub description: String,
    pub tags: Vec<String>,
    pub dry_run: bool,
}

impl UploadSettings {
    pub fn from_args(args: &Args) -> UploadSettings {
        UploadSettings {
            filename: args.filename.clone(),
            description: args.description.clone(),
            tags: split_tags(&args.tags),
            dry_run: args.dry_run,
        }
    }

    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            tags: self.tags.clone(),
            description: self.description.clone(),
        }
    }
}

/// What happened during a run.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct UploadSummary {
    /// Files accepted by the server.
    pub uploaded: usize,
    /// Uploads answered with anything else than 201.
    pub failed: usize,
    /// IDs that are not members of the project.
    pub skipped: usize,
    /// Existing files deleted before the upload.
    pub replaced: usize,
}

/// Uploads the row of every member as a JSON file, replacing any earlier file with the same name.
///
/// The member list is fetched once. IDs that are not in it are skipped. An upload
/// that does not return 201 is logged and the run goes on with the next member.
///
/// The delete and the upload are two separate calls: if the upload fails after
/// the delete went through, the member is left without the file.
pub fn upload_survey_data<S: ProjectStore + ?Sized>(
    store: &S,
    dataset: &SurveyDataset,
    settings: &UploadSettings,
) -> UploadResult<UploadSummary> {
    let listing = store.member_listing()?;
    info!("Found {} project members", listing.len());
    if listing.is_empty() {
        warn!("The project has no members, nothing will be uploaded");
    }

    let metadata = serde_json::to_string(&settings.metadata()).context(SerializingJsonSnafu {
        member: "metadata",
    })?;
    let filename = settings.filename.as_str();
    let mut summary = UploadSummary::default();

    for (projmemid, row) in dataset {
        let member = match listing.get(projmemid) {
            Some(m) => m,
            None => {
                info!("Skipping '{}', invalid member ID.", projmemid);
                summary.skipped += 1;
                continue;
            }
        };

        debug!("upload_survey_data: {} is member {:?}", projmemid, member.username);
        if member.owns_file(filename) {
            info!("Deleting current {} for {}", filename, projmemid);
            if !settings.dry_run {
                let status = store.delete_file(projmemid, filename)?;
                if !(200..300).contains(&status) {
                    warn!(
                        "Deleting {} for {} returned status {}",
                        filename, projmemid, status
                    );
                }
            }
            summary.replaced += 1;
        }

        info!("Uploading {} for {}", filename, projmemid);
        let data = serde_json::to_string(row).context(SerializingJsonSnafu {
            member: projmemid.as_str(),
        })?;
        if settings.dry_run {
            debug!("upload_survey_data: dry run, not sending {}", data);
            continue;
        }

        let upload = FileUpload {
            filename: filename.to_string(),
            data,
            metadata: metadata.clone(),
        };
        let status = store.upload_file(projmemid, &upload)?;
        if status == 201 {
            info!("Upload of {} for {} complete.", filename, projmemid);
            summary.uploaded += 1;
        } else {
            debug!("upload_survey_data: {}: status {}", projmemid, status);
            warn!("Upload error of {} for {}!", filename, projmemid);
            summary.failed += 1;
        }
    }

    info!(
        "Done: {} uploaded, {} failed, {} skipped, {} replaced",
        summary.uploaded, summary.failed, summary.skipped, summary.replaced
    );
    Ok(summary)
}

/// Loads the survey data, then uploads it to the project members.
///
/// Nothing is sent to the API if the survey data cannot be loaded.
pub fn run_upload(args: &Args) -> UploadResult<UploadSummary> {
    let mut confirm: Box<dyn ColumnConfirm> = match &args.id_column {
        Some(name) => Box::new(AcceptColumn::new(name)),
        None => Box::new(PromptConfirm::stdio()),
    };
    let dataset = load_survey_data(Path::new(&args.surveydata), confirm.as_mut()).context(
        LoadingSurveySnafu {
            path: args.surveydata.as_str(),
        },
    )?;

    let client = OpenHumansClient::new(&args.base_url, &args.mastertoken)?;
    let settings = UploadSettings::from_args(args);
    if settings.dry_run {
        info!("Dry run: no file will be deleted or uploaded");
    }
    upload_survey_data(&client, &dataset, &settings)
}
