// The project member list returned by the Open Humans API.

use std::collections::HashMap;

use serde::Deserialize;
use survey_data::ProjectMemberId;

/// A file visible in a member's account.
#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
pub struct MemberFile {
    pub basename: String,
    /// The project or activity that produced the file.
    pub source: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
pub struct ProjectMember {
    pub project_member_id: String,
    #[serde(default)]
    pub username: Option<String>,
    /// All the files the project can see, including the ones from shared sources.
    #[serde(default)]
    pub data: Vec<MemberFile>,
    /// The other sources this member shares with the project.
    #[serde(default)]
    pub sources_shared: Vec<String>,
    /// How many files the member has in total. `data` may list fewer of them.
    #[serde(default)]
    pub file_count: Option<u64>,
    /// Link to the complete, paginated file list of the member.
    #[serde(default)]
    pub exchange_member: Option<String>,
}

impl ProjectMember {
    /// The files that the project stored itself, by basename.
    ///
    /// The files coming from shared sources are left out.
    pub fn own_files(&self) -> HashMap<&str, &MemberFile> {
        self.data
            .iter()
            .filter(|f| !self.sources_shared.contains(&f.source))
            .map(|f| (f.basename.as_str(), f))
            .collect()
    }

    pub fn owns_file(&self, basename: &str) -> bool {
        self.own_files().contains_key(basename)
    }

    /// True when the member list only carried part of the files of this member.
    pub fn has_partial_files(&self) -> bool {
        self.file_count.map_or(false, |count| (self.data.len() as u64) < count)
    }
}

/// One page of the member list.
#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
pub struct MembersPage {
    #[serde(default)]
    pub count: Option<u64>,
    pub next: Option<String>,
    pub results: Vec<ProjectMember>,
}

/// One page of the file list of a single member.
#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
pub struct MemberFilesPage {
    #[serde(default)]
    pub data: Vec<MemberFile>,
    pub next: Option<String>,
}

/// The members of the project, indexed by project member ID.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct MemberListing {
    members: HashMap<String, ProjectMember>,
}

impl MemberListing {
    pub fn new(members: Vec<ProjectMember>) -> MemberListing {
        MemberListing {
            members: members
                .into_iter()
                .map(|m| (m.project_member_id.clone(), m))
                .collect(),
        }
    }

    pub fn get(&self, id: &ProjectMemberId) -> Option<&ProjectMember> {
        self.members.get(id.as_str())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
