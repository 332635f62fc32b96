// Client for the Open Humans direct-sharing project API.

use log::{debug, info, warn};
use reqwest::blocking::{multipart, Client};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value as JSValue;
use snafu::prelude::*;

use survey_data::ProjectMemberId;

use crate::upload::listing::{
    MemberFile, MemberFilesPage, MemberListing, MembersPage, ProjectMember,
};
use crate::upload::*;

const USER_AGENT: &str = concat!("survey-upload/", env!("CARGO_PKG_VERSION"));

/// Talks to the API with the master access token of a project.
pub struct OpenHumansClient {
    http_client: Client,
    base_url: String,
    master_access_token: String,
}

impl OpenHumansClient {
    pub fn new(base_url: &str, master_access_token: &str) -> UploadResult<Self> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context(HttpClientSnafu {})?;
        Ok(Self::with_client(http_client, base_url, master_access_token))
    }

    fn with_client(http_client: Client, base_url: &str, master_access_token: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            master_access_token: master_access_token.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/direct-sharing/project/{}", self.base_url, path)
    }

    fn token_query(&self) -> [(&str, &str); 1] {
        [("access_token", self.master_access_token.as_str())]
    }

    /// Fetches one page of a listing. Anything else than 200 is an error.
    fn get_page<T: DeserializeOwned>(&self, url: &str, page: usize) -> UploadResult<T> {
        let mut request = self.http_client.get(url);
        // The links to the next pages already carry the token.
        if !url.contains("access_token=") {
            request = request.query(&self.token_query());
        }
        let response = request.send().context(FetchingMembersSnafu { page })?;

        let status = response.status();
        if status != StatusCode::OK {
            let detail = response
                .json::<JSValue>()
                .ok()
                .and_then(|js| {
                    js.get("detail")
                        .and_then(|d| d.as_str())
                        .map(|d| format!(": {}", d))
                })
                .unwrap_or_default();
            return MembersStatusSnafu {
                status: status.as_u16(),
                detail,
            }
            .fail();
        }

        response.json::<T>().context(FetchingMembersSnafu { page })
    }

    /// The complete file list of a member, following all the pages.
    fn member_files(&self, exchange_url: &str) -> UploadResult<Vec<MemberFile>> {
        let mut url = exchange_url.to_string();
        let mut page = 1;
        let mut files: Vec<MemberFile> = Vec::new();
        loop {
            debug!("member_files: getting page {}", page);
            let data: MemberFilesPage = self.get_page(&url, page)?;
            files.extend(data.data);
            match data.next {
                Some(next) if !next.is_empty() => {
                    url = next;
                    page += 1;
                }
                _ => break,
            }
        }
        Ok(files)
    }
}

impl ProjectStore for OpenHumansClient {
    fn member_listing(&self) -> UploadResult<MemberListing> {
        info!("Retrieving the project member list from {}", self.base_url);
        let mut url = self.endpoint("members/");
        let mut page = 1;
        let mut members: Vec<ProjectMember> = Vec::new();
        loop {
            let data: MembersPage = self.get_page(&url, page)?;
            debug!(
                "member_listing: page {}: {} members (total: {:?})",
                page,
                data.results.len(),
                data.count
            );
            members.extend(data.results);
            match data.next {
                Some(next) if !next.is_empty() => {
                    url = next;
                    page += 1;
                }
                _ => break,
            }
        }

        // The member list only carries the first files of each member.
        for member in members.iter_mut().filter(|m| m.has_partial_files()) {
            match member.exchange_member.clone() {
                Some(exchange_url) => {
                    debug!(
                        "member_listing: fetching all the files of {}",
                        member.project_member_id
                    );
                    member.data = self.member_files(&exchange_url)?;
                }
                None => warn!(
                    "Only {} of {:?} files listed for {}",
                    member.data.len(),
                    member.file_count,
                    member.project_member_id
                ),
            }
        }
        Ok(MemberListing::new(members))
    }

    fn delete_file(&self, member: &ProjectMemberId, basename: &str) -> UploadResult<u16> {
        let response = self
            .http_client
            .post(self.endpoint("files/delete/"))
            .query(&self.token_query())
            .form(&[
                ("project_member_id", member.as_str()),
                ("file_basename", basename),
            ])
            .send()
            .context(DeletingFileSnafu {
                member: member.as_str(),
                basename,
            })?;
        Ok(response.status().as_u16())
    }

    fn upload_file(&self, member: &ProjectMemberId, upload: &FileUpload) -> UploadResult<u16> {
        let part = multipart::Part::text(upload.data.clone())
            .file_name(upload.filename.clone())
            .mime_str("application/json")
            .context(UploadingFileSnafu {
                member: member.as_str(),
                filename: upload.filename.as_str(),
            })?;
        let form = multipart::Form::new()
            .text("project_member_id", member.to_string())
            .text("metadata", upload.metadata.clone())
            .part("data_file", part);

        let response = self
            .http_client
            .post(self.endpoint("files/upload/"))
            .query(&self.token_query())
            .multipart(form)
            .send()
            .context(UploadingFileSnafu {
                member: member.as_str(),
                filename: upload.filename.as_str(),
            })?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    // A local server answering the given responses in order, one per connection.
    // It hands back the raw requests it received.
    struct Server {
        listener: TcpListener,
        base_url: String,
    }

    impl Server {
        fn bind() -> Server {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            Server { listener, base_url }
        }

        fn serve(self, responses: Vec<(u16, String)>) -> JoinHandle<Vec<String>> {
            thread::spawn(move || {
                let mut requests = Vec::new();
                for (status, body) in responses {
                    let (mut stream, _) = self.listener.accept().unwrap();
                    requests.push(read_request(&mut stream));
                    let reply = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    stream.write_all(reply.as_bytes()).unwrap();
                    stream.flush().unwrap();
                }
                requests
            })
        }
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let head = text[..end].to_lowercase();
                let content_length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok());
                let complete = match content_length {
                    Some(len) => buf.len() >= end + 4 + len,
                    None if head.contains("transfer-encoding: chunked") => {
                        text.ends_with("0\r\n\r\n")
                    }
                    None => true,
                };
                if complete {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn client(server: &Server) -> OpenHumansClient {
        let http_client = Client::builder().no_proxy().build().unwrap();
        OpenHumansClient::with_client(http_client, &server.base_url, "abc")
    }

    fn request_line(request: &str) -> &str {
        request.lines().next().unwrap()
    }

    fn id(s: &str) -> ProjectMemberId {
        ProjectMemberId::parse(s).unwrap()
    }

    #[test]
    fn endpoints() {
        let client = OpenHumansClient::new("https://staging.openhumans.org/", "abc").unwrap();
        assert_eq!(
            client.endpoint("files/upload/"),
            "https://staging.openhumans.org/api/direct-sharing/project/files/upload/"
        );
        assert_eq!(client.token_query(), [("access_token", "abc")]);
    }

    #[test]
    fn listing_follows_the_next_pages() {
        let server = Server::bind();
        let client = client(&server);
        let next = format!(
            "{}/api/direct-sharing/project/members/?access_token=abc&offset=1",
            server.base_url
        );
        let page1 = serde_json::json!({
            "count": 2,
            "next": next,
            "results": [{"project_member_id": "12345678", "data": [], "sources_shared": []}]
        });
        let page2 = serde_json::json!({
            "count": 2,
            "next": null,
            "results": [{"project_member_id": "87654321", "data": [], "sources_shared": []}]
        });
        let handle = server.serve(vec![(200, page1.to_string()), (200, page2.to_string())]);

        let listing = client.member_listing().unwrap();
        let requests = handle.join().unwrap();

        assert_eq!(listing.len(), 2);
        assert!(listing.get(&id("12345678")).is_some());
        assert!(listing.get(&id("87654321")).is_some());
        assert_eq!(
            request_line(&requests[0]),
            "GET /api/direct-sharing/project/members/?access_token=abc HTTP/1.1"
        );
        assert_eq!(
            request_line(&requests[1]),
            "GET /api/direct-sharing/project/members/?access_token=abc&offset=1 HTTP/1.1"
        );
    }

    #[test]
    fn listing_error_status() {
        let server = Server::bind();
        let client = client(&server);
        let handle = server.serve(vec![(401, r#"{"detail": "Invalid token."}"#.to_string())]);

        let err = client.member_listing().unwrap_err();
        handle.join().unwrap();

        assert!(matches!(
            &err,
            UploadError::MembersStatus { status: 401, detail } if detail == ": Invalid token."
        ));
        assert_eq!(err.to_string(), "API response status code 401: Invalid token.");
    }

    #[test]
    fn partial_file_lists_are_completed() {
        let server = Server::bind();
        let client = client(&server);
        let exchange = format!(
            "{}/api/direct-sharing/project/exchange-member/?access_token=abc",
            server.base_url
        );
        let members = serde_json::json!({
            "count": 1,
            "next": null,
            "results": [{
                "project_member_id": "12345678",
                "file_count": 2,
                "exchange_member": exchange,
                "sources_shared": [],
                "data": [{"basename": "other.txt", "source": "direct-sharing-42"}]
            }]
        });
        let files1 = serde_json::json!({
            "next": format!("{}&page=2", exchange),
            "data": [{"basename": "other.txt", "source": "direct-sharing-42"}]
        });
        let files2 = serde_json::json!({
            "next": null,
            "data": [{"basename": "survey-data.json", "source": "direct-sharing-42"}]
        });
        let handle = server.serve(vec![
            (200, members.to_string()),
            (200, files1.to_string()),
            (200, files2.to_string()),
        ]);

        let listing = client.member_listing().unwrap();
        let requests = handle.join().unwrap();

        let member = listing.get(&id("12345678")).unwrap();
        assert_eq!(member.data.len(), 2);
        assert!(member.owns_file("survey-data.json"));
        assert_eq!(requests.len(), 3);
        assert_eq!(
            request_line(&requests[1]),
            "GET /api/direct-sharing/project/exchange-member/?access_token=abc HTTP/1.1"
        );
        assert_eq!(
            request_line(&requests[2]),
            "GET /api/direct-sharing/project/exchange-member/?access_token=abc&page=2 HTTP/1.1"
        );
    }

    #[test]
    fn file_list_error_status() {
        let server = Server::bind();
        let client = client(&server);
        let members = serde_json::json!({
            "next": null,
            "results": [{
                "project_member_id": "12345678",
                "file_count": 3,
                "exchange_member": format!("{}/exchange/?access_token=abc", server.base_url),
                "data": []
            }]
        });
        let handle = server.serve(vec![(200, members.to_string()), (500, "{}".to_string())]);

        let err = client.member_listing().unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, UploadError::MembersStatus { status: 500, .. }));
    }

    #[test]
    fn delete_sends_the_member_and_basename() {
        let server = Server::bind();
        let client = client(&server);
        let handle = server.serve(vec![(200, "{}".to_string())]);

        let status = client.delete_file(&id("12345678"), "survey-data.json").unwrap();
        let requests = handle.join().unwrap();

        assert_eq!(status, 200);
        assert_eq!(
            request_line(&requests[0]),
            "POST /api/direct-sharing/project/files/delete/?access_token=abc HTTP/1.1"
        );
        assert!(requests[0].contains("project_member_id=12345678"));
        assert!(requests[0].contains("file_basename=survey-data.json"));
    }

    #[test]
    fn upload_sends_the_file_and_metadata() {
        let server = Server::bind();
        let client = client(&server);
        let handle = server.serve(vec![(201, "{}".to_string())]);

        let upload = FileUpload {
            filename: "survey-data.json".to_string(),
            data: r#"{"id":"12345678","response":"yes"}"#.to_string(),
            metadata: r#"{"tags":["json","survey"],"description":"Project survey data."}"#
                .to_string(),
        };
        let status = client.upload_file(&id("12345678"), &upload).unwrap();
        let requests = handle.join().unwrap();

        assert_eq!(status, 201);
        let request = &requests[0];
        assert_eq!(
            request_line(request),
            "POST /api/direct-sharing/project/files/upload/?access_token=abc HTTP/1.1"
        );
        assert!(request.contains(r#"name="data_file"; filename="survey-data.json""#));
        assert!(request.contains(r#"{"id":"12345678","response":"yes"}"#));
        assert!(request.contains(r#"name="project_member_id""#));
        assert!(request.contains("12345678"));
        assert!(request.contains(r#"name="metadata""#));
        assert!(request.contains(&upload.metadata));
    }

    #[test]
    fn failed_upload_returns_the_status() {
        let server = Server::bind();
        let client = client(&server);
        let handle = server.serve(vec![(500, "{}".to_string())]);

        let upload = FileUpload {
            filename: "survey-data.json".to_string(),
            data: "{}".to_string(),
            metadata: "{}".to_string(),
        };
        assert_eq!(client.upload_file(&id("12345678"), &upload).unwrap(), 500);
        handle.join().unwrap();
    }
}
