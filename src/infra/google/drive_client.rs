// =============================================================================
// DRIVE CLIENT
// =============================================================================
//
// Implements `DriveClient` on the Drive REST API (v3). Folder lookups are
// exact-name matches under one parent; uploads use a single multipart/related
// request carrying metadata and content together.

use super::google_auth::GoogleAuth;
use crate::core::organizer::{DriveClient, DriveError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const MULTIPART_BOUNDARY: &str = "attachment_organizer_boundary";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

pub struct GoogleDriveClient {
    client: Client,
    auth: Arc<GoogleAuth>,
}

impl GoogleDriveClient {
    pub fn new(auth: Arc<GoogleAuth>, timeout: Duration) -> Result<Self, DriveError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DriveError::Api(e.to_string()))?;
        Ok(Self { client, auth })
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, DriveError> {
        let token = self
            .auth
            .access_token()
            .await
            .map_err(|e| DriveError::Auth(e.to_string()))?;

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DriveError::Api(format!("{}: {}", what, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    DriveError::Auth(format!("{}: {} {}", what, status, body))
                }
                _ => DriveError::Api(format!("{}: {} {}", what, status, body)),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DriveError::Api(format!("{}: unexpected response: {}", what, e)))
    }
}

#[async_trait]
impl DriveClient for GoogleDriveClient {
    async fn find_child_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<String>, DriveError> {
        let request = self
            .client
            .get(format!("{}/files", DRIVE_API_BASE))
            .query(&[
                ("q", folder_query(parent_id, name)),
                ("fields", "files(id,name)".to_string()),
                ("pageSize", "10".to_string()),
            ]);

        let list: FileList = self.send_json(request, "folder lookup").await?;
        // The query already matches the name; the check guards against
        // Drive's case-insensitive name comparison.
        Ok(list
            .files
            .into_iter()
            .find(|f| f.name == name)
            .map(|f| f.id))
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String, DriveError> {
        let request = self
            .client
            .post(format!("{}/files", DRIVE_API_BASE))
            .query(&[("fields", "id,name")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent_id],
            }));

        let folder: DriveFile = self.send_json(request, "folder creation").await?;
        tracing::info!("Created Drive folder '{}' ({})", name, folder.id);
        Ok(folder.id)
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        folder_id: &str,
        filename: &str,
    ) -> Result<String, DriveError> {
        let content = tokio::fs::read(local_path).await?;
        let size = content.len();
        let body = multipart_related_body(filename, folder_id, &content);

        let request = self
            .client
            .post(format!("{}/files", DRIVE_UPLOAD_BASE))
            .query(&[("uploadType", "multipart"), ("fields", "id,name,webViewLink")])
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(body);

        let file: DriveFile = self.send_json(request, "upload").await?;
        tracing::debug!("Uploaded {} ({} bytes) as {}", filename, size, file.id);

        Ok(match file.web_view_link {
            Some(link) => format!("Uploaded {} ({} bytes): {}", filename, size, link),
            None => format!("Uploaded {} ({} bytes), id {}", filename, size, file.id),
        })
    }
}

/// Drive search expression for a non-trashed folder named `name` under `parent_id`.
fn folder_query(parent_id: &str, name: &str) -> String {
    format!(
        "'{}' in parents and name = '{}' and mimeType = '{}' and trashed = false",
        escape_query_value(parent_id),
        escape_query_value(name),
        FOLDER_MIME_TYPE
    )
}

fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn multipart_related_body(filename: &str, folder_id: &str, content: &[u8]) -> Vec<u8> {
    let metadata = json!({
        "name": filename,
        "parents": [folder_id],
    });

    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: application/octet-stream\r\n\r\n",
            b = MULTIPART_BOUNDARY,
            m = metadata
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}
