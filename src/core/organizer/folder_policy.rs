use super::collaborators::{DriveClient, DriveError};
use super::organizer_models::Classification;
use std::collections::HashMap;

/// Inputs to the destination decision that come from configuration.
#[derive(Debug, Clone)]
pub struct FolderPolicy {
    pub smart_folders_enabled: bool,
    /// Minimum confidence before a suggested folder is applied.
    pub confidence_threshold: f64,
    /// Used when no other rule picks a folder.
    pub fallback_folder: String,
}

impl FolderPolicy {
    /// Computes the logical destination path for one classified attachment.
    ///
    /// | target | smart + confident + suggestion | result                        |
    /// |--------|--------------------------------|-------------------------------|
    /// | set    | yes                            | target / basename(suggestion) |
    /// | set    | no                             | target                        |
    /// | unset  | yes                            | suggestion                    |
    /// | unset  | no                             | fallback                      |
    pub fn resolve_folder(
        &self,
        classification: &Classification,
        user_target_folder: Option<&str>,
    ) -> String {
        let target = user_target_folder
            .map(normalize_path)
            .filter(|t| !t.is_empty());

        let suggestion = classification
            .suggested_folder
            .as_deref()
            .map(normalize_path)
            .filter(|s| !s.is_empty())
            .filter(|_| {
                self.smart_folders_enabled
                    && classification.confidence >= self.confidence_threshold
            });

        match (target, suggestion) {
            (Some(target), Some(suggestion)) => match basename(&suggestion) {
                Some(leaf) => format!("{}/{}", target, leaf),
                None => target,
            },
            (Some(target), None) => target,
            (None, Some(suggestion)) => suggestion,
            (None, None) => normalize_path(&self.fallback_folder),
        }
    }
}

/// Splits a logical path into non-empty, trimmed segments.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn normalize_path(path: &str) -> String {
    path_segments(path).join("/")
}

fn basename(path: &str) -> Option<&str> {
    path_segments(path).last().copied()
}

/// Walks logical paths segment by segment, reusing existing folders and
/// creating missing ones.
///
/// Lookups are memoized for the lifetime of the resolver only; a new
/// resolver is built per organizer run.
pub struct FolderResolver<'a, D: DriveClient + ?Sized> {
    drive: &'a D,
    resolved: HashMap<String, String>,
    created: usize,
}

impl<'a, D: DriveClient + ?Sized> FolderResolver<'a, D> {
    pub fn new(drive: &'a D) -> Self {
        Self {
            drive,
            resolved: HashMap::new(),
            created: 0,
        }
    }

    /// Number of folders this resolver has created.
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Returns the folder id for `path`, creating any missing segments.
    pub async fn resolve_or_create(&mut self, path: &str) -> Result<String, DriveError> {
        let segments = path_segments(path);
        let mut parent_id = self.drive.root_folder_id().to_string();
        let mut walked = String::new();

        for segment in segments {
            if !walked.is_empty() {
                walked.push('/');
            }
            walked.push_str(segment);

            if let Some(id) = self.resolved.get(&walked) {
                parent_id = id.clone();
                continue;
            }

            let id = match self.drive.find_child_folder(&parent_id, segment).await? {
                Some(existing) => existing,
                None => {
                    let id = self.drive.create_folder(&parent_id, segment).await?;
                    self.created += 1;
                    tracing::info!("Created folder '{}' ({})", walked, id);
                    id
                }
            };

            self.resolved.insert(walked.clone(), id.clone());
            parent_id = id;
        }

        Ok(parent_id)
    }
}
