//! Remote entry descriptors and listing types

/// A node (file or directory) in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Entry {
    pub id: String,
    pub name: String,
    pub is_dir: bool,
    /// Some remote types (e.g. non-exportable documents) refuse direct copies.
    #[serde(default = "default_copyable")]
    pub copyable: bool,
}

fn default_copyable() -> bool {
    true
}

impl Entry {
    pub fn file(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_dir: false,
            copyable: true,
        }
    }

    pub fn directory(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_dir: true,
            copyable: true,
        }
    }

    /// Detached duplicate of this entry's metadata without a remote identity.
    pub fn to_template(&self, name: impl Into<String>) -> DirectoryTemplate {
        DirectoryTemplate {
            name: name.into(),
            source_id: self.id.clone(),
        }
    }
}

/// Directory that has not been materialized on the remote yet.
///
/// Only an upsert call turns this into an [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTemplate {
    pub name: String,
    /// Identifier of the directory this template was duplicated from.
    pub source_id: String,
}

/// Filter for a children listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildQuery {
    pub parent_id: String,
    pub include_trashed: bool,
}

impl ChildQuery {
    /// Direct, non-trashed children of `parent_id`.
    pub fn children_of(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            include_trashed: false,
        }
    }

    /// Search expression understood by the remote listing call.
    pub fn expression(&self) -> String {
        let escaped = self.parent_id.replace('\'', "\\'");
        if self.include_trashed {
            format!("'{escaped}' in parents")
        } else {
            format!("'{escaped}' in parents and trashed=false")
        }
    }
}

/// One page of a children listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub entries: Vec<Entry>,
    pub next_page_token: Option<String>,
}

impl Page {
    /// Continuation token, `None` once the listing is exhausted.
    pub fn next_token(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|token| !token.is_empty())
    }
}
