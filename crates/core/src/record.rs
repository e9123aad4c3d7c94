use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A single post as stored in the `post` table.
///
/// `id` is assigned by the upstream feed, not by the database, and is not
/// unique: every ingestion run inserts its rows again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i32,
    #[serde(rename = "user_id")]
    pub owner_id: i32,
    pub title: String,
    pub body: String,
}

/// One decoded response of the paginated feed.
///
/// Missing metadata decodes as zeroes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub meta: PageMeta,
    #[serde(default)]
    pub data: Vec<Record>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub total: u32,
    pub pages: u32,
    pub page: u32,
    pub limit: u32,
    pub links: PageLinks,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

impl Page {
    /// Build a page holding `data`, with pagination metadata for page `page`
    /// out of `pages`.
    pub fn new(page: u32, pages: u32, data: Vec<Record>) -> Self {
        let limit = data.len() as u32;
        Self {
            meta: PageMeta {
                pagination: Pagination {
                    total: limit * pages,
                    pages,
                    page,
                    limit,
                    links: PageLinks::default(),
                },
            },
            data,
        }
    }
}

/// Partial update of a record. `None` leaves the column untouched,
/// `Some("")` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none()
    }

    /// Reject a patch that would produce an UPDATE with no assignments.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.is_empty() {
            return Err(CoreError::EmptyUpdate);
        }
        Ok(())
    }

    /// Apply the supplied fields to `record` in place.
    pub fn apply(&self, record: &mut Record) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(body) = &self.body {
            record.body = body.clone();
        }
    }
}
