use serde::Deserialize;

use crate::error::FieldErrors;
use crate::store::Page;

/// `?skip=&limit=` on list endpoints.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}
fn default_limit() -> i64 {
    100
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}

impl Pagination {
    pub fn page(&self) -> Result<Page, FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.skip < 0 {
            errors.add("skip", "must not be negative");
        }
        if self.limit < 0 {
            errors.add("limit", "must not be negative");
        }
        errors.into_result()?;
        Ok(Page::new(self.skip, self.limit))
    }
}
