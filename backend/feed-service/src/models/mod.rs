use grpc_clients::HydratedPost;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;

/// Query string of `GET /feed`
#[derive(Debug, Clone, Deserialize)]
pub struct FeedQueryParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl FeedQueryParams {
    /// Validated `(limit, offset)`
    pub fn page(&self) -> Result<(usize, usize), String> {
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(format!("limit must be between 1 and {}", MAX_LIMIT));
        }
        if self.offset < 0 {
            return Err("offset must not be negative".to_string());
        }
        Ok((self.limit as usize, self.offset as usize))
    }
}

/// Body of `GET /feed`
///
/// An empty timeline answers `{"tweets": [], "count": 0}` without the
/// pagination echo.
#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub tweets: Vec<HydratedPost>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl FeedResponse {
    pub fn empty() -> Self {
        Self {
            tweets: Vec::new(),
            count: 0,
            limit: None,
            offset: None,
        }
    }

    pub fn page(tweets: Vec<HydratedPost>, limit: usize, offset: usize) -> Self {
        Self {
            count: tweets.len(),
            tweets,
            limit: Some(limit),
            offset: Some(offset),
        }
    }
}
