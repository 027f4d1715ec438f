use std::collections::BTreeMap;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown source {name:?}, known sources are {known:?}")]
    UnknownSource { name: String, known: Vec<String> },

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("invalid time: {0}")]
    InvalidTime(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("no candidate urls for request {0:?}")]
    NoCandidateUrls(BTreeMap<String, Vec<String>>),

    #[error("no index entries matching {0:?}")]
    NoMatchingData(BTreeMap<String, Vec<String>>),

    #[error("cannot establish latest date for {0:?}")]
    LatestDateUnresolved(BTreeMap<String, Vec<String>>),
}
