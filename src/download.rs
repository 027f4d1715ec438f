//! Whole-file and ranged downloads over the shared blocking session.

use std::fs::File;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::RANGE;

use crate::error::Result;

/// Byte extent of one stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    // inclusive, as HTTP ranges are
    pub(crate) fn last_byte(&self) -> u64 {
        self.offset + self.length - 1
    }
}

/// One resolvable file: fetched whole, or as a list of byte ranges when the
/// index narrowed it down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub url: String,
    pub parts: Option<Vec<ByteRange>>,
}

impl DataUrl {
    pub fn whole(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parts: None,
        }
    }

    pub fn with_parts(url: impl Into<String>, parts: Vec<ByteRange>) -> Self {
        Self {
            url: url.into(),
            parts: Some(parts),
        }
    }
}

/// Merge neighbouring contiguous ranges into single requests without
/// reordering the list. Zero-length ranges are dropped.
pub(crate) fn coalesce_ranges(ranges: Vec<ByteRange>) -> Vec<ByteRange> {
    let mut out: Vec<ByteRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        if range.length == 0 {
            continue;
        }
        if let Some(last) = out.last_mut() {
            if range.offset == last.offset + last.length {
                last.length += range.length;
                continue;
            }
        }
        out.push(range);
    }
    out
}

/// Download every entry into `target`, in order, returning total bytes.
pub(crate) fn download_all(http: &HttpClient, urls: &[DataUrl], target: &str) -> Result<u64> {
    let mut file = File::create(target)?;
    let mut total = 0u64;

    for data_url in urls {
        match &data_url.parts {
            None => {
                let mut resp = http.get(&data_url.url).send()?.error_for_status()?;
                total += resp.copy_to(&mut file)?;
            }
            Some(parts) => {
                for part in parts {
                    if part.length == 0 {
                        continue;
                    }
                    let range = format!("bytes={}-{}", part.offset, part.last_byte());
                    let mut resp = http
                        .get(&data_url.url)
                        .header(RANGE, range)
                        .send()?
                        .error_for_status()?;
                    total += resp.copy_to(&mut file)?;
                }
            }
        }
    }

    Ok(total)
}
