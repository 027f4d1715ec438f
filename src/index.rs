//! Index-file matching: each data file is published with a sidecar of
//! newline-delimited JSON records, one per stored message, carrying the
//! message attributes plus its byte extent.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::Value;

use crate::download::ByteRange;
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct IndexRecord {
    #[serde(rename = "_offset")]
    offset: u64,
    #[serde(rename = "_length")]
    length: u64,
    #[serde(flatten)]
    attrs: BTreeMap<String, Value>,
}

/// Rewrite one user value for index filtering; `ef` covers both member kinds.
pub(crate) fn user_to_index(key: &str, value: &str) -> Vec<String> {
    if key == "type" && value == "ef" {
        return vec!["cf".to_string(), "pf".to_string()];
    }
    vec![value.to_string()]
}

/// Select the byte ranges of the records matching every filter keyword.
///
/// `keys` fixes the keyword order; a record matches when each keyword's
/// attribute is one of the allowed values. All attribute values seen for the
/// filter keywords are accumulated into `observed`, matching or not, to feed
/// the no-match diagnostics.
///
/// With `preserve_request_order` the result follows the order values were
/// requested in (file offset breaking ties), otherwise file offset order.
pub(crate) fn select_parts(
    body: &str,
    for_index: &BTreeMap<String, Vec<String>>,
    keys: &[&str],
    preserve_request_order: bool,
    observed: &mut BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<ByteRange>> {
    let mut parts: Vec<(Vec<(usize, usize)>, ByteRange)> = Vec::new();

    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let record: IndexRecord = serde_json::from_str(line)?;

        let mut positions: Vec<(usize, usize)> = Vec::with_capacity(keys.len());
        let mut satisfied = 0usize;

        for (i, key) in keys.iter().enumerate() {
            let value = record.attrs.get(*key).and_then(Value::as_str);
            if let Some(value) = value {
                observed
                    .entry((*key).to_string())
                    .or_default()
                    .insert(value.to_string());
            }
            let Some(value) = value else { continue };
            let Some(allowed) = for_index.get(*key) else { continue };
            if let Some(j) = allowed.iter().position(|a| a == value) {
                positions.push((i, j));
                satisfied += 1;
            }
        }

        if satisfied == keys.len() {
            let range = ByteRange {
                offset: record.offset,
                length: record.length,
            };
            let sort_key = if preserve_request_order { positions } else { Vec::new() };
            parts.push((sort_key, range));
        }
    }

    if preserve_request_order {
        parts.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.offset.cmp(&b.1.offset)));
    } else {
        parts.sort_by_key(|(_, range)| range.offset);
    }

    Ok(parts.into_iter().map(|(_, range)| range).collect())
}
