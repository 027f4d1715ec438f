//! URL patterns and the user-value rewrite rules for file naming.

use std::collections::BTreeMap;

use crate::date::end_step;
use crate::error::{Error, Result};
use crate::schema::MONTHLY_STREAMS;

/// Hourly products, keyed by forecast step. Underscore fields are synthesized
/// during enumeration, the rest come straight from the classified request.
pub(crate) const HOURLY_PATTERN: &str = "{_url}/{_yyyymmdd}/{_H}z/{model}/{resol}/{_stream}/{_yyyymmddHHMMSS}-{step}h-{_stream}-{type}.{_extension}";

/// Monthly means, keyed by lead time in months.
pub(crate) const MONTHLY_PATTERN: &str = "{_url}/{_yyyymmdd}/{_H}z/{model}/{resol}/{_stream}/{_yyyymmddHHMMSS}-{fcmonth}m-{_stream}-{type}.{_extension}";

pub(crate) fn pattern_for_stream(stream: &str) -> &'static str {
    if MONTHLY_STREAMS.contains(&stream) {
        MONTHLY_PATTERN
    } else {
        HOURLY_PATTERN
    }
}

pub(crate) fn extension_for_type(typ: &str) -> &'static str {
    if typ == "tf" { "bufr" } else { "grib2" }
}

/// Rewrite one user value for URL construction.
///
/// `url_types` is the already-rewritten `type` list: probability products
/// are published in two fixed step buckets, so when `ep` is the only type
/// the step collapses to 240 or 360.
pub(crate) fn user_to_url(
    key: &str,
    value: &str,
    model: &str,
    url_types: &[String],
) -> Result<String> {
    if key == "step" && url_types == ["ep"] {
        let bucket = if end_step(value)? <= 240 { "240" } else { "360" };
        return Ok(bucket.to_string());
    }

    let mapped = match (key, value) {
        // aifs-ens publishes ensemble members under their own names
        ("type", "cf") | ("type", "pf") if model == "aifs-ens" => value,
        ("type", "cf") | ("type", "pf") => "ef",
        ("type", "em") | ("type", "es") => "ep",
        ("type", "fcmean") => "fc",
        ("stream", "mmsa") => "mmsf",
        _ => value,
    };
    Ok(mapped.to_string())
}

// 06 and 18 runs are published under the short-cutoff streams.
fn patch_stream_by_time<'a>(stream: &'a str, hour_2d: &str) -> &'a str {
    match (stream, hour_2d) {
        ("oper", "06") | ("oper", "18") => "scda",
        ("wave", "06") | ("wave", "18") => "scwv",
        _ => stream,
    }
}

// Ensemble products live in the ensemble streams whatever the user asked.
fn patch_stream_by_type<'a>(stream: &'a str, typ: &str) -> &'a str {
    match (stream, typ) {
        ("oper", "ef") | ("oper", "ep") | ("scda", "ef") | ("scda", "ep") => "enfo",
        ("wave", "ef") | ("wave", "ep") | ("scwv", "ef") | ("scwv", "ep") => "waef",
        _ => stream,
    }
}

/// Stream actually used in the file name, patched by run hour first and
/// product type second. Disabled for `aifs-single`, which keeps one stream.
pub(crate) fn patch_stream(
    infer_stream_keyword: bool,
    model: &str,
    stream: &str,
    hour_2d: &str,
    typ: &str,
) -> String {
    if !infer_stream_keyword || model == "aifs-single" {
        return stream.to_string();
    }
    let stream = patch_stream_by_time(stream, hour_2d);
    patch_stream_by_type(stream, typ).to_string()
}

/// Substitute every `{name}` in `pattern`; leftover placeholders mean the
/// request resolved to an incomplete set of components.
pub(crate) fn format_pattern(pattern: &str, args: &BTreeMap<String, String>) -> Result<String> {
    let mut url = pattern.to_string();
    for (key, value) in args {
        url = url.replace(&format!("{{{key}}}"), value);
    }
    if url.contains('{') {
        return Err(Error::InvalidRequest(format!(
            "unresolved url fields in {url}"
        )));
    }
    Ok(url)
}
