//! Named base-URL registry.
//!
//! Built-in entries carry the same values as the upstream data mirrors. They
//! can be overridden by a JSON object in `~/.forecast-opendata` and by the
//! `FORECAST_OPENDATA_URLS` environment variable, read once per process.

use std::collections::BTreeMap;
use std::env;
use std::fs;

use once_cell::sync::Lazy;

pub(crate) const SOURCES_ENV: &str = "FORECAST_OPENDATA_URLS";

const DOT_FILE: &str = ".forecast-opendata";

static SOURCES: Lazy<BTreeMap<String, String>> = Lazy::new(|| {
    let dot = dirs::home_dir()
        .map(|home| home.join(DOT_FILE))
        .and_then(|path| fs::read_to_string(path).ok());
    merged_sources(dot.as_deref(), env::var(SOURCES_ENV).ok().as_deref())
});

fn builtin_sources() -> BTreeMap<String, String> {
    [
        ("ecmwf", "https://data.ecmwf.int/forecasts"),
        ("azure", "https://ai4edataeuwest.blob.core.windows.net/ecmwf"),
        ("aws", "https://ecmwf-forecasts.s3.eu-central-1.amazonaws.com"),
        ("google", "https://storage.googleapis.com/ecmwf-open-data"),
        ("ecmwf-esuites", "https://xdiss.ecmwf.int/ecpds/home/opendata"),
    ]
    .into_iter()
    .map(|(name, url)| (name.to_string(), url.to_string()))
    .collect()
}

fn merged_sources(dot_file: Option<&str>, env_json: Option<&str>) -> BTreeMap<String, String> {
    let mut urls = builtin_sources();
    for (text, origin) in [(dot_file, DOT_FILE), (env_json, SOURCES_ENV)] {
        let Some(text) = text else { continue };
        match serde_json::from_str::<BTreeMap<String, String>>(text) {
            Ok(overrides) => urls.extend(overrides),
            Err(err) => log::warn!("ignoring malformed source overrides from {origin}: {err}"),
        }
    }
    urls
}

/// Base URL registered under `source`, if any.
///
/// If `source` is already an `http(s)` URL, callers use it as-is instead.
pub(crate) fn source_to_base_url(source: &str) -> Option<&'static str> {
    SOURCES.get(source).map(String::as_str)
}

pub(crate) fn known_sources() -> Vec<&'static str> {
    SOURCES.keys().map(String::as_str).collect()
}

pub(crate) fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}
