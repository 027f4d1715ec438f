//! Fixed keyword vocabulary driving request classification.
//!
//! A request keyword either selects which files to fetch (url components),
//! which messages to keep within a file (index components), or both.

/// Keywords that select files. `type` must come before `step`: the step
/// rewrite depends on the resolved type list.
pub(crate) const URL_COMPONENTS: [&str; 8] = [
    "date", "time", "model", "resol", "stream", "type", "step", "fcmonth",
];

/// Keywords matched against the per-file index records.
pub(crate) const INDEX_COMPONENTS: [&str; 7] = [
    "param", "type", "step", "fcmonth", "number", "levelist", "levtype",
];

/// Archive-style post-processing keywords, accepted but not honoured.
pub(crate) const POST_PROCESSING: [&str; 8] = [
    "area", "grid", "rotation", "frame", "bitmap", "gaussian", "accuracy", "format",
];

pub(crate) const KNOWN_TYPES: [&str; 8] = ["tf", "fc", "fcmean", "cf", "pf", "em", "ep", "es"];

pub(crate) const KNOWN_STREAMS: [&str; 7] =
    ["oper", "wave", "scda", "scwv", "enfo", "waef", "mmsa"];

pub(crate) const ENSEMBLE_STREAMS: [&str; 2] = ["enfo", "waef"];

/// Streams whose products are keyed by `fcmonth` rather than `step`.
pub(crate) const MONTHLY_STREAMS: [&str; 2] = ["mmsa", "mmsf"];

pub(crate) const CLASSES: [&str; 3] = ["od", "ai", "aifs-ens"];

/// How a request keyword participates in resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeywordKind {
    Url,
    Index,
    UrlAndIndex,
    PostProcessing,
    Internal,
    Unknown,
}

impl KeywordKind {
    pub(crate) fn contributes_url(self) -> bool {
        matches!(self, KeywordKind::Url | KeywordKind::UrlAndIndex)
    }

    pub(crate) fn contributes_index(self) -> bool {
        matches!(self, KeywordKind::Index | KeywordKind::UrlAndIndex)
    }
}

pub(crate) fn keyword_kind(key: &str) -> KeywordKind {
    if key.starts_with('_') {
        return KeywordKind::Internal;
    }
    let url = URL_COMPONENTS.contains(&key);
    let index = INDEX_COMPONENTS.contains(&key);
    match (url, index) {
        (true, true) => KeywordKind::UrlAndIndex,
        (true, false) => KeywordKind::Url,
        (false, true) => KeywordKind::Index,
        (false, false) if POST_PROCESSING.contains(&key) => KeywordKind::PostProcessing,
        (false, false) => KeywordKind::Unknown,
    }
}

/// Classification order: url components in table order first, then index
/// components, then everything else.
pub(crate) fn classification_rank(key: &str) -> usize {
    if let Some(i) = URL_COMPONENTS.iter().position(|k| *k == key) {
        return i;
    }
    if let Some(i) = INDEX_COMPONENTS.iter().position(|k| *k == key) {
        return URL_COMPONENTS.len() + i;
    }
    URL_COMPONENTS.len() + INDEX_COMPONENTS.len()
}

/// Closed vocabulary for a keyword, when there is one.
pub(crate) fn known_values(key: &str) -> Option<&'static [&'static str]> {
    match key {
        "type" => Some(&KNOWN_TYPES),
        "stream" => Some(&KNOWN_STREAMS),
        _ => None,
    }
}

/// Model selected by the `class` keyword.
pub(crate) fn class_model(class: &str) -> Option<&'static str> {
    match class {
        "od" => Some("ifs"),
        "ai" => Some("aifs-single"),
        "aifs-ens" => Some("aifs-ens"),
        _ => None,
    }
}
