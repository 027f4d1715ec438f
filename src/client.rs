use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use crate::date::{canonical_time, expand_date, expand_time, resolve_date};
use crate::diags::{warn_with_suggestions, DiagnosticSink, LogSink};
use crate::download::{coalesce_ranges, download_all, DataUrl};
use crate::error::{Error, Result};
use crate::index::{select_parts, user_to_index};
use crate::request::{expand_numeric, Request, RequestValue};
use crate::schema::{
    class_model, classification_rank, keyword_kind, known_values, KeywordKind, CLASSES,
    ENSEMBLE_STREAMS, INDEX_COMPONENTS, MONTHLY_STREAMS, POST_PROCESSING, URL_COMPONENTS,
};
use crate::sources::{is_http_url, known_sources, source_to_base_url};
use crate::url_builder::{
    extension_for_type, format_pattern, pattern_for_stream, patch_stream, user_to_url,
};

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Registered source name, or a full `http(s)` base URL.
    pub source: String,
    pub model: String,
    pub resol: String,
    /// Access experimental data published under an extra path segment.
    pub beta: bool,
    /// Order downloaded messages by request order instead of file offset.
    pub preserve_request_order: bool,
    /// Infer the actual stream from run hour and product type.
    pub infer_stream_keyword: bool,
    pub verify_tls: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            source: "ecmwf".to_string(),
            model: "ifs".to_string(),
            resol: "0p25".to_string(),
            beta: false,
            preserve_request_order: false,
            infer_stream_keyword: true,
            verify_tls: true,
        }
    }
}

/// Outcome of resolving (and possibly downloading) one request.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub urls: Vec<DataUrl>,
    pub target: String,
    /// Distinct forecast datetimes covered by the request, ascending.
    pub datetimes: Vec<DateTime<Utc>>,
    pub for_urls: BTreeMap<String, Vec<String>>,
    pub for_index: BTreeMap<String, Vec<String>>,
    pub size_bytes: u64,
}

impl Retrieval {
    /// Earliest forecast datetime covered by the request.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        self.datetimes.first().copied()
    }
}

#[derive(Clone)]
pub struct Client {
    opts: ClientOptions,
    base_url: String,
    http: HttpClient,
    sink: Arc<dyn DiagnosticSink>,
}

// the sink is a trait object, so Debug cannot be derived
impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("opts", &self.opts)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(opts: ClientOptions) -> Result<Self> {
        Self::with_sink(opts, Arc::new(LogSink::new()))
    }

    /// Same as [`Client::new`], with request diagnostics routed to `sink`.
    pub fn with_sink(opts: ClientOptions, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        let base_url = resolve_source(&opts.source, sink.as_ref())?;
        Url::parse(&base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("forecast-opendata/", env!("CARGO_PKG_VERSION"))),
        );

        let mut builder = HttpClient::builder().default_headers(headers);
        if !opts.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;

        Ok(Self {
            opts,
            base_url,
            http,
            sink,
        })
    }

    /// Convenience constructor with default options.
    pub fn default_client() -> Result<Self> {
        Self::new(ClientOptions::default())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve the request and download the matching messages into `target`.
    pub fn retrieve(&self, request: &Request, target: impl Into<String>) -> Result<Retrieval> {
        let target = target.into();
        let mut result = self.resolve(request, true, Some(&target), Utc::now())?;
        result.size_bytes = download_all(&self.http, &result.urls, &result.target)?;
        Ok(result)
    }

    /// Like [`Client::retrieve`], with the target taken from the request's
    /// `target` keyword, defaulting to `data.grib2`.
    pub fn retrieve_request(&self, request: &Request) -> Result<Retrieval> {
        let mut result = self.resolve(request, true, None, Utc::now())?;
        result.size_bytes = download_all(&self.http, &result.urls, &result.target)?;
        Ok(result)
    }

    /// Build a request from pairs and retrieve it.
    ///
    /// Example:
    /// `client.retrieve_pairs([("step", 240.into()), ("param", "msl".into())])?;`
    pub fn retrieve_pairs<K>(
        &self,
        pairs: impl IntoIterator<Item = (K, RequestValue)>,
    ) -> Result<Retrieval>
    where
        K: Into<String>,
    {
        self.retrieve_request(&Request::from_pairs(pairs))
    }

    /// Download the whole files, ignoring the index sidecars.
    pub fn download(&self, request: &Request, target: impl Into<String>) -> Result<Retrieval> {
        let target = target.into();
        let mut result = self.resolve(request, false, Some(&target), Utc::now())?;
        result.size_bytes = download_all(&self.http, &result.urls, &result.target)?;
        Ok(result)
    }

    /// Like [`Client::download`], with the target taken from the request's
    /// `target` keyword, defaulting to `data.grib2`.
    pub fn download_request(&self, request: &Request) -> Result<Retrieval> {
        let mut result = self.resolve(request, false, None, Utc::now())?;
        result.size_bytes = download_all(&self.http, &result.urls, &result.target)?;
        Ok(result)
    }

    /// Most recent run datetime for which every file of the request exists.
    pub fn latest(&self, request: &Request) -> Result<DateTime<Utc>> {
        self.latest_at(request, Utc::now())
    }

    /// [`Client::latest`] against an explicit current instant.
    ///
    /// With a `time` in the request only that run hour is probed, stepping
    /// back a day at a time; otherwise every six-hour cycle is probed,
    /// newest first. The search window is two days.
    pub fn latest_at(&self, request: &Request, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let time = request.get("time").and_then(|v| v.as_strings().into_iter().next());
        let delta = if time.is_some() {
            Duration::days(1)
        } else {
            Duration::hours(6)
        };
        let hour = match &time {
            Some(t) => canonical_time(t)?,
            None => 18,
        };

        let today = now.date_naive();
        let mut date = Utc
            .with_ymd_and_hms(today.year(), today.month(), today.day(), hour, 0, 0)
            .single()
            .ok_or_else(|| Error::InvalidDate(format!("{today} {hour:02}:00")))?;
        let stop = date - Duration::days(2);

        let mut last_for_urls = BTreeMap::new();
        while date > stop {
            let mut probe = request.clone();
            probe.set("date", RequestValue::from(date));
            let result = self.resolve(&probe, false, None, now)?;

            let mut available = !result.urls.is_empty();
            for data_url in &result.urls {
                if !self.head_ok(&data_url.url)? {
                    available = false;
                    break;
                }
            }
            if available {
                return Ok(date);
            }

            last_for_urls = result.for_urls;
            date -= delta;
        }

        Err(Error::LatestDateUnresolved(last_for_urls))
    }

    /// Classified view of a request: the url components and the index filter
    /// it resolves to.
    pub fn prepare_request(
        &self,
        request: &Request,
    ) -> Result<(BTreeMap<String, Vec<String>>, BTreeMap<String, Vec<String>>)> {
        self.classify(request, Utc::now())
    }

    /// Classify, enumerate candidate URLs and, with `use_index`, reduce each
    /// file to the byte ranges of its matching messages.
    fn resolve(
        &self,
        request: &Request,
        use_index: bool,
        target: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Retrieval> {
        let mut request = request.clone();
        if request.get("date").is_none() {
            let latest = self.latest_at(&request, now)?;
            request.set("date", RequestValue::from(latest));
        }

        let target = target
            .map(str::to_string)
            .or_else(|| {
                request
                    .get("target")
                    .and_then(|v| v.as_strings().into_iter().next())
            })
            .unwrap_or_else(|| "data.grib2".to_string());

        let (mut for_urls, for_index) = self.classify(&request, now)?;
        for_urls.insert("_url".to_string(), vec![self.base_url.clone()]);

        let (urls, datetimes) = self.enumerate_urls(&for_urls, now)?;
        if urls.is_empty() {
            return Err(Error::NoCandidateUrls(for_urls));
        }

        let urls = if use_index && !for_index.is_empty() {
            self.fetch_parts(&urls, &for_index)?
        } else {
            urls.into_iter().map(DataUrl::whole).collect()
        };

        Ok(Retrieval {
            urls,
            target,
            datetimes,
            for_urls,
            for_index,
            size_bytes: 0,
        })
    }

    /// Split a request into url components and index filter, applying
    /// defaults, value expansion and the user-value rewrites.
    fn classify(
        &self,
        request: &Request,
        now: DateTime<Utc>,
    ) -> Result<(BTreeMap<String, Vec<String>>, BTreeMap<String, Vec<String>>)> {
        let mut params = request.clone().into_inner();

        let mut model = first_string(params.get("model")).unwrap_or_else(|| self.opts.model.clone());
        if model != self.opts.model {
            self.sink.warn(&format!(
                "Model {model:?} differs from the client model {:?}",
                self.opts.model
            ));
        }

        if let Some(class) = first_string(params.get("class")) {
            match class_model(&class) {
                Some(mapped) => model = mapped.to_string(),
                None => warn_with_suggestions(
                    self.sink.as_ref(),
                    &format!("Unknown value {class:?} for keyword \"class\""),
                    &[class.as_str()],
                    &CLASSES,
                ),
            }
        }

        // aifs-ens publishes ensemble products only
        if model == "aifs-ens" {
            if let Some(stream) = first_string(params.get("stream")) {
                if stream != "enfo" {
                    self.sink.warn(&format!(
                        "Stream {stream:?} is not available for model \"aifs-ens\", using \"enfo\""
                    ));
                }
            }
            params.insert("stream".to_string(), RequestValue::Str("enfo".to_string()));
        }

        let ensemble = first_string(params.get("stream"))
            .map(|s| ENSEMBLE_STREAMS.contains(&s.as_str()))
            .unwrap_or(false);
        let default_type = if ensemble {
            RequestValue::StrList(vec!["cf".to_string(), "pf".to_string()])
        } else {
            RequestValue::Str("fc".to_string())
        };

        params
            .entry("model".to_string())
            .or_insert(RequestValue::Str(model.clone()));
        params
            .entry("resol".to_string())
            .or_insert(RequestValue::Str(self.opts.resol.clone()));
        params.entry("type".to_string()).or_insert(default_type);
        params
            .entry("stream".to_string())
            .or_insert(RequestValue::Str("oper".to_string()));
        params.entry("step".to_string()).or_insert(RequestValue::Int(0));
        params
            .entry("fcmonth".to_string())
            .or_insert(RequestValue::Int(1));

        params.remove("target");
        params.remove("class");

        // monthly streams are keyed by fcmonth, everything else by step
        let stream = first_string(params.get("stream")).unwrap_or_default();
        if MONTHLY_STREAMS.contains(&stream.as_str()) {
            params.remove("step");
        } else {
            params.remove("fcmonth");
        }

        let post: Vec<&str> = POST_PROCESSING
            .iter()
            .copied()
            .filter(|k| params.contains_key(*k))
            .collect();
        if !post.is_empty() {
            self.sink
                .warn(&format!("Post-processing keywords {post:?} are not supported"));
        }

        let mut for_urls: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut for_index: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut ignored: BTreeSet<String> = BTreeSet::new();

        // `type` must be classified before `step`, see URL_COMPONENTS
        let mut items: Vec<(&String, &RequestValue)> = params.iter().collect();
        items.sort_by_key(|(key, _)| classification_rank(key.as_str()));

        for (key, value) in items {
            let mut values = value.as_strings();
            if values.len() == 1 && values[0].contains('/') {
                values = values[0].split('/').map(str::to_string).collect();
            }

            let expanded = match key.as_str() {
                "date" => expand_date(&values, now)?,
                "time" => expand_time(&values)?,
                _ => expand_numeric(&values)?,
            };

            let canonical = if key == "time" {
                let mut out = Vec::with_capacity(expanded.len());
                for value in &expanded {
                    out.push(canonical_time(value)?.to_string());
                }
                out
            } else {
                expanded
            };

            let kind = keyword_kind(key);
            if kind == KeywordKind::Internal || kind == KeywordKind::PostProcessing {
                continue;
            }

            if let Some(vocabulary) = known_values(key) {
                for value in &canonical {
                    if !vocabulary.contains(&value.as_str()) {
                        warn_with_suggestions(
                            self.sink.as_ref(),
                            &format!("Unknown value {value:?} for keyword {key:?}"),
                            &[value.as_str()],
                            vocabulary,
                        );
                    }
                }
            }

            if kind.contributes_index() {
                for value in &canonical {
                    for mapped in user_to_index(key, value) {
                        let entry = for_index.entry(key.clone()).or_default();
                        if !entry.contains(&mapped) {
                            entry.push(mapped);
                        }
                    }
                }
            }

            if kind.contributes_url() {
                let url_types: Vec<String> = for_urls.get("type").cloned().unwrap_or_default();
                let entry = for_urls.entry(key.clone()).or_default();
                for value in &canonical {
                    let mapped = user_to_url(key, value, &model, &url_types)?;
                    if !entry.contains(&mapped) {
                        entry.push(mapped);
                    }
                }
            }

            if kind == KeywordKind::Unknown {
                ignored.insert(key.clone());
            }
        }

        if !ignored.is_empty() {
            let mut vocabulary: Vec<&str> = Vec::new();
            vocabulary.extend(URL_COMPONENTS);
            vocabulary.extend(INDEX_COMPONENTS);
            let words: Vec<&str> = ignored.iter().map(String::as_str).collect();
            warn_with_suggestions(
                self.sink.as_ref(),
                &format!("Ignoring request keywords {ignored:?}"),
                &words,
                &vocabulary,
            );
        }

        // text forecasts are plain files with no index sidecar
        let text_forecast = for_urls
            .get("type")
            .map(|types| types.iter().any(|t| t == "tf"))
            .unwrap_or(false);
        if text_forecast {
            for_index.clear();
        }

        Ok((for_urls, for_index))
    }

    /// Walk the cartesian product of the url component values, newest
    /// component varying fastest, and collect the distinct URLs.
    fn enumerate_urls(
        &self,
        for_urls: &BTreeMap<String, Vec<String>>,
        now: DateTime<Utc>,
    ) -> Result<(Vec<String>, Vec<DateTime<Utc>>)> {
        let mut ordered: Vec<(&str, &[String])> = Vec::new();
        for key in URL_COMPONENTS {
            if let Some(values) = for_urls.get(key) {
                ordered.push((key, values.as_slice()));
            }
        }
        if let Some(values) = for_urls.get("_url") {
            ordered.push(("_url", values.as_slice()));
        }

        let mut urls = Vec::new();
        let mut seen = BTreeSet::new();
        let mut datetimes = BTreeSet::new();

        if ordered.is_empty() || ordered.iter().any(|(_, values)| values.is_empty()) {
            return Ok((urls, Vec::new()));
        }

        let mut cursor = vec![0usize; ordered.len()];
        'combinations: loop {
            let mut args: BTreeMap<String, String> = BTreeMap::new();
            for ((key, values), &i) in ordered.iter().zip(&cursor) {
                args.insert((*key).to_string(), values[i].clone());
            }

            let date = args
                .remove("date")
                .ok_or_else(|| Error::InvalidDate("missing date".to_string()))?;
            let time = args.remove("time");
            let datetime = resolve_date(&date, time.as_deref(), now)?;
            datetimes.insert(datetime);

            let stream = args.get("stream").cloned().unwrap_or_default();
            let typ = args.get("type").cloned().unwrap_or_default();
            let hour = datetime.format("%H").to_string();

            args.insert("_yyyymmdd".to_string(), datetime.format("%Y%m%d").to_string());
            args.insert("_H".to_string(), hour.clone());
            args.insert(
                "_yyyymmddHHMMSS".to_string(),
                datetime.format("%Y%m%d%H%M%S").to_string(),
            );
            args.insert(
                "_extension".to_string(),
                extension_for_type(&typ).to_string(),
            );
            args.insert(
                "_stream".to_string(),
                patch_stream(
                    self.opts.infer_stream_keyword,
                    args.get("model").map(String::as_str).unwrap_or(""),
                    &stream,
                    &hour,
                    &typ,
                ),
            );

            if self.opts.beta {
                if let Some(resol) = args.get_mut("resol") {
                    resol.push_str("/experimental");
                }
            }

            let mut url = format_pattern(pattern_for_stream(&stream), &args)?;
            if self.opts.resol == "0p4-beta" {
                url = url.replace("/ifs/", "/");
            }
            if seen.insert(url.clone()) {
                urls.push(url);
            }

            // odometer increment, rightmost component first
            let mut position = ordered.len();
            loop {
                if position == 0 {
                    break 'combinations;
                }
                position -= 1;
                cursor[position] += 1;
                if cursor[position] < ordered[position].1.len() {
                    break;
                }
                cursor[position] = 0;
            }
        }

        Ok((urls, datetimes.into_iter().collect()))
    }

    /// Read each file's `.index` sidecar and keep the files with at least
    /// one matching message, as coalesced byte ranges.
    fn fetch_parts(
        &self,
        urls: &[String],
        for_index: &BTreeMap<String, Vec<String>>,
    ) -> Result<Vec<DataUrl>> {
        // composite-key order follows classification order, so an explicit
        // type/step ordering outranks parameter order
        let mut keys: Vec<&str> = INDEX_COMPONENTS
            .iter()
            .copied()
            .filter(|k| for_index.contains_key(*k))
            .collect();
        keys.sort_by_key(|k| classification_rank(k));

        let mut observed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut out = Vec::new();

        for url in urls {
            let index_url = index_url_for(url);
            let body = self
                .http
                .get(&index_url)
                .send()?
                .error_for_status()?
                .text()?;
            let parts = select_parts(
                &body,
                for_index,
                &keys,
                self.opts.preserve_request_order,
                &mut observed,
            )?;
            if !parts.is_empty() {
                out.push(DataUrl::with_parts(url.clone(), coalesce_ranges(parts)));
            }
        }

        let empty = BTreeSet::new();
        for key in &keys {
            let Some(requested) = for_index.get(*key) else { continue };
            let seen_values = observed.get(*key).unwrap_or(&empty);
            for value in requested {
                if !seen_values.contains(value) {
                    let vocabulary: Vec<&str> = seen_values.iter().map(String::as_str).collect();
                    warn_with_suggestions(
                        self.sink.as_ref(),
                        &format!("No index entries for {key}={value}"),
                        &[value.as_str()],
                        &vocabulary,
                    );
                }
            }
        }

        if out.is_empty() {
            return Err(Error::NoMatchingData(for_index.clone()));
        }

        Ok(out)
    }

    fn head_ok(&self, url: &str) -> Result<bool> {
        let resp = self.http.head(url).send()?;
        Ok(resp.status().is_success())
    }
}

fn resolve_source(source: &str, sink: &dyn DiagnosticSink) -> Result<String> {
    if is_http_url(source) {
        return Ok(source.to_string());
    }
    if let Some(url) = source_to_base_url(source) {
        return Ok(url.to_string());
    }
    let known: Vec<String> = known_sources().iter().map(|s| s.to_string()).collect();
    warn_with_suggestions(
        sink,
        &format!("Unknown source {source:?}. Known sources are {known:?}"),
        &[source],
        &known,
    );
    Err(Error::UnknownSource {
        name: source.to_string(),
        known,
    })
}

/// Sidecar URL of a data URL: the extension of the last path segment is
/// replaced with `.index`.
fn index_url_for(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((dir, file)) => {
            let stem = file.rsplit_once('.').map(|(s, _)| s).unwrap_or(file);
            format!("{dir}/{stem}.index")
        }
        None => format!("{url}.index"),
    }
}

fn first_string(value: Option<&RequestValue>) -> Option<String> {
    value.and_then(|v| v.as_strings().into_iter().next())
}
