#![forbid(unsafe_code)]

//! Rust client for the ECMWF open data forecasts.
//!
//! You express a MARS-like request (keyword/value pairs), URLs are derived
//! from that request, and downloads either fetch whole files or use each
//! file's `.index` sidecar to fetch only the matching fields via HTTP range
//! requests.
//!
//! **Quick start**
//! ```no_run
//! use forecast_opendata::{Client, ClientOptions, Request};
//!
//! let opts = ClientOptions {
//!     source: "ecmwf".to_string(),
//!     model: "ifs".to_string(),
//!     resol: "0p25".to_string(),
//!     ..ClientOptions::default()
//! };
//! let client = Client::new(opts)?;
//!
//! // Builder style
//! let request = Request::new().r#type("fc").param("msl").step(240);
//! let result = client.retrieve(&request, "data.grib2")?;
//! println!("{} bytes", result.size_bytes);
//! # Ok::<(), forecast_opendata::Error>(())
//! ```
//!
//! **Pairs (kwargs-like) style**
//! ```no_run
//! use forecast_opendata::{Client, RequestValue};
//!
//! let client = Client::default_client()?;
//! let result = client.retrieve_pairs([
//!     ("type", RequestValue::from("fc")),
//!     ("param", RequestValue::from("msl")),
//!     ("step", 240.into()),
//!     ("target", "data.grib2".into()),
//! ])?;
//! println!("{:?}", result.datetime());
//! # Ok::<(), forecast_opendata::Error>(())
//! ```
//!
//! Requests without a `date` resolve against the most recent run for which
//! all files are published:
//! ```no_run
//! use forecast_opendata::{Client, Request};
//!
//! let client = Client::default_client()?;
//! let date = client.latest(&Request::new().step(24).param("2t"))?;
//! println!("latest cycle: {date}");
//! # Ok::<(), forecast_opendata::Error>(())
//! ```
//!
//! Notes:
//! - Downloads are governed by the ECMWF open data terms (e.g. attribution
//!   requirements).
//! - Base URLs can be remapped per source name through `~/.forecast-opendata`
//!   or the `FORECAST_OPENDATA_URLS` environment variable, both JSON objects.
//! - Request problems that do not prevent resolution (unknown keywords,
//!   values with no index entries) are reported as warnings through the
//!   `log` facade; plug in a [`DiagnosticSink`] to capture them instead.

mod client;
mod date;
mod diags;
mod download;
mod error;
mod index;
mod request;
mod schema;
mod sources;
mod url_builder;

pub use crate::client::{Client, ClientOptions, Retrieval};
pub use crate::diags::{DiagnosticSink, LogSink};
pub use crate::download::{ByteRange, DataUrl};
pub use crate::error::{Error, Result};
pub use crate::request::{Request, RequestValue};
