//! Shared fixtures: an in-process HTTP file server, synthetic GRIB2-framed
//! files with their `.index` sidecars, and a warning sink that records
//! messages.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use forecast_opendata::DiagnosticSink;

/// Minimal HTTP server over a fixed path-to-bytes table. Supports GET, HEAD
/// and single `Range: bytes=a-b` requests; unknown paths get a 404.
pub struct FileServer {
    pub base_url: String,
}

impl FileServer {
    pub fn start(routes: BTreeMap<String, Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let routes = Arc::new(routes);

        thread::spawn(move || {
            while let Ok((stream, _)) = listener.accept() {
                let routes = Arc::clone(&routes);
                thread::spawn(move || handle_connection(stream, &routes));
            }
        });

        Self {
            base_url: format!("http://{addr}"),
        }
    }
}

fn handle_connection(mut stream: TcpStream, routes: &BTreeMap<String, Vec<u8>>) {
    let Some((method, path, range)) = read_request(&mut stream) else {
        return;
    };
    let head_only = method == "HEAD";

    let Some(body) = routes.get(&path) else {
        let _ = write_response(&mut stream, 404, "Not Found", &[], head_only);
        return;
    };

    match range {
        Some((start, end)) => {
            let len = body.len() as u64;
            if len == 0 || start >= len {
                let _ = write_response(&mut stream, 416, "Range Not Satisfiable", &[], head_only);
            } else {
                let end = end.min(len - 1);
                let slice = &body[start as usize..=end as usize];
                let _ = write_response(&mut stream, 206, "Partial Content", slice, head_only);
            }
        }
        None => {
            let _ = write_response(&mut stream, 200, "OK", body, head_only);
        }
    }
    let _ = stream.shutdown(Shutdown::Both);
}

fn read_request(stream: &mut TcpStream) -> Option<(String, String, Option<(u64, u64)>)> {
    let mut buf = [0u8; 1024];
    let mut raw = Vec::new();
    loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        if raw.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if raw.len() > 64 * 1024 {
            break;
        }
    }

    let text = String::from_utf8_lossy(&raw);
    let mut lines = text.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let path = first.next()?.to_string();

    let mut range = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.eq_ignore_ascii_case("range") {
            let spec = value.trim().strip_prefix("bytes=")?;
            let (a, b) = spec.split_once('-')?;
            range = Some((a.parse().ok()?, b.parse().ok()?));
        }
    }

    Some((method, path, range))
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    reason: &str,
    body: &[u8],
    head_only: bool,
) -> std::io::Result<()> {
    write!(
        stream,
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )?;
    if !head_only {
        stream.write_all(body)?;
    }
    stream.flush()
}

/// One synthetic data file and its `.index` sidecar, grown message by
/// message.
#[derive(Default)]
pub struct FixtureFile {
    data: Vec<u8>,
    index: String,
}

impl FixtureFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message of `frame_len` bytes with the given index
    /// attributes.
    pub fn push(&mut self, frame_len: usize, attrs: &[(&str, &str)]) {
        let offset = self.data.len() as u64;
        let frame = grib_frame(frame_len);

        let mut record = serde_json::Map::new();
        record.insert("_offset".to_string(), offset.into());
        record.insert("_length".to_string(), (frame.len() as u64).into());
        for (key, value) in attrs {
            record.insert((*key).to_string(), (*value).into());
        }
        self.index
            .push_str(&serde_json::Value::Object(record).to_string());
        self.index.push('\n');

        self.data.extend_from_slice(&frame);
    }

    pub fn data(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn index(&self) -> Vec<u8> {
        self.index.clone().into_bytes()
    }
}

/// Minimal GRIB2 frame: indicator section carrying the total length, zero
/// filler, and the end marker.
pub fn grib_frame(total_len: usize) -> Vec<u8> {
    assert!(total_len >= 20, "frame too short for indicator and trailer");
    let mut frame = vec![0u8; total_len];
    frame[0..4].copy_from_slice(b"GRIB");
    frame[7] = 2;
    frame[8..16].copy_from_slice(&(total_len as u64).to_be_bytes());
    frame[total_len - 4..].copy_from_slice(b"7777");
    frame
}

/// Lengths of the GRIB2 frames in a byte stream, in order of appearance.
pub fn grib_lengths(data: &[u8]) -> Vec<usize> {
    let mut lengths = Vec::new();
    let mut pos = 0usize;
    while pos + 4 <= data.len() {
        if &data[pos..pos + 4] != b"GRIB" {
            pos += 1;
            continue;
        }
        assert!(pos + 16 <= data.len(), "truncated indicator section");
        assert_eq!(data[pos + 7], 2, "unexpected edition");
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&data[pos + 8..pos + 16]);
        let length = u64::from_be_bytes(len_bytes) as usize;
        assert_eq!(&data[pos + length - 4..pos + length], b"7777", "missing trailer");
        lengths.push(length);
        pos += length;
    }
    lengths
}

pub fn count_gribs(data: &[u8]) -> usize {
    grib_lengths(data).len()
}

/// Sink recording every distinct warning for assertions.
#[derive(Debug, Default)]
pub struct CaptureSink {
    messages: Mutex<Vec<String>>,
}

impl CaptureSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl DiagnosticSink for CaptureSink {
    fn warn(&self, message: &str) {
        let mut messages = self.messages.lock().unwrap();
        if !messages.iter().any(|m| m == message) {
            messages.push(message.to_string());
        }
    }

    fn seen(&self, message: &str) -> bool {
        self.messages.lock().unwrap().iter().any(|m| m == message)
    }
}
