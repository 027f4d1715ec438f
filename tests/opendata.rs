//! End-to-end retrieval against a local file server: URL resolution, index
//! matching, ranged downloads and the warnings they raise.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use forecast_opendata::{ByteRange, Client, ClientOptions, Error, Request};

use common::{count_gribs, grib_lengths, CaptureSink, FileServer, FixtureFile};

const ENFO_DATA: &str = "/20220121/00z/ifs/0p25/enfo/20220121000000-12h-enfo-ef.grib2";
const ENFO_INDEX: &str = "/20220121/00z/ifs/0p25/enfo/20220121000000-12h-enfo-ef.index";
const EP_DATA: &str = "/20220121/00z/ifs/0p25/enfo/20220121000000-240h-enfo-ep.grib2";
const EP_INDEX: &str = "/20220121/00z/ifs/0p25/enfo/20220121000000-240h-enfo-ep.index";
const TF_DATA: &str = "/20220121/00z/ifs/0p25/enfo/20220121000000-240h-enfo-tf.bufr";

const TF_PAYLOAD: &[u8] = b"BUFR-TEXT-FORECAST-PAYLOAD-1234";

const EP_PARAMS: [&str; 9] = ["10fgg25", "2t", "mn2t3", "msl", "mx2t3", "tp", "tpg1", "tpg10", "ws"];

fn attrs<'a>(param: &'a str, typ: &'a str, step: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("domain", "g"),
        ("date", "20220121"),
        ("time", "0000"),
        ("expver", "0001"),
        ("class", "od"),
        ("stream", "enfo"),
        ("levtype", "sfc"),
        ("param", param),
        ("type", typ),
        ("step", step),
    ]
}

/// One ensemble file with a control run, 50 perturbed members and a few
/// messages of another parameter, one extreme-forecast bucket file, and one
/// text forecast with no index sidecar.
fn routes() -> BTreeMap<String, Vec<u8>> {
    let mut enfo = FixtureFile::new();
    enfo.push(96, &attrs("2t", "cf", "12"));
    enfo.push(40, &attrs("10u", "cf", "12"));
    for number in 1..=50 {
        let number = number.to_string();
        let mut member = attrs("10u", "pf", "12");
        member.push(("number", number.as_str()));
        enfo.push(32, &member);
    }
    let mut member = attrs("2t", "pf", "12");
    member.push(("number", "1"));
    enfo.push(96, &member);

    let mut ep = FixtureFile::new();
    for param in EP_PARAMS {
        ep.push(24, &attrs(param, "em", "24"));
    }
    for param in EP_PARAMS {
        ep.push(24, &attrs(param, "es", "24"));
    }
    for param in EP_PARAMS.into_iter().take(3) {
        ep.push(24, &attrs(param, "em", "48"));
    }

    BTreeMap::from([
        (ENFO_DATA.to_string(), enfo.data()),
        (ENFO_INDEX.to_string(), enfo.index()),
        (EP_DATA.to_string(), ep.data()),
        (EP_INDEX.to_string(), ep.index()),
        (TF_DATA.to_string(), TF_PAYLOAD.to_vec()),
    ])
}

fn client(server: &FileServer) -> Client {
    Client::new(ClientOptions {
        source: server.base_url.clone(),
        ..ClientOptions::default()
    })
    .expect("create client")
}

fn ensemble_request() -> Request {
    Request::new()
        .date("20220121")
        .time(0)
        .stream("enfo")
        .step(12)
        .levtype("sfc")
        .param("10u")
}

fn target_in(dir: &tempfile::TempDir) -> String {
    dir.path().join("out.grib2").to_str().unwrap().to_string()
}

#[test]
fn ensemble_type_downloads_control_and_members() {
    let server = FileServer::start(routes());
    let client = client(&server);
    let dir = tempfile::tempdir().unwrap();
    let target = target_in(&dir);

    let result = client
        .retrieve(&ensemble_request().r#type("ef"), &target)
        .unwrap();

    assert_eq!(result.urls.len(), 1);
    assert_eq!(result.urls[0].url, format!("{}{ENFO_DATA}", server.base_url));
    assert_eq!(
        result.urls[0].parts,
        Some(vec![ByteRange {
            offset: 96,
            length: 1640,
        }])
    );
    assert_eq!(result.for_index["type"], vec!["cf", "pf"]);
    assert_eq!(result.for_index["param"], vec!["10u"]);
    assert_eq!(result.for_index["step"], vec!["12"]);
    assert_eq!(
        result.datetime(),
        Some(Utc.with_ymd_and_hms(2022, 1, 21, 0, 0, 0).unwrap())
    );
    assert_eq!(result.size_bytes, 1640);
    assert_eq!(count_gribs(&std::fs::read(&target).unwrap()), 51);
}

#[test]
fn control_type_matches_one_message() {
    let server = FileServer::start(routes());
    let client = client(&server);
    let dir = tempfile::tempdir().unwrap();
    let target = target_in(&dir);

    let result = client
        .retrieve(&ensemble_request().r#type("cf"), &target)
        .unwrap();

    assert_eq!(result.size_bytes, 40);
    assert_eq!(count_gribs(&std::fs::read(&target).unwrap()), 1);
}

#[test]
fn perturbed_type_matches_every_member() {
    let server = FileServer::start(routes());
    let client = client(&server);
    let dir = tempfile::tempdir().unwrap();
    let target = target_in(&dir);

    let result = client
        .retrieve(&ensemble_request().r#type("pf"), &target)
        .unwrap();

    assert_eq!(result.size_bytes, 50 * 32);
    assert_eq!(count_gribs(&std::fs::read(&target).unwrap()), 50);
}

#[test]
fn index_filters_combine_as_and() {
    let server = FileServer::start(routes());
    let client = client(&server);
    let dir = tempfile::tempdir().unwrap();
    let target = target_in(&dir);

    let result = client
        .retrieve(&ensemble_request().r#type("pf").number(7), &target)
        .unwrap();

    assert_eq!(result.size_bytes, 32);
    assert_eq!(count_gribs(&std::fs::read(&target).unwrap()), 1);
}

#[test]
fn aliased_types_collapse_to_one_url() {
    let server = FileServer::start(routes());
    let client = client(&server);
    let dir = tempfile::tempdir().unwrap();
    let target = target_in(&dir);

    let result = client
        .retrieve(&ensemble_request().r#type(["cf", "pf"]), &target)
        .unwrap();

    // cf and pf name the same file, but index matching keeps both types
    assert_eq!(result.urls.len(), 1);
    assert_eq!(result.for_urls["type"], vec!["ef"]);
    assert_eq!(result.for_index["type"], vec!["cf", "pf"]);
    assert_eq!(count_gribs(&std::fs::read(&target).unwrap()), 51);
}

#[test]
fn messages_arrive_in_file_order_by_default() {
    let server = FileServer::start(routes());
    let client = client(&server);
    let dir = tempfile::tempdir().unwrap();
    let target = target_in(&dir);

    client
        .retrieve(
            &ensemble_request().r#type("cf").param(["10u", "2t"]),
            &target,
        )
        .unwrap();

    // 2t (96 bytes) is stored before 10u (40 bytes)
    assert_eq!(grib_lengths(&std::fs::read(&target).unwrap()), vec![96, 40]);
}

#[test]
fn request_order_is_kept_when_asked() {
    let server = FileServer::start(routes());
    let client = Client::new(ClientOptions {
        source: server.base_url.clone(),
        preserve_request_order: true,
        ..ClientOptions::default()
    })
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let target = target_in(&dir);

    client
        .retrieve(
            &ensemble_request().r#type("cf").param(["10u", "2t"]),
            &target,
        )
        .unwrap();

    assert_eq!(grib_lengths(&std::fs::read(&target).unwrap()), vec![40, 96]);
}

#[test]
fn extreme_types_share_the_bucket_file() {
    let server = FileServer::start(routes());
    let client = client(&server);
    let dir = tempfile::tempdir().unwrap();
    let target = target_in(&dir);

    let result = client
        .retrieve(
            &Request::new()
                .date("20220121")
                .time(0)
                .r#type(["es", "em"])
                .step(24),
            &target,
        )
        .unwrap();

    // any step up to 240 lives in the 240h file, and em/es share type ep
    assert_eq!(result.for_urls["step"], vec!["240"]);
    assert_eq!(result.for_urls["type"], vec!["ep"]);
    assert_eq!(result.for_index["type"], vec!["es", "em"]);
    assert_eq!(result.for_index["step"], vec!["24"]);
    assert_eq!(result.urls[0].url, format!("{}{EP_DATA}", server.base_url));
    assert_eq!(count_gribs(&std::fs::read(&target).unwrap()), 18);
}

#[test]
fn text_forecasts_skip_the_index() {
    let server = FileServer::start(routes());
    let client = client(&server);
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.bufr").to_str().unwrap().to_string();

    // no .index sidecar is served for the text forecast, so retrieval only
    // succeeds because the index lookup is skipped entirely
    let result = client
        .retrieve(
            &Request::new()
                .date("20220121")
                .time(0)
                .stream("enfo")
                .r#type("tf")
                .step(240)
                .param("unused"),
            &target,
        )
        .unwrap();

    assert!(result.for_index.is_empty());
    assert_eq!(result.urls[0].parts, None);
    assert_eq!(std::fs::read(&target).unwrap(), TF_PAYLOAD);
}

#[test]
fn unmatched_values_fail_with_suggestions() {
    let server = FileServer::start(routes());
    let sink = Arc::new(CaptureSink::default());
    let client = Client::with_sink(
        ClientOptions {
            source: server.base_url.clone(),
            ..ClientOptions::default()
        },
        sink.clone(),
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let target = target_in(&dir);

    let err = client
        .retrieve(&ensemble_request().r#type("ef").param("10v"), &target)
        .unwrap_err();

    match err {
        Error::NoMatchingData(filter) => assert_eq!(filter["param"], vec!["10v"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(sink.contains("No index entries for param=10v"));
    assert!(sink.contains("Did you mean \"10u\" instead of \"10v\"?"));
}

#[test]
fn download_fetches_whole_files() {
    let server = FileServer::start(routes());
    let client = client(&server);
    let dir = tempfile::tempdir().unwrap();
    let target = target_in(&dir);

    let result = client
        .download(&ensemble_request().r#type("ef"), &target)
        .unwrap();

    assert_eq!(result.urls[0].parts, None);
    assert_eq!(result.size_bytes, 96 + 40 + 50 * 32 + 96);
    assert_eq!(count_gribs(&std::fs::read(&target).unwrap()), 53);
}

#[test]
fn target_keyword_names_the_output_file() {
    let server = FileServer::start(routes());
    let client = client(&server);
    let dir = tempfile::tempdir().unwrap();
    let target = target_in(&dir);

    let result = client
        .retrieve_request(&ensemble_request().r#type("cf").target(target.as_str()))
        .unwrap();

    assert_eq!(result.target, target);
    assert_eq!(count_gribs(&std::fs::read(&target).unwrap()), 1);
}

#[test]
fn pairs_resolve_like_a_request() {
    let server = FileServer::start(routes());
    let client = client(&server);
    let dir = tempfile::tempdir().unwrap();
    let target = target_in(&dir);

    let result = client
        .retrieve_pairs([
            ("date", "20220121".into()),
            ("time", 0.into()),
            ("stream", "enfo".into()),
            ("step", 12.into()),
            ("levtype", "sfc".into()),
            ("param", "10u".into()),
            ("type", "cf".into()),
            ("target", target.as_str().into()),
        ])
        .unwrap();

    assert_eq!(result.target, target);
    assert_eq!(result.size_bytes, 40);
}
