use std::env;

use forecast_opendata::{Client, ClientOptions, Request};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() == 1 {
        eprintln!(
            "Usage:\n  cargo run --example cli -- retrieve <target>\n  cargo run --example cli -- download <target>\n  cargo run --example cli -- latest\n\nExample (HRES, latest, msl, +240h):\n  cargo run --example cli -- retrieve data.grib2\n\nNotes:\n- This will contact the ECMWF open data service (default source=ecmwf).\n- Downloading implies CC BY 4.0 attribution requirements (see the ECMWF open data license).\n- Set RUST_LOG=warn to see request diagnostics."
        );
        return;
    }

    match args.get(1).map(|s| s.as_str()) {
        Some("retrieve") => {
            let target = args
                .get(2)
                .cloned()
                .unwrap_or_else(|| "data.grib2".to_string());

            let opts = ClientOptions {
                source: "ecmwf".to_string(),
                model: "ifs".to_string(),
                resol: "0p25".to_string(),
                ..ClientOptions::default()
            };
            let client = Client::new(opts).expect("create client");

            let request = Request::new()
                .r#type("fc")
                .step(240)
                .param("msl")
                .target(&target);

            match client.retrieve_request(&request) {
                Ok(result) => {
                    println!(
                        "Downloaded {bytes} bytes to {target}",
                        bytes = result.size_bytes
                    );
                    if let Some(datetime) = result.datetime() {
                        println!("Forecast datetime: {datetime}");
                    }
                }
                Err(e) => {
                    eprintln!("retrieve failed: {e}");
                    eprintln!("Tip: try setting an explicit date/time in code, or use a replicated source (aws/google/azure) if the main portal is busy.");
                    std::process::exit(1);
                }
            }
        }

        Some("download") => {
            let target = args
                .get(2)
                .cloned()
                .unwrap_or_else(|| "data.grib2".to_string());

            let client = Client::new(ClientOptions::default()).expect("create client");
            let request = Request::new().r#type("fc").step(240).target(&target);

            match client.download_request(&request) {
                Ok(result) => {
                    println!(
                        "Downloaded {bytes} bytes to {target}",
                        bytes = result.size_bytes
                    );
                    if let Some(datetime) = result.datetime() {
                        println!("Forecast datetime: {datetime}");
                    }
                }
                Err(e) => {
                    eprintln!("download failed: {e}");
                    eprintln!("Tip: try setting an explicit date/time in code, or use a replicated source (aws/google/azure) if the main portal is busy.");
                    std::process::exit(1);
                }
            }
        }

        Some("latest") => {
            let client = Client::new(ClientOptions::default()).expect("create client");
            let request = Request::new().r#type("fc").step(240).param("msl");

            match client.latest(&request) {
                Ok(date) => println!("Latest run: {date}"),
                Err(e) => {
                    eprintln!("latest failed: {e}");
                    std::process::exit(1);
                }
            }
        }

        _ => {
            eprintln!("Unknown command. Use: retrieve|download|latest");
            std::process::exit(2);
        }
    }
}
