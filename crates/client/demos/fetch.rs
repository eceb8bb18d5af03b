//! Fetches a url and prints the status, headers and decoded body.
//!
//! ```text
//! cargo run --example fetch -- http://example.com/
//! ```

use std::env;
use std::process::ExitCode;

use micro_client::HttpClient;
use micro_client::protocol::RequestBuilder;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> ExitCode {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let Some(url) = env::args().nth(1) else {
        error!("usage: fetch <url>");
        return ExitCode::FAILURE;
    };

    let target = match url.parse() {
        Ok(target) => target,
        Err(e) => {
            error!(cause = %e, url, "invalid url");
            return ExitCode::FAILURE;
        }
    };

    let client = match HttpClient::new() {
        Ok(client) => client,
        Err(e) => {
            error!(cause = %e, "failed to set up client");
            return ExitCode::FAILURE;
        }
    };

    let request = match RequestBuilder::new().get(target).build() {
        Ok(request) => request,
        Err(e) => {
            error!(cause = %e, "failed to build request");
            return ExitCode::FAILURE;
        }
    };

    let mut response = match client.request(request, None) {
        Ok(response) => response,
        Err(e) => {
            error!(cause = %e, "request failed");
            return ExitCode::FAILURE;
        }
    };

    info!(status_code = response.status_code(), status_message = response.status_message(), "received response");
    for line in response.exact_headers() {
        println!("{line}");
    }
    println!();

    let mut received = 0;
    let mut progress = |total: u64| received = total;
    match response.body().read_string_to_length(Some(&mut progress)) {
        Ok(body) => println!("{body}"),
        Err(e) => {
            error!(cause = %e, "failed to read body");
            return ExitCode::FAILURE;
        }
    }
    info!(received, complete = response.body().is_complete(), "done");
    ExitCode::SUCCESS
}
