use std::process;
use std::sync::Arc;

use clap::{App, Arg};
use log::error;
use tokio::io::{AsyncBufReadExt, BufReader};
use zoom_recording_downloader::command::Command;
use zoom_recording_downloader::config::DEFAULT_CONFIG_PATH;
use zoom_recording_downloader::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    pretty_env_logger::init();

    let matches = App::new("zoom-recording-downloader")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Download Zoom cloud recordings for every user of an account")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration document")
                .takes_value(true)
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("start")
                .long("start")
                .help("Run immediately instead of waiting for a start command"),
        )
        .get_matches();

    let reporter: Arc<dyn Reporter> = Arc::new(StdoutReporter);

    let config_path = matches.value_of("config").unwrap_or(DEFAULT_CONFIG_PATH);
    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            reporter.error(&e.to_string());
            process::exit(1);
        }
    };

    let code = tokio::select! {
        code = session(config, matches.is_present("start"), reporter.clone()) => code,
        _ = tokio::signal::ctrl_c() => {
            reporter.status("Exiting due to interrupt.");
            130
        }
    };
    process::exit(code);
}

/// Wait for `start` unless told to begin right away, then run once
async fn session(config: Config, start_now: bool, reporter: Arc<dyn Reporter>) -> i32 {
    if !start_now {
        reporter.status("Recording downloader initialized. Awaiting commands...");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    reporter.status(&format!("Received command: '{}'", line.trim()));
                    match Command::parse(&line) {
                        Command::Start => break,
                        Command::Close => {
                            reporter.status("Exiting.");
                            return 0;
                        }
                        Command::Unknown(_) => continue,
                    }
                }
                Ok(None) => return 0,
                Err(e) => {
                    error!("Cannot read commands: {}", e);
                    return 1;
                }
            }
        }
    }

    match zoom_recording_downloader::run(config, ClientOptions::default(), reporter.clone()).await {
        Ok(_) => 0,
        Err(e) => {
            error!("Run aborted: {}", e);
            reporter.error(&e.to_string());
            1
        }
    }
}
