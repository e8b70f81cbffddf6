//! Sensorlog CLI
//!
//! Command-line client for a running Sensorlog server:
//! - Register sensors
//! - Send readings
//! - List sensors
//! - Print a sensor's history

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use reqwest::header::ACCEPT;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sensorlog-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client for the Sensorlog sensor event server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8080", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a sensor
    Register {
        /// Ten-digit serial number
        serial_number: String,
        /// Sensor type (cc, adc)
        #[arg(short = 't', long = "type", default_value = "adc")]
        sensor_type: String,
        /// Free-form description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Send a reading for a sensor
    Send {
        /// Ten-digit serial number
        serial_number: String,
        /// Measured value
        payload: i64,
    },

    /// List registered sensors
    Sensors,

    /// Print a sensor's events
    History {
        /// Sensor id
        sensor_id: i64,
        /// Time range ending now (e.g., 30m, 6h, 7d)
        #[arg(short, long, default_value = "1d")]
        last: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Register {
            serial_number,
            sensor_type,
            description,
        } => {
            let body = serde_json::json!({
                "serial_number": serial_number,
                "type": sensor_type,
                "description": description,
                "is_active": true,
            });

            let response = client
                .post(format!("{}/sensors", cli.api_url))
                .json(&body)
                .send()
                .await
                .with_context(|| format!("Cannot connect to Sensorlog API at {}", cli.api_url))?;
            let sensor = expect_json(response).await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&sensor)?);
            } else {
                println!(
                    "Registered sensor {} (serial {})",
                    sensor["id"].as_i64().unwrap_or(0),
                    sensor["serial_number"].as_str().unwrap_or("-")
                );
            }
        }

        Commands::Send {
            serial_number,
            payload,
        } => {
            let body = serde_json::json!({
                "sensor_serial_number": serial_number,
                "payload": payload,
            });

            let response = client
                .post(format!("{}/events", cli.api_url))
                .json(&body)
                .send()
                .await
                .with_context(|| format!("Cannot connect to Sensorlog API at {}", cli.api_url))?;
            let event = expect_json(response).await?;

            println!(
                "Recorded {} for sensor {} at {}",
                payload,
                event["sensor_id"].as_i64().unwrap_or(0),
                event["timestamp"].as_str().unwrap_or("-")
            );
        }

        Commands::Sensors => {
            let response = client
                .get(format!("{}/sensors", cli.api_url))
                .header(ACCEPT, "application/json")
                .send()
                .await
                .with_context(|| format!("Cannot connect to Sensorlog API at {}", cli.api_url))?;
            let sensors = expect_json(response).await?;
            let sensors = sensors.as_array().cloned().unwrap_or_default();

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&sensors)?);
            } else if sensors.is_empty() {
                println!("No sensors registered yet.");
                println!();
                println!("Register one with:");
                println!("  sensorlog-cli register 0123456789 --type adc");
            } else {
                println!(
                    "{:<6} {:<12} {:<6} {:>10}  {}",
                    "ID", "Serial", "Type", "State", "Last activity"
                );
                println!("{}", "-".repeat(64));

                for sensor in sensors {
                    println!(
                        "{:<6} {:<12} {:<6} {:>10}  {}",
                        sensor["id"].as_i64().unwrap_or(0),
                        sensor["serial_number"].as_str().unwrap_or("-"),
                        sensor["type"].as_str().unwrap_or("-"),
                        sensor["current_state"].as_i64().unwrap_or(0),
                        sensor["last_activity"].as_str().unwrap_or("-")
                    );
                }
            }
        }

        Commands::History { sensor_id, last } => {
            let duration = parse_duration(&last)?;
            let end = Utc::now();
            let start = end - duration;

            let response = client
                .get(format!("{}/sensors/{}/history", cli.api_url, sensor_id))
                .header(ACCEPT, "application/json")
                .query(&[
                    ("start_date", start.timestamp().to_string()),
                    ("end_date", end.timestamp().to_string()),
                ])
                .send()
                .await
                .with_context(|| format!("Cannot connect to Sensorlog API at {}", cli.api_url))?;
            let events = expect_json(response).await?;
            let events = events.as_array().cloned().unwrap_or_default();

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else if events.is_empty() {
                println!("No events in the last {}.", last);
            } else {
                println!("{:<22} {:>12}", "Timestamp", "Payload");
                println!("{}", "-".repeat(35));
                for event in events {
                    let ts = event["timestamp"]
                        .as_i64()
                        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    println!("{:<22} {:>12}", ts, event["payload"].as_i64().unwrap_or(0));
                }
            }
        }

        Commands::Config { output } => {
            let config = sensorlog::config::generate_default_config();

            if let Some(path) = output {
                std::fs::write(&path, &config)
                    .with_context(|| format!("Failed to write {:?}", path))?;
                println!("Config written to {:?}", path);
            } else {
                print!("{}", config);
            }
        }
    }

    Ok(())
}

/// Body of a successful response, or the server's error message
async fn expect_json(response: reqwest::Response) -> anyhow::Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        bail!("Request failed ({}): {}", status, text);
    }
    Ok(response.json().await?)
}

/// Parse a duration string like "30m", "6h", "7d", "2w"
fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.len() < 2 {
        bail!("Invalid duration: {}", s);
    }

    let (num, unit) = s.split_at(s.len() - 1);
    let num: i64 = num
        .parse()
        .with_context(|| format!("Invalid duration: {}", s))?;

    match unit {
        "m" => Ok(Duration::minutes(num)),
        "h" => Ok(Duration::hours(num)),
        "d" => Ok(Duration::days(num)),
        "w" => Ok(Duration::weeks(num)),
        _ => bail!("Unknown duration unit: {} (use m, h, d, w)", unit),
    }
}
