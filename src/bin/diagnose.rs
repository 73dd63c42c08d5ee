// Connectivity diagnostic: checks credentials, then runs the two cheapest
// calls that prove the account works end to end.

use anyhow::Context;
use chrono::{Duration as TimeDelta, Utc};
use tracing_subscriber::EnvFilter;

use travel_api_client::config::ProviderConfig;
use travel_api_client::provider::{AmadeusProvider, Provider, ProviderError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Travel API Diagnostic ===");
    println!("Environment variables:");
    report_presence("AMADEUS_API_KEY");
    report_presence("AMADEUS_API_SECRET");
    println!(
        "AMADEUS_HOSTNAME: {}",
        std::env::var("AMADEUS_HOSTNAME").unwrap_or_else(|_| "test (default)".to_string())
    );

    let config = ProviderConfig::from_env().context(
        "missing API credentials; create a .env file with AMADEUS_API_KEY and AMADEUS_API_SECRET",
    )?;
    let provider = AmadeusProvider::new(config)?;

    println!("\n=== Testing API Connection ===");
    println!("Airline lookup (simple API call)...");
    match provider
        .get(
            "/v1/reference-data/airlines",
            &[("airlineCodes", "AA".to_string())],
        )
        .await
    {
        Ok(payload) => {
            println!("Connection successful");
            if let Some(first) = payload["data"].get(0) {
                println!("Sample response: {first}");
            }
        }
        Err(err) => {
            report_failure(&err);
            return Ok(());
        }
    }

    println!("\n=== Testing Flight Search ===");
    let departure = (Utc::now() + TimeDelta::days(7)).format("%Y-%m-%d").to_string();
    println!("Flight search JFK -> LAX on {departure}...");
    match provider
        .get(
            "/v2/shopping/flight-offers",
            &[
                ("originLocationCode", "JFK".to_string()),
                ("destinationLocationCode", "LAX".to_string()),
                ("departureDate", departure),
                ("adults", "1".to_string()),
            ],
        )
        .await
    {
        Ok(payload) => {
            let offers = payload["data"].as_array().map_or(0, Vec::len);
            println!("Flight search successful: {offers} offers found");
        }
        Err(err) => report_failure(&err),
    }

    Ok(())
}

fn report_presence(key: &str) {
    let state = match std::env::var(key) {
        Ok(value) if !value.is_empty() => "set",
        _ => "MISSING",
    };
    println!("{key}: {state}");
}

fn report_failure(err: &ProviderError) {
    println!("API call failed:");
    match err {
        ProviderError::Status {
            status,
            status_text,
            body,
        } => {
            println!("  Status: {status} {status_text}");
            if let Some(body) = body {
                println!("  Response body: {body}");
            }
        }
        ProviderError::Request(err) => println!("  Network error: {err}"),
        ProviderError::Decode(detail) => println!("  Malformed response: {detail}"),
    }

    println!("\n=== Troubleshooting ===");
    println!("1. Check that your API credentials are valid");
    println!("2. Use test-environment credentials with the 'test' hostname");
    println!("3. Verify your account has the required APIs enabled");
    println!("4. Check whether you have exceeded rate limits");
}
