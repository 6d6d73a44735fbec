use anyhow::Context;
use clap::Parser;
use livetransit::{Config, RouteReference};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    let client = config.build_client()?;

    println!("Fetching from: {}", client.vehicles_url());
    println!("Routes from: {}", client.routes_url());
    let feed = client.fetch_vehicles().await
        .context("Failed to fetch vehicle feed")?;

    // classification is optional here so a broken reference does not hide the feed
    let reference = match client.fetch_route_reference().await {
        Ok(reference) => reference,
        Err(e) => {
            println!("Route reference unavailable ({:#}); every line shown as bus", anyhow::Error::new(e));
            RouteReference::default()
        }
    };

    println!("Feed timestamp: {:?}", feed.last_update);
    println!("Number of vehicles: {}", feed.vehicles.len());
    println!("Known lines: {}", reference.len());

    for (i, record) in feed.vehicles.into_iter().enumerate() {
        println!("\n--- Vehicle {} ---", i);
        println!("Vehicle ID: {}", record.vehicle_id);
        println!("  Code: {:?}", record.vehicle_code);
        println!("  Route: {:?} ({})", record.route_short_name, reference.kind_of(&record.route_short_name));
        println!("  Headsign: {:?}", record.headsign);
        println!("  Position: {}, {}", record.lat, record.lon);
        println!("  Bearing: {}", record.bearing);
        println!("  Speed: {}", record.speed);
        println!("  Delay: {}s", record.delay_seconds);
    }

    Ok(())
}
