use anyhow::{Context, Result};
use clap::Parser;
use livetransit::{start_pipeline, AppState, Config, RefreshState};

/// How many filtered vehicles to list under each summary
const LISTED_VEHICLES: usize = 10;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .init();

    let config = Config::parse();

    tracing::info!("Live Transit Monitor");
    tracing::info!(vehicles = %config.vehicles_url, routes = %config.routes_url, "Feeds");
    if let Some(relay) = &config.relay {
        tracing::info!(relay = %relay, "Using relay");
    }

    let client = config.build_client()
        .context("Failed to set up feed client")?;
    let (handle, refresh_rx) = start_pipeline(client, config.refresh_settings());
    let mut app = AppState::new(refresh_rx, config.initial_criteria());

    tracing::info!(criteria = ?app.criteria(), "Waiting for route reference");

    loop {
        tokio::select! {
            more = app.changed() => {
                if !more {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping");
                break;
            }
        }

        let state = app.snapshot();
        if let Some(fatal) = &state.fatal_error {
            eprintln!("\n❌ {}", fatal);
            break;
        }
        print_summary(&state, &mut app);
    }

    handle.shutdown().await
        .context("Refresh task panicked")?;

    let state = app.snapshot();
    if let Some(fatal) = state.fatal_error {
        anyhow::bail!(fatal);
    }
    Ok(())
}

fn print_summary(state: &RefreshState, app: &mut AppState) {
    let visible = app.visible();

    println!("\n┌─ Snapshot #{} ─────────────────────────────────", state.generation);
    println!("│ Time: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("│ Feed: {}", state.last_update.as_deref().unwrap_or("unknown"));
    println!("└────────────────────────────────────────────────────");

    if let Some(warning) = &state.transient_error {
        println!("\n⚠️  {}", warning);
    }

    println!("\n📊 {} of {} vehicles ({} buses, {} trams)",
        visible.vehicles.len(), state.vehicles.len(), visible.bus_count, visible.tram_count);

    for vehicle in visible.vehicles.iter().take(LISTED_VEHICLES) {
        println!("  {}", vehicle);
    }
    if visible.vehicles.len() > LISTED_VEHICLES {
        println!("  ... and {} more", visible.vehicles.len() - LISTED_VEHICLES);
    }
}
