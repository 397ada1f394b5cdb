//! `fleetlog` - vehicle trip tracking CLI
//!
//! This binary provides the command-line interface for recording trips,
//! sampling their routes, and inspecting sync state.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use fleetlog_geosim::{RouteWalker, WalkerConfig};

use fleetlog::cli::{
    ArriveCommand, Cli, Command, ConfigCommand, DepartCommand, HistoryCommand, StatusCommand,
    SyncCommand, TrackCommand,
};
use fleetlog::{
    init_logging, ArrivalRequest, Config, DepartureRequest, Fix, GeoSimProvider, LocationSampler,
    PositionProvider, SyncReconciler, TripService, TripStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Depart(cmd) => handle_depart(&config, cmd).await,
        Command::Arrive(cmd) => handle_arrive(&config, cmd).await,
        Command::Status(cmd) => handle_status(&config, &cmd),
        Command::History(cmd) => handle_history(&config, &cmd),
        Command::Track(cmd) => handle_track(&config, &cmd).await,
        Command::Sync(cmd) => handle_sync(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_store(config: &Config) -> anyhow::Result<Arc<TripStore>> {
    let path = config.database_path();
    let store = TripStore::open(&path)
        .with_context(|| format!("failed to open trip store at {}", path.display()))?;
    Ok(Arc::new(store))
}

/// One-shot acquisition from the simulated provider, seeded near the
/// previous fix when one is known.
async fn simulated_fix(near: Option<Fix>, fix_timeout: Duration) -> anyhow::Result<Fix> {
    let provider = match near {
        Some(fix) => GeoSimProvider::from_fix(fix, Duration::from_secs(30)),
        None => GeoSimProvider::new(
            RouteWalker::new(WalkerConfig::default()),
            Duration::from_secs(30),
        ),
    };
    let fix = tokio::time::timeout(fix_timeout, provider.current_fix())
        .await
        .context("fix acquisition timed out")??;
    Ok(fix)
}

async fn handle_depart(config: &Config, cmd: DepartCommand) -> anyhow::Result<()> {
    let service = TripService::new(open_store(config)?);

    let fix = match (cmd.lat, cmd.lon) {
        (Some(lat), Some(lon)) => Fix::new(lat, lon),
        _ => simulated_fix(None, config.fix_timeout()).await?,
    };

    let trip = service.depart(DepartureRequest {
        operator_id: cmd.operator,
        operator_name: cmd.name,
        plate: cmd.plate,
        reason: cmd.reason,
        fix: Some(fix),
    })?;

    println!("Trip {} departed", trip.id);
    println!("  Operator: {} ({})", trip.operator_name, trip.operator_id);
    println!("  Plate:    {}", trip.plate);
    println!("  Reason:   {}", trip.reason);
    if let Some(fix) = trip.departure_fix() {
        println!("  Position: ({:.5}, {:.5})", fix.lat, fix.lon);
    }
    Ok(())
}

async fn handle_arrive(config: &Config, cmd: ArriveCommand) -> anyhow::Result<()> {
    let service = TripService::new(open_store(config)?);

    let trip_id = match (cmd.trip, cmd.operator) {
        (Some(trip_id), _) => trip_id,
        (None, Some(operator)) => {
            service
                .open_trip(&operator)?
                .with_context(|| format!("operator {operator} has no open trip"))?
                .id
        }
        (None, None) => anyhow::bail!("either --trip or --operator is required"),
    };

    let fix = match (cmd.lat, cmd.lon) {
        (Some(lat), Some(lon)) => Fix::new(lat, lon),
        _ => {
            let near = service.get(trip_id)?.and_then(|trip| trip.last_fix());
            simulated_fix(near, config.fix_timeout()).await?
        }
    };

    let trip = service.arrive(ArrivalRequest {
        trip_id,
        fix: Some(fix),
    })?;

    println!("Trip {} arrived", trip.id);
    println!("  Samples:  {}", trip.sample_count());
    println!("  Duration: {} ms", trip.elapsed_ms());
    if let Some(fix) = trip.arrival_fix() {
        println!("  Position: ({:.5}, {:.5})", fix.lat, fix.lon);
    }
    Ok(())
}

fn handle_status(config: &Config, cmd: &StatusCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let stats = store.stats()?;
    let open_trip = match &cmd.operator {
        Some(operator) => store.open_trip(operator)?,
        None => None,
    };

    if cmd.json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "total_trips": stats.total_trips,
            "open_trips": stats.open_trips,
            "pending_sync": stats.pending_sync,
            "oldest_trip": stats.oldest_trip,
            "newest_trip": stats.newest_trip,
            "db_size_bytes": stats.db_size_bytes,
            "open_trip": open_trip,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("fleetlog status");
        println!("---------------");
        println!("Database:     {}", config.database_path().display());
        println!("Trips:        {}", stats.total_trips);
        println!("Open:         {}", stats.open_trips);
        println!("Pending sync: {}", stats.pending_sync);
        println!("DB size:      {} bytes", stats.db_size_bytes);
        if let Some(operator) = &cmd.operator {
            println!();
            match open_trip {
                Some(trip) => {
                    println!("Open trip for {operator}:");
                    println!("  Id:      {}", trip.id);
                    println!("  Plate:   {}", trip.plate);
                    println!("  Reason:  {}", trip.reason);
                    println!("  Samples: {}", trip.sample_count());
                    println!("  Since:   {}", trip.created_at);
                }
                None => println!("No open trip for {operator}"),
            }
        }
    }
    Ok(())
}

fn handle_history(config: &Config, cmd: &HistoryCommand) -> anyhow::Result<()> {
    let service = TripService::new(open_store(config)?);
    let trips = service.history(&cmd.operator, cmd.limit)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&trips)?);
        return Ok(());
    }

    if trips.is_empty() {
        println!("No trips recorded for {}", cmd.operator);
        return Ok(());
    }

    println!("Trips for {} (newest first)", cmd.operator);
    for trip in &trips {
        println!(
            "  {}  {}  {:<8}  {:>3} samples  {:<7}  {}",
            trip.created_at.format("%Y-%m-%d %H:%M"),
            trip.plate,
            trip.status.as_str(),
            trip.sample_count(),
            trip.sync_state.as_str(),
            trip.reason,
        );
    }
    Ok(())
}

async fn handle_track(config: &Config, cmd: &TrackCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let trip = store
        .open_trip(&cmd.operator)?
        .with_context(|| format!("operator {} has no open trip to track", cmd.operator))?;

    let interval = cmd
        .interval_ms
        .map_or_else(|| config.sample_interval(), Duration::from_millis);
    let seed = trip.last_fix().context("trip has no recorded position")?;
    let provider = Arc::new(GeoSimProvider::from_fix(seed, interval));

    let sampler = Arc::new(LocationSampler::new(
        Arc::clone(&store),
        provider,
        interval,
        config.fix_timeout(),
    ));
    let handle = sampler.handle();

    println!(
        "Tracking trip {} every {:?} (Ctrl-C to stop)",
        trip.id, interval
    );

    let mut runner = tokio::spawn({
        let sampler = Arc::clone(&sampler);
        let trip_id = trip.id;
        async move { sampler.run(trip_id).await }
    });

    tokio::select! {
        result = &mut runner => {
            result??;
            println!("Trip closed; tracking stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            handle.disarm();
            let _ = runner.await;
            println!("Tracking stopped; trip remains open");
        }
    }

    println!("Samples recorded: {}", handle.sample_count());
    Ok(())
}

fn handle_sync(config: &Config, cmd: &SyncCommand) -> anyhow::Result<()> {
    let reconciler = SyncReconciler::new(open_store(config)?);

    match cmd {
        SyncCommand::Pending { json } => {
            let pending = reconciler.list_pending()?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&pending)?);
            } else if pending.is_empty() {
                println!("All trips synced");
            } else {
                println!("Trips awaiting sync ({}):", pending.len());
                for trip_id in &pending {
                    match reconciler.snapshot(*trip_id)? {
                        Some(trip) => println!(
                            "  {}  {}  {:<8}  version {}",
                            trip_id,
                            trip.plate,
                            trip.status.as_str(),
                            trip.version
                        ),
                        None => println!("  {trip_id}"),
                    }
                }
            }
        }
        SyncCommand::Complete { trip, version } => {
            if reconciler.mark_synced(*trip, *version)? {
                println!("Trip {trip} confirmed synced at version {version}");
            } else {
                println!("Trip {trip} changed since version {version}; sync again");
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path: {}", config.database_path().display());
                println!();
                println!("[Sampler]");
                println!("  Interval:      {} ms", config.sampler.interval_ms);
                println!("  Fix timeout:   {} ms", config.sampler.fix_timeout_ms);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
