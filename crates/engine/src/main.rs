//! Demo: a simulated commute towards a destination until its alarm fires.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use domain::models::{AlarmSettings, Destination};
use domain::services::MockAlarmNotifier;
use persistence::FileStore;
use shared::{geo_math, Coordinate};
use tracing::info;

use transit_alarm_engine::logging::init_logging;
use transit_alarm_engine::simulation::{
    route_towards, SimulatedLocationProvider, SimulatedRegionMonitor, SimulatedTaskHost,
};
use transit_alarm_engine::{AlarmManager, Config, Platform};

const ORIGIN: Coordinate = Coordinate::new(28.5355, 77.3910);
const DESTINATION: Coordinate = Coordinate::new(28.6328, 77.2197);
const STEP_METERS: f64 = 400.0;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    init_logging(&config.logging)?;

    info!("Starting transit alarm demo v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(FileStore::open(&config.storage.data_dir).await?);
    let location = Arc::new(SimulatedLocationProvider::new());
    let monitor = Arc::new(SimulatedRegionMonitor::new());
    let notifier = Arc::new(MockAlarmNotifier::new());

    location.set_position(ORIGIN);

    let manager = AlarmManager::new(
        &config,
        Platform {
            location: location.clone(),
            regions: monitor.clone(),
            tasks: Arc::new(SimulatedTaskHost::new()),
            store,
            notifier: notifier.clone(),
        },
    );

    let restored = manager.initialize().await?;
    if restored > 0 {
        info!(alarms = restored, "Resuming alarms from a previous run");
    }

    let created = manager
        .create_alarm(
            Destination::new("Rajiv Chowk", DESTINATION, Some("Connaught Place, New Delhi")),
            AlarmSettings {
                trigger_radius: 400.0,
                ..AlarmSettings::default()
            },
        )
        .await?;
    let alarm_id = created.alarm.id.clone();
    info!(
        alarm_id = %alarm_id,
        existing = created.is_existing,
        distance_m = geo_math::distance(ORIGIN, DESTINATION).round(),
        "Alarm set, starting commute"
    );

    for position in route_towards(ORIGIN, DESTINATION, STEP_METERS) {
        location.set_position(position);

        // The OS reports region entry on its own; the background task
        // delivers fixes. Both race for the same alarm.
        for region_id in monitor.regions_containing(position) {
            manager.geofence().handle_region_enter(&region_id).await;
        }
        manager.tracker().on_fix(position).await;

        if manager.get_alarm(&alarm_id).await.is_none() {
            info!(
                %position,
                distance_m = geo_math::distance(position, DESTINATION).round(),
                "Arrived"
            );
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    if !notifier.triggered_ids().contains(&alarm_id) {
        bail!("alarm {alarm_id} did not fire before the end of the route");
    }

    let status = manager.get_monitoring_status().await;
    info!(
        remaining = status.total_alarms,
        background_tracking = status.background_tracking,
        "Demo finished"
    );
    manager.shutdown().await;
    Ok(())
}
