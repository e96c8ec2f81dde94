use crate::client::CompassClient;
use crate::sensor::SensorPlatform;
use log::{debug, info, warn};
use std::thread;
use std::time::{Duration, Instant};

pub fn run_loop(platform: &mut SensorPlatform, interval: Duration) -> ! {
    loop {
        let tick_start = Instant::now();

        let failed = platform.refresh();
        if failed > 0 {
            warn!("{} of {} sensor(s) unavailable", failed, platform.sensors.len());
        }

        // Maintain steady cadence
        let elapsed = tick_start.elapsed();
        debug!("refresh pass took {}ms", elapsed.as_millis());
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
}

/// One full pass over every heater. The snapshot is written to stdout as JSON.
pub fn run_once(client: &CompassClient) -> Result<(), String> {
    let details = client
        .get_device_details()
        .map_err(|e| format!("get_device_details failed: {}", e))?;

    for (index, detail) in details.iter().enumerate() {
        let state = &detail.current_state;
        info!("heater #{}: {} {}", index + 1, state.rmt, state.unit());
    }

    let json = serde_json::to_string_pretty(&details).map_err(|e| format!("serialize snapshot failed: {}", e))?;
    println!("{}", json);
    Ok(())
}
