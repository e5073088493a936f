//! Demonstrates one full send/ack/dispatch cycle over an in-memory
//! loopback pair, standing in for a real serial or TCP link.

use radio_link::{ConfigRequestData, DroneLink, LoopbackChannel, ManagerConfig};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    env_logger::init();

    let (drone_side, ground_side) = LoopbackChannel::pair();

    let drone = DroneLink::new(ManagerConfig::new(), Box::new(drone_side));
    let ground = DroneLink::new(ManagerConfig::new(), Box::new(ground_side));

    ground.register_config_request(
        false,
        Arc::new(|record| {
            log::info!(
                "ground station received config request #{}: center_frequency={}",
                record.packet_id,
                record.data.center_frequency
            );
        }),
    );

    drone.register_config_response(
        true,
        Arc::new(|record| {
            log::info!("drone received config ack: success={}", record.success);
        }),
    );

    drone.start().await.expect("failed to start drone link");
    ground.start().await.expect("failed to start ground link");

    let body = ConfigRequestData {
        gain: 40.0,
        sampling_rate: 2_400_000,
        center_frequency: 173_500_000,
        run_num: 1,
        enable_test_data: false,
        ping_width_ms: 25,
        ping_min_snr: 8,
        ping_max_len_mult: 1.5,
        ping_min_len_mult: 0.5,
        target_frequencies: vec![173_500_000, 173_900_000],
    };
    let (packet_id, need_ack, _timestamp) = drone.send_config_request(body);
    log::info!("drone sent config request #{packet_id} (need_ack={need_ack})");

    tokio::time::sleep(Duration::from_millis(50)).await;
    ground.send_config_response(true);

    tokio::time::sleep(Duration::from_millis(200)).await;

    drone.stop().await;
    ground.stop().await;
}
