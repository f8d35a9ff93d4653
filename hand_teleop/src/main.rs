use cobot_lib::{init_tracing, Endpoint, HandFrame, PoseStreamer, TeleopConfig, TickOutcome};
use dora_node_api::{
    arrow::array::{Array, BinaryArray, StringArray},
    dora_core::config::DataId,
    DoraNode, Event,
};
use eyre::Result;
use std::error::Error;
use tracing::{debug, info, warn};

mod teleop;
use teleop::{parse_pose, HandTeleop};

fn load_config() -> Result<TeleopConfig> {
    let config_path = std::env::var("HAND_TELEOP_CONFIG")
        .unwrap_or_else(|_| "config/hand_teleop.toml".to_string());

    let mut config = TeleopConfig::load_or_default(&config_path)
        .map_err(|e| eyre::eyre!("Failed to load teleop config from {}: {}", config_path, e))?;
    config.apply_env_overrides();
    config.validate()?;

    info!(
        "Cobot endpoint {}:{} (allowed ports {:?})",
        config.link.host, config.link.port, config.link.allowed_ports
    );
    Ok(config)
}

/// First value of a binary or string input column.
fn input_bytes(array: &dyn Array) -> Option<Vec<u8>> {
    if let Some(binary) = array.as_any().downcast_ref::<BinaryArray>() {
        if binary.len() > 0 {
            return Some(binary.value(0).to_vec());
        }
    }
    if let Some(strings) = array.as_any().downcast_ref::<StringArray>() {
        if strings.len() > 0 {
            return Some(strings.value(0).as_bytes().to_vec());
        }
    }
    None
}

fn main() -> Result<(), Box<dyn Error>> {
    let _guard = init_tracing();

    info!("Starting hand teleop node");

    let config = load_config()?;
    let (mut node, mut events) = DoraNode::init_from_env()?;
    let angles_output = DataId::from("joint_angles".to_owned());
    let status_output = DataId::from("link_status".to_owned());

    let streamer = PoseStreamer::from_config(&config.link);
    let mut teleop = HandTeleop::new(&config, streamer)?;

    info!(
        "Pose streaming: {}",
        if teleop.streamer().is_enabled() {
            "ENABLED"
        } else {
            "DISABLED"
        }
    );

    if let Err(e) = teleop.streamer_mut().connect() {
        warn!("Initial connection not attempted: {}", e);
    }

    while let Some(event) = events.recv() {
        match event {
            Event::Input {
                id,
                metadata: _,
                data,
            } => {
                let id_str = id.as_str();

                match id_str {
                    "tick" => {
                        if let Some((angles, outcome)) = teleop.tick() {
                            if outcome == TickOutcome::Sent {
                                debug!("Pose sent: {:?}", angles);
                            }

                            let serialized = serde_json::to_vec(&angles)?;
                            let arrow_data = BinaryArray::from_vec(vec![serialized.as_slice()]);
                            if let Err(e) =
                                node.send_output(angles_output.clone(), Default::default(), arrow_data)
                            {
                                warn!("Failed to send joint angles: {}", e);
                            }
                        }

                        if let Some(status) = teleop.status_change() {
                            info!("Link {}: {}", status.state, status.message.trim_end());

                            let serialized = serde_json::to_vec(&status)?;
                            let arrow_data = BinaryArray::from_vec(vec![serialized.as_slice()]);
                            if let Err(e) =
                                node.send_output(status_output.clone(), Default::default(), arrow_data)
                            {
                                warn!("Failed to send link status: {}", e);
                            }
                        }
                    }

                    "hand_frame" => match input_bytes(&**data) {
                        Some(bytes) => match serde_json::from_slice::<HandFrame>(&bytes) {
                            Ok(frame) => teleop.set_frame(frame),
                            Err(e) => warn!("Failed to parse hand frame: {}", e),
                        },
                        None => debug!("Empty hand frame input"),
                    },

                    "hand_pose" => {
                        if let Some(bytes) = input_bytes(&**data) {
                            match parse_pose(&bytes) {
                                Ok(pose) => teleop.set_pose(pose),
                                Err(e) => warn!("Ignoring hand pose: {}", e),
                            }
                        }
                    }

                    "recenter" => {
                        if !teleop.recenter() {
                            warn!("Recenter requested before any hand was tracked");
                        }
                    }

                    "toggle_enable" => {
                        teleop.toggle_enabled();
                    }

                    "endpoint" => {
                        if let Some(bytes) = input_bytes(&**data) {
                            match serde_json::from_slice::<Endpoint>(&bytes) {
                                Ok(endpoint) => teleop.set_endpoint(endpoint),
                                Err(e) => warn!("Failed to parse endpoint: {}", e),
                            }
                        }
                    }

                    _ => {
                        debug!("Unknown input id: {}", id_str);
                    }
                }
            }

            Event::Stop(_) => {
                info!("Stop event received");
                break;
            }

            _ => {}
        }
    }

    teleop.shutdown();
    info!("Hand teleop shutting down");
    Ok(())
}
