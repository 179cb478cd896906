use anyhow::{Context, Result};
use heatmiser_lib::protocol::DeviceState;
use heatmiser_lib::tcp::Thermostat;
use log::{error, info, warn};
use serde_json::json;

use crate::{commandline, mqtt};

/// Name the status is published under, below the configured base topic.
const STATUS_METRIC: &str = "status";

/// Sink for one leaf of the status tree.
trait Publish {
    fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}

impl Publish for mqtt::MqttPublisher {
    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        mqtt::MqttPublisher::publish(self, topic, payload)
    }
}

fn publish_simple_format(
    publisher: &impl Publish,
    base_topic: &str,
    metric_name: &str,
    value: &serde_json::Value,
) {
    fn publish_recursive(publisher: &impl Publish, topic: &str, val: &serde_json::Value) {
        let payload = match val {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    publish_recursive(publisher, &format!("{topic}/{k}"), v);
                }
                return;
            }
            serde_json::Value::Array(arr) => {
                for (i, v) in arr.iter().enumerate() {
                    publish_recursive(publisher, &format!("{topic}/{i}"), v);
                }
                return;
            }
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            // absent sensors and dates are left out
            serde_json::Value::Null => return,
        };
        if let Err(e) = publisher.publish(topic, &payload) {
            error!("Failed to publish message to topic {topic}: {e}");
        }
    }
    let root_topic = format!("{base_topic}/{metric_name}");
    publish_recursive(publisher, &root_topic, value);
}

fn json_payload(state: &DeviceState) -> Result<String> {
    let mut data_to_publish = serde_json::Map::new();
    data_to_publish.insert(
        "timestamp".to_string(),
        json!(chrono::Utc::now().to_rfc3339()),
    );
    data_to_publish.insert(STATUS_METRIC.to_string(), serde_json::to_value(state)?);
    serde_json::to_string(&data_to_publish).with_context(|| "Cannot serialize status")
}

fn output_state(
    state: &DeviceState,
    output: &commandline::DaemonOutput,
    mqtt_publisher: Option<&mqtt::MqttPublisher>,
) -> Result<()> {
    match output {
        commandline::DaemonOutput::Console => {
            println!("--- Data at {} ---", chrono::Local::now().to_rfc3339());
            print!("{}", crate::StatusReport(state));
            println!("--------------------------");
        }
        commandline::DaemonOutput::Mqtt { format, .. } => {
            let Some(publisher) = mqtt_publisher else {
                warn!("MQTT output selected, but publisher is not initialized. Skipping publish.");
                return Ok(());
            };
            match format {
                commandline::MqttFormat::Json => {
                    let payload = json_payload(state)?;
                    info!("MQTT output: Attempting to publish data: {payload}");
                    publisher.publish(publisher.topic(), &payload)?;
                    info!("Successfully published data to MQTT.");
                }
                commandline::MqttFormat::Simple => {
                    let value = serde_json::to_value(state)?;
                    publish_simple_format(publisher, publisher.topic(), STATUS_METRIC, &value);
                }
            }
        }
    }
    Ok(())
}

pub fn run(
    mut thermostat: Thermostat,
    output: commandline::DaemonOutput,
    interval: std::time::Duration,
) -> Result<()> {
    info!("Starting daemon mode: output={output:?}, interval={interval:?}");

    let mut mqtt_publisher: Option<mqtt::MqttPublisher> = None;

    if let commandline::DaemonOutput::Mqtt { config_file, .. } = &output {
        let config = mqtt::MqttConfig::load(config_file)
            .with_context(|| format!("Failed to open MQTT config file at '{config_file}'"))?;
        info!("Successfully loaded MQTT config from {config_file}: {config:?}");
        let publisher =
            mqtt::MqttPublisher::new(config).with_context(|| "Failed to create MQTT publisher")?;
        info!("MQTT Publisher created successfully.");
        mqtt_publisher = Some(publisher);
    }

    loop {
        match thermostat.read_device() {
            Ok(state) => {
                if let Err(e) = output_state(&state, &output, mqtt_publisher.as_ref()) {
                    error!("Failed to output status: {e:?}");
                }
            }
            Err(e) => error!("Error reading thermostat status: {e}"),
        }
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<(String, String)>>);

    impl Publish for Recorder {
        fn publish(&self, topic: &str, payload: &str) -> Result<()> {
            self.0
                .borrow_mut()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    #[test]
    fn simple_format_publishes_leaves() {
        let recorder = Recorder::default();
        let value = json!({
            "model": "PrtE",
            "set_room_target": 20,
            "key_lock": false,
            "remote_air_temperature": null,
            "slots": [1, 2],
        });
        publish_simple_format(&recorder, "heatmiser", "status", &value);

        assert_eq!(
            recorder.0.into_inner(),
            vec![
                ("heatmiser/status/model".into(), "PrtE".into()),
                ("heatmiser/status/set_room_target".into(), "20".into()),
                ("heatmiser/status/key_lock".into(), "false".into()),
                ("heatmiser/status/slots/0".into(), "1".into()),
                ("heatmiser/status/slots/1".into(), "2".into()),
            ]
        );
    }
}
