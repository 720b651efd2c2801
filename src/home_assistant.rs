use crate::sensor::SensorReading;
use serde::Serialize;
use std::fmt;

/// Derives the topic-safe entity identifier for a sensor on a node.
///
/// The identifier is stable: the same node and sensor name always produce
/// the same string, across polls and across restarts. Distinct names that
/// sanitize to the same identifier share a topic, the last reported value
/// wins.
///
/// ## Example
///
/// ```
/// use mqtt_ipmi_monitor::home_assistant::entity_id;
///
/// assert_eq!(entity_id("server-r720", "CPU1 Temp"), "server_r720_cpu1_temp");
/// ```
pub fn entity_id(node_id: &str, sensor_name: &str) -> String {
    format!("{}_{}", sanitize(node_id), sanitize(sensor_name))
}

/// Lower-cases and maps everything outside `[a-z0-9_]` to underscores,
/// collapsing repeats, so the result is usable in an MQTT topic.
fn sanitize(text: &str) -> String {
    let mut sanitized = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '_'
        };
        if c != '_' || !sanitized.ends_with('_') {
            sanitized.push(c);
        }
    }
    sanitized.trim_matches('_').to_string()
}

/// Discovery topic for one sensor entity
pub fn config_topic(prefix: &str, node_id: &str, entity_id: &str) -> String {
    format!("{prefix}/sensor/{node_id}/{entity_id}/config")
}

/// State topic for one sensor entity
pub fn state_topic(prefix: &str, node_id: &str, entity_id: &str) -> String {
    format!("{prefix}/sensor/{node_id}/{entity_id}/state")
}

/// Discovery payload sent to Home Assistant
///
/// This describes one sensor entity so that Home Assistant creates it
/// without manual configuration. The payload is retained by the broker, and
/// building it twice from the same sensor yields the same bytes, so
/// re-publishing it is harmless.
#[derive(Serialize, Debug)]
pub struct DiscoveryPayload {
    /// Unique ID for the entity, also the last topic segment
    unique_id: String,

    /// Name of the entity, shown in Home Assistant
    name: String,

    /// Topic on which the value reports are sent
    state_topic: String,

    /// Device class helps Home Assistant to know how to interpret the reported values.
    ///
    /// See <https://www.home-assistant.io/integrations/sensor#device-class> for possible values here
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'static str>,

    /// Describes how Home Assistant stores the data. It is always `measurement`
    state_class: &'static str,

    /// Unit used in the reports. Unknown units keep the utility's own text
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<String>,

    /// Device the entity belongs to, one per monitored node
    device: Device,

    /// Describes the origin of the messages, in this case `mqtt-ipmi-monitor`
    origin: Origin,
}

/// Device sent to Home Assistant, groups all sensors of one node
#[derive(Serialize, Debug)]
pub struct Device {
    /// Identifier of the device. This corresponds to the `node-id` configuration field
    identifiers: Vec<String>,

    /// Name of the device, derived from the `node-id` configuration field
    name: String,

    manufacturer: &'static str,

    model: &'static str,
}

/// Describes the origin of the messages, in this case `mqtt-ipmi-monitor`
#[derive(Serialize, Debug)]
pub struct Origin {
    /// Name of the origin, always `mqtt-ipmi-monitor`
    name: &'static str,

    /// Version of `mqtt-ipmi-monitor`
    sw_version: &'static str,

    /// URL of `mqtt-ipmi-monitor`
    url: &'static str,
}

impl DiscoveryPayload {
    /// Builds the discovery payload announcing a sensor on the given node.
    ///
    /// ## Example
    ///
    /// ```
    /// use mqtt_ipmi_monitor::{DiscoveryPayload, SensorReading};
    ///
    /// let reading = SensorReading::parse_line("CPU1 Temp | 45.000 | degrees C | ok")
    ///     .expect("Not a data row");
    /// let payload = DiscoveryPayload::new(&reading, "homeassistant", "server");
    ///
    /// assert!(payload.to_string().contains("\"unique_id\":\"server_cpu1_temp\""));
    /// ```
    pub fn new(reading: &SensorReading, prefix: &str, node_id: &str) -> DiscoveryPayload {
        let entity = entity_id(node_id, &reading.name);
        let unit_of_measurement = reading
            .unit_class
            .unit_of_measurement()
            .map(String::from)
            .or_else(|| {
                if reading.unit_raw.is_empty() {
                    None
                } else {
                    Some(reading.unit_raw.clone())
                }
            });

        DiscoveryPayload {
            state_topic: state_topic(prefix, node_id, &entity),
            unique_id: entity,
            name: format!("IPMI {}", reading.name),
            device_class: reading.unit_class.device_class(),
            state_class: "measurement",
            unit_of_measurement,
            device: Device {
                identifiers: vec![node_id.to_string()],
                name: format!("IPMI {node_id}"),
                manufacturer: "IPMI",
                model: "BMC",
            },
            origin: Origin {
                name: env!("CARGO_PKG_NAME"),
                sw_version: env!("CARGO_PKG_VERSION"),
                url: env!("CARGO_PKG_HOMEPAGE"),
            },
        }
    }
}

impl fmt::Display for DiscoveryPayload {
    /// Formats the payload in JSON format
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let Ok(payload) = serde_json::to_string(&self) else {
            return Err(fmt::Error);
        };
        write!(f, "{payload}")
    }
}
