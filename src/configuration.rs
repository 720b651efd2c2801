use serde::Deserialize;
use serde_inline_default::serde_inline_default;
use std::error::Error;

/// Contains the configuration for communicating with the MQTT broker
#[serde_inline_default]
#[derive(Deserialize)]
pub struct Mqtt {
    /// Hostname or IP address. Default: localhost
    #[serde_inline_default(String::from("localhost"))]
    pub host: String,

    /// Port of the connection to the broker. Default: 1883
    #[serde_inline_default(1883)]
    pub port: u16,

    /// Username for the connection to the broker. Default: empty
    #[serde(default)]
    pub user: String,

    /// Password for the connection to the broker. Default: empty
    #[serde(default)]
    pub password: String,

    /// Prefix for the discovery topics sent to Home Assistant. Default: homeassistant
    ///
    /// This must match the configuration of the MQTT integration in Home Assistant
    ///
    /// See <https://www.home-assistant.io/integrations/mqtt#discovery-options>
    #[serde_inline_default(String::from("homeassistant"))]
    #[serde(rename = "discovery-prefix")]
    pub discovery_prefix: String,

    /// Delay between each sensor poll in seconds. Default: 30 seconds
    #[serde_inline_default(30)]
    #[serde(rename = "poll-interval")]
    pub poll_interval: u64,

    /// Identifier of the monitored node. It is used in the discovery and state
    /// topics and in the entity identifiers, so it should be unique in Home
    /// Assistant. Default: machine hostname
    #[serde(default = "hostname")]
    #[serde(rename = "node-id")]
    pub node_id: String,
}

/// Contains the configuration for reading the IPMI sensors
#[serde_inline_default]
#[derive(Deserialize)]
pub struct Ipmi {
    /// Command that prints the sensor table. Default: `ipmitool sensor`
    ///
    /// For a remote BMC use something like
    /// `ipmitool -I lanplus -H 10.0.0.2 -U user -P pass sensor`
    #[serde_inline_default(String::from("ipmitool sensor"))]
    pub command: String,
}

/// Contains all the configuration for `mqtt-ipmi-monitor`
#[serde_inline_default]
#[derive(Deserialize)]
pub struct Configuration {
    /// Contains the configuration for communicating with the MQTT broker
    pub mqtt: Mqtt,

    /// Contains the configuration for reading the IPMI sensors
    pub ipmi: Ipmi,

    /// Sets the verbosity of the logs.
    ///   * 1 => Error
    ///  * 2 => Warning
    ///  * 3 => Info
    ///  * 4 => Debug
    ///  * 5 => Trace
    #[serde_inline_default(2)]
    #[serde(rename = "log-verbosity")]
    pub log_verbosity: usize,
}

fn hostname() -> String {
    sysinfo::System::host_name().expect("Cannot read hostname")
}

impl Configuration {
    /// Load the configuration from a file
    ///
    /// ## Example
    ///
    /// ```
    /// use mqtt_ipmi_monitor::{configuration, Configuration};
    ///
    /// let config = Configuration::load("conf/mqtt-ipmi-monitor.conf").expect("Cannot load configuration");
    ///
    /// assert_eq!(config.mqtt.host, "localhost");
    /// ```
    pub fn load(path: &str) -> Result<Configuration, Box<dyn Error>> {
        let config: Configuration = toml::from_str(std::fs::read_to_string(path)?.as_str())?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that would produce broken topics or an
    /// unrunnable sensor command.
    fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.mqtt.node_id.trim().is_empty() {
            return Err("node-id must not be empty".into());
        }
        if self.ipmi.command.split_whitespace().next().is_none() {
            return Err("ipmi command must not be empty".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that we can properly load the default configuration
    #[test]
    fn test_default_config() -> Result<(), Box<dyn Error>> {
        let conf = Configuration::load("conf/mqtt-ipmi-monitor.conf")?;

        assert_eq!(conf.mqtt.host, String::from("localhost"));
        assert_eq!(conf.mqtt.port, 1883);
        assert_eq!(conf.mqtt.discovery_prefix, String::from("homeassistant"));
        assert_eq!(conf.mqtt.poll_interval, 30);

        // By default, the node id will be the hostname of the machine
        assert_eq!(conf.mqtt.node_id, hostname());

        assert_eq!(conf.ipmi.command, String::from("ipmitool sensor"));

        Ok(())
    }

    #[test]
    fn test_rejects_empty_node_id() {
        let conf: Configuration =
            toml::from_str("[mqtt]\nnode-id = \"  \"\n[ipmi]\n").expect("Cannot parse");

        assert!(conf.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_command() {
        let conf: Configuration =
            toml::from_str("[mqtt]\nnode-id = \"node\"\n[ipmi]\ncommand = \" \"\n")
                .expect("Cannot parse");

        assert!(conf.validate().is_err());
    }
}
