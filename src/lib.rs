//! # mqtt-ipmi-monitor
//!
//! `mqtt-ipmi-monitor` polls IPMI sensors through `ipmitool` and sends the
//! readings to the MQTT integration of Home Assistant
//!
//!

pub use self::configuration::Configuration;
pub use self::configuration::Ipmi;
pub use self::configuration::Mqtt;
pub use self::daemon::Daemon;
pub use self::daemon::Publication;
pub use self::daemon::PublishedSet;
pub use self::home_assistant::DiscoveryPayload;
pub use self::sensor::SensorReading;
pub use self::sensor::UnitClass;

/// Contains the configuration stuff
pub mod configuration;
/// Contains the daemon code
pub mod daemon;
/// Contains Home Assistant discovery data
pub mod home_assistant;
/// Contains the sensor output parsing
pub mod sensor;
