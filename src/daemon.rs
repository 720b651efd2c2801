use crate::configuration::Configuration;
use crate::home_assistant::{self, DiscoveryPayload};
use crate::sensor::{self, SensorReading};
use log::{debug, error, info, trace};
use rumqttc::{AsyncClient, ClientError, MqttOptions, QoS};
use std::collections::HashSet;
use std::error::Error;
use tokio::process::Command;
use tokio::signal::unix::SignalKind;
use tokio::task;
use tokio::time::sleep;

/// Entities whose discovery payload has already been sent
///
/// The set only grows and is not persisted. A restart announces every sensor
/// again, which is harmless since the discovery payloads are retained and
/// rebuilding them yields the same bytes.
///
/// ## Example
///
/// ```
/// use mqtt_ipmi_monitor::PublishedSet;
///
/// let mut published = PublishedSet::new();
/// assert!(!published.contains("server_cpu1_temp"));
///
/// published.mark(String::from("server_cpu1_temp"));
/// assert!(published.contains("server_cpu1_temp"));
/// ```
#[derive(Debug, Default)]
pub struct PublishedSet(HashSet<String>);

impl PublishedSet {
    /// Creates an empty set, nothing announced yet.
    pub fn new() -> PublishedSet {
        Default::default()
    }

    /// Returns `true` if the entity was already announced
    pub fn contains(&self, entity_id: &str) -> bool {
        self.0.contains(entity_id)
    }

    /// Marks the entity as announced
    pub fn mark(&mut self, entity_id: String) {
        self.0.insert(entity_id);
    }
}

/// One message to send to the broker
#[derive(Debug, PartialEq)]
pub struct Publication {
    pub topic: String,
    pub payload: String,
    pub retained: bool,
}

/// Daemon that periodically publishes IPMI sensor readings to MQTT
pub struct Daemon {
    config: Configuration,
    mqtt_config: MqttOptions,
    published: PublishedSet,
}

impl Daemon {
    /// Constructs a daemon from the specified configuration
    ///
    /// ```
    /// use mqtt_ipmi_monitor::{Configuration, Daemon};
    ///
    /// let config = Configuration::load("conf/mqtt-ipmi-monitor.conf").expect("Cannot load configuration");
    /// let mut daemon = Daemon::new(config);
    ///
    /// // later, run daemon.run() in an async function
    /// ```
    pub fn new(config: Configuration) -> Daemon {
        info!("Daemon for {} starting", config.mqtt.node_id);

        let mut mqtt_config =
            MqttOptions::new(&config.mqtt.node_id, &config.mqtt.host, config.mqtt.port);
        if !config.mqtt.user.is_empty() {
            mqtt_config.set_credentials(&config.mqtt.user, &config.mqtt.password);
        }

        info!(
            "Connecting to MQTT broker {}:{}",
            config.mqtt.host, config.mqtt.port
        );

        Daemon {
            mqtt_config,
            published: PublishedSet::new(),
            config,
        }
    }

    /// Runs the configured sensor command and parses its output.
    ///
    /// A command that cannot be spawned or exits with a failure status is a
    /// recoverable error: the caller skips the cycle and retries on the next
    /// tick.
    pub async fn collect(&self) -> Result<Vec<SensorReading>, Box<dyn Error>> {
        let mut arguments = self.config.ipmi.command.split_whitespace();
        let program = arguments.next().ok_or("Empty sensor command")?;

        let output = Command::new(program).args(arguments).output().await?;
        if !output.status.success() {
            return Err(format!(
                "{program} failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )
            .into());
        }

        Ok(sensor::parse_output(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Computes the publications for one poll's readings.
    ///
    /// Sensors seen for the first time get a retained discovery publication
    /// before their state publication, since Home Assistant may drop state
    /// updates for entities it does not know yet. Readings without a value
    /// produce no state publication.
    pub fn plan_cycle(&mut self, readings: &[SensorReading]) -> Vec<Publication> {
        let prefix = &self.config.mqtt.discovery_prefix;
        let node_id = &self.config.mqtt.node_id;

        let mut publications = Vec::new();
        for reading in readings {
            let entity = home_assistant::entity_id(node_id, &reading.name);

            if !self.published.contains(&entity) {
                publications.push(Publication {
                    topic: home_assistant::config_topic(prefix, node_id, &entity),
                    payload: DiscoveryPayload::new(reading, prefix, node_id).to_string(),
                    retained: true,
                });
                self.published.mark(entity.clone());
            }

            if let Some(payload) = reading.state_payload() {
                publications.push(Publication {
                    topic: home_assistant::state_topic(prefix, node_id, &entity),
                    payload,
                    retained: false,
                });
            }
        }

        publications
    }

    /// One poll cycle: collect the readings and publish them.
    ///
    /// A failed publication is logged and does not stop the remaining
    /// publications of the cycle.
    async fn poll_cycle(&mut self, client: &AsyncClient) {
        let readings = match self.collect().await {
            Ok(readings) => readings,
            Err(e) => {
                error!("Sensor command failed, skipping this cycle: {e}");
                return;
            }
        };

        debug!("Collected {} sensor readings", readings.len());

        for publication in self.plan_cycle(&readings) {
            if let Err(e) = Self::publish(client, &publication).await {
                error!("Publishing to {} failed: {e}", publication.topic);
            }
        }
    }

    /// Runs the main loop that periodically sends the MQTT events
    pub async fn run(self: &mut Daemon) {
        let (client, mut event_loop) = AsyncClient::new(self.mqtt_config.clone(), 10);

        task::spawn(async move {
            while let Ok(notification) = event_loop.poll().await {
                trace!("MQTT notification received: {notification:?}");
            }
        });

        self.main_loop(client).await.unwrap_or_else(|e| {
            error!("MQTT main loop failed: {e}");
        });
    }

    /// Polls and publishes until a termination signal arrives
    async fn main_loop(self: &mut Daemon, client: AsyncClient) -> Result<(), Box<dyn Error>> {
        let sleep_period = std::time::Duration::from_secs(self.config.mqtt.poll_interval);
        let mut terminate_signal = tokio::signal::unix::signal(SignalKind::terminate())?;

        loop {
            self.poll_cycle(&client).await;

            tokio::select! {
                _ = sleep(sleep_period) => {},
                _ = tokio::signal::ctrl_c() => {
                    debug!("Ctrl-C received");
                    break;
                },
                _ = terminate_signal.recv() => {
                    debug!("Interrupt received");
                    break;
                }
            }
        }

        Ok(())
    }

    // Publish a message to MQTT
    async fn publish(client: &AsyncClient, publication: &Publication) -> Result<(), ClientError> {
        debug!(
            "Publishing to topic {} : {}",
            publication.topic, publication.payload
        );
        client
            .publish(
                publication.topic.as_str(),
                QoS::AtLeastOnce,
                publication.retained,
                publication.payload.as_str(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_daemon(node_id: &str) -> Daemon {
        let mut config = Configuration::load("conf/mqtt-ipmi-monitor.conf")
            .expect("Failed to load default config");
        config.mqtt.node_id = node_id.to_string();

        Daemon::new(config)
    }

    #[test]
    fn test_discovery_before_state() {
        let mut daemon = test_daemon("server");
        let readings = sensor::parse_output("CPU1 Temp | 45.000 | degrees C | ok");

        let publications = daemon.plan_cycle(&readings);

        assert_eq!(publications.len(), 2);
        assert_eq!(
            publications[0].topic,
            "homeassistant/sensor/server/server_cpu1_temp/config"
        );
        assert!(publications[0].retained);
        assert_eq!(
            publications[1].topic,
            "homeassistant/sensor/server/server_cpu1_temp/state"
        );
        assert_eq!(publications[1].payload, "45.0");
        assert!(!publications[1].retained);
    }

    /// Discovery is sent once per entity, state on every cycle
    #[test]
    fn test_discovery_published_once() {
        let mut daemon = test_daemon("server");
        let readings = sensor::parse_output("CPU1 Temp | 45.000 | degrees C | ok");

        let first = daemon.plan_cycle(&readings);
        assert_eq!(first.len(), 2);

        // The value changing does not re-announce the entity
        let readings = sensor::parse_output("CPU1 Temp | 47.000 | degrees C | ok");
        let second = daemon.plan_cycle(&readings);

        assert_eq!(second.len(), 1);
        assert_eq!(
            second[0].topic,
            "homeassistant/sensor/server/server_cpu1_temp/state"
        );
        assert_eq!(second[0].payload, "47.0");
    }

    /// A sensor without a reading is announced but reports no state
    #[test]
    fn test_no_state_without_value() {
        let mut daemon = test_daemon("server");
        let readings = sensor::parse_output("Fan1 | na | RPM | ns");

        let publications = daemon.plan_cycle(&readings);

        assert_eq!(publications.len(), 1);
        assert_eq!(
            publications[0].topic,
            "homeassistant/sensor/server/server_fan1/config"
        );
        assert!(publications[0].retained);

        // Nothing left to send on the next cycle
        assert!(daemon.plan_cycle(&readings).is_empty());
    }

    /// Names that sanitize to the same identifier share a topic, the last
    /// reported value wins
    #[test]
    fn test_identity_collision_shares_topic() {
        let mut daemon = test_daemon("server");
        let readings = sensor::parse_output(
            "Fan#1 | 1200.000 | RPM | ok\n\
             Fan 1 | 1800.000 | RPM | ok",
        );

        let publications = daemon.plan_cycle(&readings);

        assert_eq!(publications.len(), 3);
        assert!(publications[0].retained);
        assert_eq!(publications[1].topic, publications[2].topic);
        assert_eq!(publications[1].payload, "1200.0");
        assert_eq!(publications[2].payload, "1800.0");
    }
}
