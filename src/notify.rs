//! Device-reset notifier.
//!
//! Publishes the fixed `RESET` payload to the energy-monitor reset topic
//! when the daily rollup fires, telling the meters to restart their
//! cumulative energy counters. The publish is fire-and-forget: no
//! acknowledgment is awaited beyond the broker handshake, failures are
//! logged by the pipeline and never block the rollup itself.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, QoS};
use tracing::info;

use crate::error::{Error, Result};

// ---

/// Fixed command payload understood by the meters.
const RESET_PAYLOAD: &str = "RESET";

/// MQTT publisher for the device-reset command.
#[derive(Debug, Clone)]
pub struct ResetNotifier {
    // ---
    host: String,
    port: u16,
    topic: String,
}

impl ResetNotifier {
    /// Build a notifier from a broker URL and topic.
    ///
    /// Accepts `mqtt://host:port`, `host:port`, or a bare hostname
    /// (port defaults to 1883). TLS brokers are not supported.
    pub fn new(broker_url: &str, topic: &str) -> Result<Self> {
        // ---
        let (host, port) = parse_broker_addr(broker_url)?;
        Ok(Self {
            host,
            port,
            topic: topic.to_string(),
        })
    }

    /// Publish `RESET` to the reset topic and disconnect.
    ///
    /// Connects fresh each time; the pipeline only fires once a day, so
    /// holding a broker session open buys nothing.
    pub async fn publish_reset(&self) -> Result<()> {
        // ---
        let client_id = format!("powerflow-{}", uuid::Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(5));

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        client
            .publish(&self.topic, QoS::AtMostOnce, false, RESET_PAYLOAD)
            .await
            .map_err(|e| Error::Publish(e.to_string()))?;
        client
            .disconnect()
            .await
            .map_err(|e| Error::Publish(e.to_string()))?;

        // Drive the event loop until the disconnect goes out; publish and
        // disconnect above only enqueue.
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(_) => {}
                Err(e) => return Err(Error::Publish(e.to_string())),
            }
        }

        info!("Published {} to topic {}", RESET_PAYLOAD, self.topic);
        Ok(())
    }
}

// ---

/// Split a broker URL into host and port.
fn parse_broker_addr(url: &str) -> Result<(String, u16)> {
    // ---
    if url.starts_with("mqtts://") {
        return Err(Error::validation("TLS MQTT brokers are not supported"));
    }
    let stripped = url.strip_prefix("mqtt://").unwrap_or(url);
    if stripped.is_empty() {
        return Err(Error::validation("MQTT broker URL must not be empty"));
    }

    match stripped.split_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| Error::validation(format!("invalid MQTT broker port: {port}")))?;
            Ok((host.to_string(), port))
        }
        None => Ok((stripped.to_string(), 1883)),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn parses_full_broker_url() {
        // ---
        let (host, port) = parse_broker_addr("mqtt://raspi:1883").unwrap();
        assert_eq!(host, "raspi");
        assert_eq!(port, 1883);
    }

    #[test]
    fn defaults_port_when_missing() {
        // ---
        let (host, port) = parse_broker_addr("localhost").unwrap();
        assert_eq!(host, "localhost");
        assert_eq!(port, 1883);
    }

    #[test]
    fn rejects_tls_scheme_and_bad_port() {
        // ---
        assert!(parse_broker_addr("mqtts://broker:8883").is_err());
        assert!(parse_broker_addr("mqtt://broker:notaport").is_err());
        assert!(parse_broker_addr("").is_err());
    }
}
