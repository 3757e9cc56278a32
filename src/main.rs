// MIT License - Copyright (c) 2026 Peter Wright
// MQTT bridge

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info, warn};

use envisalink_tpi::{CommandTable, TpiClient, TpiConfig, TpiEvent};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "envisalink2mqtt")]
#[command(about = "Bridge between an EnvisaLink TPI module and MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    panel: PanelToml,
    mqtt: MqttToml,
    #[serde(default, deserialize_with = "deserialize_zone_names")]
    zone_names: HashMap<u32, String>,
}

fn deserialize_zone_names<'de, D>(deserializer: D) -> Result<HashMap<u32, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let string_map: HashMap<String, String> = HashMap::deserialize(deserializer)?;
    string_map
        .into_iter()
        .map(|(k, v)| {
            k.parse::<u32>()
                .map(|id| (id, v))
                .map_err(|_| serde::de::Error::custom(format!("invalid zone ID: {k}")))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct PanelToml {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    password: String,
    zones: u32,
    partitions: u32,
    /// Optional path to a TOML command table; the bundled table is used otherwise.
    #[serde(default)]
    command_table: Option<String>,
    #[serde(default = "default_reconnect_delay")]
    reconnect_delay_ms: u64,
    #[serde(default = "default_disconnect_timeout")]
    disconnect_timeout_ms: u64,
}

fn default_port() -> u16 {
    4025
}
fn default_reconnect_delay() -> u64 {
    10000
}
fn default_disconnect_timeout() -> u64 {
    10000
}

#[derive(Debug, Deserialize)]
struct MqttToml {
    url: String,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default = "default_subscribe_topic")]
    subscribe_topic: String,
    #[serde(default = "default_publish_topic")]
    publish_topic: String,
}

fn default_client_id() -> String {
    "envisalink-bridge".to_string()
}
fn default_subscribe_topic() -> String {
    "envisalink/cmd".to_string()
}
fn default_publish_topic() -> String {
    "envisalink".to_string()
}

fn build_tpi_config(toml: &PanelToml) -> TpiConfig {
    TpiConfig::builder()
        .host(&toml.host)
        .port(toml.port)
        .password(&toml.password)
        .zones(toml.zones)
        .partitions(toml.partitions)
        .disconnect_timeout_ms(toml.disconnect_timeout_ms)
        .build()
}

fn load_command_table(toml: &PanelToml) -> Result<CommandTable> {
    match &toml.command_table {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read command table {path}"))?;
            CommandTable::from_toml_str(&text)
                .with_context(|| format!("Failed to parse command table {path}"))
        }
        None => CommandTable::builtin().context("Failed to load bundled command table"),
    }
}

// ---------------------------------------------------------------------------
// MQTT JSON types
// ---------------------------------------------------------------------------

// Published updates: {now, op, payload} where payload is the update without initialUpdate
#[derive(Serialize)]
struct MqttUpdate {
    now: u64,
    op: &'static str,
    payload: serde_json::Value,
}

// CMD_ACK response
#[derive(Serialize)]
struct MqttCmdAck {
    now: u64,
    op: &'static str,
    success: bool,
    command: String,
}

// Inbound command (subscribed)
#[derive(Deserialize)]
struct MqttCommand {
    command: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn now_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

async fn publish_json(client: &AsyncClient, topic: &str, payload: &impl Serialize) {
    match serde_json::to_string(payload) {
        Ok(json) => {
            if let Err(e) = client.publish(topic, QoS::AtLeastOnce, false, json).await {
                error!("Failed to publish to {topic}: {e}");
            }
        }
        Err(e) => error!("Failed to serialize MQTT payload: {e}"),
    }
}

/// Build the MQTT message for an update event.
///
/// Initial updates (the state dump after login) are not forwarded.
fn update_message(event: &TpiEvent, zone_names: &HashMap<u32, String>) -> Option<MqttUpdate> {
    if event.is_initial_update() {
        return None;
    }
    let (op, mut payload) = match event {
        TpiEvent::ZoneUpdate(u) => ("zone event", serde_json::to_value(u).ok()?),
        TpiEvent::PartitionUpdate(u) => ("partition event", serde_json::to_value(u).ok()?),
        TpiEvent::PartitionUserUpdate(u) => {
            ("partition user event", serde_json::to_value(u).ok()?)
        }
        TpiEvent::SystemUpdate(u) => ("system event", serde_json::to_value(u).ok()?),
        _ => return None,
    };
    if let Some(fields) = payload.as_object_mut() {
        fields.remove("initialUpdate");
        if let TpiEvent::ZoneUpdate(u) = event
            && let Some(name) = zone_names.get(&u.zone)
        {
            fields.insert("name".to_string(), serde_json::Value::from(name.clone()));
        }
    }
    Some(MqttUpdate {
        now: now_epoch_ms(),
        op,
        payload,
    })
}

/// A TPI command is a 3-digit code plus an optional printable payload.
fn is_valid_command(command: &str) -> bool {
    command.len() >= 3
        && command.bytes().take(3).all(|b| b.is_ascii_digit())
        && command.bytes().all(|b| b.is_ascii_graphic())
}

async fn handle_command(
    payload: &str,
    tpi: &TpiClient,
    client: &AsyncClient,
    topic: &str,
) {
    let cmd = match serde_json::from_str::<MqttCommand>(payload) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!("Failed to parse MQTT command: {e}");
            return;
        }
    };

    let success = if !is_valid_command(&cmd.command) {
        warn!("Rejecting malformed TPI command {:?}", cmd.command);
        false
    } else {
        match tpi.send_command(&cmd.command).await {
            Ok(()) => true,
            Err(e) => {
                error!("Command {} failed: {e}", cmd.command);
                false
            }
        }
    };

    let ack = MqttCmdAck {
        now: now_epoch_ms(),
        op: "CMD_ACK",
        success,
        command: cmd.command,
    };
    publish_json(client, topic, &ack).await;
}

/// Reconnect until it succeeds, backing off exponentially up to 16x the base delay.
async fn reconnect(tpi: &TpiClient, base_delay_ms: u64) {
    let mut attempt: u32 = 0;
    loop {
        let delay_ms = base_delay_ms * (1u64 << attempt.min(4));
        info!(
            "Reconnecting to EnvisaLink in {:.1}s (attempt {})...",
            delay_ms as f64 / 1000.0,
            attempt + 1
        );
        sleep(Duration::from_millis(delay_ms)).await;
        attempt += 1;

        match tpi.connect().await {
            Ok(()) => {
                info!("EnvisaLink socket reopened");
                return;
            }
            Err(e) if e.is_retryable() => warn!("Reconnection error: {e}"),
            Err(e) => {
                // AlreadyConnected: someone else got there first
                debug!("Reconnection skipped: {e}");
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=envisalink_tpi=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    let config_text =
        std::fs::read_to_string(&cli.config).context("Failed to read config file")?;
    let config: Config = toml::from_str(&config_text).context("Failed to parse config file")?;

    let tpi_config = build_tpi_config(&config.panel);
    tpi_config.validate().context("Invalid panel configuration")?;
    let table = load_command_table(&config.panel)?;
    info!("Loaded {} command codes", table.len());

    let reconnect_delay_ms = config.panel.reconnect_delay_ms;
    let zone_names = Arc::new(config.zone_names);
    let publish_topic = config.mqtt.publish_topic;
    let subscribe_topic = config.mqtt.subscribe_topic;
    let (mqtt_host, mqtt_port) = parse_mqtt_url(&config.mqtt.url)?;

    let tpi = Arc::new(TpiClient::new(tpi_config, table));
    let event_rx = tpi.subscribe();

    info!(
        "Connecting to EnvisaLink at {}:{}",
        config.panel.host, config.panel.port
    );
    if let Err(e) = tpi.connect().await {
        warn!("Initial connection failed: {e}");
        reconnect(&tpi, reconnect_delay_ms).await;
    }

    // Set up MQTT
    let mut mqtt_opts = MqttOptions::new(&config.mqtt.client_id, &mqtt_host, mqtt_port);
    mqtt_opts.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(mqtt_opts, 256);

    // Task 1: TPI event listener
    let tpi_events = Arc::clone(&tpi);
    let client_events = client.clone();
    let topic_events = publish_topic.clone();
    let zn_events = Arc::clone(&zone_names);
    let event_handle = tokio::spawn(async move {
        let mut rx = event_rx;
        loop {
            match rx.recv().await {
                Ok(TpiEvent::Connected) => info!("Logged in to EnvisaLink"),
                Ok(TpiEvent::Disconnected | TpiEvent::Error(_)) => {
                    if !tpi_events.is_connected().await {
                        warn!("EnvisaLink disconnected, will attempt reconnection");
                        reconnect(&tpi_events, reconnect_delay_ms).await;
                    }
                }
                Ok(event) => {
                    if let Some(msg) = update_message(&event, &zn_events) {
                        publish_json(&client_events, &topic_events, &msg).await;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("Event receiver lagged, missed {n} events");
                }
                Err(RecvError::Closed) => {
                    info!("Event channel closed");
                    break;
                }
            }
        }
    });

    // Task 2: MQTT event loop (receives messages, handles commands)
    let tpi_cmds = Arc::clone(&tpi);
    let client_cmds = client.clone();
    let topic_cmds = publish_topic.clone();
    let sub_topic = subscribe_topic.clone();
    let mqtt_handle = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // rumqttc does not resubscribe after a broker reconnect
                    info!("MQTT: connected, subscribing to {sub_topic}");
                    if let Err(e) = client_cmds.subscribe(&sub_topic, QoS::AtLeastOnce).await {
                        error!("Failed to subscribe to {sub_topic}: {e}");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    if msg.topic == sub_topic {
                        let payload = String::from_utf8_lossy(&msg.payload);
                        info!("MQTT command received: {payload}");
                        handle_command(&payload, &tpi_cmds, &client_cmds, &topic_cmds).await;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT event loop error: {e}");
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    info!("MQTT bridge running. Send SIGINT/SIGTERM to stop.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down..."),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
    }

    event_handle.abort();
    mqtt_handle.abort();

    match tpi.disconnect().await {
        Ok(status) => debug!("Disconnect: {status:?}"),
        Err(e) => warn!("Error disconnecting: {e}"),
    }

    info!("Shutdown complete");
    Ok(())
}

/// Parse an MQTT URL like "mqtt://host:port" into (host, port).
fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port_str) = stripped
        .rsplit_once(':')
        .context("MQTT URL must be in format mqtt://host:port")?;

    let port: u16 = port_str.parse().context("Invalid MQTT port number")?;

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use envisalink_tpi::{SystemUpdate, ZoneUpdate};

    fn zone_event(initial_update: bool) -> TpiEvent {
        TpiEvent::ZoneUpdate(ZoneUpdate {
            zone: 4,
            code: "609".to_string(),
            status: "Zone Open".to_string(),
            initial_update,
        })
    }

    #[test]
    fn test_parse_mqtt_url() {
        assert_eq!(
            parse_mqtt_url("mqtt://broker:1883").unwrap(),
            ("broker".to_string(), 1883)
        );
        assert_eq!(
            parse_mqtt_url("10.0.0.2:8883").unwrap(),
            ("10.0.0.2".to_string(), 8883)
        );
        assert!(parse_mqtt_url("mqtt://broker").is_err());
    }

    #[test]
    fn test_initial_updates_not_forwarded() {
        assert!(update_message(&zone_event(true), &HashMap::new()).is_none());
        assert!(update_message(&TpiEvent::Connected, &HashMap::new()).is_none());
    }

    #[test]
    fn test_zone_message_shape() {
        let names = HashMap::from([(4, "Back Door".to_string())]);
        let msg = update_message(&zone_event(false), &names).unwrap();
        assert_eq!(msg.op, "zone event");
        assert_eq!(
            msg.payload,
            serde_json::json!({
                "zone": 4,
                "code": "609",
                "status": "Zone Open",
                "name": "Back Door",
            })
        );
    }

    #[test]
    fn test_system_message_forwarded() {
        let event = TpiEvent::SystemUpdate(SystemUpdate {
            code: "849".to_string(),
            status: "Verbose Trouble Status".to_string(),
        });
        let msg = update_message(&event, &HashMap::new()).unwrap();
        assert_eq!(msg.op, "system event");
        assert_eq!(msg.payload["code"], "849");
    }

    #[test]
    fn test_command_validation() {
        assert!(is_valid_command("001"));
        assert!(is_valid_command("0301"));
        assert!(is_valid_command("071*1#"));
        assert!(!is_valid_command("01"));
        assert!(!is_valid_command("abc"));
        assert!(!is_valid_command("030 1"));
        assert!(!is_valid_command("0301\r\n"));
    }

    #[test]
    fn test_config_parses_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [panel]
            host = "192.168.0.50"
            password = "user"
            zones = 16
            partitions = 1

            [mqtt]
            url = "mqtt://localhost:1883"

            [zone_names]
            "1" = "Front Door"
            "#,
        )
        .unwrap();

        assert_eq!(config.panel.port, 4025);
        assert_eq!(config.panel.reconnect_delay_ms, 10000);
        assert!(config.panel.command_table.is_none());
        assert_eq!(config.mqtt.publish_topic, "envisalink");
        assert_eq!(config.zone_names.get(&1).map(String::as_str), Some("Front Door"));

        let tpi = build_tpi_config(&config.panel);
        assert_eq!(tpi.address(), "192.168.0.50:4025");
        assert!(tpi.validate().is_ok());
    }
}
