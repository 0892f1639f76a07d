// MIT License - Copyright (c) 2026 Peter Wright
// AMT command-line client

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use intelbras_amt::{AmtClient, AmtError, ArmType, ClientConfig, MacAddress, Status};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "amtctl")]
#[command(about = "Query and control an Intelbras AMT alarm panel")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "amt.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the decoded panel status
    Status,
    /// Print names stored in the panel
    Names {
        #[arg(value_enum)]
        table: NameTable,
    },
    /// Arm the panel (away unless --stay)
    Arm {
        #[arg(long)]
        stay: bool,
        /// Access code; defaults to the configured password
        #[arg(long)]
        code: Option<String>,
    },
    /// Disarm the panel
    Disarm {
        #[arg(long)]
        code: Option<String>,
    },
    /// Trigger a panic alarm
    Panic {
        #[arg(long)]
        silent: bool,
        #[arg(long)]
        code: Option<String>,
    },
    /// Switch the PGM output
    Pgm {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Bypass exactly the given zones; no zones clears every bypass
    Bypass { zones: Vec<u8> },
    /// Poll status and print one JSON line per poll
    Watch {
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum NameTable {
    Panel,
    Zones,
    Users,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    panel: PanelToml,
}

#[derive(Debug, Deserialize)]
struct PanelToml {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    mac: String,
    password: String,
    #[serde(default = "default_connect_timeout")]
    connect_timeout_ms: u64,
    #[serde(default = "default_handshake_timeout")]
    handshake_timeout_ms: u64,
    #[serde(default = "default_reconnect_delay")]
    reconnect_delay_ms: u64,
    #[serde(default = "default_request_timeout")]
    request_timeout_ms: u64,
    #[serde(default = "default_true")]
    negotiate_session_key: bool,
    #[serde(default)]
    decrypt_inbound: bool,
    #[serde(default = "default_pgm_status_bit")]
    pgm_status_bit: u8,
}

fn default_host() -> String {
    intelbras_amt::config::DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    intelbras_amt::config::DEFAULT_PORT
}
fn default_connect_timeout() -> u64 {
    5000
}
fn default_handshake_timeout() -> u64 {
    10000
}
fn default_reconnect_delay() -> u64 {
    5000
}
fn default_request_timeout() -> u64 {
    10000
}
fn default_true() -> bool {
    true
}
fn default_pgm_status_bit() -> u8 {
    intelbras_amt::constants::PGM_STATUS_BIT
}

fn build_client_config(panel: &PanelToml) -> Result<ClientConfig> {
    let mac = MacAddress::parse(&panel.mac).context("Invalid panel.mac")?;
    if panel.pgm_status_bit > 7 {
        bail!("panel.pgm_status_bit must be 0-7, got {}", panel.pgm_status_bit);
    }
    Ok(ClientConfig::builder()
        .host(&panel.host)
        .port(panel.port)
        .mac(mac)
        .password(&panel.password)
        .connect_timeout_ms(panel.connect_timeout_ms)
        .handshake_timeout_ms(panel.handshake_timeout_ms)
        .reconnect_delay_ms(panel.reconnect_delay_ms)
        .request_timeout_ms(panel.request_timeout_ms)
        .negotiate_session_key(panel.negotiate_session_key)
        .decrypt_inbound(panel.decrypt_inbound)
        .pgm_status_bit(panel.pgm_status_bit)
        .build())
}

// ---------------------------------------------------------------------------
// JSON output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct StatusReport {
    now: u64,
    state: String,
    version: u8,
    partitioned: bool,
    #[serde(rename = "partitionAArmed")]
    partition_a_armed: bool,
    #[serde(rename = "partitionBArmed")]
    partition_b_armed: bool,
    #[serde(rename = "sirenTriggered")]
    siren_triggered: bool,
    pgm: bool,
    #[serde(rename = "acPowerLost")]
    ac_power_lost: bool,
    battery: BatteryReport,
    zones: Vec<ZoneReport>,
}

#[derive(Serialize)]
struct BatteryReport {
    level: u8,
    outline: bool,
    blinking: bool,
}

#[derive(Serialize)]
struct ZoneReport {
    id: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    open: bool,
    violated: bool,
    annulled: bool,
    stay: bool,
    enabled: bool,
    #[serde(rename = "lowBattery")]
    low_battery: bool,
}

#[derive(Serialize)]
struct NamesReport {
    now: u64,
    table: String,
    names: Vec<String>,
}

// {now, op, success}
#[derive(Serialize)]
struct CommandAck {
    now: u64,
    op: String,
    success: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn now_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

fn status_report(status: &Status, zone_names: &[String]) -> StatusReport {
    StatusReport {
        now: now_epoch_ms(),
        state: status.alarm_state().to_string(),
        version: status.version,
        partitioned: status.partitioned,
        partition_a_armed: status.partition_a_armed,
        partition_b_armed: status.partition_b_armed,
        siren_triggered: status.siren_triggered,
        pgm: status.pgm,
        ac_power_lost: status.ac_power_lost,
        battery: BatteryReport {
            level: status.battery.level(),
            outline: status.battery.contains(intelbras_amt::BatteryFlags::OUTLINE),
            blinking: status.battery.is_blinking(),
        },
        zones: status
            .zones
            .iter()
            .map(|zone| ZoneReport {
                id: zone.number,
                name: zone_names
                    .get(zone.number as usize - 1)
                    .filter(|name| !name.is_empty())
                    .cloned(),
                open: zone.is_open(),
                violated: zone.is_violated(),
                annulled: zone.is_annulled(),
                stay: zone.is_stay(),
                enabled: zone.is_enabled(),
                low_battery: zone.is_low_battery(),
            })
            .collect(),
    }
}

fn print_json(payload: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string(payload).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn print_ack(op: &str) -> Result<()> {
    print_json(&CommandAck {
        now: now_epoch_ms(),
        op: op.to_string(),
        success: true,
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn execute(client: &AmtClient, command: Command, password: &str) -> Result<()> {
    match command {
        Command::Status => {
            let status = client.status().await.context("Status request failed")?;
            print_json(&status_report(&status, &[]))
        }
        Command::Names { table } => {
            let (label, names) = match table {
                NameTable::Panel => ("panel", vec![client.panel_name().await?]),
                NameTable::Zones => ("zones", client.zone_names().await?),
                NameTable::Users => ("users", client.user_names().await?),
            };
            print_json(&NamesReport {
                now: now_epoch_ms(),
                table: label.to_string(),
                names,
            })
        }
        Command::Arm { stay, code } => {
            let arm_type = if stay { ArmType::Stay } else { ArmType::Away };
            match client.arm(code.as_deref().unwrap_or(password), arm_type).await {
                Ok(()) => print_ack(if stay { "ARM_STAY" } else { "ARM_AWAY" }),
                Err(AmtError::OpenZone) => bail!("Cannot arm: an enabled zone is open"),
                Err(e) => Err(e).context("Arm failed"),
            }
        }
        Command::Disarm { code } => {
            client
                .disarm(code.as_deref().unwrap_or(password))
                .await
                .context("Disarm failed")?;
            print_ack("DISARM")
        }
        Command::Panic { silent, code } => {
            client
                .panic(code.as_deref().unwrap_or(password), silent)
                .await
                .context("Panic failed")?;
            print_ack(if silent { "PANIC_SILENT" } else { "PANIC_AUDIBLE" })
        }
        Command::Pgm { state } => {
            let enable = matches!(state, Switch::On);
            client.pgm(enable).await.context("PGM request failed")?;
            print_ack(if enable { "PGM_ON" } else { "PGM_OFF" })
        }
        Command::Bypass { zones } => {
            client.bypass(&zones).await.context("Bypass failed")?;
            print_ack("BYPASS")
        }
        Command::Watch { interval_secs } => watch(client, interval_secs).await,
    }
}

/// Poll status until SIGINT/SIGTERM, like a 5 s coordinator would.
async fn watch(client: &AmtClient, interval_secs: u64) -> Result<()> {
    let zone_names = match client.zone_names().await {
        Ok(names) => names,
        Err(e) => {
            warn!("Cannot fetch zone names: {e}");
            Vec::new()
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match client.status().await {
                    Ok(status) => print_json(&status_report(&status, &zone_names))?,
                    Err(e) => warn!("Status poll failed: {e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                return Ok(());
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, stopping");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=intelbras_amt=trace). Default: info.
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
    let client_config = build_client_config(&config.panel)?;
    let password = client_config.password.clone();

    let client = AmtClient::new(client_config).context("Invalid panel configuration")?;
    let runner = {
        let client = client.clone();
        tokio::spawn(async move { client.run().await })
    };

    let outcome = execute(&client, cli.command, &password).await;

    client.shutdown();
    match runner.await {
        Ok(Ok(())) => debug!("Connection closed"),
        Ok(Err(e)) => warn!("Connection manager error: {e}"),
        Err(e) => warn!("Connection task failed: {e}"),
    }

    outcome
}
