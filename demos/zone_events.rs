//! Example: Poll status and print zone flag changes.

use std::time::Duration;

use intelbras_amt::{AmtClient, ClientConfig, ClientEvent, MacAddress, ZoneFlags};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ClientConfig::builder()
        .mac(MacAddress::parse("00:1a:3f:f1:4c:c6")?)
        .password("1234")
        .build();

    let client = AmtClient::new(config)?;
    let runner = client.clone();
    tokio::spawn(async move { runner.run().await });

    let mut events = client.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    let mut previous: Vec<ZoneFlags> = Vec::new();

    println!("Watching zones (Ctrl+C to stop)...\n");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = match client.status().await {
                    Ok(status) => status,
                    Err(e) => {
                        println!("Status failed: {}", e);
                        continue;
                    }
                };
                for zone in &status.zones {
                    let old = previous
                        .get(zone.number as usize - 1)
                        .copied()
                        .unwrap_or_else(ZoneFlags::empty);
                    let changed = ZoneFlags::changed(old, zone.flags);
                    if changed.is_empty() {
                        continue;
                    }
                    println!("Zone {} changed:", zone.number);
                    for name in (changed & zone.flags).names() {
                        println!("  + {}", name);
                    }
                    for name in (changed - zone.flags).names() {
                        println!("  - {}", name);
                    }
                }
                previous = status.zones.iter().map(|z| z.flags).collect();
            }
            event = events.recv() => {
                match event {
                    Ok(ClientEvent::StateChanged(state)) => println!("Connection: {}", state),
                    Ok(ClientEvent::Frame(frame)) => println!("Frame: {}", frame),
                    Err(e) => println!("Event channel error: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nDisconnecting...");
                break;
            }
        }
    }

    client.shutdown();
    Ok(())
}
