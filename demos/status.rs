//! Example: Connect to an AMT panel and print its names and status.

use intelbras_amt::{AmtClient, ClientConfig, MacAddress};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ClientConfig::builder()
        .host("amt.intelbras.com.br")
        .mac(MacAddress::parse("00:1a:3f:f1:4c:c6")?)
        .password("1234")
        .build();

    let client = AmtClient::new(config)?;
    let runner = client.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    println!("Panel: {}", client.panel_name().await?);

    let names = client.zone_names().await?;
    let status = client.status().await?;

    println!(
        "\nState: {}  (firmware {}, partitioned={})",
        status.alarm_state(),
        status.version,
        status.partitioned,
    );
    println!(
        "Battery level {} blinking={}  AC lost={}  PGM={}",
        status.battery.level(),
        status.battery.is_blinking(),
        status.ac_power_lost,
        status.pgm,
    );

    println!("\n--- Zones ---");
    for zone in status.zones.iter().filter(|z| z.is_enabled()) {
        let name = names.get(zone.number as usize - 1).map(String::as_str).unwrap_or("");
        println!(
            "  Zone {:2}: {:16} open={} violated={} bypassed={} stay={}",
            zone.number,
            name,
            zone.is_open(),
            zone.is_violated(),
            zone.is_annulled(),
            zone.is_stay(),
        );
    }

    client.shutdown();
    handle.await??;
    Ok(())
}
