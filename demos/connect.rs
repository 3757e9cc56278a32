//! Example: Log in to an EnvisaLink and print the initial status dump.

use envisalink_tpi::{TpiClient, TpiConfig, TpiEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = TpiConfig::builder()
        .host("192.168.0.50")
        .port(4025)
        .password("user")
        .zones(16)
        .partitions(1)
        .build();

    let client = TpiClient::with_builtin_table(config)?;
    let mut events = client.subscribe();

    println!("Connecting to EnvisaLink...");
    client.connect().await?;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(TpiEvent::Connected) => println!("Logged in"),
                    Ok(TpiEvent::ZoneUpdate(u)) => {
                        println!("  Zone {:3}: {}", u.zone, u.status);
                    }
                    Ok(TpiEvent::PartitionUpdate(u)) => match u.mode {
                        Some(mode) => println!("  Partition {}: {} ({})", u.partition, u.status, mode.as_str()),
                        None => println!("  Partition {}: {}", u.partition, u.status),
                    },
                    Ok(TpiEvent::SystemUpdate(u)) => println!("  System: {}", u.status),
                    Ok(TpiEvent::Disconnected) => {
                        println!("Disconnected by panel");
                        return Ok(());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        println!("Event channel error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("\nDisconnecting...");
    client.disconnect().await?;
    Ok(())
}
