//! Example: Print zone changes, skipping the snapshot sent after login.

use envisalink_tpi::{TpiClient, TpiConfig, TpiEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = TpiConfig::builder()
        .host("192.168.0.50")
        .password("user")
        .zones(16)
        .partitions(1)
        .build();

    let client = TpiClient::with_builtin_table(config)?;
    let mut events = client.subscribe();
    client.connect().await?;

    println!("Listening for zone events (Ctrl+C to stop)...\n");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(TpiEvent::ZoneUpdate(u)) if !u.initial_update => {
                        println!("Zone {} -> {} ({})", u.zone, u.status, u.code);
                    }
                    Ok(TpiEvent::Disconnected) => {
                        println!("Panel disconnected!");
                        return Ok(());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        println!("Event channel error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nDisconnecting...");
                break;
            }
        }
    }

    client.disconnect().await?;
    Ok(())
}
