//! `advertise` command: periodic device announcements.

use anyhow::{Context, Result};
use fmd::{Config, DatagramWriter, Message, Multiplexer, device, multicast_config};
use tokio::time;
use tracing::{info, warn};

use crate::shutdown;

pub async fn run(config: Config) -> Result<()> {
    print_header(&config);

    if !config.advertise.multicast {
        println!("Advertisement multicasts are disabled, nothing to do.");
        return Ok(());
    }

    config.general.validate()?;

    let mux = fmd_multicast::dial(&multicast_config(&config.general))
        .await
        .context("Failed to open multicast endpoints")?;

    println!();
    for endpoint in mux.endpoints() {
        println!(
            "Advertisement multicasts will be sent to {}",
            endpoint.remote_addr()
        );
    }
    println!();

    let mut writer = DatagramWriter::new();
    let mut ticker = time::interval(config.advertise.interval());
    let shutdown = shutdown::signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                info!("Sending advertisement multicast");
                let message = Message::from(device::advertisement(&config.advertise));
                send(&mux, &mut writer, &message).await;
            }
        }
    }

    // Terminate the stream so listeners see a complete gzip member.
    let trailer = writer
        .finish()
        .context("Failed to finish message stream")?;
    if !trailer.is_empty() {
        if let Err(e) = mux.write(&trailer).await {
            warn!("Failed to send stream trailer: {}", e);
        }
    }

    mux.close().context("Failed to close multicast endpoints")?;
    Ok(())
}

async fn send(mux: &Multiplexer, writer: &mut DatagramWriter, message: &Message) {
    let datagram = match writer.encode(message) {
        Ok(datagram) => datagram,
        Err(e) => {
            warn!("Failed to encode advertisement: {}", e);
            return;
        }
    };

    if let Err(e) = mux.write(&datagram).await {
        warn!("{}", e);
    }
}

fn print_header(config: &Config) {
    println!("Advertise device information");
    println!("============================");
    println!();
    println!(
        " - IPv4 multicast address for local network communication: {}",
        config.general.multicast_ip4
    );
    println!(
        " - IPv6 multicast address for local network communication: {}",
        config.general.multicast_ip6
    );
    if !config.general.interface_ip6.is_empty() {
        println!(
            " - Network interfaces for IPv6 multicast: {}",
            config.general.interface_ip6.join(", ")
        );
    }
    println!(
        " - UDP port for local network communication: {}",
        config.general.port
    );
    println!(
        " - Send advertisement multicasts on the local network: {}",
        config.advertise.multicast
    );
    println!(
        " - Seconds between advertisements: {}s",
        config.advertise.interval().as_secs()
    );
}
