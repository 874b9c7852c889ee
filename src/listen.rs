//! `listen` command: print the announcements of other devices.

use std::io;

use anyhow::{Context, Result};
use fmd::{Config, Message, Received, SenderStreams, multicast_config};
use tokio::time;
use tracing::{debug, info, warn};

use crate::shutdown;

/// Largest UDP payload.
const MAX_DATAGRAM: usize = 65536;

/// Advertisement intervals without a datagram before a sender is evicted.
const IDLE_INTERVALS: u32 = 4;

pub async fn run(config: Config) -> Result<()> {
    config.general.validate()?;

    let mux = fmd_multicast::listen(&multicast_config(&config.general))
        .await
        .context("Failed to open multicast listeners")?;

    println!("Listen for device announcements");
    println!("===============================");
    println!();
    for endpoint in mux.endpoints() {
        match endpoint.local_addr() {
            Ok(local) => println!("Receiving {} on {}", endpoint.remote_addr(), local),
            Err(_) => println!("Receiving {}", endpoint.remote_addr()),
        }
    }
    println!();

    mux.start();

    let (mut streams, mut messages) = SenderStreams::new();
    let mut buf = vec![0u8; MAX_DATAGRAM];

    let idle = config.advertise.interval() * IDLE_INTERVALS;
    let mut sweep = time::interval(idle);

    let deadline = async {
        match config.listen.timeout() {
            Some(timeout) => time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };
    let shutdown = shutdown::signal();
    tokio::pin!(deadline, shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = &mut deadline => {
                info!("Listen timeout reached");
                break;
            }
            Some(received) = messages.recv() => print_message(&received),
            _ = sweep.tick() => {
                let evicted = streams.evict_idle(idle);
                if evicted > 0 {
                    debug!("Evicted {} idle sender(s)", evicted);
                }
            }
            event = mux.read() => {
                let Some(event) = event else {
                    break;
                };

                if let Err(e) = &event.result {
                    warn!(remote = %event.endpoint.remote_addr(), "Stopped receiving: {}", e);
                    continue;
                }

                loop {
                    match event.endpoint.try_recv_from(&mut buf) {
                        Ok((n, sender)) => streams.push(sender, buf[..n].to_vec()),
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) => {
                            warn!(remote = %event.endpoint.remote_addr(), "Receive failed: {}", e);
                            break;
                        }
                    }
                }
            }
        }
    }

    debug!("Heard from {} sender(s)", streams.len());
    mux.close().context("Failed to close multicast listeners")?;
    Ok(())
}

fn print_message(received: &Received) {
    match &received.message {
        Message::DeviceAdvertisement(advertisement) => {
            print!(
                "{}: device \"{}\" on host \"{}\"",
                received.sender, advertisement.device_name, advertisement.host_name
            );
            if advertisement.group.is_empty() {
                println!();
            } else {
                println!(" in group \"{}\"", advertisement.group);
            }
        }
        Message::DeviceInformation(information) => {
            println!(
                "{}: device \"{}\" on host \"{}\" ({}, {} interface(s))",
                received.sender,
                information.device_name,
                information.host_name,
                information.operating_system,
                information.network_interfaces.len()
            );
        }
        Message::ClientRequest(request) => {
            println!(
                "{}: request \"{}\" {:?}",
                received.sender, request.request, request.parameters
            );
        }
    }
}
