//! nowind-host: serves a disk image to an MSX over a Nowind interface.
//!
//! Usage: `nowind-host [PORT|auto] [IMAGE.dsk]`
//!
//! Without an image a blank 720 KB disk is served. Log verbosity follows
//! `RUST_LOG`.

use std::sync::Arc;

use nowind::{
    HostConfig, MemoryDiskImage, NowindHost, SerialConfig, SerialTransport, TracingSink,
};

#[tokio::main]
async fn main() -> nowind::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let port = args.next().filter(|p| p != "auto").unwrap_or_default();
    let disk = match args.next() {
        Some(path) => MemoryDiskImage::open(path).await?,
        None => {
            tracing::info!("no image given, serving a blank disk");
            MemoryDiskImage::default()
        }
    };

    let host = NowindHost::new(HostConfig::default(), disk);
    host.events().add_sink(Arc::new(TracingSink));

    let config = if port.is_empty() {
        SerialConfig::auto_detect()
    } else {
        SerialConfig::new(port)
    };
    tracing::info!("nowind-host starting");

    let mut transport = SerialTransport::new(config);
    host.run(&mut transport).await;
    Ok(())
}
