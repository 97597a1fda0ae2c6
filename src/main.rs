use clap::Parser;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use relayed::server::{Server, DNS_PORT};
use relayed::zones::Zone;

fn begin_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

// the doc comments for this struct turn into the CLI help text
#[derive(Debug, Clone, Parser)]
/// An authoritative DNS server for a fixed record set, with
/// forwarding.
///
/// Queries for names listed in the zone file are answered
/// authoritatively from it; every other query is relayed, byte for
/// byte, to the upstream nameserver, and the upstream's replies are
/// relayed back to whoever asked.
///
/// Reload the zone file by restarting the server.
struct Args {
    /// Path to the zone file to serve
    #[clap(short, long, value_parser)]
    zone_file: PathBuf,

    /// Interface to listen on
    #[clap(short, long, value_parser, default_value_t = Ipv4Addr::UNSPECIFIED)]
    interface: Ipv4Addr,

    /// Upstream nameserver to forward unanswerable queries to
    #[clap(short, long, value_parser)]
    upstream: Ipv4Addr,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    begin_logging();

    let zone = match Zone::from_file(&args.zone_file).await {
        Ok(zone) => {
            tracing::info!(path = ?args.zone_file, records = %zone.len(), "loaded zone file");
            zone
        }
        Err(error) => {
            // keep going with an empty record set: every query gets
            // forwarded
            tracing::warn!(path = ?args.zone_file, ?error, "could not read zone file");
            Zone::new()
        }
    };

    tracing::info!(interface = %args.interface, port = %DNS_PORT, upstream = %args.upstream, "binding DNS UDP sockets");
    let server = match Server::setup(args.interface, args.upstream, zone).await {
        Ok(server) => server,
        Err(error) => {
            tracing::error!(?error, "could not set up sockets");
            process::exit(1);
        }
    };

    if let Err(error) = server.run().await {
        tracing::error!(?error, "fatal socket error");
        process::exit(1);
    }
}
