//! The event loop: a single task multiplexing the local socket
//! (queries in, replies out) and the connected upstream socket
//! (relayed queries out, upstream replies in).

use bytes::BytesMut;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::interval;

use crate::forward::ForwardTable;
use crate::protocol::deserialise::ConsumableBuffer;
use crate::protocol::types::{Header, Message};
use crate::resolver::build_reply;
use crate::zones::Zone;

pub const DNS_PORT: u16 = 53;

/// Incoming datagrams are read into a buffer this large; the kernel
/// discards anything beyond it.
const RECV_BUFFER_SIZE: usize = 1024;

/// Outgoing replies must fit a standard UDP payload; larger ones are
/// truncated with TC set.
const MAX_RESPONSE_SIZE: usize = 512;

/// Everything the event loop owns: both sockets, the record set, and
/// the in-flight forwarded queries.
pub struct Server {
    local: UdpSocket,
    upstream: UdpSocket,
    zone: Zone,
    forward_table: ForwardTable,
}

impl Server {
    /// Bind the listening socket and connect the upstream socket,
    /// both on the DNS port.
    pub async fn setup(interface: Ipv4Addr, upstream: Ipv4Addr, zone: Zone) -> io::Result<Self> {
        let local = UdpSocket::bind((interface, DNS_PORT)).await?;
        let upstream_socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        upstream_socket.connect((upstream, DNS_PORT)).await?;

        Ok(Self {
            local,
            upstream: upstream_socket,
            zone,
            forward_table: ForwardTable::new(),
        })
    }

    /// Run until interrupted (clean shutdown) or the local socket
    /// fails.
    ///
    /// The upstream socket's receive errors are not fatal: a
    /// connected UDP socket surfaces ICMP unreachable errors as
    /// failed reads, and an unreachable upstream just means clients
    /// time out and retry.
    pub async fn run(mut self) -> io::Result<()> {
        let mut shutdown = signal(SignalKind::interrupt())?;
        let mut tick = interval(Duration::from_secs(1));
        let mut local_buf = [0u8; RECV_BUFFER_SIZE];
        let mut upstream_buf = [0u8; RECV_BUFFER_SIZE];

        loop {
            tokio::select! {
                result = self.local.recv_from(&mut local_buf) => {
                    let (size, client) = result?;
                    let dgram = BytesMut::from(&local_buf[..size]);
                    self.handle_query(dgram.as_ref(), client).await;
                }

                result = self.upstream.recv(&mut upstream_buf) => match result {
                    Ok(size) => {
                        let dgram = BytesMut::from(&upstream_buf[..size]);
                        self.handle_upstream_reply(dgram.as_ref()).await;
                    }
                    Err(error) => tracing::debug!(?error, "upstream recv error"),
                },

                _ = tick.tick() => self.forward_table.expire_stale(),

                _ = shutdown.recv() => {
                    tracing::info!("shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// A datagram arrived on the local socket: answer it from the
    /// record set, or register it and relay the raw bytes upstream.
    async fn handle_query(&mut self, dgram: &[u8], client: SocketAddr) {
        let query = match Message::from_octets(dgram) {
            Ok(query) => query,
            Err(error) => {
                tracing::debug!(?client, ?error, "dropping malformed query");
                return;
            }
        };

        for question in &query.questions {
            tracing::debug!(
                ?client,
                id = %query.header.id,
                opcode = %query.header.opcode,
                %question,
                "query"
            );
        }

        match build_reply(&query, &self.zone) {
            Some(reply) => match reply.to_octets_capped(MAX_RESPONSE_SIZE) {
                Ok(serialised) => {
                    if let Err(error) = self.local.send_to(&serialised, client).await {
                        tracing::debug!(?client, ?error, "could not send reply");
                    }
                }
                Err(error) => tracing::warn!(?client, ?error, "could not serialise reply"),
            },
            None => {
                // remember who asked, so the upstream's reply can be
                // routed back
                self.forward_table.register(query.header.id, client);
                if let Err(error) = self.upstream.send(dgram).await {
                    tracing::debug!(?error, "could not relay query upstream");
                } else {
                    tracing::debug!(?client, id = %query.header.id, "relayed query upstream");
                }
            }
        }
    }

    /// A datagram arrived from the upstream resolver: only the header
    /// is decoded, to read the ID; the bytes are passed through to
    /// the original client untouched, compression and all.
    async fn handle_upstream_reply(&mut self, dgram: &[u8]) {
        let header = match Header::deserialise(&mut ConsumableBuffer::new(dgram)) {
            Ok(header) => header,
            Err(error) => {
                tracing::debug!(?error, "dropping malformed upstream reply");
                return;
            }
        };

        match self.forward_table.take_matching(header.id) {
            Some(client) => {
                if let Err(error) = self.local.send_to(dgram, client).await {
                    tracing::debug!(?client, ?error, "could not forward upstream reply");
                }
            }
            None => {
                tracing::debug!(
                    id = %header.id,
                    rcode = %header.rcode,
                    "upstream reply matches no outstanding query"
                );
            }
        }
    }
}
