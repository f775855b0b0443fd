//! The UDP listener and the per-packet dispatch pipeline.

use std::collections::HashSet;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context as _, Result};
use crossbeam_channel::{bounded, TrySendError};
use log::{error, warn};

use crate::logs::Sink;
use crate::rules::RuleTable;
use crate::snmp;
use crate::transmit::Transmitter;
use crate::wire::Endpoint;

/// Largest datagram accepted from the wire; longer traps are truncated
/// at receive.
pub const MAX_DATAGRAM: usize = 4096;

// Worker pool sizing: enough parallelism to ride out one slow collector,
// bounded so a trap storm degrades to counted drops rather than
// unbounded threads.
const WORKERS: usize = 4;
const QUEUE_DEPTH: usize = 256;

/// Everything a worker needs to handle one datagram.
pub struct Pipeline {
    pub rules: RuleTable,
    pub transmitter: Transmitter,
    pub data_log: Sink,
    pub log_traps: bool,
    pub log_bytes: bool,
}

struct Datagram {
    origin: SocketAddrV4,
    payload: Vec<u8>,
}

/// The bound listener plus its dispatch state.
pub struct Server {
    socket: UdpSocket,
    pipeline: Arc<Pipeline>,
    dropped: AtomicU64,
}

impl Server {
    /// Bind the listener on `0.0.0.0:<port>`.
    pub fn bind(port: u16, pipeline: Pipeline) -> io::Result<Server> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))?;
        Ok(Server {
            socket,
            pipeline: Arc::new(pipeline),
            dropped: AtomicU64::new(0),
        })
    }

    /// Local address of the bound listener. Callers binding port 0 read
    /// the assigned port from here.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive datagrams and feed the worker pool, forever.
    ///
    /// Returns only on a receive failure or a dead worker pool, both of
    /// which are fatal to the process. A full queue is not: the datagram
    /// is dropped and counted, which is all the backpressure UDP allows.
    pub fn run(&self) -> Result<()> {
        let (sender, receiver) = bounded::<Datagram>(QUEUE_DEPTH);
        for _ in 0..WORKERS {
            let receiver = receiver.clone();
            let pipeline = Arc::clone(&self.pipeline);
            thread::spawn(move || {
                while let Ok(datagram) = receiver.recv() {
                    handle_datagram(&pipeline, &datagram);
                }
            });
        }

        let mut buffer = [0u8; MAX_DATAGRAM];
        loop {
            let (len, addr) = self
                .socket
                .recv_from(&mut buffer)
                .context("listen failed on socket")?;
            let SocketAddr::V4(origin) = addr else {
                continue;
            };
            let datagram = Datagram {
                origin,
                payload: buffer[..len].to_vec(),
            };
            match sender.try_send(datagram) {
                Ok(()) => {}
                Err(TrySendError::Full(datagram)) => {
                    let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(
                        "worker queue full, dropped datagram from {} ({dropped} dropped so far)",
                        datagram.origin
                    );
                }
                Err(TrySendError::Disconnected(_)) => bail!("worker pool is gone"),
            }
        }
    }
}

// One worker invocation: look up destinations, log the trap if asked
// to, then send one copy per destination. Nothing here is allowed to
// take the process down.
fn handle_datagram(pipeline: &Pipeline, datagram: &Datagram) {
    let origin = Endpoint::from(datagram.origin);

    let dest = pipeline.rules.matches(origin.addr);
    if dest.is_empty() {
        warn!(
            "trap received from {} originates outside allowed subnets",
            origin.addr
        );
        return;
    }

    if pipeline.log_traps {
        log_trap(pipeline, origin, &dest, &datagram.payload);
    }

    for endpoint in &dest {
        if let Err(err) = pipeline
            .transmitter
            .send(origin, *endpoint, &datagram.payload)
        {
            error!("couldn't forward to {endpoint}: {err}");
        }
    }
}

fn log_trap(pipeline: &Pipeline, origin: Endpoint, dest: &HashSet<Endpoint>, payload: &[u8]) {
    let destinations = dest
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let mut record = vec![format!(
        "{origin} > {destinations} {}",
        snmp::describe(payload)
    )];
    if pipeline.log_bytes {
        record.push(snmp::byte_literal(payload));
    }
    pipeline.data_log.append(&record);
}
