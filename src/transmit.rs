//! Sending one trap copy to one destination, with or without source
//! spoofing.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicU16, Ordering};

use crate::phy::RawSocket;
use crate::wire::{frame, Endpoint};

/// The dual-path transmitter shared by all workers.
///
/// Sockets are ephemeral, one per send; the only state carried across
/// sends is the fragment identification counter.
#[derive(Debug)]
pub struct Transmitter {
    spoof: bool,
    ident: AtomicU16,
}

impl Transmitter {
    pub fn new(spoof: bool) -> Transmitter {
        Transmitter {
            spoof,
            ident: AtomicU16::new(0),
        }
    }

    /// Whether sends keep the original sender address via the raw path.
    pub fn spoofing(&self) -> bool {
        self.spoof
    }

    // Advances by one per spoofed frame, wrapping from 65535 to 0.
    fn next_ident(&self) -> u16 {
        self.ident.fetch_add(1, Ordering::Relaxed)
    }

    /// Send one copy of `payload` to `dest`.
    ///
    /// Spoofing builds the full IPv4+UDP frame with `origin` as the
    /// source and writes it through a raw socket; otherwise an ordinary
    /// UDP socket sends the payload and the kernel picks the source.
    pub fn send(&self, origin: Endpoint, dest: Endpoint, payload: &[u8]) -> io::Result<()> {
        if self.spoof {
            let frame = frame::build(origin, dest, payload, self.next_ident());
            let socket = RawSocket::open()?;
            socket.send_to(&frame, dest.into())?;
        } else {
            let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
            socket.connect(SocketAddrV4::from(dest))?;
            socket.send(payload)?;
        }
        Ok(())
    }
}
