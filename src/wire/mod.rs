/*! Low-level packet access and construction.

The `wire` module deals with packet *representation*. The `Packet` family
of structures extracts fields from, and inserts fields into, sequences of
octets; the `Repr` family is a compact high-level representation that can
be emitted into a sequence of octets. [ber] is the odd one out: SNMP trap
payloads are BER TLV streams rather than fixed-offset headers, so it
carries a cursor instead of a field table.

The `Packet::new_checked` method is a shorthand for a combination of
`Packet::new_unchecked` and `Packet::check_len`. When parsing untrusted
input, it is *necessary* to use `Packet::new_checked`; so long as the
buffer is not modified, no accessor will fail. When emitting output it is
*incorrect* to use `Packet::new_checked`; the buffer length for emission
is not calculated by the `Packet` layer.
*/

mod field {
    pub type Field = ::core::ops::Range<usize>;
}

pub mod ber;
pub mod frame;
pub mod ip;
pub mod ipv4;
pub mod udp;

pub use self::ip::{checksum, Endpoint};
pub use self::ipv4::{
    Address as Ipv4Address, Cidr as Ipv4Cidr, Packet as Ipv4Packet, Repr as Ipv4Repr,
    HEADER_LEN as IPV4_HEADER_LEN,
};
pub use self::udp::{Packet as UdpPacket, Repr as UdpRepr, HEADER_LEN as UDP_HEADER_LEN};

use core::fmt;

/// Parsing or decoding a packet failed.
///
/// Either it is malformed, or it is not supported by traplicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error;

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed packet")
    }
}

pub type Result<T> = core::result::Result<T, Error>;
