use byteorder::{ByteOrder, NetworkEndian};
use core::fmt;

pub use core::net::Ipv4Addr as Address;

use super::ip::checksum;
use super::{Error, Result};

pub const ADDR_SIZE: usize = 4;

/// A specification of an IPv4 CIDR block: a network address and a
/// variable-length subnet masking prefix length.
///
/// The network address carries no host bits; `a.b.c.d/n` strings with
/// host bits set are rejected at parse time.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct Cidr {
    network: Address,
    prefix_len: u8,
}

impl Cidr {
    /// Create an IPv4 CIDR block from the given network address and
    /// prefix length.
    ///
    /// # Panics
    /// This function panics if the prefix length is larger than 32, or if
    /// the address has bits set below the prefix. [`str::parse`] performs
    /// the same checks fallibly.
    pub fn new(network: Address, prefix_len: u8) -> Cidr {
        assert!(prefix_len <= 32);
        let cidr = Cidr {
            network,
            prefix_len,
        };
        assert!(
            u32::from(network) & !cidr.netmask() == 0,
            "host bits set in {network}/{prefix_len}"
        );
        cidr
    }

    /// Return the network address of this CIDR block.
    pub const fn network(&self) -> Address {
        self.network
    }

    /// Return the prefix length of this CIDR block.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Return the subnet mask as a host-order integer.
    pub fn netmask(&self) -> u32 {
        if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix_len)
        }
    }

    /// Query whether the subnetwork described by this CIDR block contains
    /// the given address.
    pub fn contains_addr(&self, addr: &Address) -> bool {
        u32::from(*addr) & self.netmask() == u32::from(self.network)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

/// A read/write wrapper around an Internet Protocol version 4 packet
/// buffer.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Packet<T: AsRef<[u8]>> {
    buffer: T,
}

mod field {
    use crate::wire::field::*;

    pub const VER_IHL: usize = 0;
    pub const TOS: usize = 1;
    pub const LENGTH: Field = 2..4;
    pub const IDENT: Field = 4..6;
    pub const FLG_OFF: Field = 6..8;
    pub const TTL: usize = 8;
    pub const PROTOCOL: usize = 9;
    pub const CHECKSUM: Field = 10..12;
    pub const SRC_ADDR: Field = 12..16;
    pub const DST_ADDR: Field = 16..20;
}

pub const HEADER_LEN: usize = field::DST_ADDR.end;

impl<T: AsRef<[u8]>> Packet<T> {
    /// Imbue a raw octet buffer with IPv4 packet structure.
    pub const fn new_unchecked(buffer: T) -> Packet<T> {
        Packet { buffer }
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(buffer: T) -> Result<Packet<T>> {
        let packet = Self::new_unchecked(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error)` if the buffer is too short or the total
    /// length field disagrees with it.
    pub fn check_len(&self) -> Result<()> {
        let buffer_len = self.buffer.as_ref().len();
        if buffer_len < HEADER_LEN {
            return Err(Error);
        }
        let field_len = self.total_len() as usize;
        if buffer_len < field_len || field_len < HEADER_LEN {
            return Err(Error);
        }
        Ok(())
    }

    /// Consume the packet, returning the underlying buffer.
    pub fn into_inner(self) -> T {
        self.buffer
    }

    /// Return the version field.
    #[inline]
    pub fn version(&self) -> u8 {
        let data = self.buffer.as_ref();
        data[field::VER_IHL] >> 4
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        let data = self.buffer.as_ref();
        (data[field::VER_IHL] & 0x0f) * 4
    }

    /// Return the total length field.
    #[inline]
    pub fn total_len(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::LENGTH])
    }

    /// Return the fragment identification field.
    #[inline]
    pub fn ident(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::IDENT])
    }

    /// Return the time to live field.
    #[inline]
    pub fn hop_limit(&self) -> u8 {
        let data = self.buffer.as_ref();
        data[field::TTL]
    }

    /// Return the protocol field.
    #[inline]
    pub fn protocol(&self) -> u8 {
        let data = self.buffer.as_ref();
        data[field::PROTOCOL]
    }

    /// Return the header checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::CHECKSUM])
    }

    /// Return the source address field.
    #[inline]
    pub fn src_addr(&self) -> Address {
        let data = self.buffer.as_ref();
        let mut bytes = [0u8; ADDR_SIZE];
        bytes.copy_from_slice(&data[field::SRC_ADDR]);
        Address::from(bytes)
    }

    /// Return the destination address field.
    #[inline]
    pub fn dst_addr(&self) -> Address {
        let data = self.buffer.as_ref();
        let mut bytes = [0u8; ADDR_SIZE];
        bytes.copy_from_slice(&data[field::DST_ADDR]);
        Address::from(bytes)
    }

    /// Validate the header checksum.
    pub fn verify_checksum(&self) -> bool {
        let data = self.buffer.as_ref();
        checksum::data(&data[..HEADER_LEN]) == 0
    }
}

impl<'a, T: AsRef<[u8]> + ?Sized> Packet<&'a T> {
    /// Return a pointer to the payload.
    #[inline]
    pub fn payload(&self) -> &'a [u8] {
        let range = HEADER_LEN..self.total_len() as usize;
        let data = self.buffer.as_ref();
        &data[range]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the version and header length fields; the header is always
    /// emitted without options.
    #[inline]
    pub fn set_ver_ihl(&mut self) {
        let data = self.buffer.as_mut();
        data[field::VER_IHL] = 0x45;
    }

    /// Set the type of service field.
    #[inline]
    pub fn set_tos(&mut self, value: u8) {
        let data = self.buffer.as_mut();
        data[field::TOS] = value;
    }

    /// Set the total length field.
    #[inline]
    pub fn set_total_len(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::LENGTH], value)
    }

    /// Set the fragment identification field.
    #[inline]
    pub fn set_ident(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::IDENT], value)
    }

    /// Set the flags and fragment offset fields.
    #[inline]
    pub fn set_flags_and_offset(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::FLG_OFF], value)
    }

    /// Set the time to live field.
    #[inline]
    pub fn set_hop_limit(&mut self, value: u8) {
        let data = self.buffer.as_mut();
        data[field::TTL] = value;
    }

    /// Set the protocol field.
    #[inline]
    pub fn set_protocol(&mut self, value: u8) {
        let data = self.buffer.as_mut();
        data[field::PROTOCOL] = value;
    }

    /// Set the header checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::CHECKSUM], value)
    }

    /// Set the source address field.
    #[inline]
    pub fn set_src_addr(&mut self, value: Address) {
        let data = self.buffer.as_mut();
        data[field::SRC_ADDR].copy_from_slice(&value.octets())
    }

    /// Set the destination address field.
    #[inline]
    pub fn set_dst_addr(&mut self, value: Address) {
        let data = self.buffer.as_mut();
        data[field::DST_ADDR].copy_from_slice(&value.octets())
    }

    /// Compute and fill in the header checksum.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = {
            let data = self.buffer.as_ref();
            checksum::data(&data[..HEADER_LEN])
        };
        self.set_checksum(checksum)
    }
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for Packet<T> {
    fn as_ref(&self) -> &[u8] {
        self.buffer.as_ref()
    }
}

/// A high-level representation of an Internet Protocol version 4 packet
/// header, restricted to what an emitted UDP frame carries.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub src_addr: Address,
    pub dst_addr: Address,
    pub ident: u16,
    pub payload_len: usize,
    pub hop_limit: u8,
}

impl Repr {
    /// Return the length of a header that will be emitted from this
    /// high-level representation.
    pub const fn header_len(&self) -> usize {
        HEADER_LEN
    }

    /// Return the total frame length this representation describes.
    pub const fn buffer_len(&self) -> usize {
        HEADER_LEN + self.payload_len
    }

    /// Emit this high-level representation into a buffer.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]>>(&self, packet: &mut Packet<T>) {
        packet.set_ver_ihl();
        packet.set_tos(0);
        packet.set_total_len((HEADER_LEN + self.payload_len) as u16);
        packet.set_ident(self.ident);
        packet.set_flags_and_offset(0);
        packet.set_hop_limit(self.hop_limit);
        packet.set_protocol(super::ip::PROTOCOL_UDP);
        packet.set_src_addr(self.src_addr);
        packet.set_dst_addr(self.dst_addr);
        packet.fill_checksum();
    }
}

impl<'a, T: AsRef<[u8]> + ?Sized> fmt::Display for Packet<&'a T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "IPv4 src={} dst={} proto={} len={}",
            self.src_addr(),
            self.dst_addr(),
            self.protocol(),
            self.total_len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static PACKET_BYTES: [u8; 24] = [
        0x45, 0x00, 0x00, 0x18, 0x12, 0x34, 0x00, 0x00, 0x80, 0x11, 0x14, 0x9f, 0x0a, 0x00, 0x00,
        0x01, 0x0a, 0x00, 0x00, 0x02, 0xde, 0xad, 0xbe, 0xef,
    ];

    #[test]
    fn parse() {
        let packet = Packet::new_checked(&PACKET_BYTES[..]).unwrap();
        assert_eq!(packet.version(), 4);
        assert_eq!(packet.header_len(), 20);
        assert_eq!(packet.total_len(), 24);
        assert_eq!(packet.ident(), 0x1234);
        assert_eq!(packet.hop_limit(), 128);
        assert_eq!(packet.protocol(), 17);
        assert_eq!(packet.src_addr(), Address::new(10, 0, 0, 1));
        assert_eq!(packet.dst_addr(), Address::new(10, 0, 0, 2));
        assert_eq!(packet.payload(), &[0xde, 0xad, 0xbe, 0xef]);
        assert!(packet.verify_checksum());
    }

    #[test]
    fn emit() {
        let repr = Repr {
            src_addr: Address::new(10, 0, 0, 1),
            dst_addr: Address::new(10, 0, 0, 2),
            ident: 0x1234,
            payload_len: 4,
            hop_limit: 128,
        };
        let mut buffer = vec![0u8; repr.buffer_len()];
        repr.emit(&mut Packet::new_unchecked(&mut buffer));
        buffer[HEADER_LEN..].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(buffer, PACKET_BYTES);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        assert_eq!(Packet::new_checked(&PACKET_BYTES[..19]), Err(Error));
    }

    #[test]
    fn cidr_contains() {
        let cidr = Cidr::new(Address::new(192, 168, 0, 0), 16);
        assert_eq!(cidr.netmask(), 0xffff_0000);
        assert!(cidr.contains_addr(&Address::new(192, 168, 4, 4)));
        assert!(!cidr.contains_addr(&Address::new(192, 169, 4, 4)));
        assert_eq!(format!("{cidr}"), "192.168.0.0/16");
    }

    #[test]
    fn cidr_zero_prefix_matches_everything() {
        let cidr = Cidr::new(Address::new(0, 0, 0, 0), 0);
        assert_eq!(cidr.netmask(), 0);
        assert!(cidr.contains_addr(&Address::new(8, 8, 8, 8)));
    }

    #[test]
    #[should_panic]
    fn cidr_rejects_host_bits() {
        Cidr::new(Address::new(10, 0, 0, 1), 24);
    }
}
