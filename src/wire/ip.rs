use core::fmt;
use std::net::SocketAddrV4;

use crate::wire::ipv4;

/// IP datagram encapsulated protocol number for UDP.
pub const PROTOCOL_UDP: u8 = 17;

/// An internet endpoint address.
///
/// `Endpoint` always fully specifies both the address and the port.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct Endpoint {
    pub addr: ipv4::Address,
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint address from given address and port.
    pub const fn new(addr: ipv4::Address, port: u16) -> Endpoint {
        Endpoint { addr, port }
    }
}

impl From<SocketAddrV4> for Endpoint {
    fn from(x: SocketAddrV4) -> Endpoint {
        Endpoint {
            addr: *x.ip(),
            port: x.port(),
        }
    }
}

impl From<Endpoint> for SocketAddrV4 {
    fn from(x: Endpoint) -> SocketAddrV4 {
        SocketAddrV4::new(x.addr, x.port)
    }
}

impl<T: Into<ipv4::Address>> From<(T, u16)> for Endpoint {
    fn from((addr, port): (T, u16)) -> Endpoint {
        Endpoint {
            addr: addr.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

pub mod checksum {
    use byteorder::{ByteOrder, NetworkEndian};

    use super::super::ipv4;

    /// Accumulate consecutive big-endian 16-bit words of `data`.
    ///
    /// An odd trailing byte contributes its value shifted into the high
    /// octet, equivalent to padding the data with a single zero byte for
    /// the computation only.
    pub fn sum(mut data: &[u8]) -> u32 {
        let mut accum = 0u32;
        while data.len() >= 2 {
            accum += NetworkEndian::read_u16(data) as u32;
            data = &data[2..];
        }
        if let Some(&value) = data.first() {
            accum += (value as u32) << 8;
        }
        accum
    }

    /// Fold the accumulator once and take the one's complement, masked to
    /// 16 bits.
    pub fn finish(accum: u32) -> u16 {
        !(((accum >> 16) + (accum & 0xffff)) as u16)
    }

    /// Compute the checksum of a single contiguous octet sequence.
    pub fn data(data: &[u8]) -> u16 {
        finish(sum(data))
    }

    /// Partial sum of the UDP pseudo header: source address, destination
    /// address, a zero octet, the protocol number and the UDP length.
    pub fn pseudo_header(
        src_addr: &ipv4::Address,
        dst_addr: &ipv4::Address,
        protocol: u8,
        length: u16,
    ) -> u32 {
        let mut proto_len = [0u8; 4];
        proto_len[1] = protocol;
        NetworkEndian::write_u16(&mut proto_len[2..4], length);

        sum(&src_addr.octets()) + sum(&dst_addr.octets()) + sum(&proto_len)
    }
}

#[cfg(test)]
mod tests {
    use super::checksum;
    use super::Endpoint;
    use std::net::{Ipv4Addr, SocketAddrV4};

    #[test]
    fn endpoint_display_and_conversions() {
        let endpoint = Endpoint::new(Ipv4Addr::new(10, 0, 0, 5), 162);
        assert_eq!(format!("{endpoint}"), "10.0.0.5:162");

        let sock = SocketAddrV4::from(endpoint);
        assert_eq!(Endpoint::from(sock), endpoint);
    }

    #[test]
    fn rfc1071_example() {
        // The worked example from RFC 1071 §3.
        let words = [0x00u8, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(checksum::data(&words), !0xddf2);
    }

    #[test]
    fn odd_length_equals_zero_padded() {
        use rand::{Rng, SeedableRng};

        let mut rng = rand::rngs::StdRng::seed_from_u64(0x7261);
        for len in [1usize, 3, 5, 31, 333] {
            let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            let mut padded = data.clone();
            padded.push(0);
            assert_eq!(checksum::data(&data), checksum::data(&padded));
        }
    }

    #[test]
    fn fold_is_single_pass() {
        // 0x0001_ffff folds to 0x10000, which masks to zero before the
        // complement.
        assert_eq!(checksum::finish(0x0001_ffff), 0xffff);
    }
}
