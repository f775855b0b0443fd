//! Assembly of complete IPv4+UDP frames for source-preserving transmits.

use super::ip::Endpoint;
use super::{ipv4, udp};

/// Time to live carried by every emitted frame.
const HOP_LIMIT: u8 = 128;

/// Build a raw IPv4+UDP frame carrying `payload` from `origin` to `dest`.
///
/// The origin endpoint lands in the source fields verbatim, which is the
/// whole point: downstream collectors see the device that emitted the
/// trap, not this host. `ident` feeds the fragment identification field.
/// Inputs are validated by the configuration layer; there is no error
/// path.
pub fn build(origin: Endpoint, dest: Endpoint, payload: &[u8], ident: u16) -> Vec<u8> {
    let ip_repr = ipv4::Repr {
        src_addr: origin.addr,
        dst_addr: dest.addr,
        ident,
        payload_len: udp::HEADER_LEN + payload.len(),
        hop_limit: HOP_LIMIT,
    };
    let udp_repr = udp::Repr {
        src_port: origin.port,
        dst_port: dest.port,
    };

    let mut buffer = vec![0u8; ip_repr.buffer_len()];
    ip_repr.emit(&mut ipv4::Packet::new_unchecked(&mut buffer[..]));
    udp_repr.emit(
        &mut udp::Packet::new_unchecked(&mut buffer[ipv4::HEADER_LEN..]),
        &origin.addr,
        &dest.addr,
        payload,
    );
    buffer
}
