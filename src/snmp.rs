//! Best-effort rendering of SNMP trap payloads for the data log.
//!
//! Traps are forwarded verbatim; this module only exists so the data log
//! is readable by a human. The renderer walks the BER stream tag by tag
//! and pretty-prints what it recognizes, without any notion of the SNMP
//! message schema beyond "version, community, then the PDU". Anything it
//! cannot make sense of degrades to a byte literal; a decode failure
//! must never affect a forwarding cycle.

use core::fmt::Write;

use log::warn;

use crate::wire::ber;
use crate::wire::{Error, Result};

/// Token separator in rendered PDU bodies.
const SEPARATOR: &str = "  ";

/// Render a trap payload as a single human-readable line.
///
/// Never fails: undecodable payloads come back as a byte literal.
pub fn describe(data: &[u8]) -> String {
    match render(data) {
        Ok(text) => text,
        Err(err) => {
            warn!("unable to decode trap payload: {err}");
            byte_literal(data)
        }
    }
}

/// Render `data` as a Rust-style byte-string literal, printable ASCII
/// kept as-is and everything else `\xHH`-escaped.
pub fn byte_literal(data: &[u8]) -> String {
    format!("b\"{}\"", data.escape_ascii())
}

fn render(data: &[u8]) -> Result<String> {
    let label = match outer_version(data)? {
        0 => "1".to_string(),
        1 => "2c".to_string(),
        v => return Ok(format!("SNMPv{v} - Unable to decrypt contents")),
    };

    let rendered = walk(&mut ber::Reader::new(data), 0)?;
    // The message renders as `  <version>  <community>  <pdu...>`; peel
    // the first two tokens off and reframe them.
    let mut parts = rendered.splitn(4, SEPARATOR);
    let (Some(_), Some(_version), Some(community), Some(body)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error);
    };
    Ok(format!("C={community} SNMPv{label}{SEPARATOR}{body}"))
}

// The version is the first element of the outer message sequence. For
// version 0 and 1 messages the community string follows; anything newer
// is encrypted and not worth descending into.
fn outer_version(data: &[u8]) -> Result<u128> {
    let mut reader = ber::Reader::new(data);
    reader.enter()?;
    let tlv = reader.read()?;
    if tlv.tag.constructed {
        return Err(Error);
    }
    naive_int(tlv.value).ok_or(Error)
}

const MAX_DEPTH: usize = 32;

// One constructed context: primitives append tokens, constructed values
// recurse and inline their output. A token directly after an OID is its
// value and joins with `=` instead of the separator.
fn walk(reader: &mut ber::Reader, depth: usize) -> Result<String> {
    if depth > MAX_DEPTH {
        return Err(Error);
    }

    let mut out = String::new();
    let mut value_of_oid = false;
    while !reader.eof() {
        let tag = reader.peek()?;
        if tag.constructed {
            reader.enter()?;
            let child = walk(reader, depth + 1)?;
            reader.leave();
            out.push_str(&child);
        } else {
            let tlv = reader.read()?;
            let token = match tlv.tag.number {
                6 => object_identifier(tlv.value)?,
                _ => primitive_token(tlv.tag, tlv.value),
            };
            out.push_str(if value_of_oid { "=" } else { SEPARATOR });
            out.push_str(&token);
            value_of_oid = tlv.tag.number == 6 && !value_of_oid;
        }
    }
    Ok(out)
}

// Tag-number-directed value rendering. The numbers double up across tag
// classes (0 is the application-class IpAddress, 1-3 cover Counter,
// Gauge and TimeTicks as well as the universal primitives); rendering by
// number alone is part of the decoder's naivety.
fn primitive_token(tag: ber::Tag, value: &[u8]) -> String {
    match tag.number {
        0 if value.len() == 4 => {
            let [a, b, c, d] = [value[0], value[1], value[2], value[3]];
            format!("{a}.{b}.{c}.{d}")
        }
        1 | 2 | 3 => match naive_int(value) {
            Some(n) => n.to_string(),
            None => quoted_bytes(value),
        },
        4 => quoted_utf8(value),
        5 => "null".to_string(),
        _ => byte_literal(value),
    }
}

// Interpret the raw value octets as a hex string: octets that already
// read as ASCII hex digits contribute that digit, everything else is
// escaped to its two-digit form first.
fn naive_int(value: &[u8]) -> Option<u128> {
    if value.is_empty() {
        return None;
    }
    let mut hex = String::with_capacity(value.len() * 2);
    for &byte in value {
        if byte.is_ascii_hexdigit() {
            hex.push(byte as char);
        } else {
            let _ = write!(hex, "{byte:02x}");
        }
    }
    u128::from_str_radix(&hex, 16).ok()
}

// UTF-8 with `\xHH` in place of invalid sequences, wrapped in quotes.
fn quoted_utf8(value: &[u8]) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    let mut rest = value;
    while !rest.is_empty() {
        match core::str::from_utf8(rest) {
            Ok(text) => {
                out.push_str(text);
                break;
            }
            Err(err) => {
                let (valid, invalid) = rest.split_at(err.valid_up_to());
                if let Ok(text) = core::str::from_utf8(valid) {
                    out.push_str(text);
                }
                let skip = err.error_len().unwrap_or(invalid.len());
                for &byte in &invalid[..skip] {
                    let _ = write!(out, "\\x{byte:02x}");
                }
                rest = &invalid[skip..];
            }
        }
    }
    out.push('"');
    out
}

fn quoted_bytes(value: &[u8]) -> String {
    format!("\"{}\"", value.escape_ascii())
}

// Base-128 subidentifiers; the first octet group packs the first two
// arcs as `40 * x + y`.
fn object_identifier(value: &[u8]) -> Result<String> {
    let mut subids: Vec<u64> = Vec::new();
    let mut accum: u64 = 0;
    let mut pending = false;
    for &byte in value {
        if accum > u64::MAX >> 7 {
            return Err(Error);
        }
        accum = (accum << 7) | (byte & 0x7f) as u64;
        pending = byte & 0x80 != 0;
        if !pending {
            subids.push(accum);
            accum = 0;
        }
    }
    if pending || subids.is_empty() || subids[0] > 1599 {
        return Err(Error);
    }

    let mut out = format!("{}.{}", subids[0] / 40, subids[0] % 40);
    for sub in &subids[1..] {
        let _ = write!(out, ".{sub}");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
        assert!(content.len() < 128);
        let mut out = vec![tag, content.len() as u8];
        out.extend_from_slice(content);
        out
    }

    fn trap(version: u8, community: &[u8], varbinds: &[Vec<u8>]) -> Vec<u8> {
        let varbind_list = tlv(0x30, &varbinds.concat());
        let pdu_body = [
            tlv(0x02, &[0x04, 0xd2]), // request-id 1234
            tlv(0x02, &[0x00]),       // error-status
            tlv(0x02, &[0x00]),       // error-index
            varbind_list,
        ]
        .concat();
        let message = [
            tlv(0x02, &[version]),
            tlv(0x04, community),
            tlv(0xa7, &pdu_body),
        ]
        .concat();
        tlv(0x30, &message)
    }

    fn varbind(oid: &[u8], value: Vec<u8>) -> Vec<u8> {
        tlv(0x30, &[tlv(0x06, oid), value].concat())
    }

    const SYS_UPTIME: &[u8] = &[0x2b, 6, 1, 2, 1, 1, 3, 0];

    #[test]
    fn v2c_trap_with_integer_varbind() {
        let bytes = trap(1, b"public", &[varbind(SYS_UPTIME, tlv(0x02, &[42]))]);
        assert_eq!(
            describe(&bytes),
            "C=\"public\" SNMPv2c  1234  0  0  1.3.6.1.2.1.1.3.0=42"
        );
    }

    #[test]
    fn v1_version_label() {
        let bytes = trap(0, b"private", &[varbind(SYS_UPTIME, tlv(0x02, &[1]))]);
        let text = describe(&bytes);
        assert!(text.starts_with("C=\"private\" SNMPv1  "), "{text}");
    }

    #[test]
    fn v3_is_not_descended() {
        let bytes = trap(3, b"ignored", &[]);
        assert_eq!(describe(&bytes), "SNMPv3 - Unable to decrypt contents");
    }

    #[test]
    fn ip_address_value_renders_dotted() {
        let bytes = trap(
            1,
            b"public",
            &[varbind(SYS_UPTIME, tlv(0x40, &[192, 168, 1, 1]))],
        );
        let text = describe(&bytes);
        assert!(text.contains("1.3.6.1.2.1.1.3.0=192.168.1.1"), "{text}");
    }

    #[test]
    fn timeticks_use_the_hex_reading() {
        // Application tag 3, value 0x04d2.
        let bytes = trap(1, b"public", &[varbind(SYS_UPTIME, tlv(0x43, &[0x04, 0xd2]))]);
        let text = describe(&bytes);
        assert!(text.contains("1.3.6.1.2.1.1.3.0=1234"), "{text}");
    }

    #[test]
    fn invalid_utf8_is_escaped() {
        let bytes = trap(1, b"public", &[varbind(SYS_UPTIME, tlv(0x04, b"hi\xff"))]);
        let text = describe(&bytes);
        assert!(text.contains("=\"hi\\xff\""), "{text}");
    }

    #[test]
    fn null_varbind_value() {
        let bytes = trap(1, b"public", &[varbind(SYS_UPTIME, tlv(0x05, &[]))]);
        let text = describe(&bytes);
        assert!(text.contains("1.3.6.1.2.1.1.3.0=null"), "{text}");
    }

    #[test]
    fn undecodable_input_falls_back_to_bytes() {
        assert_eq!(describe(&[0xff, 0x01]), "b\"\\xff\\x01\"");
        assert_eq!(describe(b""), "b\"\"");
    }

    #[test]
    fn primitive_outer_element_falls_back() {
        let bytes = tlv(0x04, b"not a message");
        assert_eq!(describe(&bytes), byte_literal(&bytes));
    }
}
