//! Hand-rolled parsers for the network literals that appear in the
//! configuration file: IPv4 addresses, CIDR blocks and `addr:port`
//! endpoints.

use core::result;
use core::str::FromStr;

use crate::wire::{Endpoint, Ipv4Address, Ipv4Cidr};

type Result<T> = result::Result<T, ()>;

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(data: &'a str) -> Parser<'a> {
        Parser {
            data: data.as_bytes(),
            pos: 0,
        }
    }

    fn advance(&mut self) -> Result<u8> {
        match self.data.get(self.pos) {
            Some(&chr) => {
                self.pos += 1;
                Ok(chr)
            }
            None => Err(()),
        }
    }

    fn try_do<F, T>(&mut self, f: F) -> Option<T>
    where
        F: FnOnce(&mut Parser<'a>) -> Result<T>,
    {
        let pos = self.pos;
        match f(self) {
            Ok(res) => Some(res),
            Err(()) => {
                self.pos = pos;
                None
            }
        }
    }

    fn accept_eof(&mut self) -> Result<()> {
        if self.data.len() == self.pos {
            Ok(())
        } else {
            Err(())
        }
    }

    fn until_eof<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Parser<'a>) -> Result<T>,
    {
        let res = f(self)?;
        self.accept_eof()?;
        Ok(res)
    }

    fn accept_char(&mut self, chr: u8) -> Result<()> {
        if self.advance()? == chr {
            Ok(())
        } else {
            Err(())
        }
    }

    fn accept_digit(&mut self) -> Result<u8> {
        let digit = self.advance()?;
        if digit.is_ascii_digit() {
            Ok(digit - b'0')
        } else {
            Err(())
        }
    }

    fn accept_number(&mut self, max_digits: usize, max_value: u32) -> Result<u32> {
        let mut value = self.accept_digit()? as u32;
        for _ in 1..max_digits {
            match self.try_do(|p| p.accept_digit()) {
                Some(digit) => {
                    value *= 10;
                    value += digit as u32;
                }
                None => break,
            }
        }
        if value < max_value {
            Ok(value)
        } else {
            Err(())
        }
    }

    fn accept_ipv4_octets(&mut self) -> Result<[u8; 4]> {
        let mut octets = [0u8; 4];
        for (i, octet) in octets.iter_mut().enumerate() {
            if i != 0 {
                self.accept_char(b'.')?;
            }
            *octet = self.accept_number(3, 256)? as u8;
        }
        Ok(octets)
    }

    fn accept_ipv4(&mut self) -> Result<Ipv4Address> {
        let octets = self.accept_ipv4_octets()?;
        Ok(Ipv4Address::from(octets))
    }

    fn accept_ipv4_cidr(&mut self) -> Result<Ipv4Cidr> {
        let addr = self.accept_ipv4()?;
        let prefix_len = match self.try_do(|p| {
            p.accept_char(b'/')?;
            p.accept_number(2, 33)
        }) {
            Some(prefix_len) => prefix_len as u8,
            // A bare address is the /32 host route for itself.
            None => 32,
        };
        let mask = if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len)
        };
        if u32::from(addr) & !mask != 0 {
            return Err(());
        }
        Ok(Ipv4Cidr::new(addr, prefix_len))
    }

    fn accept_endpoint(&mut self) -> Result<Endpoint> {
        let addr = self.accept_ipv4()?;
        self.accept_char(b':')?;
        let port = self.accept_number(5, 65536)?;
        Ok(Endpoint::new(addr, port as u16))
    }
}

impl FromStr for Ipv4Cidr {
    type Err = ();

    /// Parse a string representation of an IPv4 CIDR, rejecting network
    /// addresses with host bits set.
    fn from_str(s: &str) -> Result<Ipv4Cidr> {
        Parser::new(s).until_eof(|p| p.accept_ipv4_cidr())
    }
}

impl FromStr for Endpoint {
    type Err = ();

    /// Parse a string representation of an `addr:port` endpoint. Port 0
    /// parses; the configuration layer rejects it with a better message.
    fn from_str(s: &str) -> Result<Endpoint> {
        Parser::new(s).until_eof(|p| p.accept_endpoint())
    }
}
