//! Host networking access for the spoofed transmit path.

mod sys;

pub use self::sys::RawSocket;
