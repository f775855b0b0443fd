/*! A UDP trap exploder: one listening endpoint fanned out to many
collectors.

Received datagrams are matched by sender address against subnet-keyed
forwarding rules and replicated, unmodified, to every destination the
matching rules name. Optionally the original sender address is preserved
by emitting hand-built IPv4+UDP frames through a raw socket, so
downstream collectors keep seeing the device that raised the trap.

The crate is a library plus one binary; the binary only does option
parsing and wiring. [server::Server] owns the receive loop, [rules]
the subnet matching, [transmit] the two send paths, [wire] the frame
construction and the naive BER machinery behind [snmp::describe].
*/

pub mod config;
pub mod logs;
mod parsers;
pub mod phy;
pub mod rules;
pub mod server;
pub mod snmp;
pub mod transmit;
pub mod wire;
