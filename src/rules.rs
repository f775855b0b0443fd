//! The forwarding rule table: IPv4 subnets mapped to sets of collector
//! endpoints.

use core::fmt;
use std::collections::HashSet;

use anyhow::{anyhow, ensure, Context, Result};

use crate::wire::{Endpoint, Ipv4Address, Ipv4Cidr};

/// Port a destination without an explicit one forwards to (snmptrap).
pub const DEFAULT_TRAP_PORT: u16 = 162;

/// One forwarding rule: traps whose sender falls inside `origin` are
/// replicated to every destination.
///
/// Destinations keep their configuration order so the rule prints the
/// way it was written; only match results are sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    origin: Ipv4Cidr,
    destinations: Vec<Endpoint>,
}

impl Rule {
    fn parse(origin: &str, destinations: &str, notices: &mut Vec<String>) -> Result<Rule> {
        let cidr: Ipv4Cidr = origin
            .parse()
            .map_err(|()| anyhow!("'{origin}' is not a valid IPv4 network"))?;

        let mut parsed = Vec::new();
        for token in destinations.split(' ') {
            parsed.push(parse_destination(token, notices)?);
        }
        Ok(Rule {
            origin: cidr,
            destinations: parsed,
        })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} >", self.origin)?;
        for dest in &self.destinations {
            write!(f, " {dest}")?;
        }
        Ok(())
    }
}

fn parse_destination(token: &str, notices: &mut Vec<String>) -> Result<Endpoint> {
    if token.contains(':') {
        let endpoint: Endpoint = token
            .parse()
            .map_err(|()| anyhow!("expected destination as '<ip_address>:<port>', got '{token}'"))?;
        ensure!(endpoint.port != 0, "0 is not a valid port");
        Ok(endpoint)
    } else {
        let addr: Ipv4Address = token
            .parse()
            .map_err(|_| anyhow!("'{token}' is not a valid destination address"))?;
        notices.push(format!(
            "no port given for destination {token}, defaulting to {DEFAULT_TRAP_PORT}"
        ));
        Ok(Endpoint::new(addr, DEFAULT_TRAP_PORT))
    }
}

/// All forwarding rules, fixed at bootstrap.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Build the table from `(origin_cidr, destination_list)` text pairs
    /// in configuration order.
    ///
    /// Two rules keyed on the same origin text, malformed networks or
    /// destinations, and out-of-range ports are all errors; warnings that
    /// should reach the operator once logging is up are pushed onto
    /// `notices`.
    pub fn from_pairs<'a, I>(pairs: I, notices: &mut Vec<String>) -> Result<RuleTable>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut rules = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for (origin, destinations) in pairs {
            ensure!(
                seen.insert(origin),
                "duplicate forwarding rules for origin {origin}"
            );
            let rule = Rule::parse(origin, destinations, notices)
                .with_context(|| format!("unable to set forwarding rule for origin '{origin}'"))?;
            rules.push(rule);
        }
        Ok(RuleTable { rules })
    }

    /// Union of the destinations of every rule matching `src`.
    ///
    /// Every matching rule contributes; there is no longest-prefix
    /// selection. A sender outside all configured subnets yields the
    /// empty set.
    pub fn matches(&self, src: Ipv4Address) -> HashSet<Endpoint> {
        let mut dest = HashSet::new();
        for rule in &self.rules {
            if rule.origin.contains_addr(&src) {
                dest.extend(rule.destinations.iter().copied());
            }
        }
        dest
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate the rules in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> RuleTable {
        let mut notices = Vec::new();
        RuleTable::from_pairs(pairs.iter().copied(), &mut notices).unwrap()
    }

    fn endpoint(s: &str) -> Endpoint {
        s.parse().unwrap()
    }

    #[test]
    fn single_rule_fans_out() {
        let table = table(&[("10.0.0.0/24", "127.0.0.1:2001 127.0.0.1:2002")]);
        let dest = table.matches(Ipv4Address::new(10, 0, 0, 5));
        assert_eq!(
            dest,
            HashSet::from([endpoint("127.0.0.1:2001"), endpoint("127.0.0.1:2002")])
        );
    }

    #[test]
    fn overlapping_rules_union() {
        let table = table(&[
            ("0.0.0.0/0", "127.0.0.1:2001"),
            ("172.16.0.0/16", "127.0.0.1:2002"),
        ]);

        let both = table.matches(Ipv4Address::new(172, 16, 4, 4));
        assert_eq!(
            both,
            HashSet::from([endpoint("127.0.0.1:2001"), endpoint("127.0.0.1:2002")])
        );

        let only_default = table.matches(Ipv4Address::new(8, 8, 8, 8));
        assert_eq!(only_default, HashSet::from([endpoint("127.0.0.1:2001")]));
    }

    #[test]
    fn no_match_is_empty() {
        let table = table(&[("192.168.0.0/16", "127.0.0.1:2001")]);
        assert!(table.matches(Ipv4Address::new(10, 0, 0, 1)).is_empty());
    }

    #[test]
    fn shared_destinations_deduplicate() {
        let table = table(&[
            ("0.0.0.0/0", "127.0.0.1:2001"),
            ("10.0.0.0/8", "127.0.0.1:2001"),
        ]);
        assert_eq!(table.matches(Ipv4Address::new(10, 1, 2, 3)).len(), 1);
    }

    #[test]
    fn duplicate_origin_is_rejected() {
        let mut notices = Vec::new();
        let err = RuleTable::from_pairs(
            [
                ("10.0.0.0/24", "127.0.0.1:162"),
                ("10.0.0.0/24", "127.0.0.1:163"),
            ],
            &mut notices,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate forwarding rules"));
    }

    #[test]
    fn missing_port_defaults_with_notice() {
        let mut notices = Vec::new();
        let table =
            RuleTable::from_pairs([("10.0.0.0/24", "192.168.1.86")], &mut notices).unwrap();
        assert_eq!(
            table.matches(Ipv4Address::new(10, 0, 0, 1)),
            HashSet::from([endpoint("192.168.1.86:162")])
        );
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("defaulting to 162"));
    }

    #[test]
    fn bad_rules_are_rejected() {
        for (origin, dest) in [
            ("10.0.0.1/24", "127.0.0.1:162"), // host bits set
            ("not-a-cidr", "127.0.0.1:162"),
            ("10.0.0.0/24", "127.0.0.1:0"),
            ("10.0.0.0/24", "127.0.0.1:70000"),
            ("10.0.0.0/24", "127.0.0.1:162 "), // trailing separator
            ("10.0.0.0/24", ""),
        ] {
            let mut notices = Vec::new();
            let result = RuleTable::from_pairs([(origin, dest)], &mut notices);
            assert!(result.is_err(), "accepted {origin} = {dest}");
        }
    }

    #[test]
    fn rule_displays_as_written() {
        let table = table(&[("172.0.0.1/32", "172.0.0.1:5432 192.168.0.1:4321")]);
        let rendered: Vec<String> = table.iter().map(|r| r.to_string()).collect();
        assert_eq!(rendered, ["172.0.0.1/32 > 172.0.0.1:5432 192.168.0.1:4321"]);
    }
}
