// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The port-spec grammar (spec §9's Open Question, resolved in
//! `SPEC_FULL.md`): a comma-separated list of `proto:range` terms.
//!
//! Grammar:
//!   portspec  := "" | "any" | term ("," term)*
//!   term      := [proto ":"] range
//!   proto     := "tcp" | "udp" | "icmp" | <decimal IANA number>
//!   range     := port | port "-" port
//!   port      := 0..=65535
//!
//! A missing `proto:` prefix means "any protocol". An empty string or the
//! literal `"any"` matches everything.

use crate::model::{PROTO_TCP, PROTO_UDP};

const PROTO_ICMP: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    /// `None` means "any protocol".
    proto: Option<u8>,
    lo: u16,
    hi: u16,
}

/// A parsed port-spec, ready for repeated matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    terms: Vec<Term>,
}

impl PortSpec {
    /// Parse a port-spec string. Returns `None` on any malformed term
    /// (spec §9: out-of-range or unparsable input is rejected at the
    /// caller, with `ErrInvalidArgument`).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("any") {
            return Some(Self { terms: Vec::new() });
        }

        let mut terms = Vec::new();
        for part in raw.split(',') {
            terms.push(Self::parse_term(part.trim())?);
        }
        Some(Self { terms })
    }

    fn parse_term(part: &str) -> Option<Term> {
        if part.is_empty() {
            return None;
        }

        let (proto, range) = match part.split_once(':') {
            Some((p, r)) => (Some(Self::parse_proto(p)?), r),
            None => (None, part),
        };

        let (lo, hi) = match range.split_once('-') {
            Some((lo, hi)) => (lo.parse::<u16>().ok()?, hi.parse::<u16>().ok()?),
            None => {
                let p = range.parse::<u16>().ok()?;
                (p, p)
            }
        };

        if lo > hi {
            return None;
        }

        Some(Term { proto, lo, hi })
    }

    fn parse_proto(s: &str) -> Option<u8> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Some(PROTO_TCP),
            "udp" => Some(PROTO_UDP),
            "icmp" => Some(PROTO_ICMP),
            other => other.parse::<u8>().ok(),
        }
    }

    /// An empty term list (from `""`/`"any"`) matches everything.
    pub fn matches(&self, port: u16, proto: u8) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        self.terms.iter().any(|t| {
            let proto_ok = match t.proto {
                Some(p) => p == proto,
                None => true,
            };
            proto_ok && port >= t.lo && port <= t.hi
        })
    }
}

#[cfg(test)]
#[path = "portspec_tests.rs"]
mod tests;
