//! DNSBL query-name encoding.
//!
//! Standard DNSBL pattern: reverse the IP octets and query under the zone.
//! Example: checking `203.0.113.45` against `zen.example.org` queries
//! `45.113.0.203.zen.example.org`.
//!
//! Response conventions (A record values):
//! - 127.0.0.0/8 = Listed (the last octet is a list-specific reason code)
//! - NXDOMAIN = Clean (not listed)
//! - anything else = the list is misbehaving

use std::net::Ipv4Addr;

use crate::error::{CoreError, Result};

/// Returns true if the string is a dotted-quad IPv4 address.
#[must_use]
pub fn is_valid_ipv4(ip: &str) -> bool {
    ip.parse::<Ipv4Addr>().is_ok()
}

/// Returns true if a DNSBL answer is a genuine listing code.
#[must_use]
pub const fn is_listing_response(addr: &Ipv4Addr) -> bool {
    addr.is_loopback()
}

/// Reverse an IPv4 address for DNSBL lookup.
///
/// Converts `1.2.3.4` into `4.3.2.1` (without zone suffix).
#[must_use]
pub fn reverse_ipv4(ip: &Ipv4Addr) -> String {
    let octets = ip.octets();
    format!("{}.{}.{}.{}", octets[3], octets[2], octets[1], octets[0])
}

/// Build the DNSBL query name for an address under a zone.
#[must_use]
pub fn query_name_for(ip: &Ipv4Addr, zone: &str) -> String {
    format!("{}.{zone}", reverse_ipv4(ip))
}

/// Build the full DNSBL query name for an IP under a zone.
///
/// Example: `build_query_name("203.0.113.45", "zen.example.org")` ->
/// `"45.113.0.203.zen.example.org"`
pub fn build_query_name(ip: &str, zone: &str) -> Result<String> {
    let addr: Ipv4Addr = ip
        .trim()
        .parse()
        .map_err(|_| CoreError::InvalidIp(ip.to_string()))?;
    let zone = validate_zone(zone)?;
    Ok(query_name_for(&addr, zone))
}

/// Parse a DNSBL query name back into an IP address.
///
/// Example: `parse_query_name("4.3.2.1.bl.example.org", "bl.example.org")`
/// -> `Ok(1.2.3.4)`
pub fn parse_query_name(query: &str, zone: &str) -> Result<Ipv4Addr> {
    let zone = validate_zone(zone)?;
    let prefix = query
        .strip_suffix(zone)
        .and_then(|s| s.strip_suffix('.'))
        .ok_or_else(|| {
            CoreError::InvalidQueryName(format!("query '{query}' not under zone '{zone}'"))
        })?;

    let octets: Vec<&str> = prefix.split('.').collect();
    if octets.len() != 4 {
        return Err(CoreError::InvalidQueryName(format!(
            "expected 4 octets in reversed IP, got {}",
            octets.len()
        )));
    }

    let mut parsed = [0u8; 4];
    for (slot, octet) in parsed.iter_mut().zip(octets.iter().rev()) {
        *slot = octet.parse().map_err(|_| {
            CoreError::InvalidQueryName(format!("invalid octet '{octet}' in '{query}'"))
        })?;
    }

    Ok(Ipv4Addr::from(parsed))
}

/// Normalise a configured zone name: trimmed, non-empty, no leading dot.
pub fn validate_zone(zone: &str) -> Result<&str> {
    let trimmed = zone.trim();
    if trimmed.is_empty() || trimmed.starts_with('.') || trimmed.contains(char::is_whitespace) {
        return Err(CoreError::InvalidZone(zone.to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_ipv4() {
        let ip = Ipv4Addr::new(1, 2, 3, 4);
        assert_eq!(reverse_ipv4(&ip), "4.3.2.1");

        let ip = Ipv4Addr::new(192, 168, 1, 100);
        assert_eq!(reverse_ipv4(&ip), "100.1.168.192");
    }

    #[test]
    fn test_build_query_name() {
        let name = build_query_name("203.0.113.45", "zen.example.org").unwrap();
        assert_eq!(name, "45.113.0.203.zen.example.org");

        let fqdn = build_query_name("1.2.3.4", "bl.example.org.").unwrap();
        assert_eq!(fqdn, "4.3.2.1.bl.example.org.");
    }

    #[test]
    fn test_parse_query_name() {
        let ip = parse_query_name("4.3.2.1.bl.example.org", "bl.example.org").unwrap();
        assert_eq!(ip, Ipv4Addr::new(1, 2, 3, 4));
    }

    #[test]
    fn test_roundtrip() {
        let samples = [
            Ipv4Addr::new(0, 0, 0, 0),
            Ipv4Addr::new(10, 20, 30, 40),
            Ipv4Addr::new(203, 0, 113, 42),
            Ipv4Addr::new(255, 255, 255, 255),
        ];
        for original in samples {
            let query = build_query_name(&original.to_string(), "zen.example.org").unwrap();
            let parsed = parse_query_name(&query, "zen.example.org").unwrap();
            assert_eq!(parsed, original);
        }
    }

    #[test]
    fn test_invalid_ip() {
        assert!(matches!(
            build_query_name("not.an.ip", "bl.example.org"),
            Err(CoreError::InvalidIp(_))
        ));
        assert!(build_query_name("256.0.0.1", "bl.example.org").is_err());
        assert!(build_query_name("::1", "bl.example.org").is_err());
        assert!(!is_valid_ipv4("256.0.0.1"));
        assert!(is_valid_ipv4("203.0.113.45"));
    }

    #[test]
    fn test_invalid_zone() {
        assert!(matches!(
            build_query_name("1.2.3.4", ""),
            Err(CoreError::InvalidZone(_))
        ));
        assert!(build_query_name("1.2.3.4", "   ").is_err());
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        assert!(parse_query_name("4.3.2.1.other.org", "bl.example.org").is_err());
        assert!(parse_query_name("3.2.1.bl.example.org", "bl.example.org").is_err());
        assert!(parse_query_name("x.3.2.1.bl.example.org", "bl.example.org").is_err());
    }

    #[test]
    fn test_listing_response_range() {
        assert!(is_listing_response(&Ipv4Addr::new(127, 0, 0, 2)));
        assert!(is_listing_response(&Ipv4Addr::new(127, 255, 0, 10)));
        assert!(!is_listing_response(&Ipv4Addr::new(10, 0, 0, 1)));
    }
}
