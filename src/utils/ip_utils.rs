use std::net::Ipv4Addr;

/// IPv4 prefix arithmetic used by the address allocator

/// Netmask for a prefix length, e.g. 24 -> 0xffff_ff00
pub fn prefix_mask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - p),
    }
}

/// Dotted-quad netmask for a prefix length
pub fn netmask(prefix_len: u8) -> Ipv4Addr {
    Ipv4Addr::from(prefix_mask(prefix_len))
}

/// Network address of `ip` under the given prefix
pub fn network_address(ip: Ipv4Addr, prefix_len: u8) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) & prefix_mask(prefix_len))
}

/// Number of addresses covered by a prefix (including network and broadcast)
pub fn block_size(prefix_len: u8) -> u64 {
    1u64 << (32 - u32::from(prefix_len.min(32)))
}

/// Number of assignable host addresses in a prefix
///
/// /31 point-to-point links use both addresses, /32 is a single host.
pub fn usable_hosts(prefix_len: u8) -> u64 {
    match prefix_len {
        p if p >= 32 => 1,
        31 => 2,
        p => block_size(p) - 2,
    }
}

/// Parse a `a.b.c.d/len` string
pub fn parse_cidr(cidr: &str) -> Result<(Ipv4Addr, u8), String> {
    let (addr, len) = cidr
        .split_once('/')
        .ok_or_else(|| format!("Missing prefix length in '{}'", cidr))?;
    let addr = addr
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|e| format!("Invalid IPv4 address in '{}': {}", cidr, e))?;
    let len = len
        .trim()
        .parse::<u8>()
        .map_err(|e| format!("Invalid prefix length in '{}': {}", cidr, e))?;
    if len > 32 {
        return Err(format!("Prefix length {} out of range in '{}'", len, cidr));
    }
    Ok((addr, len))
}

/// Check if an IPv4 address is private (RFC 1918)
pub fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    // 10.0.0.0/8
    octets[0] == 10 ||
    // 172.16.0.0/12
    (octets[0] == 172 && octets[1] >= 16 && octets[1] <= 31) ||
    // 192.168.0.0/16
    (octets[0] == 192 && octets[1] == 168)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_math() {
        assert_eq!(prefix_mask(24), 0xffff_ff00);
        assert_eq!(prefix_mask(0), 0);
        assert_eq!(prefix_mask(32), u32::MAX);
        assert_eq!(netmask(16), Ipv4Addr::new(255, 255, 0, 0));
        assert_eq!(
            network_address(Ipv4Addr::new(10, 1, 2, 3), 16),
            Ipv4Addr::new(10, 1, 0, 0)
        );
        assert_eq!(block_size(24), 256);
        assert_eq!(block_size(0), 1u64 << 32);
        assert_eq!(usable_hosts(24), 254);
        assert_eq!(usable_hosts(30), 2);
        assert_eq!(usable_hosts(31), 2);
        assert_eq!(usable_hosts(32), 1);
    }

    #[test]
    fn test_parse_cidr() {
        assert_eq!(
            parse_cidr("10.0.0.0/16"),
            Ok((Ipv4Addr::new(10, 0, 0, 0), 16))
        );
        assert!(parse_cidr("10.0.0.0").is_err());
        assert!(parse_cidr("10.0.0.0/33").is_err());
        assert!(parse_cidr("not.an.ip/8").is_err());
    }

    #[test]
    fn test_private_ranges() {
        assert!(is_private_ipv4(Ipv4Addr::new(10, 3, 0, 0)));
        assert!(is_private_ipv4(Ipv4Addr::new(172, 20, 0, 1)));
        assert!(is_private_ipv4(Ipv4Addr::new(192, 168, 0, 1)));
        assert!(!is_private_ipv4(Ipv4Addr::new(172, 32, 0, 1)));
        assert!(!is_private_ipv4(Ipv4Addr::new(8, 8, 8, 8)));
    }
}
