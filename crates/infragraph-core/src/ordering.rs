//! Orderings shared by every sorted collection in a generation.

use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::InfraGraphError;

/// Case-aware name ordering.
///
/// Characters are compared after folding to lowercase, so `alpha < Beta < charlie`.
/// Names that differ only by case fall back to a raw comparison, which puts the
/// uppercase spelling first and keeps the order total.
///
/// Folding happens before the byte comparison, so the ASCII punctuation
/// between `Z` and `a` (`[ \ ] ^ _` and the backtick) sorts before every
/// letter: `my_db < myapp`. Case-insensitive orderings that uppercase instead
/// put that punctuation after letters; this one deliberately does not.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.cmp(b))
}

/// Orders CIDR blocks by network address bytes, then prefix length.
/// Unparseable blocks sort after every valid one.
pub fn compare_cidrs(a: &str, b: &str) -> Ordering {
    match (a.parse::<Cidr>(), b.parse::<Cidr>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn octets(&self) -> Vec<u8> {
        match self.network {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        }
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(_), IpAddr::V4(v4)) => {
                IpAddr::V4(Ipv4Addr::from(u32::from(v4) & v4_mask(self.prefix))) == self.network
            }
            (IpAddr::V6(_), IpAddr::V6(v6)) => {
                IpAddr::V6(Ipv6Addr::from(u128::from(v6) & v6_mask(self.prefix))) == self.network
            }
            _ => false,
        }
    }
}

fn v4_mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn v6_mask(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

impl FromStr for Cidr {
    type Err = InfraGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InfraGraphError::InvalidCidr(s.to_string());
        let (addr, prefix) = s.trim().split_once('/').ok_or_else(invalid)?;
        let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        let network = match addr {
            IpAddr::V4(v4) if prefix <= 32 => {
                IpAddr::V4(Ipv4Addr::from(u32::from(v4) & v4_mask(prefix)))
            }
            IpAddr::V6(v6) if prefix <= 128 => {
                IpAddr::V6(Ipv6Addr::from(u128::from(v6) & v6_mask(prefix)))
            }
            _ => return Err(invalid()),
        };
        Ok(Self { network, prefix })
    }
}

impl Ord for Cidr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.octets()
            .cmp(&other.octets())
            .then(self.prefix.cmp(&other.prefix))
    }
}

impl PartialOrd for Cidr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_fold_case_before_comparing() {
        let mut names = vec!["charlie", "Beta", "alpha", "Alpha", "beta-2", "b"];
        names.sort_by(|a, b| compare_names(a, b));
        assert_eq!(names, vec!["Alpha", "alpha", "b", "Beta", "beta-2", "charlie"]);
    }

    #[test]
    fn name_order_is_antisymmetric_around_punctuation() {
        // '_' sits between the uppercase and lowercase ASCII ranges.
        assert_eq!(compare_names("_x", "ax"), Ordering::Less);
        assert_eq!(compare_names("ax", "_x"), Ordering::Greater);
        assert_eq!(compare_names("_x", "Ax"), Ordering::Less);
        assert_eq!(compare_names("web", "web"), Ordering::Equal);
        assert_eq!(compare_names("my_db", "myapp"), Ordering::Less);
        assert_eq!(compare_names("MY_DB", "myapp"), Ordering::Less);
    }

    #[test]
    fn shorter_prefix_sorts_first() {
        assert_eq!(compare_names("web", "web-1"), Ordering::Less);
        assert_eq!(compare_names("WEB-1", "web"), Ordering::Greater);
    }

    #[test]
    fn cidrs_compare_by_network_bytes() {
        assert_eq!(compare_cidrs("10.0.2.0/24", "10.0.10.0/24"), Ordering::Less);
        assert_eq!(compare_cidrs("10.0.10.0/24", "9.255.0.0/16"), Ordering::Greater);
        assert_eq!(compare_cidrs("10.0.0.0/16", "10.0.0.0/24"), Ordering::Less);
        assert_eq!(compare_cidrs("garbage", "10.0.0.0/8"), Ordering::Greater);
    }

    #[test]
    fn cidr_parsing_masks_host_bits() {
        let cidr: Cidr = "10.1.2.3/16".parse().unwrap();
        assert_eq!(cidr.to_string(), "10.1.0.0/16");
        assert!(cidr.contains("10.1.200.7".parse().unwrap()));
        assert!(!cidr.contains("10.2.0.1".parse().unwrap()));
        assert!("10.0.0.0/33".parse::<Cidr>().is_err());
        assert!("10.0.0.0".parse::<Cidr>().is_err());
    }
}
