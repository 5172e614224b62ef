//! Common types used throughout capkit

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// MAC Address (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Create a new MAC address
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Broadcast MAC address (ff:ff:ff:ff:ff:ff)
    pub const fn broadcast() -> Self {
        Self([0xff; 6])
    }

    /// Zero MAC address (00:00:00:00:00:00)
    pub const fn zero() -> Self {
        Self([0x00; 6])
    }

    /// True for the all-zero address drivers report when no MAC exists
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 6]
    }

    /// Get bytes as slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to array
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(Error::invalid_param("mac", "expected six ':'-separated octets"));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| Error::invalid_param("mac", format!("invalid octet '{}'", part)))?;
        }

        Ok(MacAddr(bytes))
    }
}

/// Backend type tag used to select a registered driver
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// libpcap / WinPcap / Npcap
    #[default]
    Pcap,
    /// PF_RING
    PfRing,
    /// DPDK poll-mode drivers
    Dpdk,
    /// eBPF / AF_XDP
    Ebpf,
    /// In-memory frame generator
    Synthetic,
    /// Any other driver, identified by its tag
    Custom(String),
}

impl BackendType {
    /// Tag for a custom driver
    pub fn custom<S: Into<String>>(tag: S) -> Self {
        BackendType::Custom(tag.into())
    }

    /// Canonical string tag
    pub fn as_str(&self) -> &str {
        match self {
            BackendType::Pcap => "pcap",
            BackendType::PfRing => "pfring",
            BackendType::Dpdk => "dpdk",
            BackendType::Ebpf => "ebpf",
            BackendType::Synthetic => "synthetic",
            BackendType::Custom(tag) => tag,
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        if tag.is_empty() {
            return Err(Error::invalid_param("backend", "empty backend tag"));
        }

        Ok(match tag.to_ascii_lowercase().as_str() {
            "pcap" | "libpcap" => BackendType::Pcap,
            "pfring" | "pf_ring" => BackendType::PfRing,
            "dpdk" => BackendType::Dpdk,
            "ebpf" | "xdp" | "af_xdp" => BackendType::Ebpf,
            "synthetic" => BackendType::Synthetic,
            _ => BackendType::Custom(tag.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_roundtrip_display() {
        let mac: MacAddr = "00:1b:21:0a:ff:10".parse().unwrap();
        assert_eq!(mac.octets(), [0x00, 0x1b, 0x21, 0x0a, 0xff, 0x10]);
        assert_eq!(mac.to_string(), "00:1b:21:0a:ff:10");
        assert!(!mac.is_zero());
        assert!(MacAddr::zero().is_zero());
    }

    #[test]
    fn test_mac_invalid() {
        assert!("00:11:22".parse::<MacAddr>().is_err());
        assert!("zz:11:22:33:44:55".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_backend_type_parse() {
        assert_eq!("pcap".parse::<BackendType>().unwrap(), BackendType::Pcap);
        assert_eq!("PF_RING".parse::<BackendType>().unwrap(), BackendType::PfRing);
        assert_eq!("xdp".parse::<BackendType>().unwrap(), BackendType::Ebpf);
        assert_eq!(
            "TEST".parse::<BackendType>().unwrap(),
            BackendType::custom("TEST")
        );
        assert!("   ".parse::<BackendType>().is_err());
        assert_eq!(BackendType::custom("TEST").to_string(), "TEST");
        assert_eq!(BackendType::default(), BackendType::Pcap);
    }
}
