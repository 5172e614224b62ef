//! Static network device metadata produced by enumeration

use std::fmt;
use std::net::Ipv4Addr;

use bitflags::bitflags;

use crate::MacAddr;

bitflags! {
    /// Device property flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeviceFlags: u32 {
        const UP = 0x0001;
        const RUNNING = 0x0002;
        const PROMISC_CAPABLE = 0x0004;
        const LOOPBACK = 0x0008;
        const WIRELESS = 0x0010;
        const VIRTUAL = 0x0020;
        const HAS_IPV4 = 0x0040;
        const HAS_IPV6 = 0x0080;
    }
}

/// Kind of network device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DeviceType {
    Ethernet = 1,
    Wifi = 2,
    Loopback = 3,
    Tun = 4,
    Tap = 5,
    Bridge = 6,
    Vlan = 7,
    Bond = 8,
    Veth = 9,
    Other = 10,
}

impl DeviceType {
    /// Software devices with no physical port behind them
    pub fn is_virtual(self) -> bool {
        matches!(
            self,
            DeviceType::Tun
                | DeviceType::Tap
                | DeviceType::Bridge
                | DeviceType::Vlan
                | DeviceType::Bond
                | DeviceType::Veth
        )
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Ethernet => "ethernet",
            DeviceType::Wifi => "wifi",
            DeviceType::Loopback => "loopback",
            DeviceType::Tun => "tun",
            DeviceType::Tap => "tap",
            DeviceType::Bridge => "bridge",
            DeviceType::Vlan => "vlan",
            DeviceType::Bond => "bond",
            DeviceType::Veth => "veth",
            DeviceType::Other => "other",
        };
        f.write_str(name)
    }
}

/// OS-level facts used to classify a device
///
/// Enumerators fill in what they can observe; every field defaults to "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceHints {
    pub loopback: bool,
    pub wireless: bool,
    pub bridge: bool,
    pub bond: bool,
    pub vlan: bool,
    /// Kernel `tun_flags` if the device is a tun/tap
    pub tun_flags: Option<u32>,
    /// ARPHRD_* hardware type
    pub arp_type: Option<u32>,
}

const IFF_TUN: u32 = 0x0001;
const IFF_TAP: u32 = 0x0002;
const ARPHRD_ETHER: u32 = 1;
const ARPHRD_LOOPBACK: u32 = 772;
const ARPHRD_IEEE80211: u32 = 801;
const ARPHRD_IEEE80211_RADIOTAP: u32 = 803;
const ARPHRD_NONE: u32 = 65534;

/// Classify a device from its name and observed hints
pub fn classify(name: &str, hints: &DeviceHints) -> DeviceType {
    if hints.loopback || hints.arp_type == Some(ARPHRD_LOOPBACK) || name == "lo" {
        return DeviceType::Loopback;
    }
    if let Some(flags) = hints.tun_flags {
        if flags & IFF_TAP != 0 {
            return DeviceType::Tap;
        }
        if flags & IFF_TUN != 0 {
            return DeviceType::Tun;
        }
    }
    if hints.wireless
        || matches!(
            hints.arp_type,
            Some(ARPHRD_IEEE80211) | Some(ARPHRD_IEEE80211_RADIOTAP)
        )
    {
        return DeviceType::Wifi;
    }
    if hints.bridge {
        return DeviceType::Bridge;
    }
    if hints.bond {
        return DeviceType::Bond;
    }
    if hints.vlan {
        return DeviceType::Vlan;
    }

    if name.starts_with("veth") {
        DeviceType::Veth
    } else if name.starts_with("tun") {
        DeviceType::Tun
    } else if name.starts_with("tap") {
        DeviceType::Tap
    } else if name.starts_with("br") || name.starts_with("virbr") {
        DeviceType::Bridge
    } else if name.starts_with("bond") {
        DeviceType::Bond
    } else if name.starts_with("wl") || name.starts_with("wlan") {
        DeviceType::Wifi
    } else if name.contains('.') || name.starts_with("vlan") {
        DeviceType::Vlan
    } else if hints.arp_type == Some(ARPHRD_NONE) {
        DeviceType::Tun
    } else if hints.arp_type.map_or(true, |t| t == ARPHRD_ETHER) {
        DeviceType::Ethernet
    } else {
        DeviceType::Other
    }
}

/// Information about a capture-capable network device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Interface name (e.g., "eth0", "wlan0")
    pub name: String,
    /// Human-readable description
    pub description: String,
    pub flags: DeviceFlags,
    pub device_type: DeviceType,
    /// MTU in bytes (0 if unknown)
    pub mtu: u32,
    /// Link speed in Mbit/s (0 if unknown)
    pub speed: u32,
    /// MAC address (zero if the device has none)
    pub mac: MacAddr,
    pub ipv4: Option<Ipv4Addr>,
    pub netmask: Option<Ipv4Addr>,
    pub broadcast: Option<Ipv4Addr>,
}

impl DeviceDescriptor {
    /// Bare descriptor with only a name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            flags: DeviceFlags::empty(),
            device_type: DeviceType::Other,
            mtu: 0,
            speed: 0,
            mac: MacAddr::zero(),
            ipv4: None,
            netmask: None,
            broadcast: None,
        }
    }

    pub fn is_up(&self) -> bool {
        self.flags.contains(DeviceFlags::UP)
    }

    pub fn is_loopback(&self) -> bool {
        self.flags.contains(DeviceFlags::LOOPBACK)
    }

    /// Check if the device is suitable for packet capture
    pub fn is_capture_capable(&self) -> bool {
        self.is_up() && !self.is_loopback()
    }

    /// Fill fields that `self` left unknown from `other` (same device seen by
    /// a second enumerator)
    pub fn merge_from(&mut self, other: &DeviceDescriptor) {
        if self.description.is_empty() {
            self.description = other.description.clone();
        }
        self.flags |= other.flags;
        if self.device_type == DeviceType::Other {
            self.device_type = other.device_type;
        }
        if self.mtu == 0 {
            self.mtu = other.mtu;
        }
        if self.speed == 0 {
            self.speed = other.speed;
        }
        if self.mac.is_zero() {
            self.mac = other.mac;
        }
        if self.ipv4.is_none() {
            self.ipv4 = other.ipv4;
            self.netmask = other.netmask;
            self.broadcast = other.broadcast;
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] mac {}", self.name, self.device_type, self.mac)?;
        if self.mtu > 0 {
            write!(f, " mtu {}", self.mtu)?;
        }
        if let Some(ip) = self.ipv4 {
            write!(f, " inet {}", ip)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values() {
        assert_eq!(DeviceFlags::UP.bits(), 0x01);
        assert_eq!(DeviceFlags::HAS_IPV6.bits(), 0x80);
        assert_eq!(DeviceType::Ethernet as u32, 1);
        assert_eq!(DeviceType::Other as u32, 10);
    }

    #[test]
    fn test_classify_by_hints() {
        let hints = DeviceHints {
            loopback: true,
            ..Default::default()
        };
        assert_eq!(classify("anything", &hints), DeviceType::Loopback);

        let hints = DeviceHints {
            tun_flags: Some(IFF_TAP),
            ..Default::default()
        };
        assert_eq!(classify("vm0", &hints), DeviceType::Tap);

        let hints = DeviceHints {
            wireless: true,
            ..Default::default()
        };
        assert_eq!(classify("radio", &hints), DeviceType::Wifi);

        let hints = DeviceHints {
            bridge: true,
            ..Default::default()
        };
        assert_eq!(classify("lan", &hints), DeviceType::Bridge);
    }

    #[test]
    fn test_classify_by_name() {
        let none = DeviceHints::default();
        assert_eq!(classify("lo", &none), DeviceType::Loopback);
        assert_eq!(classify("veth12ab", &none), DeviceType::Veth);
        assert_eq!(classify("eth0.100", &none), DeviceType::Vlan);
        assert_eq!(classify("bond0", &none), DeviceType::Bond);
        assert_eq!(classify("wlp2s0", &none), DeviceType::Wifi);
        assert_eq!(classify("eth0", &none), DeviceType::Ethernet);

        let hints = DeviceHints {
            arp_type: Some(280),
            ..Default::default()
        };
        assert_eq!(classify("can0", &hints), DeviceType::Other);
    }

    #[test]
    fn test_capture_capable() {
        let mut dev = DeviceDescriptor::new("eth0");
        assert!(!dev.is_capture_capable());
        dev.flags |= DeviceFlags::UP;
        assert!(dev.is_capture_capable());
        dev.flags |= DeviceFlags::LOOPBACK;
        assert!(!dev.is_capture_capable());
    }

    #[test]
    fn test_merge_from_fills_unknowns() {
        let mut a = DeviceDescriptor::new("eth0");
        a.flags = DeviceFlags::UP;
        a.mtu = 9000;

        let mut b = DeviceDescriptor::new("eth0");
        b.flags = DeviceFlags::RUNNING | DeviceFlags::HAS_IPV4;
        b.mtu = 1500;
        b.mac = MacAddr::new([2, 0, 0, 0, 0, 1]);
        b.ipv4 = Some(Ipv4Addr::new(10, 0, 0, 2));
        b.device_type = DeviceType::Ethernet;

        a.merge_from(&b);
        assert_eq!(a.mtu, 9000);
        assert_eq!(a.mac, b.mac);
        assert_eq!(a.ipv4, b.ipv4);
        assert_eq!(a.device_type, DeviceType::Ethernet);
        assert!(a.flags.contains(DeviceFlags::UP | DeviceFlags::RUNNING));
    }
}
