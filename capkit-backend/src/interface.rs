//! Host network interface enumeration
//!
//! Builds [`DeviceDescriptor`]s from `pnet_datalink` interfaces. Drivers use
//! this to enrich their own device lists; on Linux the descriptors are
//! completed from `/sys/class/net`.

use capkit_core::{
    device::classify, DeviceDescriptor, DeviceFlags, DeviceHints, Error, MacAddr, Result,
};
use ipnetwork::IpNetwork;
use pnet_datalink::{self, NetworkInterface};
use tracing::debug;

const IFF_RUNNING: u32 = 0x40;

/// Build a descriptor from the interface's flags and addresses
fn descriptor_from(iface: &NetworkInterface) -> DeviceDescriptor {
    let mut dev = DeviceDescriptor::new(iface.name.clone());
    dev.description = iface.description.clone();

    if let Some(mac) = iface.mac {
        dev.mac = MacAddr::new([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]);
    }

    if iface.is_up() {
        dev.flags |= DeviceFlags::UP;
    }
    if iface.flags & IFF_RUNNING != 0 {
        dev.flags |= DeviceFlags::RUNNING;
    }
    if iface.is_loopback() {
        dev.flags |= DeviceFlags::LOOPBACK;
    } else {
        dev.flags |= DeviceFlags::PROMISC_CAPABLE;
    }

    for network in &iface.ips {
        match network {
            IpNetwork::V4(net) => {
                dev.flags |= DeviceFlags::HAS_IPV4;
                if dev.ipv4.is_none() {
                    dev.ipv4 = Some(net.ip());
                    dev.netmask = Some(net.mask());
                    dev.broadcast = Some(net.broadcast());
                }
            }
            IpNetwork::V6(_) => dev.flags |= DeviceFlags::HAS_IPV6,
        }
    }

    let hints = DeviceHints {
        loopback: iface.is_loopback(),
        ..Default::default()
    };
    dev.device_type = classify(&dev.name, &hints);
    dev
}

/// List every interface the host exposes
pub fn host_devices() -> Result<Vec<DeviceDescriptor>> {
    let interfaces = pnet_datalink::interfaces();

    if interfaces.is_empty() {
        return Err(Error::GetDevicesFailed(
            "No network interfaces found. Are you running with sufficient privileges?".to_string(),
        ));
    }

    let devices: Vec<DeviceDescriptor> = interfaces
        .iter()
        .map(|iface| {
            let mut dev = descriptor_from(iface);
            sysfs::enrich(&mut dev);
            dev
        })
        .collect();

    debug!(count = devices.len(), "Enumerated host interfaces");
    Ok(devices)
}

/// Kernel interface index of `name`
pub fn if_index(name: &str) -> Option<u32> {
    pnet_datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .map(|iface| iface.index)
}

#[cfg(target_os = "linux")]
mod sysfs {
    use std::fs;
    use std::path::Path;

    use capkit_core::device::classify;
    use capkit_core::{DeviceDescriptor, DeviceFlags, DeviceHints};

    fn read_u32(path: &Path) -> Option<u32> {
        let text = fs::read_to_string(path).ok()?;
        let text = text.trim();
        match text.strip_prefix("0x") {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => text.parse().ok(),
        }
    }

    /// Fill MTU, speed and device type from `/sys/class/net/<name>`
    pub(super) fn enrich(dev: &mut DeviceDescriptor) {
        let base = Path::new("/sys/class/net").join(&dev.name);
        if !base.exists() {
            return;
        }

        if let Some(mtu) = read_u32(&base.join("mtu")) {
            dev.mtu = mtu;
        }
        // Reads fail or report -1 for links that are down
        if let Some(speed) = read_u32(&base.join("speed")) {
            dev.speed = speed;
        }

        let hints = DeviceHints {
            loopback: dev.is_loopback(),
            wireless: base.join("wireless").exists() || base.join("phy80211").exists(),
            bridge: base.join("bridge").exists(),
            bond: base.join("bonding").exists(),
            vlan: Path::new("/proc/net/vlan").join(&dev.name).exists(),
            tun_flags: read_u32(&base.join("tun_flags")),
            arp_type: read_u32(&base.join("type")),
        };
        dev.device_type = classify(&dev.name, &hints);

        if hints.wireless {
            dev.flags |= DeviceFlags::WIRELESS;
        }
        if dev.device_type.is_virtual() {
            dev.flags |= DeviceFlags::VIRTUAL;
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod sysfs {
    use capkit_core::DeviceDescriptor;

    pub(super) fn enrich(_dev: &mut DeviceDescriptor) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use capkit_core::DeviceType;

    #[test]
    fn test_host_devices() {
        // Sandboxed environments may expose no interfaces at all
        match host_devices() {
            Ok(devices) => {
                for dev in &devices {
                    assert!(!dev.name.is_empty());
                    if dev.is_loopback() {
                        assert!(!dev.is_capture_capable());
                        assert_eq!(dev.device_type, DeviceType::Loopback);
                    }
                }
            }
            Err(e) => println!("Interface enumeration unavailable: {}", e),
        }
    }

    #[test]
    fn test_descriptor_from_interface() {
        let iface = NetworkInterface {
            name: "eth7".to_string(),
            description: String::new(),
            index: 7,
            mac: Some(pnet_datalink::MacAddr::new(0x02, 0, 0, 0, 0, 0x07)),
            ips: vec![
                "192.168.1.10/24".parse().unwrap(),
                "fe80::1/64".parse().unwrap(),
            ],
            // IFF_UP | IFF_BROADCAST | IFF_RUNNING
            flags: 0x1 | 0x2 | IFF_RUNNING,
        };

        let dev = descriptor_from(&iface);
        assert_eq!(dev.name, "eth7");
        assert_eq!(dev.mac, MacAddr::new([0x02, 0, 0, 0, 0, 0x07]));
        assert!(dev.flags.contains(
            DeviceFlags::UP
                | DeviceFlags::RUNNING
                | DeviceFlags::PROMISC_CAPABLE
                | DeviceFlags::HAS_IPV4
                | DeviceFlags::HAS_IPV6
        ));
        assert!(!dev.is_loopback());
        assert_eq!(dev.ipv4, Some("192.168.1.10".parse().unwrap()));
        assert_eq!(dev.netmask, Some("255.255.255.0".parse().unwrap()));
        assert_eq!(dev.broadcast, Some("192.168.1.255".parse().unwrap()));
    }

    #[test]
    fn test_descriptor_from_loopback() {
        let iface = NetworkInterface {
            name: "lo".to_string(),
            description: String::new(),
            index: 1,
            mac: None,
            ips: vec!["127.0.0.1/8".parse().unwrap()],
            // IFF_UP | IFF_LOOPBACK | IFF_RUNNING
            flags: 0x1 | 0x8 | IFF_RUNNING,
        };

        let dev = descriptor_from(&iface);
        assert!(dev.is_loopback());
        assert!(!dev.flags.contains(DeviceFlags::PROMISC_CAPABLE));
        assert_eq!(dev.device_type, DeviceType::Loopback);
    }

    #[test]
    fn test_if_index_of_unknown_device() {
        assert_eq!(if_index("nonexistent_interface_xyz"), None);
    }
}
