//! Borrowed packet view handed from a driver to the delivery callback

use std::time::SystemTime;

/// A captured frame, borrowed from the driver's buffer
///
/// The record lives only for the duration of one callback invocation: the
/// driver may reuse or free the underlying buffer as soon as the callback
/// returns. Callers that need the bytes afterwards must copy them with
/// [`PacketRecord::to_vec`].
///
/// Metadata other than lengths and timestamp is optional and zero unless the
/// backend populates it.
#[derive(Debug, Clone, Copy)]
pub struct PacketRecord<'a> {
    data: &'a [u8],
    wire_len: u32,
    timestamp: SystemTime,
    if_index: u32,
    flags: u32,
    protocol: u32,
    vlan_tci: u16,
    hash: u32,
}

impl<'a> PacketRecord<'a> {
    /// View over `data`, assuming the frame was not truncated
    pub fn new(data: &'a [u8], timestamp: SystemTime) -> Self {
        Self {
            data,
            wire_len: data.len() as u32,
            timestamp,
            if_index: 0,
            flags: 0,
            protocol: 0,
            vlan_tci: 0,
            hash: 0,
        }
    }

    /// Original length on the wire (may exceed the captured length)
    pub fn with_wire_len(mut self, wire_len: u32) -> Self {
        self.wire_len = wire_len.max(self.data.len() as u32);
        self
    }

    /// Set the receiving interface index
    pub fn with_if_index(mut self, if_index: u32) -> Self {
        self.if_index = if_index;
        self
    }

    /// Set driver-specific flags
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Set the link-layer protocol hint
    pub fn with_protocol(mut self, protocol: u32) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the stripped VLAN tag
    pub fn with_vlan_tci(mut self, vlan_tci: u16) -> Self {
        self.vlan_tci = vlan_tci;
        self
    }

    /// Set the driver flow hash
    pub fn with_hash(mut self, hash: u32) -> Self {
        self.hash = hash;
        self
    }

    /// Captured bytes
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Number of captured bytes
    pub fn caplen(&self) -> u32 {
        self.data.len() as u32
    }

    /// Length of the frame on the wire
    pub fn wire_len(&self) -> u32 {
        self.wire_len
    }

    /// True if the snap length cut the frame short
    pub fn is_truncated(&self) -> bool {
        self.wire_len > self.caplen()
    }

    /// Capture timestamp
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Receiving interface index, 0 if unknown
    pub fn if_index(&self) -> u32 {
        self.if_index
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Protocol hint (e.g. ethertype) if the backend filled it in
    pub fn protocol(&self) -> u32 {
        self.protocol
    }

    /// 802.1Q tag control information; 0 when untagged or unknown
    pub fn vlan_tci(&self) -> u16 {
        self.vlan_tci
    }

    /// VLAN ID extracted from the TCI
    pub fn vlan_id(&self) -> Option<u16> {
        match self.vlan_tci & 0x0fff {
            0 => None,
            id => Some(id),
        }
    }

    /// Flow hash computed by the driver or NIC
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Number of captured bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy the captured bytes out of the driver buffer
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_zero() {
        let buf = [0u8; 64];
        let pkt = PacketRecord::new(&buf, SystemTime::UNIX_EPOCH);
        assert_eq!(pkt.caplen(), 64);
        assert_eq!(pkt.wire_len(), 64);
        assert_eq!(pkt.if_index(), 0);
        assert_eq!(pkt.protocol(), 0);
        assert_eq!(pkt.vlan_tci(), 0);
        assert_eq!(pkt.vlan_id(), None);
        assert_eq!(pkt.hash(), 0);
        assert!(!pkt.is_truncated());
    }

    #[test]
    fn test_truncation_and_metadata() {
        let buf = [0xaau8; 96];
        let pkt = PacketRecord::new(&buf, SystemTime::now())
            .with_wire_len(1514)
            .with_if_index(3)
            .with_protocol(0x0800)
            .with_vlan_tci(0x2064)
            .with_hash(0xdead_beef);

        assert!(pkt.is_truncated());
        assert_eq!(pkt.wire_len(), 1514);
        assert_eq!(pkt.caplen(), 96);
        assert_eq!(pkt.if_index(), 3);
        assert_eq!(pkt.vlan_id(), Some(0x064));
        assert_eq!(pkt.hash(), 0xdead_beef);
        assert_eq!(pkt.to_vec().len(), 96);
    }

    #[test]
    fn test_wire_len_never_below_caplen() {
        let buf = [0u8; 60];
        let pkt = PacketRecord::new(&buf, SystemTime::now()).with_wire_len(10);
        assert_eq!(pkt.wire_len(), 60);
    }
}
