// Core types used across all btserial components
use crate::error::TransportError;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// Bluetooth device address (6 bytes, most significant first as written)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress(pub [u8; 6]);

impl DeviceAddress {
    pub fn new(octets: [u8; 6]) -> Self {
        DeviceAddress(octets)
    }

    /// Parse the `AA:BB:CC:DD:EE:FF` form. `-` is accepted as separator too.
    pub fn parse(s: &str) -> Result<Self, TransportError> {
        let invalid = || TransportError::InvalidAddress(s.to_string());

        let mut octets = [0u8; 6];
        let mut parts = s.split(|c| c == ':' || c == '-');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(DeviceAddress(octets))
    }

    /// Octets in the little-endian order used by the kernel's `bdaddr_t`.
    pub fn to_le_bytes(&self) -> [u8; 6] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for DeviceAddress {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceAddress::parse(s)
    }
}

// Service identifier (128-bit UUID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId(pub Uuid);

impl ServiceId {
    /// Serial Port Profile, used when no service is given.
    pub const SERIAL_PORT: ServiceId =
        ServiceId(Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB));

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(ServiceId)
    }
}

impl Default for ServiceId {
    fn default() -> Self {
        ServiceId::SERIAL_PORT
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ServiceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceId::parse(s)
    }
}

// RFCOMM channel number
pub type Channel = u8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let addr = DeviceAddress::parse("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(addr.0, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:FF");

        let dashed: DeviceAddress = "01-23-45-67-89-AB".parse().unwrap();
        assert_eq!(dashed.0, [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB]);
    }

    #[test]
    fn test_address_rejects_malformed() {
        for bad in ["", "AA:BB:CC:DD:EE", "AA:BB:CC:DD:EE:FF:00", "AA:BB:CC:DD:EE:GG", "A:BB:CC:DD:EE:FFF"] {
            assert!(
                matches!(DeviceAddress::parse(bad), Err(TransportError::InvalidAddress(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_address_le_bytes() {
        let addr = DeviceAddress::new([1, 2, 3, 4, 5, 6]);
        assert_eq!(addr.to_le_bytes(), [6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_serial_port_service() {
        assert_eq!(ServiceId::default(), ServiceId::SERIAL_PORT);
        assert_eq!(
            ServiceId::SERIAL_PORT.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
        let parsed = ServiceId::parse("00001101-0000-1000-8000-00805F9B34FB").unwrap();
        assert_eq!(parsed, ServiceId::SERIAL_PORT);
    }
}
