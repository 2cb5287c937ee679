//! BLE Service and Characteristic UUIDs.
//!
//! Contains the UUID constants exposed by the FeedFlow firmware.

use uuid::Uuid;

/// Advertised local name of the feeder.
pub const DEVICE_NAME: &str = "FeedFlow";

/// FeedFlow service UUID.
pub const FEEDER_SERVICE_UUID: Uuid = Uuid::from_u128(0x4faf_c201_1fb5_459e_8fcc_c5c9c331914b);

/// Data characteristic UUID (Read, Notify). Carries telemetry lines and servo sentinels.
pub const DATA_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xbeb5_483e_36e1_4688_b7f5_ea07361b26a8);

/// Command characteristic UUID (Write). Accepts `RUN`, `STOP` and `STATUS`.
pub const COMMAND_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xbeb5_483e_36e1_4688_b7f5_ea07361b26a9);

/// Check if a service UUID is the FeedFlow service.
pub fn is_feeder_service(uuid: &Uuid) -> bool {
    *uuid == FEEDER_SERVICE_UUID
}

/// Check if an advertised name belongs to a FeedFlow feeder.
pub fn is_feeder_name(name: &str) -> bool {
    name == DEVICE_NAME
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_strings() {
        assert_eq!(
            FEEDER_SERVICE_UUID.to_string(),
            "4fafc201-1fb5-459e-8fcc-c5c9c331914b"
        );
        assert_eq!(
            DATA_CHARACTERISTIC_UUID.to_string(),
            "beb5483e-36e1-4688-b7f5-ea07361b26a8"
        );
        assert_eq!(
            COMMAND_CHARACTERISTIC_UUID.to_string(),
            "beb5483e-36e1-4688-b7f5-ea07361b26a9"
        );
    }

    #[test]
    fn test_is_feeder() {
        assert!(is_feeder_service(&FEEDER_SERVICE_UUID));
        assert!(!is_feeder_service(&DATA_CHARACTERISTIC_UUID));
        assert!(is_feeder_name("FeedFlow"));
        assert!(!is_feeder_name("feedflow"));
    }
}
