//! Block nature discriminants (spec.md §3 "Nature variants").

use serde::{Deserialize, Serialize};

use ward_core::{InvalidBlockCode, WardError};

/// The twelve block natures this codec understands (SPEC_FULL.md §6
/// decision 2: "no version-specific nature is added or removed").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Nature {
    TrustchainCreation = 0,
    DeviceCreationV1 = 1,
    DeviceCreationV2 = 2,
    DeviceCreationV3 = 3,
    DeviceRevocationV1 = 4,
    DeviceRevocationV2 = 5,
    KeyPublishToDevice = 6,
    KeyPublishToUser = 7,
    KeyPublishToUserGroup = 8,
    KeyPublishToProvisionalUser = 9,
    UserGroupCreation = 10,
    UserGroupAddition = 11,
}

impl Nature {
    /// Stable wire discriminant.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire discriminant. Unknown values are [`WardError::UpgradeRequired`]
    /// (spec.md §4.1 "*UpgradeRequired* on unknown version or nature").
    pub fn from_u8(value: u8) -> Result<Self, WardError> {
        Ok(match value {
            0 => Self::TrustchainCreation,
            1 => Self::DeviceCreationV1,
            2 => Self::DeviceCreationV2,
            3 => Self::DeviceCreationV3,
            4 => Self::DeviceRevocationV1,
            5 => Self::DeviceRevocationV2,
            6 => Self::KeyPublishToDevice,
            7 => Self::KeyPublishToUser,
            8 => Self::KeyPublishToUserGroup,
            9 => Self::KeyPublishToProvisionalUser,
            10 => Self::UserGroupCreation,
            11 => Self::UserGroupAddition,
            other => {
                return Err(WardError::upgrade_required(format!(
                    "unknown block nature discriminant {other}"
                )))
            }
        })
    }

    /// Whether this nature is a device-creation variant, of any version.
    pub fn is_device_creation(self) -> bool {
        matches!(
            self,
            Self::DeviceCreationV1 | Self::DeviceCreationV2 | Self::DeviceCreationV3
        )
    }

    /// Whether this nature is a device-revocation variant, of any version.
    pub fn is_device_revocation(self) -> bool {
        matches!(self, Self::DeviceRevocationV1 | Self::DeviceRevocationV2)
    }

    /// Whether this nature is any key-publish variant.
    pub fn is_key_publish(self) -> bool {
        matches!(
            self,
            Self::KeyPublishToDevice
                | Self::KeyPublishToUser
                | Self::KeyPublishToUserGroup
                | Self::KeyPublishToProvisionalUser
        )
    }
}

/// Convert an unrecognized nature into the verifier's structured
/// failure code, for callers that already have a [`Nature`] in hand
/// but need to reject it for a reason other than "unknown discriminant".
pub fn invalid_nature(message: impl Into<String>) -> WardError {
    WardError::invalid_block(InvalidBlockCode::InvalidNature, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_known_discriminant() {
        for raw in 0u8..=11 {
            let nature = Nature::from_u8(raw).expect("known nature");
            assert_eq!(nature.as_u8(), raw);
        }
    }

    #[test]
    fn unknown_discriminant_is_upgrade_required() {
        assert!(matches!(
            Nature::from_u8(200),
            Err(WardError::UpgradeRequired { .. })
        ));
    }
}
