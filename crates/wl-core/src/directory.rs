//! Device-to-user resolution.

use std::collections::HashMap;

use thiserror::Error;

use crate::types::{DeviceId, UserId};

/// Directory construction errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// One device identifier is mapped to two users. Resolution would be
    /// undefined, so this is rejected as a configuration error.
    #[error("device {device} is mapped to both user {first} and user {second}")]
    DuplicateDevice {
        device: DeviceId,
        first: UserId,
        second: UserId,
    },
}

/// Read-only mapping from device identifier to user.
///
/// Built fresh from the user collaborator on every loop tick, so device
/// assignments take effect without restarting the tracker. Users without a
/// device simply never appear here.
#[derive(Debug, Default)]
pub struct DeviceDirectory {
    by_device: HashMap<DeviceId, UserId>,
}

impl DeviceDirectory {
    /// Builds a directory from `(user, device)` pairs.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (UserId, DeviceId)>,
    ) -> Result<Self, DirectoryError> {
        let mut by_device = HashMap::new();
        for (user, device) in entries {
            if let Some(&first) = by_device.get(&device) {
                if first != user {
                    return Err(DirectoryError::DuplicateDevice {
                        device,
                        first,
                        second: user,
                    });
                }
                continue;
            }
            by_device.insert(device, user);
        }
        Ok(Self { by_device })
    }

    /// Resolves an observed device to its user, if any is mapped.
    #[must_use]
    pub fn resolve(&self, device: &DeviceId) -> Option<UserId> {
        self.by_device.get(device).copied()
    }

    /// All users with a mapped device.
    pub fn users(&self) -> impl Iterator<Item = UserId> + '_ {
        self.by_device.values().copied()
    }

    /// Number of mapped devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_device.len()
    }

    /// Whether no device is mapped at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_device.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(s: &str) -> DeviceId {
        DeviceId::new(s).unwrap()
    }

    #[test]
    fn resolves_mapped_devices_only() {
        let dir = DeviceDirectory::from_entries([
            (UserId::new(1), device("aa:bb:cc:00:00:01")),
            (UserId::new(2), device("aa:bb:cc:00:00:02")),
        ])
        .unwrap();

        assert_eq!(dir.resolve(&device("aa:bb:cc:00:00:01")), Some(UserId::new(1)));
        assert_eq!(dir.resolve(&device("aa:bb:cc:00:00:99")), None);
        assert_eq!(dir.len(), 2);
    }

    #[test]
    fn duplicate_device_is_a_configuration_error() {
        let err = DeviceDirectory::from_entries([
            (UserId::new(1), device("aa:bb:cc:00:00:01")),
            (UserId::new(2), device("AA-BB-CC-00-00-01")),
        ])
        .unwrap_err();

        assert_eq!(
            err,
            DirectoryError::DuplicateDevice {
                device: device("aa:bb:cc:00:00:01"),
                first: UserId::new(1),
                second: UserId::new(2),
            }
        );
    }

    #[test]
    fn repeated_identical_entry_is_tolerated() {
        let dir = DeviceDirectory::from_entries([
            (UserId::new(1), device("aa:bb:cc:00:00:01")),
            (UserId::new(1), device("aa:bb:cc:00:00:01")),
        ])
        .unwrap();
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn empty_directory_resolves_nothing() {
        let entries: Vec<(UserId, DeviceId)> = Vec::new();
        let dir = DeviceDirectory::from_entries(entries).unwrap();
        assert!(dir.is_empty());
        assert_eq!(dir.users().count(), 0);
    }
}
