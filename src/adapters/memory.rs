use std::sync::{Arc, RwLock};

use crate::error::LookupError;
use crate::ports::SubscriberStore;
use crate::ports::store::StoreFuture;
use crate::types::device::{DeviceEndpoint, DeviceRecord};
use crate::types::group::{Group, GroupId, UserId};

#[derive(Debug, Default)]
struct MemoryData {
    next_group_id: u64,
    groups: Vec<Group>,
    memberships: Vec<(GroupId, UserId)>,
    devices: Vec<StoredDevice>,
    offline: bool,
}

#[derive(Debug)]
struct StoredDevice {
    user_id: UserId,
    key: String,
    push_token: String,
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<MemoryData>>,
}

impl MemoryStore {
    fn read<R>(&self, f: impl FnOnce(&MemoryData) -> R) -> Result<R, LookupError> {
        let data = self.data.read().expect("memory store lock");
        if data.offline {
            return Err(LookupError::Transport("store is offline".to_string()));
        }
        Ok(f(&data))
    }

    fn write<R>(&self, f: impl FnOnce(&mut MemoryData) -> R) -> Result<R, LookupError> {
        let mut data = self.data.write().expect("memory store lock");
        if data.offline {
            return Err(LookupError::Transport("store is offline".to_string()));
        }
        Ok(f(&mut data))
    }

    /// Stores a device record exactly as given, bypassing endpoint parsing.
    #[cfg(test)]
    pub(crate) fn insert_raw_device(&self, user_id: &UserId, push_token: &str) {
        let mut data = self.data.write().expect("memory store lock");
        data.devices.push(StoredDevice {
            user_id: user_id.clone(),
            key: push_token.to_string(),
            push_token: push_token.to_string(),
        });
    }

    #[cfg(test)]
    pub(crate) fn set_offline(&self, offline: bool) {
        self.data.write().expect("memory store lock").offline = offline;
    }
}

impl SubscriberStore for MemoryStore {
    fn find_group_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<Group>> {
        let result = self.read(|data| data.groups.iter().find(|group| group.name == name).cloned());
        Box::pin(std::future::ready(result))
    }

    fn create_group<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Group> {
        let result = self.write(|data| {
            data.next_group_id += 1;
            let group = Group {
                id: GroupId(data.next_group_id.to_string()),
                name: name.to_string(),
            };
            data.groups.push(group.clone());
            group
        });
        Box::pin(std::future::ready(result))
    }

    fn list_member_user_ids<'a>(&'a self, group_id: &'a GroupId) -> StoreFuture<'a, Vec<UserId>> {
        let result = self.read(|data| {
            data.memberships
                .iter()
                .filter(|(group, _)| group == group_id)
                .map(|(_, user)| user.clone())
                .collect()
        });
        Box::pin(std::future::ready(result))
    }

    fn upsert_membership<'a>(
        &'a self,
        group_id: &'a GroupId,
        user_id: &'a UserId,
    ) -> StoreFuture<'a, ()> {
        let result = self.write(|data| {
            let exists = data
                .memberships
                .iter()
                .any(|(group, user)| group == group_id && user == user_id);
            if !exists {
                data.memberships.push((group_id.clone(), user_id.clone()));
            }
        });
        Box::pin(std::future::ready(result))
    }

    fn list_device_records<'a>(
        &'a self,
        user_ids: &'a [UserId],
    ) -> StoreFuture<'a, Vec<DeviceRecord>> {
        let result = self.read(|data| {
            data.devices
                .iter()
                .filter(|device| user_ids.contains(&device.user_id))
                .map(|device| DeviceRecord {
                    user_id: device.user_id.clone(),
                    push_token: device.push_token.clone(),
                })
                .collect()
        });
        Box::pin(std::future::ready(result))
    }

    fn upsert_device<'a>(
        &'a self,
        user_id: &'a UserId,
        endpoint: &'a DeviceEndpoint,
    ) -> StoreFuture<'a, ()> {
        let key = endpoint.dedup_key().to_string();
        let push_token = endpoint.to_push_token();
        let result = self.write(|data| {
            match data
                .devices
                .iter_mut()
                .find(|device| &device.user_id == user_id && device.key == key)
            {
                Some(device) => device.push_token = push_token,
                None => data.devices.push(StoredDevice {
                    user_id: user_id.clone(),
                    key,
                    push_token,
                }),
            }
        });
        Box::pin(std::future::ready(result))
    }
}
