use futures_util::future::BoxFuture;

use crate::error::LookupError;
use crate::types::device::{DeviceEndpoint, DeviceRecord};
use crate::types::group::{Group, GroupId, UserId};

pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, LookupError>>;

/// Groups, memberships and device subscriptions.
///
/// Lookups of groups by name use first-match semantics. Membership and device
/// writes are idempotent upserts.
pub trait SubscriberStore: Clone + Send + Sync + 'static {
    fn find_group_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<Group>>;

    fn create_group<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Group>;

    fn list_member_user_ids<'a>(&'a self, group_id: &'a GroupId) -> StoreFuture<'a, Vec<UserId>>;

    fn upsert_membership<'a>(
        &'a self,
        group_id: &'a GroupId,
        user_id: &'a UserId,
    ) -> StoreFuture<'a, ()>;

    fn list_device_records<'a>(&'a self, user_ids: &'a [UserId])
    -> StoreFuture<'a, Vec<DeviceRecord>>;

    /// One record per (user, device); registering the same device again
    /// replaces its stored descriptor.
    fn upsert_device<'a>(
        &'a self,
        user_id: &'a UserId,
        endpoint: &'a DeviceEndpoint,
    ) -> StoreFuture<'a, ()>;
}
