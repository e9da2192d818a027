//! Shipping address deduplication.
//!
//! Addresses are identified by `(line1, city, postal_code)`. A signed-in
//! buyer only ever reuses their own stored addresses; a guest reuses any
//! stored address with the same key.

use bid_gallery_core::UserId;

use crate::db::{CheckoutUnit, RepositoryError};
use crate::models::{ManagedAddress, ShippingAddress};

/// Resolves submitted addresses to stored records within one checkout unit.
pub struct AddressDeduplicator<'u> {
    unit: &'u mut dyn CheckoutUnit,
}

impl<'u> AddressDeduplicator<'u> {
    #[must_use]
    pub const fn new(unit: &'u mut dyn CheckoutUnit) -> Self {
        Self { unit }
    }

    /// Return the stored address matching `address`, or store it.
    ///
    /// An existing record is returned unchanged; submitted fields outside
    /// the key are not merged into it. A new record is owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup or insert fails.
    pub async fn resolve(
        &mut self,
        address: &ShippingAddress,
        owner: Option<UserId>,
    ) -> Result<ManagedAddress, RepositoryError> {
        if let Some(existing) = self.unit.find_address(owner, &address.key()).await? {
            tracing::info!(address_id = %existing.id, "Reusing existing address");
            return Ok(existing);
        }

        let created = self.unit.insert_address(owner, address).await?;
        tracing::info!(address_id = %created.id, "Saved new address");
        Ok(created)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::{GalleryStore, MemoryStore};

    fn address(line1: &str, first_name: &str) -> ShippingAddress {
        ShippingAddress {
            first_name: first_name.to_owned(),
            last_name: "Hansen".to_owned(),
            email: "buyer@example.com".to_owned(),
            phone: "+4511223344".to_owned(),
            country: "Denmark".to_owned(),
            postal_code: "8000".to_owned(),
            city: "Aarhus".to_owned(),
            line1: line1.to_owned(),
            line2: None,
        }
    }

    #[tokio::test]
    async fn test_resolve_twice_returns_same_record() {
        let store = MemoryStore::new();
        let owner = Some(UserId::new(5));

        let mut unit = store.begin().await.unwrap();
        let first = AddressDeduplicator::new(unit.as_mut())
            .resolve(&address("Strandvejen 1", "Mette"), owner)
            .await
            .unwrap();
        let second = AddressDeduplicator::new(unit.as_mut())
            .resolve(&address("Strandvejen 1", "Mette"), owner)
            .await
            .unwrap();
        unit.commit().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.addresses().await.len(), 1);
    }

    #[tokio::test]
    async fn test_existing_record_is_not_merged() {
        let store = MemoryStore::new();

        let mut unit = store.begin().await.unwrap();
        let stored = AddressDeduplicator::new(unit.as_mut())
            .resolve(&address("Strandvejen 1", "Mette"), None)
            .await
            .unwrap();
        let resolved = AddressDeduplicator::new(unit.as_mut())
            .resolve(&address("Strandvejen 1", "Jens"), None)
            .await
            .unwrap();

        assert_eq!(resolved.id, stored.id);
        assert_eq!(resolved.address.first_name, "Mette");
    }

    #[tokio::test]
    async fn test_different_key_creates_new_record() {
        let store = MemoryStore::new();

        let mut unit = store.begin().await.unwrap();
        let a = AddressDeduplicator::new(unit.as_mut())
            .resolve(&address("Strandvejen 1", "Mette"), None)
            .await
            .unwrap();
        let b = AddressDeduplicator::new(unit.as_mut())
            .resolve(&address("Strandvejen 2", "Mette"), None)
            .await
            .unwrap();
        unit.commit().await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(store.addresses().await.len(), 2);
    }

    #[tokio::test]
    async fn test_owned_lookup_ignores_other_users() {
        let store = MemoryStore::new();

        let mut unit = store.begin().await.unwrap();
        let theirs = AddressDeduplicator::new(unit.as_mut())
            .resolve(&address("Havnegade 3", "A"), Some(UserId::new(1)))
            .await
            .unwrap();
        let mine = AddressDeduplicator::new(unit.as_mut())
            .resolve(&address("Havnegade 3", "B"), Some(UserId::new(2)))
            .await
            .unwrap();
        let guest = AddressDeduplicator::new(unit.as_mut())
            .resolve(&address("Havnegade 3", "C"), None)
            .await
            .unwrap();

        assert_ne!(theirs.id, mine.id);
        assert_eq!(mine.user_id, Some(UserId::new(2)));
        assert_eq!(guest.id, theirs.id);
    }
}
