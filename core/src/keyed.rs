//! Keyed collections with partial-update semantics.
//!
//! A [`KeyedCollection`] is an insertion-ordered map from an entity's id to the
//! entity itself. It is the single implementation of the mutation contract used
//! by both the client store and the User document:
//!
//! - `add` assigns an id when the entity has none and inserts it;
//! - `update` merges a [`Patch`] onto an existing entry, touching only the
//!   fields the patch supplies;
//! - `delete` removes an entry and hands it back.
//!
//! `update` and `delete` on an absent key fail with the entity's
//! [`NotFoundError`] and leave the collection untouched.
//!
//! Keys are always derived from the stored value's id. The collection
//! serializes as a list of entities and is rebuilt by id on deserialization,
//! so a key can never disagree with its value.

use crate::environment::IdGenerator;
use crate::error::NotFoundError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// An entity identifier: an opaque string where blank means "not assigned yet".
pub trait EntityId:
    Clone + Eq + Hash + fmt::Debug + fmt::Display + From<String> + Send + Sync + 'static
{
    /// The identifier as a string slice.
    fn as_str(&self) -> &str;

    /// Whether this id is unassigned.
    fn is_blank(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

/// Declares a string-backed identifier newtype implementing [`EntityId`].
#[macro_export]
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The unassigned identifier.
            #[must_use]
            pub const fn blank() -> Self {
                Self(String::new())
            }

            /// Consumes the id, returning the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl $crate::keyed::EntityId for $name {
            fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

/// An entity stored in a [`KeyedCollection`].
pub trait Keyed: Clone {
    /// Identifier type
    type Id: EntityId;

    /// The entity's identifier.
    fn id(&self) -> &Self::Id;

    /// Replace the entity's identifier (used when assigning one on add).
    fn set_id(&mut self, id: Self::Id);

    /// The kind-specific error for a lookup of `id` that found nothing.
    fn not_found(id: Self::Id) -> NotFoundError;
}

/// A partial update: the target identifier plus only the fields to change.
pub trait Patch {
    /// The entity this patch applies to
    type Target: Keyed;

    /// Identifier of the entry to update.
    fn target(&self) -> &<Self::Target as Keyed>::Id;

    /// Overwrite the supplied fields on `entity`, leaving all others as they are.
    fn apply(self, entity: &mut Self::Target);
}

/// Insertion-ordered map from entity id to entity.
#[derive(Clone)]
pub struct KeyedCollection<T: Keyed> {
    entries: Vec<T>,
    index: HashMap<T::Id, usize>,
}

impl<T: Keyed> KeyedCollection<T> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry with this id exists.
    #[must_use]
    pub fn contains(&self, id: &T::Id) -> bool {
        self.index.contains_key(id)
    }

    /// Looks up an entry. Absence is not an error here.
    #[must_use]
    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.index.get(id).map(|&pos| &self.entries[pos])
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    /// Identifiers in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &T::Id> {
        self.entries.iter().map(Keyed::id)
    }

    /// Adds an entity, assigning an identifier from `ids` if it has none.
    ///
    /// An entity whose id is already present replaces the stored value in place.
    pub fn add(&mut self, mut entity: T, ids: &dyn IdGenerator) -> &T {
        if entity.id().is_blank() {
            entity.set_id(T::Id::from(ids.next_id()));
        }
        self.insert(entity)
    }

    /// Inserts an entity under its own id, keeping the position of an existing entry.
    ///
    /// Last write wins: an entity whose id is already present (blank ids
    /// included) replaces the stored value.
    pub fn insert(&mut self, entity: T) -> &T {
        let pos = if let Some(&pos) = self.index.get(entity.id()) {
            self.entries[pos] = entity;
            pos
        } else {
            let pos = self.entries.len();
            self.index.insert(entity.id().clone(), pos);
            self.entries.push(entity);
            pos
        };
        &self.entries[pos]
    }

    /// Merges a patch onto the entry it targets.
    ///
    /// The entry keeps its id even if the patch rewrites it.
    ///
    /// # Errors
    ///
    /// Returns the kind-specific [`NotFoundError`] if the target is absent.
    /// The collection is unchanged in that case.
    pub fn update<P>(&mut self, patch: P) -> Result<&T, NotFoundError>
    where
        P: Patch<Target = T>,
    {
        let Some(&pos) = self.index.get(patch.target()) else {
            return Err(T::not_found(patch.target().clone()));
        };
        let id = patch.target().clone();
        let entry = &mut self.entries[pos];
        patch.apply(entry);
        if entry.id() != &id {
            entry.set_id(id);
        }
        Ok(entry)
    }

    /// Removes an entry, returning it.
    ///
    /// # Errors
    ///
    /// Returns the kind-specific [`NotFoundError`] if `id` is absent.
    /// The collection is unchanged in that case.
    pub fn delete(&mut self, id: &T::Id) -> Result<T, NotFoundError> {
        let Some(pos) = self.index.remove(id) else {
            return Err(T::not_found(id.clone()));
        };
        let removed = self.entries.remove(pos);
        for entry in &self.entries[pos..] {
            if let Some(slot) = self.index.get_mut(entry.id()) {
                *slot -= 1;
            }
        }
        Ok(removed)
    }

    /// Replaces the whole mapping.
    pub fn replace_all(&mut self, other: Self) {
        *self = other;
    }

    /// Consumes the collection, yielding entries in insertion order.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.entries
    }
}

impl<T: Keyed> Default for KeyedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed + fmt::Debug> fmt::Debug for KeyedCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}

// Order-sensitive: two collections are equal when they hold equal entries in the same order.
impl<T: Keyed + PartialEq> PartialEq for KeyedCollection<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<T: Keyed + Eq> Eq for KeyedCollection<T> {}

/// Repeated ids collapse into one entry, last write wins.
impl<T: Keyed> FromIterator<T> for KeyedCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut collection = Self::new();
        for entity in iter {
            collection.insert(entity);
        }
        collection
    }
}

impl<T: Keyed> Extend<T> for KeyedCollection<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for entity in iter {
            self.insert(entity);
        }
    }
}

impl<'a, T: Keyed> IntoIterator for &'a KeyedCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<T: Keyed> IntoIterator for KeyedCollection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<T: Keyed + Serialize> Serialize for KeyedCollection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.entries)
    }
}

/// A stored list with a repeated id is rejected rather than collapsed.
impl<'de, T: Keyed + Deserialize<'de>> Deserialize<'de> for KeyedCollection<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<T>::deserialize(deserializer)?;
        let mut collection = Self::new();
        for entity in entries {
            if collection.contains(entity.id()) {
                return Err(de::Error::custom(format!("duplicate id {}", entity.id())));
            }
            collection.insert(entity);
        }
        Ok(collection)
    }
}
