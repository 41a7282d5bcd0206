// Insertion-ordered player map. Join order drives spawn layout, so it must survive a save/load.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

pub type PlayerId = String;

#[derive(Debug, Clone, PartialEq)]
pub struct Roster<T> {
    entries: Vec<(PlayerId, T)>,
}

impl<T> Default for Roster<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Roster<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == id)
            .map(|(_, value)| value)
    }

    /// Inserts at the end, or replaces in place when the id is already present.
    pub fn insert(&mut self, id: PlayerId, value: T) {
        match self.get_mut(&id) {
            Some(slot) => *slot = value,
            None => self.entries.push((id, value)),
        }
    }

    /// Removes an entry and keeps the order of the rest.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let index = self.entries.iter().position(|(key, _)| key == id)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &T)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&PlayerId, &mut T)> {
        self.entries.iter_mut().map(|(key, value)| (&*key, value))
    }

    pub fn ids(&self) -> impl Iterator<Item = &PlayerId> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, value)| value)
    }
}

impl<T> FromIterator<(PlayerId, T)> for Roster<T> {
    fn from_iter<I: IntoIterator<Item = (PlayerId, T)>>(iter: I) -> Self {
        let mut roster = Roster::new();
        for (id, value) in iter {
            roster.insert(id, value);
        }
        roster
    }
}

impl<T> IntoIterator for Roster<T> {
    type Item = (PlayerId, T);
    type IntoIter = std::vec::IntoIter<(PlayerId, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<T: Serialize> Serialize for Roster<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, value) in &self.entries {
            map.serialize_entry(id, value)?;
        }
        map.end()
    }
}

struct RosterVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for RosterVisitor<T> {
    type Value = Roster<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of player ids to player data")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut roster = Roster::new();
        while let Some((id, value)) = access.next_entry::<PlayerId, T>()? {
            roster.insert(id, value);
        }
        Ok(roster)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Roster<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RosterVisitor(PhantomData))
    }
}
