use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Parties tracked by the forecast, in canonical order.
///
/// The declaration order is the tie-break order: when two parties are level
/// (in a riding or in the national seat count) the one declared first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Lpc,
    Cpc,
    Ndp,
    Gpc,
    Bq,
    /// Catch-all bucket for independents and minor parties.
    Other,
}

impl Party {
    pub const COUNT: usize = 6;

    pub const ALL: [Party; Party::COUNT] = [
        Party::Lpc,
        Party::Cpc,
        Party::Ndp,
        Party::Gpc,
        Party::Bq,
        Party::Other,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Lowercase code used in databases and exported column names.
    pub fn code(self) -> &'static str {
        match self {
            Party::Lpc => "lpc",
            Party::Cpc => "cpc",
            Party::Ndp => "ndp",
            Party::Gpc => "gpc",
            Party::Bq => "bq",
            Party::Other => "other",
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown party label: {0:?}")]
pub struct UnknownParty(pub String);

impl FromStr for Party {
    type Err = UnknownParty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_lowercase();
        Party::ALL
            .iter()
            .copied()
            .find(|party| party.code() == label)
            .ok_or_else(|| UnknownParty(s.to_string()))
    }
}

/// Fixed-size map keyed by [`Party`].
///
/// Iteration always follows canonical party order, so anything derived from
/// it (winners, exported columns) is independent of input order. Serializes
/// as an object keyed by party code.
#[derive(Debug, Clone, PartialEq)]
pub struct PartyMap<T> {
    slots: [Option<T>; Party::COUNT],
}

impl<T> Default for PartyMap<T> {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl<T> PartyMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, party: Party) -> Option<&T> {
        self.slots[party.index()].as_ref()
    }

    pub fn get_mut(&mut self, party: Party) -> Option<&mut T> {
        self.slots[party.index()].as_mut()
    }

    pub fn insert(&mut self, party: Party, value: T) -> Option<T> {
        self.slots[party.index()].replace(value)
    }

    pub fn remove(&mut self, party: Party) -> Option<T> {
        self.slots[party.index()].take()
    }

    pub fn contains(&self, party: Party) -> bool {
        self.slots[party.index()].is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn parties(&self) -> impl Iterator<Item = Party> + '_ {
        self.iter().map(|(party, _)| party)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Party, &T)> {
        Party::ALL
            .iter()
            .zip(self.slots.iter())
            .filter_map(|(party, slot)| slot.as_ref().map(|value| (*party, value)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Party, &mut T)> {
        Party::ALL
            .iter()
            .zip(self.slots.iter_mut())
            .filter_map(|(party, slot)| slot.as_mut().map(|value| (*party, value)))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }
}

impl PartyMap<f64> {
    pub fn total(&self) -> f64 {
        self.values().sum()
    }

    /// Party with the largest value; ties go to the party first in canonical order.
    pub fn leader(&self) -> Option<Party> {
        let mut best: Option<(Party, f64)> = None;
        for (party, &value) in self.iter() {
            match best {
                Some((_, top)) if value <= top => {}
                _ => best = Some((party, value)),
            }
        }
        best.map(|(party, _)| party)
    }
}

impl<T> FromIterator<(Party, T)> for PartyMap<T> {
    fn from_iter<I: IntoIterator<Item = (Party, T)>>(iter: I) -> Self {
        let mut map = PartyMap::new();
        for (party, value) in iter {
            map.insert(party, value);
        }
        map
    }
}

impl<T: Serialize> Serialize for PartyMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for PartyMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = BTreeMap::<Party, T>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

/// Per-party counter (wins, seats) with a slot for every party.
pub type PartyCounts = [u32; Party::COUNT];

/// Index of the largest count, ties to canonical order. `None` when every count is zero.
pub fn plurality(counts: &PartyCounts) -> Option<Party> {
    let mut best: Option<(Party, u32)> = None;
    for party in Party::ALL {
        let count = counts[party.index()];
        if count == 0 {
            continue;
        }
        match best {
            Some((_, top)) if count <= top => {}
            _ => best = Some((party, count)),
        }
    }
    best.map(|(party, _)| party)
}
