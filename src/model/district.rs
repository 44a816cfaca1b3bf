use super::party::{Party, PartyMap};
use serde::{Deserialize, Serialize};

/// A riding with its historical per-party result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct District {
    pub id: i64,
    pub province: String,
    pub name: String,
    /// Historical vote share per party fielding a candidate, in percent.
    pub baseline: PartyMap<f64>,
    /// Carried through for export; not used by the projection.
    pub lean: PartyMap<Lean>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Lean {
    pub vs_province: Option<f64>,
    pub vs_federal: Option<f64>,
}

impl District {
    pub fn new(id: i64, province: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            province: province.into(),
            name: name.into(),
            baseline: PartyMap::new(),
            lean: PartyMap::new(),
        }
    }

    /// Add a baseline share; repeated rows for one party accumulate.
    pub fn add_result(&mut self, party: Party, vote_share: f64, lean: Lean) {
        match self.baseline.get_mut(party) {
            Some(existing) => *existing += vote_share,
            None => {
                self.baseline.insert(party, vote_share);
                self.lean.insert(party, lean);
            }
        }
    }

    pub fn fields(&self, party: Party) -> bool {
        self.baseline.contains(party)
    }
}

/// Historical national vote share per party.
pub type NationalBaseline = PartyMap<f64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_rows_accumulate_into_one_share() {
        let mut district = District::new(35001, "Ontario", "Ajax");
        district.add_result(Party::Lpc, 50.0, Lean::default());
        district.add_result(Party::Other, 1.5, Lean::default());
        district.add_result(Party::Other, 0.5, Lean::default());

        assert_eq!(district.baseline.get(Party::Other), Some(&2.0));
        assert_eq!(district.baseline.len(), 2);
        assert!(district.fields(Party::Lpc));
        assert!(!district.fields(Party::Bq));
    }
}
