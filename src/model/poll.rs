use super::party::PartyMap;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub region: String,
    pub firm: String,
    pub method: Option<String>,
    pub last_date: NaiveDate,
    pub sample_size: u32,
    /// Reported margin of error in percentage points.
    pub error: f64,
    /// Reported share per party; parties the poll did not report are absent.
    pub shares: PartyMap<f64>,
}

impl Poll {
    /// Days between the poll's last field date and `reference`, ignoring direction.
    pub fn age_days(&self, reference: NaiveDate) -> i64 {
        (reference - self.last_date).num_days().abs()
    }
}
