pub mod district;
pub mod party;
pub mod poll;

pub use district::{District, Lean, NationalBaseline};
pub use party::{plurality, Party, PartyCounts, PartyMap, UnknownParty};
pub use poll::Poll;
