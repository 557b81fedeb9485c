//! Board representation.
//!
//! Contains the unit catalog and units, the two battle sides, and the map
//! view a battle consults when it needs to know where units may retreat.

pub mod map;
pub mod side;
pub mod unit;

pub use map::{GameMap, MapView, TerritoryId, TerritoryInfo};
pub use side::{Side, BOTH_SIDES};
pub use unit::{AaProfile, Domain, Unit, UnitCatalog, UnitId, UnitType};

pub(crate) use unit::INERT;
