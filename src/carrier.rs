//! Energy carriers and their connections to external networks.
use crate::id::{define_id_getter, define_id_type};
use crate::profile::HourlyValue;
use crate::units::{Dimensionless, Power};
use indexmap::IndexMap;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::rc::Rc;

define_id_type! {CarrierID}

/// A map of [`Carrier`]s, keyed by carrier ID
pub type CarrierMap = IndexMap<CarrierID, Rc<Carrier>>;

/// A form of energy (e.g. electricity, heat, gas) or a free resource (e.g. solar irradiation)
#[derive(PartialEq, Debug, Clone)]
pub struct Carrier {
    /// Unique identifier for the carrier (e.g. "elec")
    pub id: CarrierID,
    /// Text description of carrier (e.g. "electricity")
    pub description: String,
    /// Whether the carrier is balanced at every time step
    pub kind: CarrierType,
    /// Connection to an external network, if any
    pub grid: Option<GridConnection>,
    /// Fraction of delivered energy which reaches the buildings (demand is served as demand/η)
    pub network_efficiency: Dimensionless,
}
define_id_getter! {Carrier, CarrierID}

/// The kind of carrier
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default, DeserializeLabeledStringEnum)]
pub enum CarrierType {
    /// Supply must equal demand at every time step
    #[default]
    #[string = "energy"]
    Energy,
    /// Freely available and not balanced (availability is expressed through technologies)
    #[string = "resource"]
    Resource,
}

/// Parameters for importing from and exporting to an external network
#[derive(PartialEq, Debug, Clone, Default)]
pub struct GridConnection {
    /// Price paid per unit of imported energy
    pub import_price: HourlyValue,
    /// Price received per unit of exported energy (feed-in tariff)
    pub export_price: HourlyValue,
    /// Emissions per unit of imported energy
    pub carbon_intensity: HourlyValue,
    /// Maximum import power, if limited
    pub max_import: Option<Power>,
    /// Maximum export power. Exports are not possible unless this is given.
    pub max_export: Power,
}

impl Carrier {
    /// Whether the carrier must balance at every time step
    pub fn is_balanced(&self) -> bool {
        self.kind == CarrierType::Energy
    }

    /// Whether energy of this carrier can be obtained without a conversion technology
    pub fn is_supply(&self) -> bool {
        self.kind == CarrierType::Resource || self.grid.is_some()
    }
}
