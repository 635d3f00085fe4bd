//! Conversion and storage technologies which can be installed in the hub.
use crate::carrier::Carrier;
use crate::error::HubError;
use crate::id::{define_id_getter, define_id_type};
use crate::profile::HourlyValue;
use crate::units::{
    AreaPerPower, Dimensionless, EmissionsPerPower, Money, MoneyPerEnergy, MoneyPerPower, Power,
};
use indexmap::IndexMap;
use std::rc::Rc;

define_id_type! {TechnologyID}
define_id_type! {StorageID}

/// A map of [`Technology`]s, keyed by technology ID
pub type TechnologyMap = IndexMap<TechnologyID, Rc<Technology>>;

/// A map of [`StorageTechnology`]s, keyed by storage ID
pub type StorageMap = IndexMap<StorageID, Rc<StorageTechnology>>;

/// A technology converting one input carrier into one or more output carriers
#[derive(PartialEq, Debug)]
pub struct Technology {
    /// Unique identifier for the technology (e.g. "chp")
    pub id: TechnologyID,
    /// Text description of the technology
    pub description: String,
    /// The carrier consumed
    pub input: Rc<Carrier>,
    /// The carriers produced. The first is the primary output, to which capacity refers.
    pub outputs: Vec<TechnologyOutput>,
    /// Maximum output of the primary carrier as a fraction of capacity (capacity factor)
    pub availability: HourlyValue,
    /// Lower bound on installed capacity (only enforced if the technology is installed)
    pub min_capacity: Power,
    /// Upper bound on installed capacity. `None` means unbounded.
    pub max_capacity: Option<Power>,
    /// Investment cost per unit of capacity
    pub investment_cost: MoneyPerPower,
    /// Investment cost incurred if any capacity is installed
    pub fixed_investment_cost: Money,
    /// Operating cost per unit of input
    pub operating_cost: MoneyPerEnergy,
    /// Lifetime in years
    pub lifetime: u32,
    /// Embodied emissions per unit of capacity
    pub embodied_emissions: EmissionsPerPower,
    /// Roof area taken up per unit of capacity (zero for ground-mounted plant)
    pub roof_area_per_capacity: AreaPerPower,
}
define_id_getter! {Technology, TechnologyID}

/// An output of a [`Technology`]
#[derive(PartialEq, Debug)]
pub struct TechnologyOutput {
    /// The carrier produced
    pub carrier: Rc<Carrier>,
    /// Output produced per unit of input
    pub efficiency: Dimensionless,
}

impl Technology {
    /// The output to which capacity and availability apply
    pub fn primary_output(&self) -> &TechnologyOutput {
        &self.outputs[0]
    }

    /// Whether a binary install indicator is needed for this technology.
    ///
    /// This is the case when there is a fixed investment cost or a minimum size.
    pub fn needs_install_indicator(&self) -> bool {
        self.fixed_investment_cost > Money(0.0) || self.min_capacity > Power(0.0)
    }

    /// The big-M value used to link capacity to the install indicator
    pub fn big_m(&self) -> Result<Power, HubError> {
        self.max_capacity.ok_or_else(|| {
            HubError::Configuration(format!(
                "Technology {} needs a finite max_capacity because it has a fixed cost or a \
                minimum capacity",
                self.id
            ))
        })
    }
}

/// A technology which stores a single carrier
#[derive(PartialEq, Debug)]
pub struct StorageTechnology {
    /// Unique identifier for the storage (e.g. "battery")
    pub id: StorageID,
    /// Text description of the storage
    pub description: String,
    /// The carrier stored
    pub carrier: Rc<Carrier>,
    /// Fraction of charged energy which is stored
    pub charge_efficiency: Dimensionless,
    /// Fraction of stored energy which is delivered on discharge
    pub discharge_efficiency: Dimensionless,
    /// Fraction of the stored energy lost every hour
    pub self_discharge: Dimensionless,
    /// Maximum charging power as a fraction of capacity
    pub max_charge_rate: Dimensionless,
    /// Maximum discharging power as a fraction of capacity
    pub max_discharge_rate: Dimensionless,
    /// Lower bound on installed capacity (only enforced if the storage is installed)
    pub min_capacity: Power,
    /// Upper bound on installed capacity
    pub max_capacity: Power,
    /// Investment cost per unit of capacity
    pub investment_cost: MoneyPerPower,
    /// Investment cost incurred if any capacity is installed
    pub fixed_investment_cost: Money,
    /// Lifetime in years
    pub lifetime: u32,
    /// Embodied emissions per unit of capacity
    pub embodied_emissions: EmissionsPerPower,
}
define_id_getter! {StorageTechnology, StorageID}

impl StorageTechnology {
    /// Whether a binary install indicator is needed for this storage
    pub fn needs_install_indicator(&self) -> bool {
        self.fixed_investment_cost > Money(0.0) || self.min_capacity > Power(0.0)
    }

    /// Upper bound on charging power, used as big-M for the charging indicator
    pub fn max_charge_power(&self) -> Power {
        self.max_charge_rate * self.max_capacity
    }

    /// Upper bound on discharging power, used as big-M for the charging indicator
    pub fn max_discharge_power(&self) -> Power {
        self.max_discharge_rate * self.max_capacity
    }

    /// Fraction of the stored energy retained after the given number of hours
    pub fn retention(&self, hours: usize) -> f64 {
        (1.0 - self.self_discharge.value()).powf(hours as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{boiler, battery};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_needs_install_indicator(boiler: Technology) {
        assert!(!boiler.needs_install_indicator());
        let boiler = Technology {
            fixed_investment_cost: Money(100.0),
            ..boiler
        };
        assert!(boiler.needs_install_indicator());
    }

    #[rstest]
    fn test_big_m(boiler: Technology) {
        assert!(matches!(boiler.big_m(), Err(HubError::Configuration(_))));
        let boiler = Technology {
            max_capacity: Some(Power(50.0)),
            ..boiler
        };
        assert_eq!(boiler.big_m().unwrap(), Power(50.0));
    }

    #[rstest]
    fn test_storage_big_m(battery: StorageTechnology) {
        assert_approx_eq!(Power, battery.max_charge_power(), Power(25.0));
        assert_approx_eq!(Power, battery.max_discharge_power(), Power(50.0));
    }

    #[rstest]
    fn test_retention(battery: StorageTechnology) {
        assert_approx_eq!(f64, battery.retention(0), 1.0);
        assert_approx_eq!(f64, battery.retention(2), 0.99 * 0.99);
    }
}
