//! Buildings, their retrofit options and the enumeration of retrofit scenarios.
//!
//! A retrofit option is an insulation package for one building. Choosing it changes the building's
//! energy demand and incurs an investment cost and embodied emissions. A retrofit scenario picks
//! exactly one option for every building.
use crate::carrier::CarrierID;
use crate::id::{define_id_getter, define_id_type};
use crate::profile::HourlyValue;
use crate::units::{Emissions, Money};
use indexmap::IndexMap;
use itertools::Itertools;
use std::rc::Rc;

define_id_type! {BuildingID}
define_id_type! {RetrofitID}

/// A map of [`Building`]s, keyed by building ID
pub type BuildingMap = IndexMap<BuildingID, Rc<Building>>;

/// A building supplied by the hub
#[derive(PartialEq, Debug)]
pub struct Building {
    /// Unique identifier for the building
    pub id: BuildingID,
    /// Text description of the building
    pub description: String,
    /// The retrofit options available, in declaration order
    pub retrofits: IndexMap<RetrofitID, Rc<RetrofitOption>>,
}
define_id_getter! {Building, BuildingID}

/// An insulation package for a building (possibly "do nothing")
#[derive(PartialEq, Debug)]
pub struct RetrofitOption {
    /// Unique identifier for the option within its building
    pub id: RetrofitID,
    /// Text description of the option
    pub description: String,
    /// Investment cost of the package
    pub investment_cost: Money,
    /// Lifetime of the package in years
    pub lifetime: u32,
    /// Emissions from manufacturing and installing the insulation material
    pub embodied_emissions: Emissions,
    /// Hourly demand of the building for each carrier if this option is chosen
    pub demand: IndexMap<CarrierID, HourlyValue>,
}
define_id_getter! {RetrofitOption, RetrofitID}

/// One choice of retrofit option for every building
#[derive(PartialEq, Debug, Clone)]
pub struct RetrofitScenario {
    /// Position of this scenario in enumeration order
    pub index: usize,
    /// The option chosen for each building
    pub selections: IndexMap<BuildingID, Rc<RetrofitOption>>,
}

impl RetrofitScenario {
    /// A human-readable label (e.g. `house=deep;office=none`)
    pub fn label(&self) -> String {
        if self.selections.is_empty() {
            return "none".into();
        }

        self.selections
            .iter()
            .map(|(building, option)| format!("{building}={}", option.id))
            .join(";")
    }

    /// Iterate over the demand profiles of all buildings for the given carrier
    pub fn demand_for<'a>(
        &'a self,
        carrier: &'a CarrierID,
    ) -> impl Iterator<Item = &'a HourlyValue> + 'a {
        self.selections
            .values()
            .filter_map(move |option| option.demand.get(carrier))
    }

    /// Iterate over the chosen options
    pub fn options(&self) -> impl Iterator<Item = &Rc<RetrofitOption>> {
        self.selections.values()
    }
}

/// Enumerate every retrofit scenario, i.e. the cartesian product of the buildings' options.
///
/// Scenarios are produced in declaration order, with the last building's option varying fastest.
/// If there are no buildings, a single empty scenario is returned.
pub fn enumerate_scenarios(buildings: &BuildingMap) -> Vec<RetrofitScenario> {
    if buildings.is_empty() {
        return vec![RetrofitScenario {
            index: 0,
            selections: IndexMap::new(),
        }];
    }

    buildings
        .values()
        .map(|building| {
            building
                .retrofits
                .values()
                .map(move |option| (building.id.clone(), Rc::clone(option)))
        })
        .multi_cartesian_product()
        .enumerate()
        .map(|(index, selections)| RetrofitScenario {
            index,
            selections: selections.into_iter().collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{buildings, two_option_building};
    use rstest::rstest;

    #[rstest]
    fn test_enumerate_single_building(two_option_building: Building) {
        let buildings: BuildingMap = [(
            two_option_building.id.clone(),
            Rc::new(two_option_building),
        )]
        .into_iter()
        .collect();
        let scenarios = enumerate_scenarios(&buildings);
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].index, 0);
        assert_eq!(scenarios[0].label(), "house=basic");
        assert_eq!(scenarios[1].label(), "house=deep");
    }

    #[rstest]
    fn test_enumerate_cartesian_product(buildings: BuildingMap) {
        // Two buildings with two options each
        let scenarios = enumerate_scenarios(&buildings);
        let labels = scenarios.iter().map(RetrofitScenario::label).collect_vec();
        assert_eq!(
            labels,
            [
                "house=basic;office=basic",
                "house=basic;office=deep",
                "house=deep;office=basic",
                "house=deep;office=deep"
            ]
        );
        assert!(scenarios.iter().all(|s| s.selections.len() == 2));
    }

    #[test]
    fn test_enumerate_no_buildings() {
        let scenarios = enumerate_scenarios(&IndexMap::new());
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].label(), "none");
    }

    #[rstest]
    fn test_demand_for(buildings: BuildingMap) {
        let scenario = &enumerate_scenarios(&buildings)[0];
        assert_eq!(scenario.demand_for(&"heat".into()).count(), 2);
        assert_eq!(scenario.demand_for(&"gas".into()).count(), 0);
    }
}
