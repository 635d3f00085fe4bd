//! Fixtures for tests
use crate::carrier::{Carrier, CarrierMap, CarrierType, GridConnection};
use crate::model::{Model, ModelParameters};
use crate::parameter_table::ParameterTable;
use crate::profile::HourlyValue;
use crate::retrofit::{Building, BuildingMap, RetrofitOption};
use crate::technology::{StorageTechnology, Technology, TechnologyMap, TechnologyOutput};
use crate::time_step::{TemporalResolution, TimeStepInfo, TypicalDays};
use crate::units::{
    AreaPerPower, Dimensionless, Emissions, EmissionsPerPower, Money, MoneyPerEnergy,
    MoneyPerPower, Power,
};
use indexmap::{IndexMap, indexmap};
use rstest::fixture;
use std::rc::Rc;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

fn energy_carrier(id: &str, grid: Option<GridConnection>) -> Rc<Carrier> {
    Rc::new(Carrier {
        id: id.into(),
        description: String::new(),
        kind: CarrierType::Energy,
        grid,
        network_efficiency: Dimensionless(1.0),
    })
}

#[fixture]
pub fn carriers() -> CarrierMap {
    let gas = energy_carrier(
        "gas",
        Some(GridConnection {
            import_price: HourlyValue::Constant(0.1),
            carbon_intensity: HourlyValue::Constant(0.2),
            ..Default::default()
        }),
    );
    let elec = energy_carrier(
        "elec",
        Some(GridConnection {
            import_price: HourlyValue::Constant(0.3),
            export_price: HourlyValue::Constant(0.05),
            carbon_intensity: HourlyValue::Constant(0.5),
            max_import: None,
            max_export: Power(100.0),
        }),
    );
    let heat = energy_carrier("heat", None);
    let solar = Rc::new(Carrier {
        id: "solar".into(),
        description: String::new(),
        kind: CarrierType::Resource,
        grid: None,
        network_efficiency: Dimensionless(1.0),
    });

    [gas, elec, heat, solar]
        .into_iter()
        .map(|carrier| (carrier.id.clone(), carrier))
        .collect()
}

#[fixture]
pub fn boiler(carriers: CarrierMap) -> Technology {
    Technology {
        id: "boiler".into(),
        description: "Gas boiler".into(),
        input: Rc::clone(&carriers["gas"]),
        outputs: vec![TechnologyOutput {
            carrier: Rc::clone(&carriers["heat"]),
            efficiency: Dimensionless(0.9),
        }],
        availability: HourlyValue::Constant(1.0),
        min_capacity: Power(0.0),
        max_capacity: None,
        investment_cost: MoneyPerPower(100.0),
        fixed_investment_cost: Money(0.0),
        operating_cost: MoneyPerEnergy(0.0),
        lifetime: 20,
        embodied_emissions: EmissionsPerPower(10.0),
        roof_area_per_capacity: AreaPerPower(0.0),
    }
}

#[fixture]
pub fn heat_pump(carriers: CarrierMap) -> Technology {
    Technology {
        id: "heat_pump".into(),
        description: "Air-source heat pump".into(),
        input: Rc::clone(&carriers["elec"]),
        outputs: vec![TechnologyOutput {
            carrier: Rc::clone(&carriers["heat"]),
            efficiency: Dimensionless(3.0),
        }],
        availability: HourlyValue::Constant(1.0),
        min_capacity: Power(0.0),
        max_capacity: Some(Power(50.0)),
        investment_cost: MoneyPerPower(800.0),
        fixed_investment_cost: Money(1000.0),
        operating_cost: MoneyPerEnergy(0.0),
        lifetime: 20,
        embodied_emissions: EmissionsPerPower(50.0),
        roof_area_per_capacity: AreaPerPower(0.0),
    }
}

#[fixture]
pub fn battery(carriers: CarrierMap) -> StorageTechnology {
    StorageTechnology {
        id: "battery".into(),
        description: "Battery".into(),
        carrier: Rc::clone(&carriers["elec"]),
        charge_efficiency: Dimensionless(0.95),
        discharge_efficiency: Dimensionless(0.95),
        self_discharge: Dimensionless(0.01),
        max_charge_rate: Dimensionless(0.25),
        max_discharge_rate: Dimensionless(0.5),
        min_capacity: Power(0.0),
        max_capacity: Power(100.0),
        investment_cost: MoneyPerPower(300.0),
        fixed_investment_cost: Money(0.0),
        lifetime: 15,
        embodied_emissions: EmissionsPerPower(60.0),
    }
}

#[fixture]
pub fn technologies(boiler: Technology) -> TechnologyMap {
    indexmap! { boiler.id.clone() => Rc::new(boiler) }
}

fn retrofit(id: &str, cost: f64, embodied: f64, heat_demand: f64) -> Rc<RetrofitOption> {
    Rc::new(RetrofitOption {
        id: id.into(),
        description: String::new(),
        investment_cost: Money(cost),
        lifetime: 40,
        embodied_emissions: Emissions(embodied),
        demand: indexmap! { "heat".into() => HourlyValue::Constant(heat_demand) },
    })
}

fn building(id: &str) -> Building {
    Building {
        id: id.into(),
        description: String::new(),
        retrofits: [
            retrofit("basic", 0.0, 0.0, 5.0),
            retrofit("deep", 20000.0, 1000.0, 3.0),
        ]
        .into_iter()
        .map(|option| (option.id.clone(), option))
        .collect(),
    }
}

#[fixture]
pub fn two_option_building() -> Building {
    building("house")
}

#[fixture]
pub fn buildings() -> BuildingMap {
    ["house", "office"]
        .into_iter()
        .map(|id| (id.into(), Rc::new(building(id))))
        .collect()
}

#[fixture]
pub fn parameter_table(
    carriers: CarrierMap,
    technologies: TechnologyMap,
    two_option_building: Building,
) -> ParameterTable {
    ParameterTable::new(
        carriers,
        technologies,
        IndexMap::new(),
        indexmap! { two_option_building.id.clone() => Rc::new(two_option_building) },
        None,
    )
    .unwrap()
}

/// A horizon made of a single typical day standing in for the whole year
#[fixture]
pub fn time_step_info() -> TimeStepInfo {
    TimeStepInfo::new(
        TemporalResolution::TypicalDays,
        Some(&TypicalDays::single(0).unwrap()),
    )
    .unwrap()
}

#[fixture]
pub fn model(parameter_table: ParameterTable) -> Model {
    let parameters = ModelParameters {
        temporal_resolution: TemporalResolution::TypicalDays,
        ..ModelParameters::default()
    };
    Model::new(
        parameters,
        parameter_table,
        Some(&TypicalDays::single(0).unwrap()),
    )
    .unwrap()
}
