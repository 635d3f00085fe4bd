//! Code for reading the parameter table from `hub.toml`.
use super::{
    deserialise_proportion, deserialise_proportion_nonzero, input_err_msg, read_toml, require,
};
use crate::carrier::{Carrier, CarrierMap, CarrierType, GridConnection};
use crate::error::HubError;
use crate::id::{IDCollection, insert_unique};
use crate::parameter_table::{CarbonCertificates, ParameterTable, Site, ThermalNetwork};
use crate::profile::{ParamValue, ProfileMap};
use crate::retrofit::{Building, BuildingMap, RetrofitOption};
use crate::technology::{StorageMap, StorageTechnology, Technology, TechnologyMap, TechnologyOutput};
use crate::units::{
    Area, AreaPerPower, Dimensionless, Emissions, EmissionsPerPower, Length, Money,
    MoneyPerEmissions, MoneyPerEnergy, MoneyPerLength, MoneyPerPower, Power,
};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;
use std::rc::Rc;

const HUB_FILE_NAME: &str = "hub.toml";

fn default_one() -> f64 {
    1.0
}

fn default_zero_param() -> ParamValue {
    ParamValue::Number(0.0)
}

fn default_availability() -> ParamValue {
    ParamValue::Number(1.0)
}

/// The contents of `hub.toml`, as written by the user
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HubFile {
    carriers: Option<IndexMap<String, CarrierRaw>>,
    technologies: Option<IndexMap<String, TechnologyRaw>>,
    #[serde(default)]
    storage: IndexMap<String, StorageRaw>,
    buildings: Option<IndexMap<String, BuildingRaw>>,
    certificates: Option<CertificatesRaw>,
    #[serde(default)]
    site: SiteRaw,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SiteRaw {
    roof_area: Option<f64>,
    network: Option<NetworkRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NetworkRaw {
    length: f64,
    cost_per_metre: f64,
    lifetime: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CarrierRaw {
    #[serde(default)]
    description: String,
    #[serde(rename = "type", default)]
    kind: CarrierType,
    grid: Option<GridRaw>,
    #[serde(default = "default_one")]
    #[serde(deserialize_with = "deserialise_proportion_nonzero")]
    network_efficiency: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GridRaw {
    #[serde(default = "default_zero_param")]
    import_price: ParamValue,
    #[serde(default = "default_zero_param")]
    export_price: ParamValue,
    #[serde(default = "default_zero_param")]
    carbon_intensity: ParamValue,
    max_import: Option<f64>,
    #[serde(default)]
    max_export: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OutputRaw {
    carrier: String,
    efficiency: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TechnologyRaw {
    #[serde(default)]
    description: String,
    input: String,
    outputs: Vec<OutputRaw>,
    #[serde(default = "default_availability")]
    availability: ParamValue,
    #[serde(default)]
    min_capacity: f64,
    max_capacity: Option<f64>,
    investment_cost: f64,
    #[serde(default)]
    fixed_investment_cost: f64,
    #[serde(default)]
    operating_cost: f64,
    lifetime: u32,
    #[serde(default)]
    embodied_emissions: f64,
    #[serde(default)]
    roof_area_per_capacity: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StorageRaw {
    #[serde(default)]
    description: String,
    carrier: String,
    #[serde(deserialize_with = "deserialise_proportion_nonzero")]
    charge_efficiency: f64,
    #[serde(deserialize_with = "deserialise_proportion_nonzero")]
    discharge_efficiency: f64,
    #[serde(default)]
    #[serde(deserialize_with = "deserialise_proportion")]
    self_discharge: f64,
    #[serde(default = "default_one")]
    max_charge_rate: f64,
    #[serde(default = "default_one")]
    max_discharge_rate: f64,
    #[serde(default)]
    min_capacity: f64,
    max_capacity: Option<f64>,
    investment_cost: f64,
    #[serde(default)]
    fixed_investment_cost: f64,
    lifetime: u32,
    #[serde(default)]
    embodied_emissions: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuildingRaw {
    #[serde(default)]
    description: String,
    retrofits: IndexMap<String, RetrofitRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RetrofitRaw {
    #[serde(default)]
    description: String,
    #[serde(default)]
    investment_cost: f64,
    #[serde(default = "default_retrofit_lifetime")]
    lifetime: u32,
    #[serde(default)]
    embodied_emissions: f64,
    demand: IndexMap<String, ParamValue>,
}

fn default_retrofit_lifetime() -> u32 {
    40
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CertificatesRaw {
    price: f64,
    max_quantity: f64,
}

/// Read the parameter table from `hub.toml` in the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `profiles` - Hourly profiles which parameters may refer to by name
///
/// # Returns
///
/// A validated [`ParameterTable`] or an error.
pub fn read_parameter_table(model_dir: &Path, profiles: &ProfileMap) -> Result<ParameterTable> {
    let file_path = model_dir.join(HUB_FILE_NAME);
    let hub_file: HubFile = read_toml(&file_path)?;
    build_parameter_table(hub_file, profiles).with_context(|| input_err_msg(&file_path))
}

fn build_parameter_table(hub_file: HubFile, profiles: &ProfileMap) -> Result<ParameterTable> {
    let carriers = build_carriers(require(hub_file.carriers, "carriers")?, profiles)?;
    let technologies = build_technologies(
        require(hub_file.technologies, "technologies")?,
        &carriers,
        profiles,
    )?;
    let storage = build_storage(hub_file.storage, &carriers)?;
    let buildings = build_buildings(require(hub_file.buildings, "buildings")?, profiles)?;
    let certificates = hub_file.certificates.map(|raw| CarbonCertificates {
        price: MoneyPerEmissions(raw.price),
        max_quantity: Emissions(raw.max_quantity),
    });

    let site = Site {
        roof_area: hub_file.site.roof_area.map(Area),
        network: hub_file.site.network.map(|raw| ThermalNetwork {
            length: Length(raw.length),
            cost_per_metre: MoneyPerLength(raw.cost_per_metre),
            lifetime: raw.lifetime,
        }),
    };

    ParameterTable::new(carriers, technologies, storage, buildings, certificates)?
        .with_site(site)
}

fn build_carriers(raw: IndexMap<String, CarrierRaw>, profiles: &ProfileMap) -> Result<CarrierMap> {
    let mut carriers = IndexMap::new();
    for (id, raw) in raw {
        let grid = raw
            .grid
            .map(|grid| build_grid(grid, profiles))
            .transpose()
            .with_context(|| format!("Invalid grid connection for carrier {id}"))?;
        ensure!(
            raw.kind == CarrierType::Energy || grid.is_none(),
            HubError::Configuration(format!(
                "Resource carrier {id} cannot be imported or exported"
            ))
        );

        let carrier = Carrier {
            id: id.into(),
            description: raw.description,
            kind: raw.kind,
            grid,
            network_efficiency: Dimensionless(raw.network_efficiency),
        };
        insert_unique(&mut carriers, carrier)?;
    }

    Ok(carriers.into_iter().map(|(id, c)| (id, Rc::new(c))).collect())
}

fn build_grid(raw: GridRaw, profiles: &ProfileMap) -> Result<GridConnection> {
    let max_import = raw.max_import.map(Power);
    if let Some(max_import) = max_import {
        ensure!(max_import >= Power(0.0), "max_import must be non-negative");
    }
    ensure!(
        raw.max_export.is_finite() && raw.max_export >= 0.0,
        "max_export must be finite and non-negative"
    );

    let carbon_intensity = raw.carbon_intensity.resolve(profiles)?;
    carbon_intensity
        .check_range(0.0, f64::INFINITY)
        .context("Invalid carbon_intensity")?;

    Ok(GridConnection {
        import_price: raw.import_price.resolve(profiles)?,
        export_price: raw.export_price.resolve(profiles)?,
        carbon_intensity,
        max_import,
        max_export: Power(raw.max_export),
    })
}

/// Check that capacity bounds are consistent
fn check_capacity_bounds(min: f64, max: Option<f64>) -> Result<()> {
    ensure!(
        min.is_finite() && min >= 0.0,
        "min_capacity must be finite and non-negative"
    );
    if let Some(max) = max {
        ensure!(
            max.is_finite() && max >= min,
            "max_capacity must be finite and at least min_capacity"
        );
    }

    Ok(())
}

/// Check that cost and emissions coefficients are usable
fn check_coefficients(
    investment_cost: f64,
    fixed_cost: f64,
    lifetime: u32,
    embodied_emissions: f64,
) -> Result<()> {
    ensure!(
        investment_cost.is_finite() && investment_cost >= 0.0,
        "investment_cost must be finite and non-negative"
    );
    ensure!(
        fixed_cost.is_finite() && fixed_cost >= 0.0,
        "fixed_investment_cost must be finite and non-negative"
    );
    ensure!(lifetime > 0, "lifetime must be greater than zero");
    ensure!(
        embodied_emissions.is_finite() && embodied_emissions >= 0.0,
        "embodied_emissions must be finite and non-negative"
    );

    Ok(())
}

fn build_technologies(
    raw: IndexMap<String, TechnologyRaw>,
    carriers: &CarrierMap,
    profiles: &ProfileMap,
) -> Result<TechnologyMap> {
    let mut technologies = IndexMap::new();
    for (id, raw) in raw {
        let technology = build_technology(&id, raw, carriers, profiles)
            .with_context(|| format!("Invalid parameters for technology {id}"))?;
        insert_unique(&mut technologies, technology)?;
    }

    Ok(technologies
        .into_iter()
        .map(|(id, t)| (id, Rc::new(t)))
        .collect())
}

fn build_technology(
    id: &str,
    raw: TechnologyRaw,
    carriers: &CarrierMap,
    profiles: &ProfileMap,
) -> Result<Technology> {
    let input = &carriers[&carriers.get_id_by_str(&raw.input)?];

    ensure!(!raw.outputs.is_empty(), "At least one output must be given");
    let mut outputs = Vec::with_capacity(raw.outputs.len());
    for output in raw.outputs {
        let carrier = &carriers[&carriers.get_id_by_str(&output.carrier)?];
        ensure!(
            carrier.is_balanced(),
            HubError::Configuration(format!(
                "Technology {id} cannot output resource carrier {}",
                carrier.id
            ))
        );
        ensure!(
            output.efficiency.is_finite() && output.efficiency > 0.0,
            "Efficiency for output {} must be finite and positive",
            carrier.id
        );
        outputs.push(TechnologyOutput {
            carrier: Rc::clone(carrier),
            efficiency: Dimensionless(output.efficiency),
        });
    }

    let availability = raw.availability.resolve(profiles)?;
    availability
        .check_range(0.0, 1.0)
        .context("Invalid availability")?;
    check_capacity_bounds(raw.min_capacity, raw.max_capacity)?;
    check_coefficients(
        raw.investment_cost,
        raw.fixed_investment_cost,
        raw.lifetime,
        raw.embodied_emissions,
    )?;
    ensure!(
        raw.roof_area_per_capacity.is_finite() && raw.roof_area_per_capacity >= 0.0,
        "roof_area_per_capacity must be finite and non-negative"
    );
    ensure!(
        raw.operating_cost.is_finite(),
        "operating_cost must be finite"
    );

    let technology = Technology {
        id: id.into(),
        description: raw.description,
        input: Rc::clone(input),
        outputs,
        availability,
        min_capacity: Power(raw.min_capacity),
        max_capacity: raw.max_capacity.map(Power),
        investment_cost: MoneyPerPower(raw.investment_cost),
        fixed_investment_cost: Money(raw.fixed_investment_cost),
        operating_cost: MoneyPerEnergy(raw.operating_cost),
        lifetime: raw.lifetime,
        embodied_emissions: EmissionsPerPower(raw.embodied_emissions),
        roof_area_per_capacity: AreaPerPower(raw.roof_area_per_capacity),
    };

    // Fail early rather than when the problem is built
    if technology.needs_install_indicator() {
        technology.big_m()?;
    }

    Ok(technology)
}

fn build_storage(raw: IndexMap<String, StorageRaw>, carriers: &CarrierMap) -> Result<StorageMap> {
    let mut storage = IndexMap::new();
    for (id, raw) in raw {
        let item = build_storage_technology(&id, raw, carriers)
            .with_context(|| format!("Invalid parameters for storage {id}"))?;
        insert_unique(&mut storage, item)?;
    }

    Ok(storage.into_iter().map(|(id, s)| (id, Rc::new(s))).collect())
}

fn build_storage_technology(
    id: &str,
    raw: StorageRaw,
    carriers: &CarrierMap,
) -> Result<StorageTechnology> {
    let carrier = &carriers[&carriers.get_id_by_str(&raw.carrier)?];
    let max_capacity = require(raw.max_capacity, &format!("storage.{id}.max_capacity"))?;
    check_capacity_bounds(raw.min_capacity, Some(max_capacity))?;
    check_coefficients(
        raw.investment_cost,
        raw.fixed_investment_cost,
        raw.lifetime,
        raw.embodied_emissions,
    )?;
    ensure!(raw.self_discharge < 1.0, "self_discharge must be less than 1");
    for (name, rate) in [
        ("max_charge_rate", raw.max_charge_rate),
        ("max_discharge_rate", raw.max_discharge_rate),
    ] {
        ensure!(
            rate.is_finite() && rate > 0.0,
            "{name} must be finite and positive"
        );
    }

    Ok(StorageTechnology {
        id: id.into(),
        description: raw.description,
        carrier: Rc::clone(carrier),
        charge_efficiency: Dimensionless(raw.charge_efficiency),
        discharge_efficiency: Dimensionless(raw.discharge_efficiency),
        self_discharge: Dimensionless(raw.self_discharge),
        max_charge_rate: Dimensionless(raw.max_charge_rate),
        max_discharge_rate: Dimensionless(raw.max_discharge_rate),
        min_capacity: Power(raw.min_capacity),
        max_capacity: Power(max_capacity),
        investment_cost: MoneyPerPower(raw.investment_cost),
        fixed_investment_cost: Money(raw.fixed_investment_cost),
        lifetime: raw.lifetime,
        embodied_emissions: EmissionsPerPower(raw.embodied_emissions),
    })
}

fn build_buildings(
    raw: IndexMap<String, BuildingRaw>,
    profiles: &ProfileMap,
) -> Result<BuildingMap> {
    let mut buildings = IndexMap::new();
    for (id, raw) in raw {
        let mut retrofits = IndexMap::new();
        for (option_id, option) in raw.retrofits {
            let option = build_retrofit(&option_id, option, profiles).with_context(|| {
                format!("Invalid parameters for retrofit option {option_id} of building {id}")
            })?;
            insert_unique(&mut retrofits, option)?;
        }

        let building = Building {
            id: id.into(),
            description: raw.description,
            retrofits: retrofits
                .into_iter()
                .map(|(id, option)| (id, Rc::new(option)))
                .collect(),
        };
        insert_unique(&mut buildings, building)?;
    }

    Ok(buildings
        .into_iter()
        .map(|(id, b)| (id, Rc::new(b)))
        .collect())
}

fn build_retrofit(id: &str, raw: RetrofitRaw, profiles: &ProfileMap) -> Result<RetrofitOption> {
    check_coefficients(raw.investment_cost, 0.0, raw.lifetime, raw.embodied_emissions)?;

    let mut demand = IndexMap::new();
    for (carrier, value) in raw.demand {
        let value = value.resolve(profiles)?;
        value
            .check_range(0.0, f64::INFINITY)
            .with_context(|| format!("Invalid demand for carrier {carrier}"))?;
        demand.insert(carrier.into(), value);
    }

    Ok(RetrofitOption {
        id: id.into(),
        description: raw.description,
        investment_cost: Money(raw.investment_cost),
        lifetime: raw.lifetime,
        embodied_emissions: Emissions(raw.embodied_emissions),
        demand,
    })
}
