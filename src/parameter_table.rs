//! The typed, validated container for all techno-economic and environmental inputs.
use crate::carrier::{CarrierID, CarrierMap};
use crate::error::HubError;
use crate::retrofit::BuildingMap;
use crate::technology::{StorageMap, TechnologyMap};
use crate::units::{Area, Emissions, Length, Money, MoneyPerEmissions, MoneyPerLength};
use anyhow::{Result, ensure};
use std::collections::HashSet;

/// Carbon offsets which can be bought to reduce net emissions
#[derive(PartialEq, Debug, Clone)]
pub struct CarbonCertificates {
    /// Price per unit of emissions offset
    pub price: MoneyPerEmissions,
    /// Maximum quantity which can be bought per year
    pub max_quantity: Emissions,
}

/// A thermal network connecting the buildings to the hub
#[derive(PartialEq, Debug, Clone)]
pub struct ThermalNetwork {
    /// Total pipe length
    pub length: Length,
    /// Investment cost per metre of pipe
    pub cost_per_metre: MoneyPerLength,
    /// Lifetime in years
    pub lifetime: u32,
}

impl ThermalNetwork {
    /// Up-front cost of building the network
    pub fn investment_cost(&self) -> Money {
        self.cost_per_metre * self.length
    }
}

/// Limits and shared infrastructure of the site as a whole
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Site {
    /// Roof area shared by roof-mounted technologies. `None` means unlimited.
    pub roof_area: Option<Area>,
    /// The thermal network, if its cost is to be included
    pub network: Option<ThermalNetwork>,
}

impl Site {
    fn validate(&self) -> Result<()> {
        if let Some(roof_area) = self.roof_area {
            ensure!(
                roof_area.is_finite() && roof_area >= Area(0.0),
                HubError::Configuration("Roof area must be finite and non-negative".into())
            );
        }
        if let Some(network) = &self.network {
            ensure!(
                network.length.is_finite() && network.length >= Length(0.0),
                HubError::Configuration("Network length must be finite and non-negative".into())
            );
            ensure!(
                network.cost_per_metre.is_finite() && network.cost_per_metre >= MoneyPerLength(0.0),
                HubError::Configuration(
                    "Network cost_per_metre must be finite and non-negative".into()
                )
            );
            ensure!(
                network.lifetime > 0,
                HubError::Configuration("Network lifetime must be greater than zero".into())
            );
        }

        Ok(())
    }
}

/// All the parameters describing the hub, its buildings and markets.
///
/// The table is validated once when it is created and is immutable thereafter.
#[derive(PartialEq, Debug)]
pub struct ParameterTable {
    /// Energy carriers and resources
    pub carriers: CarrierMap,
    /// Conversion technologies
    pub technologies: TechnologyMap,
    /// Storage technologies
    pub storage: StorageMap,
    /// Buildings and their retrofit options
    pub buildings: BuildingMap,
    /// Carbon certificate market, if any
    pub certificates: Option<CarbonCertificates>,
    /// Site-wide roof area and thermal network
    pub site: Site,
}

impl ParameterTable {
    /// Create a new [`ParameterTable`], checking that its contents are consistent
    pub fn new(
        carriers: CarrierMap,
        technologies: TechnologyMap,
        storage: StorageMap,
        buildings: BuildingMap,
        certificates: Option<CarbonCertificates>,
    ) -> Result<Self> {
        let table = Self {
            carriers,
            technologies,
            storage,
            buildings,
            certificates,
            site: Site::default(),
        };
        table.validate()?;

        Ok(table)
    }

    /// Attach site-wide parameters to the table
    pub fn with_site(self, site: Site) -> Result<Self> {
        site.validate()?;

        Ok(Self { site, ..self })
    }

    /// Whether any technology competes for roof area
    pub fn uses_roof_area(&self) -> bool {
        self.technologies
            .values()
            .any(|technology| technology.roof_area_per_capacity.value() > 0.0)
    }

    /// Carriers for which some building has a demand
    pub fn demand_carriers(&self) -> HashSet<CarrierID> {
        self.buildings
            .values()
            .flat_map(|building| building.retrofits.values())
            .flat_map(|option| option.demand.keys().cloned())
            .collect()
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.carriers.is_empty(), HubError::MissingParameter("carriers".into()));

        for building in self.buildings.values() {
            ensure!(
                !building.retrofits.is_empty(),
                HubError::Configuration(format!(
                    "Building {} must have at least one retrofit option",
                    building.id
                ))
            );
        }

        for carrier in self.demand_carriers() {
            let known = self.carriers.get(&carrier).ok_or_else(|| {
                HubError::MissingParameter(format!("carriers.{carrier}"))
            })?;
            ensure!(
                known.is_balanced(),
                HubError::Configuration(format!(
                    "Demand is given for resource carrier {carrier}"
                ))
            );
        }

        for storage in self.storage.values() {
            ensure!(
                storage.carrier.is_balanced(),
                HubError::Configuration(format!(
                    "Storage {} stores resource carrier {}",
                    storage.id, storage.carrier.id
                ))
            );
        }

        if let Some(certificates) = &self.certificates {
            ensure!(
                certificates.price.is_finite() && certificates.price >= MoneyPerEmissions(0.0),
                HubError::Configuration("Certificate price must be non-negative".into())
            );
            ensure!(
                certificates.max_quantity.is_finite()
                    && certificates.max_quantity >= Emissions(0.0),
                HubError::Configuration(
                    "Certificate max_quantity must be finite and non-negative".into()
                )
            );
        }

        Ok(())
    }

    /// Total cost of buying `quantity` certificates
    pub fn certificate_cost(&self, quantity: Emissions) -> Money {
        self.certificates
            .as_ref()
            .map_or(Money(0.0), |certificates| certificates.price * quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_hub_error;
    use crate::fixture::{assert_error, buildings, carriers};
    use indexmap::IndexMap;
    use map_macro::hash_set;
    use rstest::rstest;

    #[rstest]
    fn test_new(carriers: CarrierMap, buildings: BuildingMap) {
        let table =
            ParameterTable::new(carriers, IndexMap::new(), IndexMap::new(), buildings, None)
                .unwrap();
        assert_eq!(table.demand_carriers(), hash_set! {"heat".into()});
        assert_eq!(table.certificate_cost(Emissions(10.0)), Money(0.0));
    }

    #[rstest]
    fn test_no_carriers(buildings: BuildingMap) {
        let err = ParameterTable::new(
            IndexMap::new(),
            IndexMap::new(),
            IndexMap::new(),
            buildings,
            None,
        )
        .unwrap_err();
        assert!(is_hub_error(&err, |e| *e
            == HubError::MissingParameter("carriers".into())));
    }

    #[rstest]
    fn test_undeclared_demand_carrier(mut carriers: CarrierMap, buildings: BuildingMap) {
        carriers.shift_remove("heat");
        assert_error!(
            ParameterTable::new(carriers, IndexMap::new(), IndexMap::new(), buildings, None),
            "Missing required parameter: carriers.heat"
        );
    }

    #[rstest]
    fn test_certificate_cost(carriers: CarrierMap, buildings: BuildingMap) {
        let certificates = CarbonCertificates {
            price: MoneyPerEmissions(0.1),
            max_quantity: Emissions(1000.0),
        };
        let table = ParameterTable::new(
            carriers,
            IndexMap::new(),
            IndexMap::new(),
            buildings,
            Some(certificates),
        )
        .unwrap();
        assert_eq!(table.certificate_cost(Emissions(10.0)), Money(1.0));
    }

    #[rstest]
    fn test_with_site(carriers: CarrierMap, buildings: BuildingMap) {
        let table =
            ParameterTable::new(carriers, IndexMap::new(), IndexMap::new(), buildings, None)
                .unwrap();
        assert_eq!(table.site, Site::default());
        assert!(!table.uses_roof_area());

        let network = ThermalNetwork {
            length: Length(400.0),
            cost_per_metre: MoneyPerLength(250.0),
            lifetime: 40,
        };
        assert_eq!(network.investment_cost(), Money(100000.0));
        let site = Site {
            roof_area: Some(Area(300.0)),
            network: Some(network),
        };
        let table = table.with_site(site.clone()).unwrap();
        assert_eq!(table.site, site);
    }

    #[rstest]
    #[case(Some(Area(-1.0)), 40)]
    #[case(Some(Area(f64::INFINITY)), 40)]
    #[case(None, 0)]
    fn test_with_site_invalid(
        carriers: CarrierMap,
        buildings: BuildingMap,
        #[case] roof_area: Option<Area>,
        #[case] lifetime: u32,
    ) {
        let table =
            ParameterTable::new(carriers, IndexMap::new(), IndexMap::new(), buildings, None)
                .unwrap();
        let site = Site {
            roof_area,
            network: Some(ThermalNetwork {
                length: Length(100.0),
                cost_per_metre: MoneyPerLength(10.0),
                lifetime,
            }),
        };
        let err = table.with_site(site).unwrap_err();
        assert!(is_hub_error(&err, |e| matches!(
            e,
            HubError::Configuration(_)
        )));
    }
}
