mod common;
use common::demo_dir;
use ehub::model::{Model, ObjectiveMode};
use ehub::time_step::TemporalResolution;
use ehub::units::{Area, Money};

/// An integration test which attempts to load the demo model
#[test]
fn test_model_from_path() {
    let model = Model::from_path(demo_dir("simple_hub")).unwrap();
    assert_eq!(
        model.parameters.temporal_resolution,
        TemporalResolution::TypicalDays
    );
    assert_eq!(model.parameters.objective, ObjectiveMode::MultiObjective);

    // Four typical days of 24 hours
    assert_eq!(model.time_step_info.len(), 96);
    assert_eq!(model.table.technologies.len(), 4);
    assert_eq!(model.table.storage.len(), 2);
    assert_eq!(model.table.buildings["office"].retrofits.len(), 2);

    // PV shares the roof and the thermal network is costed
    assert_eq!(model.table.site.roof_area, Some(Area(900.0)));
    assert!(model.table.uses_roof_area());
    assert_eq!(
        model.table.site.network.as_ref().unwrap().investment_cost(),
        Money(108000.0)
    );
}
