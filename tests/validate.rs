//! Integration tests for the `validate` command.
mod common;
use common::demo_dir;
use ehub::cli::{ModelOverrides, handle_validate_command};
use ehub::log::is_logger_initialised;
use ehub::settings::Settings;

/// An integration test for the `validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("EHUB_LOG_LEVEL", "off") };

    assert!(!is_logger_initialised());

    handle_validate_command(
        &demo_dir("simple_hub"),
        &ModelOverrides::default(),
        Some(Settings::default()),
    )
    .unwrap();

    assert!(is_logger_initialised());
}
