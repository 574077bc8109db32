#![cfg(feature = "serde")]

use ai_bt::TreeConfig;

#[test]
fn missing_fields_fall_back_to_defaults() {
    let config: TreeConfig =
        serde_json::from_str(r#"{ "restart_on_end": false }"#).expect("parse config");

    assert!(!config.restart_on_end);
    assert!(!config.pause_after_single_execution);
    assert_eq!(config.max_steps_per_pass, TreeConfig::default().max_steps_per_pass);
}
