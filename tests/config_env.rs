// tests/config_env.rs
use calendar_sync::config::{ENV_COLLECTION_ID, ENV_STATUS_ADDR, ENV_WEBFLOW_API_TOKEN};
use calendar_sync::SyncConfig;
use std::env;

fn clear() {
    for k in [ENV_WEBFLOW_API_TOKEN, ENV_COLLECTION_ID, ENV_STATUS_ADDR] {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn from_env_fails_fast_without_credentials() {
    clear();
    let err = SyncConfig::from_env().unwrap_err();
    assert!(err.to_string().contains(ENV_WEBFLOW_API_TOKEN));

    env::set_var(ENV_WEBFLOW_API_TOKEN, "tok");
    let err = SyncConfig::from_env().unwrap_err();
    assert!(err.to_string().contains(ENV_COLLECTION_ID));
    clear();
}

#[serial_test::serial]
#[test]
fn from_env_reads_process_environment() {
    clear();
    env::set_var(ENV_WEBFLOW_API_TOKEN, "tok");
    env::set_var(ENV_COLLECTION_ID, "col-9");
    env::set_var(ENV_STATUS_ADDR, "127.0.0.1:8081");

    let cfg = SyncConfig::from_env().expect("config");
    assert_eq!(cfg.collection_id, "col-9");
    assert_eq!(cfg.status_addr.map(|a| a.port()), Some(8081));
    clear();
}
