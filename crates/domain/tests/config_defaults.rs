use orion_domain::config::Config;

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn explicit_host_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 4310
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.field == "server.host"), "non-loopback host should warn");
}

#[test]
fn spec_thresholds_are_defaults() {
    let config = Config::default();
    assert_eq!(config.engines.health.window, 20);
    assert_eq!(config.engines.health.healthy_p50_ms, 2_500);
    assert_eq!(config.engines.health.degraded_p50_ms, 5_000);
    assert_eq!(config.memory.similarity_threshold, 0.3);
    assert_eq!(config.memory.compress_threshold, 50);
    assert_eq!(config.supervisor.max_subtasks, 8);
    assert_eq!(config.supervisor.wall_clock_secs, 120);
    assert_eq!(config.heartbeat.voi_threshold, 0.3);
    assert_eq!(config.transport.pairing.code_ttl_secs, 300);
    assert_eq!(config.usage.buffer_capacity, 1_000);
    assert_eq!(config.acp.handler_timeout_secs, 30);
}

#[test]
fn bad_alpha_is_a_config_error() {
    let mut config = Config::default();
    config.memory.alpha = 0.0;
    let issues = config.validate();
    assert!(issues.iter().any(|i| i.field == "memory.alpha"));
}
