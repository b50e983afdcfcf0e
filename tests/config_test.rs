//! Configuration file and registry document format tests

/// Verify the configuration file shape parses and carries the expected
/// defaults when fields are spelled out.
#[test]
fn test_config_file_values() {
    let toml_str = r#"
root_dir = "/opt/docker-setup"
default_image = "liquidinvestigations/hoover-snoop2"
snoop_port_base = 45025
flower_port_base = 15555
pg_port_base = 5432
"#;

    let config: toml::Value = toml::from_str(toml_str).expect("valid TOML");
    assert_eq!(
        config.get("root_dir").unwrap().as_str().unwrap(),
        "/opt/docker-setup"
    );
    assert_eq!(
        config.get("snoop_port_base").unwrap().as_integer().unwrap(),
        45025
    );
    assert_eq!(
        config.get("pg_port_base").unwrap().as_integer().unwrap(),
        5432
    );
}

/// An empty configuration file is valid; every field has a default.
#[test]
fn test_empty_config_is_valid() {
    let config: toml::Value = toml::from_str("").expect("valid TOML");
    assert!(config.get("root_dir").is_none());
}

/// Verify the registry document shape: a name-keyed collections map with
/// per-collection flags, ports and env.
#[test]
fn test_registry_document_shape() {
    let json_str = r#"
{
  "collections": {
    "testdata": {
      "image": "liquidinvestigations/hoover-snoop2",
      "autoindex": true,
      "profiling": false,
      "tracing": false,
      "for_dev": true,
      "snoop_port": 45025,
      "flower_port": 15555,
      "pg_port": 5433,
      "env": {
        "secret_key": "secret-key===",
        "debug": true,
        "base_url": "http://localhost",
        "stats": false
      }
    }
  }
}
"#;

    let doc: serde_json::Value = serde_json::from_str(json_str).expect("valid JSON");
    let collection = &doc["collections"]["testdata"];
    assert_eq!(collection["snoop_port"], 45025);
    assert_eq!(collection["flower_port"], 15555);
    assert_eq!(collection["env"]["debug"], true);
}
