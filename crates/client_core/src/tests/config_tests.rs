use std::collections::HashMap;

use super::*;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_are_placeholders() {
    let config = ClientConfig::default();
    assert!(config.identity_is_placeholder());
    assert!(config.analyze_url().is_err());
    assert!(!config.cache_token);
}

#[test]
fn analyze_url_tolerates_trailing_slashes() {
    let mut config = ClientConfig::default();
    config.api_base_url = "https://api.example.com/prod//".into();
    assert_eq!(
        config.analyze_url().expect("url").as_str(),
        "https://api.example.com/prod/analyze"
    );

    config.api_base_url = "http://127.0.0.1:9000".into();
    assert_eq!(
        config.analyze_url().expect("url").as_str(),
        "http://127.0.0.1:9000/analyze"
    );
}

#[test]
fn analyze_url_rejects_garbage() {
    let mut config = ClientConfig::default();
    config.api_base_url = "not a url".into();
    assert!(config.analyze_url().is_err());

    config.api_base_url = "   ".into();
    assert!(config.analyze_url().is_err());
}

#[test]
fn file_values_override_defaults() {
    let mut config = ClientConfig::default();
    apply_file_overrides(
        &mut config,
        r#"
user_pool_id = "eu-west-1_abc"
client_id = "client-123"
api_url = "https://api.example.com"
session_path = "/tmp/session.json"
cache_token = true
"#,
    );
    assert_eq!(config.user_pool_id, "eu-west-1_abc");
    assert_eq!(config.identity_client_id, "client-123");
    assert_eq!(config.api_base_url, "https://api.example.com");
    assert_eq!(config.session_path, PathBuf::from("/tmp/session.json"));
    assert!(config.cache_token);
    assert!(!config.identity_is_placeholder());
}

#[test]
fn malformed_file_is_ignored() {
    let mut config = ClientConfig::default();
    apply_file_overrides(&mut config, "this is = = not toml");
    assert_eq!(config.user_pool_id, PLACEHOLDER_USER_POOL_ID);
}

#[test]
fn prefixed_env_wins_over_plain_env() {
    let mut config = ClientConfig::default();
    apply_env_overrides(
        &mut config,
        env_from(&[
            ("ANALYZE_API_URL", "https://plain.example.com"),
            ("APP__ANALYZE_API_URL", "https://prefixed.example.com"),
            ("IDENTITY_CLIENT_ID", "abc"),
            ("APP__CACHE_TOKEN", "true"),
        ]),
    );
    assert_eq!(config.api_base_url, "https://prefixed.example.com");
    assert_eq!(config.identity_client_id, "abc");
    assert!(config.cache_token);
}

#[test]
fn non_boolean_cache_flag_is_ignored() {
    let mut config = ClientConfig::default();
    apply_env_overrides(&mut config, env_from(&[("APP__CACHE_TOKEN", "yes please")]));
    assert!(!config.cache_token);
}
