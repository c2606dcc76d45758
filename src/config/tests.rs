use std::net::IpAddr;

use super::*;

#[test]
fn defaults_match_the_documented_surface() {
    let config = Config::default();
    assert_eq!(config.port, 8000);
    assert_eq!(config.max_chunks, 4);
    assert_eq!(config.retrieve_k, 8);
    assert!(config.qa_cache_enabled);
    assert_eq!(config.qa_cache_similarity_threshold, 0.95);
    assert_eq!(config.qa_cache_ttl_hours, 24);
    assert_eq!(config.qa_match_threshold, 0.85);
    assert_eq!(config.question_similarity_threshold, 0.85);
    assert_eq!(config.cosine_similarity_threshold, 0.85);
    assert!(config.query_expansion_enabled);
    assert_eq!(config.questions_per_language, 5);
    assert_eq!(config.embedding_dim, 1536);
    assert!(config.validate().is_ok());
}

#[test]
fn bool_parsing_accepts_common_truthy_forms() {
    assert!(parse_bool(Some("true".into()), false));
    assert!(parse_bool(Some("TRUE".into()), false));
    assert!(parse_bool(Some("1".into()), false));
    assert!(!parse_bool(Some("false".into()), true));
    assert!(!parse_bool(Some("off".into()), true));
    assert!(parse_bool(None, true));
}

#[test]
fn port_rejects_zero_and_garbage() {
    assert_eq!(parse_port(None, 8000).unwrap(), 8000);
    assert_eq!(parse_port(Some("9000".into()), 8000).unwrap(), 9000);
    assert!(parse_port(Some("0".into()), 8000).is_err());
    assert!(parse_port(Some("not-a-port".into()), 8000).is_err());
}

#[test]
fn bind_addr_parses_v4_and_v6() {
    let v4: IpAddr = "0.0.0.0".parse().unwrap();
    assert_eq!(
        parse_bind_addr(Some("0.0.0.0".into()), "127.0.0.1".parse().unwrap()).unwrap(),
        v4
    );
    assert!(parse_bind_addr(Some("::1".into()), v4).is_ok());
    assert!(parse_bind_addr(Some("localhost".into()), v4).is_err());
}

#[test]
fn numeric_parsers_surface_the_variable_name() {
    let err = parse_usize(Some("abc".into()), 4, "MAX_CHUNKS").unwrap_err();
    assert!(err.to_string().contains("MAX_CHUNKS"));

    let err = parse_f32(Some("high".into()), 0.95, "QA_CACHE_SIMILARITY_THRESHOLD").unwrap_err();
    assert!(err.to_string().contains("QA_CACHE_SIMILARITY_THRESHOLD"));
}

#[test]
fn pgvector_requires_a_database_url() {
    let config = Config {
        use_pgvector: true,
        pgvector_database_url: None,
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingDatabaseUrl)
    ));

    let config = Config {
        use_pgvector: true,
        pgvector_database_url: Some("postgres://localhost/kb".into()),
        ..Config::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn thresholds_outside_unit_interval_are_rejected() {
    let config = Config {
        qa_match_threshold: 1.5,
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidThreshold { .. })
    ));
}

#[test]
fn settings_mirror_the_config() {
    let config = Config {
        max_chunks: 6,
        retrieve_k: 12,
        qa_cache_enabled: false,
        ..Config::default()
    };
    let settings = config.service_settings();
    assert_eq!(settings.max_chunks, 6);
    assert_eq!(settings.retrieve_k, 12);
    assert!(!settings.cache_enabled);
}
