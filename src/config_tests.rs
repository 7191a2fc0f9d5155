use super::*;

fn temp_root() -> tempfile::TempDir {
    tempfile::tempdir().expect("create temp root")
}

#[test]
fn written_defaults_load_back_unchanged() {
    let root = temp_root();
    let path = root.path().join(CONFIG_FILE_NAME);
    write_config(&path, &default_config()).expect("write config");
    let parsed = load_config(&path).expect("load config");
    assert_eq!(parsed, default_config());
    validate_config(&parsed).expect("defaults are valid");
}

#[test]
fn missing_fields_take_defaults() {
    let parsed: PipelineConfig =
        serde_json::from_str(r#"{"schema_version":1,"export_format":"pdf","rating_mode":true}"#)
            .expect("parse partial config");
    assert_eq!(parsed.export_format, ExportFormat::Pdf);
    assert!(parsed.rating_mode);
    assert!(parsed.locking_enabled);
    assert_eq!(parsed.max_rows, DEFAULT_MAX_ROWS);
    assert_eq!(parsed.model, DEFAULT_MODEL);
}

#[test]
fn unknown_fields_are_rejected() {
    let result = serde_json::from_str::<PipelineConfig>(r#"{"lockingEnabled":true}"#);
    assert!(result.is_err());
}

#[test]
fn write_then_load_roundtrips() {
    let root = temp_root();
    let path = root.path().join("nested").join(CONFIG_FILE_NAME);
    let config = PipelineConfig {
        password_required: true,
        template: Some(PathBuf::from("template.docx")),
        lm_command: Some("llm -m local".to_string()),
        ..default_config()
    };
    write_config(&path, &config).expect("write config");
    assert_eq!(load_config(&path).expect("load config"), config);
}

#[test]
fn validate_rejects_out_of_range_values() {
    let cases = [
        PipelineConfig {
            schema_version: 2,
            ..default_config()
        },
        PipelineConfig {
            max_rows: 0,
            ..default_config()
        },
        PipelineConfig {
            temperature: 1.5,
            ..default_config()
        },
        PipelineConfig {
            temperature: -0.1,
            ..default_config()
        },
        PipelineConfig {
            model: " ".to_string(),
            ..default_config()
        },
        PipelineConfig {
            timeout_secs: 0,
            ..default_config()
        },
        PipelineConfig {
            lm_command: Some(String::new()),
            ..default_config()
        },
    ];
    for config in cases {
        assert!(
            matches!(validate_config(&config), Err(FormError::Config(_))),
            "accepted {config:?}"
        );
    }
}

#[test]
fn load_reports_invalid_json_as_config_error() {
    let root = temp_root();
    let path = root.path().join(CONFIG_FILE_NAME);
    fs::write(&path, "{not json").expect("write");
    assert!(matches!(load_config(&path), Err(FormError::Config(_))));
}

#[test]
fn resolve_prefers_explicit_then_local_file() {
    let root = temp_root();
    let explicit = root.path().join("custom.json");
    assert_eq!(
        resolve_config_path(Some(&explicit), root.path()),
        Some(explicit.clone())
    );

    let local = root.path().join(CONFIG_FILE_NAME);
    fs::write(&local, "{}").expect("write local config");
    assert_eq!(resolve_config_path(None, root.path()), Some(local));
}

#[test]
fn load_resolved_reads_the_local_file() {
    let root = temp_root();
    let local = root.path().join(CONFIG_FILE_NAME);
    write_config(
        &local,
        &PipelineConfig {
            max_rows: 4,
            ..default_config()
        },
    )
    .expect("write");
    let (config, path) = load_resolved(None, root.path()).expect("load resolved");
    assert_eq!(config.max_rows, 4);
    assert_eq!(path, Some(local));
}

#[test]
fn lm_command_resolution_order() {
    let mut config = default_config();
    assert_eq!(resolve_lm_command(None, &config, None), None);
    assert_eq!(
        resolve_lm_command(None, &config, Some("env-cmd".to_string())),
        Some("env-cmd".to_string())
    );
    config.lm_command = Some("config-cmd".to_string());
    assert_eq!(
        resolve_lm_command(None, &config, Some("env-cmd".to_string())),
        Some("config-cmd".to_string())
    );
    assert_eq!(
        resolve_lm_command(Some("cli-cmd"), &config, Some("env-cmd".to_string())),
        Some("cli-cmd".to_string())
    );
    assert_eq!(resolve_lm_command(Some("  "), &config, None), None);
}
