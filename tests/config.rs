use batchload::config::{BatchLoadConfig, CallableSpec, ConfigError};

fn parse(yaml: &str) -> BatchLoadConfig {
    serde_yaml::from_str(yaml).expect("fixture should deserialize")
}

const FIXTURE: &str = r#"
defaults:
  promise_adapter: webonyx_graphql_promise_adapter
  options:
    max_batch_size: 100
loaders:
  users:
    alias: user_loader
    batch_load_fn: "@app.user_loader:all"
  images:
    batch_load_fn: 'App\Loaders\Images::batch'
    options:
      cache: false
      max_batch_size: 10
"#;

#[test]
fn accepts_service_notation() {
    assert_eq!(
        "@my.service:methodName".parse::<CallableSpec>().unwrap(),
        CallableSpec::Service { id: "my.service".to_owned(), method: Some("methodName".to_owned()) }
    );
    assert_eq!(
        "@mailer".parse::<CallableSpec>().unwrap(),
        CallableSpec::Service { id: "mailer".to_owned(), method: None }
    );
}

#[test]
fn accepts_function_notation() {
    assert_eq!(
        r"My\Namespace\func::method".parse::<CallableSpec>().unwrap(),
        CallableSpec::Function {
            function: r"My\Namespace\func".to_owned(),
            method: Some("method".to_owned())
        }
    );
    assert_eq!(
        "array_map".parse::<CallableSpec>().unwrap(),
        CallableSpec::Function { function: "array_map".to_owned(), method: None }
    );
}

#[test]
fn rejects_malformed_callables() {
    for bad in ["not a valid anything", "@", "@:method", "::orphan", "123starts_with_digit"] {
        let err = bad.parse::<CallableSpec>().unwrap_err();
        assert!(
            matches!(&err, ConfigError::InvalidCallable(v) if v.as_str() == bad),
            "expected InvalidCallable for {bad:?}, got {err:?}"
        );
    }
}

#[test]
fn callable_display_round_trips_the_notation() {
    for notation in ["@my.service:methodName", "@mailer", r"My\Namespace\func::method", "strlen"] {
        let spec = notation.parse::<CallableSpec>().unwrap();
        assert_eq!(spec.to_string(), notation);
    }
}

#[test]
fn rejects_invalid_callable_during_deserialization() {
    let err = serde_yaml::from_str::<BatchLoadConfig>(
        r#"
defaults:
  promise_adapter: adapter
loaders:
  broken:
    batch_load_fn: "not a valid anything"
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("doesn't seem to be a valid callable"), "{err}");
}

#[test]
fn loader_options_default_from_the_defaults_block() {
    let config = parse(FIXTURE);
    let users = config.resolve_loader("users").unwrap();

    assert!(users.options.batch);
    assert!(users.options.cache);
    assert_eq!(users.options.max_batch_size, Some(100));
    assert_eq!(users.options.cache_map, "batchload.cache_map");
}

#[test]
fn loader_options_override_the_defaults_block() {
    let config = parse(FIXTURE);
    let images = config.resolve_loader("images").unwrap();

    assert!(!images.options.cache);
    assert_eq!(images.options.max_batch_size, Some(10));
    // Untouched fields still come from defaults.
    assert!(images.options.batch);
}

#[test]
fn loaders_are_reachable_by_alias() {
    let config = parse(FIXTURE);
    let by_alias = config.resolve_loader("user_loader").unwrap();
    assert_eq!(by_alias.name, "users");

    let missing = config.resolve_loader("nope").unwrap_err();
    assert!(matches!(missing, ConfigError::UnknownLoader(name) if name == "nope"));
}

#[test]
fn factory_falls_back_from_loader_to_defaults_to_root() {
    let config = parse(
        r#"
factory: "@root.factory"
defaults:
  promise_adapter: adapter
  factory: "@defaults.factory"
loaders:
  custom:
    factory: "@custom.factory"
    batch_load_fn: "@app.loader"
  inherited:
    batch_load_fn: "@app.loader"
"#,
    );
    let custom = config.resolve_loader("custom").unwrap();
    assert_eq!(custom.factory.unwrap().to_string(), "@custom.factory");

    let inherited = config.resolve_loader("inherited").unwrap();
    assert_eq!(inherited.factory.unwrap().to_string(), "@defaults.factory");
}

#[test]
fn rejects_invalid_alias() {
    let config = parse(
        r#"
defaults:
  promise_adapter: adapter
loaders:
  users:
    alias: "not/ok"
    batch_load_fn: "@app.user_loader"
"#,
    );
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidAlias(alias) if alias == "not/ok"));
}

#[test]
fn rejects_blank_promise_adapter() {
    let config = parse(
        r#"
defaults:
  promise_adapter: "  "
"#,
    );
    assert!(matches!(config.validate().unwrap_err(), ConfigError::MissingPromiseAdapter));
}

#[test]
fn resolved_options_convert_to_core_loader_options() {
    let config = parse(FIXTURE);
    let images = config.resolve_loader("images").unwrap();
    let options = images.options.loader_options::<i64>();

    let rendered = format!("{options:?}");
    assert!(rendered.contains("batch: true"), "{rendered}");
    assert!(rendered.contains("cache: false"), "{rendered}");
    assert!(rendered.contains("max_batch_size: Some(10)"), "{rendered}");
}
