use clap::Parser;

use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_describe_a_self_contained_site() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.site.url.as_str(), "http://localhost:3000/");
    assert_eq!(settings.site.language, "en-US");
    assert!(settings.content.api_url.is_none());
    assert!(settings.cache.redis_url.is_none());
    assert!(settings.database.url.is_none());
    assert!(settings.mail.transport.is_none());
    assert_eq!(settings.content.page_size.get(), 10);
    assert_eq!(settings.guestbook.write.max_requests.get(), 5);
    assert_eq!(settings.guestbook.read.window(), Duration::from_secs(60));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_page_size_is_rejected() {
    let mut raw = RawSettings::default();
    raw.content.page_size = Some(0);

    let err = Settings::from_raw(raw).expect_err("invalid settings");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "content.page_size",
            ..
        }
    ));
}

#[test]
fn non_http_site_url_is_rejected() {
    let mut raw = RawSettings::default();
    raw.site.url = Some("ftp://example.com".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid settings");
    assert!(matches!(err, LoadError::Invalid { key: "site.url", .. }));
}

#[test]
fn mail_api_url_requires_key() {
    let mut raw = RawSettings::default();
    raw.mail.api_url = Some("https://mail.example/send".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid settings");
    assert!(matches!(err, LoadError::Invalid { key: "mail.api_key", .. }));

    let mut raw = RawSettings::default();
    raw.mail.api_url = Some("https://mail.example/send".to_string());
    raw.mail.api_key = Some("secret".to_string());
    raw.mail.notify_to = Some("  ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.mail.transport.is_some());
    assert!(settings.mail.notify_to.is_none());
}

#[test]
fn blank_urls_are_treated_as_unset() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());
    raw.cache.redis_url = Some(String::new());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
    assert!(settings.cache.redis_url.is_none());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["vitrine"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from(["vitrine", "migrate", "--database-url", "postgres://example"]);

    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => {
            assert_eq!(
                migrate.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "vitrine",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--site-url",
        "https://shop.example",
        "--cache-redis-url",
        "redis://cache:6379",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.site_url.as_deref(),
                Some("https://shop.example")
            );
            assert_eq!(
                serve.overrides.redis_url.as_deref(),
                Some("redis://cache:6379")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
