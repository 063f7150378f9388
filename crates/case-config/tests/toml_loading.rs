//! Integration tests for TOML configuration loading.
//!
//! Uses figment::Jail for safe, sandboxed env var manipulation.

use case_config::CasebookConfig;
use figment::{
    Figment, Jail,
    providers::{Env, Format, Serialized, Toml},
};
use pretty_assertions::assert_eq;

#[test]
fn loads_all_sections_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[database]
path = "/var/lib/casebook/cases.db"
busy_timeout_ms = 250

[listing]
default_page_size = 25
max_page_size = 200

[retention]
closed_max_age_days = 30
cleanup_batch_size = 10

[general]
default_org_id = "acme"
"#,
        )?;

        let config: CasebookConfig = Figment::from(Serialized::defaults(CasebookConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.database.path, "/var/lib/casebook/cases.db");
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert_eq!(config.listing.default_page_size, 25);
        assert_eq!(config.listing.max_page_size, 200);
        assert_eq!(config.retention.closed_max_age_days, 30);
        assert_eq!(config.retention.cleanup_batch_size, 10);
        assert_eq!(config.general.default_org_id, "acme");
        Ok(())
    });
}

#[test]
fn partial_toml_keeps_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[listing]
max_page_size = 500
"#,
        )?;

        let config: CasebookConfig = Figment::from(Serialized::defaults(CasebookConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.listing.max_page_size, 500);
        assert_eq!(config.listing.default_page_size, 50);
        assert_eq!(config.database.path, ".casebook/cases.db");
        assert_eq!(config.retention.closed_max_age_days, 90);
        Ok(())
    });
}

#[test]
fn env_overrides_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[database]
path = "from-toml.db"
"#,
        )?;
        jail.set_env("CASEBOOK_DATABASE__PATH", ":memory:");

        let config: CasebookConfig = Figment::from(Serialized::defaults(CasebookConfig::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("CASEBOOK_").split("__"))
            .extract()?;

        assert_eq!(config.database.path, ":memory:");
        assert!(config.database.is_in_memory());
        Ok(())
    });
}

#[test]
fn project_config_file_is_picked_up() {
    Jail::expect_with(|jail| {
        jail.create_dir(".casebook")?;
        jail.create_file(
            ".casebook/config.toml",
            r#"
[general]
default_org_id = "project-org"
"#,
        )?;

        let config = CasebookConfig::load().expect("config loads");
        assert_eq!(config.general.default_org_id, "project-org");
        Ok(())
    });
}

#[test]
fn invalid_toml_values_fail_validation() {
    Jail::expect_with(|jail| {
        jail.create_dir(".casebook")?;
        jail.create_file(
            ".casebook/config.toml",
            r#"
[listing]
default_page_size = 0
"#,
        )?;

        assert!(CasebookConfig::load().is_err());
        Ok(())
    });
}
