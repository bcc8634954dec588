use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use ossec_config_core::{
    BlockUpdates, ConfigError, ConfigManager, IntegrationSelector, ListItem, ManagerOptions,
    SaveOptions,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const FIXTURE: &str = include_str!("fixtures/ossec.conf");

fn write_fixture(dir: &TempDir) -> Result<PathBuf> {
    let path = dir.path().join("ossec.conf");
    fs::write(&path, FIXTURE)?;
    Ok(path)
}

fn open_fixture() -> Result<(TempDir, PathBuf, ConfigManager)> {
    let dir = TempDir::new()?;
    let path = write_fixture(&dir)?;
    let manager = ConfigManager::open(&path)?;
    Ok((dir, path, manager))
}

fn integration_names(manager: &ConfigManager) -> Vec<String> {
    manager
        .read_integrations()
        .filter_map(|integration| integration.name().map(str::to_string))
        .collect()
}

fn slack_fields() -> [(&'static str, &'static str); 3] {
    [
        ("name", "slack"),
        ("hook_url", "https://x"),
        ("level", "12"),
    ]
}

#[test]
fn unchanged_save_round_trips_the_tree() -> Result<()> {
    let (_dir, path, manager) = open_fixture()?;

    let report = manager.save(false)?;
    assert_eq!(report.path, path);
    assert_eq!(report.backup, None);

    let reloaded = ConfigManager::open(&path)?;
    assert_eq!(reloaded.document(), manager.document());
    assert_eq!(reloaded.render()?, manager.render()?);
    Ok(())
}

#[test]
fn root_blocks_are_consolidated_on_load() -> Result<()> {
    let (_dir, path, manager) = open_fixture()?;
    assert_eq!(manager.document().root_elements().count(), 1);
    assert!(manager.section_exists("ossec_config/ruleset"));
    assert!(manager.section_exists("ossec_config/global"));

    let options = ManagerOptions {
        consolidate_root_blocks: false,
        ..ManagerOptions::default()
    };
    let untouched = ConfigManager::open_with_options(&path, options)?;
    assert_eq!(untouched.document().root_elements().count(), 2);
    Ok(())
}

#[test]
fn inserted_integration_is_read_back_once() -> Result<()> {
    let (_dir, _path, mut manager) = open_fixture()?;
    manager.insert_integration(slack_fields())?;

    let matches: Vec<_> = manager
        .read_integrations()
        .filter(|integration| integration.name() == Some("slack"))
        .collect();
    assert_eq!(matches.len(), 1);

    let slack = matches.first().map(|integration| integration.fields().clone());
    let entries: Vec<(String, String)> = slack
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(
        entries,
        vec![
            ("name".to_string(), "slack".to_string()),
            ("hook_url".to_string(), "https://x".to_string()),
            ("level".to_string(), "12".to_string()),
        ]
    );
    assert_eq!(integration_names(&manager), vec!["virustotal", "slack"]);
    Ok(())
}

#[test]
fn deleted_integration_is_gone() -> Result<()> {
    let (_dir, _path, mut manager) = open_fixture()?;
    manager.insert_integration(slack_fields())?;

    let removed = manager.delete_integration(&IntegrationSelector::by_name("slack"))?;
    assert_eq!(removed.hook_url(), Some("https://x"));
    assert_eq!(integration_names(&manager), vec!["virustotal"]);
    Ok(())
}

#[test]
fn delete_removes_only_the_first_match() -> Result<()> {
    let (_dir, _path, mut manager) = open_fixture()?;
    manager.insert_integration([("name", "slack"), ("hook_url", "https://a")])?;
    manager.insert_integration([("name", "slack"), ("hook_url", "https://b")])?;

    let removed = manager.delete_integration(&IntegrationSelector::by_name("slack"))?;
    assert_eq!(removed.hook_url(), Some("https://a"));

    let remaining: Vec<Option<String>> = manager
        .read_integrations()
        .filter(|integration| integration.name() == Some("slack"))
        .map(|integration| integration.hook_url().map(str::to_string))
        .collect();
    assert_eq!(remaining, vec![Some("https://b".to_string())]);
    Ok(())
}

#[test]
fn repeated_field_is_selectable_by_the_value_it_reads_as() -> Result<()> {
    const REPEATED: &str = r#"<ossec_config>
  <integration>
    <name>a</name>
    <name>b</name>
  </integration>
</ossec_config>
"#;
    let dir = TempDir::new()?;
    let path = dir.path().join("ossec.conf");
    fs::write(&path, REPEATED)?;
    let mut manager = ConfigManager::open(&path)?;
    assert_eq!(integration_names(&manager), vec!["b"]);

    let removed = manager.delete_integration(&IntegrationSelector::by_name("b"))?;
    assert_eq!(removed.name(), Some("b"));
    assert!(integration_names(&manager).is_empty());
    Ok(())
}

#[test]
fn delete_with_unknown_selector_changes_nothing() -> Result<()> {
    let (_dir, _path, mut manager) = open_fixture()?;
    let before = manager.render()?;

    let missing = manager.delete_integration(&IntegrationSelector::by_name("pagerduty"));
    assert!(matches!(missing, Err(ConfigError::NotFound { .. })));

    let empty = manager.delete_integration(&IntegrationSelector::new());
    assert!(empty.is_err_and(|err| err.is_validation()));

    assert_eq!(manager.render()?, before);
    Ok(())
}

#[test]
fn insert_rejects_invalid_field_names_without_mutating() -> Result<()> {
    let (_dir, _path, mut manager) = open_fixture()?;
    let before = manager.render()?;

    let result = manager.insert_integration([("name", "slack"), ("hook url", "https://x")]);
    assert!(result.is_err_and(|err| err.is_validation()));
    assert_eq!(manager.render()?, before);
    Ok(())
}

#[test]
fn insert_requires_a_root_block() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("agent.conf");
    fs::write(&path, "<agent_config><client/></agent_config>")?;

    let mut manager = ConfigManager::open(&path)?;
    let result = manager.insert_integration(slack_fields());
    assert!(result.is_err_and(|err| err.is_not_found()));
    Ok(())
}

#[test]
fn update_integration_sets_and_adds_fields() -> Result<()> {
    let (_dir, _path, mut manager) = open_fixture()?;
    let selector = IntegrationSelector::by_name("virustotal");
    manager.update_integration(&selector, [("group", "syscheck,pci_dss"), ("level", "7")])?;

    let virustotal = manager
        .read_integrations()
        .find(|integration| integration.name() == Some("virustotal"));
    assert_eq!(
        virustotal.as_ref().and_then(|integration| integration.group()),
        Some("syscheck,pci_dss")
    );
    assert_eq!(virustotal.as_ref().and_then(|integration| integration.level()), Some("7"));
    assert!(manager.integration_exists(&selector.with_field("level", "7")));

    let missing = manager.update_integration(&IntegrationSelector::by_name("x"), [("a", "b")]);
    assert!(missing.is_err_and(|err| err.is_not_found()));
    Ok(())
}

#[test]
fn block_update_is_idempotent() -> Result<()> {
    let (_dir, _path, mut manager) = open_fixture()?;
    let path = "ossec_config/vulnerability-detection";

    manager.update_xml_block(path, [("enabled", "yes")])?;
    let once = manager.render()?;
    manager.update_xml_block(path, [("enabled", "yes")])?;
    assert_eq!(manager.render()?, once);

    let block = manager.block(path)?;
    assert_eq!(block.child_text("enabled").as_deref(), Some("yes"));
    assert_eq!(block.child_text("feed-update-interval").as_deref(), Some("60m"));
    Ok(())
}

#[test]
fn block_update_on_missing_path_changes_nothing() -> Result<()> {
    let (_dir, _path, mut manager) = open_fixture()?;
    let before = manager.render()?;

    let result = manager.update_xml_block("ossec_config/cluster", [("disabled", "no")]);
    assert!(result.is_err_and(|err| err.is_not_found()));
    assert_eq!(manager.render()?, before);
    Ok(())
}

#[test]
fn block_update_handles_nested_lists_and_attributes() -> Result<()> {
    let (_dir, _path, mut manager) = open_fixture()?;
    let updates = BlockUpdates::new()
        .set("port", "1515")
        .attribute("profile", "hardened")
        .block("limits", BlockUpdates::new().set("eps", "500"))
        .list("allowed-ips", [ListItem::new("ip", "10.0.0.0/8")]);
    manager.update_xml_block("ossec_config/remote", updates)?;

    let remote = manager.block("ossec_config/remote")?;
    assert_eq!(remote.attribute("profile"), Some("hardened"));
    assert_eq!(remote.child_text("port").as_deref(), Some("1515"));
    assert_eq!(remote.child_text("connection").as_deref(), Some("secure"));
    assert_eq!(
        manager
            .block("ossec_config/remote/limits/eps")?
            .text()
            .as_deref(),
        Some("500")
    );
    assert_eq!(
        manager
            .block("ossec_config/remote/allowed-ips/ip")?
            .text()
            .as_deref(),
        Some("10.0.0.0/8")
    );
    Ok(())
}

#[test]
fn sections_can_be_added_and_removed() -> Result<()> {
    let (_dir, _path, mut manager) = open_fixture()?;

    manager.add_section(
        "ossec_config/syscheck",
        BlockUpdates::new()
            .set("frequency", "43200")
            .list("directories", [ListItem::new("dir", "/etc")]),
    )?;
    assert!(manager.section_exists("ossec_config/syscheck/frequency"));

    manager.add_section(
        "ossec_config",
        BlockUpdates::new().block(
            "localfile",
            BlockUpdates::new()
                .set("log_format", "json")
                .set("location", "/var/log/app.json"),
        ),
    )?;
    assert_eq!(manager.document().elements_named("localfile").count(), 2);

    assert_eq!(manager.remove_section("ossec_config/localfile")?, 2);
    assert!(!manager.section_exists("ossec_config/localfile"));

    let again = manager.remove_section("ossec_config/localfile");
    assert!(again.is_err_and(|err| err.is_not_found()));
    Ok(())
}

#[test]
fn ruleset_lists_are_not_duplicated() -> Result<()> {
    let (_dir, _path, mut manager) = open_fixture()?;
    let ruleset = "ossec_config/ruleset";

    assert!(manager.add_ruleset_list(ruleset, "etc/lists/malicious-ioc/malware-hashes")?);
    assert!(!manager.add_ruleset_list(ruleset, "etc/lists/malicious-ioc/malware-hashes")?);
    assert!(!manager.add_ruleset_list(ruleset, "etc/lists/audit-keys")?);

    let lists = manager
        .block(ruleset)?
        .child_elements()
        .filter(|child| child.name() == "list")
        .count();
    assert_eq!(lists, 3);

    let missing = manager.add_ruleset_list("ossec_config/rules", "etc/lists/x");
    assert!(missing.is_err_and(|err| err.is_not_found()));
    Ok(())
}

#[test]
fn backup_then_restore_reproduces_original_bytes() -> Result<()> {
    let (_dir, path, mut manager) = open_fixture()?;
    manager.insert_integration(slack_fields())?;

    let report = manager.save(true)?;
    let backup = report.backup.clone().ok_or_else(|| anyhow::anyhow!("no backup"))?;
    assert_eq!(fs::read_to_string(&backup)?, FIXTURE);
    assert_ne!(fs::read_to_string(&path)?, FIXTURE);

    fs::write(&path, "<ossec_config><broken>")?;
    manager.restore(&backup)?;

    assert_eq!(fs::read_to_string(&path)?, FIXTURE);
    assert_eq!(integration_names(&manager), vec!["virustotal"]);
    Ok(())
}

#[test]
fn default_backup_name_carries_a_timestamp() -> Result<()> {
    let (dir, _path, manager) = open_fixture()?;
    let backup = manager.create_backup(None)?;

    assert_eq!(backup.parent(), Some(dir.path()));
    let name = backup
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    assert!(name.starts_with("ossec.conf."), "{name}");
    assert!(name.ends_with(".bak"), "{name}");

    let second = manager.create_backup(None)?;
    assert_ne!(second, backup);
    Ok(())
}

#[test]
fn failed_backup_aborts_the_save() -> Result<()> {
    let (_dir, path, mut manager) = open_fixture()?;
    manager.insert_integration(slack_fields())?;

    let blocked = path.join("nested").join("ossec.conf.bak");
    let result = manager.save_with(&SaveOptions {
        backup_path: Some(blocked),
        ..SaveOptions::with_backup()
    });
    assert!(matches!(result, Err(ConfigError::Io { .. })));
    assert_eq!(fs::read_to_string(&path)?, FIXTURE);
    Ok(())
}

#[test]
fn malformed_backup_leaves_live_file_alone() -> Result<()> {
    let (dir, path, mut manager) = open_fixture()?;
    let bad_backup = dir.path().join("bad.bak");
    fs::write(&bad_backup, "<ossec_config>")?;

    let result = manager.restore(&bad_backup);
    assert!(result.is_err_and(|err| err.is_parse()));
    assert_eq!(fs::read_to_string(&path)?, FIXTURE);
    assert_eq!(integration_names(&manager), vec!["virustotal"]);
    Ok(())
}

#[test]
fn save_with_target_leaves_source_untouched() -> Result<()> {
    let (dir, path, mut manager) = open_fixture()?;
    manager.update_xml_block("ossec_config/global", [("logall", "yes")])?;

    let target = dir.path().join("copy").join("ossec.conf");
    let report = manager.save_with(&SaveOptions {
        target: Some(target.clone()),
        ..SaveOptions::default()
    })?;

    assert_eq!(report.path, target);
    assert_eq!(fs::read_to_string(&path)?, FIXTURE);
    let copy = ConfigManager::open(&target)?;
    assert_eq!(
        copy.block("ossec_config/global/logall")?.text().as_deref(),
        Some("yes")
    );
    Ok(())
}

#[test]
fn reload_discards_unsaved_edits() -> Result<()> {
    let (_dir, _path, mut manager) = open_fixture()?;
    manager.insert_integration(slack_fields())?;
    manager.reload()?;
    assert_eq!(integration_names(&manager), vec!["virustotal"]);
    Ok(())
}

#[test]
fn options_load_from_toml() -> Result<()> {
    let dir = TempDir::new()?;
    let options_path = dir.path().join("ossec-config.toml");
    let backups = dir.path().join("backups");
    fs::write(
        &options_path,
        format!(
            "indent = 4\nbackup_dir = {:?}\n",
            backups.to_string_lossy()
        ),
    )?;

    let options = ManagerOptions::from_toml_file(&options_path)?;
    assert_eq!(options.indent, 4);

    let path = write_fixture(&dir)?;
    let manager = ConfigManager::open_with_options(&path, options)?;
    let backup = manager.create_backup(None)?;
    assert!(backup.starts_with(&backups));
    assert!(manager.render()?.contains("\n    <global>"));
    Ok(())
}

#[test]
fn missing_file_reports_parse_error() {
    let result = ConfigManager::open(Path::new("/definitely/not/here/ossec.conf"));
    assert!(result.is_err_and(|err| err.is_parse()));
}

#[test]
fn recover_replaces_an_unparseable_live_file() -> Result<()> {
    let (dir, path, manager) = open_fixture()?;
    let backup = manager.create_backup(Some(&dir.path().join("known-good.bak")))?;

    fs::write(&path, "<ossec_config><global>")?;
    assert!(ConfigManager::open(&path).is_err());

    let recovered = ConfigManager::recover(&path, &backup, ManagerOptions::default())?;
    assert_eq!(fs::read_to_string(&path)?, FIXTURE);
    assert_eq!(recovered.path(), Some(path.as_path()));
    assert_eq!(
        recovered.render_block("ossec_config/alerts/log_alert_level")?,
        "<log_alert_level>3</log_alert_level>\n"
    );
    Ok(())
}
