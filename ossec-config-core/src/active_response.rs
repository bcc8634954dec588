//! `<command>` and `<active-response>` blocks.
//!
//! Commands declare an executable the agent may run; active responses bind a
//! command to the alerts that trigger it. Responses are validated before they
//! are written: the command must already be declared, the location must be
//! one the agent understands, and rule filters must use the agent's syntax.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::ConfigDocument;
use crate::error::{ConfigError, Result};
use crate::fields::FieldSet;
use crate::manager::ConfigManager;
use crate::xml::{Element, validate_name};

pub const COMMAND_TAG: &str = "command";
pub const ACTIVE_RESPONSE_TAG: &str = "active-response";

/// Lowest and highest alert level a response can trigger on.
pub const LEVEL_RANGE: std::ops::RangeInclusive<u8> = 1..=16;

/// Where an active response runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationType {
    /// The agent that generated the alert.
    Local,
    /// The manager.
    Server,
    /// The agent named by `agent_id`.
    DefinedAgent,
    All,
}

impl LocationType {
    pub const VALUES: [LocationType; 4] = [
        LocationType::Local,
        LocationType::Server,
        LocationType::DefinedAgent,
        LocationType::All,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            LocationType::Local => "local",
            LocationType::Server => "server",
            LocationType::DefinedAgent => "defined-agent",
            LocationType::All => "all",
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationType {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self> {
        Self::VALUES
            .into_iter()
            .find(|location| location.as_str() == value.trim())
            .ok_or_else(|| {
                ConfigError::validation(
                    "location",
                    format!("'{value}' is not one of local, server, defined-agent, all"),
                )
            })
    }
}

/// A `<command>` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommand {
    pub name: String,
    pub executable: String,
    pub timeout_allowed: bool,
}

impl NewCommand {
    pub fn new(name: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            timeout_allowed: true,
        }
    }

    pub fn timeout_allowed(mut self, allowed: bool) -> Self {
        self.timeout_allowed = allowed;
        self
    }

    fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        require_text("executable", &self.executable)
    }

    fn to_element(&self) -> Element {
        let mut element = Element::new(COMMAND_TAG);
        element.push_element(Element::with_text("name", self.name.as_str()));
        element.push_element(Element::with_text("executable", self.executable.as_str()));
        element.push_element(Element::with_text(
            "timeout_allowed",
            yes_no(self.timeout_allowed),
        ));
        element
    }
}

/// An `<active-response>` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveResponse {
    pub command: String,
    pub location: LocationType,
    pub level: Option<u8>,
    /// Seconds before the response is reverted.
    pub timeout: Option<u32>,
    pub agent_id: Option<String>,
    /// `|`-separated rule groups, each ending with `,`.
    pub rules_group: Option<String>,
    /// Comma-separated rule ids.
    pub rules_id: Option<String>,
}

impl ActiveResponse {
    pub fn new(command: impl Into<String>, location: LocationType) -> Self {
        Self {
            command: command.into(),
            location,
            level: None,
            timeout: None,
            agent_id: None,
            rules_group: None,
            rules_id: None,
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_rules_group(mut self, rules_group: impl Into<String>) -> Self {
        self.rules_group = Some(rules_group.into());
        self
    }

    pub fn with_rules_id(mut self, rules_id: impl Into<String>) -> Self {
        self.rules_id = Some(rules_id.into());
        self
    }

    /// Check field syntax. Whether the command exists is checked by the
    /// manager, which can see the document.
    pub fn validate(&self) -> Result<()> {
        require_text("command", &self.command)?;
        if self.location == LocationType::DefinedAgent
            && self.agent_id.as_deref().is_none_or(|id| id.trim().is_empty())
        {
            return Err(ConfigError::validation(
                "agent_id",
                "required when location is defined-agent",
            ));
        }
        if let Some(level) = self.level {
            validate_level(level)?;
        }
        if let Some(rules_group) = &self.rules_group {
            validate_rules_group(rules_group)?;
        }
        if let Some(rules_id) = &self.rules_id {
            validate_rules_id(rules_id)?;
        }
        Ok(())
    }

    fn to_element(&self) -> Element {
        let mut element = Element::new(ACTIVE_RESPONSE_TAG);
        element.push_element(Element::with_text("command", self.command.as_str()));
        element.push_element(Element::with_text("location", self.location.as_str()));
        if let Some(level) = self.level {
            element.push_element(Element::with_text("level", level.to_string()));
        }
        if let Some(timeout) = self.timeout {
            element.push_element(Element::with_text("timeout", timeout.to_string()));
        }
        if let Some(agent_id) = &self.agent_id {
            element.push_element(Element::with_text("agent_id", agent_id.as_str()));
        }
        if let Some(rules_group) = &self.rules_group {
            element.push_element(Element::with_text("rules_group", rules_group.as_str()));
        }
        if let Some(rules_id) = &self.rules_id {
            element.push_element(Element::with_text("rules_id", rules_id.as_str()));
        }
        element
    }
}

/// Field equalities that pick out one active response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveResponseFilter {
    pub command: Option<String>,
    pub location: Option<LocationType>,
    pub level: Option<u8>,
    pub timeout: Option<u32>,
    pub agent_id: Option<String>,
    pub rules_group: Option<String>,
    pub rules_id: Option<String>,
}

impl ActiveResponseFilter {
    pub fn by_command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::default()
        }
    }

    pub fn location(mut self, location: LocationType) -> Self {
        self.location = Some(location);
        self
    }

    pub fn level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn rules_group(mut self, rules_group: impl Into<String>) -> Self {
        self.rules_group = Some(rules_group.into());
        self
    }

    pub fn rules_id(mut self, rules_id: impl Into<String>) -> Self {
        self.rules_id = Some(rules_id.into());
        self
    }

    fn criteria(&self) -> Vec<(&'static str, String)> {
        let mut criteria = Vec::new();
        if let Some(command) = &self.command {
            criteria.push(("command", command.clone()));
        }
        if let Some(location) = self.location {
            criteria.push(("location", location.to_string()));
        }
        if let Some(level) = self.level {
            criteria.push(("level", level.to_string()));
        }
        if let Some(timeout) = self.timeout {
            criteria.push(("timeout", timeout.to_string()));
        }
        if let Some(agent_id) = &self.agent_id {
            criteria.push(("agent_id", agent_id.clone()));
        }
        if let Some(rules_group) = &self.rules_group {
            criteria.push(("rules_group", rules_group.clone()));
        }
        if let Some(rules_id) = &self.rules_id {
            criteria.push(("rules_id", rules_id.clone()));
        }
        criteria
    }
}

impl fmt::Display for ActiveResponseFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .criteria()
            .into_iter()
            .map(|(field, value)| format!("{field}={value}"))
            .collect();
        f.write_str(&rendered.join(", "))
    }
}

fn matches_criteria(element: &Element, criteria: &[(&'static str, String)]) -> bool {
    element.name() == ACTIVE_RESPONSE_TAG
        && criteria.iter().all(|(field, value)| {
            element
                .child_text(field)
                .is_some_and(|text| text == *value)
        })
}

/// Ready-made responses for common threats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponsePreset {
    /// Block hosts behind SSH brute force attempts.
    SshBlock,
    /// Restart the agent after critical alerts.
    AgentRestart,
    /// Disable accounts after repeated authentication failures.
    UserDisable,
}

impl ResponsePreset {
    pub fn command(self) -> NewCommand {
        match self {
            ResponsePreset::SshBlock => NewCommand::new("host-deny", "host-deny"),
            ResponsePreset::AgentRestart => {
                NewCommand::new("restart-ossec", "restart-ossec").timeout_allowed(false)
            }
            ResponsePreset::UserDisable => NewCommand::new("disable-account", "disable-account"),
        }
    }

    /// The preset's response with its default thresholds.
    pub fn response(self, location: LocationType) -> ActiveResponse {
        let response = ActiveResponse::new(self.command().name, location);
        match self {
            ResponsePreset::SshBlock => response
                .with_level(7)
                .with_timeout(600)
                .with_rules_id("5763,5761,5762"),
            ResponsePreset::AgentRestart => response.with_level(12).with_timeout(300),
            ResponsePreset::UserDisable => response
                .with_level(10)
                .with_timeout(3600)
                .with_rules_group("authentication_failure,"),
        }
    }
}

pub fn validate_level(level: u8) -> Result<()> {
    if !LEVEL_RANGE.contains(&level) {
        return Err(ConfigError::validation(
            "level",
            format!(
                "{level} is outside {}..={}",
                LEVEL_RANGE.start(),
                LEVEL_RANGE.end()
            ),
        ));
    }
    Ok(())
}

/// `group1,|group2,`: pipe-separated groups, each ending with a comma.
///
/// A segment made of the comma alone names no group and is rejected.
pub fn validate_rules_group(rules_group: &str) -> Result<()> {
    let valid = !rules_group.trim().is_empty()
        && rules_group.split('|').all(|group| {
            let group = group.trim();
            group.len() > 1 && group.ends_with(',')
        });
    if !valid {
        return Err(ConfigError::validation(
            "rules_group",
            format!("'{rules_group}' must be pipe-separated groups that each end with a comma"),
        ));
    }
    Ok(())
}

/// `5763,5761`: comma-separated numeric rule ids.
pub fn validate_rules_id(rules_id: &str) -> Result<()> {
    let valid = rules_id.split(',').all(|id| {
        let id = id.trim();
        !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
    });
    if !valid {
        return Err(ConfigError::validation(
            "rules_id",
            format!("'{rules_id}' must be comma-separated numeric ids"),
        ));
    }
    Ok(())
}

fn require_text(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn is_command_block(element: &Element) -> bool {
    element.name() == COMMAND_TAG && element.find_child("name").is_some()
}

fn is_named_command(element: &Element, name: &str) -> bool {
    is_command_block(element) && element.child_text("name").as_deref() == Some(name)
}

fn command_declared(document: &ConfigDocument, name: &str) -> bool {
    document
        .descendants()
        .any(|element| is_named_command(element, name))
}

/// Every `<active-response><command>` must name a declared `<command>`.
pub(crate) fn check_command_references(document: &ConfigDocument) -> Result<()> {
    for response in document.elements_named(ACTIVE_RESPONSE_TAG) {
        let Some(command) = response.child_text(COMMAND_TAG) else {
            continue;
        };
        if !command_declared(document, &command) {
            return Err(ConfigError::validation(
                "active-response",
                format!("command '{command}' is not declared"),
            ));
        }
    }
    Ok(())
}

impl ConfigManager {
    /// Field maps of every `<command>` declaration.
    pub fn commands(&self) -> impl Iterator<Item = FieldSet> + '_ {
        self.document()
            .descendants()
            .filter(|element| is_command_block(element))
            .map(FieldSet::from_element)
    }

    pub fn command_exists(&self, name: &str) -> bool {
        command_declared(self.document(), name)
    }

    /// Declare a command. Returns `false`, without touching the document,
    /// when a command with that name already exists.
    pub fn add_command(&mut self, command: NewCommand) -> Result<bool> {
        command.validate()?;
        if self.command_exists(&command.name) {
            tracing::debug!(command = %command.name, "command already declared");
            return Ok(false);
        }

        self.root_block_mut()?.push_element(command.to_element());
        tracing::debug!(command = %command.name, "command added");
        Ok(true)
    }

    /// Set or create fields of the command called `name`.
    pub fn update_command<I, K, V>(&mut self, name: &str, updates: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let updates = collect_updates("command field", updates)?;
        for (key, value) in &updates {
            match key.as_str() {
                "name" | "executable" => require_text("command", value)?,
                "timeout_allowed" if !matches!(value.as_str(), "yes" | "no") => {
                    return Err(ConfigError::validation(
                        "timeout_allowed",
                        format!("'{value}' must be yes or no"),
                    ));
                }
                _ => {}
            }
        }

        let command = self
            .document_mut()
            .find_where_mut(|element| is_named_command(element, name))
            .ok_or_else(|| ConfigError::not_found("command", name))?;
        for (key, value) in updates {
            command.with_child(&key, |child| child.set_text(value));
        }

        tracing::debug!(command = name, "command updated");
        Ok(())
    }

    /// Remove the command called `name` and return its fields.
    pub fn remove_command(&mut self, name: &str) -> Result<FieldSet> {
        let removed = self
            .document_mut()
            .remove_first_where(|element| is_named_command(element, name))
            .ok_or_else(|| ConfigError::not_found("command", name))?;

        tracing::debug!(command = name, "command removed");
        Ok(FieldSet::from_element(&removed))
    }

    /// Field maps of every `<active-response>` block.
    pub fn active_responses(&self) -> impl Iterator<Item = FieldSet> + '_ {
        self.document()
            .elements_named(ACTIVE_RESPONSE_TAG)
            .map(FieldSet::from_element)
    }

    pub fn active_response_exists(&self, command: &str) -> bool {
        let criteria = [("command", command.to_string())];
        self.document()
            .descendants()
            .any(|element| matches_criteria(element, &criteria))
    }

    pub fn add_active_response(&mut self, response: ActiveResponse) -> Result<()> {
        response.validate()?;
        self.require_command(&response.command)?;

        self.root_block_mut()?.push_element(response.to_element());
        tracing::debug!(
            command = %response.command,
            location = %response.location,
            "active response added"
        );
        Ok(())
    }

    /// Set or create fields of the first active response running `command`.
    ///
    /// All values are checked before anything changes; switching the location
    /// to `defined-agent` requires an `agent_id` in the block or the updates.
    pub fn update_active_response<I, K, V>(&mut self, command: &str, updates: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let updates = collect_updates("active-response field", updates)?;
        for (key, value) in &updates {
            self.validate_response_field(key, value)?;
        }

        let criteria = [("command", command.to_string())];
        let response = self
            .document_mut()
            .find_where_mut(|element| matches_criteria(element, &criteria))
            .ok_or_else(|| ConfigError::not_found("active response", command))?;

        let field = |key: &str| {
            updates
                .iter()
                .rev()
                .find(|(existing, _)| existing == key)
                .map(|(_, value)| value.clone())
                .or_else(|| response.child_text(key))
        };
        if field("location").as_deref() == Some(LocationType::DefinedAgent.as_str())
            && field("agent_id").is_none_or(|id| id.trim().is_empty())
        {
            return Err(ConfigError::validation(
                "agent_id",
                "required when location is defined-agent",
            ));
        }

        for (key, value) in updates {
            response.with_child(&key, |child| child.set_text(value));
        }

        tracing::debug!(command, "active response updated");
        Ok(())
    }

    /// Remove the first active response matching every field of `filter`.
    pub fn remove_active_response(&mut self, filter: &ActiveResponseFilter) -> Result<FieldSet> {
        let criteria = filter.criteria();
        if criteria.is_empty() {
            return Err(ConfigError::validation(
                "filter",
                "at least one field is required to pick an active response",
            ));
        }

        let removed = self
            .document_mut()
            .remove_first_where(|element| matches_criteria(element, &criteria))
            .ok_or_else(|| ConfigError::not_found("active response", filter.to_string()))?;

        tracing::debug!(filter = %filter, "active response removed");
        Ok(FieldSet::from_element(&removed))
    }

    /// Install `preset` at the agent that raised the alert.
    pub fn install_preset(&mut self, preset: ResponsePreset) -> Result<()> {
        self.install_preset_with(preset, preset.response(LocationType::Local))
    }

    /// Declare the preset's command when missing, then add `response`.
    ///
    /// `response` usually starts from [`ResponsePreset::response`] with
    /// thresholds adjusted; it must still run the preset's command.
    pub fn install_preset_with(
        &mut self,
        preset: ResponsePreset,
        response: ActiveResponse,
    ) -> Result<()> {
        let command = preset.command();
        if response.command != command.name {
            return Err(ConfigError::validation(
                "command",
                format!("preset responses must run '{}'", command.name),
            ));
        }
        response.validate()?;
        self.root_block_mut()?;

        self.add_command(command)?;
        self.add_active_response(response)
    }

    pub fn check_command_references(&self) -> Result<()> {
        check_command_references(self.document())
    }

    fn require_command(&self, name: &str) -> Result<()> {
        if !self.command_exists(name) {
            return Err(ConfigError::validation(
                "command",
                format!("'{name}' is not declared"),
            ));
        }
        Ok(())
    }

    fn validate_response_field(&self, key: &str, value: &str) -> Result<()> {
        match key {
            "command" => self.require_command(value),
            "location" => LocationType::from_str(value).map(|_| ()),
            "level" => {
                let level = value.trim().parse::<u8>().map_err(|err| {
                    ConfigError::validation("level", format!("'{value}': {err}"))
                })?;
                validate_level(level)
            }
            "timeout" => value.trim().parse::<u32>().map(|_| ()).map_err(|err| {
                ConfigError::validation("timeout", format!("'{value}' is not in seconds: {err}"))
            }),
            "rules_group" => validate_rules_group(value),
            "rules_id" => validate_rules_id(value),
            _ => Ok(()),
        }
    }
}

fn collect_updates<I, K, V>(field: &'static str, updates: I) -> Result<Vec<(String, String)>>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let updates: Vec<(String, String)> = updates
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect();
    for (key, _) in &updates {
        validate_name(field, key)?;
    }
    Ok(updates)
}
