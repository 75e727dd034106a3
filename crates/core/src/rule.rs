use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub const DEFAULT_PRIORITY: i64 = 99;

/// Declared intent of a rule. Execution always copies regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Copy,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    #[serde(rename = "==")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
    #[serde(rename = "exists")]
    Exists,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
}

impl ConditionOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionOperator::Equals => "==",
            ConditionOperator::NotEquals => "!=",
            ConditionOperator::In => "in",
            ConditionOperator::NotIn => "not in",
            ConditionOperator::Exists => "exists",
            ConditionOperator::GreaterThan => ">",
            ConditionOperator::LessThan => "<",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Integer(i64),
    Text(String),
    List(Vec<String>),
}

impl Default for ConditionValue {
    fn default() -> Self {
        ConditionValue::Text(String::new())
    }
}

impl ConditionValue {
    pub fn members_lowercase(&self) -> Vec<String> {
        match self {
            ConditionValue::Integer(v) => vec![v.to_string()],
            ConditionValue::Text(v) => vec![v.to_lowercase()],
            ConditionValue::List(values) => values.iter().map(|v| v.to_lowercase()).collect(),
        }
    }

    pub fn scalar_lowercase(&self) -> Option<String> {
        match self {
            ConditionValue::Integer(v) => Some(v.to_string()),
            ConditionValue::Text(v) => Some(v.to_lowercase()),
            ConditionValue::List(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: ConditionValue,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default)]
    pub operation: OperationKind,
    pub destination_pattern: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}

impl Rule {
    pub fn new(name: impl Into<String>, destination_pattern: impl Into<String>) -> Self {
        Self {
            id: timestamp_rule_id(),
            name: name.into(),
            priority: DEFAULT_PRIORITY,
            operation: OperationKind::Copy,
            destination_pattern: destination_pattern.into(),
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        if self.name.trim().is_empty() {
            return Err(RuleError::EmptyName(self.id.clone()));
        }
        if self.destination_pattern.trim().is_empty() {
            return Err(RuleError::EmptyDestination(self.name.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("ルール名が空です (id: {0})")]
    EmptyName(String),
    #[error("移動先パターンが空です: {0}")]
    EmptyDestination(String),
    #[error("ルールIDが重複しています: {0}")]
    DuplicateId(String),
}

pub fn timestamp_rule_id() -> String {
    format!("rule-{}", Local::now().timestamp())
}

pub fn normalize_rules(rules: &mut [Rule]) -> Result<(), RuleError> {
    let mut seen = HashSet::<String>::new();
    for rule in rules.iter() {
        if !rule.id.trim().is_empty() {
            seen.insert(rule.id.clone());
        }
    }

    let base = timestamp_rule_id();
    let mut n = 0usize;
    for rule in rules.iter_mut() {
        if !rule.id.trim().is_empty() {
            continue;
        }
        let mut candidate = base.clone();
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{base}-{n}");
        }
        seen.insert(candidate.clone());
        rule.id = candidate;
    }

    let mut ids = HashSet::<&str>::new();
    for rule in rules.iter() {
        rule.validate()?;
        if !ids.insert(rule.id.as_str()) {
            return Err(RuleError::DuplicateId(rule.id.clone()));
        }
    }
    Ok(())
}
