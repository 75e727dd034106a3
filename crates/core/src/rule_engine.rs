use crate::metadata::{FieldValue, FileMetadata};
use crate::rule::{Condition, ConditionOperator, ConditionValue, Rule};
use crate::template::{normalize_separators, render_destination};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use std::cmp::Ordering;
use std::path::PathBuf;

/// Rules in evaluation order: ascending `priority`, ties keep declared order.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut rules: Vec<Rule> = rules
            .into_iter()
            .map(|mut rule| {
                rule.destination_pattern = normalize_separators(&rule.destination_pattern);
                rule
            })
            .collect();
        rules.sort_by_key(|rule| rule.priority);
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn find_rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    pub fn find_all_matches(&self, metadata: &FileMetadata) -> Vec<(&Rule, PathBuf)> {
        self.rules
            .iter()
            .filter(|rule| rule_matches(rule, metadata))
            .map(|rule| (rule, destination_for(rule, metadata)))
            .collect()
    }
}

pub fn rule_matches(rule: &Rule, metadata: &FileMetadata) -> bool {
    check_conditions(metadata, &rule.conditions)
}

pub fn destination_for(rule: &Rule, metadata: &FileMetadata) -> PathBuf {
    PathBuf::from(render_destination(&rule.destination_pattern, metadata))
}

pub fn check_conditions(metadata: &FileMetadata, conditions: &[Condition]) -> bool {
    conditions
        .iter()
        .all(|condition| evaluate_condition(metadata.field(&condition.field), condition))
}

pub fn evaluate_condition(actual: Option<FieldValue>, condition: &Condition) -> bool {
    if condition.operator == ConditionOperator::Exists {
        return actual.is_some();
    }
    let Some(actual) = actual else {
        return false;
    };

    match condition.operator {
        ConditionOperator::Exists => true,
        ConditionOperator::Equals => condition
            .value
            .scalar_lowercase()
            .is_some_and(|expected| actual.to_string().to_lowercase() == expected),
        ConditionOperator::NotEquals => condition
            .value
            .scalar_lowercase()
            .map_or(true, |expected| actual.to_string().to_lowercase() != expected),
        ConditionOperator::In => condition
            .value
            .members_lowercase()
            .contains(&actual.to_string().to_lowercase()),
        ConditionOperator::NotIn => !condition
            .value
            .members_lowercase()
            .contains(&actual.to_string().to_lowercase()),
        ConditionOperator::GreaterThan => {
            compare(&actual, &condition.value, &condition.field) == Some(Ordering::Greater)
        }
        ConditionOperator::LessThan => {
            compare(&actual, &condition.value, &condition.field) == Some(Ordering::Less)
        }
    }
}

fn compare(actual: &FieldValue, expected: &ConditionValue, field: &str) -> Option<Ordering> {
    let ordering = match (actual, expected) {
        (FieldValue::Integer(a), ConditionValue::Integer(b)) => Some(a.cmp(b)),
        (FieldValue::Text(a), ConditionValue::Text(b)) => Some(a.as_str().cmp(b.as_str())),
        (FieldValue::Timestamp(a), ConditionValue::Text(b)) => parse_timestamp(b).map(|b| a.cmp(&b)),
        _ => None,
    };
    if ordering.is_none() {
        tracing::warn!(
            field,
            actual = %actual,
            expected = ?expected,
            "型の異なる値は比較できないため条件を不成立とします"
        );
    }
    ordering
}

fn parse_timestamp(value: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Local.from_local_datetime(&naive).earliest()
}
