use crate::app::ports::Gateway;
use crate::domain::{EntityCollection, EntityType, Record};
use crate::error::Result;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Conditions of a select, evaluated by the gateway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectCriteria {
    pub filters: Vec<(String, Value)>,
    pub order_by: Vec<(String, SortOrder)>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl SelectCriteria {
    pub fn matches(&self, record: &Record) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }

    /// Filter, sort and page `records`.
    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        let mut selected: Vec<Record> = records.into_iter().filter(|r| self.matches(r)).collect();

        if !self.order_by.is_empty() {
            selected.sort_by(|a, b| {
                for (field, order) in &self.order_by {
                    let ordering = compare_values(a.get(field), b.get(field));
                    let ordering = match order {
                        SortOrder::Asc => ordering,
                        SortOrder::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let paged = selected.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => paged.take(limit).collect(),
            None => paged.collect(),
        }
    }
}

// Missing < null < bool < number < string; arrays and objects compare equal.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Query builder bound to one resolved gateway.
#[derive(Clone)]
pub struct SelectRequest {
    gateway: Arc<dyn Gateway>,
    criteria: SelectCriteria,
}

impl SelectRequest {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            criteria: SelectCriteria::default(),
        }
    }

    pub fn entity_type(&self) -> &EntityType {
        self.gateway.entity_type()
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn criteria(&self) -> &SelectCriteria {
        &self.criteria
    }

    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.criteria.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.criteria.order_by.push((field.into(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.criteria.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.criteria.offset = offset;
        self
    }

    pub async fn fetch(&self) -> Result<EntityCollection> {
        self.gateway.select(&self.criteria).await
    }
}

impl fmt::Debug for SelectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectRequest")
            .field("entity_type", self.gateway.entity_type())
            .field("criteria", &self.criteria)
            .finish()
    }
}
