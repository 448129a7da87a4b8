//! # Query Expressions
//!
//! Structured queries over one container. A `Query` renders to a
//! parameterized SQL statement for the remote store and can also be
//! evaluated directly against JSON documents.
//!
//! Rendered shape:
//! `SELECT [TOP n] * FROM m [WHERE c1 AND c2 ...] [ORDER BY m.a DESC, m.b DESC]`

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    /// Equals
    #[serde(rename = "eq")]
    Eq,

    /// Not equals
    #[serde(rename = "neq")]
    Neq,

    /// Greater than
    #[serde(rename = "gt")]
    Gt,

    /// Greater than or equal
    #[serde(rename = "gte")]
    Gte,

    /// Less than
    #[serde(rename = "lt")]
    Lt,

    /// Less than or equal
    #[serde(rename = "lte")]
    Lte,

    /// Value in list
    #[serde(rename = "in")]
    In,
}

impl FilterOperator {
    /// SQL operator token
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Neq => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
            FilterOperator::In => "IN",
        }
    }
}

/// A single comparison against a top-level field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpr {
    /// Field to filter on
    pub field: String,

    /// Comparison operator
    pub operator: FilterOperator,

    /// Value to compare against
    pub value: Value,
}

impl FilterExpr {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Eq, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Gt, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Lt, value.into())
    }

    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, FilterOperator::In, Value::Array(values))
    }

    /// Check if a document matches this filter.
    ///
    /// An absent field never matches; the store treats it as undefined.
    pub fn matches(&self, doc: &Value) -> bool {
        let field_value = match doc.get(&self.field) {
            Some(v) => v,
            None => return false,
        };

        match self.operator {
            FilterOperator::Eq => field_value == &self.value,
            FilterOperator::Neq => field_value != &self.value,
            FilterOperator::Gt => comparable(field_value, &self.value) == Some(Ordering::Greater),
            FilterOperator::Gte => matches!(
                comparable(field_value, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::Lt => comparable(field_value, &self.value) == Some(Ordering::Less),
            FilterOperator::Lte => matches!(
                comparable(field_value, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperator::In => self
                .value
                .as_array()
                .map(|values| values.contains(field_value))
                .unwrap_or(false),
        }
    }

    fn to_sql(&self, param: &str) -> String {
        let field = field_ref(&self.field);
        match self.operator {
            FilterOperator::In => format!("ARRAY_CONTAINS({}, {})", param, field),
            op => format!("{} {} {}", field, op.as_sql(), param),
        }
    }
}

/// Sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub ascending: bool,
}

/// A bound query parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlParameter {
    pub name: String,
    pub value: Value,
}

/// Parameterized SQL statement as sent to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQuerySpec {
    pub query: String,
    pub parameters: Vec<SqlParameter>,
}

/// Conjunctive filter + ordering + optional row limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    top: Option<usize>,
    filters: Vec<FilterExpr>,
    order: Vec<OrderBy>,
}

impl Query {
    /// Query matching every document
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the total number of rows
    pub fn top(mut self, n: usize) -> Self {
        self.top = Some(n);
        self
    }

    /// Appends a condition, combined with AND
    pub fn filter(mut self, expr: FilterExpr) -> Self {
        self.filters.push(expr);
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(FilterExpr::eq(field, value))
    }

    pub fn order_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.order.push(OrderBy {
            field: field.into(),
            ascending,
        });
        self
    }

    pub fn limit(&self) -> Option<usize> {
        self.top
    }

    pub fn filters(&self) -> &[FilterExpr] {
        &self.filters
    }

    pub fn ordering(&self) -> &[OrderBy] {
        &self.order
    }

    /// Renders the statement with `@p0, @p1, ...` bound in filter order
    pub fn to_sql_spec(&self) -> SqlQuerySpec {
        let mut query = String::from("SELECT ");
        if let Some(n) = self.top {
            query.push_str(&format!("TOP {} ", n));
        }
        query.push_str("* FROM m");

        let mut parameters = Vec::with_capacity(self.filters.len());
        for (i, filter) in self.filters.iter().enumerate() {
            let name = format!("@p{}", i);
            query.push_str(if i == 0 { " WHERE " } else { " AND " });
            query.push_str(&filter.to_sql(&name));
            parameters.push(SqlParameter {
                name,
                value: filter.value.clone(),
            });
        }

        for (i, order) in self.order.iter().enumerate() {
            query.push_str(if i == 0 { " ORDER BY " } else { ", " });
            query.push_str(&field_ref(&order.field));
            query.push_str(if order.ascending { " ASC" } else { " DESC" });
        }

        SqlQuerySpec { query, parameters }
    }

    /// Check if a document satisfies every filter
    pub fn matches(&self, doc: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Orders documents by the sort keys, earlier keys first
    pub fn sort(&self, docs: &mut [Value]) {
        if self.order.is_empty() {
            return;
        }
        docs.sort_by(|a, b| {
            for order in &self.order {
                let cmp = compare_json_values(a.get(&order.field), b.get(&order.field));
                let cmp = if order.ascending { cmp } else { cmp.reverse() };
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            Ordering::Equal
        });
    }
}

/// `m.field` for plain identifiers, `m["field"]` otherwise
fn field_ref(field: &str) -> String {
    let plain = field
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        format!("m.{}", field)
    } else {
        format!("m[{}]", Value::String(field.to_string()))
    }
}

/// Orders values of the same type; mixed types are not comparable
fn comparable(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Total order used for ORDER BY: undefined < null < bool < number < string
fn compare_json_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_)) => 5,
            Some(Value::Object(_)) => 6,
        }
    }

    match (a, b) {
        (Some(x), Some(y)) => comparable(x, y).unwrap_or_else(|| rank(a).cmp(&rank(b))),
        _ => rank(a).cmp(&rank(b)),
    }
}
