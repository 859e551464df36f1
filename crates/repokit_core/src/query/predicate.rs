//! Declarative row predicates.
//!
//! A `Predicate` is data, not a closure: the repository renders it into a
//! parameterized `WHERE` clause (`to_sql`) so filtering happens in the
//! engine, and the same tree can be evaluated against an in-memory instance
//! (`matches`). Both paths follow SQL three-valued logic: a comparison
//! involving `NULL` is unknown, `NOT` keeps it unknown, and a row matches
//! only when the whole tree is true. Values of different storage classes
//! order as `NULL < INTEGER/REAL < TEXT < BLOB`.

use crate::model::entity::{observed_fields, Entity};
use rusqlite::types::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Gte => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    False,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    IsNull {
        field: String,
    },
}

impl Predicate {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gte, value)
    }

    pub fn in_<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull {
            field: field.into(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Self) -> Self {
        Self::Not(Box::new(predicate))
    }

    /// Conjunction that flattens nested `And`s.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, other) | (other, Self::True) => other,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (first, Self::And(mut rest)) => {
                rest.insert(0, first);
                Self::And(rest)
            }
            (first, second) => Self::And(vec![first, second]),
        }
    }

    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), other) => {
                left.push(other);
                Self::Or(left)
            }
            (first, second) => Self::Or(vec![first, second]),
        }
    }

    /// Field names referenced anywhere in the tree.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::True | Self::False => {}
            Self::And(parts) | Self::Or(parts) => {
                parts.iter().for_each(|part| part.collect_fields(out));
            }
            Self::Not(inner) => inner.collect_fields(out),
            Self::Compare { field, .. } | Self::In { field, .. } | Self::IsNull { field } => {
                out.push(field.as_str());
            }
        }
    }

    /// Evaluates against named field values. Missing fields read as `NULL`.
    pub fn matches(&self, fields: &[(&str, Value)]) -> bool {
        self.evaluate(fields) == Some(true)
    }

    /// SQL truth value of the tree; `None` is unknown.
    pub fn evaluate(&self, fields: &[(&str, Value)]) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::False => Some(false),
            Self::And(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.evaluate(fields) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                (!unknown).then_some(true)
            }
            Self::Or(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.evaluate(fields) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                (!unknown).then_some(false)
            }
            Self::Not(inner) => inner.evaluate(fields).map(|value| !value),
            Self::Compare { field, op, value } => {
                compare_values(lookup(fields, field), value).map(|ordering| op.accepts(ordering))
            }
            Self::In { field, values } => {
                if values.is_empty() {
                    return Some(false);
                }
                let actual = lookup(fields, field);
                let mut unknown = false;
                for candidate in values {
                    match compare_values(actual, candidate) {
                        Some(Ordering::Equal) => return Some(true),
                        None => unknown = true,
                        Some(_) => {}
                    }
                }
                (!unknown).then_some(false)
            }
            Self::IsNull { field } => Some(matches!(lookup(fields, field), Value::Null)),
        }
    }

    /// Evaluates against an entity instance, persisted or not.
    pub fn matches_entity<E: Entity>(&self, entity: &E) -> bool {
        self.matches(&observed_fields(entity))
    }
}

static NULL: Value = Value::Null;

fn lookup<'a>(fields: &'a [(&str, Value)], name: &str) -> &'a Value {
    fields
        .iter()
        .find(|(field, _)| *field == name)
        .map_or(&NULL, |(_, value)| value)
}

/// SQL ordering of two values; `None` when either side is `NULL`.
pub(crate) fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Real(a), Value::Real(b)) => a.partial_cmp(b),
        (Value::Integer(a), Value::Real(b)) => (*a as f64).partial_cmp(b),
        (Value::Real(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Text(a), Value::Text(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        (Value::Blob(a), Value::Blob(b)) => Some(a.cmp(b)),
        (a, b) => Some(storage_class(a).cmp(&storage_class(b))),
    }
}

fn storage_class(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Integer(_) | Value::Real(_) => 1,
        Value::Text(_) => 2,
        Value::Blob(_) => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::{CompareOp, Predicate};
    use rusqlite::types::Value;

    fn row() -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::Integer(42)),
            ("customer", Value::Text("ada".into())),
            ("total", Value::Real(19.5)),
            ("note", Value::Null),
        ]
    }

    #[test]
    fn comparisons_follow_value_order() {
        let row = row();
        assert!(Predicate::eq("id", 42).matches(&row));
        assert!(Predicate::gt("total", 19).matches(&row));
        assert!(Predicate::compare("customer", CompareOp::Lt, "bob".to_string()).matches(&row));
        assert!(!Predicate::ne("id", 42).matches(&row));
    }

    #[test]
    fn null_never_compares_equal() {
        let row = row();
        assert!(!Predicate::eq("note", Value::Null).matches(&row));
        assert!(!Predicate::ne("note", "x".to_string()).matches(&row));
        assert!(Predicate::is_null("note").matches(&row));
        assert!(Predicate::is_null("missing").matches(&row));
    }

    #[test]
    fn negated_null_comparison_stays_unknown() {
        let row = row();
        let negated = Predicate::not(Predicate::eq("note", "x".to_string()));
        assert_eq!(negated.evaluate(&row), None);
        assert!(!negated.matches(&row));

        let unknown = Predicate::eq("note", "x".to_string());
        assert_eq!(unknown.clone().or(Predicate::eq("id", 42)).evaluate(&row), Some(true));
        assert_eq!(unknown.clone().or(Predicate::eq("id", 7)).evaluate(&row), None);
        assert_eq!(Predicate::eq("id", 7).and(unknown.clone()).evaluate(&row), Some(false));
        assert_eq!(Predicate::eq("id", 42).and(unknown).evaluate(&row), None);

        assert_eq!(Predicate::in_("note", [1, 2]).evaluate(&row), None);
        assert_eq!(Predicate::in_("id", [Value::Integer(1), Value::Null]).evaluate(&row), None);
        assert_eq!(Predicate::in_("note", Vec::<i64>::new()).evaluate(&row), Some(false));
    }

    #[test]
    fn mixed_storage_classes_order_numbers_before_text() {
        let row = row();
        assert!(!Predicate::eq("id", "42".to_string()).matches(&row));
        assert!(Predicate::lt("id", "42".to_string()).matches(&row));
    }

    #[test]
    fn boolean_combinators_and_in() {
        let row = row();
        let either = Predicate::eq("id", 7).or(Predicate::in_("customer", ["ada".to_string()]));
        assert!(either.matches(&row));
        assert!(!Predicate::not(either).matches(&row));
        assert!(Predicate::And(Vec::new()).matches(&row));
        assert!(!Predicate::Or(Vec::new()).matches(&row));
        assert!(!Predicate::in_("id", Vec::<i64>::new()).matches(&row));
    }

    #[test]
    fn and_flattens_and_drops_true() {
        let combined = Predicate::True
            .and(Predicate::eq("a", 1))
            .and(Predicate::eq("b", 2))
            .and(Predicate::eq("c", 3));
        assert_eq!(
            combined,
            Predicate::And(vec![
                Predicate::eq("a", 1),
                Predicate::eq("b", 2),
                Predicate::eq("c", 3)
            ])
        );
        assert_eq!(combined.fields(), vec!["a", "b", "c"]);
    }
}
