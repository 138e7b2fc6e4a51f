use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Dynamically typed property value read from a context or written in a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// Parses a literal from the rule config format.
    ///
    /// `true`/`false` become booleans, anything `f64` accepts becomes a number,
    /// everything else is text with surrounding quotes removed.
    pub fn parse_literal(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("true") {
            return PropertyValue::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return PropertyValue::Bool(false);
        }
        if let Ok(number) = raw.parse::<f64>() {
            if number.is_finite() {
                return PropertyValue::Number(number);
            }
        }

        let unquoted = raw
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .or_else(|| {
                raw.strip_prefix('\'')
                    .and_then(|inner| inner.strip_suffix('\''))
            })
            .unwrap_or(raw);
        PropertyValue::Text(unquoted.to_string())
    }

    /// Converts a JSON scalar. Arrays, objects and null have no property form.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(flag) => Some(PropertyValue::Bool(*flag)),
            Value::Number(number) => number.as_f64().map(PropertyValue::Number),
            Value::String(text) => Some(PropertyValue::Text(text.clone())),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(flag) => write!(f, "{flag}"),
            PropertyValue::Number(number) => write!(f, "{number}"),
            PropertyValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Number(value as f64)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Number(f64::from(value))
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Number(f64::from(value))
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

/// Comparison applied between a context property and a condition value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
}

impl ComparisonOperator {
    /// Two-character tokens come first so `>=` is never read as `>`.
    pub const TOKENS: [(&'static str, ComparisonOperator); 6] = [
        ("==", ComparisonOperator::Eq),
        ("!=", ComparisonOperator::Ne),
        (">=", ComparisonOperator::Ge),
        ("<=", ComparisonOperator::Le),
        (">", ComparisonOperator::Gt),
        ("<", ComparisonOperator::Lt),
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        Self::TOKENS
            .iter()
            .find(|(candidate, _)| *candidate == token)
            .map(|(_, operator)| *operator)
    }

    pub fn token(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "==",
            ComparisonOperator::Ne => "!=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Ge => ">=",
            ComparisonOperator::Le => "<=",
        }
    }

    /// Compares `actual` (from the context) against `expected` (from the rule).
    ///
    /// Mismatched types and ordering on non-numbers never match.
    pub fn compare(&self, actual: &PropertyValue, expected: &PropertyValue) -> bool {
        use ComparisonOperator::*;
        match (actual, expected) {
            (PropertyValue::Number(lhs), PropertyValue::Number(rhs)) => {
                let equal = (lhs - rhs).abs() < f64::EPSILON;
                match self {
                    Eq => equal,
                    Ne => !equal,
                    Gt => lhs > rhs && !equal,
                    Lt => lhs < rhs && !equal,
                    Ge => lhs > rhs || equal,
                    Le => lhs < rhs || equal,
                }
            }
            (PropertyValue::Bool(lhs), PropertyValue::Bool(rhs)) => match self {
                Eq => lhs == rhs,
                Ne => lhs != rhs,
                _ => false,
            },
            (PropertyValue::Text(lhs), PropertyValue::Text(rhs)) => match self {
                Eq => lhs == rhs,
                Ne => lhs != rhs,
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Context contract consulted by dynamic rule definitions.
pub trait PropertySource {
    /// Returns the named derived property, or `None` when the name is unknown.
    fn property(&self, name: &str) -> Option<PropertyValue>;
}

impl<T: PropertySource + ?Sized> PropertySource for &T {
    fn property(&self, name: &str) -> Option<PropertyValue> {
        (**self).property(name)
    }
}

impl<T: PropertySource + ?Sized> PropertySource for Arc<T> {
    fn property(&self, name: &str) -> Option<PropertyValue> {
        (**self).property(name)
    }
}

type Getter<C> = Arc<dyn Fn(&C) -> PropertyValue + Send + Sync>;

/// Explicit table of named property getters registered by a context type.
///
/// ```
/// use arbiter_rules::{PropertySource, PropertyTable, PropertyValue};
///
/// struct Account { balance: f64, frozen: bool }
///
/// let table = PropertyTable::new()
///     .register_number("balance", |a: &Account| a.balance)
///     .register_bool("frozen", |a: &Account| a.frozen);
///
/// let account = Account { balance: 12.5, frozen: false };
/// assert_eq!(table.resolve(&account, "balance"), Some(PropertyValue::Number(12.5)));
/// assert_eq!(table.resolve(&account, "owner"), None);
/// ```
pub struct PropertyTable<C> {
    getters: HashMap<String, Getter<C>>,
}

impl<C> Default for PropertyTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> PropertyTable<C> {
    pub fn new() -> Self {
        Self {
            getters: HashMap::new(),
        }
    }

    pub fn register<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&C) -> PropertyValue + Send + Sync + 'static,
    {
        self.getters.insert(name.into(), Arc::new(getter));
        self
    }

    pub fn register_bool<F>(self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.register(name, move |context| PropertyValue::Bool(getter(context)))
    }

    pub fn register_number<F>(self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&C) -> f64 + Send + Sync + 'static,
    {
        self.register(name, move |context| PropertyValue::Number(getter(context)))
    }

    pub fn register_text<F>(self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&C) -> String + Send + Sync + 'static,
    {
        self.register(name, move |context| PropertyValue::Text(getter(context)))
    }

    pub fn resolve(&self, context: &C, name: &str) -> Option<PropertyValue> {
        self.getters.get(name).map(|getter| getter(context))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.getters.contains_key(name)
    }

    /// Registered property names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.getters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Map-backed context used by tooling, analysis scenarios and the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag {
    properties: BTreeMap<String, PropertyValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Builds a bag from a flat JSON object, skipping non-scalar members.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let properties = object
            .iter()
            .filter_map(|(name, value)| {
                PropertyValue::from_json(value).map(|value| (name.clone(), value))
            })
            .collect();
        Some(Self { properties })
    }
}

impl PropertySource for PropertyBag {
    fn property(&self, name: &str) -> Option<PropertyValue> {
        self.properties.get(name).cloned()
    }
}

impl<K, V> FromIterator<(K, V)> for PropertyBag
where
    K: Into<String>,
    V: Into<PropertyValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = PropertyBag::new();
        for (name, value) in iter {
            bag.insert(name, value);
        }
        bag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("true" => PropertyValue::Bool(true) ; "bool true")]
    #[test_case("FALSE" => PropertyValue::Bool(false) ; "bool false any case")]
    #[test_case("42" => PropertyValue::Number(42.0) ; "integer")]
    #[test_case("-0.5" => PropertyValue::Number(-0.5) ; "negative float")]
    #[test_case("\"late game\"" => PropertyValue::Text("late game".into()) ; "double quoted")]
    #[test_case("'mid'" => PropertyValue::Text("mid".into()) ; "single quoted")]
    #[test_case("early" => PropertyValue::Text("early".into()) ; "bare text")]
    #[test_case("inf" => PropertyValue::Text("inf".into()) ; "non finite stays text")]
    fn parses_literals(raw: &str) -> PropertyValue {
        PropertyValue::parse_literal(raw)
    }

    #[test_case(ComparisonOperator::Gt, 200.0 => true ; "gt above")]
    #[test_case(ComparisonOperator::Gt, 100.0 => false ; "gt boundary exclusive")]
    #[test_case(ComparisonOperator::Ge, 100.0 => true ; "ge boundary inclusive")]
    #[test_case(ComparisonOperator::Lt, 50.0 => true ; "lt below")]
    #[test_case(ComparisonOperator::Le, 100.0 => true ; "le boundary inclusive")]
    #[test_case(ComparisonOperator::Eq, 100.0 => true ; "eq equal")]
    #[test_case(ComparisonOperator::Ne, 100.0 => false ; "ne equal")]
    fn compares_numbers(operator: ComparisonOperator, actual: f64) -> bool {
        operator.compare(&PropertyValue::Number(actual), &PropertyValue::Number(100.0))
    }

    #[test]
    fn mismatched_types_never_match() {
        let truthy = PropertyValue::Bool(true);
        let one = PropertyValue::Number(1.0);
        assert!(!ComparisonOperator::Eq.compare(&truthy, &one));
        assert!(!ComparisonOperator::Ne.compare(&truthy, &one));
        assert!(!ComparisonOperator::Gt.compare(
            &PropertyValue::Text("b".into()),
            &PropertyValue::Text("a".into())
        ));
    }

    #[test]
    fn tokens_round_trip() {
        for (token, operator) in ComparisonOperator::TOKENS {
            assert_eq!(ComparisonOperator::from_token(token), Some(operator));
            assert_eq!(operator.token(), token);
        }
        assert_eq!(ComparisonOperator::from_token("=~"), None);
    }

    #[test]
    fn bag_from_json_keeps_scalars() {
        let bag = PropertyBag::from_json(&json!({
            "phase": "late",
            "wealth": 1200,
            "at_war": true,
            "nested": {"ignored": 1},
            "missing": null
        }))
        .expect("object");

        assert_eq!(bag.len(), 3);
        assert_eq!(bag.property("wealth"), Some(PropertyValue::Number(1200.0)));
        assert_eq!(bag.property("nested"), None);
        assert!(PropertyBag::from_json(&json!([1, 2])).is_none());
    }

    #[test]
    fn table_lists_registered_names() {
        let table = PropertyTable::<(f64, bool)>::new()
            .register_number("amount", |ctx| ctx.0)
            .register_bool("flagged", |ctx| ctx.1)
            .register_text("label", |_| "fixed".to_string());

        assert_eq!(table.names(), vec!["amount", "flagged", "label"]);
        assert!(table.contains("flagged"));
        assert_eq!(
            table.resolve(&(3.0, true), "label"),
            Some(PropertyValue::Text("fixed".into()))
        );
    }
}
