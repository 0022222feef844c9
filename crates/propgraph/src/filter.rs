//! Composable predicates compiled into a parameterized `WHERE` fragment.
//!
//! A [`FilterSet`] is an ordered list of `(field, operator, value)` filters
//! joined with `AND`. [`FilterSet::build`] returns the fragment and appends the
//! bound values to the caller's parameter list in placeholder order. Values are
//! never interpolated into SQL text.
//!
//! Fields are trusted SQL expressions: plain columns (`type`), qualified
//! columns in traversals (`n.type`, `e.active`), or JSON paths
//! (`json_extract(properties, '$.username')`).

use rusqlite::types::Value;

/// Comparison operator of a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    fn binds_nothing(self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

/// A single predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    field: String,
    op: Operator,
    values: Vec<Value>,
}

impl Filter {
    /// `field = value`.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Eq, value)
    }

    /// `field <op> value`. Null checks drop the value; list operators treat it
    /// as a one-element list.
    pub fn compare(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        let values = if op.binds_nothing() {
            Vec::new()
        } else {
            vec![value.into()]
        };
        Filter {
            field: field.into(),
            op,
            values,
        }
    }

    /// `field IN (v1, v2, ...)`.
    pub fn in_list<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter {
            field: field.into(),
            op: Operator::In,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `field NOT IN (v1, v2, ...)`.
    pub fn not_in_list<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter {
            op: Operator::NotIn,
            ..Self::in_list(field, values)
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::compare(field, Operator::IsNull, Value::Null)
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::compare(field, Operator::IsNotNull, Value::Null)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn op(&self) -> Operator {
        self.op
    }

    fn build(&self, params: &mut Vec<Value>) -> String {
        match self.op {
            Operator::IsNull | Operator::IsNotNull => {
                format!("{} {}", self.field, self.op.as_sql())
            }
            Operator::In | Operator::NotIn => {
                let placeholders = vec!["?"; self.values.len()].join(", ");
                params.extend(self.values.iter().cloned());
                format!("{} {} ({})", self.field, self.op.as_sql(), placeholders)
            }
            _ => {
                params.extend(self.values.iter().cloned());
                format!("{} {} ?", self.field, self.op.as_sql())
            }
        }
    }
}

/// Ordered predicates combined with `AND`. Empty means "match every row".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn with(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn push(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    /// Compiles the set into a boolean fragment (no `WHERE` keyword),
    /// appending bound values to `params`. Returns an empty string when the
    /// set is empty.
    pub fn build(&self, params: &mut Vec<Value>) -> String {
        self.filters
            .iter()
            .map(|filter| filter.build(params))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// `WHERE <fragment>`, or an empty string for an empty set.
    pub(crate) fn where_clause(&self, params: &mut Vec<Value>) -> String {
        let fragment = self.build(params);
        if fragment.is_empty() {
            fragment
        } else {
            format!("WHERE {fragment}")
        }
    }
}

impl From<Vec<Filter>> for FilterSet {
    fn from(filters: Vec<Filter>) -> Self {
        FilterSet { filters }
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        FilterSet {
            filters: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FilterSet {
    type Item = &'a Filter;
    type IntoIter = std::slice::Iter<'a, Filter>;

    fn into_iter(self) -> Self::IntoIter {
        self.filters.iter()
    }
}
