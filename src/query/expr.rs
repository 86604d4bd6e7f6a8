//! The query expression model: predicates, projections, ordering and result operators.
use crate::query::arguments::ColumnMappings;
use crate::spreadsheet::cell::Value;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use std::cmp::Ordering;

/// Comparison operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub(crate) const fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Text pattern tests.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LikeKind {
    StartsWith,
    EndsWith,
    Contains,
}

/// A scalar or boolean expression over the columns of a row.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A record field, read from its mapped column
    Field(String),
    /// A source column, by name
    Column(String),
    Literal(Value),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    IsNullOrEmpty(Box<Expr>),
    Like(Box<Expr>, LikeKind, String),
    In(Box<Expr>, Vec<Value>),
    Upper(Box<Expr>),
    Lower(Box<Expr>),
    Concat(Vec<Expr>),
}

/// A record field.
pub fn field(name: &str) -> Expr {
    Expr::Field(name.to_owned())
}

/// A source column by name; positional rows use `F1`, `F2`, ...
pub fn column(name: &str) -> Expr {
    Expr::Column(name.to_owned())
}

/// A literal value.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

#[allow(clippy::should_implement_trait)]
impl Expr {
    fn compare(self, op: CompareOp, other: impl Into<Expr>) -> Expr {
        Expr::Compare(Box::new(self), op, Box::new(other.into()))
    }

    pub fn eq(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Eq, other)
    }

    pub fn ne(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Ne, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Lt, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Le, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Gt, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Ge, other)
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull(Box::new(self))
    }

    pub fn is_not_null(self) -> Expr {
        self.is_null().not()
    }

    pub fn is_null_or_empty(self) -> Expr {
        Expr::IsNullOrEmpty(Box::new(self))
    }

    pub fn starts_with(self, pattern: &str) -> Expr {
        Expr::Like(Box::new(self), LikeKind::StartsWith, pattern.to_owned())
    }

    pub fn ends_with(self, pattern: &str) -> Expr {
        Expr::Like(Box::new(self), LikeKind::EndsWith, pattern.to_owned())
    }

    pub fn contains(self, pattern: &str) -> Expr {
        Expr::Like(Box::new(self), LikeKind::Contains, pattern.to_owned())
    }

    pub fn is_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::In(Box::new(self), values.into_iter().map(Into::into).collect())
    }

    pub fn upper(self) -> Expr {
        Expr::Upper(Box::new(self))
    }

    pub fn lower(self) -> Expr {
        Expr::Lower(Box::new(self))
    }

    pub fn concat(self, other: impl Into<Expr>) -> Expr {
        match self {
            Expr::Concat(mut parts) => {
                parts.push(other.into());
                Expr::Concat(parts)
            }
            first => Expr::Concat(vec![first, other.into()]),
        }
    }

    /// Source column a field or column reference reads from.
    pub(crate) fn column_name(&self, mappings: &ColumnMappings) -> Option<String> {
        match self {
            Expr::Field(name) => Some(mappings.resolve(name)),
            Expr::Column(name) => Some(name.clone()),
            _ => None,
        }
    }

    /// Appends every source column the expression reads, in first-use order.
    pub(crate) fn collect_columns(&self, mappings: &ColumnMappings, columns: &mut Vec<String>) {
        match self {
            Expr::Field(_) | Expr::Column(_) => {
                if let Some(name) = self.column_name(mappings) {
                    if !columns.contains(&name) {
                        columns.push(name);
                    }
                }
            }
            Expr::Literal(_) => {}
            Expr::Compare(left, _, right) | Expr::And(left, right) | Expr::Or(left, right) => {
                left.collect_columns(mappings, columns);
                right.collect_columns(mappings, columns);
            }
            Expr::Not(inner)
            | Expr::IsNull(inner)
            | Expr::IsNullOrEmpty(inner)
            | Expr::Like(inner, _, _)
            | Expr::In(inner, _)
            | Expr::Upper(inner)
            | Expr::Lower(inner) => inner.collect_columns(mappings, columns),
            Expr::Concat(parts) => parts
                .iter()
                .for_each(|part| part.collect_columns(mappings, columns)),
        }
    }

    /// Evaluates a scalar expression against one row.
    ///
    /// `lookup` returns the value of a source column. Text functions pass nulls through.
    pub(crate) fn evaluate(&self, mappings: &ColumnMappings, lookup: &dyn Fn(&str) -> Value) -> Value {
        match self {
            Expr::Field(_) | Expr::Column(_) => self
                .column_name(mappings)
                .map(|name| lookup(&name))
                .unwrap_or_default(),
            Expr::Literal(value) => value.clone(),
            Expr::Upper(inner) => match inner.evaluate(mappings, lookup) {
                Value::Null => Value::Null,
                value => Value::Text(value.to_string().to_uppercase()),
            },
            Expr::Lower(inner) => match inner.evaluate(mappings, lookup) {
                Value::Null => Value::Null,
                value => Value::Text(value.to_string().to_lowercase()),
            },
            Expr::Concat(parts) => Value::Text(
                parts
                    .iter()
                    .map(|part| part.evaluate(mappings, lookup).to_string())
                    .collect(),
            ),
            Expr::IsNull(inner) => Value::Bool(inner.evaluate(mappings, lookup).is_null()),
            Expr::IsNullOrEmpty(inner) => Value::Bool(inner.evaluate(mappings, lookup).is_empty()),
            Expr::Not(inner) => match inner.evaluate(mappings, lookup) {
                Value::Bool(flag) => Value::Bool(!flag),
                _ => Value::Null,
            },
            Expr::Compare(left, op, right) => {
                let left = left.evaluate(mappings, lookup);
                let right = right.evaluate(mappings, lookup);
                match compare_values(&left, &right) {
                    Some(ordering) => Value::Bool(match op {
                        CompareOp::Eq => ordering == Ordering::Equal,
                        CompareOp::Ne => ordering != Ordering::Equal,
                        CompareOp::Lt => ordering == Ordering::Less,
                        CompareOp::Le => ordering != Ordering::Greater,
                        CompareOp::Gt => ordering == Ordering::Greater,
                        CompareOp::Ge => ordering != Ordering::Less,
                    }),
                    None => Value::Null,
                }
            }
            // Three-valued logic, as in SQL
            Expr::And(left, right) => {
                match (left.evaluate(mappings, lookup), right.evaluate(mappings, lookup)) {
                    (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
                    (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
                    _ => Value::Null,
                }
            }
            Expr::Or(left, right) => {
                match (left.evaluate(mappings, lookup), right.evaluate(mappings, lookup)) {
                    (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
                    (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
                    _ => Value::Null,
                }
            }
            Expr::Like(inner, kind, pattern) => match inner.evaluate(mappings, lookup) {
                Value::Null => Value::Null,
                value => {
                    let text = value.to_string();
                    Value::Bool(match kind {
                        LikeKind::StartsWith => text.starts_with(pattern.as_str()),
                        LikeKind::EndsWith => text.ends_with(pattern.as_str()),
                        LikeKind::Contains => text.contains(pattern.as_str()),
                    })
                }
            },
            Expr::In(inner, values) => match inner.evaluate(mappings, lookup) {
                Value::Null => Value::Null,
                value => Value::Bool(
                    values
                        .iter()
                        .any(|candidate| compare_values(&value, candidate) == Some(Ordering::Equal)),
                ),
            },
        }
    }
}

/// Orders two values the way the backend compares them. Returns `None` when either side is
/// null or the kinds cannot be compared.
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Int(left), Value::Int(right)) => Some(left.cmp(right)),
        (Value::Text(left), Value::Text(right)) => Some(left.cmp(right)),
        (Value::Bool(left), Value::Bool(right)) => Some(left.cmp(right)),
        (Value::Date(left), Value::Date(right)) => Some(left.cmp(right)),
        (Value::DateTime(left), Value::DateTime(right)) => Some(left.cmp(right)),
        (Value::Date(left), Value::DateTime(right)) => left.and_hms_opt(0, 0, 0).map(|left| left.cmp(right)),
        (Value::DateTime(left), Value::Date(right)) => right.and_hms_opt(0, 0, 0).map(|right| left.cmp(&right)),
        (Value::Time(left), Value::Time(right)) => Some(left.cmp(right)),
        (left, right) => left.as_f64()?.partial_cmp(&right.as_f64()?),
    }
}

macro_rules! literal_expr {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for Expr {
                fn from(value: $source) -> Self {
                    Expr::Literal(value.into())
                }
            }
        )*
    };
}

literal_expr!(Value, bool, i32, i64, f64, String, &str, NaiveDate, NaiveDateTime, NaiveTime);

/// Sort key of an ordering clause.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub descending: bool,
}

/// The shape of each result.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Projection {
    /// Whole records
    #[default]
    Identity,
    /// Records with only the named fields populated
    Fields(Vec<String>),
    /// Ad hoc rows built from named expressions
    Construct(Vec<(String, Expr)>),
}

/// Operators applied to the result sequence.
#[derive(Clone, Debug, PartialEq)]
pub enum ResultOperator {
    Count,
    LongCount,
    Sum(Expr),
    Min(Expr),
    Max(Expr),
    First { or_default: bool },
    Last { or_default: bool },
    Single { or_default: bool },
    Skip(usize),
    Take(usize),
    Reverse,
    Distinct,
}

/// A complete declarative query over one source table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryModel {
    pub filters: Vec<Expr>,
    pub projection: Projection,
    pub order_by: Vec<OrderBy>,
    pub operators: Vec<ResultOperator>,
}
