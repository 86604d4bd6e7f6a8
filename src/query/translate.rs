//! Compiles a [`QueryModel`] into SQL.
//!
//! Compilation happens in two steps. [`compile`] validates the query shape and renders every
//! clause without touching the backend, so unsupported queries fail before a connection is
//! opened. [`Plan::render`] then places the clauses around the resolved source table.
use crate::database::range::TableRef;
use crate::helpers::string::escape_like;
use crate::helpers::string::quote_identifier;
use crate::query::arguments::ColumnMappings;
use crate::query::expr::CompareOp;
use crate::query::expr::Expr;
use crate::query::expr::LikeKind;
use crate::query::expr::OrderBy;
use crate::query::expr::Projection;
use crate::query::expr::QueryModel;
use crate::query::expr::ResultOperator;
use crate::query::statement::Statement;
use crate::spreadsheet::cell::Value;
use thiserror::Error;

/// Errors raised while compiling a query.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Unsupported query: {0}")]
    Unsupported(String),
}

fn unsupported<T>(message: &str) -> Result<T, TranslateError> {
    Err(TranslateError::Unsupported(message.to_owned()))
}

/// Aggregates computed by the backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Aggregate {
    Count,
    LongCount,
    Sum,
    Min,
    Max,
}

/// Element operators resolved after every other operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Terminal {
    First { or_default: bool },
    Last { or_default: bool },
    Single { or_default: bool },
}

/// Sequence operators that run on the client, applied as reverse, then skip, then take.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Deferred {
    pub(crate) reverse: bool,
    pub(crate) skip: usize,
    pub(crate) take: Option<usize>,
}

impl Deferred {
    pub(crate) fn is_empty(&self) -> bool {
        !self.reverse && self.skip == 0 && self.take.is_none()
    }
}

/// SQL text with the parameters its placeholders bind, in order.
#[derive(Clone, Debug, Default)]
struct Fragment {
    sql: String,
    parameters: Vec<Value>,
}

/// Renders expressions into a fragment.
struct SqlWriter<'a> {
    mappings: &'a ColumnMappings,
    fragment: Fragment,
}

impl<'a> SqlWriter<'a> {
    fn new(mappings: &'a ColumnMappings) -> Self {
        Self {
            mappings,
            fragment: Fragment::default(),
        }
    }

    fn push(&mut self, sql: &str) {
        self.fragment.sql.push_str(sql);
    }

    fn parameter(&mut self, value: Value) {
        self.fragment.sql.push('?');
        self.fragment.parameters.push(value);
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Field(_) | Expr::Column(_) => {
                let name = expr.column_name(self.mappings).unwrap_or_default();
                self.push(&quote_identifier(&name));
            }
            Expr::Literal(Value::Null) => self.push("NULL"),
            Expr::Literal(value) => self.parameter(value.clone()),
            Expr::Compare(left, op, right) => match (left.as_ref(), op, right.as_ref()) {
                (operand, CompareOp::Eq, Expr::Literal(Value::Null))
                | (Expr::Literal(Value::Null), CompareOp::Eq, operand) => {
                    self.push("(");
                    self.expr(operand);
                    self.push(" IS NULL)");
                }
                (operand, CompareOp::Ne, Expr::Literal(Value::Null))
                | (Expr::Literal(Value::Null), CompareOp::Ne, operand) => {
                    self.push("(");
                    self.expr(operand);
                    self.push(" IS NOT NULL)");
                }
                (left, op, right) => {
                    self.push("(");
                    self.expr(left);
                    self.push(&format!(" {} ", op.as_str()));
                    self.expr(right);
                    self.push(")");
                }
            },
            Expr::And(left, right) => self.binary(left, "AND", right),
            Expr::Or(left, right) => self.binary(left, "OR", right),
            Expr::Not(inner) => {
                self.push("(NOT ");
                self.expr(inner);
                self.push(")");
            }
            Expr::IsNull(inner) => {
                self.push("(");
                self.expr(inner);
                self.push(" IS NULL)");
            }
            Expr::IsNullOrEmpty(inner) => {
                self.push("(");
                self.expr(inner);
                self.push(" IS NULL OR ");
                self.expr(inner);
                self.push(" = ");
                self.parameter(Value::from(""));
                self.push(")");
            }
            Expr::Like(inner, kind, pattern) => {
                let pattern = escape_like(pattern);
                let pattern = match kind {
                    LikeKind::StartsWith => format!("{pattern}%"),
                    LikeKind::EndsWith => format!("%{pattern}"),
                    LikeKind::Contains => format!("%{pattern}%"),
                };
                self.push("(");
                self.expr(inner);
                self.push(" LIKE ");
                self.parameter(Value::Text(pattern));
                self.push(" ESCAPE '\\')");
            }
            Expr::In(_, values) if values.is_empty() => self.push("FALSE"),
            Expr::In(inner, values) => {
                self.push("(");
                self.expr(inner);
                self.push(" IN (");
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        self.push(", ");
                    }
                    self.parameter(value.clone());
                }
                self.push("))");
            }
            Expr::Upper(inner) => self.function("UPPER", std::slice::from_ref(inner.as_ref())),
            Expr::Lower(inner) => self.function("LOWER", std::slice::from_ref(inner.as_ref())),
            Expr::Concat(parts) => self.function("CONCAT", parts),
        }
    }

    fn binary(&mut self, left: &Expr, op: &str, right: &Expr) {
        self.push("(");
        self.expr(left);
        self.push(&format!(" {op} "));
        self.expr(right);
        self.push(")");
    }

    fn function(&mut self, name: &str, arguments: &[Expr]) {
        self.push(name);
        self.push("(");
        for (index, argument) in arguments.iter().enumerate() {
            if index > 0 {
                self.push(", ");
            }
            self.expr(argument);
        }
        self.push(")");
    }

    fn finish(self) -> Fragment {
        self.fragment
    }
}

/// A compiled query, waiting for its source table.
#[derive(Clone, Debug)]
pub(crate) struct Plan {
    select: Fragment,
    distinct: bool,
    filter: Option<Fragment>,
    order: Option<Fragment>,
    limit: Option<usize>,
    pub(crate) columns: Vec<String>,
    pub(crate) aggregate: Option<Aggregate>,
    pub(crate) projection: Projection,
    pub(crate) deferred: Deferred,
    pub(crate) terminal: Option<Terminal>,
}

impl Plan {
    /// Places the compiled clauses around a source table.
    pub(crate) fn render(&self, table: &TableRef) -> Statement {
        let mut text = String::from("SELECT ");
        if self.distinct {
            text.push_str("DISTINCT ");
        }
        text.push_str(&self.select.sql);
        text.push_str(" FROM ");
        text.push_str(&table.qualified_name());
        let mut parameters = self.select.parameters.clone();
        if let Some(filter) = &self.filter {
            text.push_str(" WHERE ");
            text.push_str(&filter.sql);
            parameters.extend(filter.parameters.iter().cloned());
        }
        if let Some(order) = &self.order {
            text.push_str(" ORDER BY ");
            text.push_str(&order.sql);
            parameters.extend(order.parameters.iter().cloned());
        }
        if let Some(limit) = self.limit {
            text.push_str(&format!(" LIMIT {limit}"));
        }
        Statement {
            text,
            parameters,
            columns: self.columns.clone(),
            table: table.clone(),
            scalar: self.aggregate.is_some(),
        }
    }
}

/// Validates the result operators and splits them into pushed-down and deferred parts.
struct Operators {
    aggregate: Option<(Aggregate, Option<Expr>)>,
    terminal: Option<Terminal>,
    deferred: Deferred,
    limit: Option<usize>,
    distinct: bool,
}

impl Operators {
    fn compile(model: &QueryModel) -> Result<Self, TranslateError> {
        let mut operators = Operators {
            aggregate: None,
            terminal: None,
            deferred: Deferred::default(),
            limit: None,
            distinct: false,
        };
        let construct = matches!(model.projection, Projection::Construct(_));
        for operator in &model.operators {
            if operators.aggregate.is_some() || operators.terminal.is_some() {
                return unsupported("no operator may follow an aggregate or an element operator");
            }
            match operator {
                ResultOperator::Count => operators.set_aggregate(Aggregate::Count, None, construct)?,
                ResultOperator::LongCount => operators.set_aggregate(Aggregate::LongCount, None, construct)?,
                ResultOperator::Sum(expr) => operators.set_aggregate(Aggregate::Sum, Some(expr), construct)?,
                ResultOperator::Min(expr) => operators.set_aggregate(Aggregate::Min, Some(expr), construct)?,
                ResultOperator::Max(expr) => operators.set_aggregate(Aggregate::Max, Some(expr), construct)?,
                ResultOperator::First { or_default } => {
                    operators.terminal = Some(Terminal::First { or_default: *or_default });
                    if operators.deferred.is_empty() {
                        operators.push_limit(1);
                    }
                }
                ResultOperator::Single { or_default } => {
                    operators.terminal = Some(Terminal::Single { or_default: *or_default });
                    if operators.deferred.is_empty() {
                        operators.push_limit(2);
                    }
                }
                ResultOperator::Last { or_default } => {
                    operators.terminal = Some(Terminal::Last { or_default: *or_default });
                }
                ResultOperator::Skip(count) => {
                    if operators.deferred.take.is_some() {
                        return unsupported("skip cannot follow a take that runs after skip or reverse");
                    }
                    operators.deferred.skip += count;
                }
                ResultOperator::Take(count) => {
                    if operators.deferred.is_empty() {
                        operators.push_limit(*count);
                    } else {
                        let take = operators.deferred.take.map_or(*count, |take| take.min(*count));
                        operators.deferred.take = Some(take);
                    }
                }
                ResultOperator::Reverse => {
                    if operators.deferred.skip > 0 || operators.deferred.take.is_some() {
                        return unsupported("reverse must come before skip and take");
                    }
                    operators.deferred.reverse = !operators.deferred.reverse;
                }
                ResultOperator::Distinct => {
                    if !operators.deferred.is_empty() || operators.limit.is_some() {
                        return unsupported("distinct must come before skip, take and reverse");
                    }
                    if construct {
                        return unsupported("distinct cannot be combined with a constructed projection");
                    }
                    operators.distinct = true;
                }
            }
        }
        Ok(operators)
    }

    fn set_aggregate(&mut self, aggregate: Aggregate, expr: Option<&Expr>, construct: bool) -> Result<(), TranslateError> {
        if !self.deferred.is_empty() || self.limit.is_some() || self.distinct {
            return unsupported("aggregates cannot follow skip, take, reverse or distinct");
        }
        if construct {
            return unsupported("aggregates cannot be combined with a constructed projection");
        }
        self.aggregate = Some((aggregate, expr.cloned()));
        Ok(())
    }

    fn push_limit(&mut self, count: usize) {
        self.limit = Some(self.limit.map_or(count, |limit| limit.min(count)));
    }
}

/// Compiles a query model. The worksheet is not needed, so no backend is contacted.
pub(crate) fn compile(model: &QueryModel, mappings: &ColumnMappings) -> Result<Plan, TranslateError> {
    let operators = Operators::compile(model)?;
    let mut columns = Vec::<String>::new();

    let mut select = SqlWriter::new(mappings);
    match (&operators.aggregate, &model.projection) {
        (Some((Aggregate::Count | Aggregate::LongCount, _)), _) => select.push("COUNT(*)"),
        (Some((aggregate, Some(expr))), _) => {
            let name = match aggregate {
                Aggregate::Sum => "SUM",
                Aggregate::Min => "MIN",
                _ => "MAX",
            };
            expr.collect_columns(mappings, &mut columns);
            select.function(name, std::slice::from_ref(expr));
        }
        (Some((_, None)), _) => return unsupported("aggregate without an argument"),
        (None, Projection::Identity) => select.push("*"),
        (None, Projection::Fields(fields)) => {
            if fields.is_empty() {
                return unsupported("a field projection needs at least one field");
            }
            let names: Vec<String> = fields.iter().map(|field| mappings.resolve(field)).collect();
            for name in &names {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
            select.push(
                &columns
                    .iter()
                    .map(|name| quote_identifier(name))
                    .collect::<Vec<String>>()
                    .join(", "),
            );
        }
        (None, Projection::Construct(members)) => {
            let mut referenced = Vec::<String>::new();
            for (_, expr) in members {
                expr.collect_columns(mappings, &mut referenced);
            }
            if referenced.is_empty() {
                select.push("*");
            } else {
                select.push(
                    &referenced
                        .iter()
                        .map(|name| quote_identifier(name))
                        .collect::<Vec<String>>()
                        .join(", "),
                );
            }
            for name in referenced {
                if !columns.contains(&name) {
                    columns.push(name);
                }
            }
        }
    }

    let filter = (!model.filters.is_empty()).then(|| {
        let mut writer = SqlWriter::new(mappings);
        for (index, predicate) in model.filters.iter().enumerate() {
            if index > 0 {
                writer.push(" AND ");
            }
            predicate.collect_columns(mappings, &mut columns);
            writer.expr(predicate);
        }
        writer.finish()
    });

    let order = (operators.aggregate.is_none() && !model.order_by.is_empty()).then(|| {
        let mut writer = SqlWriter::new(mappings);
        for (index, OrderBy { expr, descending }) in model.order_by.iter().enumerate() {
            if index > 0 {
                writer.push(", ");
            }
            expr.collect_columns(mappings, &mut columns);
            writer.expr(expr);
            writer.push(if *descending { " DESC" } else { " ASC" });
        }
        writer.finish()
    });

    Ok(Plan {
        select: select.finish(),
        distinct: operators.distinct,
        filter,
        order,
        limit: operators.limit.filter(|_| operators.aggregate.is_none()),
        columns,
        aggregate: operators.aggregate.map(|(aggregate, _)| aggregate),
        projection: model.projection.clone(),
        deferred: operators.deferred,
        terminal: operators.terminal,
    })
}
