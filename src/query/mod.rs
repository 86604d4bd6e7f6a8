//! # Query Module
//!
//! Declarative queries over one source table. A [`Query`] collects filters, a projection, an
//! ordering and result operators into a [`QueryModel`](expr::QueryModel); terminal methods
//! compile the model to SQL, run it and map the rows to `T`.
//!
//! ```no_run
//! use sheetquery::field;
//! use sheetquery::QueryFactory;
//! use sheetquery::Row;
//!
//! let factory = QueryFactory::new("companies.xlsx");
//! let rows = factory
//!     .worksheet::<Row>("Sheet1")?
//!     .filter(field("EmployeeCount").gt(100))
//!     .order_by(field("Name"))
//!     .to_vec()?;
//! for row in rows {
//!     println!("{}", row["Name"]);
//! }
//! # Ok::<(), sheetquery::SheetQueryError>(())
//! ```
pub mod arguments;
pub(crate) mod executor;
pub mod expr;
pub(crate) mod postprocess;
pub mod statement;
pub mod translate;

use crate::error::SheetQueryError;
use crate::mapping::QueryItem;
use crate::mapping::Row;
use crate::query::arguments::QueryArguments;
use crate::query::executor::RowStream;
use crate::query::executor::Session;
use crate::query::expr::Expr;
use crate::query::expr::OrderBy;
use crate::query::expr::Projection;
use crate::query::expr::QueryModel;
use crate::query::expr::ResultOperator;
use crate::query::statement::Statement;
use crate::query::translate::Deferred;
use crate::query::translate::Terminal;
use crate::spreadsheet::cell::Value;
use std::marker::PhantomData;
use std::rc::Rc;
use thiserror::Error;

/// Errors raised by element operators.
#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("Sequence contains no elements")]
    NoElements,

    #[error("Sequence contains more than one element")]
    MoreThanOne,
}

/// A query over one worksheet, range or named range, yielding `T`.
///
/// Builder methods consume and return the query; terminal methods borrow it, so a query can be
/// run more than once.
pub struct Query<T> {
    session: Rc<Session>,
    arguments: QueryArguments,
    model: QueryModel,
    marker: PhantomData<T>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            arguments: self.arguments.clone(),
            model: self.model.clone(),
            marker: PhantomData,
        }
    }
}

impl<T: QueryItem> Query<T> {
    pub(crate) fn new(session: Rc<Session>, arguments: QueryArguments) -> Self {
        Self {
            session,
            arguments,
            model: QueryModel::default(),
            marker: PhantomData,
        }
    }

    pub fn arguments(&self) -> &QueryArguments {
        &self.arguments
    }

    pub fn model(&self) -> &QueryModel {
        &self.model
    }

    /// Keeps rows matching `predicate`. Several filters are combined with AND.
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.model.filters.push(predicate);
        self
    }

    /// Sorts ascending by `key`; later keys break ties of earlier ones.
    pub fn order_by(mut self, key: Expr) -> Self {
        self.model.order_by.push(OrderBy {
            expr: key,
            descending: false,
        });
        self
    }

    pub fn order_by_descending(mut self, key: Expr) -> Self {
        self.model.order_by.push(OrderBy {
            expr: key,
            descending: true,
        });
        self
    }

    /// Populates only the named fields; the statement selects only their columns.
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.model.projection = Projection::Fields(fields.iter().map(|field| field.to_string()).collect());
        self
    }

    /// Builds ad hoc rows from named expressions.
    pub fn construct<S>(self, members: impl IntoIterator<Item = (S, Expr)>) -> Query<Row>
    where
        S: Into<String>,
    {
        let mut model = self.model;
        model.projection = Projection::Construct(
            members
                .into_iter()
                .map(|(name, expr)| (name.into(), expr))
                .collect(),
        );
        Query {
            session: self.session,
            arguments: self.arguments,
            model,
            marker: PhantomData,
        }
    }

    pub fn distinct(self) -> Self {
        self.operator(ResultOperator::Distinct)
    }

    pub fn skip(self, count: usize) -> Self {
        self.operator(ResultOperator::Skip(count))
    }

    pub fn take(self, count: usize) -> Self {
        self.operator(ResultOperator::Take(count))
    }

    pub fn reverse(self) -> Self {
        self.operator(ResultOperator::Reverse)
    }

    fn operator(mut self, operator: ResultOperator) -> Self {
        self.model.operators.push(operator);
        self
    }

    /// Compiles the query and returns the statement it would run.
    pub fn statement(&self) -> Result<Statement, SheetQueryError> {
        let (_, statement, _) = executor::prepare(&self.session, &self.arguments, &self.model)?;
        Ok(statement)
    }

    /// Runs the query. Unless the query is lazy, every row is mapped before this returns.
    pub fn iter(&self) -> Result<Rows<T>, SheetQueryError> {
        let execution = executor::execute(&self.session, &self.arguments, &self.model)?;
        let deferred = execution.plan.deferred;
        let stream = execution.rows::<T>(&self.arguments)?;
        Rows::new(stream, deferred, self.arguments.lazy)
    }

    pub fn to_vec(&self) -> Result<Vec<T>, SheetQueryError> {
        self.iter()?.collect()
    }

    pub fn count(&self) -> Result<usize, SheetQueryError> {
        let count = self.long_count_with(ResultOperator::Count)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn long_count(&self) -> Result<i64, SheetQueryError> {
        self.long_count_with(ResultOperator::LongCount)
    }

    fn long_count_with(&self, operator: ResultOperator) -> Result<i64, SheetQueryError> {
        match self.scalar(operator)? {
            Value::Int(count) => Ok(count),
            Value::Float(count) => Ok(count as i64),
            _ => Ok(0),
        }
    }

    /// Sum of `expr` over the matching rows; NULL when no row matches.
    pub fn sum(&self, expr: Expr) -> Result<Value, SheetQueryError> {
        self.scalar(ResultOperator::Sum(expr))
    }

    pub fn min(&self, expr: Expr) -> Result<Value, SheetQueryError> {
        self.scalar(ResultOperator::Min(expr))
    }

    pub fn max(&self, expr: Expr) -> Result<Value, SheetQueryError> {
        self.scalar(ResultOperator::Max(expr))
    }

    fn scalar(&self, operator: ResultOperator) -> Result<Value, SheetQueryError> {
        let mut model = self.model.clone();
        model.operators.push(operator);
        Ok(executor::execute(&self.session, &self.arguments, &model)?.scalar())
    }

    pub fn first(&self) -> Result<T, SheetQueryError> {
        self.required(ResultOperator::First { or_default: false })
    }

    pub fn first_or_default(&self) -> Result<Option<T>, SheetQueryError> {
        self.element(ResultOperator::First { or_default: true })
    }

    pub fn last(&self) -> Result<T, SheetQueryError> {
        self.required(ResultOperator::Last { or_default: false })
    }

    pub fn last_or_default(&self) -> Result<Option<T>, SheetQueryError> {
        self.element(ResultOperator::Last { or_default: true })
    }

    /// The only row; fails if there is none or more than one.
    pub fn single(&self) -> Result<T, SheetQueryError> {
        self.required(ResultOperator::Single { or_default: false })
    }

    pub fn single_or_default(&self) -> Result<Option<T>, SheetQueryError> {
        self.element(ResultOperator::Single { or_default: true })
    }

    fn required(&self, operator: ResultOperator) -> Result<T, SheetQueryError> {
        Ok(self.element(operator)?.ok_or(SequenceError::NoElements)?)
    }

    fn element(&self, operator: ResultOperator) -> Result<Option<T>, SheetQueryError> {
        let mut model = self.model.clone();
        model.operators.push(operator);
        let execution = executor::execute(&self.session, &self.arguments, &model)?;
        let deferred = execution.plan.deferred;
        let terminal = execution.plan.terminal;
        let rows = Rows::new(execution.rows::<T>(&self.arguments)?, deferred, true)?;
        match terminal {
            Some(terminal) => postprocess::element(rows, terminal),
            None => postprocess::element(rows, Terminal::First { or_default: true }),
        }
    }
}

enum Source<T> {
    Streaming {
        stream: RowStream<T>,
        skip: usize,
        take: Option<usize>,
    },
    Buffered(std::vec::IntoIter<T>),
}

/// The results of a query.
///
/// Materialized results are already mapped; lazy results are mapped as they are pulled, and a
/// conversion error ends the sequence after it is yielded.
pub struct Rows<T> {
    source: Source<T>,
}

impl<T> Rows<T> {
    fn new(stream: RowStream<T>, deferred: Deferred, lazy: bool) -> Result<Self, SheetQueryError> {
        if lazy && !deferred.reverse {
            return Ok(Self {
                source: Source::Streaming {
                    stream,
                    skip: deferred.skip,
                    take: deferred.take,
                },
            });
        }
        let items = stream.collect::<Result<Vec<T>, SheetQueryError>>()?;
        Ok(Self {
            source: Source::Buffered(postprocess::apply(items, &deferred).into_iter()),
        })
    }
}

impl<T> Iterator for Rows<T> {
    type Item = Result<T, SheetQueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            Source::Buffered(items) => items.next().map(Ok),
            Source::Streaming { stream, skip, take } => {
                while *skip > 0 {
                    match stream.next()? {
                        Ok(_) => *skip -= 1,
                        Err(error) => return Some(Err(error)),
                    }
                }
                match take {
                    Some(0) => {
                        stream.close();
                        None
                    }
                    Some(remaining) => {
                        *remaining -= 1;
                        stream.next()
                    }
                    None => stream.next(),
                }
            }
        }
    }
}
