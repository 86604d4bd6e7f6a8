use crate::database::range::TableRef;
use crate::spreadsheet::cell::Value;
use std::fmt;

/// A compiled statement: SQL text, its positional parameters and the columns it references.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub(crate) text: String,
    pub(crate) parameters: Vec<Value>,
    pub(crate) columns: Vec<String>,
    pub(crate) table: TableRef,
    pub(crate) scalar: bool,
}

impl Statement {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parameter values, in placeholder order.
    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    /// Source columns referenced anywhere in the statement, in first-use order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// True if the statement computes a single aggregate value.
    pub fn is_scalar(&self) -> bool {
        self.scalar
    }
}

impl fmt::Display for Statement {
    /// Formats the statement for logging: `<sql>; p0 = 'text'; p1 = 42;`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)?;
        if !self.parameters.is_empty() {
            f.write_str(";")?;
        }
        for (index, parameter) in self.parameters.iter().enumerate() {
            match parameter {
                Value::Int(_) | Value::Float(_) => write!(f, " p{index} = {parameter};")?,
                Value::Null => write!(f, " p{index} = NULL;")?,
                other => write!(f, " p{index} = '{other}';")?,
            }
        }
        Ok(())
    }
}
