//! Typed records.
//!
//! A record declares its fields once as a table of [`FieldDef`]s. Per query the table is resolved
//! against the result schema into bindings (column index, transformation, setter), which are then
//! applied to every row.
use crate::error::SheetQueryError;
use crate::mapping::convert::ConversionError;
use crate::mapping::convert::FromValue;
use crate::mapping::FieldError;
use crate::mapping::Mapper;
use crate::mapping::MappingContext;
use crate::mapping::StrictMappingError;
use crate::query::arguments::Transformation;
use crate::query::arguments::TrimSpaces;
use crate::query::expr::Projection;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::Value;
use std::collections::HashMap;
use std::rc::Rc;

type Setter<T> = Rc<dyn Fn(&mut T, Value, TrimSpaces) -> Result<(), ConversionError>>;

/// One declared field of a record: its name, an optional column override and how to assign it.
pub struct FieldDef<T> {
    name: &'static str,
    column: Option<&'static str>,
    setter: Setter<T>,
}

impl<T: 'static> FieldDef<T> {
    /// Declares a field. The raw value is converted to `V` and handed to `assign`.
    ///
    /// # Arguments
    ///
    /// * `name` - Field name, also the default source column
    /// * `assign` - Stores the converted value in the record
    pub fn new<V, F>(name: &'static str, assign: F) -> Self
    where
        V: FromValue + 'static,
        F: Fn(&mut T, V) + 'static,
    {
        Self {
            name,
            column: None,
            setter: Rc::new(move |record: &mut T, value: Value, trim: TrimSpaces| {
                assign(record, V::from_value(value)?.trim(trim));
                Ok(())
            }),
        }
    }

    /// Reads the field from `column` instead of the column named like the field.
    pub fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn column_override(&self) -> Option<&'static str> {
        self.column
    }
}

impl<T> Clone for FieldDef<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            column: self.column,
            setter: self.setter.clone(),
        }
    }
}

/// A caller-declared result type.
///
/// Implement it directly, or with the [`record!`](crate::record) macro.
///
/// ```
/// use sheetquery::mapping::FieldDef;
/// use sheetquery::mapping::Record;
///
/// #[derive(Default)]
/// struct Company {
///     name: String,
///     employees: i64,
/// }
///
/// impl Record for Company {
///     const TYPE_NAME: &'static str = "Company";
///
///     fn fields() -> Vec<FieldDef<Self>> {
///         vec![
///             FieldDef::new("Name", |company: &mut Company, value| company.name = value),
///             FieldDef::new("Employees", |company: &mut Company, value| company.employees = value)
///                 .column("EmployeeCount"),
///         ]
///     }
/// }
/// ```
pub trait Record: Default + 'static {
    /// Name used to key transformations, `"<TypeName>.<FieldName>"`.
    const TYPE_NAME: &'static str;

    fn fields() -> Vec<FieldDef<Self>>;

    /// Conversion errors are collected here instead of failing the query, if provided.
    fn field_errors(&mut self) -> Option<&mut Vec<FieldError>> {
        None
    }

    /// Source columns no field is bound to are collected here, if provided.
    fn unmapped_cells(&mut self) -> Option<&mut HashMap<String, Cell>> {
        None
    }
}

/// Implements [`Record`] for a struct with `Default`.
///
/// Each entry names a struct field, optionally followed by the source column it reads from.
/// `errors` and `unmapped` name the collector fields, if the struct has them.
///
/// ```
/// use sheetquery::mapping::FieldError;
/// use sheetquery::record;
///
/// #[derive(Default)]
/// struct Company {
///     name: String,
///     ceo: String,
///     employee_count: Option<i64>,
///     errors: Vec<FieldError>,
/// }
///
/// record!(Company {
///     name: "Name",
///     ceo: "CEO",
///     employee_count: "EmployeeCount",
/// } errors: errors);
/// ```
#[macro_export]
macro_rules! record {
    (
        $type:ident { $($field:ident $(: $column:literal)?),* $(,)? }
        $(errors: $errors:ident)?
        $(unmapped: $unmapped:ident)?
    ) => {
        impl $crate::mapping::Record for $type {
            const TYPE_NAME: &'static str = stringify!($type);

            fn fields() -> Vec<$crate::mapping::FieldDef<Self>> {
                vec![$(
                    $crate::mapping::FieldDef::new(stringify!($field), |record: &mut Self, value| record.$field = value)
                        $(.column($column))?
                ),*]
            }

            $(
                fn field_errors(&mut self) -> Option<&mut Vec<$crate::mapping::FieldError>> {
                    Some(&mut self.$errors)
                }
            )?

            $(
                fn unmapped_cells(&mut self) -> Option<&mut std::collections::HashMap<String, $crate::Cell>> {
                    Some(&mut self.$unmapped)
                }
            )?
        }
    };
}

/// A field resolved against the result schema.
struct Binding<T> {
    column: String,
    index: usize,
    transformation: Option<Transformation>,
    setter: Setter<T>,
}

/// Fails the query if declared fields and source columns do not line up.
///
/// A field passes when a column has its name or a mapping exists for it. A column passes when a
/// field has its name or some mapping targets it. With a field projection only the projected
/// fields are checked.
fn check_strict<R: Record>(context: &MappingContext, fields: &[FieldDef<R>]) -> Result<(), StrictMappingError> {
    let strict = context.arguments.strict_mapping();
    let mappings = context.arguments.column_mappings();
    if strict.checks_fields() {
        for field in fields {
            if let Projection::Fields(projected) = context.projection {
                if !projected.iter().any(|name| name == field.name) {
                    continue;
                }
            }
            if !context.schema.iter().any(|column| column == field.name) && !mappings.contains_field(field.name) {
                Err(StrictMappingError::FieldNotMapped(field.name.to_owned()))?
            }
        }
    }
    if strict.checks_columns() {
        for column in context.schema {
            if !fields.iter().any(|field| field.name == column) && !mappings.contains_column(column) {
                Err(StrictMappingError::ColumnNotMapped(column.clone()))?
            }
        }
    }
    Ok(())
}

pub(crate) fn mapper<R: Record>(context: &MappingContext) -> Result<Mapper<R>, SheetQueryError> {
    let fields = R::fields();
    check_strict(context, &fields)?;

    let arguments = context.arguments;
    let mappings = arguments.column_mappings();
    let selected = |field: &FieldDef<R>| match context.projection {
        Projection::Fields(projected) => projected.iter().any(|name| name == field.name),
        _ => true,
    };
    let bindings: Vec<Binding<R>> = fields
        .iter()
        .filter(|field| selected(*field))
        .filter_map(|field| {
            let column = mappings.resolve(field.name);
            let index = context.columns.iter().position(|name| *name == column)?;
            Some(Binding {
                column,
                index,
                transformation: arguments.transformations().get(R::TYPE_NAME, field.name),
                setter: field.setter.clone(),
            })
        })
        .collect();
    let unmapped: Vec<(usize, String)> = context
        .columns
        .iter()
        .enumerate()
        .filter(|(index, _)| !bindings.iter().any(|binding| binding.index == *index))
        .map(|(index, name)| (index, name.clone()))
        .collect();
    let trim = arguments.trim_spaces();

    Ok(Box::new(move |row: usize, values: Vec<Value>| {
        let mut record = R::default();
        for binding in &bindings {
            let value = values.get(binding.index).cloned().unwrap_or_default();
            let result = match &binding.transformation {
                Some(transformation) => transformation(value.to_string())
                    .map_err(ConversionError::Transform)
                    .and_then(|value| (binding.setter)(&mut record, value, trim)),
                None => (binding.setter)(&mut record, value, trim),
            };
            if let Err(source) = result {
                let error = FieldError {
                    row,
                    column: binding.column.clone(),
                    source,
                };
                match record.field_errors() {
                    Some(errors) => errors.push(error),
                    None => Err(error)?,
                }
            }
        }
        if let Some(cells) = record.unmapped_cells() {
            for (index, name) in &unmapped {
                let value = values.get(*index).cloned().unwrap_or_default();
                cells.insert(name.clone(), Cell::from(value.trim(trim)));
            }
        }
        Ok(record)
    }))
}
