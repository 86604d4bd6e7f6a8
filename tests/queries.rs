use sheetquery::column;
use sheetquery::database::SchemaError;
use sheetquery::field;
use sheetquery::mapping::StrictMappingError;
use sheetquery::query::arguments::ArgumentsError;
use sheetquery::query::translate::TranslateError;
use sheetquery::query::SequenceError;
use sheetquery::record;
use sheetquery::spreadsheet::MemoryWorkbook;
use sheetquery::Cell;
use sheetquery::FieldError;
use sheetquery::QueryFactory;
use sheetquery::Row;
use sheetquery::SheetQueryError;
use sheetquery::StrictMapping;
use sheetquery::TrimSpaces;
use sheetquery::Value;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Company {
    name: String,
    ceo: String,
    employee_count: i64,
}

record!(Company {
    name: "Name",
    ceo: "CEO",
    employee_count: "EmployeeCount",
});

#[derive(Debug, Default)]
struct CompanyWithErrors {
    name: String,
    employee_count: i64,
    errors: Vec<FieldError>,
}

record!(CompanyWithErrors {
    name: "Name",
    employee_count: "EmployeeCount",
} errors: errors);

#[derive(Debug, Default)]
struct CompanyWithExtras {
    name: String,
    extras: HashMap<String, Cell>,
}

record!(CompanyWithExtras { name: "Name" } unmapped: extras);

fn text(value: &str) -> Value {
    Value::from(value)
}

fn workbook() -> MemoryWorkbook {
    MemoryWorkbook::new("companies.xlsx")
        .with_sheet(
            "Sheet1",
            vec![
                vec![text("Name"), text("CEO"), text("EmployeeCount"), text("City")],
                vec![text("ACME"), text("Wile E. Coyote"), Value::Int(120), text("Phoenix")],
                vec![text("Contoso"), text("Jane Doe"), Value::Int(30), text("Seattle")],
                vec![text("Fabrikam"), text("  John Roe  "), Value::Int(45), text("Boston")],
                vec![text("Initech"), text("Bill Lumbergh"), Value::Int(300), text("Austin")],
            ],
        )
        .with_sheet(
            "Sheet2",
            vec![
                vec![text("Name"), text("EmployeeCount")],
                vec![text("Globex"), Value::Int(80)],
            ],
        )
        .with_sheet(
            "Bad",
            vec![
                vec![text("Name"), text("EmployeeCount")],
                vec![text("ACME"), Value::Int(120)],
                vec![text("Contoso"), text("many")],
                vec![text("Fabrikam"), Value::Int(45)],
            ],
        )
        .with_sheet(
            "Gaps",
            vec![
                vec![text("Name"), text("EmployeeCount")],
                vec![text("A"), Value::Int(1)],
                vec![text("B"), Value::Int(2)],
                vec![Value::Null, Value::Null],
                vec![text("C"), text("x")],
            ],
        )
        .with_sheet(
            "Numbers",
            vec![
                vec![text("N")],
                vec![Value::Int(1)],
                vec![Value::Int(2)],
                vec![Value::Int(3)],
                vec![Value::Int(4)],
                vec![Value::Int(5)],
            ],
        )
        .with_sheet(
            "Visits",
            vec![
                vec![text("City")],
                vec![text("Phoenix")],
                vec![text("Boston")],
                vec![text("Phoenix")],
            ],
        )
        .with_named_range("BigFirms", "Sheet1!$A$1:$C$3")
}

fn factory() -> QueryFactory {
    QueryFactory::in_memory(workbook())
}

fn names(companies: &[Company]) -> Vec<&str> {
    companies.iter().map(|company| company.name.as_str()).collect()
}

#[test]
fn filter_and_order_records() {
    let companies = factory()
        .worksheet::<Company>("Sheet1")
        .unwrap()
        .filter(field("employee_count").gt(40))
        .order_by_descending(field("employee_count"))
        .to_vec()
        .unwrap();
    assert_eq!(names(&companies), vec!["Initech", "ACME", "Fabrikam"]);
    assert_eq!(companies[1].ceo, "Wile E. Coyote");
    assert_eq!(companies[1].employee_count, 120);
}

#[test]
fn literals_become_parameters() {
    let statement = factory()
        .worksheet::<Row>("Sheet1")
        .unwrap()
        .filter(column("Name").eq("ACME"))
        .statement()
        .unwrap();
    assert_eq!(statement.text(), "SELECT * FROM \"Sheet1\" WHERE (\"Name\" = ?)");
    assert_eq!(statement.parameters(), [text("ACME")]);
    assert_eq!(statement.columns(), ["Name"]);
    assert_eq!(
        statement.to_string(),
        "SELECT * FROM \"Sheet1\" WHERE (\"Name\" = ?); p0 = 'ACME';"
    );
}

#[test]
fn worksheet_index_resolves_to_name() {
    let factory = factory();
    let by_index = factory
        .worksheet_by_index::<Row>(1)
        .unwrap()
        .filter(column("EmployeeCount").gt(10))
        .statement()
        .unwrap();
    let by_name = factory
        .worksheet::<Row>("Sheet2")
        .unwrap()
        .filter(column("EmployeeCount").gt(10))
        .statement()
        .unwrap();
    assert_eq!(by_index, by_name);

    let rows = factory.worksheet_by_index::<Row>(1).unwrap().to_vec().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["Name"], "Globex");
}

#[test]
fn worksheet_index_out_of_range() {
    let result = factory().worksheet_by_index::<Row>(9).unwrap().to_vec();
    assert!(matches!(
        result,
        Err(SheetQueryError::SchemaError(SchemaError::WorksheetIndexOutOfRange { index: 9, count: 6 }))
    ));
}

#[test]
fn default_worksheet_is_sheet1() {
    assert_eq!(factory().query::<Company>().unwrap().count().unwrap(), 4);
}

#[test]
fn missing_worksheet_lists_alternatives() {
    let error = factory()
        .worksheet::<Row>("Sheet9")
        .unwrap()
        .to_vec()
        .unwrap_err();
    match error {
        SheetQueryError::SchemaError(SchemaError::WorksheetNotFound {
            worksheet, available, ..
        }) => {
            assert_eq!(worksheet, "Sheet9");
            assert_eq!(available, vec!["Sheet1", "Sheet2", "Bad", "Gaps", "Numbers", "Visits"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invalid_column_lists_alternatives() {
    let error = factory()
        .worksheet::<Row>("Sheet1")
        .unwrap()
        .filter(column("Nmae").eq("ACME"))
        .to_vec()
        .unwrap_err();
    match error {
        SheetQueryError::SchemaError(SchemaError::InvalidColumn { column, available }) => {
            assert_eq!(column, "Nmae");
            assert_eq!(available, vec!["Name", "CEO", "EmployeeCount", "City"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn field_errors_are_collected() {
    let companies = factory()
        .worksheet::<CompanyWithErrors>("Bad")
        .unwrap()
        .to_vec()
        .unwrap();
    assert_eq!(companies.len(), 3);
    assert!(companies[0].errors.is_empty());
    assert_eq!(companies[1].name, "Contoso");
    assert_eq!(companies[1].employee_count, 0);
    assert_eq!(companies[1].errors.len(), 1);
    assert_eq!(companies[1].errors[0].row, 2);
    assert_eq!(companies[1].errors[0].column, "EmployeeCount");
    assert!(companies[2].errors.is_empty());
    assert_eq!(companies[2].employee_count, 45);
}

#[test]
fn field_errors_fail_without_collector() {
    let query = factory().worksheet::<Company>("Bad").unwrap();
    assert!(matches!(
        query.to_vec(),
        Err(SheetQueryError::FieldError(FieldError { row: 2, .. }))
    ));

    let lazy = QueryFactory::in_memory(workbook()).lazy(true);
    let mut rows = lazy.worksheet::<Company>("Bad").unwrap().iter().unwrap();
    assert_eq!(rows.next().unwrap().unwrap().name, "ACME");
    assert!(rows.next().unwrap().is_err());
    assert!(rows.next().is_none());
}

#[test]
fn unmapped_cells_are_collected() {
    let companies = factory()
        .worksheet::<CompanyWithExtras>("Sheet1")
        .unwrap()
        .to_vec()
        .unwrap();
    assert_eq!(companies.len(), 4);
    for company in &companies {
        let mut keys: Vec<&String> = company.extras.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["CEO", "City", "EmployeeCount"]);
    }
    assert_eq!(companies[0].extras["City"], "Phoenix");
    assert_eq!(companies[0].extras["EmployeeCount"], Value::Int(120));
}

#[test]
fn strict_mapping_fails_before_rows() {
    let columns = QueryFactory::in_memory(workbook()).strict_mapping(StrictMapping::ColumnStrict);
    assert!(matches!(
        columns.worksheet::<Company>("Sheet1").unwrap().to_vec(),
        Err(SheetQueryError::StrictMappingError(StrictMappingError::ColumnNotMapped(column))) if column == "City"
    ));

    let fields = QueryFactory::in_memory(workbook()).strict_mapping(StrictMapping::FieldStrict);
    assert_eq!(fields.worksheet::<Company>("Sheet1").unwrap().to_vec().unwrap().len(), 4);
    assert!(matches!(
        fields.worksheet::<CompanyWithExtras>("Sheet1").unwrap().to_vec(),
        Ok(companies) if companies.len() == 4
    ));

    let both = QueryFactory::in_memory(workbook()).strict_mapping(StrictMapping::Both);
    both.add_mapping("city", "City");
    assert_eq!(both.worksheet::<Company>("Sheet1").unwrap().to_vec().unwrap().len(), 4);
}

#[test]
fn empty_rows_are_skipped_without_consuming_numbers() {
    let factory = QueryFactory::in_memory(workbook()).skip_empty_rows(true);
    let companies = factory
        .worksheet::<CompanyWithErrors>("Gaps")
        .unwrap()
        .to_vec()
        .unwrap();
    let names: Vec<&str> = companies.iter().map(|company| company.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
    assert_eq!(companies[2].errors.len(), 1);
    assert_eq!(companies[2].errors[0].row, 3);

    let all = QueryFactory::in_memory(workbook())
        .worksheet::<Row>("Gaps")
        .unwrap()
        .to_vec()
        .unwrap();
    assert_eq!(all.len(), 4);
}

#[test]
fn trim_policies() {
    let trimmed = QueryFactory::in_memory(workbook()).trim_spaces(TrimSpaces::Both);
    let company = trimmed
        .worksheet::<Company>("Sheet1")
        .unwrap()
        .filter(field("name").eq("Fabrikam"))
        .single()
        .unwrap();
    assert_eq!(company.ceo, "John Roe");
    assert_eq!(company.employee_count, 45);

    let untouched = factory()
        .worksheet::<Company>("Sheet1")
        .unwrap()
        .filter(field("name").eq("Fabrikam"))
        .single()
        .unwrap();
    assert_eq!(untouched.ceo, "  John Roe  ");
}

#[test]
fn reverse_then_skip() {
    let rows = factory()
        .worksheet::<Row>("Numbers")
        .unwrap()
        .order_by(column("N"))
        .reverse()
        .skip(2)
        .to_vec()
        .unwrap();
    let values: Vec<&Value> = rows.iter().map(|row| row["N"].value()).collect();
    assert_eq!(values, vec![&Value::Int(3), &Value::Int(2), &Value::Int(1)]);
}

#[test]
fn skip_and_take() {
    let query = factory().worksheet::<Row>("Numbers").unwrap().order_by(column("N"));
    let values = |rows: Vec<Row>| -> Vec<Value> { rows.iter().map(|row| row["N"].value().clone()).collect() };
    assert_eq!(
        values(query.clone().take(2).to_vec().unwrap()),
        vec![Value::Int(1), Value::Int(2)]
    );
    assert_eq!(
        values(query.clone().skip(1).take(2).to_vec().unwrap()),
        vec![Value::Int(2), Value::Int(3)]
    );
    assert_eq!(query.clone().skip(2).last().unwrap()["N"], Value::Int(5));
    assert_eq!(query.skip(1).first().unwrap()["N"], Value::Int(2));
}

#[test]
fn aggregates() {
    let query = factory().worksheet::<Company>("Sheet1").unwrap();
    assert_eq!(query.count().unwrap(), 4);
    assert_eq!(query.clone().filter(field("employee_count").lt(100)).long_count().unwrap(), 2);
    assert_eq!(query.sum(field("employee_count")).unwrap(), Value::Int(495));
    assert_eq!(query.min(field("employee_count")).unwrap(), Value::Int(30));
    assert_eq!(query.max(field("name")).unwrap(), text("Initech"));
    assert_eq!(
        query.clone().filter(field("name").eq("Nobody")).sum(field("employee_count")).unwrap(),
        Value::Null
    );
}

#[test]
fn element_operators() {
    let query = factory().worksheet::<Company>("Sheet1").unwrap();
    assert_eq!(query.clone().filter(field("name").starts_with("Ini")).single().unwrap().ceo, "Bill Lumbergh");
    assert!(matches!(
        query.single(),
        Err(SheetQueryError::SequenceError(SequenceError::MoreThanOne))
    ));
    let nobody = query.clone().filter(field("name").eq("Nobody"));
    assert!(nobody.first_or_default().unwrap().is_none());
    assert!(matches!(
        nobody.first(),
        Err(SheetQueryError::SequenceError(SequenceError::NoElements))
    ));
    assert_eq!(query.order_by(field("name")).last().unwrap().name, "Initech");
}

#[test]
fn string_predicates() {
    let query = factory().worksheet::<Company>("Sheet1").unwrap().order_by(field("name"));
    let contains = query.clone().filter(field("ceo").contains("Doe")).to_vec().unwrap();
    assert_eq!(names(&contains), vec!["Contoso"]);
    let ends = query.clone().filter(field("name").ends_with("tech")).to_vec().unwrap();
    assert_eq!(names(&ends), vec!["Initech"]);
    let members = query
        .clone()
        .filter(field("name").is_in(["ACME", "Initech", "Nobody"]))
        .to_vec()
        .unwrap();
    assert_eq!(names(&members), vec!["ACME", "Initech"]);
    let upper = query.filter(field("name").upper().eq("CONTOSO")).to_vec().unwrap();
    assert_eq!(names(&upper), vec!["Contoso"]);
}

#[test]
fn field_projection_selects_only_named_columns() {
    let query = factory().worksheet::<Company>("Sheet1").unwrap().select(&["name"]);
    assert_eq!(query.statement().unwrap().text(), "SELECT \"Name\" FROM \"Sheet1\"");
    let companies = query.order_by(field("name")).to_vec().unwrap();
    assert_eq!(companies[0].name, "ACME");
    assert_eq!(companies[0].employee_count, 0);
}

#[test]
fn constructed_rows() {
    let rows = factory()
        .worksheet::<Company>("Sheet1")
        .unwrap()
        .filter(field("employee_count").gt(100))
        .order_by(field("name"))
        .construct([
            ("Title", field("name").concat(" in ").concat(column("City"))),
            ("Staff", field("employee_count")),
        ])
        .to_vec()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["Title"], "ACME in Phoenix");
    assert_eq!(rows[0]["Staff"], Value::Int(120));
    assert_eq!(rows[1].column_names(), ["Title", "Staff"]);
}

#[test]
fn constructed_predicate_members() {
    let rows = factory()
        .worksheet::<Row>("Sheet1")
        .unwrap()
        .order_by(column("Name"))
        .construct([
            ("Name", column("Name")),
            ("Many", column("EmployeeCount").gt(100)),
            ("Western", column("City").is_in(["Phoenix", "Seattle"]).and(column("Name").ne("ACME"))),
            ("Co", column("Name").starts_with("Co")),
        ])
        .to_vec()
        .unwrap();
    let many: Vec<&Value> = rows.iter().map(|row| row["Many"].value()).collect();
    assert_eq!(
        many,
        vec![&Value::Bool(true), &Value::Bool(false), &Value::Bool(false), &Value::Bool(true)]
    );
    assert_eq!(rows[0]["Western"], Value::Bool(false));
    assert_eq!(rows[1]["Western"], Value::Bool(true));
    assert_eq!(rows[1]["Co"], Value::Bool(true));
    assert_eq!(rows[2]["Co"], Value::Bool(false));
}

#[test]
fn distinct_values() {
    let cities = factory()
        .worksheet::<Row>("Visits")
        .unwrap()
        .select(&["City"])
        .distinct()
        .order_by(column("City"))
        .to_vec()
        .unwrap();
    let cities: Vec<&Cell> = cities.iter().map(|row| &row["City"]).collect();
    assert_eq!(cities, vec![&Cell::new("Boston"), &Cell::new("Phoenix")]);

    // Constructed projections cannot be made distinct
    let constructed = factory()
        .worksheet::<Row>("Sheet1")
        .unwrap()
        .construct([("Many", column("EmployeeCount").gt(100))])
        .distinct();
    assert!(matches!(
        constructed.to_vec(),
        Err(SheetQueryError::TranslateError(TranslateError::Unsupported(_)))
    ));
}

#[test]
fn ranges_and_named_ranges() {
    let factory = factory();
    let rows = factory
        .worksheet_range::<Row>("B1", "C3", "Sheet1")
        .unwrap()
        .to_vec()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].column_names(), ["CEO", "EmployeeCount"]);
    assert_eq!(rows[1]["EmployeeCount"], Value::Int(30));

    let named = factory.named_range::<Company>("BigFirms").unwrap().to_vec().unwrap();
    assert_eq!(names(&named), vec!["ACME", "Contoso"]);
    assert_eq!(factory.named_ranges().unwrap(), vec!["BigFirms"]);
    assert_eq!(
        factory.named_range_column_names("BigFirms").unwrap(),
        vec!["Name", "CEO", "EmployeeCount"]
    );
}

#[test]
fn header_less_rows() {
    let factory = factory();
    let rows = factory.worksheet_no_header("Sheet2").unwrap().to_vec().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "Name");
    assert_eq!(rows[1][0], "Globex");

    let filtered = factory
        .worksheet_range_no_header("A2", "B5", "Sheet1")
        .unwrap()
        .filter(column("F1").eq("Initech"))
        .to_vec()
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0][1], "Bill Lumbergh");
}

#[test]
fn transformations_run_before_conversion() {
    let factory = factory();
    factory.add_transformation::<Company, _>("name", |value| Ok(Value::from(value.to_uppercase())));
    factory.add_transformation::<Company, _>("employee_count", |value| {
        let count: i64 = value.parse()?;
        Ok(Value::Int(count * 2))
    });
    let company = factory
        .worksheet::<Company>("Sheet1")
        .unwrap()
        .filter(field("name").eq("ACME"))
        .single()
        .unwrap();
    assert_eq!(company.name, "ACME");
    assert_eq!(company.employee_count, 240);

    let contoso = factory
        .worksheet::<Company>("Sheet1")
        .unwrap()
        .filter(field("name").eq("Contoso"))
        .single()
        .unwrap();
    assert_eq!(contoso.name, "CONTOSO");
}

#[test]
fn explicit_mappings_win_over_declared_columns() {
    let factory = factory();
    factory.add_mapping("ceo", "City");
    let company = factory
        .worksheet::<Company>("Sheet1")
        .unwrap()
        .filter(field("name").eq("ACME"))
        .single()
        .unwrap();
    assert_eq!(company.ceo, "Phoenix");
}

#[test]
fn schema_helpers() {
    let factory = factory();
    assert_eq!(
        factory.worksheet_names().unwrap(),
        vec!["Sheet1", "Sheet2", "Bad", "Gaps", "Numbers", "Visits"]
    );
    assert_eq!(
        factory.column_names("Sheet1").unwrap(),
        vec!["Name", "CEO", "EmployeeCount", "City"]
    );
}

#[test]
fn invalid_range_is_a_configuration_error() {
    assert!(matches!(
        factory().worksheet_range::<Row>("A0x", "C3", "Sheet1"),
        Err(SheetQueryError::ArgumentsError(ArgumentsError::InvalidRange { .. }))
    ));
}

#[test]
fn unsupported_shapes_fail_before_execution() {
    let query = factory()
        .worksheet::<Row>("Sheet1")
        .unwrap()
        .skip(1)
        .reverse();
    assert!(matches!(
        query.to_vec(),
        Err(SheetQueryError::TranslateError(TranslateError::Unsupported(_)))
    ));
}

#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn missing_mapped_column_is_a_warning() {
    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let companies = tracing::subscriber::with_default(subscriber, || {
        let factory = factory();
        factory.add_mapping("ceo", "Chief");
        factory.worksheet::<Company>("Sheet1").unwrap().to_vec()
    })
    .unwrap();
    assert_eq!(companies.len(), 4);
    assert_eq!(companies[0].ceo, "");
    assert!(log
        .contents()
        .contains("'Chief' column that is mapped to the 'ceo' property does not exist in the 'Sheet1' worksheet"));
}

#[test]
fn ranges_past_the_data_stop_at_the_last_row() {
    let rows = factory()
        .worksheet_range::<Row>("A1", "D1048576", "Sheet1")
        .unwrap()
        .to_vec()
        .unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3]["Name"], "Initech");
}
