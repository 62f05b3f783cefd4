mod common;

use common::{fixture_layout, fixture_store, import_str, import_with};
use hazmat_questions::{
    error::{ImportError, LayoutError},
    layout::{FieldDefinition, FieldType},
    schema::IncidentSchema,
    store::{Store, StoreCounts},
    translate::TranslationTable,
};

fn small_layout() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("Rpt_Num", FieldType::Text),
        FieldDefinition::new("C_R_Name", FieldType::Text),
        FieldDefinition::new("Tot_Amt_of_Damages", FieldType::Numeric),
        FieldDefinition::new("Date_Inc", FieldType::Date),
    ]
}

fn all_incidents(store: &Store, schema: &IncidentSchema, count: u64) -> Vec<Vec<Option<String>>> {
    (1..=count as i64)
        .map(|id| store.incident(schema, id).expect("query").expect("row"))
        .collect()
}

#[test]
fn shared_report_numbers_merge_into_one_reference() {
    let mut store = Store::open_in_memory().expect("store");
    let counts = import_str(
        &mut store,
        &small_layout(),
        "Rpt_Num,C_R_Name,Tot_Amt_of_Damages,Date_Inc\n\
         A1,ACME,10,2014-03-01\n\
         A1,ACME,20,2014-03-01\n\
         B2,ACME,30,2014-03-02\n",
    )
    .expect("import");
    assert_eq!(
        counts,
        StoreCounts {
            layout: 4,
            reports: 2,
            incidents: 3
        }
    );
}

#[test]
fn fixture_import_counts() {
    let store = fixture_store();
    let counts = store.counts().expect("counts");
    assert_eq!(counts.layout, 21);
    assert_eq!(counts.reports, 5);
    assert_eq!(counts.incidents, 6);
}

#[test]
fn reimport_is_idempotent() {
    let fields = small_layout();
    let schema = IncidentSchema::from_fields(&fields).expect("schema");
    let data = "Rpt_Num,C_R_Name,Tot_Amt_of_Damages,Date_Inc\n\
                A1,UNITED PARCEL SERVICE,1234.56,3/1/2014\n\
                B2,NULL,,2015-01-02\n";
    let mut store = Store::open_in_memory().expect("store");

    let first_counts = import_str(&mut store, &fields, data).expect("first import");
    let first_rows = all_incidents(&store, &schema, first_counts.incidents);
    let first_layout = store.load_layout().expect("layout");

    let second_counts = import_str(&mut store, &fields, data).expect("second import");
    assert_eq!(first_counts, second_counts);
    assert_eq!(first_rows, all_incidents(&store, &schema, second_counts.incidents));
    assert_eq!(first_layout, store.load_layout().expect("layout"));
}

#[test]
fn null_token_is_absent_for_every_declared_type() {
    let fields = small_layout();
    let schema = IncidentSchema::from_fields(&fields).expect("schema");
    let mut store = Store::open_in_memory().expect("store");
    import_str(
        &mut store,
        &fields,
        "Rpt_Num,C_R_Name,Tot_Amt_of_Damages,Date_Inc\nA1,NULL,NULL,NULL\n",
    )
    .expect("import");
    let row = store.incident(&schema, 1).expect("query").expect("row");
    // id, Rpt_Num, C_R_Name, Tot_Amt_of_Damages, Date_Inc, grouped columns
    assert_eq!(row[1].as_deref(), Some("A1"));
    assert_eq!(row[2], None);
    assert_eq!(row[3], None);
    assert_eq!(row[4], None);
    assert_eq!(row[6], None, "absent carrier has no grouped name");
}

#[test]
fn grouped_columns_hold_canonical_names() {
    let fields = small_layout();
    let schema = IncidentSchema::from_fields(&fields).expect("schema");
    let mut store = Store::open_in_memory().expect("store");
    import_str(
        &mut store,
        &fields,
        "Rpt_Num,C_R_Name,Tot_Amt_of_Damages,Date_Inc\n\
         A1,UNITED PARCEL SERVICE,1,2014-03-01\n\
         A2,ACME TRUCKING,1,2014-03-01\n",
    )
    .expect("import");
    let position = schema
        .columns()
        .iter()
        .position(|c| c.name == "grouped_C_R_Name")
        .expect("grouped column");
    let ups = store.incident(&schema, 1).expect("query").expect("row");
    let acme = store.incident(&schema, 2).expect("query").expect("row");
    assert_eq!(ups[position].as_deref(), Some("UPS"));
    assert_eq!(ups[2].as_deref(), Some("UNITED PARCEL SERVICE"));
    assert_eq!(acme[position].as_deref(), Some("ACME TRUCKING"));
}

#[test]
fn custom_translations_replace_builtin_tables() {
    let fields = small_layout();
    let schema = IncidentSchema::from_fields(&fields).expect("schema");
    let mut translations = TranslationTable::default();
    translations.insert("C_R_Name", "ACME TRUCKING", "ACME");
    let mut store = Store::open_in_memory().expect("store");
    import_with(
        &mut store,
        &fields,
        "Rpt_Num,C_R_Name,Tot_Amt_of_Damages,Date_Inc\n\
         A1,ACME TRUCKING,1,2014-03-01\n\
         A2,UNITED PARCEL SERVICE,1,2014-03-01\n",
        &translations,
    )
    .expect("import");
    let position = schema
        .columns()
        .iter()
        .position(|c| c.name == "grouped_C_R_Name")
        .expect("grouped column");
    let acme = store.incident(&schema, 1).expect("query").expect("row");
    let ups = store.incident(&schema, 2).expect("query").expect("row");
    assert_eq!(acme[position].as_deref(), Some("ACME"));
    assert_eq!(ups[position].as_deref(), Some("UNITED PARCEL SERVICE"));
}

#[test]
fn coercion_failure_keeps_only_committed_batches() {
    let fields = vec![
        FieldDefinition::new("Rpt_Num", FieldType::Text),
        FieldDefinition::new("Tot_Amt_of_Damages", FieldType::Numeric),
    ];
    let mut data = String::from("Rpt_Num,Tot_Amt_of_Damages\n");
    for row in 1..=200 {
        if row == 150 {
            data.push_str("R150,not a number\n");
        } else {
            data.push_str(&format!("R{row},{row}\n"));
        }
    }

    let mut store = Store::open_in_memory().expect("store");
    let err = import_str(&mut store, &fields, &data).expect_err("coercion failure");
    match err.downcast_ref::<ImportError>() {
        Some(ImportError::TypeCoercion {
            field, value, line, ..
        }) => {
            assert_eq!(field, "Tot_Amt_of_Damages");
            assert_eq!(value, "not a number");
            assert_eq!(*line, 151);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let counts = store.counts().expect("counts");
    assert_eq!(counts.incidents, 100);
    assert_eq!(counts.reports, 100);
    assert_eq!(counts.layout, 2);
}

#[test]
fn oversized_numeric_value_is_a_coercion_error() {
    let fields = vec![
        FieldDefinition::new("Rpt_Num", FieldType::Text),
        FieldDefinition::new("Tot_Amt_of_Damages", FieldType::Numeric),
    ];
    let mut store = Store::open_in_memory().expect("store");
    let err = import_str(&mut store, &fields, "Rpt_Num,Tot_Amt_of_Damages\nA,1e21\n")
        .expect_err("out of range");
    match err.downcast_ref::<ImportError>() {
        Some(ImportError::TypeCoercion {
            field, value, line, ..
        }) => {
            assert_eq!(field, "Tot_Amt_of_Damages");
            assert_eq!(value, "1e21");
            assert_eq!(*line, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.counts().expect("counts").incidents, 0);
}

#[test]
fn reserved_name_check_ignores_case() {
    let mut fields = small_layout();
    fields.push(FieldDefinition::new("ID", FieldType::Text));
    let mut store = Store::open_in_memory().expect("store");
    let err = import_str(&mut store, &fields, "Rpt_Num\nA1\n").expect_err("reserved");
    assert!(matches!(
        err.downcast_ref::<LayoutError>(),
        Some(LayoutError::ReservedName { name }) if name == "ID"
    ));
    assert!(!store.table_exists("incidents").expect("exists"));
}

#[test]
fn reserved_layout_name_fails_before_writing() {
    let mut fields = small_layout();
    fields.push(FieldDefinition::new("id", FieldType::Text));
    let mut store = Store::open_in_memory().expect("store");
    let err = import_str(&mut store, &fields, "Rpt_Num\nA1\n").expect_err("reserved");
    assert!(matches!(
        err.downcast_ref::<LayoutError>(),
        Some(LayoutError::ReservedName { name }) if name == "id"
    ));
    assert!(!store.table_exists("incidents").expect("exists"));
}

#[test]
fn header_must_match_layout() {
    let mut store = Store::open_in_memory().expect("store");
    let err = import_str(&mut store, &small_layout(), "Rpt_Num,Colour\nA1,red\n")
        .expect_err("unknown column");
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::UnknownColumn { column }) if column == "Colour"
    ));

    let err = import_str(&mut store, &small_layout(), "Rpt_Num,Rpt_Num\nA1,A1\n")
        .expect_err("duplicate column");
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::DuplicateColumn { column }) if column == "Rpt_Num"
    ));
}

#[test]
fn fixture_layout_types() {
    let fields = fixture_layout();
    let by_name = |name: &str| {
        fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.declared_type)
    };
    assert_eq!(by_name("Date_Inc"), Some(FieldType::Date));
    assert_eq!(by_name("Tot_Amt_of_Damages"), Some(FieldType::Numeric));
    assert_eq!(by_name("Mode_Transpo"), Some(FieldType::Text));
    assert_eq!(fields[1].description, "Air, Highway, Rail or Water");
}
