//! End-to-end scenarios driven entirely through the `Engine` facade —
//! each one exercises a distinct corner of the evaluation core that a
//! unit test on a single module can't reach (cross-cell invalidation,
//! spill placement and teardown, the lifted comparison operator, and
//! frontier re-evaluation through an intermediate spill).

use formulon_common::{CellAddress, ErrKind, Sign};
use formulon_workbook::{Engine, SerializedValue};

fn cell(row: u32, col: u32) -> CellAddress {
    CellAddress::new("wb", "Sheet1", row, col)
}

fn engine_with_sheet1() -> Engine {
    let mut engine = Engine::build_empty();
    engine.add_workbook("wb").unwrap();
    engine.add_sheet("wb", "Sheet1").unwrap();
    engine
}

#[test]
fn arithmetic_and_references_update_on_change() {
    let mut engine = engine_with_sheet1();
    engine.set_cell_content(&cell(0, 0), 5.0).unwrap(); // A1
    engine.set_cell_content(&cell(0, 1), 10.0).unwrap(); // B1
    engine.set_cell_content(&cell(0, 2), "=A1+B1*2").unwrap(); // C1

    assert_eq!(engine.get_cell_value(&cell(0, 2)).unwrap(), SerializedValue::Number(25.0));

    engine.set_cell_content(&cell(0, 1), 0.0).unwrap();
    assert_eq!(engine.get_cell_value(&cell(0, 2)).unwrap(), SerializedValue::Number(5.0));
}

#[test]
fn mutual_reference_is_labeled_a_cycle() {
    let mut engine = engine_with_sheet1();
    engine.set_cell_content(&cell(0, 0), "=B1").unwrap(); // A1
    engine.set_cell_content(&cell(1, 0), "=A1").unwrap(); // B1

    assert_eq!(engine.get_cell_value(&cell(0, 0)).unwrap().error_kind(), Some(ErrKind::Cycle));
    assert_eq!(engine.get_cell_value(&cell(1, 0)).unwrap().error_kind(), Some(ErrKind::Cycle));
}

#[test]
fn a_dynamic_array_spills_and_tears_down_on_conflict() {
    let mut engine = engine_with_sheet1();
    engine.set_cell_content(&cell(0, 0), 1.0).unwrap(); // A1
    engine.set_cell_content(&cell(1, 0), 2.0).unwrap(); // A2
    engine.set_cell_content(&cell(2, 0), 3.0).unwrap(); // A3
    engine.set_cell_content(&cell(0, 2), "=A1:A3*2").unwrap(); // C1

    assert_eq!(engine.get_cell_value(&cell(0, 2)).unwrap(), SerializedValue::Number(2.0));
    assert_eq!(engine.get_cell_value(&cell(1, 2)).unwrap(), SerializedValue::Number(4.0));
    assert_eq!(engine.get_cell_value(&cell(2, 2)).unwrap(), SerializedValue::Number(6.0));

    // Writing into the second spilled slot (C2) collides with C1's spill.
    engine.set_cell_content(&cell(1, 2), "x").unwrap();

    assert_eq!(engine.get_cell_value(&cell(0, 2)).unwrap().error_kind(), Some(ErrKind::Spill));
    // The torn-down third slot is a genuinely empty cell again, not an error.
    assert_eq!(engine.get_cell_value(&cell(2, 2)).unwrap(), SerializedValue::Text(String::new()));
}

#[test]
fn division_by_zero_and_infinity_equality() {
    let mut engine = engine_with_sheet1();
    engine.set_cell_content(&cell(0, 0), "=1/0").unwrap(); // A1
    engine.set_cell_content(&cell(1, 0), "=A1=A1").unwrap(); // A2
    engine.set_cell_content(&cell(2, 0), "=-1/0").unwrap(); // A3
    engine.set_cell_content(&cell(3, 0), "=A1=A3").unwrap(); // A4

    assert_eq!(engine.get_cell_value(&cell(0, 0)).unwrap(), SerializedValue::Infinity(Sign::Positive));
    assert_eq!(engine.get_cell_value(&cell(1, 0)).unwrap(), SerializedValue::Boolean(true));
    assert_eq!(engine.get_cell_value(&cell(2, 0)).unwrap(), SerializedValue::Infinity(Sign::Negative));
    assert_eq!(engine.get_cell_value(&cell(3, 0)).unwrap(), SerializedValue::Boolean(false));
}

#[test]
fn comparing_strings_with_ordering_operators_is_a_value_error() {
    let mut engine = engine_with_sheet1();
    engine.set_cell_content(&cell(0, 0), r#"="a"<"b""#).unwrap();
    assert_eq!(engine.get_cell_value(&cell(0, 0)).unwrap().error_kind(), Some(ErrKind::Value));
}

#[test]
fn power_special_cases() {
    let mut engine = engine_with_sheet1();
    engine.set_cell_content(&cell(0, 0), "=(-4)^0.5").unwrap();
    engine.set_cell_content(&cell(1, 0), "=2^1000").unwrap();
    engine.set_cell_content(&cell(2, 0), "=(0.5)^(1/0)").unwrap();

    assert_eq!(engine.get_cell_value(&cell(0, 0)).unwrap().error_kind(), Some(ErrKind::Num));
    assert_eq!(engine.get_cell_value(&cell(1, 0)).unwrap(), SerializedValue::Infinity(Sign::Positive));
    assert_eq!(engine.get_cell_value(&cell(2, 0)).unwrap(), SerializedValue::Number(0.0));
}

#[test]
fn comparison_operator_lifts_over_a_spilled_range() {
    let mut engine = engine_with_sheet1();
    engine.set_cell_content(&cell(0, 0), 5.0).unwrap(); // A1
    engine.set_cell_content(&cell(1, 0), 10.0).unwrap(); // A2
    engine.set_cell_content(&cell(2, 0), 15.0).unwrap(); // A3
    engine.set_cell_content(&cell(0, 1), "=A1:A3>10").unwrap(); // B1

    assert_eq!(engine.get_cell_value(&cell(0, 1)).unwrap(), SerializedValue::Boolean(false));
    assert_eq!(engine.get_cell_value(&cell(1, 1)).unwrap(), SerializedValue::Boolean(false));
    assert_eq!(engine.get_cell_value(&cell(2, 1)).unwrap(), SerializedValue::Boolean(true));
}

#[test]
fn a_spill_into_a_frontier_dependency_re_triggers_its_dependent() {
    let mut engine = engine_with_sheet1();
    engine.set_cell_content(&cell(0, 1), "=C1:C3").unwrap(); // B1, spills over B1:B3
    engine.set_cell_content(&cell(0, 0), "=SUM(B1:B3)").unwrap(); // A1

    // C1:C3 start empty, so B1:B3 is all zeros and A1 sums to 0.
    assert_eq!(engine.get_cell_value(&cell(0, 0)).unwrap(), SerializedValue::Number(0.0));

    engine.set_cell_content(&cell(0, 2), 1.0).unwrap(); // C1
    engine.set_cell_content(&cell(1, 2), 2.0).unwrap(); // C2
    engine.set_cell_content(&cell(2, 2), 3.0).unwrap(); // C3

    assert_eq!(engine.get_cell_value(&cell(0, 0)).unwrap(), SerializedValue::Number(6.0));
}

#[test]
fn removing_a_workbook_forgets_its_content() {
    let mut engine = Engine::build_empty();
    engine.add_workbook("wb").unwrap();
    engine.add_sheet("wb", "Sheet1").unwrap();
    engine.set_cell_content(&cell(0, 0), 1.0).unwrap();
    engine.remove_workbook("wb").unwrap();
    assert!(!engine.has_workbook("wb"));
    assert!(engine.add_workbook("wb").is_ok());
}

#[test]
fn zero_over_zero_is_division_by_zero_with_no_diagnostic_message() {
    let mut engine = engine_with_sheet1();
    engine.set_cell_content(&cell(0, 0), "=0/0").unwrap();

    let div0 = engine.get_cell_value(&cell(0, 0)).unwrap();
    assert_eq!(div0.error_kind(), Some(ErrKind::Div0));
    assert_eq!(div0.serialize(true), "#DIV/0!");
    assert_eq!(div0.serialize(false), "#DIV/0!");
}

#[test]
fn sum_reduces_a_3d_reference_across_every_sheet_it_spans() {
    let mut engine = engine_with_sheet1();
    engine.add_sheet("wb", "Sheet2").unwrap();
    engine.add_sheet("wb", "Sheet3").unwrap();
    engine.set_cell_content(&CellAddress::new("wb", "Sheet1", 0, 0), 1.0).unwrap(); // Sheet1!A1
    engine.set_cell_content(&CellAddress::new("wb", "Sheet2", 0, 0), 2.0).unwrap(); // Sheet2!A1
    engine.set_cell_content(&CellAddress::new("wb", "Sheet3", 0, 0), 3.0).unwrap(); // Sheet3!A1
    engine.set_cell_content(&cell(0, 1), "=SUM(Sheet1:Sheet3!A1)").unwrap(); // B1

    assert_eq!(engine.get_cell_value(&cell(0, 1)).unwrap(), SerializedValue::Number(6.0));
}

#[test]
fn a_bare_3d_reference_is_a_value_error_outside_a_function_argument() {
    let mut engine = engine_with_sheet1();
    engine.add_sheet("wb", "Sheet2").unwrap();
    engine.set_cell_content(&cell(0, 0), "=Sheet1:Sheet2!A1").unwrap();

    assert_eq!(engine.get_cell_value(&cell(0, 0)).unwrap().error_kind(), Some(ErrKind::Value));
}

#[test]
fn debug_mode_appends_the_parse_error_message() {
    let mut engine = engine_with_sheet1();
    engine.set_cell_content(&cell(0, 0), "=1+").unwrap();

    let value = engine.get_cell_value(&cell(0, 0)).unwrap();
    assert_eq!(value.error_kind(), Some(ErrKind::Error));
    assert_eq!(value.serialize(false), "#ERROR!");
    assert!(value.serialize(true).starts_with("#ERROR!: "));
}
