//! Property-based coverage for the value algebra's totality and the
//! codec round-trips, complementing the example-based unit tests that
//! live alongside each module.

use proptest::prelude::*;

use formulon_common::coord::RelativeCoord;
use formulon_common::node_key::NodeKey;
use formulon_common::value::{self, Sign, Value};

fn finite_f64() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL | prop::num::f64::ZERO | prop::num::f64::SUBNORMAL
}

fn any_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        finite_f64().prop_map(Value::Number),
        any::<bool>().prop_map(Value::Boolean),
        "[a-zA-Z0-9 ]{0,8}".prop_map(Value::String),
        prop_oneof![Just(Sign::Positive), Just(Sign::Negative)].prop_map(Value::Infinity),
    ]
}

proptest! {
    // Property 9: every arithmetic/comparison/concat primitive is total —
    // it returns a `Value` or a specific `ErrKind`, and never panics, for
    // any pair of scalars.
    #[test]
    fn arithmetic_and_comparison_primitives_never_panic(a in any_scalar(), b in any_scalar()) {
        let _ = value::add(&a, &b);
        let _ = value::subtract(&a, &b);
        let _ = value::multiply(&a, &b);
        let _ = value::divide(&a, &b);
        let _ = value::power(&a, &b);
        let _ = value::equals(&a, &b);
        let _ = value::not_equals(&a, &b);
        let _ = value::less_than(&a, &b);
        let _ = value::less_equal(&a, &b);
        let _ = value::greater_than(&a, &b);
        let _ = value::greater_equal(&a, &b);
        let _ = value::concatenate(&a, &b);
    }

    #[test]
    fn unary_primitives_never_panic(a in any_scalar(), flip in any::<bool>()) {
        let _ = value::negate(&a, flip);
        let _ = value::percent(&a);
    }

    // Property 8: every in-bounds (row, col) round-trips through its
    // canonical A1 string.
    #[test]
    fn cell_address_round_trips_through_a1(row in 0u32..1_048_576, col in 0u32..16_384) {
        let coord = RelativeCoord::new(row, col, false, false);
        let rendered = coord.to_string();
        let parsed = RelativeCoord::try_from_a1(&rendered).unwrap();
        prop_assert_eq!(parsed.row(), row);
        prop_assert_eq!(parsed.col(), col);
    }

    // Property 7: every graph node round-trips through the dependency-key
    // codec.
    #[test]
    fn cell_node_key_round_trips(
        workbook in "[a-zA-Z][a-zA-Z0-9_]{0,8}",
        sheet in "[a-zA-Z][a-zA-Z0-9_]{0,8}",
        row in 0u32..1_048_576,
        col in 0u32..16_384,
    ) {
        let key = NodeKey::Cell { workbook, sheet, row, col };
        let decoded = NodeKey::decode(&key.encode()).unwrap();
        prop_assert_eq!(decoded, key);
    }

    #[test]
    fn named_node_key_round_trips(
        workbook in "[a-zA-Z][a-zA-Z0-9_]{0,8}",
        scope in prop::option::of("[a-zA-Z][a-zA-Z0-9_]{0,8}"),
        name in "[a-zA-Z][a-zA-Z0-9_]{0,8}",
    ) {
        let key = NodeKey::Named { workbook, scope, name };
        let decoded = NodeKey::decode(&key.encode()).unwrap();
        prop_assert_eq!(decoded, key);
    }
}
