//! Property tests for the contract algebra and checked arithmetic

use proptest::prelude::*;

use sable::ast::BinOp;
use sable::contract::{convert, intersect, relationship, union};
use sable::interp::binary_op;
use sable::{ArithmeticMode, Contract, ErrorKind, Relationship, Value};

fn scalar() -> impl Strategy<Value = Contract> {
    prop_oneof![
        Just(Contract::INTEGER),
        Just(Contract::REAL),
        Just(Contract::BOOLEAN),
        Just(Contract::STRING),
        Just(Contract::VOID),
        Just(Contract::Super),
    ]
}

fn member_contract() -> impl Strategy<Value = Contract> {
    prop_oneof![
        Just(Contract::INTEGER),
        Just(Contract::REAL),
        Just(Contract::BOOLEAN),
        Just(Contract::STRING),
        Just(Contract::Super),
    ]
}

fn composite() -> impl Strategy<Value = Contract> {
    prop::collection::btree_map("[a-e]", member_contract(), 0..5).prop_map(Contract::composite)
}

fn int_set() -> impl Strategy<Value = Contract> {
    prop::collection::btree_set(-5i64..5, 1..4)
        .prop_map(|members| Contract::set(members.into_iter().map(Value::Integer)))
}

fn contract() -> impl Strategy<Value = Contract> {
    let leaf = prop_oneof![scalar(), int_set(), composite()];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            (inner.clone(), 1usize..3).prop_map(|(element, rank)| Contract::array(element, rank)),
            prop::collection::vec(inner.clone(), 1..3).prop_map(Contract::product),
            (prop::collection::vec(inner.clone(), 0..3), inner)
                .prop_map(|(params, ret)| Contract::function(params, ret)),
        ]
    })
}

proptest! {
    #[test]
    fn prop_relationship_is_reflexive(a in contract()) {
        prop_assert_eq!(relationship(&a, &a), Relationship::Same);
    }

    #[test]
    fn prop_super_contains_everything(a in contract()) {
        prop_assert!(relationship(&Contract::Super, &a).is_superset_or_same());
        prop_assert!(relationship(&a, &Contract::Super).is_subset_or_same());
    }

    #[test]
    fn prop_void_below_everything(a in contract()) {
        prop_assume!(!a.is_void());
        prop_assert_eq!(relationship(&Contract::VOID, &a), Relationship::Subset);
    }

    #[test]
    fn prop_relationship_is_antisymmetric(a in contract(), b in contract()) {
        prop_assert_eq!(relationship(&b, &a), relationship(&a, &b).inverse());
    }

    #[test]
    fn prop_composite_union_covers_both(a in composite(), b in composite()) {
        let joined = union(&a, &b);
        prop_assert!(relationship(&joined, &a).is_superset_or_same());
        prop_assert!(relationship(&joined, &b).is_superset_or_same());
    }

    #[test]
    fn prop_intersection_is_below_both(a in composite(), b in composite()) {
        if let Some(met) = intersect(&a, &b) {
            prop_assert!(relationship(&met, &a).is_subset_or_same());
            prop_assert!(relationship(&met, &b).is_subset_or_same());
        }
    }

    #[test]
    fn prop_checked_add_matches_host(x in any::<i64>(), y in any::<i64>()) {
        let result = binary_op(BinOp::Add, Value::Integer(x), Value::Integer(y), ArithmeticMode::Checked);
        match x.checked_add(y) {
            Some(sum) => prop_assert_eq!(result.unwrap(), Value::Integer(sum)),
            None => prop_assert!(matches!(result, Err(ref e) if matches!(e.kind, ErrorKind::Overflow))),
        }
    }

    #[test]
    fn prop_unchecked_add_wraps(x in any::<i64>(), y in any::<i64>()) {
        let result = binary_op(BinOp::Add, Value::Integer(x), Value::Integer(y), ArithmeticMode::Unchecked);
        prop_assert_eq!(result.unwrap(), Value::Integer(x.wrapping_add(y)));
    }

    #[test]
    fn prop_real_to_integer_truncates(x in -1.0e15f64..1.0e15) {
        let converted = convert(&Value::Real(x), &Contract::INTEGER, ArithmeticMode::Checked).unwrap();
        prop_assert_eq!(converted, Value::Integer(x.trunc() as i64));
    }
}
