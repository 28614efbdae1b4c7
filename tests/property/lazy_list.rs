//! `LazyList` against `BTreeSet`.

use std::collections::BTreeSet;

use proptest::prelude::*;
use reservation_sim::stdx::{ContainerError, LazyList};

#[derive(Clone, Debug)]
enum Op {
    Insert(i64),
    DeleteMin,
    Remove(i64),
    Contains(i64),
}

/// Small key range so duplicates and hits are common.
fn key() -> impl Strategy<Value = i64> {
    -20i64..20
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => key().prop_map(Op::Insert),
        2 => Just(Op::DeleteMin),
        1 => key().prop_map(Op::Remove),
        1 => key().prop_map(Op::Contains),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(crate::proptest_cases(256)))]

    #[test]
    fn matches_btreeset_model(ops in proptest::collection::vec(op_strategy(), 0..300)) {
        let list = LazyList::new().unwrap();
        let mut model = BTreeSet::new();

        for op in ops {
            match op {
                Op::Insert(key) => {
                    if model.insert(key) {
                        prop_assert_eq!(list.insert(key), Ok(()));
                    } else {
                        prop_assert_eq!(list.insert(key), Err(ContainerError::Duplicate { key }));
                    }
                }
                Op::DeleteMin => match model.pop_first() {
                    Some(expected) => prop_assert_eq!(list.delete_min(), Ok(expected)),
                    None => prop_assert_eq!(list.delete_min(), Err(ContainerError::Empty)),
                },
                Op::Remove(key) => {
                    let expected = model.remove(&key).then_some(key);
                    prop_assert_eq!(list.remove(key), expected);
                }
                Op::Contains(key) => {
                    prop_assert_eq!(list.contains(key), model.contains(&key));
                }
            }
            prop_assert_eq!(list.len(), model.len());
            prop_assert_eq!(list.is_empty(), model.is_empty());
        }

        prop_assert!(list.check_sorted());
        prop_assert_eq!(list.keys(), model.iter().copied().collect::<Vec<_>>());
    }
}
