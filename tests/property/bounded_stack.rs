//! `BoundedStack` against a capacity-limited `Vec`.

use proptest::prelude::*;
use reservation_sim::stdx::{BoundedStack, ContainerError};

#[derive(Clone, Debug)]
enum Op {
    Push(u32),
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![3 => any::<u32>().prop_map(Op::Push), 2 => Just(Op::Pop)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(crate::proptest_cases(256)))]

    #[test]
    fn matches_vec_model(
        capacity in 0usize..16,
        ops in proptest::collection::vec(op_strategy(), 0..200),
    ) {
        let stack = BoundedStack::with_capacity(capacity).unwrap();
        let mut model: Vec<u32> = Vec::new();

        for op in ops {
            match op {
                Op::Push(value) => {
                    let pushed = stack.try_push(value);
                    if model.len() < capacity {
                        prop_assert_eq!(pushed, Ok(()));
                        model.push(value);
                    } else {
                        prop_assert_eq!(pushed, Err(value));
                    }
                }
                Op::Pop => match model.pop() {
                    Some(expected) => prop_assert_eq!(stack.pop(), Ok(expected)),
                    None => prop_assert_eq!(stack.pop(), Err(ContainerError::Empty)),
                },
            }
            prop_assert_eq!(stack.len(), model.len());
            prop_assert_eq!(stack.is_full(), model.len() == capacity);
            prop_assert!(!stack.has_overflowed());
        }

        let top_first: Vec<u32> = model.iter().rev().copied().collect();
        prop_assert_eq!(stack.snapshot(), top_first);
    }
}
