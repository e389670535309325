//! Randomized equivalence properties: for arbitrary trees and
//! granularities, the distributed skeletons agree with the sequential
//! reference on every group member.

use bramble::{BTree, DistTree, LinearTree, ThreadGroup};
use proptest::prelude::*;

use test_helpers::*;

fn arb_tree() -> impl Strategy<Value = BTree<i64>> {
    let leaf = any::<i8>().prop_map(|v| BTree::leaf(v as i64));
    leaf.prop_recursive(5, 31, 2, |inner| {
        (any::<i8>(), inner.clone(), inner)
            .prop_map(|(v, l, r)| BTree::node(v as i64, l, r))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_linearization_roundtrips(tree in arb_tree(), granularity in 1usize..6) {
        let linear = LinearTree::from_tree(&tree, granularity);
        prop_assert!(linear.check().is_ok());
        prop_assert_eq!(linear.to_tree().unwrap(), tree);
    }

    #[test]
    fn prop_skeletons_match_sequential(tree in arb_tree(), granularity in 1usize..6) {
        let linear = LinearTree::from_tree(&tree, granularity);
        let members = linear.segment_count();

        let expected_total = tree.reduce(&seq_sum);
        let expected_up = tree.upward_accumulate(&seq_sum);
        let expected_down = tree.downward_accumulate(&add_steps(), 0);
        let expected_map = tree.map(&|v| v * 2, &|v| v - 1);

        let results = ThreadGroup::run(members, |group| {
            let dist = DistTree::from_linear(&group, &linear);
            let total = dist.reduce(&sum_ops()).unwrap();
            let up = dist.upward_accumulate(&sum_ops()).unwrap().to_tree().unwrap();
            let down = dist
                .downward_accumulate(&add_steps(), 0)
                .unwrap()
                .to_tree()
                .unwrap();
            let mapped = dist.map(&|v| v * 2, &|v| v - 1).to_tree().unwrap();
            (total, up, down, mapped)
        });

        for (total, up, down, mapped) in results {
            prop_assert_eq!(total, expected_total);
            prop_assert_eq!(&up, &expected_up);
            prop_assert_eq!(&down, &expected_down);
            prop_assert_eq!(&mapped, &expected_map);
        }
    }

    #[test]
    fn prop_fusions_change_nothing(tree in arb_tree(), granularity in 1usize..5) {
        let linear = LinearTree::from_tree(&tree, granularity);
        let members = linear.segment_count();

        let results = ThreadGroup::run(members, |group| {
            let dist = DistTree::from_linear(&group, &linear);
            let unfused = dist.map(&|v| v + 1, &|v| v - 1).reduce(&max_ops()).unwrap();
            let fused = dist
                .map_then_reduce(&|v| v + 1, &|v| v - 1, &max_ops())
                .unwrap();
            (unfused, fused)
        });
        for (unfused, fused) in results {
            prop_assert_eq!(unfused, fused);
        }
    }
}
