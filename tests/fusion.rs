//! Fusion laws: each fused operation must be value-identical to its
//! unfused composition, successes and failures alike.

use bramble::{BTree, DistTree, LinearTree, SkeletonError, ThreadGroup};
use test_case::test_case;

use test_helpers::*;

fn shapes() -> Vec<BTree<i64>> {
    vec![
        BTree::leaf(1),
        BTree::node(3, BTree::node(4, BTree::leaf(2), BTree::leaf(6)), BTree::leaf(2)),
        sample_tree(),
        chain_tree(6),
    ]
}

#[test_case(1, 2 ; "solo")]
#[test_case(3, 1 ; "three members")]
fn test_map_then_reduce_fusion_law(members: usize, granularity: usize) {
    for tree in shapes() {
        let results = ThreadGroup::run(members, |group| {
            let dist = DistTree::from_tree(&group, &tree, granularity);
            let unfused = dist
                .map(&|v| v + 1, &|v| v - 1)
                .reduce(&max_ops())
                .unwrap();
            let fused = dist
                .map_then_reduce(&|v| v + 1, &|v| v - 1, &max_ops())
                .unwrap();
            (unfused, fused)
        });
        for (unfused, fused) in results {
            assert_eq!(unfused, fused);
        }
    }
}

#[test_case(1, 2 ; "solo")]
#[test_case(3, 1 ; "three members")]
fn test_zip_then_reduce_fusion_law(members: usize, granularity: usize) {
    for tree in shapes() {
        let other = tree.map(&|v| v * 2, &|v| v + 3);
        let pair_max = bramble::ReduceFns::new(
            |p: &(i64, i64)| p.0.max(p.1),
            |l: i64, p: &(i64, i64), r: i64| l.max(p.0.max(p.1)).max(r),
        );
        let results = ThreadGroup::run(members, |group| {
            let da = DistTree::from_tree(&group, &tree, granularity);
            let db = DistTree::from_tree(&group, &other, granularity);
            let unfused = da.zip(&db).unwrap().reduce(&pair_max).unwrap();
            let fused = da.zip_then_reduce(&db, &pair_max).unwrap();
            (unfused, fused)
        });
        for (unfused, fused) in results {
            assert_eq!(unfused, fused);
        }
    }
}

#[test_case(1, 3 ; "solo")]
#[test_case(3, 1 ; "three members")]
fn test_map2_then_reduce_fusion_law(members: usize, granularity: usize) {
    for tree in shapes() {
        let other = tree.map(&|v| v - 7, &|v| v + 7);
        let results = ThreadGroup::run(members, |group| {
            let da = DistTree::from_tree(&group, &tree, granularity);
            let db = DistTree::from_tree(&group, &other, granularity);
            let unfused = da
                .map2(&|x, y| x + y, &|x, y| x + y, &db)
                .unwrap()
                .reduce(&sum_ops())
                .unwrap();
            let fused = da
                .map2_then_reduce(&|x, y| x + y, &|x, y| x + y, &db, &sum_ops())
                .unwrap();
            (unfused, fused)
        });
        for (unfused, fused) in results {
            assert_eq!(unfused, fused);
        }
    }
}

#[test]
fn test_fused_reduce_fails_like_unfused_on_empty_trees() {
    let results = ThreadGroup::run(2, |group| {
        let dist: DistTree<i64, _> = DistTree::from_linear(&group, &LinearTree::new(vec![]));
        let unfused = dist.map(&|v| v + 1, &|v| v + 1).reduce(&sum_ops());
        let fused = dist.map_then_reduce(&|v| v + 1, &|v| v + 1, &sum_ops());
        (unfused, fused)
    });
    for (unfused, fused) in results {
        assert_eq!(unfused, Err(SkeletonError::EmptyTree));
        assert_eq!(fused, Err(SkeletonError::EmptyTree));
    }
}

#[test]
fn test_fused_zip_reduce_fails_like_unfused_on_shape_mismatch() {
    let leaf = BTree::leaf(1);
    let node = BTree::node(4, BTree::leaf(5), BTree::leaf(6));
    let pair_sum = bramble::ReduceFns::new(
        |p: &(i64, i64)| p.0 + p.1,
        |l: i64, p: &(i64, i64), r: i64| l + p.0 + p.1 + r,
    );
    let results = ThreadGroup::run(2, |group| {
        let dl = DistTree::from_tree(&group, &leaf, 1);
        let dn = DistTree::from_tree(&group, &node, 1);
        dl.zip_then_reduce(&dn, &pair_sum)
    });
    for result in results {
        assert!(matches!(result, Err(SkeletonError::ShapeMismatch(_))));
    }
}
