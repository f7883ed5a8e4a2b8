//! Property-based tests for the square-set algebra and the set store.

use proptest::prelude::*;

use mines_core::solver::{SetStore, SquareSet};

/// Strategy: an arbitrary square set with a 9-bit mask.
fn square_set() -> impl Strategy<Value = SquareSet> {
    (-4..16i32, -4..16i32, 0u16..512).prop_map(|(x, y, mask)| SquareSet::new(x, y, mask))
}

/// Strategy: a non-empty square set.
fn nonempty_square_set() -> impl Strategy<Value = SquareSet> {
    (-4..16i32, -4..16i32, 1u16..512).prop_map(|(x, y, mask)| SquareSet::new(x, y, mask))
}

fn squares_of(set: &SquareSet) -> Vec<(i32, i32)> {
    let mut v: Vec<(i32, i32)> = set.squares().map(|p| (p.x, p.y)).collect();
    v.sort_unstable();
    v
}

proptest! {
    #![proptest_config(ProptestConfig { max_global_rejects: 65536, ..ProptestConfig::default() })]

    // 1. Normalization is idempotent and never changes the set's content.
    #[test]
    fn normalize_idempotent(s in square_set()) {
        let once = s.normalized();
        let twice = once.normalized();
        prop_assert_eq!(once, twice);
        prop_assert_eq!(squares_of(&once), squares_of(&s));
    }

    // Empty sets normalize to themselves.
    #[test]
    fn normalize_empty_is_noop(x in -4..16i32, y in -4..16i32) {
        let s = SquareSet::new(x, y, 0);
        prop_assert_eq!(s.normalized(), s);
    }

    // 2. Re-anchoring there and back keeps exactly the squares that fit the
    //    intermediate window.
    #[test]
    fn reanchor_round_trip(s in square_set(), bx in -6..18i32, by in -6..18i32) {
        let round = s.reanchored(bx, by).reanchored(s.x, s.y);
        prop_assert_eq!((round.x, round.y), (s.x, s.y));

        let expected: Vec<(i32, i32)> = squares_of(&s)
            .into_iter()
            .filter(|&(x, y)| (bx..bx + 3).contains(&x) && (by..by + 3).contains(&y))
            .collect();
        prop_assert_eq!(squares_of(&round), expected);
    }

    // 3. Intersection and difference laws.
    #[test]
    fn intersection_difference_laws(a in square_set(), b in square_set()) {
        let i = a.intersection(&b);
        let d = a.difference(&b);

        // (a ∧ b) ⊆ a, and both parts stay anchored at a.
        prop_assert_eq!(i.mask & !a.mask, 0);
        prop_assert_eq!(d.mask & !a.mask, 0);

        // (a − b) ∧ b = ∅.
        prop_assert!(d.intersection(&b).is_empty());

        // (a − b) ∪ (a ∧ b) = a.
        prop_assert_eq!(d.mask | i.mask, a.mask);
        prop_assert_eq!(d.mask & i.mask, 0);
    }

    // Intersection is symmetric in content (anchors aside).
    #[test]
    fn intersection_symmetric(a in square_set(), b in square_set()) {
        prop_assert_eq!(
            squares_of(&a.intersection(&b)),
            squares_of(&b.intersection(&a))
        );
    }

    // Far-apart anchors cannot overlap.
    #[test]
    fn distant_sets_never_intersect(a in nonempty_square_set(), dx in 3..8i32, dy in 3..8i32) {
        let b = SquareSet::new(a.x + dx, a.y + dy, 0x1ff);
        prop_assert!(a.intersection(&b).is_empty());
    }

    // 4. Two adds that normalize to the same key leave a single element
    //    carrying the first mine count.
    #[test]
    fn store_canonicalizes_equivalent_sets(
        s in nonempty_square_set(),
        dx in 0..3i32,
        dy in 0..3i32,
        m in 0..9i32,
    ) {
        // A representation from a shifted anchor; skip shifts that push
        // squares out of the window.
        let shifted = s.reanchored(s.x - dx, s.y - dy);
        prop_assume!(shifted.count() == s.count());
        let mines = m % (s.count() as i32 + 1);

        let mut ss = SetStore::new();
        ss.add(s.x, s.y, s.mask, mines);
        ss.add(shifted.x, shifted.y, shifted.mask, mines);

        prop_assert_eq!(ss.len(), 1);
        prop_assert_eq!(ss.find(s).unwrap().mines, mines);
        prop_assert_eq!(ss.find(shifted).unwrap().mines, mines);
    }

    // 5. Overlap completeness: any stored set sharing a square with the
    //    query is returned.
    #[test]
    fn overlap_is_complete(
        s1 in nonempty_square_set(),
        dx in -3..4i32,
        dy in -3..4i32,
        mask2 in 1u16..512,
    ) {
        let s2 = SquareSet::new(s1.x + dx, s1.y + dy, mask2);
        prop_assume!(!s1.intersection(&s2).is_empty());

        let mut ss = SetStore::new();
        ss.add(s2.x, s2.y, s2.mask, 0);

        let hits = ss.overlap(s1.x, s1.y, s1.mask);
        prop_assert!(hits.contains(&s2.normalized()));
    }

    // Overlap returns nothing spurious: every hit really shares a square.
    #[test]
    fn overlap_is_sound(
        s1 in nonempty_square_set(),
        dx in -5..6i32,
        dy in -5..6i32,
        mask2 in 1u16..512,
    ) {
        let s2 = SquareSet::new(s1.x + dx, s1.y + dy, mask2);
        let mut ss = SetStore::new();
        ss.add(s2.x, s2.y, s2.mask, 0);

        for hit in ss.overlap(s1.x, s1.y, s1.mask) {
            prop_assert!(!hit.intersection(&s1).is_empty());
        }
    }
}
