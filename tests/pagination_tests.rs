#[cfg(test)]
mod tests {
    use mql_lang::ast::{BasicFileQuery, merge_skip_limit};

    // ========================================================================
    // The merge formula
    // ========================================================================

    #[test]
    fn test_merge_with_no_existing_limit() {
        assert_eq!(merge_skip_limit(0, None, 5, Some(10)), (5, Some(10)));
        assert_eq!(merge_skip_limit(3, None, 2, None), (5, None));
    }

    #[test]
    fn test_merge_shrinks_existing_window() {
        // skip eats into the existing window
        assert_eq!(merge_skip_limit(5, Some(10), 3, None), (8, Some(7)));
        // and the new limit caps what remains
        assert_eq!(merge_skip_limit(5, Some(10), 3, Some(4)), (8, Some(4)));
        assert_eq!(merge_skip_limit(5, Some(10), 3, Some(100)), (8, Some(7)));
    }

    #[test]
    fn test_merge_floors_at_zero() {
        assert_eq!(merge_skip_limit(0, Some(2), 5, None), (5, Some(0)));
        assert_eq!(merge_skip_limit(5, Some(3), 4, Some(2)), (9, Some(0)));
    }

    #[test]
    fn test_merge_boundaries() {
        // skip exactly the window size
        assert_eq!(merge_skip_limit(0, Some(5), 5, None), (5, Some(0)));
        // skip one less
        assert_eq!(merge_skip_limit(0, Some(5), 4, None), (4, Some(1)));
        // zero-size new limit wins
        assert_eq!(merge_skip_limit(0, Some(5), 0, Some(0)), (0, Some(0)));
    }

    // ========================================================================
    // Associativity
    // ========================================================================

    fn compose(
        first: (usize, Option<usize>),
        second: (usize, Option<usize>),
    ) -> (usize, Option<usize>) {
        merge_skip_limit(first.0, first.1, second.0, second.1)
    }

    #[test]
    fn test_composition_is_associative() {
        let skips = [0usize, 1, 2, 3];
        let limits = [None, Some(0usize), Some(1), Some(2), Some(4)];
        for &s0 in &skips {
            for &l0 in &limits {
                for &s1 in &skips {
                    for &l1 in &limits {
                        for &s2 in &skips {
                            for &l2 in &limits {
                                let p0 = (s0, l0);
                                let p1 = (s1, l1);
                                let p2 = (s2, l2);
                                assert_eq!(
                                    compose(compose(p0, p1), p2),
                                    compose(p0, compose(p1, p2)),
                                    "diverged for {:?} {:?} {:?}",
                                    p0,
                                    p1,
                                    p2
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_selector_accumulates_like_the_formula() {
        let mut query = BasicFileQuery::new(None);
        query.add_skip_limit(2, Some(10));
        query.add_skip_limit(3, Some(4));
        let direct = compose(compose((0, None), (2, Some(10))), (3, Some(4)));
        assert_eq!((query.skip, query.limit), direct);
        assert_eq!((query.skip, query.limit), (5, Some(4)));
    }

    #[test]
    fn test_sequential_application_mirrors_streams() {
        // skip 2 take 10, then skip 3 take 4 over 0..20 == merged pair applied once
        let data: Vec<usize> = (0..20).collect();
        let two_pass: Vec<usize> = data
            .iter()
            .copied()
            .skip(2)
            .take(10)
            .skip(3)
            .take(4)
            .collect();
        let (skip, limit) = compose(compose((0, None), (2, Some(10))), (3, Some(4)));
        let one_pass: Vec<usize> = data
            .iter()
            .copied()
            .skip(skip)
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        assert_eq!(two_pass, one_pass);
    }
}
