//! Round-robin order allocation.

/// Deal `items` to `drivers` buckets: item `i` goes to bucket `i % drivers`.
///
/// Each bucket keeps the relative input order. Returns an empty vector when
/// `drivers` is zero.
pub fn assign_round_robin<T>(items: &[T], drivers: usize) -> Vec<Vec<&T>> {
    let mut buckets: Vec<Vec<&T>> = (0..drivers)
        .map(|_| Vec::with_capacity(items.len() / drivers.max(1) + 1))
        .collect();
    if drivers == 0 {
        return buckets;
    }
    for (i, item) in items.iter().enumerate() {
        buckets[i % drivers].push(item);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_deals_in_input_order() {
        let items = [10, 11, 12, 13, 14];
        let buckets = assign_round_robin(&items, 2);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0], vec![&10, &12, &14]);
        assert_eq!(buckets[1], vec![&11, &13]);
    }

    #[test]
    fn test_more_drivers_than_orders() {
        let items = ["a", "b"];
        let buckets = assign_round_robin(&items, 4);
        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[0], vec![&"a"]);
        assert_eq!(buckets[1], vec![&"b"]);
        assert!(buckets[2].is_empty());
        assert!(buckets[3].is_empty());
    }

    #[test]
    fn test_zero_drivers() {
        let items = [1, 2, 3];
        assert!(assign_round_robin(&items, 0).is_empty());
    }

    proptest! {
        #[test]
        fn prop_index_mod_n(len in 0usize..200, n in 1usize..20) {
            let items: Vec<usize> = (0..len).collect();
            let buckets = assign_round_robin(&items, n);
            for (driver, bucket) in buckets.iter().enumerate() {
                for (pos, &&i) in bucket.iter().enumerate() {
                    prop_assert_eq!(i % n, driver);
                    prop_assert_eq!(i, driver + pos * n);
                }
            }
        }

        #[test]
        fn prop_balanced_partition(len in 0usize..200, n in 1usize..20) {
            let items: Vec<usize> = (0..len).collect();
            let buckets = assign_round_robin(&items, n);
            let total: usize = buckets.iter().map(Vec::len).sum();
            prop_assert_eq!(total, len);
            for bucket in &buckets {
                prop_assert!(bucket.len() == len / n || bucket.len() == len.div_ceil(n));
            }
        }
    }
}
