//! Longest increasing subsequence.
//!
//! Used by the keyed diff to find the children that can stay where they are.
//! The input holds `old index + 1` for each new position, with `0` meaning
//! "newly created"; zeros are skipped.
//!
//! Runs in O(n log n): `tails` keeps, for every length, the index of the
//! smallest value ending an increasing run of that length, found by binary
//! search. `prev` links each index to its predecessor so the run can be
//! rebuilt backwards from the last tail.

/// Indices into `values` of a longest strictly increasing subsequence,
/// ignoring zeros. Returned in ascending order.
pub fn get_sequence(values: &[usize]) -> Vec<usize> {
    let mut prev = vec![usize::MAX; values.len()];
    let mut tails: Vec<usize> = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        if value == 0 {
            continue;
        }
        let pos = tails.partition_point(|&t| values[t] < value);
        if pos > 0 {
            prev[i] = tails[pos - 1];
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut result = vec![0; tails.len()];
    let mut cursor = tails.last().copied();
    for slot in result.iter_mut().rev() {
        let Some(index) = cursor else { break };
        *slot = index;
        cursor = match prev[index] {
            usize::MAX => None,
            p => Some(p),
        };
    }
    result
}
