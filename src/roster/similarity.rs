//! String similarity used by the fuzzy name path

/// A similarity function between two normalized names
///
/// Implementations return a score in `[0.0, 1.0]` where `1.0` means identical.
pub trait Similarity: Send + Sync {
    /// Score the similarity of `a` and `b`
    fn score(&self, a: &str, b: &str) -> f64;

    /// Short identifier for logs
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Ratcliff/Obershelp "gestalt" ratio
///
/// `2 * M / T` where `M` is the number of characters in the recursively found
/// longest common blocks and `T` the total length of both strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceRatio;

impl Similarity for SequenceRatio {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();

        let total = a.len() + b.len();
        if total == 0 {
            return 1.0;
        }

        let matched = matching_chars(&a, &b);
        2.0 * matched as f64 / total as f64
    }

    fn name(&self) -> &'static str {
        "sequence-ratio"
    }
}

/// Sum of the sizes of all matching blocks
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common block in `a[alo..ahi]` and `b[blo..bhi]`
///
/// Ties resolve to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // run[j + 1] = length of the common run ending at a[i], b[j]
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            cur[j + 1] = if a[i] == b[j] { prev[j] + 1 } else { 0 };
            let size = cur[j + 1];
            if size > best_size {
                best_i = i + 1 - size;
                best_j = j + 1 - size;
                best_size = size;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
        cur.iter_mut().for_each(|v| *v = 0);
    }

    (best_i, best_j, best_size)
}
