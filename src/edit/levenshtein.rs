//! Levenshtein edit distance algorithm.
//!
//! The numeric primitive under every fuzzy decision in the engine. Cost is
//! O(n*m) time and O(min(n, m)) space per pair; callers bound input size.

/// Compute the Levenshtein edit distance between two strings.
///
/// Returns the minimum number of single-character edits (insertions,
/// deletions, substitutions) required to transform `a` into `b`. Counts are
/// in `char`s, not bytes.
pub fn distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    // Rows span the shorter string.
    let (outer, inner) = if a_chars.len() >= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };
    let m = outer.len();
    let n = inner.len();

    if n == 0 {
        return m;
    }

    // Two rows, swapped every outer iteration.
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(outer[i - 1] != inner[j - 1]);
            curr[j] = (prev[j] + 1) // deletion
                .min(curr[j - 1] + 1) // insertion
                .min(prev[j - 1] + cost); // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Compute similarity ratio between two strings (0.0 = completely different,
/// 1.0 = identical).
///
/// `1 - distance / max(len)`, clamped to `[0, 1]`. Two empty strings are
/// identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let dist = distance(a, b);
    (1.0 - dist as f64 / max_len as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        for s in ["", "hello", "fn main() {}", "ünïcödé"] {
            assert_eq!(distance(s, s), 0);
            assert!((similarity(s, s) - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_empty() {
        assert_eq!(distance("", "abc"), 3);
        assert_eq!(distance("abc", ""), 3);
        assert_eq!(distance("", ""), 0);
        assert!((similarity("", "") - 1.0).abs() < f64::EPSILON);
        assert!(similarity("", "abc").abs() < f64::EPSILON);
    }

    #[test]
    fn test_single_edit() {
        assert_eq!(distance("kitten", "sitten"), 1); // substitution
        assert_eq!(distance("cat", "cats"), 1); // insertion
        assert_eq!(distance("cats", "cat"), 1); // deletion
    }

    #[test]
    fn test_classic() {
        assert_eq!(distance("kitten", "sitting"), 3);
        assert_eq!(distance("sitting", "kitten"), 3);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        assert_eq!(distance("café", "cafe"), 1);
        assert!((similarity("café", "cafe") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            ("let x = 1;", "let y = 2;"),
            ("short", "a much longer string"),
            ("", "abc"),
            ("return value", "return  value;"),
        ];
        for (a, b) in pairs {
            assert_eq!(distance(a, b), distance(b, a));
            assert!((similarity(a, b) - similarity(b, a)).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_similarity_range() {
        let s = similarity("hello", "world");
        assert!((0.0..=1.0).contains(&s));
        assert!((similarity("abc", "xyz")).abs() < f64::EPSILON);
    }
}
