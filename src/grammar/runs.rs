//! Mirror-run highlighting over a finished sequence.
//!
//! A ramp-triple is `0, a, b, c, 0` with `a, b, c` same-signed and
//! magnitudes exactly `1, 2, 3` or `3, 2, 1`. Triples sharing a boundary
//! zero chain into a run when both have the same sign; the ramp direction
//! may flip at the zero. Runs of three or more triples are highlighted.

/// Sign of a ramp-triple's interior, if `window` is one.
fn ramp_sign(window: &[i8]) -> Option<i8> {
    let sign = window.first()?.signum();
    if sign == 0 || window.iter().any(|s| s.signum() != sign) {
        return None;
    }
    let magnitudes: Vec<i8> = window.iter().map(|s| s.abs()).collect();
    (magnitudes == [1, 2, 3] || magnitudes == [3, 2, 1]).then_some(sign)
}

/// Indices to highlight: the elements of every ramp-triple in a run of three
/// or more, plus the zeros between them. The outermost zeros of a run are
/// left out. Indices are ascending.
pub fn find_mirror_runs(seq: &[i8]) -> Vec<usize> {
    // (leading zero index, sign)
    let triples: Vec<(usize, i8)> = (0..seq.len().saturating_sub(4))
        .filter(|&z| seq[z] == 0 && seq[z + 4] == 0)
        .filter_map(|z| ramp_sign(&seq[z + 1..z + 4]).map(|sign| (z, sign)))
        .collect();

    let mut highlighted = Vec::new();
    let mut run: Vec<usize> = Vec::new();
    let mut last: Option<(usize, i8)> = None;

    for &(z, sign) in &triples {
        let linked = last.is_some_and(|(prev_z, prev_sign)| prev_z + 4 == z && prev_sign == sign);
        if !linked {
            flush(&mut run, &mut highlighted);
        }
        run.push(z);
        last = Some((z, sign));
    }
    flush(&mut run, &mut highlighted);

    highlighted
}

fn flush(run: &mut Vec<usize>, highlighted: &mut Vec<usize>) {
    if run.len() >= 3 {
        for (i, &z) in run.iter().enumerate() {
            if i > 0 {
                highlighted.push(z);
            }
            highlighted.extend(z + 1..z + 4);
        }
    }
    run.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_ascending_triples() {
        let seq = [0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3, 0];
        let marked = find_mirror_runs(&seq);
        assert_eq!(marked, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
        assert!(!marked.contains(&0));
        assert!(!marked.contains(&12));
    }

    #[test]
    fn test_two_triples_not_enough() {
        assert!(find_mirror_runs(&[0, 1, 2, 3, 0, 3, 2, 1, 0]).is_empty());
    }

    #[test]
    fn test_sign_change_breaks_run() {
        let seq = [0, 1, 2, 3, 0, -1, -2, -3, 0, 1, 2, 3, 0];
        assert!(find_mirror_runs(&seq).is_empty());
    }

    #[test]
    fn test_mixed_directions_chain() {
        let seq = [0, -3, -2, -1, 0, -1, -2, -3, 0, -3, -2, -1, 0, 1];
        assert_eq!(find_mirror_runs(&seq), (1..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_gap_breaks_run() {
        // zero-separated but not sharing a boundary zero
        let seq = [0, 1, 2, 3, 0, 1, 2, 3, 0, 0, 1, 2, 3, 0, 1, 2, 3, 0];
        assert!(find_mirror_runs(&seq).is_empty());
    }

    #[test]
    fn test_run_after_noise() {
        let mut seq = vec![2, 1, 0];
        seq.extend([1, 2, 3, 0, 1, 2, 3, 0, 3, 2, 1, 0]);
        // leading zero at 2, triples at 2, 6, 10
        assert_eq!(find_mirror_runs(&seq), (3..14).collect::<Vec<_>>());
    }

    #[test]
    fn test_not_a_ramp() {
        assert_eq!(ramp_sign(&[1, 3, 2]), None);
        assert_eq!(ramp_sign(&[1, -2, 3]), None);
        assert_eq!(ramp_sign(&[-3, -2, -1]), Some(-1));
        assert!(find_mirror_runs(&[0, 1, 2]).is_empty());
    }
}
