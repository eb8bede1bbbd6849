// Permutations are stored in one-line notation: the element at position
// `i` lands at position `p[i]`. Cycles use the convention that the
// member at `cycle[i]` moves to `cycle[(i + 1) % len]`'s former position,
// i.e. expanding a cycle writes `result[cycle[(i + 1) % len]] = cycle[i]`.

/// A bijection over `{0..n}` in one-line form.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Permutation {
    images: Vec<usize>,
}

impl Permutation {
    pub fn identity(size: usize) -> Self {
        Permutation {
            images: (0..size).collect(),
        }
    }

    pub fn new(images: Vec<usize>) -> Self {
        let mut seen = vec![false; images.len()];
        for &img in &images {
            assert!(img < images.len() && !seen[img], "not a bijection");
            seen[img] = true;
        }
        Permutation { images }
    }

    pub fn size(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[usize] {
        &self.images
    }

    pub fn is_identity(&self) -> bool {
        self.images.iter().enumerate().all(|(i, &img)| i == img)
    }

    pub fn fixed_points(&self) -> usize {
        self.images
            .iter()
            .enumerate()
            .filter(|(i, &img)| *i == img)
            .count()
    }

    /// Apply to a sequence: element at `i` lands at `p[i]`.
    pub fn apply<T: Clone>(&self, values: &[T]) -> Vec<T> {
        assert!(values.len() == self.images.len());
        let mut result = values.to_vec();
        for (i, &img) in self.images.iter().enumerate() {
            result[img] = values[i].clone();
        }
        result
    }

    pub fn inverse(&self) -> Permutation {
        let mut images = vec![0; self.images.len()];
        for (i, &img) in self.images.iter().enumerate() {
            images[img] = i;
        }
        Permutation { images }
    }

    /// Decompose into disjoint cycles; the identity decomposes to none.
    pub fn cycles(&self) -> Vec<PermutationCycle> {
        let mut result = Vec::new();
        let mut seen = vec![false; self.images.len()];
        let inverse = self.inverse();
        // Walk each unseen non-fixed element's cycle through the inverse,
        // which yields members in the order the expansion convention wants.
        for start in 0..self.images.len() {
            if seen[start] || self.images[start] == start {
                continue;
            }
            let mut cycle = Vec::new();
            let mut at = start;
            loop {
                seen[at] = true;
                cycle.push(at);
                at = inverse.images[at];
                if at == start {
                    break;
                }
            }
            result.push(PermutationCycle::new(self.images.len(), cycle));
        }
        result.reverse();
        result
    }
}

/// Apply `first`, then `then`.
pub fn compose(first: &Permutation, then: &Permutation) -> Permutation {
    assert!(first.size() == then.size());
    Permutation {
        images: first.images.iter().map(|&img| then.images[img]).collect(),
    }
}

/// Compose a sequence applied in order: `perms[0]` first.
pub fn compose_all(perms: &[Permutation]) -> Permutation {
    assert!(!perms.is_empty());
    perms[1..]
        .iter()
        .fold(perms[0].clone(), |acc, p| compose(&acc, p))
}

/// One cycle of a permutation of a given size; members are unique.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PermutationCycle {
    permutation_size: usize,
    cycle: Vec<usize>,
}

impl PermutationCycle {
    pub fn new(permutation_size: usize, cycle: Vec<usize>) -> Self {
        let mut seen = vec![false; permutation_size];
        for &member in &cycle {
            assert!(member < permutation_size && !seen[member]);
            seen[member] = true;
        }
        PermutationCycle {
            permutation_size,
            cycle,
        }
    }

    pub fn len(&self) -> usize {
        self.cycle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycle.is_empty()
    }

    pub fn members(&self) -> &[usize] {
        &self.cycle
    }

    pub fn permutation_size(&self) -> usize {
        self.permutation_size
    }

    pub fn to_permutation(&self) -> Permutation {
        let mut images: Vec<usize> = (0..self.permutation_size).collect();
        let len = self.cycle.len();
        for i in 0..len {
            images[self.cycle[(i + 1) % len]] = self.cycle[i];
        }
        Permutation::new(images)
    }

    /// Split at `breakpoint` into a prefix and a suffix cycle sharing the
    /// boundary element, whose in-order composition equals this cycle.
    pub fn break_up(&self, breakpoint: usize) -> (PermutationCycle, PermutationCycle) {
        assert!(breakpoint > 1 && breakpoint < self.cycle.len());
        let first = self.cycle[..breakpoint].to_vec();
        let second = self.cycle[breakpoint - 1..].to_vec();
        (
            PermutationCycle::new(self.permutation_size, first),
            PermutationCycle::new(self.permutation_size, second),
        )
    }
}

/// Split `perm` into permutations each moving at most `max_moved`
/// positions, composing (applied in order) back to `perm`. Greedy: pack
/// whole cycles while they fit, break the cycle at the budget boundary
/// otherwise and push the suffix back for the next round.
pub fn break_up(perm: &Permutation, max_moved: usize) -> Vec<Permutation> {
    assert!(max_moved >= 2);
    // cycles() leaves the first-found cycle at the back; consume from there.
    let mut cycles = perm.cycles();
    let mut result = Vec::new();
    while !cycles.is_empty() {
        let mut current = Permutation::identity(perm.size());
        let mut remaining = max_moved;
        while remaining > 1 {
            let Some(cycle) = cycles.pop() else { break };
            if remaining >= cycle.len() {
                remaining -= cycle.len();
                current = compose(&current, &cycle.to_permutation());
            } else {
                let (head, tail) = cycle.break_up(remaining);
                cycles.push(tail);
                current = compose(&current, &head.to_permutation());
                remaining = 0;
            }
        }
        result.push(current);
    }
    result
}
