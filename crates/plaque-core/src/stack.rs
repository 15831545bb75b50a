//! Native stack accounting for recursive walks over user input.

/// Bytes of stack a walk may use below the point it started from.
pub const STACK_BUDGET: usize = 1 << 20;

/// Approximate address of the caller's stack frame.
#[inline(never)]
fn stack_address() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

/// Where a recursive walk started.
#[derive(Debug, Clone, Copy)]
pub struct StackMark {
    base: usize,
}

impl StackMark {
    pub fn here() -> Self {
        Self {
            base: stack_address(),
        }
    }

    /// Whether the walk has used up its budget since the mark was taken.
    pub fn exhausted(&self) -> bool {
        stack_address().abs_diff(self.base) > STACK_BUDGET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descend(mark: &StackMark, levels: usize) -> Option<usize> {
        let padding = std::hint::black_box([0u8; 4096]);
        if mark.exhausted() {
            return Some(levels);
        }
        descend(mark, levels + 1).map(|n| n + usize::from(padding[0]))
    }

    #[test]
    fn test_budget_is_reached_before_the_stack_runs_out() {
        let mark = StackMark::here();
        assert!(!mark.exhausted());
        let levels = descend(&mark, 0).unwrap();
        assert!(levels >= STACK_BUDGET / (64 * 1024));
        assert!(levels <= STACK_BUDGET / 4096 + 1);
    }
}
