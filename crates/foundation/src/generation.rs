/// Monotonic selection generation.
///
/// Every selection change bumps the generation; asynchronous work captures the
/// generation it was started under and its result is only applied while that
/// generation is still current.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub const INITIAL: Self = Self(0);

    pub fn get(&self) -> u64 {
        self.0
    }

    /// Advances in place and returns the new value.
    pub fn bump(&mut self) -> Self {
        self.0 = self.0.wrapping_add(1);
        *self
    }

    pub fn is_current(&self, current: Generation) -> bool {
        *self == current
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Generation;

    #[test]
    fn bump_supersedes_previous() {
        let mut g = Generation::INITIAL;
        let first = g.bump();
        let second = g.bump();
        assert!(!first.is_current(g));
        assert!(second.is_current(g));
        assert_eq!(second.get(), 2);
    }
}
