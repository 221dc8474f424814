/// Load state of one cached entity set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    /// Carries an optimistic patch not yet confirmed by a read.
    Stale,
}

/// What happened to a fetch result once it reached the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A newer result was applied already.
    Outdated,
    /// Issued before the latest optimistic patch, so it cannot see it.
    PrecedesPatch,
    /// Reports an earlier round than the history already held.
    Regressed,
    /// The fetch failed and the cached value was kept.
    Absorbed,
}

/// A cached value with the sequence numbers that decide whether an incoming
/// fetch may replace it.
#[derive(Clone, Debug, Default)]
pub struct Tracked<V> {
    phase: Phase,
    value: V,
    applied_seq: u64,
    patch_seq: u64,
}

impl<V> Tracked<V> {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn applied_seq(&self) -> u64 {
        self.applied_seq
    }

    pub fn patch_seq(&self) -> u64 {
        self.patch_seq
    }

    pub fn has_value(&self) -> bool {
        matches!(self.phase, Phase::Loaded | Phase::Stale)
    }

    /// Full replace, unless the result is older than what is held.
    pub fn accept(&mut self, seq: u64, value: V) -> FetchOutcome {
        if seq <= self.applied_seq {
            return FetchOutcome::Outdated;
        }
        if seq < self.patch_seq {
            return FetchOutcome::PrecedesPatch;
        }
        self.value = value;
        self.applied_seq = seq;
        self.phase = Phase::Loaded;
        FetchOutcome::Applied
    }

    /// Applies `edit` provisionally. Sets with nothing loaded are left
    /// alone; the reconciling fetch fills them.
    pub fn patch(&mut self, seq: u64, edit: impl FnOnce(&mut V)) -> bool {
        if !self.has_value() {
            return false;
        }
        edit(&mut self.value);
        self.patch_seq = self.patch_seq.max(seq);
        self.phase = Phase::Stale;
        true
    }
}

/// Phase bookkeeping shared by every tracked set regardless of value type.
pub trait LoadTracking {
    fn phase(&self) -> Phase;
    fn begin_load(&mut self);
    fn fetch_failed(&mut self);
}

impl<V> LoadTracking for Tracked<V> {
    fn phase(&self) -> Phase {
        self.phase
    }

    fn begin_load(&mut self) {
        if self.phase == Phase::Unloaded {
            self.phase = Phase::Loading;
        }
    }

    fn fetch_failed(&mut self) {
        if self.phase == Phase::Loading {
            self.phase = Phase::Unloaded;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn accept__walks_unloaded_loading_loaded() {
        // given
        let mut tracked: Tracked<u64> = Tracked::default();
        assert_eq!(tracked.phase(), Phase::Unloaded);

        // when
        tracked.begin_load();
        let loading = tracked.phase();
        let outcome = tracked.accept(1, 50);

        // then
        assert_eq!(loading, Phase::Loading);
        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(tracked.phase(), Phase::Loaded);
        assert_eq!(*tracked.value(), 50);
    }

    #[test]
    fn accept__ignores_older_results() {
        let mut tracked: Tracked<u64> = Tracked::default();
        tracked.accept(5, 1);
        assert_eq!(tracked.accept(4, 2), FetchOutcome::Outdated);
        assert_eq!(tracked.accept(5, 2), FetchOutcome::Outdated);
        assert_eq!(*tracked.value(), 1);
    }

    #[test]
    fn accept__result_issued_before_patch_cannot_erase_it() {
        // given
        let mut tracked: Tracked<u64> = Tracked::default();
        tracked.accept(1, 50);
        tracked.patch(3, |energy| *energy -= 10);

        // when
        let early = tracked.accept(2, 50);

        // then
        assert_eq!(early, FetchOutcome::PrecedesPatch);
        assert_eq!(*tracked.value(), 40);
        assert_eq!(tracked.phase(), Phase::Stale);
    }

    #[test]
    fn accept__result_issued_after_patch_replaces_it() {
        // given
        let mut tracked: Tracked<u64> = Tracked::default();
        tracked.accept(1, 50);
        tracked.patch(2, |energy| *energy -= 10);

        // when
        let outcome = tracked.accept(3, 47);

        // then
        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(*tracked.value(), 47);
        assert_eq!(tracked.phase(), Phase::Loaded);
    }

    #[test]
    fn patch__skips_unloaded_sets() {
        let mut tracked: Tracked<u64> = Tracked::default();
        assert!(!tracked.patch(1, |v| *v = 9));
        assert_eq!(tracked.patch_seq(), 0);
        assert_eq!(tracked.phase(), Phase::Unloaded);
    }

    #[test]
    fn fetch_failed__keeps_cached_value() {
        // given
        let mut tracked: Tracked<u64> = Tracked::default();
        tracked.accept(1, 7);

        // when
        tracked.begin_load();
        tracked.fetch_failed();

        // then
        assert_eq!(tracked.phase(), Phase::Loaded);
        assert_eq!(*tracked.value(), 7);
    }
}
