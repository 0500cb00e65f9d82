use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source paths currently owned by a processing unit.
///
/// A file usually produces several watch events (create, writes, close);
/// only the first unit to claim the path processes it.
#[derive(Debug, Default)]
pub struct InFlight {
    paths: Mutex<HashSet<PathBuf>>,
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim `path`, or `None` if another unit already holds it.
    pub fn try_claim(self: &Arc<Self>, path: &Path) -> Option<InFlightGuard> {
        let inserted = self.paths.lock().insert(path.to_path_buf());
        inserted.then(|| InFlightGuard {
            owner: Arc::clone(self),
            path: path.to_path_buf(),
        })
    }

    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().is_empty()
    }
}

/// Releases the claim when dropped, whatever the outcome.
#[derive(Debug)]
pub struct InFlightGuard {
    owner: Arc<InFlight>,
    path: PathBuf,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.owner.paths.lock().remove(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_rejected_until_release() {
        let in_flight = InFlight::new();
        let path = Path::new("/in/d/s/img1.jpg");

        let guard = in_flight.try_claim(path).unwrap();
        assert!(in_flight.try_claim(path).is_none());
        assert_eq!(in_flight.len(), 1);

        drop(guard);
        assert!(in_flight.is_empty());
        assert!(in_flight.try_claim(path).is_some());
    }

    #[test]
    fn test_distinct_paths_independent() {
        let in_flight = InFlight::new();
        let _a = in_flight.try_claim(Path::new("/in/d/s/a.jpg")).unwrap();
        let _b = in_flight.try_claim(Path::new("/in/d/s/b.jpg")).unwrap();
        assert_eq!(in_flight.len(), 2);
    }
}
