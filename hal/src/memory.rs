use crate::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Byte accounting shared between a backend and the buffers it hands out.
#[derive(Debug, Default)]
pub struct MemoryBudget {
    allocated: AtomicUsize,
    peak: AtomicUsize,
    max_size: Option<usize>,
}

impl MemoryBudget {
    pub fn new(max_size: Option<usize>) -> Self {
        Self {
            allocated: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            max_size,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Reserve `size` bytes, failing if the budget would be exceeded.
    pub fn reserve(&self, label: &str, size: usize) -> Result<()> {
        let mut current = self.allocated.load(Ordering::Relaxed);
        loop {
            let next = current.checked_add(size).ok_or_else(|| {
                Error::MemoryError(format!("allocation '{label}' overflows byte count"))
            })?;
            if let Some(max) = self.max_size {
                if next > max {
                    return Err(Error::MemoryError(format!(
                        "allocation '{label}' of {size} bytes exceeds budget ({current} of {max} bytes in use)"
                    )));
                }
            }
            match self.allocated.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.peak.fetch_max(next, Ordering::Relaxed);
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn release(&self, size: usize) {
        self.allocated.fetch_sub(size, Ordering::AcqRel);
    }

    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_and_release() {
        let budget = MemoryBudget::new(Some(128));
        budget.reserve("a", 64).unwrap();
        budget.reserve("b", 64).unwrap();
        assert!(budget.reserve("c", 1).is_err());
        budget.release(64);
        assert_eq!(budget.allocated(), 64);
        assert_eq!(budget.peak(), 128);
        budget.reserve("c", 1).unwrap();
    }

    #[test]
    fn unlimited_never_fails() {
        let budget = MemoryBudget::unlimited();
        budget.reserve("big", usize::MAX / 2).unwrap();
        assert_eq!(budget.max_size(), None);
    }
}
