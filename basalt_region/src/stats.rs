//! Compaction statistics.
//!
//! Plain counters; the compactor is single-threaded by contract, so no
//! atomics are involved. `report()` prints a human-readable summary to
//! stderr for tuning and for inspecting what a compiled module exports.

/// Statistics about one compactor's activity.
#[derive(Debug, Default, Clone)]
pub struct CompactStats {
    // =========================================================================
    // Emitted Objects (per kind)
    // =========================================================================
    /// Constructor objects emitted.
    pub ctors: usize,
    /// Array objects emitted.
    pub arrays: usize,
    /// Scalar-array objects emitted.
    pub scalar_arrays: usize,
    /// String objects emitted.
    pub strings: usize,
    /// Big-number objects emitted.
    pub bignums: usize,
    /// Thunk objects emitted.
    pub thunks: usize,
    /// Tasks emitted (each rewritten as a thunk).
    pub tasks: usize,
    /// Reference cells emitted.
    pub refs: usize,
    /// Terminator records emitted (one per compacted root).
    pub terminators: usize,

    // =========================================================================
    // Structural Sharing
    // =========================================================================
    /// Candidates discarded in favor of an earlier byte-identical object.
    pub dedup_hits: usize,
    /// Buffer bytes reclaimed by sharing.
    pub dedup_bytes_saved: usize,
}

impl CompactStats {
    /// Total objects emitted, terminators excluded.
    pub fn objects_emitted(&self) -> usize {
        self.ctors
            + self.arrays
            + self.scalar_arrays
            + self.strings
            + self.bignums
            + self.thunks
            + self.tasks
            + self.refs
    }

    /// Print a summary to stderr.
    pub fn report(&self) {
        eprintln!("=== Compaction Statistics ===");
        eprintln!("  ctors:         {}", self.ctors);
        eprintln!("  arrays:        {}", self.arrays);
        eprintln!("  scalar arrays: {}", self.scalar_arrays);
        eprintln!("  strings:       {}", self.strings);
        eprintln!("  bignums:       {}", self.bignums);
        eprintln!("  thunks:        {}", self.thunks);
        eprintln!("  tasks:         {}", self.tasks);
        eprintln!("  refs:          {}", self.refs);
        eprintln!("  roots:         {}", self.terminators);
        eprintln!(
            "  sharing:       {} hits, {} bytes saved",
            self.dedup_hits, self.dedup_bytes_saved
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objects_emitted_sums_kinds() {
        let stats = CompactStats {
            ctors: 2,
            strings: 3,
            terminators: 1,
            ..Default::default()
        };
        assert_eq!(stats.objects_emitted(), 5);
    }
}
