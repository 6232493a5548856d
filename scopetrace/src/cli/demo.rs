//! Sample workload for `scopetrace demo`
//!
//! Each worker thread processes frames through a few nested, instrumented
//! stages and drops an event every ten frames. Everything is recorded into
//! the global recorder through the instrumentation macros.

use std::hint::black_box;

use crate::{scope_block, scope_event};

/// Run `threads` workers for `iterations` frames each
///
/// Returns a checksum of the work so it cannot be optimized away.
pub fn run_workload(threads: u32, iterations: u32) -> u64 {
    std::thread::scope(|s| {
        let workers: Vec<_> =
            (0..threads).map(|worker| s.spawn(move || worker_loop(worker, iterations))).collect();
        workers.into_iter().map(|w| w.join().unwrap_or(0)).fold(0, u64::wrapping_add)
    })
}

fn worker_loop(worker: u32, iterations: u32) -> u64 {
    scope_block!("worker", 0xFF4C_AF50);
    let mut checksum = 0u64;
    for frame in 0..iterations {
        scope_block!("frame");
        checksum ^= parse(frame);
        checksum = checksum.wrapping_add(simulate(worker, frame));
        if frame % 10 == 0 {
            scope_event!("checkpoint", format!("checkpoint {frame}"));
        }
    }
    checksum
}

fn parse(frame: u32) -> u64 {
    scope_block!("parse", 0xFFFF_9800);
    (0..2_000u64).fold(u64::from(frame), |acc, x| black_box(acc.rotate_left(5) ^ x))
}

fn simulate(worker: u32, frame: u32) -> u64 {
    scope_block!("simulate", 0xFF21_96F3);
    let mut state = u64::from(worker) << 32 | u64::from(frame);
    for _ in 0..4 {
        scope_block!("step");
        for _ in 0..500 {
            state = black_box(state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1));
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_blocks;
    use crate::loader::load_from_reader;
    use crate::Recorder;
    use std::io::Cursor;

    #[test]
    fn test_workload_records_nested_blocks() {
        let recorder = Recorder::global();
        recorder.set_enabled(true);

        run_workload(2, 3);

        let mut out = Vec::new();
        let summary = recorder.write_to(&mut out).unwrap();
        // Per worker: worker + 3 frames + 3 parse + 3 simulate + 12 steps + 1 event
        assert!(summary.blocks >= 46);

        let profile = load_from_reader(Cursor::new(out)).unwrap();
        let worker_roots: Vec<_> = profile
            .trees()
            .values()
            .flatten()
            .filter(|root| profile.block_name(&root.block) == "worker")
            .collect();
        assert_eq!(worker_roots.len(), 2);
        for root in worker_roots {
            assert_eq!(root.children.len(), 3);
            assert!(root.depth() >= 4);
        }

        let stats = analyze_blocks(&profile);
        let step = stats.iter().find(|s| s.name == "step").unwrap();
        assert_eq!(step.count, 24);
        assert!(profile.blocks().iter().any(|b| profile.block_name(b) == "checkpoint 0"));
    }
}
