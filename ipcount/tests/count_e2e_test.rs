use ipcount::codec::encode;
use ipcount::config::OVERLAP_BYTES;
use ipcount::{
    count_distinct_addresses, Aggregation, CountConfig, CountError, DistinctCounter,
    ParallelCounter, SequentialCounter, Strategy,
};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_input(contents: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents).expect("write input");
    file.flush().expect("flush input");
    file
}

fn lines(lines: &[&str]) -> Vec<u8> {
    let mut out = lines.join("\n").into_bytes();
    out.push(b'\n');
    out
}

fn parallel(window_size: u64, worker_count: usize, batch_size: usize) -> CountConfig {
    CountConfig {
        window_size,
        worker_count,
        batch_size,
        queue_depth: 4,
        ..CountConfig::default()
    }
}

fn count_both(path: &Path, cfg: &CountConfig) -> (u64, u64) {
    let seq = count_distinct_addresses(path, Strategy::Sequential, cfg).expect("sequential");
    let par = count_distinct_addresses(path, Strategy::Parallel, cfg).expect("parallel");
    (seq, par)
}

#[test]
fn reference_fixture_counts_three() {
    let file = write_input(&lines(&[
        "1.2.3.4",
        "1.2.3.4",
        "255.255.255.255",
        "0.0.0.0",
        "999.1.1.1",
        "1.2.3",
    ]));
    for cfg in [CountConfig::default(), parallel(7, 3, 1), parallel(16, 2, 2)] {
        assert_eq!(count_both(file.path(), &cfg), (3, 3));
    }
}

#[test]
fn address_space_extremes_are_counted() {
    let file = write_input(&lines(&["0.0.0.0", "255.255.255.255"]));
    let report = SequentialCounter::new().report(file.path()).unwrap();
    assert_eq!(report.distinct, 2);
    assert_eq!(report.stats.malformed, 0);

    let cfg = CountConfig {
        aggregation: Aggregation::Shared,
        ..parallel(5, 2, 1)
    };
    assert_eq!(ParallelCounter::new(cfg).count(file.path()).unwrap(), 2);
}

#[test]
fn empty_file_counts_zero() {
    let file = write_input(b"");
    for aggregation in [Aggregation::Channel, Aggregation::Shared] {
        let cfg = CountConfig {
            aggregation,
            ..CountConfig::default()
        };
        assert_eq!(count_both(file.path(), &cfg), (0, 0));
    }
}

#[test]
fn missing_file_fails_for_both_strategies() {
    let path = Path::new("/nonexistent/ipcount/input.txt");
    for strategy in [Strategy::Sequential, Strategy::Parallel] {
        let err = count_distinct_addresses(path, strategy, &CountConfig::default()).unwrap_err();
        assert!(matches!(err, CountError::Open { .. }), "{strategy}: {err}");
    }
}

/// Runs `strategy` on `path` off the test thread so a stuck pool fails the
/// test instead of hanging it.
fn count_with_deadline(path: &Path, strategy: Strategy, cfg: CountConfig) -> ipcount::Result<u64> {
    let (tx, rx) = mpsc::channel();
    let path = path.to_path_buf();
    thread::spawn(move || {
        let _ = tx.send(count_distinct_addresses(&path, strategy, &cfg));
    });
    rx.recv_timeout(Duration::from_secs(60))
        .unwrap_or_else(|_| panic!("{strategy} count did not finish"))
}

// A directory opens fine on unix but cannot be mapped or read, so every
// window fails and the pool has to cancel and shut down cleanly.
#[cfg(unix)]
#[test]
fn unmappable_input_fails_the_whole_count() {
    let dir = tempfile::tempdir().expect("temp dir");
    for name in ["a.txt", "b.txt", "c.txt"] {
        std::fs::write(dir.path().join(name), b"1.2.3.4\n").expect("write entry");
    }
    let dir_len = std::fs::metadata(dir.path()).unwrap().len();
    assert!(dir_len > 0, "directory reports size 0, nothing to map");

    for aggregation in [Aggregation::Channel, Aggregation::Shared] {
        let cfg = CountConfig {
            window_size: 1,
            worker_count: 4,
            batch_size: 1,
            queue_depth: 1,
            aggregation,
            ..CountConfig::default()
        };
        let err = count_with_deadline(dir.path(), Strategy::Parallel, cfg).unwrap_err();
        assert!(matches!(err, CountError::Map { .. }), "{aggregation}: {err}");
    }

    let err = count_with_deadline(dir.path(), Strategy::Sequential, CountConfig::default())
        .unwrap_err();
    assert!(matches!(err, CountError::Read(_)), "sequential: {err}");
}

#[test]
fn full_sub_range_plus_duplicates() {
    let mut input = Vec::new();
    for addr in 0u32..=0xFFFF {
        writeln!(input, "{}", encode(addr)).unwrap();
    }
    for addr in (0u32..=0xFFFF).step_by(7) {
        writeln!(input, "  {}  ", encode(addr)).unwrap();
    }
    let file = write_input(&input);

    let configs = [
        parallel(4096, 4, 100),
        parallel(65_537, 3, 1024),
        CountConfig {
            aggregation: Aggregation::Shared,
            ..parallel(10_000, 8, 333)
        },
    ];
    for cfg in configs {
        assert_eq!(count_both(file.path(), &cfg), (65_536, 65_536));
    }
}

#[test]
fn repeated_runs_are_idempotent() {
    let file = write_input(&lines(&["10.0.0.1", "10.0.0.2", "10.0.0.1", "bogus"]));
    let cfg = parallel(6, 2, 1);
    let first = count_both(file.path(), &cfg);
    let second = count_both(file.path(), &cfg);
    assert_eq!(first, (2, 2));
    assert_eq!(first, second);
}

/// Builds a file whose `10.20.30.40` line ends with a terminator at exactly
/// `terminator_at`, surrounded by other valid lines.
fn file_with_terminator_at(terminator_at: usize) -> Vec<u8> {
    const TARGET: &[u8] = b"10.20.30.40";
    let filler_len = terminator_at - TARGET.len();
    assert!(filler_len >= 16);

    let full_lines = (filler_len - 8) / 8;
    let rest = filler_len - full_lines * 8;
    let mut out = Vec::with_capacity(terminator_at + 64);
    for _ in 0..full_lines {
        out.extend_from_slice(b"1.1.1.1\n");
    }
    out.extend_from_slice(b"2.2.2.2");
    out.extend(std::iter::repeat(b' ').take(rest - 8));
    out.push(b'\n');
    out.extend_from_slice(TARGET);
    assert_eq!(out.len(), terminator_at);
    out.push(b'\n');
    for _ in 0..5 {
        out.extend_from_slice(b"3.3.3.3\n");
    }
    out
}

#[test]
fn terminator_near_every_window_edge_is_counted_once() {
    const WINDOW: u64 = 64;
    let overlap = OVERLAP_BYTES as i64;

    for k in 1..=3i64 {
        for d in -overlap..=overlap {
            let at = (k * WINDOW as i64 + d) as usize;
            let file = write_input(&file_with_terminator_at(at));
            let report = ParallelCounter::new(parallel(WINDOW, 3, 2))
                .report(file.path())
                .unwrap();
            assert_eq!(report.distinct, 4, "k={k} d={d}");
            assert_eq!(report.stats.malformed, 0, "k={k} d={d}");
        }
    }

    let file = write_input(&file_with_terminator_at(2 * WINDOW as usize));
    let cfg = CountConfig {
        aggregation: Aggregation::Shared,
        ..parallel(WINDOW, 3, 2)
    };
    assert_eq!(count_both(file.path(), &cfg), (4, 4));
}

#[test]
fn crlf_input_agrees_across_strategies() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let pool: Vec<u32> = (0..500).map(|_| rng.gen()).collect();
    let mut expected = HashSet::new();
    let mut input = Vec::new();
    for _ in 0..3000 {
        let addr = pool[rng.gen_range(0..pool.len())];
        expected.insert(addr);
        write!(input, "{}\r\n", encode(addr)).unwrap();
    }
    input.extend_from_slice(b"not-an-address\r\n");
    let file = write_input(&input);

    for window_size in [17, 100, 1000, 4096] {
        let (seq, par) = count_both(file.path(), &parallel(window_size, 4, 64));
        assert_eq!(seq, expected.len() as u64);
        assert_eq!(par, seq, "window_size={window_size}");
    }
}

#[test]
fn strategy_counter_dispatch() {
    let file = write_input(&lines(&["8.8.8.8", "8.8.4.4"]));
    let cfg = parallel(4, 2, 1);
    for strategy in [Strategy::Sequential, Strategy::Parallel] {
        assert_eq!(strategy.counter(&cfg).count(file.path()).unwrap(), 2);
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 24, .. ProptestConfig::default() })]

    #[test]
    fn parallel_matches_distinct_set(
        addrs in proptest::collection::vec(0u32..64, 0..200),
        window_size in 1u64..128,
        worker_count in 1usize..6,
        batch_size in 1usize..32,
        terminated in any::<bool>(),
    ) {
        let text = addrs
            .iter()
            .map(|&a| encode(a.wrapping_mul(0x0101_0101)).to_string())
            .collect::<Vec<_>>()
            .join("\n");
        let mut bytes = text.into_bytes();
        if terminated && !bytes.is_empty() {
            bytes.push(b'\n');
        }
        let file = write_input(&bytes);
        let expected = addrs.iter().collect::<HashSet<_>>().len() as u64;

        let cfg = parallel(window_size, worker_count, batch_size);
        let (seq, par) = count_both(file.path(), &cfg);
        prop_assert_eq!(seq, expected);
        prop_assert_eq!(par, expected);
    }
}
