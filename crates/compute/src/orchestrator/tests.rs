use std::sync::Arc;
use std::thread;
use std::time::Duration;

use scrabble_core::BenchConfig;
use scrabble_queue::{SourceError, Throttle, ThrottleConfig, ThrottledSource};

use super::*;
use crate::aggregator::RankedEntry;
use crate::kernel::ScoringKernel;

fn pet_kernel() -> Arc<dyn ScoringKernel> {
    Arc::new(|word: &str| match word {
        "cat" => Some(5),
        "dog" => Some(7),
        _ => None,
    })
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

fn small_settings(merge: MergeMode) -> RunSettings {
    RunSettings {
        workers: 3,
        channel_capacity: 2,
        merge,
        table: TableMode::Bounded(3),
        top_k: 2,
    }
}

#[test]
fn phases_only_move_forward_one_step() {
    let source = ThrottledSource::new(Vec::<String>::new(), Throttle::Unthrottled);
    let mut run = Run::new(
        StrategyKind::Direct.build(),
        small_settings(MergeMode::Immediate),
        pet_kernel(),
        source,
    );
    assert_eq!(run.phase(), RunPhase::Init);

    let skipped = run.advance(RunPhase::Feed).unwrap_err();
    assert!(matches!(skipped, RunError::PhaseOrder { from: RunPhase::Init, to: RunPhase::Feed }));

    run.advance(RunPhase::Spawn).unwrap();
    let repeated = run.advance(RunPhase::Spawn).unwrap_err();
    assert!(matches!(repeated, RunError::PhaseOrder { from: RunPhase::Spawn, .. }));
    let backwards = run.advance(RunPhase::Init).unwrap_err();
    assert!(matches!(backwards, RunError::PhaseOrder { to: RunPhase::Init, .. }));
}

#[test]
fn phase_sequence_ends_at_done() {
    let mut phase = RunPhase::Init;
    let mut seen = vec![phase];
    while let Some(next) = phase.next() {
        assert!(next > phase);
        phase = next;
        seen.push(phase);
    }
    assert_eq!(seen.len(), 7);
    assert_eq!(phase, RunPhase::Done);
}

#[test]
fn pet_scenario_for_every_strategy_and_merge_mode() {
    let expected = vec![
        RankedEntry { priority: 7, items: vec!["dog".to_string()] },
        RankedEntry { priority: 5, items: vec!["cat".to_string()] },
    ];
    for kind in StrategyKind::all() {
        for merge in MergeMode::all() {
            let source = ThrottledSource::new(words(&["cat", "cats", "dog"]), Throttle::Unthrottled);
            let report = Run::new(kind.build(), small_settings(merge), pet_kernel(), source)
                .execute()
                .unwrap();
            assert_eq!(report.top, expected, "{kind} / {merge}");
            assert_eq!(report.emitted, 3);
            assert_eq!(report.processed(), 3, "{kind} / {merge}");
            assert_eq!(report.accepted(), 2);
            assert_eq!(report.strategy, kind.as_str());
        }
    }
}

#[test]
fn deferred_results_are_merged_during_collect() {
    let source = ThrottledSource::new(words(&["cat", "dog", "cat", "emu"]), Throttle::Unthrottled);
    let report = Run::new(
        StrategyKind::SharedQueue.build(),
        small_settings(MergeMode::Deferred),
        pet_kernel(),
        source,
    )
    .execute()
    .unwrap();

    assert_eq!(report.deferred_merged, 3);
    assert_eq!(report.top[1].priority, 5);
    assert_eq!(report.top[1].items.len(), 2);
}

#[test]
fn immediate_mode_merges_nothing_at_collect() {
    let source = ThrottledSource::new(words(&["cat", "dog"]), Throttle::Unthrottled);
    let report = Run::new(
        StrategyKind::PartitionedPark.build(),
        small_settings(MergeMode::Immediate),
        pet_kernel(),
        source,
    )
    .execute()
    .unwrap();
    assert_eq!(report.deferred_merged, 0);
    assert_eq!(report.workers.len(), 3);
}

#[test]
fn empty_input_completes_with_empty_table() {
    for kind in StrategyKind::all() {
        let source = ThrottledSource::new(Vec::<String>::new(), Throttle::Unthrottled);
        let report = Run::new(kind.build(), small_settings(MergeMode::Immediate), pet_kernel(), source)
            .execute()
            .unwrap();
        assert!(report.top.is_empty(), "{kind}");
        assert_eq!(report.processed(), 0);
    }
}

#[test]
fn stalled_consumer_aborts_every_threaded_topology() {
    let slow: Arc<dyn ScoringKernel> = Arc::new(|_: &str| {
        thread::sleep(Duration::from_millis(50));
        Some(1)
    });
    let throttle = Throttle::SoftLimited(ThrottleConfig {
        soft_limit: 1,
        slack: 0,
        wait_budget: 1,
        max_stalls: 0,
    });
    let settings = RunSettings { workers: 1, ..small_settings(MergeMode::Immediate) };

    for kind in [
        StrategyKind::SharedQueue,
        StrategyKind::PartitionedSpin,
        StrategyKind::PartitionedPark,
        StrategyKind::Mailbox,
        StrategyKind::Cooperative,
    ] {
        let source = ThrottledSource::new(words(&["a", "b", "c", "d"]), throttle);
        let err = Run::new(kind.build(), settings, Arc::clone(&slow), source)
            .execute()
            .unwrap_err();
        assert!(
            matches!(err, RunError::Source(SourceError::Stalled { stalls: 1, limit: 0 })),
            "{kind}: unexpected error: {err}"
        );
    }
}

#[test]
fn from_config_applies_table_mode_and_cap() {
    let config = BenchConfig {
        workers: 2,
        num_save: 1,
        fast: false,
        max_items: Some(2),
        ..BenchConfig::default()
    };
    let run = Run::from_config(
        StrategyKind::Mailbox,
        MergeMode::Immediate,
        &config,
        pet_kernel(),
        words(&["cat", "dog", "dog"]),
    );
    assert_eq!(run.settings().table, TableMode::Unbounded);
    assert_eq!(run.settings().workers, 2);
    let report = run.execute().unwrap();

    assert_eq!(report.emitted, 2);
    assert_eq!(report.top.len(), 1, "top_k follows num_save");
    assert_eq!(report.top[0], RankedEntry { priority: 7, items: vec!["dog".to_string()] });
}

#[test]
fn settings_follow_config() {
    let config = BenchConfig { workers: 5, num_save: 4, ..BenchConfig::default() };
    let settings = RunSettings::from_config(&config, MergeMode::Deferred);
    assert_eq!(settings.workers, 5);
    assert_eq!(settings.table, TableMode::Bounded(4));
    assert_eq!(settings.top_k, 4);
    assert_eq!(settings.merge, MergeMode::Deferred);
}
