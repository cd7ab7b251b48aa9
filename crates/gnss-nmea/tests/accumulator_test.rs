//! Integration tests for the sentence accumulator.
//!
//! These tests feed raw NMEA lines through the public API and check the
//! resulting snapshot, the way a transport would drive it.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use pretty_assertions::assert_eq;

use gnss_nmea::{
    Accumulator, AccumulatorConfig, AccumulatorEvent, SharedAccumulator, Snapshot,
};
use gnss_core::{Constellation, VisibilityRetention};

const STALE_MS: i64 = 5000;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
}

fn at(ms: i64) -> DateTime<Utc> {
    t0() + TimeDelta::milliseconds(ms)
}

fn accumulator() -> Accumulator {
    Accumulator::new(AccumulatorConfig::default())
}

/// Feed every line at the same instant.
fn feed(acc: &mut Accumulator, lines: &[&str], now: DateTime<Utc>) -> Vec<AccumulatorEvent> {
    lines
        .iter()
        .flat_map(|line| acc.process_at(line, now))
        .collect()
}

/// Visible satellites as (talker, prn) pairs in snapshot order.
fn visible(snapshot: &Snapshot) -> Vec<(String, u32)> {
    snapshot
        .satellites
        .visible
        .iter()
        .map(|s| (s.talker.to_string(), s.prn))
        .collect()
}

fn gp(prns: &[u32]) -> Vec<(String, u32)> {
    prns.iter().map(|prn| ("GP".to_string(), *prn)).collect()
}

#[test]
fn test_snapshot_before_any_data() {
    let acc = accumulator();
    let snapshot = acc.snapshot();
    assert!(snapshot.position.is_none());
    assert!(snapshot.error_estimate.is_none());
    assert!(snapshot.satellites.visible.is_empty());
    assert!(snapshot.satellites.in_use.is_empty());
}

#[test]
fn test_two_part_sequence_scenario() {
    let mut acc = accumulator();
    feed(
        &mut acc,
        &[
            "$GPGSV,2,1,03,03,10,020,30,04,05,006,*7C",
            "$GPGSV,2,2,03,05,01,002,40*4E",
        ],
        t0(),
    );

    let snapshot = acc.snapshot_at(t0());
    assert_eq!(visible(&snapshot), gp(&[3, 4, 5]));

    let sats = &snapshot.satellites.visible;
    assert_eq!(sats[0].elevation, Some(10.0));
    assert_eq!(sats[0].azimuth, Some(20.0));
    assert_eq!(sats[0].snr, Some(30.0));
    assert_eq!(sats[1].snr, None);
    assert_eq!(sats[2].snr, Some(40.0));
    assert!(sats.iter().all(|s| s.constellation == Some(Constellation::Gps)));
}

#[test]
fn test_restarted_sequence_never_shows_first_batch() {
    let mut acc = accumulator();
    let events = feed(
        &mut acc,
        &[
            "$GPGSV,2,1,08,01,40,083,46,02,17,308,41",
            "$GPGSV,2,1,08,12,07,344,39,14,22,228,45",
        ],
        t0(),
    );
    assert!(events
        .iter()
        .any(|e| matches!(e, AccumulatorEvent::SequenceResynced { .. })));
    assert!(acc.snapshot_at(t0()).satellites.visible.is_empty());

    feed(&mut acc, &["$GPGSV,2,2,08,20,30,100,38"], t0());
    assert_eq!(visible(&acc.snapshot_at(t0())), gp(&[12, 14, 20]));
}

#[test]
fn test_skipped_part_does_not_corrupt_sequence() {
    let mut acc = accumulator();
    feed(&mut acc, &["$GPGSV,3,1,09,01,40,083,46"], t0());
    let before = acc.stats();

    let events = acc.process_at("$GPGSV,3,3,09,09,10,100,20", t0());
    assert!(matches!(
        events.as_slice(),
        [AccumulatorEvent::PartDropped { part: 3, .. }]
    ));
    assert_eq!(acc.stats().parts_accepted, before.parts_accepted);

    feed(
        &mut acc,
        &["$GPGSV,3,2,09,02,17,308,41", "$GPGSV,3,3,09,03,07,344,39"],
        t0(),
    );
    assert_eq!(visible(&acc.snapshot_at(t0())), gp(&[1, 2, 3]));
}

#[test]
fn test_completed_report_replaces_talker_visibility() {
    let mut acc = accumulator();
    feed(
        &mut acc,
        &[
            "$GPGSV,1,1,02,01,40,083,46,02,17,308,41",
            "$GLGSV,1,1,01,65,30,100,35",
        ],
        t0(),
    );
    feed(&mut acc, &["$GPGSV,1,1,01,02,18,309,42"], at(1000));

    assert_eq!(
        visible(&acc.snapshot_at(at(1000))),
        vec![("GP".to_string(), 2), ("GL".to_string(), 65)]
    );
}

#[test]
fn test_zero_prn_entries_filtered() {
    let mut acc = accumulator();
    feed(&mut acc, &["$GPGSV,1,1,02,00,40,083,46,,,,,07,10,100,30"], t0());
    assert_eq!(visible(&acc.snapshot_at(t0())), gp(&[7]));
}

#[test]
fn test_in_use_refresh_and_expiry() {
    let mut acc = accumulator();
    acc.process_at("$GNGSA,A,3,05,07,,,,,,,,,,,1.5,0.9,1.2,1", t0());
    acc.process_at("$GNGSA,A,3,05,,,,,,,,,,,,1.5,0.9,1.2,1", at(STALE_MS / 2));

    let later = at(STALE_MS + 1);
    let events = acc.process_at("$GPGST,083000.00,1.2,,,,0.9,0.8,1.9", later);
    let evicted: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            AccumulatorEvent::StaleEvicted(eviction) => Some(eviction.in_use.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(evicted, vec![7]);
    assert_eq!(acc.snapshot_at(later).satellites.in_use, vec![5]);
}

#[test]
fn test_quiet_talker_disappears_with_timed_retention() {
    let mut acc = accumulator();
    feed(&mut acc, &["$GAGSV,1,1,01,301,45,120,33,7"], t0());
    feed(&mut acc, &["$GPGSV,1,1,01,04,20,050,41"], at(STALE_MS));

    let snapshot = acc.snapshot_at(at(STALE_MS + 1));
    assert_eq!(visible(&snapshot), gp(&[4]));
}

#[test]
fn test_quiet_talker_kept_until_replaced() {
    let config = AccumulatorConfig {
        visible_retention: VisibilityRetention::UntilReplaced,
        ..AccumulatorConfig::default()
    };
    let mut acc = Accumulator::new(config);
    feed(&mut acc, &["$GAGSV,1,1,01,301,45,120,33,7"], t0());

    let snapshot = acc.snapshot_at(at(60_000));
    assert_eq!(snapshot.satellites.visible.len(), 1);
    assert_eq!(snapshot.satellites.visible[0].signal, Some(7));
}

#[test]
fn test_combined_talker_infers_constellation() {
    let mut acc = accumulator();
    feed(&mut acc, &["$GNGSV,1,1,02,10,40,083,46,70,17,308,41"], t0());

    let sats = acc.snapshot_at(t0()).satellites.visible;
    assert_eq!(sats[0].constellation, Some(Constellation::Gps));
    assert_eq!(sats[1].constellation, Some(Constellation::Glonass));
    assert!(sats.iter().all(|s| s.talker.as_str() == "GN"));
}

#[test]
fn test_malformed_lines_leave_snapshot_unchanged() {
    let mut acc = accumulator();
    feed(
        &mut acc,
        &[
            "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47",
            "$GPGSV,1,1,01,04,20,050,41",
        ],
        t0(),
    );
    let before = acc.snapshot_at(t0());

    for line in ["", "garbage", "$", "$GPGGA,12", "$GPXYZ,1,2,3", "$GPGSV,a,b,c"] {
        let events = acc.process_at(line, t0());
        assert!(
            events.iter().all(AccumulatorEvent::is_decode_failure),
            "unexpected events for {:?}: {:?}",
            line,
            events
        );
    }

    assert_eq!(acc.snapshot_at(t0()), before);
    assert_eq!(acc.stats().decode_errors, 6);
}

#[test]
fn test_snapshot_serializes_to_camel_case_json() {
    let mut acc = accumulator();
    feed(
        &mut acc,
        &[
            "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47",
            "$GPGSA,A,3,04,,,,,,,,,,,,2.5,1.3,2.1",
            "$GPGSV,1,1,01,04,20,050,41",
        ],
        t0(),
    );

    let json = serde_json::to_value(acc.snapshot_at(t0())).unwrap();
    assert_eq!(json["position"]["satellitesUsed"], 8);
    assert_eq!(json["satellites"]["inUse"], serde_json::json!([4]));
    assert_eq!(json["satellites"]["visible"][0]["talker"], "GP");
    assert_eq!(json["satellites"]["visible"][0]["constellation"], "gps");
}

#[tokio::test]
async fn test_shared_accumulator_across_tasks() {
    let shared = SharedAccumulator::default();
    let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(16);

    let writer = shared.clone();
    let processor = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            writer.process(&line);
        }
    });

    for line in [
        "$GPGSV,2,1,03,03,10,020,30,04,05,006,",
        "$GPGSV,2,2,03,05,01,002,40",
        "$GPGSA,A,3,03,05,,,,,,,,,,,1.5,0.9,1.2",
    ] {
        tx.send(line.to_string()).await.unwrap();
    }
    drop(tx);

    tokio::time::timeout(Duration::from_secs(5), processor)
        .await
        .expect("processor did not finish")
        .unwrap();

    let snapshot = shared.snapshot();
    assert_eq!(visible(&snapshot), gp(&[3, 4, 5]));
    assert_eq!(snapshot.satellites.in_use, vec![3, 5]);
}

#[tokio::test]
async fn test_subscriber_receives_completed_sequence() {
    let shared = SharedAccumulator::default();
    let mut updates = shared.subscribe();

    let writer = shared.clone();
    let processor = tokio::spawn(async move {
        writer.process("$GLGSV,2,1,02,65,30,100,35");
        writer.process("$GLGSV,2,2,02,66,10,200,28");
    });

    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .expect("no snapshot published")
        .unwrap();
    processor.await.unwrap();

    let snapshot = updates.borrow_and_update().clone();
    assert_eq!(
        visible(&snapshot),
        vec![("GL".to_string(), 65), ("GL".to_string(), 66)]
    );
}

#[test]
fn test_oversized_part_count_not_buffered() {
    let mut acc = accumulator();
    let events = acc.process_at("$GPGSV,200,1,800,01,10,020,30", t0());
    assert!(events.iter().all(AccumulatorEvent::is_decode_failure));
    assert_eq!(acc.pending_sequences(), 0);
    assert_eq!(acc.stats().parts_accepted, 0);
}
