use chrono::{Duration, TimeZone, Utc};
use qtty::Seconds;
use spinmodel::{
    build_from_source, write_spin_phase, BuilderConfig, FillPolicy, IdpuSpinSample,
    InMemoryPulses, InMemoryStore, Interval, SegmentFlags, SpinModel, SpinModelError,
    SpinModelHandle, SunPulse,
};
use std::sync::Arc;

/// A spacecraft spinning at 3 s that is eclipsed between 1000 s and 1600 s.
/// Onboard, the processor free-runs at 3.0005 s through the shadow.
fn eclipse_pass() -> InMemoryPulses {
    let mut pulses: Vec<SunPulse> = (0..=333).map(|k| SunPulse::new(k as f64 * 3.0, k)).collect();
    pulses.extend((0..=300).map(|m| SunPulse::new(1_650.0 + m as f64 * 3.0, 550 + m)));

    let samples: Vec<IdpuSpinSample> = (0..=60)
        .map(|i| {
            let time = 1_000.0 + i as f64 * 10.0;
            IdpuSpinSample {
                time,
                idpu_spinper: 3.0005,
            }
        })
        .collect();

    InMemoryPulses::new(pulses).with_idpu_samples(samples)
}

fn pass_range() -> Interval {
    Interval::new(0.0, 3_000.0)
}

#[test]
fn eclipse_pass_builds_three_contiguous_segments() {
    let model = build_from_source(&eclipse_pass(), pass_range(), BuilderConfig::default()).unwrap();

    assert_eq!(model.len(), 3);
    assert_eq!(model.coverage(), Some(Interval::new(0.0, 2_550.0)));
    assert!(model.gaps().is_empty());

    let bridge = &model.segments()[1];
    assert_eq!((bridge.t1(), bridge.t2()), (999.0, 1_650.0));
    assert_eq!((bridge.c1(), bridge.c2()), (333, 550));
    assert!(bridge.segflags().contains(SegmentFlags::ECLIPSE_CORRECTED));
    assert!((bridge.idpu_spinper() - 3.0005).abs() < 1e-12);

    let flagged: Vec<_> = model.eclipse_segments().collect();
    assert_eq!(flagged.len(), 1);
}

#[test]
fn eclipse_delta_phi_is_zero_at_entry_and_outside() {
    let model = build_from_source(&eclipse_pass(), pass_range(), BuilderConfig::default()).unwrap();

    assert_eq!(model.query_time(500.0).unwrap().eclipse_delta_phi.value(), 0.0);
    let entry = model.query_time(1_000.0).unwrap();
    assert!(entry.eclipse_delta_phi.value().abs() < 1e-9);
    let inside = model.query_time(1_300.0).unwrap();
    assert!(inside.eclipse_delta_phi.value().abs() > 1.0);
    assert_eq!(model.query_time(2_000.0).unwrap().eclipse_delta_phi.value(), 0.0);
}

#[test]
fn spin_count_tracks_pulses_through_the_table() {
    let model = build_from_source(&eclipse_pass(), pass_range(), BuilderConfig::default()).unwrap();

    for (t, count) in [(0.0, 0), (4.5, 1), (1_650.0, 550), (1_651.5, 550), (2_551.5, 850)] {
        let state = model.query_time(t).unwrap();
        assert_eq!(state.spin_count, count, "t = {t}");
    }
    let pulse = model.query_count(600).unwrap();
    assert!((pulse.t_last - 1_800.0).abs() < 1e-6);
    assert!((pulse.spin_period.value() - 3.0).abs() < 1e-9);

    let early = model.query_time(-4.5).unwrap();
    assert_eq!(early.spin_count, -2);
    assert!((early.spin_period - Seconds::new(3.0)).abs() < Seconds::new(1e-9));
}

#[test]
fn write_spin_phase_end_to_end() {
    let model = build_from_source(&eclipse_pass(), pass_range(), BuilderConfig::default()).unwrap();
    let times: Vec<f64> = (0..300).map(|i| i as f64 * 10.0 + 0.75).collect();

    let mut store = InMemoryStore::new();
    let written =
        write_spin_phase(&model, "thc_spin_phase", &times, FillPolicy::Abort, &mut store).unwrap();
    assert_eq!(written, times.len());

    let series = store.get("thc_spin_phase").unwrap();
    assert_eq!(series.times, times);
    assert!(series.spin_phase.iter().all(|p| (0.0..360.0).contains(p)));
    assert!(series.spin_count.windows(2).all(|w| w[1] >= w[0]));
    // 0.75 s into a 3 s spin.
    assert!((series.spin_phase[0] - 90.0).abs() < 1e-6);
}

#[test]
fn utc_queries_match_unix_seconds() {
    let t0 = Utc.with_ymd_and_hms(2008, 3, 23, 0, 0, 0).unwrap();
    let base = t0.timestamp() as f64;
    let pulses: Vec<SunPulse> = (0..50).map(|k| SunPulse::new(base + 3.0 * k as f64, k)).collect();
    let model = InMemoryPulses::new(pulses);
    let model = build_from_source(
        &model,
        Interval::new(base, base + 200.0),
        BuilderConfig::default(),
    )
    .unwrap();

    let at = t0 + Duration::milliseconds(61_500);
    let state = model.query_utc(at).unwrap();
    assert_eq!(state.spin_count, 20);
    assert!((state.spin_phase.value() - 180.0).abs() < 1e-4);
    let coverage = model.coverage().unwrap().to_utc().unwrap();
    assert_eq!(coverage.start, t0);
}

#[test]
fn empty_range_reports_no_data() {
    let model = build_from_source(
        &eclipse_pass(),
        Interval::new(10_000.0, 20_000.0),
        BuilderConfig::default(),
    )
    .unwrap();
    assert!(model.is_empty());

    let mut store = InMemoryStore::new();
    let err = write_spin_phase(&model, "tha_spin_phase", &[10_500.0], FillPolicy::Nan, &mut store)
        .unwrap_err();
    assert!(matches!(err, SpinModelError::NoData(_)));
    assert!(store.is_empty());
}

#[test]
fn handle_publishes_rebuilt_tables() {
    let handle = Arc::new(SpinModelHandle::new(SpinModel::empty()));
    let before = handle.load();
    assert!(before.is_empty());

    let rebuilt = build_from_source(&eclipse_pass(), pass_range(), BuilderConfig::default()).unwrap();
    handle.replace(rebuilt);

    assert!(before.is_empty());
    assert_eq!(handle.load().len(), 3);
}

#[cfg(feature = "serde")]
#[test]
fn serde_table_roundtrip_revalidates() {
    let model = build_from_source(&eclipse_pass(), pass_range(), BuilderConfig::default()).unwrap();
    let json = serde_json::to_string(&model).unwrap();
    let back: SpinModel = serde_json::from_str(&json).unwrap();
    assert_eq!(back, model);

    let overlapping = r#"[
        {"t1": 0.0, "t2": 100.0, "c1": 0, "c2": 5, "b": 18.0, "c": 0.0},
        {"t1": 50.0, "t2": 150.0, "c1": 5, "c2": 10, "b": 18.0, "c": 0.0}
    ]"#;
    assert!(serde_json::from_str::<SpinModel>(overlapping).is_err());
}

#[cfg(feature = "serde")]
#[test]
fn serde_segment_uses_legacy_field_names() {
    let json = r#"{"t1": 0.0, "t2": 100.0, "c1": 0, "c2": 5, "b": 18.0, "c": 0.0, "segflags": 3}"#;
    let seg: spinmodel::SpinmodelSegment = serde_json::from_str(json).unwrap();
    assert_eq!(seg.segflags(), SegmentFlags::ECLIPSE_CORRECTED);
    assert_eq!(seg.npts(), 0);

    let value = serde_json::to_value(seg).unwrap();
    assert_eq!(value["segflags"], 3);
    assert_eq!(value["idpu_spinper"], 0.0);
}

#[cfg(feature = "serde")]
#[test]
fn serde_config_fills_missing_fields() {
    let config: BuilderConfig = serde_json::from_str(r#"{"max_gap": 20.0}"#).unwrap();
    assert_eq!(config.max_gap, 20.0);
    assert_eq!(config.max_phase_error, BuilderConfig::default().max_phase_error);
}
