use spinmodel::{
    build_from_source, write_spin_phase, BuilderConfig, FillPolicy, IdpuSpinSample,
    InMemoryPulses, InMemoryStore, Interval, SunPulse,
};

fn main() -> spinmodel::Result<()> {
    // Three-second spin, slowly spinning up, with an eight-minute eclipse.
    let pulse = |k: i64| SunPulse::new(3.0 * k as f64 - 1e-6 * (k * k) as f64, k);
    let mut pulses: Vec<SunPulse> = (0..=400).map(pulse).collect();
    pulses.extend((600..=900).map(pulse));

    let eclipse: Vec<IdpuSpinSample> = (0..=25)
        .map(|i| IdpuSpinSample {
            time: 1_250.0 + 20.0 * i as f64,
            idpu_spinper: 2.9995,
        })
        .collect();

    let source = InMemoryPulses::new(pulses).with_idpu_samples(eclipse);
    let model = build_from_source(&source, Interval::new(0.0, 3_000.0), BuilderConfig::default())?;

    for seg in model.segments() {
        println!("{seg}");
    }

    for t in [10.0, 1_500.0, 2_500.0] {
        println!("t = {t}: {}", model.query_time(t)?);
    }

    let times: Vec<f64> = (0..60).map(|i| 50.0 * i as f64).collect();
    let mut store = InMemoryStore::new();
    let n = write_spin_phase(&model, "spin_phase", &times, FillPolicy::Nan, &mut store)?;
    println!("stored {n} samples");
    Ok(())
}
