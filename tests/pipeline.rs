//! End-to-end runs over a synthetic study area.

use std::fs;

use cropniche::cultivar::Cultivar;
use cropniche::pipeline::{
    cultivar_states, CultivarState, DegeneratePolicy, FitStage, InputPaths, Pipeline, PipelineError,
    RunConfig, RunInputs, RunState,
};
use cropniche::projection::{Band, Reconstruction};
use cropniche::smoothing::NicheModel;
use cropniche::store::{ArtifactKind, ArtifactStore};
use cropniche::synth::{generate, station_config, write_dataset, SynthConfig};
use tempfile::tempdir;

struct Fixture {
    _dir: tempfile::TempDir,
    paths: InputPaths,
    store_dir: std::path::PathBuf,
    out_dir: std::path::PathBuf,
    config: RunConfig,
    proxy_steps: usize,
}

fn fixture(seed: u64) -> Fixture {
    let dir = tempdir().unwrap();
    let synth = SynthConfig::small(seed);
    let data = generate(&synth).unwrap();
    let written = write_dataset(&data, &dir.path().join("inputs")).unwrap();

    let config = RunConfig {
        station: station_config(&synth),
        fit_workers: 2,
        project_workers: 1,
        ..RunConfig::default()
    };

    Fixture {
        paths: InputPaths {
            stations: Some(written.stations),
            daily: Some(written.daily),
            elevation: Some(written.elevation),
            proxy: Some(written.proxy),
            cultivars: Some(written.cultivars),
        },
        store_dir: dir.path().join("store"),
        out_dir: dir.path().join("out"),
        config,
        proxy_steps: synth.proxy_steps,
        _dir: dir,
    }
}

fn run_full(fx: &Fixture, export: bool) -> RunState {
    let inputs = RunInputs::load(&fx.paths, &fx.config).unwrap();
    let store = ArtifactStore::open(&fx.store_dir).unwrap();
    let mut run = RunState::new(store, inputs);
    let out = export.then(|| fx.out_dir.clone());
    Pipeline::full(fx.config.clone(), out).run(&mut run).unwrap();
    run
}

#[test]
fn full_run_produces_every_artifact() {
    let fx = fixture(5);
    let run = run_full(&fx, true);
    let store = &run.store;

    let states = cultivar_states(store, &run.inputs.cultivars);
    for (id, state) in &states {
        let crop = &run.inputs.cultivars.iter().find(|c| &c.id == id).unwrap().crop;
        let expected = if crop == "rice" {
            CultivarState::Aggregated
        } else {
            CultivarState::Reconstructed
        };
        assert_eq!(*state, expected, "cultivar {id}");
    }

    for cultivar in &run.inputs.cultivars {
        let model: NicheModel = store.load(ArtifactKind::Model, &cultivar.id).unwrap();
        for cell in 0..model.cell_count() {
            let curve = model.curve(cell);
            assert!(curve.windows(2).all(|w| w[0] <= w[1] + 1e-6));
            assert!(curve.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }

        let rec: Reconstruction = store.load(ArtifactKind::Reconstruction, &cultivar.id).unwrap();
        for band in Band::ALL {
            let stack = rec.band(band);
            assert_eq!(stack.layer_count(), fx.proxy_steps);
            assert_eq!(stack.cell_count(), model.cell_count());
            assert!(stack.values().iter().all(|&v| v <= 100));
        }
        assert_eq!(rec.years_bp(), run.inputs.proxy.as_ref().unwrap().years_bp.as_slice());
    }

    assert!(fx.out_dir.join("summary.csv").exists());
    assert!(fx.out_dir.join("crops").is_dir());
    assert!(!run.exported.is_empty());
    assert!(run.exported.iter().all(|p| p.exists()));
}

#[test]
fn crop_aggregate_is_rounded_mean_of_members() {
    let fx = fixture(9);
    let run = run_full(&fx, false);
    let store = &run.store;

    let a: Reconstruction = store.load(ArtifactKind::Reconstruction, "japonica").unwrap();
    let b: Reconstruction = store.load(ArtifactKind::Reconstruction, "indica").unwrap();
    let rice: Reconstruction = store.load(ArtifactKind::Aggregate, "rice").unwrap();

    assert_eq!(rice.label, "rice");
    for band in Band::ALL {
        let expected: Vec<u8> = a
            .band(band)
            .values()
            .iter()
            .zip(b.band(band).values())
            .map(|(&x, &y)| ((x as f64 + y as f64) / 2.0).round() as u8)
            .collect();
        assert_eq!(rice.band(band).values(), expected.as_slice());
    }
    assert!(!store.contains(ArtifactKind::Aggregate, "millet"));
}

#[test]
fn rerun_never_rewrites_existing_artifacts() {
    let fx = fixture(13);
    let first = run_full(&fx, false);

    let snapshot: Vec<(std::path::PathBuf, Vec<u8>)> = first
        .inputs
        .cultivars
        .iter()
        .flat_map(|c| {
            [ArtifactKind::Model, ArtifactKind::Reconstruction]
                .map(|kind| first.store.path(kind, &c.id))
        })
        .map(|p| {
            let bytes = fs::read(&p).unwrap();
            (p, bytes)
        })
        .collect();

    // A second run with different smoothing would produce different models
    // if anything were recomputed.
    let mut config = fx.config.clone();
    config.smoothing.span = 0.5;
    let inputs = RunInputs::load(&fx.paths, &config).unwrap();
    let mut run = RunState::new(ArtifactStore::open(&fx.store_dir).unwrap(), inputs);
    Pipeline::full(config, None).run(&mut run).unwrap();

    for (path, bytes) in snapshot {
        assert_eq!(fs::read(&path).unwrap(), bytes, "{} changed", path.display());
    }
}

#[test]
fn force_recomputes_from_scratch() {
    let fx = fixture(17);
    let first = run_full(&fx, false);
    let marker = first.store.path(ArtifactKind::Model, "foxtail");
    fs::write(&marker, b"not a model").unwrap();

    let mut config = fx.config.clone();
    config.force = true;
    let inputs = RunInputs::load(&fx.paths, &config).unwrap();
    let mut run = RunState::new(ArtifactStore::open(&fx.store_dir).unwrap(), inputs);
    let mut pipeline = Pipeline::new(config);
    pipeline.add_stage(FitStage);
    pipeline.run(&mut run).unwrap();

    let model: NicheModel = run.store.load(ArtifactKind::Model, "foxtail").unwrap();
    assert_eq!(model.cultivar, "foxtail");
    assert!(!run.store.contains(ArtifactKind::Reconstruction, "foxtail"));
}

#[test]
fn failed_fit_leaves_other_cultivars_intact() {
    let fx = fixture(21);
    // A narrow axis with a small scale keeps the synthetic cultivars split
    // across the network at every level.
    let config = RunConfig {
        perturbation_min: -1,
        perturbation_max: 1,
        sd_scale_c: Some(0.05),
        degenerate_policy: DegeneratePolicy::Abort,
        ..fx.config.clone()
    };

    let fit_with = |config: &RunConfig| {
        let mut inputs = RunInputs::load(&fx.paths, config).unwrap();
        // No station ever reaches this requirement, so every level is unanimous.
        inputs.cultivars.push(Cultivar::new("upland", "sorghum", 10.0, 1.0e6));
        let mut run = RunState::new(ArtifactStore::open(&fx.store_dir).unwrap(), inputs);
        let mut pipeline = Pipeline::new(config.clone());
        pipeline.add_stage(FitStage);
        let result = pipeline.run(&mut run);
        (run, result)
    };

    let (run, result) = fit_with(&config);
    match result {
        Err(PipelineError::UnitsFailed { failed, .. }) => {
            assert_eq!(failed.len(), 1, "{failed:?}");
            assert!(failed[0].starts_with("upland:"), "{}", failed[0]);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let stored = run.store.keys(ArtifactKind::Model).unwrap();
    assert_eq!(stored, vec!["foxtail", "indica", "japonica"]);
    let snapshot: Vec<Vec<u8>> = stored
        .iter()
        .map(|id| {
            let model: NicheModel = run.store.load(ArtifactKind::Model, id).unwrap();
            assert_eq!(&model.cultivar, id);
            assert_eq!(model.levels.len(), 3);
            fs::read(run.store.path(ArtifactKind::Model, id)).unwrap()
        })
        .collect();

    // Under the default policy the unanimous cultivar gets a constant model
    // and the existing ones are left as they were.
    let config = RunConfig {
        degenerate_policy: DegeneratePolicy::Constant,
        ..config
    };
    let (run, result) = fit_with(&config);
    result.unwrap();

    let upland: NicheModel = run.store.load(ArtifactKind::Model, "upland").unwrap();
    for cell in 0..upland.cell_count() {
        assert!(upland.curve(cell).iter().all(|&v| v == 0.0));
    }
    for (id, bytes) in stored.iter().zip(snapshot) {
        assert_eq!(fs::read(run.store.path(ArtifactKind::Model, id)).unwrap(), bytes, "{id} changed");
    }
}
