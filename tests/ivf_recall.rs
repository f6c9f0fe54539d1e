//! IVF behavior against the flat index as ground truth.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use nabor::{Engine, IndexKind, IndexSpec, Metric, SearchParams};

fn random_rows(rng: &mut StdRng, rows: usize, dim: usize) -> Vec<f32> {
    (0..rows * dim).map(|_| rng.random_range(-1.0f32..1.0)).collect()
}

#[test]
fn probing_every_partition_matches_flat_exactly() {
    let dim = 8;
    let nlist = 4;
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let data = random_rows(&mut rng, 1000, dim);

    let mut flat = Engine::new(IndexSpec::new(dim, Metric::L2, IndexKind::Flat)).unwrap();
    flat.add(&data).unwrap();

    let ivf_spec = IndexSpec::new(dim, Metric::L2, IndexKind::Ivf)
        .with_nlist(nlist)
        .with_seed(42);
    let mut ivf = Engine::new(ivf_spec).unwrap();
    ivf.add(&data).unwrap();
    ivf.train().unwrap();

    assert_eq!(flat.size(), 1000);
    assert_eq!(ivf.size(), 1000);

    let params = SearchParams::new(10).with_nprobe(nlist);
    for _ in 0..10 {
        let query = random_rows(&mut rng, 1, dim);
        let expected = flat.search(&query, 10).unwrap();
        let got = ivf.search_with(&query, params).unwrap();

        let expected_ids: Vec<i64> = expected.iter().map(|h| h.id).collect();
        let got_ids: Vec<i64> = got.iter().map(|h| h.id).collect();
        assert_eq!(got_ids, expected_ids);
        for (e, g) in expected.iter().zip(got.iter()) {
            assert_eq!(e.score.to_bits(), g.score.to_bits());
        }
    }
}

#[test]
fn normalized_cosine_ivf_matches_flat_with_full_probing() {
    let dim = 6;
    let nlist = 3;
    let mut rng = StdRng::seed_from_u64(99);
    let data = random_rows(&mut rng, 300, dim);

    let mut flat = Engine::new(
        IndexSpec::new(dim, Metric::Cosine, IndexKind::Flat).with_normalize(true),
    )
    .unwrap();
    flat.add(&data).unwrap();

    let mut ivf = Engine::new(
        IndexSpec::new(dim, Metric::Cosine, IndexKind::Ivf)
            .with_normalize(true)
            .with_nlist(nlist)
            .with_seed(5),
    )
    .unwrap();
    ivf.add(&data).unwrap();
    ivf.train().unwrap();

    let params = SearchParams::new(5).with_nprobe(nlist);
    let query = random_rows(&mut rng, 1, dim);
    let expected: Vec<i64> = flat.search(&query, 5).unwrap().iter().map(|h| h.id).collect();
    let got: Vec<i64> = ivf
        .search_with(&query, params)
        .unwrap()
        .iter()
        .map(|h| h.id)
        .collect();
    assert_eq!(got, expected);
}

#[test]
fn untrained_ivf_answers_from_the_staging_buffer() {
    let spec = IndexSpec::new(2, Metric::L2, IndexKind::Ivf)
        .with_nlist(4)
        .with_seed(1);
    let mut engine = Engine::new(spec).unwrap();
    engine.add(&[0.0, 0.0, 5.0, 5.0, 1.0, 1.0]).unwrap();

    let hits = engine.search(&[0.2, 0.2], 2).unwrap();
    assert_eq!(hits[0].id, 0);
    assert_eq!(hits[1].id, 2);
}

#[test]
fn same_seed_and_data_give_identical_results() {
    let dim = 4;
    let mut rng = StdRng::seed_from_u64(7);
    let data = random_rows(&mut rng, 200, dim);

    let build = || {
        let spec = IndexSpec::new(dim, Metric::L2, IndexKind::Ivf)
            .with_nlist(8)
            .with_seed(1234);
        let mut engine = Engine::new(spec).unwrap();
        engine.add(&data).unwrap();
        engine.train().unwrap();
        engine
    };
    let a = build();
    let b = build();

    let query = random_rows(&mut rng, 1, dim);
    for nprobe in [1, 2, 8] {
        let params = SearchParams::new(5).with_nprobe(nprobe);
        let ha = a.search_with(&query, params).unwrap();
        let hb = b.search_with(&query, params).unwrap();
        assert_eq!(ha, hb);
    }
}

#[test]
fn growing_nprobe_never_shrinks_recall() {
    let dim = 8;
    let mut rng = StdRng::seed_from_u64(11);
    let data = random_rows(&mut rng, 500, dim);

    let mut flat = Engine::new(IndexSpec::new(dim, Metric::L2, IndexKind::Flat)).unwrap();
    flat.add(&data).unwrap();

    let mut ivf = Engine::new(
        IndexSpec::new(dim, Metric::L2, IndexKind::Ivf)
            .with_nlist(10)
            .with_seed(3),
    )
    .unwrap();
    ivf.add(&data).unwrap();
    ivf.train().unwrap();

    let query = random_rows(&mut rng, 1, dim);
    let truth: Vec<i64> = flat.search(&query, 10).unwrap().iter().map(|h| h.id).collect();

    let recall = |nprobe: usize| -> usize {
        ivf.search_with(&query, SearchParams::new(10).with_nprobe(nprobe))
            .unwrap()
            .iter()
            .filter(|h| truth.contains(&h.id))
            .count()
    };

    let mut last = 0;
    for nprobe in [1, 2, 5, 10] {
        let hits = recall(nprobe);
        assert!(hits >= last, "recall dropped from {last} to {hits} at nprobe {nprobe}");
        last = hits;
    }
    assert_eq!(last, 10); // full probing is exact
}
