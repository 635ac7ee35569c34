use crfseg::{Context, FeatureSpace, Flag, Instance, Tag, Vocabulary};
use rand::prelude::*;
use rand::rngs::StdRng;

const NUM_WORDS: usize = 6;

fn random_weights(rng: &mut StdRng, space: &FeatureSpace) -> Vec<f64> {
    (0..space.len()).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn random_items(rng: &mut StdRng, n: usize) -> Vec<u32> {
    (0..n)
        .map(|_| rng.gen_range(2..NUM_WORDS as u32))
        .collect()
}

/// Every tag sequence of length `n`, bracketed by the sentinels
fn all_paths(n: usize) -> Vec<Vec<Tag>> {
    let mut paths = vec![vec![Tag::START]];
    for _ in 0..n {
        paths = paths
            .into_iter()
            .flat_map(|p| {
                Tag::ALL.iter().map(move |&t| {
                    let mut q = p.clone();
                    q.push(t);
                    q
                })
            })
            .collect();
    }
    for p in paths.iter_mut() {
        p.push(Tag::END);
    }
    paths
}

fn lattice(space: &FeatureSpace, weights: &[f64], items: &[u32], flag: Flag) -> (Context, Vec<u32>) {
    let inst = Instance::new(items, &vec![Tag::S; items.len()]).unwrap();
    let positions = space.observe(&inst.items);
    let mut ctx = Context::new(flag);
    ctx.compute_potentials(weights, &positions);
    (ctx, inst.items)
}

#[test]
fn test_probabilities_sum_to_one() {
    let mut rng = StdRng::seed_from_u64(7);
    let space = FeatureSpace::enumerate(NUM_WORDS).unwrap();
    for n in 1..=4 {
        let weights = random_weights(&mut rng, &space);
        let items = random_items(&mut rng, n);
        let (mut ctx, _) = lattice(&space, &weights, &items, Flag::MARGINALS);
        ctx.forward();

        let total: f64 = all_paths(n)
            .iter()
            .map(|p| ctx.log_probability(p).exp())
            .sum();
        assert!((total - 1.0).abs() < 1e-9, "n = {}: {}", n, total);
    }
}

#[test]
fn test_path_score_matches_direct_potentials() {
    let mut rng = StdRng::seed_from_u64(11);
    let space = FeatureSpace::enumerate(NUM_WORDS).unwrap();
    let weights = random_weights(&mut rng, &space);
    let items = random_items(&mut rng, 3);
    let (ctx, x) = lattice(&space, &weights, &items, Flag::MARGINALS);

    for path in all_paths(3) {
        let direct: f64 = (1..x.len())
            .map(|i| space.log_potential_at(&weights, &x, path[i - 1], path[i], i))
            .sum();
        assert!((ctx.path_score(&path) - direct).abs() < 1e-12);
    }
}

#[test]
fn test_viterbi_is_optimal() {
    let mut rng = StdRng::seed_from_u64(42);
    let space = FeatureSpace::enumerate(NUM_WORDS).unwrap();
    for n in 1..=4 {
        let weights = random_weights(&mut rng, &space);
        let items = random_items(&mut rng, n);
        let (mut ctx, _) = lattice(&space, &weights, &items, Flag::VITERBI | Flag::MARGINALS);

        let best = all_paths(n)
            .iter()
            .map(|p| ctx.path_score(p))
            .fold(f64::NEG_INFINITY, f64::max);

        let (tags, score) = ctx.viterbi();
        assert_eq!(tags.len(), n);
        assert!((score - best).abs() < 1e-9);

        let mut path = vec![Tag::START];
        path.extend(&tags);
        path.push(Tag::END);
        assert!((ctx.path_score(&path) - best).abs() < 1e-9);
    }
}

#[test]
fn test_zero_weights_decode_to_lowest_tag() {
    let space = FeatureSpace::enumerate(NUM_WORDS).unwrap();
    let weights = vec![0.0; space.len()];
    let (mut ctx, _) = lattice(&space, &weights, &[2, 3, 4], Flag::VITERBI);
    let (tags, score) = ctx.viterbi();
    assert_eq!(tags, vec![Tag::B, Tag::B, Tag::B]);
    assert_eq!(score, 0.0);
}

#[test]
fn test_unknown_words_score_nothing() {
    let space = FeatureSpace::enumerate(NUM_WORDS).unwrap();
    let weights = vec![1.0; space.len()];
    let x = [Vocabulary::START, Vocabulary::UNKNOWN, Vocabulary::END];
    for &prev in &Tag::ALL {
        for &cur in &Tag::ALL {
            // Only the start sentinel at offset -1 and the end sentinel at +1 remain
            assert_eq!(space.active_features(&x, prev, cur, 1).len(), 2);
        }
    }
}
