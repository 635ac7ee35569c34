//! Feature counts behind the log-likelihood gradient.

use crate::context::Context;
use crate::dataset::Instance;
use crate::feature::PositionFeatures;
use crate::tag::Tag;

/// Add the observed feature counts of the gold labels into `counts`.
///
/// Every transition of the bracketed label sequence is counted, including
/// the one into the end sentinel.
pub fn observed_counts_into(inst: &Instance, positions: &[PositionFeatures], counts: &mut [f64]) {
    for (i, pair) in inst.labels.windows(2).enumerate() {
        for fid in positions[i + 1].ids(pair[0], pair[1]) {
            counts[fid as usize] += 1.0;
        }
    }
}

/// Add the model expectation of every feature into `counts`.
///
/// The context must hold the potentials, forward and backward scores of the
/// same sequence.
pub fn expected_counts_into(ctx: &Context, positions: &[PositionFeatures], counts: &mut [f64]) {
    let t = ctx.num_items() + 2;
    for (i, pos) in positions.iter().enumerate().take(t).skip(1) {
        for &prev in &Tag::ALL {
            for &cur in &Tag::ALL {
                let prob = ctx.marginal(i, prev, cur);
                if prob == 0.0 {
                    continue;
                }
                for fid in pos.ids(prev, cur) {
                    counts[fid as usize] += prob;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Flag;
    use crate::feature::FeatureSpace;

    #[test]
    fn test_observed_counts() {
        let space = FeatureSpace::enumerate(4).unwrap();
        let inst = Instance::new(&[2, 3], &[Tag::B, Tag::E]).unwrap();
        let positions = space.observe(&inst.items);
        let mut counts = vec![0.0; space.len()];
        observed_counts_into(&inst, &positions, &mut counts);

        // Three transitions; unigram features fire 4, 4 and 3 times, one bigram each
        assert_eq!(counts.iter().sum::<f64>(), 4.0 + 4.0 + 3.0 + 3.0);
        for (fid, &count) in counts.iter().enumerate() {
            if count > 0.0 {
                let feature = space.feature_at(fid as u32).unwrap();
                let fires = (1..inst.items.len()).any(|i| {
                    feature.fires(&inst.items, inst.labels[i - 1], inst.labels[i], i)
                });
                assert!(fires, "{:?}", feature);
            }
        }
    }

    #[test]
    fn test_expected_counts_total() {
        let space = FeatureSpace::enumerate(4).unwrap();
        let inst = Instance::new(&[2, 3], &[Tag::B, Tag::E]).unwrap();
        let positions = space.observe(&inst.items);
        let weights: Vec<f64> = (0..space.len()).map(|i| (i % 5) as f64 * 0.1).collect();

        let mut ctx = Context::new(Flag::MARGINALS);
        ctx.compute_potentials(&weights, &positions);
        ctx.forward();
        ctx.backward();

        let mut expected = vec![0.0; space.len()];
        expected_counts_into(&ctx, &positions, &mut expected);

        // Each position's marginals sum to one, so the mass equals the
        // number of features firing per transition.
        assert!((expected.iter().sum::<f64>() - 14.0).abs() < 1e-9);
    }
}
