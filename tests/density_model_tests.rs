//! Integration tests for the density model
//!
//! Tests bonus behaviour over repeated and novel frames, checkpoint resume
//! equivalence, and quantization of resized frames.

use cts_density::cts::Estimator;
use cts_density::{CheckpointFormat, ContextTree, DensityModel, Frame, ModelConfig, SymbolPrior};

/// Deterministic pseudo-random frames.
fn frames(count: usize, height: usize, width: usize, seed: u64) -> Vec<Frame> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            let data = (0..height * width)
                .map(|_| {
                    state = state
                        .wrapping_mul(6364136223846793005)
                        .wrapping_add(1442695040888963407);
                    ((state >> 40) % 1000) as f32 / 999.0
                })
                .collect();
            Frame::gray(height, width, data).unwrap()
        })
        .collect()
}

// ============================================================================
// Bonus Tests
// ============================================================================

#[test]
fn test_repeated_blank_frame_bonus_decays() {
    let config = ModelConfig::default()
        .with_grid(2, 2)
        .with_bins(2)
        .with_beta(0.05);
    let mut model = DensityModel::new(config).unwrap();
    let frame = Frame::gray(2, 2, vec![0.0; 4]).unwrap();

    let bonuses: Vec<f64> = (0..5).map(|_| model.update(&frame)).collect();
    assert!(bonuses[4] < bonuses[0]);
    assert!(bonuses.iter().all(|b| b.is_finite() && *b > 0.0));
}

#[test]
fn test_novel_frame_earns_larger_bonus() {
    let config = ModelConfig::default().with_grid(8, 8).with_bins(4);
    let mut model = DensityModel::new(config).unwrap();
    let familiar = Frame::gray(8, 8, vec![0.1; 64]).unwrap();
    for _ in 0..30 {
        model.update(&familiar);
    }

    let mut probe = model.clone();
    let familiar_bonus = probe.update(&familiar);

    let novel_data = (0..64).map(|i| if i % 2 == 0 { 0.9 } else { 0.4 }).collect();
    let novel = Frame::gray(8, 8, novel_data).unwrap();
    let novel_bonus = model.update(&novel);
    assert!(novel_bonus > familiar_bonus);
}

#[test]
fn test_default_model_on_atari_sized_rgb_frame() {
    let mut model = DensityModel::with_default_config().unwrap();
    let data: Vec<f32> = (0..210 * 160 * 3).map(|i| (i % 7) as f32 / 6.0).collect();
    let frame = Frame::new(210, 160, 3, data).unwrap();
    let score = model.update_scored(&frame);
    assert!(score.log_recoding_prob > score.log_prob);
    assert!(score.bonus.is_finite());
    assert_eq!(model.trees().len(), 42 * 42);
}

// ============================================================================
// Checkpoint Resume Tests
// ============================================================================

#[test]
fn test_resume_matches_uninterrupted_run() {
    let config = ModelConfig::default()
        .with_grid(6, 6)
        .with_bins(8)
        .with_symbol_prior(SymbolPrior::Jeffreys);
    let stream = frames(12, 10, 10, 7);

    let mut reference = DensityModel::new(config.clone()).unwrap();
    let expected: Vec<_> = stream.iter().map(|f| reference.update_scored(f)).collect();

    for format in [CheckpointFormat::Json, CheckpointFormat::Binary] {
        let mut first_half = DensityModel::new(config.clone()).unwrap();
        let mut resumed_scores: Vec<_> =
            stream[..5].iter().map(|f| first_half.update_scored(f)).collect();

        let bytes = first_half.to_bytes(format).unwrap();
        drop(first_half);
        let mut resumed = DensityModel::from_bytes(&bytes, format).unwrap();
        resumed_scores.extend(stream[5..].iter().map(|f| resumed.update_scored(f)));

        assert_eq!(resumed_scores, expected, "{format:?}");
        assert_eq!(resumed, reference);
    }
}

#[test]
fn test_resume_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let config = ModelConfig::default().with_grid(4, 4).with_bins(4);
    let stream = frames(6, 4, 4, 3);

    let mut reference = DensityModel::new(config.clone()).unwrap();
    let expected: Vec<f64> = stream.iter().map(|f| reference.update(f)).collect();

    let mut model = DensityModel::new(config).unwrap();
    let mut bonuses: Vec<f64> = stream[..3].iter().map(|f| model.update(f)).collect();
    model
        .save_to_file(&path, CheckpointFormat::from_path(&path))
        .unwrap();
    let mut restored = DensityModel::load_from_file(&path, CheckpointFormat::Json).unwrap();
    assert_eq!(restored.frames_seen(), 3);
    bonuses.extend(stream[3..].iter().map(|f| restored.update(f)));

    assert_eq!(bonuses, expected);
}

// ============================================================================
// Quantization Tests
// ============================================================================

#[test]
fn test_saturated_frame_stays_in_alphabet() {
    let config = ModelConfig::default().with_grid(3, 3).with_bins(4);
    let mut model = DensityModel::new(config).unwrap();
    let frame = Frame::gray(9, 9, vec![1.0; 81]).unwrap();

    assert!(model.quantize_frame(&frame).iter().all(|&s| s == 3));
    model.update(&frame);
    assert!(model.trees().iter().all(|t| t.symbols_seen() == vec![3]));
}

#[test]
fn test_out_of_range_values_are_clamped() {
    let config = ModelConfig::default().with_grid(1, 3).with_bins(8);
    let model = DensityModel::new(config).unwrap();
    let frame = Frame::gray(1, 3, vec![-0.2, 0.5, 1.7]).unwrap();
    assert_eq!(model.quantize_frame(&frame), vec![0, 4, 7]);
}

// ============================================================================
// Tree Growth and Estimator Tests
// ============================================================================

#[test]
fn test_tree_growth_bounded_by_distinct_contexts() {
    let config = ModelConfig::default().with_grid(5, 5).with_bins(2);
    let mut model = DensityModel::new(config).unwrap();
    let frame = Frame::gray(5, 5, vec![0.0; 25]).unwrap();

    model.update(&frame);
    let after_first = model.node_count();
    assert_eq!(after_first, 25 * 5);
    for _ in 0..10 {
        model.update(&frame);
    }
    assert_eq!(model.node_count(), after_first);
}

#[test]
fn test_tree_query_matches_next_observe() {
    let mut tree = ContextTree::new(8, 4, SymbolPrior::Perks).unwrap();
    let contexts = [[1, 2, 3, 4], [0, 0, 0, 0], [7, 7, 1, 1]];
    for step in 0..30usize {
        let context = contexts[step % 3];
        let symbol = (step % 5) as u8;
        let predicted = tree.query(&context, symbol);
        let observed = tree.observe(&context, symbol);
        assert!((predicted - observed).abs() < 1e-12);
    }
}

#[test]
fn test_estimator_count_total_invariant() {
    let mut estimator = Estimator::new(6, SymbolPrior::Perks.magnitude(6));
    let mut state = 11u32;
    for _ in 0..500 {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        let symbol = ((state >> 16) % 6) as u8;
        let before = estimator.probability(symbol);
        let log_prob = estimator.observe(symbol);
        assert_eq!(log_prob, before.ln());
        assert!(estimator.probability(symbol) > before);
    }
    let sum: f64 = estimator.counts().iter().sum();
    assert!((sum - estimator.count_total()).abs() < 1e-9);
}
