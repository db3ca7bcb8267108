use ssd_style_transfer::loss::{content_loss, style_loss, total_loss};
use ssd_style_transfer::stats::{encode, gram, Features};
use ssd_style_transfer::{LossWeights, StyleError};
use tch::{kind, Tensor};

use test_utils::*;

#[test]
fn gram_values() {
    // One row of two positions, two channels: (1, 2) and (3, 4).
    let act = Tensor::from_slice(&[1f32, 2., 3., 4.]).view([1, 1, 2, 2]);
    let g = gram(&act).unwrap();
    assert_eq!(g.size(), [1, 2, 2]);
    assert_eq!(Vec::<f32>::try_from(&g.view([-1])).unwrap(), [5., 7., 7., 10.]);
}

#[test]
fn gram_is_symmetric() {
    tch::manual_seed(1);
    let act = Tensor::randn([1, 5, 7, 3], kind::FLOAT_CPU);
    let g = gram(&act).unwrap();
    assert_eq!(g.size(), [1, 3, 3]);
    assert!(g.allclose(&g.transpose(1, 2), 1e-5, 1e-6, false));
}

#[test]
fn gram_rejects_non_4d_input() {
    let act = Tensor::zeros([5, 7, 3], kind::FLOAT_CPU);
    assert!(gram(&act).is_err());
}

#[test]
fn identical_features_have_zero_loss() {
    let extractor = small_extractor();
    let img = Tensor::rand([1, 300, 300, 3], kind::FLOAT_CPU) * 255.0;
    let features = encode(extractor.activations(&img).unwrap()).unwrap();
    let targets = features.detach();
    let loss = total_loss(&LossWeights::default(), &features, &targets).unwrap();
    assert_eq!(f64_from(&loss), 0.0);
}

#[test]
fn loss_terms() {
    let ones = Tensor::ones([1, 2, 2], kind::FLOAT_CPU);
    let zeros = Tensor::zeros([1, 2, 2], kind::FLOAT_CPU);
    let style = style_loss(&[ones.copy(), ones.copy()], &[zeros.copy(), zeros.copy()]).unwrap();
    assert_eq!(f64_from(&style), 2.0);

    let content_ones = Tensor::ones([1, 2, 2, 3], kind::FLOAT_CPU);
    let content_zeros = Tensor::zeros([1, 2, 2, 3], kind::FLOAT_CPU);
    let content = content_loss(&content_ones, &content_zeros).unwrap();
    assert_eq!(f64_from(&content), 6.0);

    let generated = Features { style: vec![ones.copy()], content: content_ones };
    let targets = Features { style: vec![zeros.copy()], content: content_zeros };
    let total = f64_from(&total_loss(&LossWeights::default(), &generated, &targets).unwrap());
    assert!((total - 1.0).abs() < 1e-6, "{total}");
    let weights = LossWeights { style: 0.5, content: 1.0 };
    let total = f64_from(&total_loss(&weights, &generated, &targets).unwrap());
    assert!((total - 6.5).abs() < 1e-6, "{total}");
}

#[test]
fn loss_rejects_mismatched_inputs() {
    let ones = Tensor::ones([1, 2, 2], kind::FLOAT_CPU);
    assert!(matches!(style_loss(&[ones.copy()], &[]), Err(StyleError::Shape(_))));
    let a = Tensor::ones([1, 2, 2, 3], kind::FLOAT_CPU);
    let b = Tensor::ones([1, 2, 3, 3], kind::FLOAT_CPU);
    assert!(matches!(content_loss(&a, &b), Err(StyleError::Shape(_))));
}
