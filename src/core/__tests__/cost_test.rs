use approx::assert_relative_eq;
use nalgebra::DVector;

use crate::core::cost::confusion::ConfusionMatrix;
use crate::core::cost::{CostFunctionCalculator, CostFunctionType};
use crate::core::sigmoid::SigmoidFunction;
use crate::model::{ClassLabel, DataPoint, OmegaMatrix, Prototype, PrototypeSet};

fn pool() -> rayon::ThreadPool {
    rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap()
}

/// 완전히 분리되는 2-클래스 배치 (라벨 0.0 = 양성, 1.0 = 음성)
fn separable_batch() -> Vec<DataPoint> {
    vec![
        DataPoint::from_values(&[0.0, 0.0], 0.0),
        DataPoint::from_values(&[0.0, 1.0], 0.0),
        DataPoint::from_values(&[5.0, 5.0], 1.0),
        DataPoint::from_values(&[5.0, 6.0], 1.0),
    ]
}

fn centroid_prototypes() -> PrototypeSet {
    PrototypeSet::new(vec![
        Prototype::new(DVector::from_row_slice(&[0.0, 0.5]), ClassLabel::new(0.0)),
        Prototype::new(DVector::from_row_slice(&[5.0, 5.5]), ClassLabel::new(1.0)),
    ])
}

#[test]
fn 가중치_합이_1이_아니면_거부된다() {
    let result = CostFunctionCalculator::new(
        CostFunctionType::WeightedAccuracy,
        &[],
        None,
        Some([0.3, 0.4]),
    );
    assert!(result.is_err());
}

#[test]
fn 베타_없는_F_measure_요청은_거부된다() {
    let result = CostFunctionCalculator::new(CostFunctionType::FMeasure, &[], None, Some([0.5, 0.5]));
    assert!(result.is_err());
    assert!(
        CostFunctionCalculator::new(CostFunctionType::FMeasure, &[], Some(2.0), None).is_ok(),
        "베타만 있으면 충분해야 함"
    );
}

#[test]
fn 가중치_없는_가중_정확도_요청은_거부된다() {
    assert!(CostFunctionCalculator::new(CostFunctionType::WeightedAccuracy, &[], None, None).is_err());
}

#[test]
fn 완전_분리_배치의_소프트_혼동_행렬() {
    let pool = pool();
    let sigmoid = SigmoidFunction::new(1.0, 1.0, 10).unwrap();
    let batch = separable_batch();
    let refs: Vec<&DataPoint> = batch.iter().collect();
    let prototypes = centroid_prototypes();
    let omega = OmegaMatrix::disabled();

    let confusion = ConfusionMatrix::from_batch(&pool, &sigmoid, &refs, &prototypes, &omega);

    assert!(confusion.true_positive() > 0.5, "정분류된 양성은 시그모이드 신뢰도로 집계");
    assert!(confusion.true_negative() > 0.5);
    assert_eq!(confusion.false_positive(), 0.0);
    assert_eq!(confusion.false_negative(), 0.0);

    // 오류 항이 0이므로 F-measure 와 precision/recall 은 정확히 1
    assert_relative_eq!(confusion.f_measure(2.0), 1.0, epsilon = 1e-12);
    assert_relative_eq!(confusion.precision_recall(0.5, 0.5), 1.0, epsilon = 1e-12);
}

#[test]
fn 오분류는_보수로_집계된다() {
    let pool = pool();
    let sigmoid = SigmoidFunction::new(1.0, 1.0, 10).unwrap();
    // 양성 라벨인데 음성 영역에 있는 포인트
    let batch = vec![
        DataPoint::from_values(&[5.0, 5.4], 0.0),
        DataPoint::from_values(&[5.0, 6.0], 1.0),
    ];
    let refs: Vec<&DataPoint> = batch.iter().collect();
    let prototypes = centroid_prototypes();
    let omega = OmegaMatrix::disabled();

    let confusion = ConfusionMatrix::from_batch(&pool, &sigmoid, &refs, &prototypes, &omega);
    assert_eq!(confusion.true_positive(), 0.0);
    assert!(confusion.false_negative() > 0.5, "음의 마진의 보수는 0.5 를 넘어야 함");
    assert!(confusion.true_negative() > 0.5);
}

#[test]
fn 평가는_추적하는_모든_목적_함수를_보고한다() {
    let pool = pool();
    let sigmoid = SigmoidFunction::new(1.0, 1.0, 10).unwrap();
    let batch = separable_batch();
    let refs: Vec<&DataPoint> = batch.iter().collect();
    let prototypes = centroid_prototypes();
    let omega = OmegaMatrix::disabled();

    let mut calculator = CostFunctionCalculator::new(
        CostFunctionType::DefaultCost,
        &[CostFunctionType::ClassificationAccuracy],
        None,
        None,
    )
    .unwrap();
    let report = calculator.evaluate(&pool, &sigmoid, &refs, &prototypes, &omega);

    assert_eq!(
        report.value(CostFunctionType::ClassificationAccuracy),
        Some(1.0),
        "완전 분리 배치는 정확도 1"
    );
    let default_cost = report.value(CostFunctionType::DefaultCost).unwrap();
    assert!(default_cost > 0.5, "옳은 분류는 음의 마진 시그모이드를 가짐");
    assert_eq!(report.optimized(), default_cost);
}

#[test]
fn 그래디언트_가중치는_혼동_행렬_목적일_때만_1이_아니다() {
    let pool = pool();
    let sigmoid = SigmoidFunction::new(1.0, 1.0, 10).unwrap();
    let batch = separable_batch();
    let refs: Vec<&DataPoint> = batch.iter().collect();
    let prototypes = centroid_prototypes();
    let omega = OmegaMatrix::disabled();

    let mut default_calculator =
        CostFunctionCalculator::new(CostFunctionType::DefaultCost, &[], None, None).unwrap();
    default_calculator.evaluate(&pool, &sigmoid, &refs, &prototypes, &omega);
    assert_eq!(default_calculator.gradient_weight(&batch[0]), 1.0);

    let mut weighted_calculator = CostFunctionCalculator::new(
        CostFunctionType::WeightedAccuracy,
        &[],
        None,
        Some([0.7, 0.3]),
    )
    .unwrap();
    weighted_calculator.evaluate(&pool, &sigmoid, &refs, &prototypes, &omega);
    // 양성 포인트는 w1, 음성 포인트는 w2
    assert_relative_eq!(weighted_calculator.gradient_weight(&batch[0]), 0.7, epsilon = 1e-12);
    assert_relative_eq!(weighted_calculator.gradient_weight(&batch[2]), 0.3, epsilon = 1e-12);
}

#[test]
fn 평가_전의_그래디언트_가중치는_1이다() {
    let calculator = CostFunctionCalculator::new(
        CostFunctionType::WeightedAccuracy,
        &[],
        None,
        Some([0.5, 0.5]),
    )
    .unwrap();
    let point = DataPoint::from_values(&[0.0], 0.0);
    assert_eq!(calculator.gradient_weight(&point), 1.0, "혼동 행렬이 없으면 중립 가중치");
}
