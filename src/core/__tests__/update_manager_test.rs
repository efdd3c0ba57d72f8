use approx::assert_relative_eq;
use nalgebra::DVector;

use crate::core::cost::{CostFunctionCalculator, CostFunctionType};
use crate::core::sigmoid::SigmoidFunction;
use crate::core::update_manager::{ControllerSettings, UpdateManager};
use crate::model::{ClassLabel, DataPoint, OmegaMatrix, Prototype, PrototypeSet};
use crate::random::DataRandomizer;

fn settings(ratio: f64) -> ControllerSettings {
    ControllerSettings {
        prototype_learning_rate: 1.0,
        omega_learning_rate: 1.0,
        learning_rate_change: 0.01,
        stop_epsilon: 1e-9,
        data_point_ratio: ratio,
        total_epochs: 10,
    }
}

#[test]
fn 초기_비용은_서브샘플이_아니라_전체_데이터로_평가된다() {
    // 포인트별 마진이 전부 달라서 서브샘플 평균으로는 전체 평균이 나올 수 없다
    let data: Vec<DataPoint> = (0..10)
        .map(|index| {
            let value = index as f64;
            DataPoint::from_values(&[value, value * 0.5], if index < 5 { 0.0 } else { 1.0 })
        })
        .collect();
    let prototypes = PrototypeSet::new(vec![
        Prototype::new(DVector::from_row_slice(&[2.0, 1.0]), ClassLabel::new(0.0)),
        Prototype::new(DVector::from_row_slice(&[7.0, 3.5]), ClassLabel::new(1.0)),
    ]);
    let omega = OmegaMatrix::disabled();
    let sigmoid = SigmoidFunction::new(1.0, 10.0, 10).unwrap();

    let manager = UpdateManager::new(
        prototypes.clone(),
        omega.clone(),
        sigmoid.clone(),
        CostFunctionCalculator::new(CostFunctionType::DefaultCost, &[], None, None).unwrap(),
        DataRandomizer::new(Some(3)),
        settings(0.2),
        &data,
    )
    .unwrap();

    let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
    let refs: Vec<&DataPoint> = data.iter().collect();
    let mut direct =
        CostFunctionCalculator::new(CostFunctionType::DefaultCost, &[], None, None).unwrap();
    let expected = direct.evaluate(&pool, &sigmoid, &refs, &prototypes, &omega);

    assert_relative_eq!(
        manager.initial_report().optimized(),
        expected.optimized(),
        epsilon = 1e-9
    );
}
