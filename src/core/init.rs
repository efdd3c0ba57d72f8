//! 초기 파라미터 구성
//!
//! 프로토타입은 클래스당 하나면 클래스 무게중심에, 여러 개면 서로 다른 데이터
//! 포인트 위에 놓는다. 직사각 오메가는 표본 공분산의 고유 분해에서 출발한다.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::model::{ClassLabel, DataPoint, OmegaMatrix, Prototype, PrototypeSet};
use crate::random::DataRandomizer;

/// 공분산 추정에 쓰는 표본 수 상한
const COVARIANCE_SAMPLE_LIMIT: usize = 100;
/// 고유값 역수를 취하기 전의 하한
const EIGENVALUE_FLOOR: f64 = 1e-4;

/// 클래스별 개수 지시에 따라 초기 프로토타입 목록을 만든다
///
/// 개수가 1이면 해당 클래스의 무게중심, 2 이상이면 그 클래스의 서로 다른 데이터
/// 포인트들을 비복원으로 골라 그대로 복사한다.
pub fn initialize_prototypes(
    randomizer: &mut DataRandomizer,
    data: &[DataPoint],
    counts: &BTreeMap<ClassLabel, usize>,
) -> Result<PrototypeSet> {
    let mut grouped: BTreeMap<ClassLabel, Vec<&DataPoint>> = BTreeMap::new();
    for point in data {
        grouped.entry(point.label()).or_default().push(point);
    }

    let mut prototypes = Vec::new();
    for (&label, &count) in counts {
        let Some(members) = grouped.get(&label) else {
            bail!("no training data for class {}", label);
        };
        if count == 0 {
            bail!("class {} requests zero prototypes", label);
        }
        if count == 1 {
            prototypes.push(Prototype::new(centroid(members), label));
            continue;
        }
        if count > members.len() {
            bail!(
                "class {} requests {} prototypes but only has {} data points",
                label,
                count,
                members.len()
            );
        }
        for point in randomizer.distinct_points(members, count) {
            prototypes.push(Prototype::from_data_point(point));
        }
    }

    Ok(PrototypeSet::new(prototypes))
}

fn centroid(members: &[&DataPoint]) -> DVector<f64> {
    let dimension = members[0].dimension();
    let mut sum = DVector::zeros(dimension);
    for point in members {
        sum += point.values();
    }
    sum / members.len() as f64
}

/// 초기 오메가 행렬을 만든다
///
/// 정방이면 항등 그대로 쓰고, 임베딩 차원이 데이터 차원보다 작으면 표본
/// 공분산의 고유 벡터 열들을 역고유값으로 스케일한 `V·Λ⁻¹` 의 앞쪽 행들을
/// 잘라 trace(lambda) 기준으로 재정규화한다.
pub fn initialize_omega(
    randomizer: &mut DataRandomizer,
    data: &[DataPoint],
    omega_dimension: usize,
    data_dimension: usize,
) -> OmegaMatrix {
    if omega_dimension == data_dimension {
        return OmegaMatrix::identity(data_dimension);
    }

    let samples = randomizer.sample_at_most(data, COVARIANCE_SAMPLE_LIMIT);
    let covariance = sample_covariance(&samples, data_dimension);
    let eigen = SymmetricEigen::new(covariance);

    let inverted = eigen
        .eigenvalues
        .map(|eigenvalue| 1.0 / eigenvalue.max(EIGENVALUE_FLOOR));
    let scaled = eigen.eigenvectors * DMatrix::from_diagonal(&inverted);

    let omega = scaled.rows(0, omega_dimension).into_owned();
    OmegaMatrix::new(omega).normalized()
}

/// 베셀 보정(n-1, 하한 1)을 적용한 표본 공분산
fn sample_covariance(samples: &[&DataPoint], data_dimension: usize) -> DMatrix<f64> {
    let mut mean = DVector::zeros(data_dimension);
    for point in samples {
        mean += point.values();
    }
    mean /= samples.len() as f64;

    let mut covariance = DMatrix::zeros(data_dimension, data_dimension);
    for point in samples {
        let centered = point.values() - &mean;
        covariance += &centered * centered.transpose();
    }
    covariance / (samples.len() as f64 - 1.0).max(1.0)
}
