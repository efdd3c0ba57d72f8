//! 비용 함수 계열
//!
//! 최적화 대상 하나와 추적 전용 목적 함수 여럿을 묶어 배치 단위로 평가한다.
//! 혼동 행렬 기반 목적 함수는 마지막 평가에서 만든 행렬을 유지했다가
//! 그래디언트의 포인트별 가중치 질의에 재사용한다.

pub mod confusion;

use std::collections::HashMap;
use std::fmt;

use anyhow::{bail, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::sigmoid::SigmoidFunction;
use crate::model::{DataPoint, NUMERIC_CUTOFF, OmegaMatrix, PrototypeSet};

pub use confusion::ConfusionMatrix;

/// β 를 생략했을 때의 F-measure 기본값
pub const DEFAULT_BETA: f64 = 2.0;
/// 가중치를 생략했을 때의 기본 가중 벡터
pub const DEFAULT_WEIGHTS: [f64; 2] = [0.5, 0.5];

/// 지원하는 목적 함수들. 닫힌 집합이며 모든 값은 "클수록 좋다" 스케일이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CostFunctionType {
    /// 마진 시그모이드 평균의 보수: `1 - mean(f((dSame-dOther)/dSum))`
    DefaultCost,
    /// 분류 정확도: `1 - 오분류율`
    ClassificationAccuracy,
    /// 혼동 행렬 기반 `w1·TP + w2·TN` (2-클래스 전용)
    WeightedAccuracy,
    /// 혼동 행렬 기반 F_β (2-클래스 전용)
    FMeasure,
    /// 혼동 행렬 기반 `wp·precision + wr·recall` (2-클래스 전용)
    PrecisionRecall,
}

impl CostFunctionType {
    /// 소프트 혼동 행렬이 필요한 목적 함수인가
    pub fn requires_confusion_matrix(&self) -> bool {
        matches!(
            self,
            CostFunctionType::WeightedAccuracy
                | CostFunctionType::FMeasure
                | CostFunctionType::PrecisionRecall
        )
    }

    pub fn requires_beta(&self) -> bool {
        matches!(self, CostFunctionType::FMeasure)
    }

    pub fn requires_weights(&self) -> bool {
        matches!(
            self,
            CostFunctionType::WeightedAccuracy | CostFunctionType::PrecisionRecall
        )
    }
}

impl fmt::Display for CostFunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CostFunctionType::DefaultCost => "default cost",
            CostFunctionType::ClassificationAccuracy => "classification accuracy",
            CostFunctionType::WeightedAccuracy => "weighted accuracy",
            CostFunctionType::FMeasure => "F-measure",
            CostFunctionType::PrecisionRecall => "precision/recall",
        };
        write!(f, "{}", name)
    }
}

/// 한 번의 배치 평가 결과. 추적 중인 모든 목적 함수의 값과 최적화 대상 값
#[derive(Debug, Clone)]
pub struct CostReport {
    values: HashMap<CostFunctionType, f64>,
    optimized: f64,
}

impl CostReport {
    /// 최적화 대상 목적 함수의 값 (클수록 좋다)
    pub fn optimized(&self) -> f64 {
        self.optimized
    }

    pub fn value(&self, function: CostFunctionType) -> Option<f64> {
        self.values.get(&function).copied()
    }

    pub fn values(&self) -> &HashMap<CostFunctionType, f64> {
        &self.values
    }
}

impl fmt::Display for CostReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.values.iter().collect();
        entries.sort_by_key(|(function, _)| format!("{}", function));
        let mut first = true;
        for (function, value) in entries {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:.6}", function, value)?;
            first = false;
        }
        Ok(())
    }
}

/// 목적 함수 계산기
///
/// 수락/거부 판정에 쓰는 최적화 대상 하나와, 로깅/관측용으로만 추적하는 목적
/// 함수들을 함께 평가한다. 혼동 행렬이 필요한 경우 배치당 한 번만 만들어 모든
/// 목적 함수가 공유하고, 다음 평가 때까지 보관한다.
#[derive(Debug, Clone)]
pub struct CostFunctionCalculator {
    to_optimize: CostFunctionType,
    tracked: Vec<CostFunctionType>,
    beta: f64,
    weights: [f64; 2],
    confusion: Option<ConfusionMatrix>,
}

impl CostFunctionCalculator {
    /// 계산기 생성. 가중 벡터의 합이 정확히 1이 아니면 구성 오류
    pub fn new(
        to_optimize: CostFunctionType,
        additional: &[CostFunctionType],
        beta: Option<f64>,
        weights: Option<[f64; 2]>,
    ) -> Result<Self> {
        let mut tracked = vec![to_optimize];
        for &function in additional {
            if !tracked.contains(&function) {
                tracked.push(function);
            }
        }

        if tracked.iter().any(|f| f.requires_beta()) && beta.is_none() {
            bail!("cost function {} requires a beta parameter", to_optimize);
        }
        if tracked.iter().any(|f| f.requires_weights()) && weights.is_none() {
            bail!("cost function {} requires a weight vector", to_optimize);
        }
        if let Some([first, second]) = weights {
            if first + second != 1.0 {
                bail!(
                    "cost function weights must sum to 1.0, got {} + {} = {}",
                    first,
                    second,
                    first + second
                );
            }
        }

        Ok(CostFunctionCalculator {
            to_optimize,
            tracked,
            beta: beta.unwrap_or(DEFAULT_BETA),
            weights: weights.unwrap_or(DEFAULT_WEIGHTS),
            confusion: None,
        })
    }

    pub fn to_optimize(&self) -> CostFunctionType {
        self.to_optimize
    }

    pub fn tracked(&self) -> &[CostFunctionType] {
        &self.tracked
    }

    /// 추적 중인 목적 함수 중 혼동 행렬이 필요한 것이 있는가
    pub fn requires_confusion_matrix(&self) -> bool {
        self.tracked.iter().any(|f| f.requires_confusion_matrix())
    }

    /// 현재 파라미터로 배치를 평가한다
    ///
    /// 혼동 행렬이 필요하면 여기서 한 번 만들어 보관한다. 이후의
    /// `gradient_weight` 질의는 이 행렬을 근거로 답한다.
    pub fn evaluate(
        &mut self,
        pool: &rayon::ThreadPool,
        sigmoid: &SigmoidFunction,
        batch: &[&DataPoint],
        prototypes: &PrototypeSet,
        omega: &OmegaMatrix,
    ) -> CostReport {
        if self.requires_confusion_matrix() {
            self.confusion = Some(ConfusionMatrix::from_batch(
                pool, sigmoid, batch, prototypes, omega,
            ));
        }

        let mut values = HashMap::with_capacity(self.tracked.len());
        for &function in &self.tracked {
            let value = match function {
                CostFunctionType::DefaultCost => {
                    1.0 - self.mean_over_batch(pool, batch, prototypes, omega, |winners| {
                        let sum = (winners.distance_same_class + winners.distance_other_class)
                            .max(NUMERIC_CUTOFF);
                        sigmoid.evaluate(
                            (winners.distance_same_class - winners.distance_other_class) / sum,
                        )
                    })
                }
                CostFunctionType::ClassificationAccuracy => {
                    1.0 - self.mean_over_batch(pool, batch, prototypes, omega, |winners| {
                        if winners.distance_same_class > winners.distance_other_class {
                            1.0
                        } else {
                            0.0
                        }
                    })
                }
                CostFunctionType::WeightedAccuracy => {
                    let confusion = self.confusion.as_ref().unwrap();
                    confusion.weighted_accuracy(self.weights[0], self.weights[1])
                }
                CostFunctionType::FMeasure => {
                    self.confusion.as_ref().unwrap().f_measure(self.beta)
                }
                CostFunctionType::PrecisionRecall => {
                    let confusion = self.confusion.as_ref().unwrap();
                    confusion.precision_recall(self.weights[0], self.weights[1])
                }
            };
            values.insert(function, value);
        }

        let optimized = values[&self.to_optimize];
        CostReport { values, optimized }
    }

    /// 그래디언트 누적 시 곱해지는 포인트별 가중치
    ///
    /// 혼동 행렬 기반 목적 함수를 최적화할 때만 1이 아닌 값이 나온다. 행렬은
    /// 마지막 `evaluate` 호출 시점의 것을 쓴다.
    pub fn gradient_weight(&self, point: &DataPoint) -> f64 {
        let Some(confusion) = self.confusion.as_ref() else {
            return 1.0;
        };
        match self.to_optimize {
            CostFunctionType::WeightedAccuracy => {
                confusion.weighted_accuracy_update(point, self.weights[0], self.weights[1])
            }
            CostFunctionType::FMeasure => confusion.f_measure_update(point, self.beta),
            CostFunctionType::PrecisionRecall => {
                confusion.precision_recall_update(point, self.weights[0], self.weights[1])
            }
            _ => 1.0,
        }
    }

    fn mean_over_batch<F>(
        &self,
        pool: &rayon::ThreadPool,
        batch: &[&DataPoint],
        prototypes: &PrototypeSet,
        omega: &OmegaMatrix,
        per_point: F,
    ) -> f64
    where
        F: Fn(&crate::model::WinningInformation) -> f64 + Sync,
    {
        let total: f64 = pool.install(|| {
            batch
                .par_iter()
                .map(|point| per_point(&point.winning_information(omega, prototypes)))
                .sum()
        });
        total / (batch.len() as f64).max(NUMERIC_CUTOFF)
    }
}
