use rayon::prelude::*;

use crate::core::sigmoid::SigmoidFunction;
use crate::model::{ClassLabel, DataPoint, NUMERIC_CUTOFF, OmegaMatrix, PrototypeSet};

/// 양성 클래스로 취급하는 라벨
pub const POSITIVE_CLASS_LABEL: f64 = 0.0;
/// 음성 클래스로 취급하는 라벨
pub const NEGATIVE_CLASS_LABEL: f64 = 1.0;

/// 소프트 혼동 행렬. 2-클래스 문제 전용
///
/// TP/TN/FP/FN 을 이진 카운트 대신 마진 시그모이드 값(또는 그 보수)의 합으로
/// 근사하고, 양성/음성 표본 수로 나눠 정규화한다. 혼동 행렬 기반 목적 함수와
/// 그에 대응하는 포인트별 업데이트 가중치를 모두 여기서 계산한다.
#[derive(Debug, Clone, Default)]
pub struct ConfusionMatrix {
    true_positive: f64,
    true_negative: f64,
    false_positive: f64,
    false_negative: f64,
}

/// 병렬 축약용 부분 합
#[derive(Debug, Clone, Copy, Default)]
struct SoftCounts {
    true_positive: f64,
    true_negative: f64,
    false_positive: f64,
    false_negative: f64,
    positives: usize,
    negatives: usize,
}

impl SoftCounts {
    fn merge(mut self, other: SoftCounts) -> SoftCounts {
        self.true_positive += other.true_positive;
        self.true_negative += other.true_negative;
        self.false_positive += other.false_positive;
        self.false_negative += other.false_negative;
        self.positives += other.positives;
        self.negatives += other.negatives;
        self
    }
}

impl ConfusionMatrix {
    /// 배치 전체를 병렬로 훑어 소프트 카운트를 누적하고 정규화한다
    pub fn from_batch(
        pool: &rayon::ThreadPool,
        sigmoid: &SigmoidFunction,
        batch: &[&DataPoint],
        prototypes: &PrototypeSet,
        omega: &OmegaMatrix,
    ) -> Self {
        let counts = pool.install(|| {
            batch
                .par_iter()
                .map(|point| Self::evaluate_data_point(sigmoid, point, prototypes, omega))
                .reduce(SoftCounts::default, SoftCounts::merge)
        });

        let positives = (counts.positives as f64).max(NUMERIC_CUTOFF);
        let negatives = (counts.negatives as f64).max(NUMERIC_CUTOFF);
        ConfusionMatrix {
            true_positive: counts.true_positive / positives,
            false_negative: counts.false_negative / positives,
            true_negative: counts.true_negative / negatives,
            false_positive: counts.false_positive / negatives,
        }
    }

    fn evaluate_data_point(
        sigmoid: &SigmoidFunction,
        point: &DataPoint,
        prototypes: &PrototypeSet,
        omega: &OmegaMatrix,
    ) -> SoftCounts {
        let winners = point.winning_information(omega, prototypes);
        let d_same = winners.distance_same_class;
        let d_other = winners.distance_other_class;
        let correctly_classified = d_same < d_other;
        let fmu = sigmoid.evaluate((d_other - d_same) / (d_same + d_other).max(NUMERIC_CUTOFF));

        let mut counts = SoftCounts::default();
        if is_positive(point.label()) {
            counts.positives = 1;
            if correctly_classified {
                counts.true_positive = fmu;
            } else {
                counts.false_negative = 1.0 - fmu;
            }
        } else {
            counts.negatives = 1;
            if correctly_classified {
                counts.true_negative = fmu;
            } else {
                counts.false_positive = 1.0 - fmu;
            }
        }
        counts
    }

    /// `w1·TP + w2·TN`
    pub fn weighted_accuracy(&self, true_positive_weight: f64, true_negative_weight: f64) -> f64 {
        self.true_positive * true_positive_weight + self.true_negative * true_negative_weight
    }

    /// 가중 정확도의 포인트별 업데이트 가중치 (클래스 지시자에 대한 도함수)
    pub fn weighted_accuracy_update(
        &self,
        point: &DataPoint,
        true_positive_weight: f64,
        true_negative_weight: f64,
    ) -> f64 {
        let kronecker = kronecker_delta(point);
        true_positive_weight * kronecker + true_negative_weight * (1.0 - kronecker)
    }

    /// `wp·precision + wr·recall`
    pub fn precision_recall(&self, precision_weight: f64, recall_weight: f64) -> f64 {
        let precision =
            self.true_positive / (self.true_positive + self.false_positive).max(NUMERIC_CUTOFF);
        let recall =
            self.true_positive / (self.true_positive + self.false_negative).max(NUMERIC_CUTOFF);
        precision_weight * precision + recall_weight * recall
    }

    /// precision/recall 가중 합의 포인트별 업데이트 가중치 (원본 수식 그대로)
    pub fn precision_recall_update(
        &self,
        point: &DataPoint,
        precision_weight: f64,
        recall_weight: f64,
    ) -> f64 {
        let kronecker = kronecker_delta(point);
        let denominator = (self.true_positive + self.false_positive)
            .powi(2)
            .max(NUMERIC_CUTOFF);
        let precision_term = precision_weight
            * (kronecker * self.false_positive + (1.0 - kronecker) * self.true_positive)
            / denominator;
        let recall_term = recall_weight
            * (kronecker * self.false_negative + kronecker + self.true_positive)
            / denominator;
        precision_term + recall_term
    }

    /// `(1+β)·TP / ((1+β)·TP + β·FN + FP)`
    pub fn f_measure(&self, beta: f64) -> f64 {
        (1.0 + beta) * self.true_positive
            / ((1.0 + beta) * self.true_positive + beta * self.false_negative + self.false_positive)
                .max(NUMERIC_CUTOFF)
    }

    /// F-measure 의 포인트별 업데이트 가중치
    pub fn f_measure_update(&self, point: &DataPoint, beta: f64) -> f64 {
        let kronecker = kronecker_delta(point);
        let t1 = (1.0 + beta)
            / ((1.0 + beta) * self.true_positive + beta * self.false_negative + self.false_positive)
                .powi(2)
                .max(NUMERIC_CUTOFF);
        let t2 = kronecker
            * (beta * self.false_negative
                + self.false_positive
                + (beta - 1.0) * self.true_positive)
            + self.true_positive;
        t1 * t2
    }

    pub fn true_positive(&self) -> f64 {
        self.true_positive
    }

    pub fn true_negative(&self) -> f64 {
        self.true_negative
    }

    pub fn false_positive(&self) -> f64 {
        self.false_positive
    }

    pub fn false_negative(&self) -> f64 {
        self.false_negative
    }
}

fn is_positive(label: ClassLabel) -> bool {
    label == ClassLabel::new(POSITIVE_CLASS_LABEL)
}

/// 양성 클래스 라벨이면 1.0, 아니면 0.0
fn kronecker_delta(point: &DataPoint) -> f64 {
    if is_positive(point.label()) {
        1.0
    } else {
        0.0
    }
}
