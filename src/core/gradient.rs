//! 병렬 그래디언트 누산
//!
//! 서브샘플을 워커별로 라운드 로빈 분할해 포인트 기여를 로컬 누산기에 모으고,
//! 누산기들을 병합한 뒤 정규화·학습률 적용까지 끝낸 후보 파라미터를 만든다.
//! 덧셈 누산이라 분할 방식과 무관하게 같은 결과가 나온다.

use nalgebra::{DMatrix, DVector};
use once_cell::sync::OnceCell;
use rayon::prelude::*;

use crate::core::cost::CostFunctionCalculator;
use crate::core::sigmoid::SigmoidFunction;
use crate::model::{DataPoint, NUMERIC_CUTOFF, OmegaMatrix, Prototype, PrototypeSet};

/// 한 스텝 동안 고정되는 현재 파라미터와 파생 값들
pub struct StepContext<'a> {
    pub prototypes: &'a PrototypeSet,
    pub omega: &'a OmegaMatrix,
    pub sigmoid: &'a SigmoidFunction,
    pub calculator: &'a CostFunctionCalculator,
    /// 거리의 프로토타입 방향 도함수에 쓰는 `-2·omegaᵗ`. relevance 학습이
    /// 꺼져 있으면 만들지 않는다.
    scaled_omega_transposed: Option<DMatrix<f64>>,
}

impl<'a> StepContext<'a> {
    pub fn new(
        prototypes: &'a PrototypeSet,
        omega: &'a OmegaMatrix,
        sigmoid: &'a SigmoidFunction,
        calculator: &'a CostFunctionCalculator,
    ) -> Self {
        let scaled_omega_transposed = if omega.relevance_learning() {
            Some(omega.matrix().transpose() * -2.0)
        } else {
            None
        };
        StepContext {
            prototypes,
            omega,
            sigmoid,
            calculator,
            scaled_omega_transposed,
        }
    }
}

/// 수락/거부 판정을 통과하면 그대로 채택되는 후보 파라미터 쌍
#[derive(Debug, Clone)]
pub struct FinishedUpdate {
    prototypes: PrototypeSet,
    omega: OmegaMatrix,
}

impl FinishedUpdate {
    pub fn prototypes(&self) -> &PrototypeSet {
        &self.prototypes
    }

    pub fn omega(&self) -> &OmegaMatrix {
        &self.omega
    }
}

/// 서브샘플 하나에서 누적한 그래디언트 제안
///
/// 델타만 보관하며 기준 파라미터는 참조하지 않는다. `updated` 가 처음 호출될 때
/// 정규화와 학습률을 적용한 후보 파라미터를 만들어 캐시한다.
#[derive(Debug)]
pub struct ProposedUpdate {
    prototype_deltas: Vec<DVector<f64>>,
    omega_delta: DMatrix<f64>,
    relevance_learning: bool,
    prototype_learning_rate: f64,
    omega_learning_rate: f64,
    finished: OnceCell<FinishedUpdate>,
}

impl ProposedUpdate {
    /// 영 델타로 시작하는 누산기
    pub fn zeroed(
        context: &StepContext<'_>,
        prototype_learning_rate: f64,
        omega_learning_rate: f64,
    ) -> Self {
        // 프로토타입 델타는 되투영을 거쳐 항상 데이터 공간 차원이 된다
        let prototype_deltas = context
            .prototypes
            .iter()
            .map(|prototype| DVector::zeros(prototype.dimension()))
            .collect();
        let omega_delta = DMatrix::zeros(
            context.omega.omega_dimension(),
            context.omega.data_dimension(),
        );
        ProposedUpdate {
            prototype_deltas,
            omega_delta,
            relevance_learning: context.omega.relevance_learning(),
            prototype_learning_rate,
            omega_learning_rate,
            finished: OnceCell::new(),
        }
    }

    /// 데이터 포인트 하나의 기여를 누적한다
    ///
    /// 승자 거리로 정규화 마진 `mu` 와 공통 인자 `xsi` 를 만들고, 같은 클래스
    /// 승자는 `psiPlus = -g·xsi·dOther` 로 끌어당기고 다른 클래스 승자는
    /// `psiMinus = g·xsi·dSame` 으로 밀어낸다. 모든 분모는 컷오프로 보호된다.
    pub fn incorporate(&mut self, point: &DataPoint, context: &StepContext<'_>) {
        let winners = point.winning_information(context.omega, context.prototypes);
        let distance_same = winners.distance_same_class;
        let distance_other = winners.distance_other_class;
        let distance_sum = (distance_same + distance_other).max(NUMERIC_CUTOFF);

        let mu = (distance_other - distance_same) / distance_sum;
        let xsi = context.sigmoid.evaluate_prime(mu)
            / (distance_sum * distance_sum).max(NUMERIC_CUTOFF);
        let weight = context.calculator.gradient_weight(point);

        let psi_plus = -weight * xsi * distance_other;
        let psi_minus = weight * xsi * distance_same;

        self.incorporate_winner(point, winners.index_same_class, psi_plus, context);
        self.incorporate_winner(point, winners.index_other_class, psi_minus, context);
    }

    fn incorporate_winner(
        &mut self,
        point: &DataPoint,
        winner_index: usize,
        psi: f64,
        context: &StepContext<'_>,
    ) {
        let prototype = context.prototypes.get(winner_index);
        let embedded_difference = point.embedded(context.omega) - prototype.embedded(context.omega);

        // 거리 도함수를 데이터 공간으로 되투영해 프로토타입 델타를 만든다.
        // relevance 학습 중이면 omega(x - w) 가 곧 임베딩 공간의 차 벡터이므로
        // 오메가 델타의 외적에도 같은 벡터를 재사용한다.
        match context.scaled_omega_transposed.as_ref() {
            Some(scaled) => {
                self.prototype_deltas[winner_index] += scaled * &embedded_difference * psi;
                let data_difference = point.values() - prototype.values();
                self.omega_delta += &embedded_difference * data_difference.transpose() * psi;
            }
            None => {
                self.prototype_deltas[winner_index] += embedded_difference * (-2.0 * psi);
            }
        }
    }

    /// 두 누산기를 병합한다. 덧셈이므로 결합 순서는 결과에 영향을 주지 않는다
    pub fn merge(mut self, other: ProposedUpdate) -> ProposedUpdate {
        for (delta, other_delta) in self.prototype_deltas.iter_mut().zip(&other.prototype_deltas) {
            *delta += other_delta;
        }
        self.omega_delta += &other.omega_delta;
        self
    }

    /// 정규화와 학습률을 적용한 후보 파라미터. 최초 호출 시 한 번만 계산된다
    ///
    /// 프로토타입 델타는 전체 성분 제곱합(컷오프 하한)으로, 오메가 델타는 자체
    /// 성분 제곱합으로 나눠 스케일을 고정한다. relevance
    /// 학습이 꺼져 있으면 오메가 후보는 기준 오메가를 그대로 공유한다.
    pub fn updated<'s>(
        &'s self,
        base_prototypes: &PrototypeSet,
        base_omega: &OmegaMatrix,
    ) -> &'s FinishedUpdate {
        self.finished.get_or_init(|| {
            // 프로토타입 델타 전체의 제곱합 하나로 모든 성분을 나눈다
            let sum_squares: f64 = self
                .prototype_deltas
                .iter()
                .map(|delta| delta.norm_squared())
                .sum();
            let scale = self.prototype_learning_rate / sum_squares.max(NUMERIC_CUTOFF);
            let prototypes = base_prototypes
                .iter()
                .zip(&self.prototype_deltas)
                .map(|(prototype, delta)| {
                    Prototype::new(prototype.values() + delta * scale, prototype.label())
                })
                .collect();
            let omega = if self.relevance_learning {
                let scale =
                    self.omega_learning_rate / self.omega_delta.norm_squared().max(NUMERIC_CUTOFF);
                OmegaMatrix::new(base_omega.matrix() + &self.omega_delta * scale)
            } else {
                base_omega.clone()
            };
            FinishedUpdate {
                prototypes: PrototypeSet::new(prototypes),
                omega,
            }
        })
    }

    pub fn prototype_learning_rate(&self) -> f64 {
        self.prototype_learning_rate
    }

    pub fn omega_learning_rate(&self) -> f64 {
        self.omega_learning_rate
    }
}

/// 서브샘플 전체를 병렬로 누적한 업데이트 제안을 만든다
///
/// 워커 수만큼 라운드 로빈으로 포인트를 나눠 로컬 누산기에 모은 뒤 병합한다.
pub fn perform_step(
    pool: &rayon::ThreadPool,
    batch: &[&DataPoint],
    context: &StepContext<'_>,
    prototype_learning_rate: f64,
    omega_learning_rate: f64,
) -> ProposedUpdate {
    let workers = pool.current_num_threads().max(1);
    pool.install(|| {
        (0..workers)
            .into_par_iter()
            .map(|worker| {
                let mut local =
                    ProposedUpdate::zeroed(context, prototype_learning_rate, omega_learning_rate);
                for point in batch.iter().skip(worker).step_by(workers) {
                    local.incorporate(point, context);
                }
                local
            })
            .reduce(
                || ProposedUpdate::zeroed(context, prototype_learning_rate, omega_learning_rate),
                ProposedUpdate::merge,
            )
    })
}
