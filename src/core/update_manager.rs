//! 수락/거부 업데이트 컨트롤러
//!
//! 에포크 루프의 소유자. 매 에포크 그래디언트 누산기에서 후보 파라미터를 받아
//! 현재 파라미터와 비교 평가하고, 정확히 하나를 수락하거나 둘 다 거부한다.
//! 학습률은 수락 시 곱셈으로 키우고 거부 시 줄인다. 공유 상태(프로토타입,
//! 오메가, 캐시)를 변경하는 곳은 이 루프뿐이다.

use anyhow::{bail, Result};
use log::info;

use crate::classifier::TrainingObserver;
use crate::core::cost::{CostFunctionCalculator, CostReport};
use crate::core::gradient::{perform_step, StepContext};
use crate::core::sigmoid::SigmoidFunction;
use crate::model::{DataPoint, NUMERIC_CUTOFF, OmegaMatrix, PrototypeSet};
use crate::random::DataRandomizer;

/// 진행 로그 주기 (에포크)
const PROGRESS_LOG_INTERVAL: usize = 200;

/// 에포크 하나가 끝난 뒤의 루프 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingOutcome {
    /// 계속 진행
    Running,
    /// 두 학습률이 모두 정지 기준 아래로 떨어졌다
    Converged,
    /// 최대 에포크 도달
    EpochLimitReached,
}

/// 컨트롤러의 수치 설정
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub prototype_learning_rate: f64,
    pub omega_learning_rate: f64,
    pub learning_rate_change: f64,
    pub stop_epsilon: f64,
    pub data_point_ratio: f64,
    pub total_epochs: usize,
}

/// 학습 상태 전체를 소유하는 업데이트 컨트롤러
///
/// 워커 풀은 학습 실행당 하나만 만들어 그래디언트 누산과 비용 평가가 공유한다.
pub struct UpdateManager {
    pool: rayon::ThreadPool,
    randomizer: DataRandomizer,
    sigmoid: SigmoidFunction,
    calculator: CostFunctionCalculator,
    prototypes: PrototypeSet,
    omega: OmegaMatrix,
    settings: ControllerSettings,
    prototype_learning_rate: f64,
    omega_learning_rate: f64,
    current_epoch: usize,
    current_score: f64,
    initial_report: CostReport,
    current_report: CostReport,
    accepted_prototype_updates: usize,
    accepted_omega_updates: usize,
    rejected_updates: usize,
}

impl UpdateManager {
    /// 컨트롤러 생성. 초기 파라미터의 점수를 전체 학습 데이터로 한 번 평가해
    /// 비교 기준으로 삼는다
    pub fn new(
        prototypes: PrototypeSet,
        omega: OmegaMatrix,
        sigmoid: SigmoidFunction,
        mut calculator: CostFunctionCalculator,
        randomizer: DataRandomizer,
        settings: ControllerSettings,
        data: &[DataPoint],
    ) -> Result<Self> {
        if data.is_empty() {
            bail!("training data is empty");
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_cpus::get())
            .build()?;

        let initial_batch: Vec<&DataPoint> = data.iter().collect();
        let current_report =
            calculator.evaluate(&pool, &sigmoid, &initial_batch, &prototypes, &omega);
        let current_score = current_report.optimized();

        Ok(UpdateManager {
            pool,
            randomizer,
            sigmoid,
            calculator,
            prototypes,
            omega,
            prototype_learning_rate: settings.prototype_learning_rate,
            omega_learning_rate: settings.omega_learning_rate,
            settings,
            current_epoch: 0,
            current_score,
            initial_report: current_report.clone(),
            current_report,
            accepted_prototype_updates: 0,
            accepted_omega_updates: 0,
            rejected_updates: 0,
        })
    }

    /// 에포크 하나를 실행한다
    ///
    /// 후보 평가용 서브샘플은 그래디언트용과 독립적으로 새로 뽑는다. relevance
    /// 학습이 꺼져 있으면 오메가 후보는 평가하지 않고 프로토타입 점수에서
    /// 컷오프를 뺀 값을 쓴다. 프로토타입 업데이트가 항상 이기게 하는 의도된
    /// 지름길이다.
    pub fn epoch(
        &mut self,
        data: &[DataPoint],
        mut observer: Option<&mut dyn TrainingObserver>,
    ) -> Result<TrainingOutcome> {
        self.current_epoch += 1;
        self.sigmoid.advance(self.current_epoch);

        let training_batch = self.randomizer.subsample(data, self.settings.data_point_ratio);
        if training_batch.is_empty() {
            bail!("empty training batch at epoch {}", self.current_epoch);
        }

        let proposed = {
            let context = StepContext::new(
                &self.prototypes,
                &self.omega,
                &self.sigmoid,
                &self.calculator,
            );
            perform_step(
                &self.pool,
                &training_batch,
                &context,
                self.prototype_learning_rate,
                self.omega_learning_rate,
            )
        };
        let updated = proposed.updated(&self.prototypes, &self.omega);

        let evaluation_batch = self.randomizer.subsample(data, self.settings.data_point_ratio);
        let relevance_learning = self.omega.relevance_learning();

        let prototype_report = self.calculator.evaluate(
            &self.pool,
            &self.sigmoid,
            &evaluation_batch,
            updated.prototypes(),
            &self.omega,
        );
        let prototype_score = prototype_report.optimized();

        let (omega_report, omega_score) = if relevance_learning {
            let report = self.calculator.evaluate(
                &self.pool,
                &self.sigmoid,
                &evaluation_batch,
                &self.prototypes,
                updated.omega(),
            );
            let score = report.optimized();
            (Some(report), score)
        } else {
            (None, prototype_score - NUMERIC_CUTOFF)
        };

        if self.current_score >= prototype_score.max(omega_score) {
            self.rejected_updates += 1;
            self.prototype_learning_rate *= 1.0 - self.settings.learning_rate_change;
            self.omega_learning_rate *= 1.0 - self.settings.learning_rate_change;
        } else if !relevance_learning || prototype_score >= omega_score {
            self.prototypes = updated.prototypes().clone();
            self.prototype_learning_rate *= 1.0 + self.settings.learning_rate_change;
            self.current_score = prototype_score;
            self.current_report = prototype_report;
            self.accepted_prototype_updates += 1;
        } else if let Some(report) = omega_report {
            // 재정규화는 새 세대를 발급하므로 후보 평가 중 쌓인 임베딩은
            // 자연히 무효가 된다
            self.omega = updated.omega().normalized();
            self.omega_learning_rate *= 1.0 + self.settings.learning_rate_change;
            self.current_score = omega_score;
            self.current_report = report;
            self.accepted_omega_updates += 1;
        }

        self.purge_stale_caches(data);

        if self.current_epoch % PROGRESS_LOG_INTERVAL == 0 {
            info!(
                "epoch {}: {} (learning rates: prototypes {:.3e}, omega {:.3e})",
                self.current_epoch,
                self.current_report,
                self.prototype_learning_rate,
                self.omega_learning_rate
            );
        }

        if let Some(observer) = observer.as_deref_mut() {
            observer.on_epoch(&self.prototypes, &self.omega.lambda(), &self.current_report);
        }

        if self.prototype_learning_rate < self.settings.stop_epsilon
            && self.omega_learning_rate < self.settings.stop_epsilon
        {
            self.finalize();
            return Ok(TrainingOutcome::Converged);
        }
        if self.current_epoch >= self.settings.total_epochs {
            self.finalize();
            return Ok(TrainingOutcome::EpochLimitReached);
        }
        Ok(TrainingOutcome::Running)
    }

    /// 커밋된 세대에 해당하지 않는 임베딩/승자 캐시를 정리한다
    fn purge_stale_caches(&self, data: &[DataPoint]) {
        let omega_generation = self.omega.generation();
        let prototype_generation = self.prototypes.generation();
        for point in data {
            point.retain_cache(omega_generation, prototype_generation);
        }
        for prototype in &self.prototypes {
            prototype.retain_cache(omega_generation);
        }
    }

    /// 종료 처리. 오메가를 두 번 재정규화한다
    ///
    /// 첫 번째 재정규화가 행렬 자체를 다시 스케일하므로 배율을 한 번 더
    /// 유도해 적용한다.
    fn finalize(&mut self) {
        if self.omega.relevance_learning() {
            self.omega = self.omega.normalized().normalized();
        }
        info!(
            "training stopped after {} epochs: {} prototype updates accepted, \
             {} omega updates accepted, {} rejections",
            self.current_epoch,
            self.accepted_prototype_updates,
            self.accepted_omega_updates,
            self.rejected_updates
        );
    }

    pub fn current_epoch(&self) -> usize {
        self.current_epoch
    }

    pub fn current_report(&self) -> &CostReport {
        &self.current_report
    }

    /// 학습 시작 전 초기 파라미터를 전체 데이터로 평가한 비용
    pub fn initial_report(&self) -> &CostReport {
        &self.initial_report
    }

    pub fn prototypes(&self) -> &PrototypeSet {
        &self.prototypes
    }

    pub fn omega(&self) -> &OmegaMatrix {
        &self.omega
    }

    pub fn prototype_learning_rate(&self) -> f64 {
        self.prototype_learning_rate
    }

    pub fn omega_learning_rate(&self) -> f64 {
        self.omega_learning_rate
    }

    pub fn accepted_prototype_updates(&self) -> usize {
        self.accepted_prototype_updates
    }

    pub fn accepted_omega_updates(&self) -> usize {
        self.accepted_omega_updates
    }

    pub fn rejected_updates(&self) -> usize {
        self.rejected_updates
    }

    /// 학습 결과물을 꺼낸다
    pub fn into_parts(self) -> (PrototypeSet, OmegaMatrix, SigmoidFunction) {
        (self.prototypes, self.omega, self.sigmoid)
    }
}
