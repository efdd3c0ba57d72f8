//! 공개 학습/분류 API
//!
//! 설정 검증, 초기화, 에포크 루프 구동을 묶어 학습된 분류기를 내놓는다.
//! 잘못된 설정은 전부 학습 시작 전에 오류로 끝난다. 실행 중에는 수치 하한만
//! 적용될 뿐 오류가 새로 생기지 않는다.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{bail, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::core::cost::{CostFunctionCalculator, CostFunctionType, CostReport};
use crate::core::init::{initialize_omega, initialize_prototypes};
use crate::core::sigmoid::SigmoidFunction;
use crate::core::update_manager::{ControllerSettings, TrainingOutcome, UpdateManager};
use crate::model::{squared_euclidean, ClassLabel, DataPoint, NUMERIC_CUTOFF, OmegaMatrix, PrototypeSet};
use crate::random::DataRandomizer;

/// 클래스별 프로토타입 개수 지정 방식
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PrototypesPerClass {
    /// 모든 클래스에 같은 개수
    Uniform(usize),
    /// 클래스별 개별 지정. 관측된 모든 클래스를 덮어야 한다
    PerClass(BTreeMap<ClassLabel, usize>),
}

impl Default for PrototypesPerClass {
    fn default() -> Self {
        PrototypesPerClass::Uniform(1)
    }
}

/// 학습 설정
///
/// 기본값은 대부분의 2-클래스 문제에서 그대로 쓸 수 있는 보수적인 조합이다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmlvqConfig {
    /// 최대 에포크 수
    pub epochs: usize,
    pub prototypes_per_class: PrototypesPerClass,
    /// 임베딩 공간 차원. `None` 이면 데이터 차원과 같게, `Some(1)` 이면
    /// relevance 학습을 끈다
    pub omega_dimension: Option<usize>,
    pub prototype_learning_rate: f64,
    pub omega_learning_rate: f64,
    /// 수락/거부에 따른 학습률 곱셈 보폭
    pub learning_rate_change: f64,
    /// 에포크당 서브샘플 비율 (0 초과 1 이하)
    pub data_point_ratio: f64,
    /// 어닐링 시그마 구간 (시작, 끝)
    pub sigmoid_interval: (f64, f64),
    /// 두 학습률이 모두 이 값 아래로 떨어지면 수렴으로 판정
    pub stop_epsilon: f64,
    /// 최적화 대상 목적 함수
    pub objective: CostFunctionType,
    /// 보고용으로만 추적하는 추가 목적 함수들
    pub additional_objectives: Vec<CostFunctionType>,
    /// F-measure 의 β
    pub beta: Option<f64>,
    /// 혼동 행렬 목적 함수의 가중 벡터. 합이 정확히 1이어야 한다
    pub cost_weights: Option<[f64; 2]>,
    /// 난수 시드. `None` 이면 시스템 엔트로피
    pub seed: Option<u64>,
}

impl Default for GmlvqConfig {
    fn default() -> Self {
        GmlvqConfig {
            epochs: 2000,
            prototypes_per_class: PrototypesPerClass::default(),
            omega_dimension: None,
            prototype_learning_rate: 1.0,
            omega_learning_rate: 1.0,
            learning_rate_change: 0.01,
            data_point_ratio: 0.1,
            sigmoid_interval: (1.0, 10.0),
            stop_epsilon: 1e-9,
            objective: CostFunctionType::DefaultCost,
            additional_objectives: Vec::new(),
            beta: Some(2.0),
            cost_weights: Some([0.5, 0.5]),
            seed: None,
        }
    }
}

/// 에포크마다 호출되는 관측자. 순수 관찰용이며 루프에 영향을 주지 않는다
pub trait TrainingObserver {
    fn on_epoch(&mut self, prototypes: &PrototypeSet, lambda: &DMatrix<f64>, costs: &CostReport);
}

/// 학습 종료 후의 요약
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    pub outcome: TrainingOutcome,
    pub accepted_prototype_updates: usize,
    pub accepted_omega_updates: usize,
    pub rejected_updates: usize,
    pub initial_costs: CostReport,
    pub final_costs: CostReport,
}

impl fmt::Display for TrainingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.outcome {
            TrainingOutcome::Converged => "converged",
            TrainingOutcome::EpochLimitReached => "reached the epoch limit",
            TrainingOutcome::Running => "is still running",
        };
        write!(
            f,
            "training {} after {} epochs ({} prototype updates, {} omega updates, \
             {} rejections); initial costs: {}; final costs: {}",
            outcome,
            self.epochs_run,
            self.accepted_prototype_updates,
            self.accepted_omega_updates,
            self.rejected_updates,
            self.initial_costs,
            self.final_costs
        )
    }
}

/// 학습이 끝난 GMLVQ 분류기
#[derive(Debug)]
pub struct Gmlvq {
    prototypes: PrototypeSet,
    omega: OmegaMatrix,
    sigmoid: SigmoidFunction,
    classes: Vec<ClassLabel>,
    data_dimension: usize,
    summary: TrainingSummary,
}

impl Gmlvq {
    /// 설정에 따라 분류기를 학습한다
    pub fn fit(data: &[DataPoint], config: &GmlvqConfig) -> Result<Gmlvq> {
        Self::train(data, config, None)
    }

    /// 관측자를 붙여 학습한다. 관측자는 매 에포크 커밋된 상태를 받는다
    pub fn fit_with_observer(
        data: &[DataPoint],
        config: &GmlvqConfig,
        observer: &mut dyn TrainingObserver,
    ) -> Result<Gmlvq> {
        Self::train(data, config, Some(observer))
    }

    fn train(
        data: &[DataPoint],
        config: &GmlvqConfig,
        mut observer: Option<&mut dyn TrainingObserver>,
    ) -> Result<Gmlvq> {
        let (data_dimension, classes) = validate(data, config)?;
        let omega_dimension = config.omega_dimension.unwrap_or(data_dimension);

        let counts = prototype_counts(&config.prototypes_per_class, &classes)?;
        let mut randomizer = DataRandomizer::new(config.seed);
        let prototypes = initialize_prototypes(&mut randomizer, data, &counts)?;
        let omega = if omega_dimension == 1 || data_dimension == 1 {
            OmegaMatrix::disabled()
        } else {
            initialize_omega(&mut randomizer, data, omega_dimension, data_dimension)
        };

        let sigmoid = SigmoidFunction::new(
            config.sigmoid_interval.0,
            config.sigmoid_interval.1,
            config.epochs,
        )?;
        let calculator = CostFunctionCalculator::new(
            config.objective,
            &config.additional_objectives,
            config.beta,
            config.cost_weights,
        )?;

        let settings = ControllerSettings {
            prototype_learning_rate: config.prototype_learning_rate,
            omega_learning_rate: config.omega_learning_rate,
            learning_rate_change: config.learning_rate_change,
            stop_epsilon: config.stop_epsilon,
            data_point_ratio: config.data_point_ratio,
            total_epochs: config.epochs,
        };
        let mut manager = UpdateManager::new(
            prototypes, omega, sigmoid, calculator, randomizer, settings, data,
        )?;

        let outcome = loop {
            let step = match observer {
                Some(ref mut obs) => manager.epoch(data, Some(&mut **obs))?,
                None => manager.epoch(data, None)?,
            };
            match step {
                TrainingOutcome::Running => continue,
                terminal => break terminal,
            }
        };

        let summary = TrainingSummary {
            epochs_run: manager.current_epoch(),
            outcome,
            accepted_prototype_updates: manager.accepted_prototype_updates(),
            accepted_omega_updates: manager.accepted_omega_updates(),
            rejected_updates: manager.rejected_updates(),
            initial_costs: manager.initial_report().clone(),
            final_costs: manager.current_report().clone(),
        };
        let (prototypes, omega, sigmoid) = manager.into_parts();

        Ok(Gmlvq {
            prototypes,
            omega,
            sigmoid,
            classes,
            data_dimension,
            summary,
        })
    }

    /// 질의 벡터를 최근접 프로토타입의 클래스로 분류한다
    pub fn classify(&self, query: &DVector<f64>) -> Result<ClassLabel> {
        if query.len() != self.data_dimension {
            bail!(
                "query dimension {} does not match training dimension {}",
                query.len(),
                self.data_dimension
            );
        }
        let embedded_query = self.omega.project(query);
        let mut best_label = self.prototypes[0].label();
        let mut best_distance = f64::MAX;
        for prototype in &self.prototypes {
            let distance =
                squared_euclidean(&embedded_query, &prototype.embedded(&self.omega));
            if distance < best_distance {
                best_distance = distance;
                best_label = prototype.label();
            }
        }
        Ok(best_label)
    }

    /// 클래스별 확률 유사 점수
    ///
    /// 질의 포인트를 각 클래스로 가정해 다시 라벨링하고, 그 가정 아래의 마진
    /// 시그모이드 점수를 계산한 뒤 합이 1이 되도록 정규화한다. 점수 해석에
    /// 논란이 있는 기법이지만 관측된 동작 그대로 유지한다.
    pub fn distribution(&self, query: &DVector<f64>) -> Result<Vec<(ClassLabel, f64)>> {
        if query.len() != self.data_dimension {
            bail!(
                "query dimension {} does not match training dimension {}",
                query.len(),
                self.data_dimension
            );
        }
        let mut scores = Vec::with_capacity(self.classes.len());
        for &label in &self.classes {
            let relabeled = DataPoint::new(query.clone(), label);
            let winners = relabeled.winning_information(&self.omega, &self.prototypes);
            let sum = (winners.distance_same_class + winners.distance_other_class)
                .max(NUMERIC_CUTOFF);
            let margin = (winners.distance_other_class - winners.distance_same_class) / sum;
            scores.push((label, self.sigmoid.evaluate(margin)));
        }
        let total: f64 = scores.iter().map(|(_, score)| score).sum();
        let total = total.max(NUMERIC_CUTOFF);
        for (_, score) in &mut scores {
            *score /= total;
        }
        Ok(scores)
    }

    pub fn prototypes(&self) -> &PrototypeSet {
        &self.prototypes
    }

    pub fn omega(&self) -> &OmegaMatrix {
        &self.omega
    }

    /// 학습된 relevance 행렬 `lambda = omegaᵗ·omega`
    pub fn lambda(&self) -> DMatrix<f64> {
        self.omega.lambda()
    }

    pub fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    pub fn summary(&self) -> &TrainingSummary {
        &self.summary
    }
}

/// 구성 오류를 전부 잡아내는 사전 검증
fn validate(data: &[DataPoint], config: &GmlvqConfig) -> Result<(usize, Vec<ClassLabel>)> {
    if data.is_empty() {
        bail!("training data is empty");
    }
    let data_dimension = data[0].dimension();
    if data.iter().any(|point| point.dimension() != data_dimension) {
        bail!("training data has inconsistent dimensions");
    }

    let mut classes: Vec<ClassLabel> = data.iter().map(DataPoint::label).collect();
    classes.sort_unstable();
    classes.dedup();
    if classes.len() < 2 {
        bail!("training data must contain at least 2 distinct classes");
    }

    if let Some(omega_dimension) = config.omega_dimension {
        if omega_dimension == 0 {
            bail!("omega dimension must be at least 1");
        }
        if omega_dimension > data_dimension {
            bail!(
                "omega dimension {} exceeds data dimension {}",
                omega_dimension,
                data_dimension
            );
        }
    }

    if config.epochs == 0 {
        bail!("at least one training epoch is required");
    }
    if !(config.data_point_ratio > 0.0 && config.data_point_ratio <= 1.0) {
        bail!(
            "data point ratio must lie in (0, 1], got {}",
            config.data_point_ratio
        );
    }
    if config.prototype_learning_rate <= 0.0 || config.omega_learning_rate <= 0.0 {
        bail!("learning rates must be positive");
    }
    if !(config.learning_rate_change > 0.0 && config.learning_rate_change < 1.0) {
        bail!(
            "learning rate change must lie in (0, 1), got {}",
            config.learning_rate_change
        );
    }

    let confusion_matrix_requested = config.objective.requires_confusion_matrix()
        || config
            .additional_objectives
            .iter()
            .any(|objective| objective.requires_confusion_matrix());
    if confusion_matrix_requested && classes.len() > 2 {
        bail!(
            "confusion matrix objectives require exactly 2 classes, found {}",
            classes.len()
        );
    }

    Ok((data_dimension, classes))
}

/// 클래스별 프로토타입 개수 결정. 지정 방식과 관측 클래스가 일치해야 한다
fn prototype_counts(
    per_class: &PrototypesPerClass,
    classes: &[ClassLabel],
) -> Result<BTreeMap<ClassLabel, usize>> {
    match per_class {
        PrototypesPerClass::Uniform(count) => {
            if *count == 0 {
                bail!("prototypes per class must be at least 1");
            }
            Ok(classes.iter().map(|&label| (label, *count)).collect())
        }
        PrototypesPerClass::PerClass(map) => {
            for label in classes {
                if !map.contains_key(label) {
                    bail!("no prototype count specified for class {}", label);
                }
            }
            for label in map.keys() {
                if !classes.contains(label) {
                    bail!("prototype count specified for unknown class {}", label);
                }
            }
            Ok(map.clone())
        }
    }
}
