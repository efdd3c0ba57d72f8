//! # GMLVQ (Generalized Matrix Learning Vector Quantization) 학습 엔진
//!
//! 프로토타입 기반 거리 분류기를 학습하는 라이브러리. 클래스별 대표점(프로토타입)과
//! 특징 공간을 재가중하는 선형 변환(오메가 행렬)을 확률적 경사 하강으로 동시에 학습한다.
//!
//! 핵심 구성 요소:
//! - 기하 데이터 모델: 라벨 벡터, 임베딩 캐시, 최근접 프로토타입 탐색
//! - 어닐링 시그모이드 마진 함수
//! - 교체 가능한 비용 함수 계열 (혼동 행렬 기반 목적 함수 포함)
//! - rayon 기반 병렬 그래디언트 누산기
//! - 수락/거부 업데이트 컨트롤러 (적응 학습률)

pub mod classifier;
pub mod core;
pub mod model;
pub mod random;

// 주요 타입들 재수출
pub use classifier::{Gmlvq, GmlvqConfig, PrototypesPerClass, TrainingObserver, TrainingSummary};
pub use crate::core::cost::{CostFunctionCalculator, CostFunctionType, CostReport};
pub use crate::core::sigmoid::SigmoidFunction;
pub use crate::core::update_manager::TrainingOutcome;
pub use model::{ClassLabel, DataPoint, LabeledVector, OmegaMatrix, Prototype, PrototypeSet};
