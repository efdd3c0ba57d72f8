//! GMLVQ 학습 코어
//!
//! 어닐링 시그모이드, 비용 함수 계열, 병렬 그래디언트 누산, 수락/거부 업데이트
//! 루프와 초기화 루틴을 담는다.

pub mod cost;
pub mod gradient;
pub mod init;
pub mod sigmoid;
pub mod update_manager;

// 테스트 모듈
#[cfg(test)]
mod __tests__;

// 재수출
pub use gradient::{perform_step, ProposedUpdate, StepContext};
pub use sigmoid::SigmoidFunction;
pub use update_manager::{ControllerSettings, TrainingOutcome, UpdateManager};
