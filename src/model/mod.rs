//! GMLVQ 기하 데이터 모델
//!
//! 데이터 공간 벡터(데이터 포인트, 프로토타입), 오메가 행렬, 임베딩 공간 투영과
//! 최근접 프로토타입 정보를 담당한다. 임베딩과 승자 탐색 결과는 세대 번호로
//! 검증되는 단일 슬롯 캐시에 저장된다.

pub mod embedding;
pub mod omega;
pub mod vector;

// 테스트 모듈
#[cfg(test)]
mod __tests__;

// 재수출
pub use embedding::{EmbeddedVector, WinningInformation};
pub use omega::{next_generation, Generation, OmegaMatrix};
pub use vector::{
    squared_euclidean, ClassLabel, DataPoint, LabeledVector, Prototype, PrototypeSet,
    NUMERIC_CUTOFF,
};
