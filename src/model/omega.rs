use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::model::vector::NUMERIC_CUTOFF;

/// 파라미터 커밋마다 증가하는 세대 번호. 캐시 유효성 판단에 쓰인다.
pub type Generation = u64;

static GENERATION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// 다음 세대 번호 발급
pub fn next_generation() -> Generation {
    GENERATION_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// 데이터 공간을 임베딩 공간으로 보내는 선형 사상 ("오메가")
///
/// 형상은 `omegaDim × dataDim`. 두 차원이 모두 1보다 클 때만 relevance 학습이
/// 활성화되고, 아니면 투영은 항등 사상으로 퇴화한다. 값 의미론을 따른다:
/// 커밋마다 새 행렬 값이 만들어지고 새 세대 번호를 받는다. 기존 세대에 매여 있던
/// 임베딩 캐시는 세대 불일치로 자연히 무효가 된다.
///
/// 파생되는 람다 행렬은 `lambda = omegaᵗ·omega` 로 정의되며, 주대각에는 특징별
/// 중요도, 비대각에는 특징 간 상관이 나타난다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmegaMatrix {
    matrix: DMatrix<f64>,
    #[serde(skip, default = "next_generation")]
    generation: Generation,
}

impl OmegaMatrix {
    pub fn new(matrix: DMatrix<f64>) -> Self {
        OmegaMatrix {
            matrix,
            generation: next_generation(),
        }
    }

    /// 항등 행렬로 시작하는 정방 오메가
    pub fn identity(dimension: usize) -> Self {
        Self::new(DMatrix::identity(dimension, dimension))
    }

    /// relevance 학습이 꺼졌을 때 쓰는 1×1 무연산 행렬
    pub fn disabled() -> Self {
        Self::new(DMatrix::from_element(1, 1, 1.0))
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// 임베딩 공간 차원 (행 수)
    pub fn omega_dimension(&self) -> usize {
        self.matrix.nrows()
    }

    /// 데이터 공간 차원 (열 수)
    pub fn data_dimension(&self) -> usize {
        self.matrix.ncols()
    }

    /// 두 차원이 모두 1을 넘을 때만 행렬 학습이 의미를 가진다
    pub fn relevance_learning(&self) -> bool {
        self.matrix.nrows() != 1 && self.matrix.ncols() != 1
    }

    /// 벡터를 임베딩 공간으로 투영한다. relevance 학습이 꺼져 있으면 그대로 반환
    pub fn project(&self, values: &DVector<f64>) -> DVector<f64> {
        if self.relevance_learning() {
            &self.matrix * values
        } else {
            values.clone()
        }
    }

    /// 람다 행렬 계산: `lambda = omegaᵗ·omega`, 형상 `dataDim × dataDim`
    pub fn lambda(&self) -> DMatrix<f64> {
        self.matrix.transpose() * &self.matrix
    }

    /// 람다 trace 의 제곱근. 오메가 재정규화의 표준 배율
    pub fn lambda_scaling_factor(lambda: &DMatrix<f64>) -> f64 {
        lambda.trace().sqrt()
    }

    /// trace(lambda) 기준으로 재정규화한 새 오메가 값을 만든다 (새 세대)
    pub fn normalized(&self) -> OmegaMatrix {
        let scaling = Self::lambda_scaling_factor(&self.lambda());
        OmegaMatrix::new(&self.matrix * (1.0 / scaling.max(NUMERIC_CUTOFF)))
    }
}

impl fmt::Display for OmegaMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row_index in 0..self.matrix.nrows() {
            for column_index in 0..self.matrix.ncols() {
                let value = self.matrix[(row_index, column_index)];
                if value < 0.0 {
                    write!(f, "{:.3}", value)?;
                } else {
                    write!(f, " {:.3}", value)?;
                }
                if column_index + 1 < self.matrix.ncols() {
                    write!(f, " ")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
