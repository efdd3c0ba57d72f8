use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// 어닐링되는 시그모이드 마진 함수
///
/// 마진 비용과 혼동 행렬의 소프트 카운트를 스케일하는 로지스틱 함수. 내부 sigma 가
/// 학습이 진행될수록 로그 스케일로 커져서 판별 경계가 점점 날카로워진다. 초반에는
/// 빠르게, 후반에는 천천히 증가한다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigmoidFunction {
    current_sigma: f64,
    interval_start: f64,
    interval_end: f64,
    total_epochs: usize,
}

impl SigmoidFunction {
    /// 시그마 구간과 총 에포크 수로 생성. `start > end` 는 구성 오류
    pub fn new(interval_start: f64, interval_end: f64, total_epochs: usize) -> Result<Self> {
        if interval_start > interval_end {
            bail!(
                "sigmoid sigma interval start ({}) cannot be larger than end ({})",
                interval_start,
                interval_end
            );
        }
        Ok(SigmoidFunction {
            current_sigma: interval_start,
            interval_start,
            interval_end,
            total_epochs,
        })
    }

    /// 현재 시그마로 로지스틱 함수 평가: `1 / (1 + exp(-sigma·x))`
    pub fn evaluate(&self, x: f64) -> f64 {
        1.0 / (1.0 + (-self.current_sigma * x).exp())
    }

    /// 로지스틱 함수의 도함수: `sigma·f(x)·(1-f(x))`
    pub fn evaluate_prime(&self, x: f64) -> f64 {
        let value = self.evaluate(x);
        self.current_sigma * value * (1.0 - value)
    }

    /// 에포크 번호에 따라 시그마를 전진시킨다
    ///
    /// `sigma = clamp(start + (end-start)·ln(epoch)/ln(total))`. `ln(0)` 과
    /// `ln(1)` 분모가 만드는 비유한 값은 구간 시작값으로 처리한다.
    pub fn advance(&mut self, epoch: usize) {
        let ramp = (epoch as f64).ln() / (self.total_epochs as f64).ln();
        let proposed = if ramp.is_finite() {
            self.interval_start + (self.interval_end - self.interval_start) * ramp
        } else {
            self.interval_start
        };
        self.current_sigma = proposed.clamp(self.interval_start, self.interval_end);
    }

    pub fn current_sigma(&self) -> f64 {
        self.current_sigma
    }

    pub fn interval_start(&self) -> f64 {
        self.interval_start
    }

    pub fn interval_end(&self) -> f64 {
        self.interval_end
    }
}
