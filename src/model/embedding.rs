use nalgebra::DVector;
use parking_lot::Mutex;

use crate::model::omega::{Generation, OmegaMatrix};
use crate::model::vector::{squared_euclidean, ClassLabel, LabeledVector, PrototypeSet};

/// 라벨 벡터의 임베딩 공간 상(像). 차원은 오메가 행렬의 행 수와 같다.
///
/// 어떤 오메가 세대로 투영했는지와, 그 위에서 계산한 승자 정보(프로토타입 목록
/// 세대로 검증)를 함께 보관한다.
#[derive(Debug, Clone)]
pub struct EmbeddedVector {
    pub values: DVector<f64>,
    pub omega_generation: Generation,
    winners: Option<(Generation, WinningInformation)>,
}

/// 임베딩 벡터 기준 최근접 프로토타입 정보
///
/// 같은 클래스의 최근접 프로토타입과 다른 클래스의 최근접 프로토타입을 각각
/// 인덱스와 제곱 거리로 기록한다. 업데이트 구성과 비용 평가 양쪽의 핵심 재료다.
#[derive(Debug, Clone, Copy)]
pub struct WinningInformation {
    pub index_same_class: usize,
    pub distance_same_class: f64,
    pub index_other_class: usize,
    pub distance_other_class: f64,
}

/// 데이터 포인트/프로토타입마다 하나씩 붙는 단일 슬롯 임베딩 캐시
///
/// 정상 상태에서는 포인트당 최대 하나의 임베딩(현재 오메가 세대)과 최대 하나의
/// 승자 정보(현재 프로토타입 목록 세대)만 유지된다. 세대가 맞지 않는 항목은
/// 접근 시 덮어쓰이고, 에포크 말에는 `retain_only` 로 명시적으로 정리된다.
#[derive(Debug, Default)]
pub struct EmbeddingSlot(Mutex<Option<EmbeddedVector>>);

impl EmbeddingSlot {
    /// 임베딩 값을 얻는다. 세대가 맞는 캐시가 있으면 재사용, 없으면 투영 후 저장
    pub fn embedded_values(&self, owner: &LabeledVector, omega: &OmegaMatrix) -> DVector<f64> {
        let mut guard = self.0.lock();
        match guard.as_ref() {
            Some(embedded) if embedded.omega_generation == omega.generation() => {
                embedded.values.clone()
            }
            _ => {
                let values = omega.project(owner.values());
                *guard = Some(EmbeddedVector {
                    values: values.clone(),
                    omega_generation: omega.generation(),
                    winners: None,
                });
                values
            }
        }
    }

    /// 승자 정보를 얻는다. 프로토타입 스캔 동안에는 잠금을 잡지 않는다
    pub fn winning_information(
        &self,
        owner: &LabeledVector,
        omega: &OmegaMatrix,
        prototypes: &PrototypeSet,
    ) -> WinningInformation {
        let embedded = self.embedded_values(owner, omega);
        {
            let guard = self.0.lock();
            if let Some(cached) = guard.as_ref() {
                if cached.omega_generation == omega.generation() {
                    if let Some((generation, information)) = cached.winners {
                        if generation == prototypes.generation() {
                            return information;
                        }
                    }
                }
            }
        }

        let information = find_winners(&embedded, owner.label(), omega, prototypes);

        let mut guard = self.0.lock();
        if let Some(cached) = guard.as_mut() {
            // 스캔 사이에 임베딩이 교체되었으면 저장하지 않는다
            if cached.omega_generation == omega.generation() {
                cached.winners = Some((prototypes.generation(), information));
            }
        }
        information
    }

    /// 지정한 세대 조합에 해당하지 않는 캐시 내용을 제거한다
    pub fn retain_only(&self, omega_generation: Generation, prototype_generation: Generation) {
        let mut guard = self.0.lock();
        if let Some(cached) = guard.as_mut() {
            if cached.omega_generation != omega_generation {
                *guard = None;
                return;
            }
            if let Some((generation, _)) = cached.winners {
                if generation != prototype_generation {
                    cached.winners = None;
                }
            }
        }
    }

    /// 임베딩 세대만 검사한다 (프로토타입에는 승자 캐시가 없다)
    pub fn retain_embedding(&self, omega_generation: Generation) {
        let mut guard = self.0.lock();
        if let Some(cached) = guard.as_ref() {
            if cached.omega_generation != omega_generation {
                *guard = None;
            }
        }
    }
}

impl Clone for EmbeddingSlot {
    fn clone(&self) -> Self {
        EmbeddingSlot(Mutex::new(self.0.lock().clone()))
    }
}

/// 프로토타입을 한 번 스캔하며 같은/다른 클래스의 최솟값을 추적한다
///
/// 동률이면 먼저 본(인덱스가 낮은) 프로토타입을 유지한다.
fn find_winners(
    embedded: &DVector<f64>,
    label: ClassLabel,
    omega: &OmegaMatrix,
    prototypes: &PrototypeSet,
) -> WinningInformation {
    let mut information = WinningInformation {
        index_same_class: usize::MAX,
        distance_same_class: f64::MAX,
        index_other_class: usize::MAX,
        distance_other_class: f64::MAX,
    };

    for (index, prototype) in prototypes.iter().enumerate() {
        let distance = squared_euclidean(embedded, &prototype.embedded(omega));
        if prototype.label() == label {
            if distance < information.distance_same_class {
                information.distance_same_class = distance;
                information.index_same_class = index;
            }
        } else if distance < information.distance_other_class {
            information.distance_other_class = distance;
            information.index_other_class = index;
        }
    }

    information
}
