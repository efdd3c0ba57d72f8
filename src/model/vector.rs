use std::fmt;
use std::hash::{Hash, Hasher};

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::model::embedding::{EmbeddingSlot, WinningInformation};
use crate::model::omega::{next_generation, Generation, OmegaMatrix};

/// 모든 분모 계산에 적용되는 수치 컷오프
pub const NUMERIC_CUTOFF: f64 = 1e-9;

/// 클래스 라벨. 이산 코드지만 원본 데이터 형식에 맞춰 실수로 표현된다.
///
/// 캐시/그룹 키로 쓰이므로 비트 단위 동등성과 해시를 제공한다.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassLabel(f64);

impl ClassLabel {
    pub fn new(value: f64) -> Self {
        ClassLabel(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl PartialEq for ClassLabel {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for ClassLabel {}

impl Hash for ClassLabel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for ClassLabel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassLabel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for ClassLabel {
    fn from(value: f64) -> Self {
        ClassLabel(value)
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 실수 값 벡터 + 클래스 라벨. GMLVQ 내부의 기본 데이터 구조
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledVector {
    values: DVector<f64>,
    label: ClassLabel,
}

impl LabeledVector {
    pub fn new(values: DVector<f64>, label: ClassLabel) -> Self {
        LabeledVector { values, label }
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn label(&self) -> ClassLabel {
        self.label
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

impl Hash for LabeledVector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.label.hash(state);
        for value in self.values.iter() {
            value.to_bits().hash(state);
        }
    }
}

/// 두 벡터 사이의 제곱 유클리드 거리
///
/// 최근접 프로토타입 탐색에 쓰이는 저수준 연산. 두 벡터는 같은 차원이어야 한다.
pub fn squared_euclidean(first: &DVector<f64>, second: &DVector<f64>) -> f64 {
    first
        .iter()
        .zip(second.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}

/// 학습 관측치 하나. 생성 후 값이 절대 변하지 않는다.
///
/// 불변성은 타입으로 강제된다: 값을 바꾸는 API 자체가 없다. 임베딩 공간 투영과
/// 승자 정보는 세대 번호로 검증되는 단일 슬롯에 캐시된다.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataPoint {
    vector: LabeledVector,
    #[serde(skip)]
    cache: EmbeddingSlot,
}

impl DataPoint {
    pub fn new(values: DVector<f64>, label: ClassLabel) -> Self {
        DataPoint {
            vector: LabeledVector::new(values, label),
            cache: EmbeddingSlot::default(),
        }
    }

    /// 원시 슬라이스로부터 데이터 포인트 생성
    pub fn from_values(values: &[f64], label: f64) -> Self {
        Self::new(DVector::from_row_slice(values), ClassLabel::new(label))
    }

    pub fn vector(&self) -> &LabeledVector {
        &self.vector
    }

    pub fn values(&self) -> &DVector<f64> {
        self.vector.values()
    }

    pub fn label(&self) -> ClassLabel {
        self.vector.label()
    }

    pub fn dimension(&self) -> usize {
        self.vector.dimension()
    }

    /// 오메가 행렬에 따른 임베딩 공간 투영 (캐시됨)
    pub fn embedded(&self, omega: &OmegaMatrix) -> DVector<f64> {
        self.cache.embedded_values(&self.vector, omega)
    }

    /// 같은 클래스 / 다른 클래스 최근접 프로토타입 정보 (캐시됨)
    pub fn winning_information(
        &self,
        omega: &OmegaMatrix,
        prototypes: &PrototypeSet,
    ) -> WinningInformation {
        self.cache.winning_information(&self.vector, omega, prototypes)
    }

    /// 현재 세대에 해당하지 않는 캐시 항목을 모두 제거한다
    pub fn retain_cache(&self, omega_generation: Generation, prototype_generation: Generation) {
        self.cache.retain_only(omega_generation, prototype_generation);
    }
}

impl Clone for DataPoint {
    fn clone(&self) -> Self {
        DataPoint {
            vector: self.vector.clone(),
            cache: self.cache.clone(),
        }
    }
}

/// 한 클래스를 대표하는 학습된 기준점
///
/// 업데이트 컨트롤러가 수락한 후보로 통째로 교체되는 방식으로만 갱신된다.
#[derive(Debug, Serialize, Deserialize)]
pub struct Prototype {
    vector: LabeledVector,
    #[serde(skip)]
    cache: EmbeddingSlot,
}

impl Prototype {
    pub fn new(values: DVector<f64>, label: ClassLabel) -> Self {
        Prototype {
            vector: LabeledVector::new(values, label),
            cache: EmbeddingSlot::default(),
        }
    }

    /// 데이터 포인트 위치에 프로토타입 배치 (다중 프로토타입 초기화)
    pub fn from_data_point(point: &DataPoint) -> Self {
        Self::new(point.values().clone(), point.label())
    }

    pub fn values(&self) -> &DVector<f64> {
        self.vector.values()
    }

    pub fn label(&self) -> ClassLabel {
        self.vector.label()
    }

    pub fn dimension(&self) -> usize {
        self.vector.dimension()
    }

    /// 오메가 행렬에 따른 임베딩 공간 투영 (캐시됨)
    pub fn embedded(&self, omega: &OmegaMatrix) -> DVector<f64> {
        self.cache.embedded_values(&self.vector, omega)
    }

    /// 현재 오메가 세대가 아닌 임베딩 캐시를 제거한다
    pub fn retain_cache(&self, omega_generation: Generation) {
        self.cache.retain_embedding(omega_generation);
    }
}

impl Clone for Prototype {
    fn clone(&self) -> Self {
        Prototype {
            vector: self.vector.clone(),
            cache: self.cache.clone(),
        }
    }
}

/// 세대 번호가 붙은 프로토타입 목록
///
/// 목록이 새로 만들어질 때마다 새로운 세대를 받는다. 승자 캐시는 이 세대 번호로
/// 유효성을 판단하므로 내용이 같아도 다른 목록과는 구분된다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrototypeSet {
    prototypes: Vec<Prototype>,
    #[serde(skip, default = "next_generation")]
    generation: Generation,
}

impl PrototypeSet {
    pub fn new(prototypes: Vec<Prototype>) -> Self {
        PrototypeSet {
            prototypes,
            generation: next_generation(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    pub fn get(&self, index: usize) -> &Prototype {
        &self.prototypes[index]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Prototype> {
        self.prototypes.iter()
    }

    pub fn as_slice(&self) -> &[Prototype] {
        &self.prototypes
    }
}

impl std::ops::Index<usize> for PrototypeSet {
    type Output = Prototype;

    fn index(&self, index: usize) -> &Prototype {
        &self.prototypes[index]
    }
}

impl<'a> IntoIterator for &'a PrototypeSet {
    type Item = &'a Prototype;
    type IntoIter = std::slice::Iter<'a, Prototype>;

    fn into_iter(self) -> Self::IntoIter {
        self.prototypes.iter()
    }
}
