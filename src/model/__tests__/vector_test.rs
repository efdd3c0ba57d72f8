use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use nalgebra::DVector;

use crate::model::vector::*;

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn 제곱_유클리드_거리는_대칭이다() {
    let first = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
    let second = DVector::from_row_slice(&[4.0, 0.0, -1.0]);
    assert_eq!(
        squared_euclidean(&first, &second),
        squared_euclidean(&second, &first),
        "거리는 인수 순서와 무관해야 함"
    );
}

#[test]
fn 같은_벡터의_거리는_정확히_0이다() {
    let vector = DVector::from_row_slice(&[0.25, -3.5, 7.0]);
    assert_eq!(squared_euclidean(&vector, &vector), 0.0);

    let nearly = DVector::from_row_slice(&[0.25, -3.5, 7.0 + 1e-12]);
    assert!(
        squared_euclidean(&vector, &nearly) > 0.0,
        "원소가 하나라도 다르면 거리는 0이 아니어야 함"
    );
}

#[test]
fn 클래스_라벨은_값_기반으로_같다() {
    assert_eq!(ClassLabel::new(1.0), ClassLabel::new(1.0));
    assert_ne!(ClassLabel::new(0.0), ClassLabel::new(1.0));
    assert_eq!(
        hash_of(&ClassLabel::new(2.0)),
        hash_of(&ClassLabel::new(2.0)),
        "같은 값은 같은 해시를 가져야 함"
    );
}

#[test]
fn 라벨_벡터는_값_기반_동등성을_가진다() {
    let first = LabeledVector::new(DVector::from_row_slice(&[1.0, 2.0]), ClassLabel::new(0.0));
    let second = LabeledVector::new(DVector::from_row_slice(&[1.0, 2.0]), ClassLabel::new(0.0));
    let other = LabeledVector::new(DVector::from_row_slice(&[1.0, 2.5]), ClassLabel::new(0.0));

    assert_eq!(first, second);
    assert_ne!(first, other);
    assert_eq!(hash_of(&first), hash_of(&second), "같은 내용은 같은 해시");
}

#[test]
fn 데이터_포인트는_복제해도_값이_같다() {
    let point = DataPoint::from_values(&[3.0, 4.0], 1.0);
    let cloned = point.clone();
    assert_eq!(point.values(), cloned.values());
    assert_eq!(point.label(), cloned.label());
    assert_eq!(point.dimension(), 2);
}

#[test]
fn 프로토타입은_데이터_포인트_위치에서_시작할_수_있다() {
    let point = DataPoint::from_values(&[1.5, -2.0], 0.0);
    let prototype = Prototype::from_data_point(&point);
    assert_eq!(prototype.values(), point.values());
    assert_eq!(prototype.label(), point.label());
}

#[test]
fn 프로토타입_목록은_만들_때마다_새_세대를_받는다() {
    let build = || {
        PrototypeSet::new(vec![
            Prototype::new(DVector::from_row_slice(&[0.0]), ClassLabel::new(0.0)),
            Prototype::new(DVector::from_row_slice(&[1.0]), ClassLabel::new(1.0)),
        ])
    };
    let first = build();
    let second = build();
    assert_ne!(
        first.generation(),
        second.generation(),
        "내용이 같아도 목록 세대는 달라야 함"
    );
}
