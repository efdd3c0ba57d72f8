use nalgebra::{DMatrix, DVector};

use crate::model::omega::OmegaMatrix;
use crate::model::vector::{ClassLabel, DataPoint, Prototype, PrototypeSet};

fn two_class_prototypes() -> PrototypeSet {
    PrototypeSet::new(vec![
        Prototype::new(DVector::from_row_slice(&[0.0, 0.0]), ClassLabel::new(0.0)),
        Prototype::new(DVector::from_row_slice(&[5.0, 5.0]), ClassLabel::new(1.0)),
        Prototype::new(DVector::from_row_slice(&[1.0, 1.0]), ClassLabel::new(0.0)),
    ])
}

#[test]
fn 승자_정보는_같은_클래스와_다른_클래스를_구분한다() {
    let omega = OmegaMatrix::disabled();
    let prototypes = two_class_prototypes();
    let point = DataPoint::from_values(&[0.9, 0.9], 0.0);

    let winners = point.winning_information(&omega, &prototypes);
    assert_eq!(winners.index_same_class, 2, "더 가까운 같은 클래스 프로토타입이 이겨야 함");
    assert_eq!(winners.index_other_class, 1);
    assert!(winners.distance_same_class < winners.distance_other_class);
}

#[test]
fn 동률이면_먼저_본_프로토타입을_유지한다() {
    let omega = OmegaMatrix::disabled();
    let prototypes = PrototypeSet::new(vec![
        Prototype::new(DVector::from_row_slice(&[1.0]), ClassLabel::new(0.0)),
        Prototype::new(DVector::from_row_slice(&[-1.0]), ClassLabel::new(0.0)),
        Prototype::new(DVector::from_row_slice(&[3.0]), ClassLabel::new(1.0)),
    ]);
    let point = DataPoint::from_values(&[0.0], 0.0);

    let winners = point.winning_information(&omega, &prototypes);
    assert_eq!(winners.index_same_class, 0, "등거리면 인덱스가 낮은 쪽이 승자");
}

#[test]
fn 프로토타입_세대가_바뀌면_승자를_다시_계산한다() {
    let omega = OmegaMatrix::disabled();
    let point = DataPoint::from_values(&[0.9, 0.9], 0.0);

    let first_set = two_class_prototypes();
    let first = point.winning_information(&omega, &first_set);

    // 내용은 같지만 세대가 다른 새 목록
    let second_set = two_class_prototypes();
    let second = point.winning_information(&omega, &second_set);
    assert_eq!(first.index_same_class, second.index_same_class);

    // 실제로 다른 목록이면 결과도 달라진다
    let moved_set = PrototypeSet::new(vec![
        Prototype::new(DVector::from_row_slice(&[0.9, 0.9]), ClassLabel::new(0.0)),
        Prototype::new(DVector::from_row_slice(&[5.0, 5.0]), ClassLabel::new(1.0)),
    ]);
    let moved = point.winning_information(&omega, &moved_set);
    assert_eq!(moved.index_same_class, 0);
    assert_eq!(moved.distance_same_class, 0.0);
}

#[test]
fn 오메가_세대가_바뀌면_임베딩을_다시_계산한다() {
    let point = DataPoint::from_values(&[1.0, 2.0], 0.0);

    let identity = OmegaMatrix::identity(2);
    let embedded = point.embedded(&identity);
    assert_eq!(embedded, DVector::from_row_slice(&[1.0, 2.0]));

    let doubled = OmegaMatrix::new(DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 2.0]));
    let re_embedded = point.embedded(&doubled);
    assert_eq!(re_embedded, DVector::from_row_slice(&[2.0, 4.0]));
}

#[test]
fn 캐시_정리는_현재_세대_조합만_남긴다() {
    let omega = OmegaMatrix::identity(2);
    let prototypes = two_class_prototypes();
    let point = DataPoint::from_values(&[0.5, 0.5], 0.0);

    point.winning_information(&omega, &prototypes);
    // 현재 세대 조합을 지정하면 캐시가 그대로 유효하다
    point.retain_cache(omega.generation(), prototypes.generation());
    let winners = point.winning_information(&omega, &prototypes);
    assert_eq!(winners.index_same_class, 0);

    // 존재하지 않는 세대를 지정하면 다음 접근에서 다시 계산된다
    point.retain_cache(omega.generation() + 1000, prototypes.generation());
    let recomputed = point.winning_information(&omega, &prototypes);
    assert_eq!(recomputed.index_same_class, winners.index_same_class);
    assert_eq!(recomputed.distance_same_class, winners.distance_same_class);
}
