//! 학습에 쓰이는 무작위성의 단일 출처
//!
//! 서브샘플 추출, 프로토타입 초기화용 표본 선택, 공분산 추정용 표본 제한이 모두
//! 하나의 난수 스트림을 공유한다. 시드를 고정하면 전체 학습이 재현 가능하다.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::model::DataPoint;

/// 시드 가능한 데이터 추출기
#[derive(Debug)]
pub struct DataRandomizer {
    rng: StdRng,
}

impl DataRandomizer {
    /// 시드를 주면 결정적, 생략하면 엔트로피 기반 스트림
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        DataRandomizer { rng }
    }

    /// 비율에 해당하는 표본 크기. 올림하되 최소 1, 최대 전체 크기
    pub fn sample_size(total: usize, ratio: f64) -> usize {
        ((total as f64 * ratio).ceil() as usize).clamp(1, total.max(1))
    }

    /// 학습 데이터에서 에포크용 서브샘플을 뽑는다
    ///
    /// 비율이 1 이상이면 전체를 원래 순서 그대로 반환한다 (섞지 않는다).
    pub fn subsample<'a>(&mut self, data: &'a [DataPoint], ratio: f64) -> Vec<&'a DataPoint> {
        if ratio >= 1.0 {
            return data.iter().collect();
        }
        let size = Self::sample_size(data.len(), ratio);
        rand::seq::index::sample(&mut self.rng, data.len(), size)
            .iter()
            .map(|index| &data[index])
            .collect()
    }

    /// 서로 다른 포인트를 비복원으로 고른다 (다중 프로토타입 초기화)
    pub fn distinct_points<'a>(
        &mut self,
        points: &[&'a DataPoint],
        count: usize,
    ) -> Vec<&'a DataPoint> {
        let count = count.min(points.len());
        rand::seq::index::sample(&mut self.rng, points.len(), count)
            .iter()
            .map(|index| points[index])
            .collect()
    }

    /// 공분산 추정처럼 상한이 있는 경우의 표본. 전체가 상한 이하면 그대로 쓴다
    pub fn sample_at_most<'a>(
        &mut self,
        data: &'a [DataPoint],
        limit: usize,
    ) -> Vec<&'a DataPoint> {
        if data.len() <= limit {
            return data.iter().collect();
        }
        rand::seq::index::sample(&mut self.rng, data.len(), limit)
            .iter()
            .map(|index| &data[index])
            .collect()
    }
}

#[cfg(test)]
mod __tests__ {
    use super::*;

    fn toy_data(count: usize) -> Vec<DataPoint> {
        (0..count)
            .map(|index| DataPoint::from_values(&[index as f64], 0.0))
            .collect()
    }

    #[test]
    fn 비율_1이면_원래_순서를_유지한다() {
        let data = toy_data(5);
        let mut randomizer = DataRandomizer::new(Some(7));
        let sample = randomizer.subsample(&data, 1.0);
        assert_eq!(sample.len(), 5);
        for (index, point) in sample.iter().enumerate() {
            assert_eq!(point.values()[0], index as f64);
        }
    }

    #[test]
    fn 표본_크기는_최소_1이다() {
        assert_eq!(DataRandomizer::sample_size(100, 0.001), 1);
        assert_eq!(DataRandomizer::sample_size(10, 0.1), 1);
        assert_eq!(DataRandomizer::sample_size(10, 0.25), 3);
        assert_eq!(DataRandomizer::sample_size(10, 1.0), 10);
    }

    #[test]
    fn 서브샘플은_서로_다른_포인트로_구성된다() {
        let data = toy_data(20);
        let mut randomizer = DataRandomizer::new(Some(42));
        let sample = randomizer.subsample(&data, 0.5);
        assert_eq!(sample.len(), 10);
        let mut seen: Vec<u64> = sample
            .iter()
            .map(|point| point.values()[0].to_bits())
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn 같은_시드는_같은_서브샘플을_만든다() {
        let data = toy_data(30);
        let mut first = DataRandomizer::new(Some(11));
        let mut second = DataRandomizer::new(Some(11));
        let sample_first: Vec<f64> = first.subsample(&data, 0.3).iter().map(|p| p.values()[0]).collect();
        let sample_second: Vec<f64> =
            second.subsample(&data, 0.3).iter().map(|p| p.values()[0]).collect();
        assert_eq!(sample_first, sample_second);
    }
}
