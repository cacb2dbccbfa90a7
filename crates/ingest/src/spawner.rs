//! 입력 단위 태스크 생성 정책
//!
//! - [`UnboundedSpawner`]: 단위마다 `tokio::spawn` (기본)
//! - [`BoundedSpawner`]: 세마포어 허가가 있을 때만 생성, 없으면 즉시 거부

use std::sync::Arc;

use sysrelay_core::pipeline::{BoxFuture, SpawnOutcome, UnitSpawner};
use tokio::sync::Semaphore;

/// 동시 처리 한도가 없는 정책
#[derive(Debug, Clone, Copy, Default)]
pub struct UnboundedSpawner;

impl UnitSpawner for UnboundedSpawner {
    fn name(&self) -> &str {
        "unbounded"
    }

    fn spawn(&self, unit: BoxFuture<'static, ()>) -> SpawnOutcome {
        tokio::spawn(unit);
        SpawnOutcome::Spawned
    }
}

/// 동시에 처리 중인 단위 수를 제한하는 정책
///
/// 허가를 기다리지 않습니다. 수신 루프가 막히지 않도록 한도에 닿으면
/// 해당 단위를 버리고 [`SpawnOutcome::Rejected`]를 돌려줍니다.
#[derive(Debug, Clone)]
pub struct BoundedSpawner {
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl BoundedSpawner {
    /// `max_in_flight`개의 허가로 정책을 생성합니다.
    ///
    /// 세마포어 허가 상한을 넘는 값은 상한으로 줄입니다.
    pub fn new(max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.min(Semaphore::MAX_PERMITS);
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    /// 최대 동시 처리 수
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// 현재 처리 중인 단위 수
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }
}

impl UnitSpawner for BoundedSpawner {
    fn name(&self) -> &str {
        "bounded"
    }

    fn spawn(&self, unit: BoxFuture<'static, ()>) -> SpawnOutcome {
        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            return SpawnOutcome::Rejected;
        };

        tokio::spawn(async move {
            unit.await;
            drop(permit); // 단위 종료 시 허가 반환
        });
        SpawnOutcome::Spawned
    }
}

/// 설정값으로 정책을 고릅니다. 0이면 무제한입니다.
pub fn from_max_in_flight(max_in_flight: usize) -> Arc<dyn UnitSpawner> {
    if max_in_flight == 0 {
        Arc::new(UnboundedSpawner)
    } else {
        Arc::new(BoundedSpawner::new(max_in_flight))
    }
}
