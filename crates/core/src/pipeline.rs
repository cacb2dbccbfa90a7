//! 파이프라인 trait — 시계, 싱크, 태스크 생성 정책 등 외부 capability 정의
//!
//! 수집기는 구체 구현이 아니라 이 trait들에만 의존합니다.
//! - [`Clock`]: 타임스탬프 기본값을 위한 현재 시각
//! - [`Sink`] / [`DynSink`]: 파싱된 메시지를 받아 저장/전달
//! - [`UnitSpawner`]: 입력 단위(데이터그램, 연결)마다 태스크를 띄우는 정책

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::error::SinkError;
use crate::types::SinkEntry;

/// `Send` 가능한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ─── Clock ───────────────────────────────────────────────────────────

/// 현재 시각 capability
///
/// 파서는 메시지에서 타임스탬프를 얻지 못했을 때만 한 번 호출합니다.
/// 테스트에서는 [`FixedClock`]을 주입해 결과를 결정적으로 만듭니다.
pub trait Clock: Send + Sync {
    /// 현재 시각 (UTC)
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 항상 같은 시각을 반환하는 시계
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ─── Sink ────────────────────────────────────────────────────────────

/// 파싱된 메시지를 받는 싱크 trait
///
/// 여러 태스크에서 동시에 호출되므로 구현체가 스스로 동기화를 책임져야 합니다.
/// 실패는 [`SinkError`]로 돌려주며, 호출 측은 로그만 남기고 재시도하지 않습니다.
pub trait Sink: Send + Sync {
    /// 싱크 이름 (로그/메트릭용)
    fn name(&self) -> &str;

    /// 레코드 하나를 전달합니다.
    fn deliver(&self, entry: SinkEntry) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// dyn-compatible 싱크 trait
///
/// `Sink`는 RPITIT를 사용하므로 `dyn Sink`가 불가합니다.
/// `Arc<dyn DynSink>`로 태스크 간에 공유합니다.
pub trait DynSink: Send + Sync {
    /// 싱크 이름
    fn name(&self) -> &str;

    /// 레코드 하나를 전달합니다.
    fn deliver(&self, entry: SinkEntry) -> BoxFuture<'_, Result<(), SinkError>>;
}

/// Sink를 구현한 타입은 자동으로 DynSink도 구현됩니다.
impl<T: Sink> DynSink for T {
    fn name(&self) -> &str {
        Sink::name(self)
    }

    fn deliver(&self, entry: SinkEntry) -> BoxFuture<'_, Result<(), SinkError>> {
        Box::pin(Sink::deliver(self, entry))
    }
}

// ─── UnitSpawner ─────────────────────────────────────────────────────

/// 태스크 생성 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// 태스크가 생성됨
    Spawned,
    /// 동시 처리 한도 초과로 거부됨 (입력 단위는 버려짐)
    Rejected,
}

/// 입력 단위마다 독립 태스크를 띄우는 정책
///
/// 수신 루프는 이 trait을 통해서만 태스크를 만들기 때문에,
/// 파싱 계약을 바꾸지 않고 무제한/제한 정책을 교체할 수 있습니다.
pub trait UnitSpawner: Send + Sync {
    /// 정책 이름 (로그용)
    fn name(&self) -> &str;

    /// 입력 단위 하나를 처리할 태스크를 생성합니다. 호출 측을 블로킹하지 않습니다.
    fn spawn(&self, unit: BoxFuture<'static, ()>) -> SpawnOutcome;
}
