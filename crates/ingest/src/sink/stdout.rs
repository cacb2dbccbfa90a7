//! JSON Lines 싱크 -- systemd 밖에서 실행하거나 디버깅할 때 사용
//!
//! 레코드 하나를 JSON 객체 한 줄로 씁니다.

use sysrelay_core::error::SinkError;
use sysrelay_core::pipeline::Sink;
use sysrelay_core::types::SinkEntry;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// 표준 출력 싱크
pub type StdoutSink = JsonLinesSink<tokio::io::Stdout>;

impl StdoutSink {
    /// 표준 출력에 쓰는 싱크를 생성합니다.
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

/// 임의의 writer에 JSON Lines로 쓰는 싱크
///
/// 동시 호출 시 줄이 섞이지 않도록 writer를 잠급니다.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// writer를 감싸 싱크를 생성합니다.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// 내부 writer를 돌려받습니다.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> Sink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        "stdout"
    }

    async fn deliver(&self, entry: SinkEntry) -> Result<(), SinkError> {
        let mut line =
            serde_json::to_vec(&entry).map_err(|e| SinkError::Encode(e.to_string()))?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}
