//! systemd journal native 프로토콜 싱크
//!
//! 레코드 하나를 데이터그램 하나로 `/run/systemd/journal/socket`에 보냅니다.
//!
//! ```text
//! MESSAGE=text\n
//! PRIORITY=5\n
//! SYSLOG_IDENTIFIER=host app\n
//! ```
//!
//! 값에 개행이 있으면 바이너리 프레이밍을 사용합니다:
//! `KEY\n` + little-endian u64 길이 + 값 + `\n`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sysrelay_core::error::SinkError;
use sysrelay_core::pipeline::Sink;
use sysrelay_core::types::SinkEntry;
use tokio::net::UnixDatagram;
use tracing::debug;

/// 한 데이터그램에 담을 수 있는 최대 페이로드 (Linux 기본 `wmem_default`)
///
/// 이보다 큰 레코드는 memfd로 넘겨야 하지만 지원하지 않습니다.
pub const MAX_DATAGRAM_PAYLOAD: usize = 212_992;

/// journald 싱크
#[derive(Debug)]
pub struct JournaldSink {
    socket: UnixDatagram,
    path: PathBuf,
}

impl JournaldSink {
    /// 바인드하지 않은 datagram 소켓을 만들고 대상 경로를 기억합니다.
    ///
    /// 대상 소켓의 존재 여부는 첫 전달 때 확인됩니다.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let socket = UnixDatagram::unbound()?;
        Ok(Self {
            socket,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// 대상 소켓 경로
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for JournaldSink {
    fn name(&self) -> &str {
        "journald"
    }

    async fn deliver(&self, entry: SinkEntry) -> Result<(), SinkError> {
        let payload = encode_entry(&entry);
        if payload.len() > MAX_DATAGRAM_PAYLOAD {
            return Err(SinkError::Rejected(format!(
                "entry is {} bytes, datagram limit is {}",
                payload.len(),
                MAX_DATAGRAM_PAYLOAD
            )));
        }

        match self.socket.send_to(&payload, &self.path).await {
            Ok(_) => {
                debug!(bytes = payload.len(), "entry sent to journal");
                Ok(())
            }
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused) => {
                Err(SinkError::Unavailable(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
            Err(e) => Err(SinkError::Io(e)),
        }
    }
}

/// 레코드를 native 프로토콜 페이로드로 직렬화합니다.
///
/// `MESSAGE`, `PRIORITY` 다음에 속성이 키 순서대로 이어집니다.
pub fn encode_entry(entry: &SinkEntry) -> Vec<u8> {
    let attrs_len: usize = entry
        .attributes
        .iter()
        .map(|(k, v)| k.len() + v.len() + 10)
        .sum();
    let mut buf = Vec::with_capacity(entry.message.len() + attrs_len + 32);

    append_field(&mut buf, "MESSAGE", &entry.message);
    append_field(&mut buf, "PRIORITY", &entry.priority.to_string());
    for (key, value) in &entry.attributes {
        append_field(&mut buf, key, value);
    }

    buf
}

fn append_field(buf: &mut Vec<u8>, key: &str, value: &str) {
    buf.extend_from_slice(key.as_bytes());
    if value.contains('\n') {
        buf.push(b'\n');
        buf.extend_from_slice(&(value.len() as u64).to_le_bytes());
    } else {
        buf.push(b'=');
    }
    buf.extend_from_slice(value.as_bytes());
    buf.push(b'\n');
}
