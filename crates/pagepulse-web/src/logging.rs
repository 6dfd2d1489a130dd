//! 브라우저 콘솔 tracing 출력.

use std::io;

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// 한 줄 단위로 `console.log`에 기록
#[derive(Debug, Default)]
pub struct ConsoleWriter {
    buffer: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer);
            web_sys::console::log_1(&line.trim_end().into());
            self.buffer.clear();
        }
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let _ = io::Write::flush(self);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::default()
    }
}

/// 콘솔 로깅 초기화. 이미 설정돼 있으면 false
pub fn init_console_tracing(level: &str) -> bool {
    let filter = EnvFilter::try_new(format!(
        "pagepulse_web={level},pagepulse_core={level},pagepulse_app={level},pagepulse_pipeline={level},\
         pagepulse_network={level},pagepulse_vitals={level},pagepulse_mitigation={level},\
         pagepulse_storage={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(ConsoleMakeWriter)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .try_init()
        .is_ok()
}
