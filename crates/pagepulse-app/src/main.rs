//! # pagepulse-replay
//!
//! 기록된 vitals/이벤트 트레이스를 헤드리스 엔진으로 재생하고 결과를 JSON으로 출력한다.

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::path::PathBuf;
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use clap::Parser;
    use pagepulse_app::init_tracing;
    use pagepulse_app::platform::RecordingEventSink;
    use pagepulse_app::replay::{self, Trace};
    use pagepulse_core::config::AppConfig;
    use pagepulse_core::ports::sink::EventSink;
    use pagepulse_network::http_sink::HttpEventSink;
    use tracing::info;

    /// PAGEPULSE 트레이스 리플레이
    #[derive(Parser, Debug)]
    #[command(name = "pagepulse-replay")]
    #[command(author, version, about, long_about = None)]
    struct Args {
        /// 트레이스 JSON 파일
        trace: PathBuf,

        /// 엔진 설정 JSON 파일 (기본: 내장 기본값)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// 수집 서버 URL. 지정하면 이벤트를 실제로 전송한다
        #[arg(long)]
        collector: Option<String>,

        /// 로그 레벨 (trace, debug, info, warn, error)
        #[arg(long, short = 'l', default_value = "info")]
        log_level: String,

        /// 결과 JSON 들여쓰기
        #[arg(long)]
        pretty: bool,
    }

    pub async fn main() -> Result<()> {
        let args = Args::parse();
        init_tracing(&args.log_level);

        let mut config = match &args.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("설정 파일 읽기 실패: {}", path.display()))?;
                AppConfig::from_json(&raw).context("설정 파싱 실패")?
            }
            None => AppConfig::default_config(),
        };

        let raw = std::fs::read_to_string(&args.trace)
            .with_context(|| format!("트레이스 파일 읽기 실패: {}", args.trace.display()))?;
        let trace: Trace = serde_json::from_str(&raw).context("트레이스 파싱 실패")?;

        let recording = Arc::new(RecordingEventSink::new());
        let sink: Arc<dyn EventSink> = match args.collector {
            Some(base_url) => {
                config.collector.base_url = base_url;
                // 네이티브에는 페이지 origin이 없으므로 URL을 명시해야 한다
                info!(endpoint = %config.collector.endpoint(), "수집 서버로 전송");
                Arc::new(HttpEventSink::new(&config.collector)?)
            }
            None => recording.clone(),
        };

        let steps = trace.steps.len();
        let outcome = replay::run(trace, config, sink).await?;
        info!(
            steps,
            recorded = recording.len(),
            score = %format_args!("{:.1}", outcome.rating.score),
            "리플레이 완료"
        );

        let output = if args.pretty {
            serde_json::to_string_pretty(&outcome)?
        } else {
            serde_json::to_string(&outcome)?
        };
        println!("{output}");
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
