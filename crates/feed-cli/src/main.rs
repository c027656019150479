//! 실시간 시세 피드 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 시세 스트림 구독
//! feed quotes --symbols AAPL,msft
//!
//! # 상승률 상위 5개만 출력
//! feed movers --category gainers --limit 5
//!
//! # 설정에서 계산된 스트리밍 URL 확인
//! feed endpoints
//! ```

use clap::{Parser, Subcommand};
use feed_core::logging::{init_logging, LogConfig, LogFormat};
use feed_core::{AppConfig, MoverCategory, DEFAULT_CONFIG_PATH};
use tracing::debug;

mod commands;

#[derive(Parser)]
#[command(name = "feed")]
#[command(about = "Market feed CLI - 실시간 시세/상위 종목 스트림 클라이언트", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// 로그 레벨 (trace, debug, info, warn, error). 설정 파일보다 우선
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// 로그 형식 (pretty, json, compact). 설정 파일보다 우선
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 종목별 실시간 시세 스트림 구독
    Quotes {
        /// 구독할 심볼 (쉼표로 구분, 예: AAPL,MSFT)
        #[arg(short, long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        /// 스냅샷을 JSON 한 줄로 출력
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// 상승/하락/거래량 상위 종목 스트림 구독
    Movers {
        /// 출력할 카테고리 (gainers, losers, actives). 지정하지 않으면 전체
        #[arg(short, long)]
        category: Option<String>,

        /// 카테고리별 최대 출력 수
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// 스냅샷을 JSON 한 줄로 출력
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// 설정에서 계산된 스트리밍 URL 출력
    Endpoints,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일은 선택 사항
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        format
            .parse::<LogFormat>()
            .map_err(anyhow::Error::msg)?;
        config.logging.format = format;
    }

    init_logging(LogConfig::from(&config.logging)).map_err(|e| anyhow::anyhow!("{}", e))?;
    debug!(path = %cli.config, "Configuration loaded");

    match cli.command {
        Commands::Quotes { symbols, json } => {
            commands::quotes::run(&config, symbols, json).await?;
        }
        Commands::Movers {
            category,
            limit,
            json,
        } => {
            let category = category
                .map(|c| c.parse::<MoverCategory>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            commands::movers::run(&config, category, limit, json).await?;
        }
        Commands::Endpoints => commands::endpoints::run(&config),
    }

    Ok(())
}
