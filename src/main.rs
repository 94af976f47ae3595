// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use ratingcrawl::application::commands;
use ratingcrawl::config::settings::Settings;
use ratingcrawl::utils::{shutdown, telemetry};

/// Channel rating crawler.
///
/// URLs enter through the admission gateway, travel over the broker queue
/// and are scraped by a pool of workers that persist every result.
#[derive(Parser)]
#[command(name = "ratingcrawl", version, about)]
struct Cli {
    /// Extra configuration file, layered over config/default
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the admission gateway
    Gateway,
    /// Run a crawler that consumes the queue group
    Crawler,
    /// Run gateway and crawler in one process over an in-memory broker
    Standalone,
    /// Send every URL of a CSV file to the gateway
    Feed {
        /// CSV file with URLs in the first column
        path: PathBuf,
    },
    /// Apply pending database migrations and exit
    Migrate,
}

/// 主函数
///
/// 初始化日志、加载配置后按子命令启动对应组件
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting ratingcrawl {}", env!("CARGO_PKG_VERSION"));

    // 2. Load configuration
    let settings = Settings::load(cli.config.as_deref())?;
    info!("Configuration loaded");

    // 3. Run the selected component until it finishes or Ctrl+C
    match cli.command {
        Command::Gateway => commands::run_gateway(&settings, shutdown::shutdown_token()).await,
        Command::Crawler => commands::run_crawler(&settings, shutdown::shutdown_token()).await,
        Command::Standalone => commands::run_standalone(&settings, shutdown::shutdown_token()).await,
        Command::Feed { path } => commands::run_feed(&settings, &path, shutdown::shutdown_token()).await,
        Command::Migrate => commands::run_migrate(&settings).await,
    }
}
