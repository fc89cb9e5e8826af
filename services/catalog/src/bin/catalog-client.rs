//! Catalog Client - 笔记本目录命令行客户端

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use catalog::api::pcbook::{Filter, memory};
use catalog::client::{AuthClient, CredentialRefresher, LaptopClient};
use catalog::sample;
use clap::{Args, Parser, Subcommand};
use pcbook_common::RetryConfig;
use pcbook_config::ClientConfig;
use pcbook_telemetry::init_tracing;
use tonic::transport::Channel;
use tracing::info;

/// 笔记本目录客户端
#[derive(Debug, Parser)]
#[command(name = "catalog-client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置目录（读取其中的 client.toml）
    #[arg(long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: String,

    /// 覆盖配置中的服务端地址
    #[arg(long)]
    server_address: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// 创建若干随机笔记本
    Create {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// 按条件搜索
    Search(SearchArgs),
    /// 为新建的随机笔记本上传图片
    Upload {
        path: PathBuf,
    },
    /// 创建随机笔记本并为它们提交若干轮评分
    Rate {
        #[arg(long, default_value_t = 3)]
        laptops: usize,
        #[arg(long, default_value_t = 3)]
        rounds: usize,
    },
}

#[derive(Debug, Args)]
struct SearchArgs {
    /// 价格上限，0 表示不限
    #[arg(long, default_value_t = 3000.0)]
    max_price: f64,
    #[arg(long, default_value_t = 4)]
    min_cores: u32,
    #[arg(long, default_value_t = 2.5)]
    min_ghz: f64,
    #[arg(long, default_value_t = 8)]
    min_ram_gb: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ClientConfig::load(&cli.config_dir)?;
    if let Some(address) = cli.server_address {
        config.server_address = address;
    }
    init_tracing(&config.telemetry.log_level);

    let channel = Channel::from_shared(config.server_address.clone())?
        .connect()
        .await?;
    info!(address = %config.server_address, "Connected to catalog server");

    let authenticator = AuthClient::new(
        channel.clone(),
        config.username.clone(),
        config.password.clone(),
    );
    let refresher = CredentialRefresher::start(
        authenticator,
        Duration::from_secs(config.refresh_lead_secs),
        RetryConfig::default(),
    )
    .await?;
    let mut client = LaptopClient::new(channel, Arc::new(refresher));

    match cli.command {
        Commands::Create { count } => {
            for _ in 0..count {
                client.create_laptop(sample::new_laptop()).await?;
            }
        }
        Commands::Search(args) => {
            for _ in 0..10 {
                client.create_laptop(sample::new_laptop()).await?;
            }

            let filter = Filter {
                max_price_usd: args.max_price,
                min_cpu_cores: args.min_cores,
                min_cpu_ghz: args.min_ghz,
                min_ram: Some(sample::memory_of(args.min_ram_gb, memory::Unit::Gigabyte)),
            };
            let found = client.search_laptop(filter).await?;
            info!(count = found.len(), "Search finished");
        }
        Commands::Upload { path } => {
            let laptop_id = client.create_laptop(sample::new_laptop()).await?;
            client.upload_image(&laptop_id, &path).await?;
        }
        Commands::Rate { laptops, rounds } => {
            let mut ids = Vec::with_capacity(laptops);
            for _ in 0..laptops {
                ids.push(client.create_laptop(sample::new_laptop()).await?);
            }

            for round in 0..rounds {
                let ratings = ids
                    .iter()
                    .map(|id| (id.clone(), sample::random_score()))
                    .collect();
                let responses = client.rate_laptop(ratings).await?;
                info!(round = round + 1, rated = responses.len(), "Rating round finished");
            }
        }
    }

    Ok(())
}
