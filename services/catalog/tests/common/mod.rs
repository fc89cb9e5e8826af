//! 集成测试公共设施：在随机端口启动完整服务端

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use catalog::api::pcbook::{Laptop, memory};
use catalog::application::seed_users;
use catalog::domain::{
    DiskImageStore, InMemoryLaptopStore, InMemoryRatingStore, InMemoryUserStore, LaptopStore,
};
use catalog::{ServerState, sample, serve_with_shutdown};
use pcbook_auth_core::TokenService;
use pcbook_config::SeedUser;
use secrecy::Secret;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::Request;
use tonic::transport::{Channel, Endpoint};

pub const PASSWORD: &str = "secret";

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: ServerState,
    pub image_dir: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_laptops(Arc::new(InMemoryLaptopStore::new())).await
    }

    /// 以指定的目录存储启动
    pub async fn start_with_laptops(laptops: Arc<dyn LaptopStore>) -> Self {
        let image_dir = tempfile::tempdir().unwrap();
        let tokens = TokenService::new("test-secret", Duration::from_secs(900), "pcbook");

        let users = Arc::new(InMemoryUserStore::new());
        seed_users(
            users.as_ref(),
            &[seed("admin1", "admin"), seed("user1", "user")],
        )
        .await
        .unwrap();

        let state = ServerState {
            laptops,
            images: Arc::new(DiskImageStore::new(image_dir.path())),
            ratings: Arc::new(InMemoryRatingStore::new()),
            users,
            tokens,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        tokio::spawn(serve_with_shutdown(state.clone(), listener, async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            state,
            image_dir,
            shutdown: Some(tx),
        }
    }

    pub async fn channel(&self) -> Channel {
        Endpoint::from_shared(format!("http://{}", self.addr))
            .unwrap()
            .connect()
            .await
            .unwrap()
    }

    pub fn token_for(&self, username: &str, role: &str) -> String {
        self.state
            .tokens
            .generate_token(username, role)
            .unwrap()
            .access_token
    }

    pub fn admin_token(&self) -> String {
        self.token_for("admin1", "admin")
    }

    pub fn user_token(&self) -> String {
        self.token_for("user1", "user")
    }

    /// 直接写入目录存储，绕开 RPC
    pub async fn insert_laptop(&self, laptop: Laptop) -> String {
        self.state.laptops.save(laptop).await.unwrap()
    }

    pub fn stored_image_files(&self) -> usize {
        std::fs::read_dir(self.image_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn seed(username: &str, role: &str) -> SeedUser {
    SeedUser {
        username: username.to_string(),
        password: Secret::new(PASSWORD.to_string()),
        role: role.to_string(),
    }
}

/// 附加 Bearer 令牌
pub fn authorized<T>(message: T, token: &str) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert("authorization", format!("Bearer {}", token).parse().unwrap());
    request
}

pub fn laptop_with(price: f64, cores: u32, min_ghz: f64, ram_gb: u64) -> Laptop {
    let mut laptop = sample::new_laptop();
    laptop.price_usd = price;
    if let Some(cpu) = laptop.cpu.as_mut() {
        cpu.number_cores = cores;
        cpu.number_threads = cores;
        cpu.min_ghz = min_ghz;
        cpu.max_ghz = min_ghz + 2.0;
    }
    laptop.ram = Some(sample::memory_of(ram_gb, memory::Unit::Gigabyte));
    laptop
}
