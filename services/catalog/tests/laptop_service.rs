mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use catalog::MAX_IMAGE_SIZE;
use catalog::api::pcbook::{
    CreateLaptopRequest, Filter, ImageInfo, Laptop, RateLaptopRequest, SearchLaptopRequest,
    UploadImageRequest, laptop_service_client::LaptopServiceClient, memory,
    upload_image_request::Data,
};
use catalog::domain::{ImageStore, LaptopSink, LaptopStore};
use catalog::sample;
use common::{TestServer, authorized, laptop_with};
use pcbook_common::CallContext;
use pcbook_errors::AppResult;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::Code;
use tonic::transport::Channel;
use uuid::Uuid;

async fn client(server: &TestServer) -> LaptopServiceClient<Channel> {
    LaptopServiceClient::new(server.channel().await)
}

fn create_request(server: &TestServer, id: &str) -> tonic::Request<CreateLaptopRequest> {
    let mut laptop = sample::new_laptop();
    laptop.id = id.to_string();
    authorized(
        CreateLaptopRequest {
            laptop: Some(laptop),
        },
        &server.admin_token(),
    )
}

fn upload_requests(laptop_id: &str, total: usize) -> Vec<UploadImageRequest> {
    let info = UploadImageRequest {
        data: Some(Data::Info(ImageInfo {
            laptop_id: laptop_id.to_string(),
            image_type: ".jpg".to_string(),
        })),
    };
    let chunks = vec![7u8; total]
        .chunks(1024)
        .map(|chunk| UploadImageRequest {
            data: Some(Data::ChunkData(chunk.to_vec())),
        })
        .collect::<Vec<_>>();

    std::iter::once(info).chain(chunks).collect()
}

#[tokio::test]
async fn create_laptop_assigns_or_keeps_id() {
    let server = TestServer::start().await;
    let mut client = client(&server).await;

    let generated = client
        .create_laptop(create_request(&server, ""))
        .await
        .unwrap()
        .into_inner()
        .id;
    assert!(Uuid::parse_str(&generated).is_ok());

    let chosen = Uuid::new_v4().to_string();
    let kept = client
        .create_laptop(create_request(&server, &chosen))
        .await
        .unwrap()
        .into_inner()
        .id;
    assert_eq!(kept, chosen);

    let stored = server.state.laptops.find(&chosen).await.unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn create_laptop_rejects_bad_or_duplicate_id() {
    let server = TestServer::start().await;
    let mut client = client(&server).await;

    let status = client
        .create_laptop(create_request(&server, "invalid-uuid"))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let id = Uuid::new_v4().to_string();
    client
        .create_laptop(create_request(&server, &id))
        .await
        .unwrap();
    let status = client
        .create_laptop(create_request(&server, &id))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::AlreadyExists);
}

#[tokio::test]
async fn search_laptop_streams_matches_only() {
    let server = TestServer::start().await;

    let mut low_ram = laptop_with(1999.0, 4, 2.5, 16);
    low_ram.ram = Some(sample::memory_of(4096, memory::Unit::Megabyte));

    let candidates = vec![
        (laptop_with(2500.0, 4, 2.5, 16), false),
        (laptop_with(1999.0, 2, 2.5, 16), false),
        (laptop_with(1999.0, 4, 2.0, 16), false),
        (low_ram, false),
        (laptop_with(1999.0, 4, 2.5, 16), true),
        (laptop_with(2000.0, 6, 2.8, 64), true),
    ];

    let mut expected = Vec::new();
    for (laptop, matches) in candidates {
        let id = server.insert_laptop(laptop).await;
        if matches {
            expected.push(id);
        }
    }

    let filter = Filter {
        max_price_usd: 2000.0,
        min_cpu_cores: 4,
        min_cpu_ghz: 2.2,
        min_ram: Some(sample::memory_of(8, memory::Unit::Gigabyte)),
    };

    // 搜索是公开方法，不带令牌
    let mut stream = client(&server)
        .await
        .search_laptop(SearchLaptopRequest {
            filter: Some(filter),
        })
        .await
        .unwrap()
        .into_inner();

    let mut found = Vec::new();
    while let Some(response) = stream.message().await.unwrap() {
        found.push(response.laptop.unwrap().id);
    }

    found.sort();
    expected.sort();
    assert_eq!(found, expected);
}

#[tokio::test]
async fn upload_image_saves_file() {
    let server = TestServer::start().await;
    let laptop_id = server.insert_laptop(sample::new_laptop()).await;

    let response = client(&server)
        .await
        .upload_image(authorized(
            tokio_stream::iter(upload_requests(&laptop_id, 3000)),
            &server.admin_token(),
        ))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.size, 3000);

    let info = server.state.images.find(&response.id).await.unwrap().unwrap();
    assert_eq!(info.laptop_id, laptop_id);
    assert_eq!(info.size, 3000);
    assert!(info.path.ends_with(format!("{}.jpg", response.id)));
    assert_eq!(std::fs::read(&info.path).unwrap().len(), 3000);
}

#[tokio::test]
async fn upload_image_over_limit_is_rejected() {
    let server = TestServer::start().await;
    let laptop_id = server.insert_laptop(sample::new_laptop()).await;

    let status = client(&server)
        .await
        .upload_image(authorized(
            tokio_stream::iter(upload_requests(&laptop_id, MAX_IMAGE_SIZE + 1)),
            &server.admin_token(),
        ))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::ResourceExhausted);
    assert_eq!(server.stored_image_files(), 0);
}

#[tokio::test]
async fn upload_image_at_limit_is_accepted() {
    let server = TestServer::start().await;
    let laptop_id = server.insert_laptop(sample::new_laptop()).await;

    let response = client(&server)
        .await
        .upload_image(authorized(
            tokio_stream::iter(upload_requests(&laptop_id, MAX_IMAGE_SIZE)),
            &server.admin_token(),
        ))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.size as usize, MAX_IMAGE_SIZE);
}

#[tokio::test]
async fn upload_image_for_unknown_laptop_is_invalid() {
    let server = TestServer::start().await;

    let status = client(&server)
        .await
        .upload_image(authorized(
            tokio_stream::iter(upload_requests(&Uuid::new_v4().to_string(), 10)),
            &server.admin_token(),
        ))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(server.stored_image_files(), 0);
}

#[tokio::test]
async fn rate_laptop_answers_each_request_in_order() {
    let server = TestServer::start().await;
    let laptop_id = server.insert_laptop(sample::new_laptop()).await;

    let (tx, rx) = mpsc::channel(1);
    let mut responses = client(&server)
        .await
        .rate_laptop(authorized(ReceiverStream::new(rx), &server.user_token()))
        .await
        .unwrap()
        .into_inner();

    let mut averages = Vec::new();
    for (i, score) in [8.0, 7.5, 10.0].into_iter().enumerate() {
        tx.send(RateLaptopRequest {
            laptop_id: laptop_id.clone(),
            score,
        })
        .await
        .unwrap();

        // 下一条请求发出之前必须已经收到本条的响应
        let response = responses.message().await.unwrap().unwrap();
        assert_eq!(response.laptop_id, laptop_id);
        assert_eq!(response.rated_count as usize, i + 1);
        averages.push(response.average_score);
    }
    drop(tx);

    assert!(responses.message().await.unwrap().is_none());
    assert_eq!(averages, vec![8.0, 7.75, 8.5]);
}

#[tokio::test]
async fn rate_laptop_unknown_id_is_not_found() {
    let server = TestServer::start().await;

    let requests = vec![RateLaptopRequest {
        laptop_id: Uuid::new_v4().to_string(),
        score: 5.0,
    }];
    let mut responses = client(&server)
        .await
        .rate_laptop(authorized(
            tokio_stream::iter(requests),
            &server.user_token(),
        ))
        .await
        .unwrap()
        .into_inner();

    let status = responses.message().await.unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
}

/// 交出一条记录后一直挂起，直到调用被取消或超时
struct StallingCatalog {
    scans: mpsc::UnboundedSender<CancellationToken>,
}

#[async_trait]
impl LaptopStore for StallingCatalog {
    async fn save(&self, laptop: Laptop) -> AppResult<String> {
        Ok(laptop.id)
    }

    async fn find(&self, _id: &str) -> AppResult<Option<Laptop>> {
        Ok(None)
    }

    async fn search(
        &self,
        ctx: &CallContext,
        _filter: &Filter,
        sink: &mut dyn LaptopSink,
    ) -> AppResult<()> {
        let _ = self.scans.send(ctx.cancellation_token());
        sink.emit(sample::new_laptop()).await?;
        ctx.guard(std::future::pending::<()>()).await
    }
}

async fn stalling_server() -> (TestServer, mpsc::UnboundedReceiver<CancellationToken>) {
    let (scans, started) = mpsc::unbounded_channel();
    let server = TestServer::start_with_laptops(Arc::new(StallingCatalog { scans })).await;
    (server, started)
}

#[tokio::test]
async fn upload_image_stalled_past_deadline_is_deadline_exceeded() {
    let server = TestServer::start().await;
    let laptop_id = server.insert_laptop(sample::new_laptop()).await;

    // 只发送图片信息，之后不再发送数据也不关闭流
    let (tx, rx) = mpsc::channel(1);
    tx.send(upload_requests(&laptop_id, 0).remove(0)).await.unwrap();
    let mut request = authorized(ReceiverStream::new(rx), &server.admin_token());
    request.set_timeout(Duration::from_millis(300));

    let status = client(&server)
        .await
        .upload_image(request)
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::DeadlineExceeded);
    assert_eq!(server.stored_image_files(), 0);
    drop(tx);
}

#[tokio::test]
async fn rate_laptop_stalled_past_deadline_is_deadline_exceeded() {
    let server = TestServer::start().await;

    let (tx, rx) = mpsc::channel::<RateLaptopRequest>(1);
    let mut request = authorized(ReceiverStream::new(rx), &server.user_token());
    request.set_timeout(Duration::from_millis(300));

    let mut responses = client(&server)
        .await
        .rate_laptop(request)
        .await
        .unwrap()
        .into_inner();

    let status = responses.message().await.unwrap_err();
    assert_eq!(status.code(), Code::DeadlineExceeded);
    drop(tx);
}

#[tokio::test]
async fn search_laptop_past_deadline_is_deadline_exceeded() {
    let (server, _started) = stalling_server().await;

    let mut request = tonic::Request::new(SearchLaptopRequest {
        filter: Some(Filter::default()),
    });
    request.set_timeout(Duration::from_millis(300));

    let mut responses = client(&server)
        .await
        .search_laptop(request)
        .await
        .unwrap()
        .into_inner();

    assert!(responses.message().await.unwrap().is_some());
    let status = responses.message().await.unwrap_err();
    assert_eq!(status.code(), Code::DeadlineExceeded);
}

#[tokio::test]
async fn search_laptop_consumer_disconnect_cancels_scan() {
    let (server, mut started) = stalling_server().await;
    let mut client = client(&server).await;

    let mut responses = client
        .search_laptop(SearchLaptopRequest {
            filter: Some(Filter::default()),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(responses.message().await.unwrap().is_some());

    let scan = started.recv().await.unwrap();
    assert!(!scan.is_cancelled());

    drop(responses);
    tokio::time::timeout(Duration::from_secs(5), scan.cancelled())
        .await
        .expect("scan should be cancelled once the consumer is gone");
}
