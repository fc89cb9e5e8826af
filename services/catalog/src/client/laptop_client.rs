//! 目录客户端

use std::path::Path;
use std::sync::Arc;

use pcbook_errors::{AppError, AppResult};
use tonic::transport::Channel;
use tower::Layer;
use tracing::{info, warn};

use super::{CredentialRefresher, CredentialService};
use crate::api::access::protected_methods;
use crate::api::pcbook::{
    CreateLaptopRequest, Filter, ImageInfo, Laptop, RateLaptopRequest, RateLaptopResponse,
    SearchLaptopRequest, UploadImageRequest, UploadImageResponse,
    laptop_service_client::LaptopServiceClient, upload_image_request::Data,
};

/// 上传时每个分片的大小
pub const CHUNK_SIZE: usize = 1024;

/// 带自动凭证的目录客户端
#[derive(Clone)]
pub struct LaptopClient {
    client: LaptopServiceClient<CredentialService<Channel>>,
    refresher: Arc<CredentialRefresher>,
}

impl LaptopClient {
    pub fn new(channel: Channel, refresher: Arc<CredentialRefresher>) -> Self {
        let service = refresher.layer(protected_methods()).layer(channel);
        Self {
            client: LaptopServiceClient::new(service),
            refresher,
        }
    }

    /// 创建笔记本；凭证失效时强制刷新一次后重试
    pub async fn create_laptop(&mut self, laptop: Laptop) -> AppResult<String> {
        match self.try_create(laptop.clone()).await {
            Err(err) if err.is_retryable() => {
                warn!(error = %err, "Create rejected, refreshing credentials and retrying once");
                self.refresher.refresh_now().await?;
                self.try_create(laptop).await
            }
            result => result,
        }
    }

    async fn try_create(&mut self, laptop: Laptop) -> AppResult<String> {
        let response = self
            .client
            .create_laptop(CreateLaptopRequest {
                laptop: Some(laptop),
            })
            .await
            .map_err(AppError::from)?
            .into_inner();

        info!(laptop_id = %response.id, "Laptop created");
        Ok(response.id)
    }

    /// 搜索并收集全部结果
    pub async fn search_laptop(&mut self, filter: Filter) -> AppResult<Vec<Laptop>> {
        let mut stream = self
            .client
            .search_laptop(SearchLaptopRequest {
                filter: Some(filter),
            })
            .await
            .map_err(AppError::from)?
            .into_inner();

        let mut laptops = Vec::new();
        while let Some(response) = stream.message().await.map_err(AppError::from)? {
            if let Some(laptop) = response.laptop {
                info!(laptop_id = %laptop.id, price_usd = laptop.price_usd, "Found laptop");
                laptops.push(laptop);
            }
        }

        Ok(laptops)
    }

    /// 上传图片文件，扩展名（含点）作为图片类型
    pub async fn upload_image(
        &mut self,
        laptop_id: &str,
        path: impl AsRef<Path>,
    ) -> AppResult<UploadImageResponse> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::validation(format!("cannot read image file: {}", e)))?;
        let image_type = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        self.upload_image_data(laptop_id, &image_type, &data).await
    }

    /// 以一条元信息加若干 [`CHUNK_SIZE`] 分片发送图片内容
    pub async fn upload_image_data(
        &mut self,
        laptop_id: &str,
        image_type: &str,
        data: &[u8],
    ) -> AppResult<UploadImageResponse> {
        let info = UploadImageRequest {
            data: Some(Data::Info(ImageInfo {
                laptop_id: laptop_id.to_string(),
                image_type: image_type.to_string(),
            })),
        };
        let chunks = data.chunks(CHUNK_SIZE).map(|chunk| UploadImageRequest {
            data: Some(Data::ChunkData(chunk.to_vec())),
        });
        let requests: Vec<_> = std::iter::once(info).chain(chunks).collect();

        let response = self
            .client
            .upload_image(tokio_stream::iter(requests))
            .await
            .map_err(AppError::from)?
            .into_inner();

        info!(image_id = %response.id, size = response.size, "Image uploaded");
        Ok(response)
    }

    /// 依次提交评分，返回与请求一一对应的响应
    pub async fn rate_laptop(
        &mut self,
        ratings: Vec<(String, f64)>,
    ) -> AppResult<Vec<RateLaptopResponse>> {
        let requests: Vec<_> = ratings
            .into_iter()
            .map(|(laptop_id, score)| RateLaptopRequest { laptop_id, score })
            .collect();

        let mut stream = self
            .client
            .rate_laptop(tokio_stream::iter(requests))
            .await
            .map_err(AppError::from)?
            .into_inner();

        let mut responses = Vec::new();
        while let Some(response) = stream.message().await.map_err(AppError::from)? {
            info!(
                laptop_id = %response.laptop_id,
                rated_count = response.rated_count,
                average_score = response.average_score,
                "Received rating"
            );
            responses.push(response);
        }

        Ok(responses)
    }
}
