//! 笔记本目录 gRPC 服务
//!
//! 流式处理器都是线性状态机：等待首条消息 → 逐条处理 → 关闭。
//! 每次迭代先做一次上下文检查，收发挂起点经由 `CallContext::guard`。

use std::sync::Arc;

use async_trait::async_trait;
use pcbook_bootstrap::request_span;
use pcbook_common::CallContext;
use pcbook_errors::{AppError, AppResult};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{Instrument, debug, info, warn};

use crate::api::proto::pcbook::{
    CreateLaptopRequest, CreateLaptopResponse, Laptop, RateLaptopRequest, RateLaptopResponse,
    SearchLaptopRequest, SearchLaptopResponse, UploadImageRequest, UploadImageResponse,
    laptop_service_server::LaptopService, upload_image_request::Data,
};
use crate::domain::{ImageStore, LaptopSink, LaptopStore, RatingStore};

/// 单张图片的大小上限（1 MiB）
pub const MAX_IMAGE_SIZE: usize = 1 << 20;

const STREAM_BUFFER: usize = 16;

type ResponseSender<T> = mpsc::Sender<Result<T, Status>>;

/// 笔记本目录服务
#[derive(Clone)]
pub struct LaptopServiceImpl {
    laptops: Arc<dyn LaptopStore>,
    images: Arc<dyn ImageStore>,
    ratings: Arc<dyn RatingStore>,
}

impl LaptopServiceImpl {
    pub fn new(
        laptops: Arc<dyn LaptopStore>,
        images: Arc<dyn ImageStore>,
        ratings: Arc<dyn RatingStore>,
    ) -> Self {
        Self {
            laptops,
            images,
            ratings,
        }
    }

    async fn create(&self, ctx: &CallContext, laptop: Laptop) -> AppResult<String> {
        info!(laptop_id = %laptop.id, "Received create-laptop request");

        // 在写入存储之前先确认调用仍然有效
        ctx.check()?;

        self.laptops.save(laptop).await
    }

    async fn receive_image(
        &self,
        ctx: &CallContext,
        mut stream: Streaming<UploadImageRequest>,
    ) -> AppResult<UploadImageResponse> {
        let info = match ctx.guard(stream.message()).await?.map_err(receive_error)? {
            Some(UploadImageRequest {
                data: Some(Data::Info(info)),
            }) => info,
            Some(_) => return Err(AppError::validation("first message must carry image info")),
            None => return Err(AppError::validation("image info is not provided")),
        };

        info!(
            laptop_id = %info.laptop_id,
            image_type = %info.image_type,
            "Received upload-image request"
        );

        if self.laptops.find(&info.laptop_id).await?.is_none() {
            return Err(AppError::validation(format!(
                "laptop {} doesn't exist",
                info.laptop_id
            )));
        }

        let mut image = Vec::new();
        loop {
            ctx.check()?;

            let Some(request) = ctx.guard(stream.message()).await?.map_err(receive_error)? else {
                debug!("No more image data");
                break;
            };

            let chunk = match request.data {
                Some(Data::ChunkData(chunk)) => chunk,
                Some(Data::Info(_)) => {
                    return Err(AppError::validation("image info must be sent only once"));
                }
                None => continue,
            };

            let size = image.len() + chunk.len();
            if size > MAX_IMAGE_SIZE {
                warn!(size, max = MAX_IMAGE_SIZE, "Image is too large");
                return Err(AppError::resource_exhausted(format!(
                    "image is too large: {} > {}",
                    size, MAX_IMAGE_SIZE
                )));
            }
            image.extend_from_slice(&chunk);
        }

        let size = image.len();
        let saved = self
            .images
            .save(&info.laptop_id, &info.image_type, image)
            .await?;

        Ok(UploadImageResponse {
            id: saved.id,
            size: size as u32,
        })
    }

    async fn rate(
        &self,
        ctx: &CallContext,
        mut inbound: Streaming<RateLaptopRequest>,
        tx: &ResponseSender<RateLaptopResponse>,
    ) -> AppResult<()> {
        let mut rated = 0usize;

        loop {
            ctx.check()?;

            let Some(request) = ctx.guard(inbound.message()).await?.map_err(receive_error)? else {
                info!(rated, "Rate stream closed by client");
                return Ok(());
            };

            debug!(
                laptop_id = %request.laptop_id,
                score = request.score,
                "Received rate-laptop request"
            );

            if self.laptops.find(&request.laptop_id).await?.is_none() {
                return Err(AppError::not_found(format!(
                    "laptop {} not found",
                    request.laptop_id
                )));
            }

            let rating = self.ratings.add(&request.laptop_id, request.score).await?;

            let response = RateLaptopResponse {
                laptop_id: request.laptop_id,
                rated_count: rating.count,
                average_score: rating.average(),
            };

            ctx.guard(tx.send(Ok(response)))
                .await?
                .map_err(|_| consumer_gone())?;
            rated += 1;
        }
    }
}

/// 接收错误：保留取消 / 超时，其余归为内部错误
fn receive_error(status: Status) -> AppError {
    let err = AppError::from(status);
    if err.is_call_lifecycle() {
        err
    } else {
        AppError::internal(format!("cannot receive stream request: {}", err))
    }
}

fn consumer_gone() -> AppError {
    AppError::cancelled("request is canceled")
}

/// 把匹配结果逐条写入响应流
struct ResponseSink {
    ctx: CallContext,
    tx: ResponseSender<SearchLaptopResponse>,
    sent: usize,
}

#[async_trait]
impl LaptopSink for ResponseSink {
    async fn emit(&mut self, laptop: Laptop) -> AppResult<()> {
        let laptop_id = laptop.id.clone();
        let response = SearchLaptopResponse {
            laptop: Some(laptop),
        };

        self.ctx
            .guard(self.tx.send(Ok(response)))
            .await?
            .map_err(|_| consumer_gone())?;

        self.sent += 1;
        debug!(laptop_id = %laptop_id, "Sent laptop");
        Ok(())
    }
}

#[tonic::async_trait]
impl LaptopService for LaptopServiceImpl {
    async fn create_laptop(
        &self,
        request: Request<CreateLaptopRequest>,
    ) -> Result<Response<CreateLaptopResponse>, Status> {
        let span = request_span(&request, "CreateLaptop");
        let ctx = CallContext::from_metadata(request.metadata());
        let laptop = request
            .into_inner()
            .laptop
            .ok_or_else(|| AppError::validation("laptop is not provided"))?;

        let id = self.create(&ctx, laptop).instrument(span).await?;

        Ok(Response::new(CreateLaptopResponse { id }))
    }

    type SearchLaptopStream = ReceiverStream<Result<SearchLaptopResponse, Status>>;

    async fn search_laptop(
        &self,
        request: Request<SearchLaptopRequest>,
    ) -> Result<Response<Self::SearchLaptopStream>, Status> {
        let span = request_span(&request, "SearchLaptop");
        let ctx = CallContext::from_metadata(request.metadata());
        let filter = request.into_inner().filter.unwrap_or_default();

        info!(parent: &span, filter = ?filter, "Received search-laptop request");

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let laptops = self.laptops.clone();

        tokio::spawn(
            async move {
                let mut sink = ResponseSink {
                    ctx: ctx.clone(),
                    tx: tx.clone(),
                    sent: 0,
                };

                // 消费方断开时立即放弃扫描
                let result = tokio::select! {
                    result = laptops.search(&ctx, &filter, &mut sink) => result,
                    _ = tx.closed() => {
                        ctx.cancel();
                        Err(consumer_gone())
                    }
                };

                match result {
                    Ok(()) => info!(sent = sink.sent, "Search completed"),
                    Err(err) => {
                        warn!(error = %err, sent = sink.sent, "Search aborted");
                        let _ = tx.send(Err(err.into())).await;
                    }
                }
            }
            .instrument(span),
        );

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn upload_image(
        &self,
        request: Request<Streaming<UploadImageRequest>>,
    ) -> Result<Response<UploadImageResponse>, Status> {
        let span = request_span(&request, "UploadImage");
        let ctx = CallContext::from_metadata(request.metadata());
        let stream = request.into_inner();

        let response = self
            .receive_image(&ctx, stream)
            .instrument(span.clone())
            .await
            .inspect_err(|err| warn!(parent: &span, error = %err, "Upload rejected"))?;

        info!(parent: &span, image_id = %response.id, size = response.size, "Image uploaded");
        Ok(Response::new(response))
    }

    type RateLaptopStream = ReceiverStream<Result<RateLaptopResponse, Status>>;

    async fn rate_laptop(
        &self,
        request: Request<Streaming<RateLaptopRequest>>,
    ) -> Result<Response<Self::RateLaptopStream>, Status> {
        let span = request_span(&request, "RateLaptop");
        let ctx = CallContext::from_metadata(request.metadata());
        let inbound = request.into_inner();

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let service = self.clone();

        tokio::spawn(
            async move {
                if let Err(err) = service.rate(&ctx, inbound, &tx).await {
                    warn!(error = %err, "Rate stream aborted");
                    let _ = tx.send(Err(err.into())).await;
                }
            }
            .instrument(span),
        );

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
