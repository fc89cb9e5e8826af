//! 图片存储

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use pcbook_errors::{AppError, AppResult};
use tracing::info;
use uuid::Uuid;

/// 一次完成的上传
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub id: String,
    pub laptop_id: String,
    pub image_type: String,
    pub path: PathBuf,
    pub size: u64,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// 以新生成的 ID 持久化图片内容
    async fn save(&self, laptop_id: &str, image_type: &str, data: Vec<u8>) -> AppResult<ImageInfo>;

    async fn find(&self, id: &str) -> AppResult<Option<ImageInfo>>;
}

/// 写入 `{dir}/{id}{image_type}` 的磁盘存储，元信息只保存在内存中
#[derive(Debug)]
pub struct DiskImageStore {
    dir: PathBuf,
    images: RwLock<HashMap<String, ImageInfo>>,
}

impl DiskImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            images: RwLock::new(HashMap::new()),
        }
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::internal("image store lock poisoned")
}

#[async_trait]
impl ImageStore for DiskImageStore {
    async fn save(&self, laptop_id: &str, image_type: &str, data: Vec<u8>) -> AppResult<ImageInfo> {
        let id = Uuid::new_v4().to_string();
        let path = self.dir.join(format!("{}{}", id, image_type));

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::internal(format!("cannot create image folder: {}", e)))?;
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| AppError::internal(format!("cannot write image file: {}", e)))?;

        let info = ImageInfo {
            id: id.clone(),
            laptop_id: laptop_id.to_string(),
            image_type: image_type.to_string(),
            path,
            size: data.len() as u64,
        };

        self.images
            .write()
            .map_err(poisoned)?
            .insert(id.clone(), info.clone());

        info!(image_id = %id, laptop_id = %laptop_id, size = info.size, "Image saved");
        Ok(info)
    }

    async fn find(&self, id: &str) -> AppResult<Option<ImageInfo>> {
        Ok(self.images.read().map_err(poisoned)?.get(id).cloned())
    }
}
