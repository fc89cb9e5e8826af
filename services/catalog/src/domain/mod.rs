//! 领域层
//!
//! 所有存储都是显式构造、通过构造参数注入的 trait 对象，没有进程级单例。

pub mod image;
pub mod laptop;
pub mod rating;
pub mod user;

pub use image::{DiskImageStore, ImageInfo, ImageStore};
pub use laptop::{InMemoryLaptopStore, LaptopSink, LaptopStore};
pub use rating::{InMemoryRatingStore, Rating, RatingStore};
pub use user::{InMemoryUserStore, User, UserStore};
