//! Report delivery over a WhatsApp messaging API.
//!
//! Delivery is three sequential calls: request a presigned upload slot,
//! upload the artifact as a multipart form, then send a templated message
//! that references the uploaded media. The first failing call ends the
//! attempt and is reported as a [`DeliveryError`] naming its [`DeliveryStep`].

mod bird;
mod config;
mod error;
mod phone;
mod traits;
mod types;

pub use bird::BirdDeliveryClient;
pub use config::DeliveryConfig;
pub use error::{DeliveryError, DeliveryStep};
pub use phone::normalize_phone;
pub use traits::DeliveryClient;
pub use types::{MessageId, PresignedUpload};
