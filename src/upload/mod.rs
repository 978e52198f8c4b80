mod handlers;
mod server;

pub use server::{UploadServer, UploadState};
