//! Production implementations of traits

mod command_runner;
mod qiniu_client;

pub use command_runner::TokioCommandRunner;
pub use qiniu_client::QiniuCdnClient;
