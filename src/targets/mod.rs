pub mod nginx;
pub mod remote_cdn;

pub use nginx::NginxReloadTarget;
pub use remote_cdn::{RemoteCdnTarget, SyncOutcome};
