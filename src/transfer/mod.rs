// Moving files: processes (local or over ssh), the distributed filesystem
// and the secure hop from the edge node.
pub mod command;
pub mod hdfs;
pub mod secure;

pub use command::{CommandOutput, CommandRunner, LocalRunner, SshRunner, SshTarget};
pub use hdfs::{DistributedFileClient, HdfsClient};
pub use secure::{ScpClient, SecureTransferClient};
