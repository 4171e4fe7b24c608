// Filesystem facade (`fs` namespace)
//
// Whole-file read, write, and remove. File contents travel base64-encoded
// in both directions.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::rpc::RpcTransport;
use crate::timeouts::Operation;

const NAMESPACE: &str = "fs";

#[derive(Debug, Clone)]
pub struct FsFacade {
    rpc: RpcTransport,
}

impl FsFacade {
    pub(crate) fn new(rpc: RpcTransport) -> Self {
        Self { rpc }
    }

    /// Replace the file at `path` with `data`.
    ///
    /// `fs.writefile [path, base64(data)]`
    pub async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), Error> {
        debug!(path, len = data.len(), "writing file");
        let encoded = STANDARD.encode(data);
        self.rpc
            .call(
                Operation::FsWrite,
                NAMESPACE,
                "writefile",
                vec![json!(path), json!(encoded)],
            )
            .await?;
        Ok(())
    }

    /// Read the whole file at `path`.
    ///
    /// `fs.readfile [path]` -> base64 string
    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>, Error> {
        debug!(path, "reading file");
        let encoded: String = self
            .rpc
            .call_as(
                Operation::FsRead,
                NAMESPACE,
                "readfile",
                vec![json!(path)],
                "a base64 string",
            )
            .await?;
        Ok(STANDARD.decode(encoded)?)
    }

    /// `fs.remove [path]`
    pub async fn remove_file(&self, path: &str) -> Result<(), Error> {
        debug!(path, "removing file");
        self.rpc
            .call(Operation::FsRemove, NAMESPACE, "remove", vec![json!(path)])
            .await?;
        Ok(())
    }
}
