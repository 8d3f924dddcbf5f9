// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Filesystem target store
//!
//! Objects are files directly under a root directory. A write streams into
//! a uniquely named partial file and then hard-links it to the final name,
//! which fails if the name exists; an existing object is therefore never
//! overwritten and a reader never sees a half-written one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use futures_util::StreamExt;
use md5::{Digest, Md5};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::stores::{ByteStream, TargetStore, TransferError, WriteOutcome};

const PARTIAL_SUFFIX: &str = ".partial";

/// Longest file name common filesystems accept (NAME_MAX).
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Whether `name` has the `.{uuid}.partial` shape used for in-flight writes.
fn is_partial_name(name: &str) -> bool {
    name.strip_prefix('.')
        .and_then(|rest| rest.strip_suffix(PARTIAL_SUFFIX))
        .is_some_and(|id| Uuid::try_parse(id).is_ok())
}

/// Target store rooted at a local directory
#[derive(Clone, Debug)]
pub struct FsTargetStore {
    root: PathBuf,
}

impl FsTargetStore {
    /// Use `root`, creating it if needed.
    pub async fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> Result<PathBuf, TransferError> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0'])
            || is_partial_name(name)
        {
            return Err(TransferError::InvalidName(format!("{name:?}")));
        }
        if name.len() > MAX_FILE_NAME_LEN {
            return Err(TransferError::InvalidName(format!(
                "{} bytes exceeds {MAX_FILE_NAME_LEN}",
                name.len()
            )));
        }
        Ok(self.root.join(name))
    }

    /// Stream `body` into `path`, returning byte count and base64 MD5.
    async fn stream_to_file_with_md5(
        path: &Path,
        mut body: ByteStream,
    ) -> Result<(u64, String), TransferError> {
        let mut file = File::create(path).await?;
        let mut hasher = Md5::new();
        let mut bytes = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            bytes += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        file.sync_all().await?;

        let md5 = base64::engine::general_purpose::STANDARD.encode(hasher.finalize());
        Ok((bytes, md5))
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial file");
    }
}

#[async_trait]
impl TargetStore for FsTargetStore {
    fn max_name_len(&self) -> usize {
        MAX_FILE_NAME_LEN
    }

    async fn exists(&self, name: &str) -> Result<bool, TransferError> {
        let path = self.object_path(name)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn write(&self, name: &str, body: ByteStream) -> Result<WriteOutcome, TransferError> {
        let path = self.object_path(name)?;
        let partial = self
            .root
            .join(format!(".{}{PARTIAL_SUFFIX}", Uuid::new_v4()));

        let (bytes, md5) = match Self::stream_to_file_with_md5(&partial, body).await {
            Ok(written) => written,
            Err(e) => {
                remove_partial(&partial).await;
                return Err(e);
            }
        };

        let linked = fs::hard_link(&partial, &path).await;
        remove_partial(&partial).await;

        match linked {
            Ok(()) => Ok(WriteOutcome::Written { bytes, md5 }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Ok(WriteOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }
}
