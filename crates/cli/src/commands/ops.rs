//! Per-resource store operations
//!
//! One call moves, reads or deletes exactly one matched resource, local or
//! cloud. Batching and fan-out live in the commands.

use std::path::Path;

use gsc_core::{Error, ObjectInfo, Result, ResourceLocator, StoreRegistry};

/// Copy one resource, returning the number of bytes written.
///
/// Cloud to cloud within a provider is a server-side copy; across providers
/// the object is downloaded and uploaded again.
pub(crate) async fn copy_resource(
    stores: &StoreRegistry,
    source: &ResourceLocator,
    target: &ResourceLocator,
    content_type: Option<&str>,
) -> Result<u64> {
    match (source, target) {
        (ResourceLocator::Local(_), ResourceLocator::Local(_)) => {
            ensure_parent(target.path()).await?;
            tokio::fs::copy(source.path(), target.path())
                .await
                .map_err(|e| local_error(source.path(), e))
        }
        (ResourceLocator::Local(_), ResourceLocator::Cloud(dst)) => {
            let data = read_resource(stores, source).await?;
            let size = data.len() as u64;
            let content_type = content_type
                .map(str::to_string)
                .or_else(|| guess_content_type(source.path()));
            stores
                .get(dst.provider())?
                .put_object(dst.bucket(), dst.object(), data, content_type)
                .await?;
            Ok(size)
        }
        (ResourceLocator::Cloud(_), ResourceLocator::Local(_)) => {
            if target.path().ends_with('/') {
                // directory placeholder object
                tokio::fs::create_dir_all(target.path()).await?;
                return Ok(0);
            }
            let data = read_resource(stores, source).await?;
            ensure_parent(target.path()).await?;
            tokio::fs::write(target.path(), &data).await?;
            Ok(data.len() as u64)
        }
        (ResourceLocator::Cloud(src), ResourceLocator::Cloud(dst))
            if src.provider() == dst.provider() =>
        {
            let info = stores
                .get(src.provider())?
                .copy_object(src.bucket(), src.object(), dst.bucket(), dst.object())
                .await?;
            Ok(info.size_bytes.unwrap_or_default())
        }
        (ResourceLocator::Cloud(src), ResourceLocator::Cloud(dst)) => {
            tracing::debug!(%source, %target, "copying across providers");
            let store = stores.get(src.provider())?;
            let content_type = match content_type {
                Some(ct) => Some(ct.to_string()),
                None => store
                    .head_object(src.bucket(), src.object())
                    .await?
                    .content_type,
            };
            let data = store.get_object(src.bucket(), src.object()).await?;
            let size = data.len() as u64;
            stores
                .get(dst.provider())?
                .put_object(dst.bucket(), dst.object(), data, content_type)
                .await?;
            Ok(size)
        }
    }
}

/// Full content of one object or file
pub(crate) async fn read_resource(
    stores: &StoreRegistry,
    locator: &ResourceLocator,
) -> Result<Vec<u8>> {
    match locator {
        ResourceLocator::Local(_) => tokio::fs::read(locator.path())
            .await
            .map_err(|e| local_error(locator.path(), e)),
        ResourceLocator::Cloud(c) => {
            stores
                .get(c.provider())?
                .get_object(c.bucket(), c.object())
                .await
        }
    }
}

/// Delete one object or file
pub(crate) async fn remove_resource(
    stores: &StoreRegistry,
    locator: &ResourceLocator,
) -> Result<()> {
    match locator {
        ResourceLocator::Local(_) => tokio::fs::remove_file(locator.path())
            .await
            .map_err(|e| local_error(locator.path(), e)),
        ResourceLocator::Cloud(c) => {
            stores
                .get(c.provider())?
                .delete_object(c.bucket(), c.object())
                .await
        }
    }
}

/// Metadata of one object or file, `None` when it does not exist
pub(crate) async fn head_resource(
    stores: &StoreRegistry,
    locator: &ResourceLocator,
) -> Result<Option<ObjectInfo>> {
    match locator {
        ResourceLocator::Local(_) => match tokio::fs::metadata(locator.path()).await {
            Ok(metadata) if metadata.is_dir() => Ok(None),
            Ok(metadata) => {
                let mut info = ObjectInfo::file(locator.path(), metadata.len());
                if let Some(ts) = metadata
                    .modified()
                    .ok()
                    .and_then(|t| jiff::Timestamp::try_from(t).ok())
                {
                    info = info.with_last_modified(ts);
                }
                info.content_type = guess_content_type(locator.path());
                Ok(Some(info))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(local_error(locator.path(), e)),
        },
        ResourceLocator::Cloud(c) => {
            let store = stores.get(c.provider())?;
            match store.head_object(c.bucket(), c.object()).await {
                Ok(info) => Ok(Some(info)),
                Err(Error::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            }
        }
    }
}

fn guess_content_type(path: &str) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
}

async fn ensure_parent(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

fn local_error(path: &str, error: std::io::Error) -> Error {
    match error.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.to_string()),
        std::io::ErrorKind::PermissionDenied => Error::AccessDenied(path.to_string()),
        _ => Error::Io(error),
    }
}
