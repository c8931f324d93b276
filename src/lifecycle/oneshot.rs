//! Resolve, render and write once.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::Result;
use crate::kv::KvClient;
use crate::lifecycle::{merge_and_expand, startup};
use crate::render::Output;

/// Merge the Environments, expand, render and write once. Returns the
/// rendered text.
pub async fn run(client: Arc<dyn KvClient>, root_keys: &[String], settings: &Settings) -> Result<String> {
    let envs = startup::open_environments(client, root_keys, settings).await?;
    let merged = merge_and_expand(&envs, settings.resolve.expand_max_depth)?;
    let rendered = settings.output.format.render(&merged);

    Output::from_config(&settings.output).write(&rendered)?;
    tracing::debug!(entries = merged.len(), "Rendered environment");
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::render::Format;

    #[tokio::test]
    async fn test_oneshot_writes_file() {
        let kv = Arc::new(MemoryKv::new());
        kv.set("/a/.include", "b");
        kv.set("/a/FOO", "foo");
        kv.set("/b/BAZ", "baz $FOO");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.env");
        let mut settings = Settings::default();
        settings.output.path = Some(path.clone());
        settings.output.format = Format::Docker;

        let rendered = run(kv, &["/a".into()], &settings).await.unwrap();
        assert_eq!(rendered, "BAZ=baz foo\nFOO=foo\n");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), rendered);
    }

    #[tokio::test]
    async fn test_oneshot_surfaces_errors() {
        let kv = Arc::new(MemoryKv::new());
        kv.set("/a/A", "$B");
        kv.set("/a/B", "$A");

        let err = run(kv, &["/a".into()], &Settings::default()).await.unwrap_err();
        assert!(matches!(err, crate::Error::Expand(_)));
    }

    #[tokio::test]
    async fn test_later_root_overrides_referenced_value() {
        let kv = Arc::new(MemoryKv::new());
        kv.set("/base/HOST", "db");
        kv.set("/base/URL", "postgres://$HOST");
        kv.set("/app/HOST", "replica");

        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.output.path = Some(dir.path().join("out.env"));
        settings.output.format = Format::Docker;

        let rendered = run(kv, &["/base".into(), "/app".into()], &settings).await.unwrap();
        assert_eq!(rendered, "HOST=replica\nURL=postgres://replica\n");
    }
}
