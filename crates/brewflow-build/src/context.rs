use crate::error::{BuildError, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::path::Path;
use tar::Builder;

/// コンテキストに含めないディレクトリ
const EXCLUDED: &[&str] = &[".git"];

pub struct ContextBuilder;

impl ContextBuilder {
    /// ビルドコンテキストをtar.gzアーカイブとして作成
    ///
    /// `context_dir` 直下の Dockerfile がそのまま使われます。
    pub fn create_context(context_dir: &Path) -> Result<Vec<u8>> {
        tracing::debug!("Creating build context from: {}", context_dir.display());

        if !context_dir.is_dir() {
            return Err(BuildError::Context(format!(
                "ビルドコンテキストが見つかりません: {}",
                context_dir.display()
            )));
        }

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);
            tar.follow_symlinks(false);

            append_tree(&mut tar, context_dir, Path::new(""))?;

            tar.into_inner()?.finish()?;
        }

        tracing::debug!("Build context created: {} bytes", archive_data.len());
        Self::check_context_size(archive_data.len());

        Ok(archive_data)
    }

    fn check_context_size(size: usize) {
        const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "警告: ビルドコンテキストが大きすぎます（{}MB）",
                size / 1024 / 1024
            );
        }
    }
}

/// ディレクトリを再帰的に追加（名前順、除外ディレクトリはスキップ）
fn append_tree<W: std::io::Write>(tar: &mut Builder<W>, dir: &Path, prefix: &Path) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name();
        if EXCLUDED.iter().any(|ex| name == *ex) {
            continue;
        }

        let path = entry.path();
        let archived = prefix.join(&name);
        if entry.file_type()?.is_dir() {
            tar.append_dir(&archived, &path)?;
            append_tree(tar, &path, &archived)?;
        } else {
            tar.append_path_with_name(&path, &archived)?;
        }
    }
    Ok(())
}
