use std::fs;
use std::path::Path;

use tracing::{debug, error, warn};

use crate::error::{ErrorKind, IngestionError};
use crate::ingestion::{
    is_notebook_path, load_notebook_file, resolve_file_loader, TableFormat, TableLoader,
};
use crate::sqlite::SourceInfo;

use super::{convert_complex_json, convert_notebook, convert_table, ConvertOptions, RunContext};

/// Converts local files.
///
/// Once a table of a file fails to sanitize or to be created, the remaining tables of that file
/// are not attempted.
#[derive(Debug, Clone, Default)]
pub struct FileConverter {
    options: ConvertOptions,
}

impl FileConverter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert every table of the file at `path`. Returns the number of tables created.
    ///
    /// Never fails: problems are logged and counted in `ctx`.
    pub fn convert(&self, ctx: &mut RunContext<'_>, path: &Path) -> usize {
        let Some(base) = self.source_info_base(ctx, path) else {
            return 0;
        };
        debug!("converting '{}'", path.display());
        let source = path.display().to_string();

        if self.options.format == Some(TableFormat::Ipynb) || is_notebook_path(path) {
            return match load_notebook_file(path, &self.options.encoding) {
                Ok((notebook, _)) => {
                    convert_notebook(ctx, &self.options, &notebook, &base, &source)
                }
                Err(e) if e.kind() == ErrorKind::NotJson => {
                    error!("{}: {source}: {e}", e.name());
                    ctx.counter.inc_skip();
                    0
                }
                Err(e) => {
                    error!("{}: open error: file={source}, message='{e}'", e.name());
                    ctx.counter.inc_fail();
                    0
                }
            };
        }

        let mut loader =
            match resolve_file_loader(path, self.options.format, &self.options.encoding) {
                Ok(loader) => loader,
                Err(e) => {
                    match e.kind() {
                        ErrorKind::InvalidPath => debug!("{}: {e}", e.name()),
                        ErrorKind::LoaderNotFound => {
                            debug!("loader not found that coincide with '{source}'")
                        }
                        _ => error!("{}: file={source}, message={e}", e.name()),
                    }
                    ctx.counter.inc_fail();
                    return 0;
                }
            };
        let base = base.with_format(loader.format().name());

        let created = self.convert_tables(ctx, loader.as_mut(), &base, path, &source);
        if created == 0 {
            warn!("table not found in '{source}'");
        }
        created
    }

    fn convert_tables(
        &self,
        ctx: &mut RunContext<'_>,
        loader: &mut dyn TableLoader,
        base: &SourceInfo,
        path: &Path,
        source: &str,
    ) -> usize {
        let mut created = 0;
        let failure = match loader.load() {
            Ok(stream) => {
                let mut failure = None;
                for item in stream {
                    let raw = match item {
                        Ok(raw) => raw,
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    };
                    match convert_table(ctx, &self.options, raw, base, source) {
                        Ok(_) => created += 1,
                        Err(e) => {
                            debug!(
                                "exception={}, path={source}, message={e}",
                                e.name()
                            );
                            ctx.counter.inc_fail();
                            return created;
                        }
                    }
                }
                failure
            }
            Err(e) => Some(e),
        };

        if let Some(e) = failure {
            created += self.on_load_failure(ctx, loader, base, path, source, e);
        }
        created
    }

    fn on_load_failure(
        &self,
        ctx: &mut RunContext<'_>,
        loader: &mut dyn TableLoader,
        base: &SourceInfo,
        path: &Path,
        source: &str,
        e: IngestionError,
    ) -> usize {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| loader.format().name().to_string());
        match e.kind() {
            ErrorKind::Validation if loader.format() == TableFormat::Json => {
                debug!("{}: {e}; retrying as nested json", e.name());
                return convert_complex_json(ctx, &self.options, loader, base, source);
            }
            ErrorKind::Validation => error!(
                "{}: invalid {ext} data format: path={source}, message={e}",
                e.name()
            ),
            ErrorKind::Data => error!(
                "{}: invalid {ext} data: path={source}, message={e}",
                e.name()
            ),
            _ => error!(
                "{}: open error: file={source}, message='{e}'",
                e.name()
            ),
        }
        ctx.counter.inc_fail();
        0
    }

    /// Pre-checks. Returns the per-source record template, or `None` after counting a skip.
    fn source_info_base(&self, ctx: &mut RunContext<'_>, path: &Path) -> Option<SourceInfo> {
        let skip = |ctx: &mut RunContext<'_>, message: &str| {
            warn!("skip '{}': {message}", path.display());
            ctx.counter.inc_skip();
        };

        let meta = match fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                skip(ctx, "not a file");
                return None;
            }
        };
        let real = match path.canonicalize() {
            Ok(real) => real,
            Err(_) => {
                skip(ctx, "not a file");
                return None;
            }
        };
        if ctx.destination().database_path() == Some(real.as_path()) {
            skip(ctx, "same path as the output file");
            return None;
        }

        let dir_name = real
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let base_name = real
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Some(SourceInfo::for_file(
            ctx.next_source_id(),
            dir_name,
            base_name,
            &meta,
        ))
    }
}
