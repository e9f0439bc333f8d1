use ::url::Url;
use tracing::{debug, error, warn};

use crate::error::{ErrorKind, IngestionError};
use crate::ingestion::unified::logging_url_path;
use crate::ingestion::{
    is_notebook_url, load_notebook_bytes, resolve_url_loader, Fetcher, HttpFetcher, TableFormat,
    TableLoader,
};
use crate::sqlite::SourceInfo;

use super::{
    convert_complex_json, convert_notebook, convert_table, ConvertOptions, ExitCode, FatalError,
    RunContext,
};

/// Converts remote sources.
///
/// Unlike [`super::FileConverter`], a table that fails to sanitize or to be created does not
/// stop the remaining tables of the same URL. Unusable URLs, HTTP and proxy failures, and
/// documents no loader understands (even as HTML) end the whole run with a [`FatalError`].
pub struct UrlConverter<F: Fetcher = HttpFetcher> {
    options: ConvertOptions,
    fetcher: F,
}

impl UrlConverter<HttpFetcher> {
    /// Converter fetching over HTTP(S), through `options.proxy` if set.
    pub fn new(options: ConvertOptions) -> Result<Self, FatalError> {
        let fetcher = HttpFetcher::new(options.proxy.as_deref()).map_err(fatal)?;
        Ok(Self::with_fetcher(options, fetcher))
    }
}

impl<F: Fetcher> UrlConverter<F> {
    pub fn with_fetcher(options: ConvertOptions, fetcher: F) -> Self {
        Self { options, fetcher }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert every table found at `url`. Returns the number of tables created.
    pub fn convert(&self, ctx: &mut RunContext<'_>, url: &str) -> Result<usize, FatalError> {
        let parsed = Url::parse(url).ok();
        let source = parsed
            .as_ref()
            .map_or_else(|| url.to_string(), logging_url_path);
        let mut base = url_source_info(parsed.as_ref(), url);
        base.source_id = ctx.next_source_id();
        debug!("converting '{url}'");

        if self.options.format == Some(TableFormat::Ipynb) || is_notebook_url(url) {
            let doc = self.fetcher.fetch(url).map_err(|e| {
                error!("{}: {e}", e.name());
                fatal(e)
            })?;
            return match load_notebook_bytes(&doc.bytes, &self.options.encoding) {
                Ok((notebook, size)) => {
                    base.size = Some(size);
                    Ok(convert_notebook(ctx, &self.options, &notebook, &base, &source))
                }
                Err(e) => {
                    error!("{}: url={url}, message={e}", e.name());
                    if e.kind() == ErrorKind::NotJson {
                        ctx.counter.inc_skip();
                    } else {
                        ctx.counter.inc_fail();
                    }
                    Ok(0)
                }
            };
        }

        let mut loader = self.create_loader(url)?;
        let base = base.with_format(loader.format().name());

        let created = self.convert_tables(ctx, loader.as_mut(), &base, url, &source);
        if created == 0 {
            warn!("table not found in '{url}'");
        }
        Ok(created)
    }

    /// Resolve a loader for `url`, retrying as HTML when no loader matches.
    fn create_loader(&self, url: &str) -> Result<Box<dyn TableLoader>, FatalError> {
        let encoding = self.options.encoding.as_str();
        match resolve_url_loader(&self.fetcher, url, self.options.format, encoding) {
            Ok(loader) => return Ok(loader),
            Err(e) if e.kind() == ErrorKind::LoaderNotFound => debug!("{e}"),
            Err(e) => {
                error!("{}: {e}", e.name());
                return Err(fatal(e));
            }
        }

        resolve_url_loader(&self.fetcher, url, Some(TableFormat::Html), encoding).map_err(|e| {
            error!("{}: {e}", e.name());
            fatal(e)
        })
    }

    fn convert_tables(
        &self,
        ctx: &mut RunContext<'_>,
        loader: &mut dyn TableLoader,
        base: &SourceInfo,
        url: &str,
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
                        Err(e) if e.kind() == ErrorKind::Io => {
                            error!("{}: failed to convert: url={url}, message={e}", e.name());
                            ctx.counter.inc_fail();
                        }
                        Err(e) => {
                            debug!("{}: url={url}, message={e}", e.name());
                            ctx.counter.inc_fail();
                        }
                    }
                }
                failure
            }
            Err(e) => Some(e),
        };

        if let Some(e) = failure {
            created += self.on_load_failure(ctx, loader, base, url, source, e);
        }
        created
    }

    fn on_load_failure(
        &self,
        ctx: &mut RunContext<'_>,
        loader: &mut dyn TableLoader,
        base: &SourceInfo,
        url: &str,
        source: &str,
        e: IngestionError,
    ) -> usize {
        match e.kind() {
            ErrorKind::Validation if loader.format() == TableFormat::Json => {
                debug!("{}: {e}; retrying as nested json", e.name());
                return convert_complex_json(ctx, &self.options, loader, base, source);
            }
            ErrorKind::Validation => error!("{}: url={url}, message={e}", e.name()),
            ErrorKind::Data => error!("{}: invalid data: url={url}, message={e}", e.name()),
            _ => error!("{}: open error: url={url}, message={e}", e.name()),
        }
        ctx.counter.inc_fail();
        0
    }
}

/// Exit status for an error that ends the run.
fn fatal(error: IngestionError) -> FatalError {
    let exit_code = match error.kind() {
        ErrorKind::Proxy => ExitCode::FailedProxy,
        ErrorKind::Http | ErrorKind::Io | ErrorKind::Open => ExitCode::FailedHttp,
        ErrorKind::LoaderNotFound => ExitCode::FailedLoaderNotFound,
        _ => ExitCode::FailedConvert,
    };
    FatalError { exit_code, error }
}

/// `dir_name` is the host followed by the directory of the URL path, `base_name` the last path
/// segment.
fn url_source_info(parsed: Option<&Url>, raw: &str) -> SourceInfo {
    let Some(url) = parsed else {
        return SourceInfo {
            base_name: raw.to_string(),
            ..SourceInfo::default()
        };
    };
    let host = url.host_str().unwrap_or_default();
    let (dir, base) = match url.path().rsplit_once('/') {
        Some(("", base)) => ("/", base),
        Some((dir, base)) => (dir, base),
        None => ("", url.path()),
    };
    SourceInfo {
        dir_name: format!("{host}{dir}"),
        base_name: base.to_string(),
        ..SourceInfo::default()
    }
}
