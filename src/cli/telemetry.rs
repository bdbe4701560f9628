use anyhow::{Context, Result, anyhow};
use base64ct::{Base64, Encoding};
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::{BaggagePropagator, TraceContextPropagator},
    runtime,
    trace::{Tracer, TracerProvider},
};
use std::{env::var, sync::OnceLock, time::Duration};
use tonic::{
    metadata::{Ascii, Binary, MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};
use ulid::Ulid;
use url::Url;

const ENV_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const ENV_HEADERS: &str = "OTEL_EXPORTER_OTLP_HEADERS";
const ENV_PROTOCOL: &str = "OTEL_EXPORTER_OTLP_PROTOCOL";
const ENV_INSTANCE_ID: &str = "OTEL_SERVICE_INSTANCE_ID";
const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

static TRACER_PROVIDER: OnceLock<TracerProvider> = OnceLock::new();

/// Where and how spans are shipped, read from the standard `OTEL_*` variables.
#[derive(Debug, PartialEq, Eq)]
struct ExportSettings {
    endpoint: Url,
    headers: Vec<(String, String)>,
    instance_id: String,
}

impl ExportSettings {
    /// `None` when no endpoint is configured, so tracing stays local.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let Some(raw) = lookup(ENV_ENDPOINT).filter(|raw| !raw.trim().is_empty()) else {
            return Ok(None);
        };

        if let Some(protocol) = lookup(ENV_PROTOCOL).filter(|protocol| protocol != "grpc") {
            debug!("{ENV_PROTOCOL}='{protocol}' ignored, exporting over grpc");
        }

        let raw = raw.trim().trim_end_matches('/');
        // gRPC collectors are reached over TLS unless told otherwise.
        let endpoint = if raw.contains("://") {
            Url::parse(raw)
        } else {
            Url::parse(&format!("https://{raw}"))
        }
        .with_context(|| format!("invalid {ENV_ENDPOINT}: {raw}"))?;

        let headers = lookup(ENV_HEADERS)
            .map(|list| {
                list.split(',')
                    .filter_map(|pair| {
                        let (key, value) = pair.split_once('=')?;
                        Some((key.trim().to_ascii_lowercase(), value.trim().to_string()))
                    })
                    .filter(|(key, _)| !key.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(Self {
            endpoint,
            headers,
            instance_id: lookup(ENV_INSTANCE_ID).unwrap_or_else(|| Ulid::new().to_string()),
        }))
    }

    fn metadata(&self) -> Result<MetadataMap> {
        let mut meta = MetadataMap::with_capacity(self.headers.len());
        for (key, value) in &self.headers {
            // "-bin" keys carry base64 and travel as binary metadata.
            if key.ends_with("-bin") {
                let bytes = Base64::decode_vec(value)
                    .map_err(|err| anyhow!("failed to base64-decode metadata {key}: {err}"))?;
                let name = MetadataKey::<Binary>::from_bytes(key.as_bytes())
                    .map_err(|err| anyhow!("invalid binary metadata key {key}: {err}"))?;
                meta.insert_bin(name, MetadataValue::from_bytes(&bytes));
            } else {
                let name = MetadataKey::<Ascii>::from_bytes(key.as_bytes())
                    .map_err(|err| anyhow!("invalid metadata key {key}: {err}"))?;
                let value: MetadataValue<Ascii> = value
                    .parse()
                    .map_err(|err| anyhow!("invalid metadata value for {key}: {err}"))?;
                meta.insert(name, value);
            }
        }
        Ok(meta)
    }

    fn tls_domain(&self) -> Option<&str> {
        (self.endpoint.scheme() == "https")
            .then(|| self.endpoint.host_str())
            .flatten()
    }
}

fn init_tracer(settings: &ExportSettings) -> Result<Tracer> {
    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(settings.endpoint.as_str().trim_end_matches('/'))
        .with_compression(Compression::Gzip)
        .with_timeout(EXPORT_TIMEOUT);

    if let Some(domain) = settings.tls_domain() {
        builder = builder.with_tls_config(
            ClientTlsConfig::new()
                .domain_name(domain.to_string())
                .with_native_roots(),
        );
    }

    if !settings.headers.is_empty() {
        builder = builder.with_metadata(settings.metadata()?);
    }

    let provider = TracerProvider::builder()
        .with_batch_exporter(builder.build()?, runtime::Tokio)
        .with_resource(Resource::new(vec![
            KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            KeyValue::new("service.instance.id", settings.instance_id.clone()),
        ]))
        .build();

    let _ = TRACER_PROVIDER.set(provider.clone());

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    Ok(provider.tracer(env!("CARGO_PKG_NAME")))
}

/// Install the global subscriber: pretty console output filtered by verbosity
/// (overridable with `RUST_LOG`), plus OTLP export when an endpoint is set.
///
/// # Errors
///
/// Returns an error if the exporter or the subscriber cannot be installed.
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false)
        .pretty();

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.unwrap_or(Level::ERROR).into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?);

    let registry = Registry::default().with(fmt_layer).with(filter);

    match ExportSettings::from_lookup(|name| var(name).ok())? {
        Some(settings) => {
            let tracer = init_tracer(&settings)?;
            let subscriber = registry.with(tracing_opentelemetry::layer().with_tracer(tracer));
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => tracing::subscriber::set_global_default(registry)?,
    }

    Ok(())
}

/// Flush pending spans; does nothing when export was never enabled.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("flushing spans");
        let _ = provider.shutdown();
    }
}
