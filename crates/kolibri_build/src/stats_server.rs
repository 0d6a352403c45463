//! Serves bundle analysis reports once a stats build has finished.
//!
//! Every bundle's report is served on its own port, counting up from the
//! port after the configured one. When there is more than one bundle, the
//! configured port serves a page linking to all of them.
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;

use anyhow::Context;
use axum::response::Html;
use axum::Router;
use kolibri_build_core::types::BuildOptions;
use kolibri_build_core::types::BundleDescriptor;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tower_http::services::ServeFile;

pub const STATS_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

pub fn report_port(root_port: u16, index: usize) -> anyhow::Result<u16> {
  u16::try_from(usize::from(root_port) + index + 1)
    .with_context(|| format!("No port left for bundle {index} after {root_port}"))
}

fn url(port: u16) -> String {
  format!("http://{STATS_HOST}:{port}")
}

/// Links every bundle that has a report. Bundles without one are listed
/// without a link since nothing listens on their port.
pub fn render_index(bundles: &[BundleDescriptor], root_port: u16) -> anyhow::Result<String> {
  let mut page = String::from("<html>\n    <body>\n    <h1>Kolibri Stats Links</h1>\n    <ul>");
  for (index, bundle) in bundles.iter().enumerate() {
    let name = escape_html(&bundle.name);
    if bundle.stats_file.is_some() {
      page.push_str(&format!(
        "<li><a href=\"{}\">{}</a></li>",
        url(report_port(root_port, index)?),
        name
      ));
    } else {
      page.push_str(&format!("<li>{} (no report)</li>", name));
    }
  }
  page.push_str("</ul></body></html>");
  Ok(page)
}

fn escape_html(value: &str) -> String {
  let mut escaped = String::with_capacity(value.len());
  for ch in value.chars() {
    match ch {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#39;"),
      _ => escaped.push(ch),
    }
  }
  escaped
}

/// Keeps the report servers running
pub struct StatsServerHandle {
  runtime: Runtime,
  tasks: Vec<JoinHandle<std::io::Result<()>>>,
  addresses: Vec<SocketAddr>,
}

impl StatsServerHandle {
  pub fn addresses(&self) -> &[SocketAddr] {
    &self.addresses
  }

  /// Blocks for as long as the servers run
  pub fn wait(self) -> anyhow::Result<()> {
    let StatsServerHandle { runtime, tasks, .. } = self;
    runtime.block_on(async move {
      for task in tasks {
        task.await??;
      }
      Ok::<(), anyhow::Error>(())
    })
  }
}

pub fn start_stats_servers(
  bundles: &[BundleDescriptor],
  options: &BuildOptions,
) -> anyhow::Result<StatsServerHandle> {
  let runtime = tokio::runtime::Builder::new_multi_thread()
    .worker_threads(1)
    .thread_name("kolibri-stats-server")
    .enable_all()
    .build()?;

  let mut routes = Vec::new();
  for (index, bundle) in bundles.iter().enumerate() {
    let Some(stats_file) = &bundle.stats_file else {
      tracing::warn!(bundle = %bundle.name, "Bundle has no stats file to serve");
      continue;
    };
    routes.push((
      report_port(options.port, index)?,
      Router::new().fallback_service(ServeFile::new(stats_file)),
    ));
  }

  if bundles.len() > 1 {
    let page = render_index(bundles, options.port)?;
    routes.push((
      options.port,
      Router::new().fallback(move || std::future::ready(Html(page.clone()))),
    ));
  }

  let mut tasks = Vec::new();
  let mut addresses = Vec::new();
  for (port, router) in routes {
    let address = SocketAddr::new(STATS_HOST, port);
    let listener = runtime
      .block_on(TcpListener::bind(address))
      .with_context(|| format!("Failed to listen on {address}"))?;
    addresses.push(listener.local_addr()?);
    tasks.push(runtime.spawn(async move { axum::serve(listener, router).await }));
  }

  if bundles.len() > 1 {
    tracing::info!(
      "Webpack Bundle Analyzer Reports are available at {}\nUse Ctrl+C to close it",
      url(options.port)
    );
  } else {
    tracing::info!(
      "Webpack Bundle Analyzer Report is available at {}\nUse Ctrl+C to close it",
      url(report_port(options.port, 0)?)
    );
  }

  Ok(StatsServerHandle {
    runtime,
    tasks,
    addresses,
  })
}
