//! Group directory adapter over HTTP(S)
//!
//! Talks to the directory API with a bearer token. Without a token the
//! adapter reports itself unauthenticated and is never called.

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use std::fmt;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use domain_settings_types::directory_adapter::{DirectoryGroup, GroupDirectory, GroupRank};
use domain_settings_types::prelude::*;

pub mod response;

const API_PREFIX: [&str; 3] = ["api", "v1", "groups"];

/// Limit for one directory request, response body included
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpGroupDirectory {
	base_url: Url,
	token: Option<Box<str>>,
	timeout: Duration,
	client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
}

impl fmt::Debug for HttpGroupDirectory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HttpGroupDirectory")
			.field("base_url", &self.base_url.as_str())
			.field("authenticated", &self.token.is_some())
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

impl HttpGroupDirectory {
	/// `token` is the bearer token of the domain; `None` disables all calls
	pub fn new(base_url: &str, token: Option<&str>) -> DsResult<Self> {
		let base_url = Url::parse(base_url)
			.map_err(|e| Error::ConfigError(format!("invalid directory URL {}: {}", base_url, e)))?;
		if base_url.cannot_be_a_base() {
			return Err(Error::ConfigError(format!("invalid directory URL {}", base_url)));
		}

		let builder = match HttpsConnectorBuilder::new().with_native_roots() {
			Ok(builder) => builder,
			Err(e) => {
				warn!("No native root certificates ({}), HTTPS directory calls will fail", e);
				HttpsConnectorBuilder::new().with_tls_config(
					rustls::ClientConfig::builder()
						.with_root_certificates(rustls::RootCertStore::empty())
						.with_no_client_auth(),
				)
			}
		};
		let connector = builder
			.https_or_http()
			.enable_http1()
			.enable_http2()
			.build();
		let client = Client::builder(TokioExecutor::new()).build(connector);

		Ok(Self {
			base_url,
			token: token.filter(|t| !t.is_empty()).map(Into::into),
			timeout: DEFAULT_TIMEOUT,
			client,
		})
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> DsResult<Url> {
		let mut url = self.base_url.clone();
		url.path_segments_mut()
			.map_err(|()| Error::ConfigError("directory URL cannot be a base".into()))?
			.pop_if_empty()
			.extend(API_PREFIX)
			.extend(segments);
		Ok(url)
	}

	async fn get(&self, url: &Url) -> DsResult<Bytes> {
		let Some(token) = &self.token else {
			return Err(Error::Unauthorized);
		};
		let request = hyper::Request::builder()
			.method(hyper::Method::GET)
			.uri(url.as_str())
			.header(hyper::header::ACCEPT, "application/json")
			.header(hyper::header::AUTHORIZATION, format!("Bearer {}", token))
			.body(Empty::new())
			.map_err(|e| Error::Internal(format!("request build error: {}", e)))?;

		let exchange = async {
			let response = self
				.client
				.request(request)
				.await
				.map_err(|e| Error::NetworkError(format!("{}: {}", url, e)))?;
			let status = response.status();
			let body = response
				.into_body()
				.collect()
				.await
				.map_err(|e| Error::NetworkError(format!("{}: {}", url, e)))?
				.to_bytes();
			Ok::<_, Error>((status, body))
		};
		let (status, body) = tokio::time::timeout(self.timeout, exchange).await.map_err(|_| {
			Error::NetworkError(format!("{}: no response within {:?}", url, self.timeout))
		})??;

		if !status.is_success() {
			let text = std::str::from_utf8(&body).unwrap_or("");
			return Err(Error::NetworkError(format!("{}: HTTP {} {}", url, status, text)));
		}
		Ok(body)
	}
}

#[async_trait]
impl GroupDirectory for HttpGroupDirectory {
	fn is_authenticated(&self) -> bool {
		self.token.is_some()
	}

	async fn resolve_group_id(&self, name: &str) -> DsResult<Vec<DirectoryGroup>> {
		let url = self.endpoint(["names", name])?;
		debug!("Resolving group ID for {}", name);
		response::parse_group_names(&self.get(&url).await?)
	}

	async fn resolve_group_ranks(&self, group_id: Uuid) -> DsResult<Vec<GroupRank>> {
		let id = group_id.to_string();
		let url = self.endpoint([id.as_str(), "ranks"])?;
		debug!("Resolving ranks of group {}", group_id);
		response::parse_group_ranks(&self.get(&url).await?, group_id)
	}
}


// vim: ts=4
