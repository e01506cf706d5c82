/// Pull mode: request readings from the gateway's local HTTP API
use futures_util::future::try_join;
use http::header::{AUTHORIZATION, CONNECTION, CONTENT_TYPE, USER_AGENT};
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use log::debug;
use url::Url;

use super::{charset_of, decode_body, GatewayError};
use crate::config::Credentials;
use crate::decoder::{decode_demand, decode_price, decode_summation, decode_usage};
use crate::dispatch::category_element;
use crate::models::{DemandReading, PriceReading, SummationReading, UsageData, UsageReading};
use crate::xml::Element;

const AGENT: &str = concat!("eagle-etl/", env!("CARGO_PKG_VERSION"));
const POST_MANAGER: &str = "/cgi-bin/post_manager";
const CGI_MANAGER: &str = "/cgi-bin/cgi_manager";

pub struct GatewayClient {
    http: Client<HttpConnector, Full<Bytes>>,
    base: Url,
    authorization: Option<String>,
}

impl GatewayClient {
    pub fn new(hostname: &str, credentials: Option<&Credentials>) -> Result<Self, GatewayError> {
        let base = Url::parse(&format!("http://{}/", hostname))?;
        Ok(GatewayClient {
            http: Client::builder(TokioExecutor::new()).build_http(),
            base,
            authorization: credentials.map(Credentials::basic_auth),
        })
    }

    async fn post(&self, path: &str, body: String) -> Result<String, GatewayError> {
        let uri: Uri = self.base.join(path)?.as_str().parse()?;

        let mut request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(USER_AGENT, AGENT)
            .header(CONNECTION, "keep-alive");
        if let Some(authorization) = &self.authorization {
            request = request.header(AUTHORIZATION, authorization.as_str());
        }
        let request = request.body(Full::new(Bytes::from(body)))?;

        let response = self.http.request(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status));
        }

        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(charset_of)
            .map(str::to_string);
        let body = response.into_body().collect().await?.to_bytes();
        Ok(decode_body(&body, charset.as_deref())?)
    }

    /// Run one `post_manager` command and return the fragment it answered with
    pub async fn command(&self, name: &str, mac: &str, expected: &str) -> Result<Element, GatewayError> {
        let body = format!(
            "<Command>\n    <Name>{}</Name>\n    <MacId>{}</MacId>\n</Command>",
            name, mac
        );
        debug!("Sending {} to {}", name, self.base);

        let root = Element::parse(&self.post(POST_MANAGER, body).await?)?;
        match category_element(&root) {
            Some(fragment) if fragment.name == expected => Ok(fragment.clone()),
            Some(fragment) => Err(GatewayError::UnexpectedResponse(fragment.name.clone())),
            None => Err(GatewayError::UnexpectedResponse(root.name.clone())),
        }
    }

    pub async fn fetch_demand(&self, mac: &str) -> Result<DemandReading, GatewayError> {
        let fragment = self
            .command("get_instantaneous_demand", mac, "InstantaneousDemand")
            .await?;
        Ok(decode_demand(&fragment)?)
    }

    pub async fn fetch_summation(&self, mac: &str) -> Result<SummationReading, GatewayError> {
        let fragment = self
            .command("get_current_summation", mac, "CurrentSummationDelivered")
            .await?;
        Ok(decode_summation(&fragment)?)
    }

    pub async fn fetch_price(&self, mac: &str) -> Result<PriceReading, GatewayError> {
        let fragment = self.command("get_price", mac, "PriceCluster").await?;
        Ok(decode_price(&fragment)?)
    }

    /// Fetch summation and price together; fails if either one fails
    pub async fn fetch_summation_with_price(
        &self,
        mac: &str,
    ) -> Result<(SummationReading, PriceReading), GatewayError> {
        try_join(self.fetch_summation(mac), self.fetch_price(mac)).await
    }

    /// Query the legacy `cgi_manager` JSON interface for current demand
    pub async fn fetch_usage(&self, mac: &str) -> Result<UsageReading, GatewayError> {
        let body = format!(
            "<LocalCommand>\n  <Name>get_timezone</Name>\n  <MacId>{0}</MacId>\n</LocalCommand>\n\
             <LocalCommand>\n  <Name>get_usage_data</Name>\n  <MacId>{0}</MacId>\n</LocalCommand>",
            mac
        );
        let document = self.post(CGI_MANAGER, body).await?;
        let data: UsageData = serde_json::from_str(&document)?;
        Ok(decode_usage(&data)?)
    }
}
