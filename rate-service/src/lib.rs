#![deny(clippy::unwrap_used)]

use actix::prelude::*;
use anyhow::Context as AnyhowContext;
use async_trait::async_trait;
use catalog_types::{ConversionRate, Envelope};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub static DEFAULT_CACHE_FILE: &str = "conversion_rate.csv";
static CACHE_KEY: &str = "conversionRate";

pub const DEFAULT_REFRESH: Duration = Duration::from_secs(60 * 60 * 4);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Remote owner of the conversion rate.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch(&self) -> Result<Decimal, anyhow::Error>;
    async fn publish(&self, rate: Decimal) -> Result<(), anyhow::Error>;
}

#[derive(Deserialize, Default)]
struct RateBody {
    #[serde(rename = "conversionRate")]
    conversion_rate: Option<Decimal>,
}

#[derive(Serialize)]
struct SetRateBody {
    rate: Decimal,
}

/// `GET`/`POST /settings/conversion-rate` on the admin backend.
pub struct HttpRateSource {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpRateSource {
    pub fn new(client: reqwest::Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            client,
            url: format!("{}/settings/conversion-rate", base_url.trim_end_matches('/')),
            token,
        }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch(&self) -> Result<Decimal, anyhow::Error> {
        let res: Envelope<RateBody> = self
            .authorize(self.client.get(&self.url))
            .send()
            .await
            .context("Unable to request conversion rate")?
            .error_for_status()?
            .json()
            .await
            .context("Unable to read conversion rate response")?;
        if !res.success {
            anyhow::bail!(res
                .message
                .unwrap_or_else(|| "Conversion rate request rejected".to_string()));
        }
        res.body
            .conversion_rate
            .ok_or(anyhow::anyhow!("Response contains no conversion rate"))
    }

    async fn publish(&self, rate: Decimal) -> Result<(), anyhow::Error> {
        let res: Envelope<catalog_types::Empty> = self
            .authorize(self.client.post(&self.url))
            .json(&SetRateBody { rate })
            .send()
            .await
            .context("Unable to send conversion rate")?
            .json()
            .await
            .context("Unable to read conversion rate response")?;
        if !res.success {
            anyhow::bail!(res
                .message
                .unwrap_or_else(|| "Conversion rate update rejected".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct RateOptions {
    pub cache_path: PathBuf,
    pub refresh: Duration,
    pub timeout: Duration,
}

impl Default for RateOptions {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            refresh: DEFAULT_REFRESH,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct RateService {
    rate: Arc<RwLock<ConversionRate>>,
    source: Arc<dyn RateSource>,
    options: RateOptions,
}

impl RateService {
    pub fn new(source: Arc<dyn RateSource>, options: RateOptions) -> Self {
        let rate = match read_cache(&options.cache_path) {
            Ok(rate) => rate,
            Err(err) => {
                log::warn!("Unable to read conversion rate cache: {err}");
                None
            }
        }
        .unwrap_or_default();
        log::info!("Starting with conversion rate {rate}");
        Self {
            rate: Arc::new(RwLock::new(rate)),
            source,
            options,
        }
    }
}

/// `conversion_rate.csv` next to the running executable.
pub fn default_cache_path() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            return dir.join(DEFAULT_CACHE_FILE);
        }
    }
    PathBuf::from(DEFAULT_CACHE_FILE)
}

fn read_cache(file: &Path) -> Result<Option<ConversionRate>, anyhow::Error> {
    match std::fs::read_to_string(file) {
        Ok(file) => file
            .lines()
            .filter_map(|l| {
                let mut split = l.split(',');
                Some((split.next()?.trim(), split.next()?.trim()))
            })
            .find(|(k, _)| *k == CACHE_KEY)
            .map(|(_, r)| {
                Decimal::from_str_exact(r)
                    .map(ConversionRate::new)
                    .context(format!("Unable to parse cached conversion rate {r}"))
            })
            .transpose(),
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
            Err(err).context("Unable to open conversion rate cache")
        }
        Err(_) => Ok(None),
    }
}

async fn write_cache(file: &Path, rate: ConversionRate) -> Result<(), anyhow::Error> {
    tokio::fs::write(file, format!("{CACHE_KEY},{rate}\n")).await?;
    Ok(())
}

/// Single refresh attempt. A slow or failing source leaves the current value in place.
async fn refresh_once(
    source: &dyn RateSource,
    rate: &RwLock<ConversionRate>,
    options: &RateOptions,
) -> ConversionRate {
    match tokio::time::timeout(options.timeout, source.fetch()).await {
        Ok(Ok(fetched)) => {
            let fetched = ConversionRate::new(fetched);
            *rate.write().await = fetched;
            if let Err(err) = write_cache(&options.cache_path, fetched).await {
                log::error!("Unable to write conversion rate cache: {err}");
            }
            fetched
        }
        Ok(Err(err)) => {
            log::warn!("Unable to fetch conversion rate: {err}");
            *rate.read().await
        }
        Err(_) => {
            log::warn!(
                "Conversion rate request timed out after {}ms",
                options.timeout.as_millis()
            );
            *rate.read().await
        }
    }
}

impl Actor for RateService {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        let rate = self.rate.clone();
        let source = self.source.clone();
        let options = self.options.clone();
        tokio::spawn(async move {
            loop {
                log::info!(
                    "Next conversion rate refresh in {}m",
                    options.refresh.as_secs() / 60
                );
                tokio::time::sleep(options.refresh).await;
                refresh_once(source.as_ref(), &rate, &options).await;
            }
        });
    }
}

#[derive(Message)]
#[rtype(result = "ConversionRate")]
pub struct GetRate;

#[derive(Message)]
#[rtype(result = "ConversionRate")]
pub struct RefreshRate;

#[derive(Message)]
#[rtype(result = "Result<ConversionRate, anyhow::Error>")]
pub struct SetRate(pub Decimal);

impl Handler<GetRate> for RateService {
    type Result = ResponseActFuture<Self, ConversionRate>;

    fn handle(&mut self, _: GetRate, _: &mut Self::Context) -> Self::Result {
        let rate = self.rate.clone();
        Box::pin(async move { *rate.read().await }.into_actor(self))
    }
}

impl Handler<RefreshRate> for RateService {
    type Result = ResponseActFuture<Self, ConversionRate>;

    fn handle(&mut self, _: RefreshRate, _: &mut Self::Context) -> Self::Result {
        let rate = self.rate.clone();
        let source = self.source.clone();
        let options = self.options.clone();
        Box::pin(
            async move { refresh_once(source.as_ref(), &rate, &options).await }.into_actor(self),
        )
    }
}

impl Handler<SetRate> for RateService {
    type Result = ResponseActFuture<Self, Result<ConversionRate, anyhow::Error>>;

    fn handle(&mut self, SetRate(value): SetRate, _: &mut Self::Context) -> Self::Result {
        let rate = self.rate.clone();
        let source = self.source.clone();
        let cache_path = self.options.cache_path.clone();
        Box::pin(
            async move {
                if value <= Decimal::ZERO {
                    anyhow::bail!("Conversion rate must be positive, got {value}");
                }
                source
                    .publish(value)
                    .await
                    .context("Unable to publish conversion rate")?;
                let new_rate = ConversionRate(value);
                *rate.write().await = new_rate;
                if let Err(err) = write_cache(&cache_path, new_rate).await {
                    log::error!("Unable to write conversion rate cache: {err}");
                }
                Ok(new_rate)
            }
            .into_actor(self),
        )
    }
}
