use actix::prelude::*;
use anyhow::Context as AnyhowContext;
use catalog_admin::api::{AdminApi, HttpAdminApi};
use catalog_admin::bulk::{self, PriceAdjustment, PriceMode, Selection, StockAdjustment, StockMode};
use catalog_admin::config::Config;
use catalog_admin::export::write_catalog_csv;
use catalog_admin::import::{CategoryResolver, Credentials, ImportError, ImportSession};
use catalog_admin::mapping::suggest;
use catalog_admin::pricing::{display_price, PricedCatalog};
use catalog_types::{Product, ProductField};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use log_error::LogError;
use rate_service::{HttpRateSource, RateService, RefreshRate, SetRate};
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "catalog-admin", version, about = "Product catalog back office")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Show how the columns of a CSV file would be mapped
    Map { file: PathBuf },
    /// Import products from a CSV file into one category
    Import {
        file: PathBuf,
        /// Active category every imported product goes into
        #[arg(long)]
        category: String,
        /// Override a column mapping, e.g. "Cost=Regular price". An empty field unmaps the column.
        #[arg(long = "map")]
        overrides: Vec<String>,
    },
    /// List products with their derived prices
    Prices,
    /// Adjust admin prices of the selected products
    BulkPrice {
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
        #[arg(long)]
        mode: PriceMode,
        #[arg(long, allow_hyphen_values = true)]
        value: Decimal,
        /// Profit margin in percent, applied after the base adjustment
        #[arg(long, default_value_t = Decimal::ZERO)]
        margin: Decimal,
        #[arg(long, default_value_t = Decimal::ZERO)]
        tax: Decimal,
        #[arg(long, default_value_t = Decimal::ZERO)]
        shipping: Decimal,
        /// Send the changes instead of only previewing them
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
    /// Adjust stock of the selected products
    BulkStock {
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
        #[arg(long)]
        mode: StockMode,
        #[arg(long)]
        amount: i64,
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
    /// Publish or unpublish the selected products
    Publish {
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
        #[arg(long, default_value_t = false)]
        unpublish: bool,
    },
    /// Delete the selected products
    Delete {
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
    /// Show the conversion rate or publish a new one
    Rate {
        #[arg(long)]
        set: Option<Decimal>,
    },
    /// Write the catalog as CSV
    Export {
        out: PathBuf,
        /// Build the file from the product list instead of the backend export
        #[arg(long, default_value_t = false)]
        local: bool,
    },
}

fn load_env() -> Result<(), anyhow::Error> {
    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env")?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            std::fs::File::create(".env")?;
            envmnt::load_file(".env")?;
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to open .env file: {err}"));
        }
    }
    Ok(())
}

fn selection(ids: Vec<String>) -> Selection {
    let mut selection = Selection::default();
    for id in ids {
        selection.select(id);
    }
    selection
}

fn parse_override(raw: &str) -> Result<(String, Option<ProductField>), anyhow::Error> {
    let (header, field) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected Header=Field, got {raw}"))?;
    let field = match field.trim() {
        "" => None,
        name => Some(
            ProductField::from_name(name).ok_or_else(|| anyhow::anyhow!("Unknown field {name}"))?,
        ),
    };
    Ok((header.trim().to_string(), field))
}

fn print_outcome(outcome: &bulk::BulkOutcome) {
    println!(
        "{} succeeded, {} failed",
        outcome.success_count, outcome.error_count
    );
    for (id, err) in &outcome.failures {
        println!("  {id}: {err}");
    }
}

fn print_plan<T: std::fmt::Display>(plan: &bulk::BulkPlan<T>) {
    for change in &plan.changes {
        println!(
            "{:<24} {:<40} {} -> {}",
            change.id, change.name, change.current, change.new
        );
    }
}

async fn map(file: PathBuf) -> Result<(), anyhow::Error> {
    let data = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Unable to read {}", file.display()))?;
    let mut session = ImportSession::new();
    let mapping = session.load(&data)?.clone();
    for (idx, header) in mapping.headers().enumerate() {
        let field = mapping
            .field_at(idx)
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string());
        let suggestions = suggest(header)
            .into_iter()
            .map(|(f, score)| format!("{f} ({score})"))
            .join(", ");
        println!("{header:<30} {field:<28} {suggestions}");
    }
    let missing = mapping.missing_required();
    if !missing.is_empty() {
        println!("Missing required: {}", missing.iter().join(", "));
    }
    Ok(())
}

async fn import(
    api: &dyn AdminApi,
    credentials: &Credentials,
    file: PathBuf,
    category: String,
    overrides: Vec<String>,
) -> Result<(), anyhow::Error> {
    let data = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Unable to read {}", file.display()))?;
    let mut session = ImportSession::new();
    session.load(&data)?;
    for raw in overrides {
        let (header, field) = parse_override(&raw)?;
        if !session.assign(&header, field)? {
            anyhow::bail!("No column named {header}");
        }
    }
    let resolver = CategoryResolver::load(api)
        .await
        .context("Unable to load categories")?;
    session.select_category(resolver.resolve(&category)?)?;
    match session.submit(api, credentials).await {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(ImportError::Rejected { reason, summary }) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Err(anyhow::anyhow!("{reason}"))
        }
        Err(err) => Err(err.into()),
    }
}

async fn products(api: &dyn AdminApi) -> Result<Vec<Product>, anyhow::Error> {
    api.list_products()
        .await
        .context("Unable to load products")
}

#[actix_rt::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();
    load_env()?;

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let client = reqwest::Client::builder()
        .build()
        .context("Unable to build HTTP client")?;
    let api = HttpAdminApi::new(client.clone(), &config.api_base_url, config.api_token.clone());
    let credentials = Credentials {
        token: config.api_token.clone(),
        role: config.api_role,
    };
    let rate_source = Arc::new(HttpRateSource::new(
        client,
        &config.api_base_url,
        config.api_token.clone(),
    ));
    let rate_service = RateService::new(rate_source, config.rate_options()).start();

    match cli.command {
        Commands::Map { file } => map(file).await?,
        Commands::Import {
            file,
            category,
            overrides,
        } => import(&api, &credentials, file, category, overrides).await?,
        Commands::Prices => {
            let categories = api
                .active_categories()
                .await
                .context("Unable to load categories")?;
            let catalog = PricedCatalog::new(products(&api).await?, categories);
            let rate = rate_service
                .send(RefreshRate)
                .await
                .log_error("Rate service unavailable")
                .unwrap_or_default();
            println!("Conversion rate: {rate}");
            for p in catalog.priced() {
                println!(
                    "{:<24} {:<40} {:<20} {:>10} {:>10} {:>12}",
                    p.product.id,
                    p.product.name,
                    p.product.category,
                    p.product.admin_price,
                    p.final_price.round_dp(2),
                    display_price(p.final_price, rate)
                );
            }
        }
        Commands::BulkPrice {
            ids,
            mode,
            value,
            margin,
            tax,
            shipping,
            confirm,
        } => {
            let adjustment = PriceAdjustment {
                mode,
                value,
                profit_margin: margin,
                tax,
                shipping,
            };
            let products = products(&api).await?;
            let plan = bulk::preview_prices(&products, &selection(ids), &adjustment);
            print_plan(&plan);
            if confirm {
                print_outcome(&bulk::commit(&api, &plan).await);
            } else {
                println!("Preview only, pass --confirm to apply {} changes", plan.len());
            }
        }
        Commands::BulkStock {
            ids,
            mode,
            amount,
            confirm,
        } => {
            let adjustment = StockAdjustment { mode, amount };
            let products = products(&api).await?;
            let plan = bulk::preview_stock(&products, &selection(ids), &adjustment);
            print_plan(&plan);
            if confirm {
                print_outcome(&bulk::commit(&api, &plan).await);
            } else {
                println!("Preview only, pass --confirm to apply {} changes", plan.len());
            }
        }
        Commands::Publish { ids, unpublish } => {
            let products = products(&api).await?;
            let categories = api
                .active_categories()
                .await
                .context("Unable to load categories")?;
            let rate = rate_service
                .send(RefreshRate)
                .await
                .log_error("Rate service unavailable")
                .unwrap_or_default();
            let plan =
                bulk::preview_publish(&products, &selection(ids), !unpublish, &categories, rate);
            print_plan(&plan);
            print_outcome(&bulk::commit(&api, &plan).await);
        }
        Commands::Delete { ids, confirm } => {
            let products = products(&api).await?;
            let selection = selection(ids);
            if confirm {
                print_outcome(&bulk::delete_selected(&api, &products, &selection).await);
            } else {
                for p in selection.filter(&products) {
                    println!("{:<24} {}", p.id, p.name);
                }
                println!(
                    "Preview only, pass --confirm to delete {} products",
                    selection.count_in(&products)
                );
            }
        }
        Commands::Rate { set: Some(value) } => {
            let rate = rate_service.send(SetRate(value)).await??;
            println!("Conversion rate set to {rate}");
        }
        Commands::Rate { set: None } => {
            let rate = rate_service.send(RefreshRate).await?;
            println!("{rate}");
        }
        Commands::Export { out, local } => {
            let data = if local {
                let categories = api
                    .active_categories()
                    .await
                    .context("Unable to load categories")?;
                let rate = rate_service
                    .send(RefreshRate)
                    .await
                    .log_error("Rate service unavailable")
                    .unwrap_or_default();
                write_catalog_csv(&products(&api).await?, &categories, rate)?
            } else {
                api.export_products_csv()
                    .await
                    .context("Unable to download export")?
            };
            tokio::fs::write(&out, data)
                .await
                .with_context(|| format!("Unable to write {}", out.display()))?;
            log::info!("Catalog written to {}", out.display());
        }
    }
    Ok(())
}
