use anyhow::Context;
use clap::Parser;
use rfwidget::mock::{CannedResponse, MockRegistry, MockRule, PersonaCatalog};
use rfwidget::resolver::BaseUrlResolver;
use rfwidget::{fetch::HttpFetcher, HarnessConfig, Page, WidgetLoader};
use std::collections::HashMap;
use std::sync::Arc;

/// Load a widget with mocked API responses and print what was assembled
#[derive(Parser, Debug)]
#[command(name = "rfwidget", version, about)]
struct Cli {
    /// Base URL (or file:// directory) the widget directories live under
    base: String,

    /// Widget name, e.g. `footer`
    widget: String,

    /// Persona applied before loading
    #[arg(long, default_value = "basic")]
    persona: String,

    /// JSON file with extra personas
    #[arg(long)]
    personas: Option<std::path::PathBuf>,

    /// Extra mock as METHOD URL STATUS BODY (repeatable)
    #[arg(long, num_args = 4, value_names = ["METHOD", "URL", "STATUS", "BODY"], action = clap::ArgAction::Append)]
    mock: Vec<String>,

    /// Timeout for pass-through requests in milliseconds
    #[arg(long, default_value_t = 30000)]
    timeout_ms: u64,

    /// Extra request header as NAME=VALUE (repeatable)
    #[arg(long = "header", value_name = "NAME=VALUE")]
    headers: Vec<String>,

    /// Also mount the bundle and print the page text snapshot
    #[arg(long)]
    mount: bool,
}

fn parse_headers(raw: &[String]) -> anyhow::Result<HashMap<String, String>> {
    raw.iter()
        .map(|h| {
            h.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .with_context(|| format!("header '{}' is not NAME=VALUE", h))
        })
        .collect()
}

fn parse_mocks(raw: &[String]) -> anyhow::Result<Vec<MockRule>> {
    raw.chunks(4)
        .map(|m| {
            let [method, url, status, body] = m else {
                anyhow::bail!("--mock takes METHOD URL STATUS BODY");
            };
            let status: u16 = status.parse().with_context(|| format!("bad status '{}'", status))?;
            Ok(MockRule::new(method, url.as_str(), CannedResponse::new(status, HashMap::new(), body.as_str())))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = HarnessConfig {
        timeout_ms: cli.timeout_ms,
        headers: parse_headers(&cli.headers)?,
        default_persona: cli.persona.clone(),
        ..Default::default()
    };

    let mut catalog = PersonaCatalog::builtin();
    if let Some(path) = &cli.personas {
        let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        catalog.extend(PersonaCatalog::from_json(&json)?);
    }
    let registry = MockRegistry::builder().catalog(catalog).build();
    for rule in parse_mocks(&cli.mock)? {
        registry.add_rule(rule);
    }

    let resolver = Arc::new(BaseUrlResolver::new(&cli.base)?);
    let fetcher = Arc::new(HttpFetcher::new(&config)?);
    let loader = WidgetLoader::new(config, registry, resolver, fetcher);

    let bundle = loader.load(&cli.widget).await;
    println!("{}", serde_json::to_string_pretty(&bundle.summary())?);

    if cli.mount {
        let mut page = Page::new();
        bundle.load(&mut page);
        let snapshot = page.render_text_snapshot();
        println!("{}", snapshot.text.trim());
        bundle.unload(&mut page);
    }
    Ok(())
}
