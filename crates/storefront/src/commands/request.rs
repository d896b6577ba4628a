//! Request command - send an arbitrary API request through the gateway.

use anyhow::{Context as _, Result};
use clap::Args;
use serde_json::Value;
use storefront_gateway::{ApiResponse, Method, RequestDescriptor};

use super::{Context, describe};

/// Arguments for the request command.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: String,

    /// Path relative to the API base URL, e.g. `products/12`
    pub path: String,

    /// JSON request body
    #[arg(short, long)]
    pub body: Option<String>,

    /// Query parameter as key=value (repeatable)
    #[arg(short, long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Extra header as name:value (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,
}

/// Run the request command.
pub async fn run(args: RequestArgs, ctx: &Context) -> Result<()> {
    let request = build_request(&args)?;
    let gateway = ctx.gateway()?;

    tracing::debug!(method = %request.method, path = %request.path, "sending request");
    let response = gateway.send(&request).await.map_err(describe)?;

    print_response(&response, ctx)
}

fn build_request(args: &RequestArgs) -> Result<RequestDescriptor> {
    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", args.method))?;

    let mut request = RequestDescriptor::new(method, args.path.trim_start_matches('/'));

    if let Some(body) = &args.body {
        let value: Value = serde_json::from_str(body).context("Request body is not valid JSON")?;
        request = request.json(value);
    }

    for pair in &args.query {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Query parameter must be key=value: {}", pair))?;
        request = request.query(key, value);
    }

    for pair in &args.headers {
        let (name, value) = pair
            .split_once(':')
            .with_context(|| format!("Header must be name:value: {}", pair))?;
        request = request.header(name.trim(), value.trim());
    }

    Ok(request)
}

fn print_response(response: &ApiResponse, ctx: &Context) -> Result<()> {
    if response.body.is_empty() {
        if ctx.json_output {
            println!("null");
        } else if ctx.verbose {
            println!("({} with empty body)", response.status);
        }
        return Ok(());
    }

    match response.json::<Value>() {
        Ok(value) if ctx.json_output => println!("{}", value),
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", response.text()),
    }

    Ok(())
}
