use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:5000)
    #[arg(long, global = true, env = "LEDGER_NODE_URL", default_value = "http://127.0.0.1:5000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Mine a block (the node runs the proof search)
    Mine,
    /// Submit a transaction to the pending pool
    Submit {
        /// Sender
        #[arg(long)]
        sender: String,
        /// Recipient
        #[arg(long)]
        recipient: String,
        /// Amount
        #[arg(long)]
        amount: u64,
    },
    /// Print the full chain
    Chain,
    /// Register peers with the node
    Register {
        /// Peer addresses, e.g. http://127.0.0.1:5001
        #[arg(required = true)]
        nodes: Vec<String>,
    },
    /// Run consensus against the node's registered peers
    Resolve,
}

#[derive(Serialize)]
struct Tx {
    sender: String,
    recipient: String,
    amount: u64,
}

#[derive(Serialize)]
struct Nodes {
    nodes: Vec<String>,
}

impl Command {
    fn route(&self) -> (Method, &'static str) {
        match self {
            Command::Mine => (Method::GET, "/mine"),
            Command::Submit { .. } => (Method::POST, "/transactions/new"),
            Command::Chain => (Method::GET, "/chain"),
            Command::Register { .. } => (Method::POST, "/nodes/register"),
            Command::Resolve => (Method::GET, "/nodes/resolve"),
        }
    }

    fn body(&self) -> Result<Option<Value>> {
        let body = match self {
            Command::Submit {
                sender,
                recipient,
                amount,
            } => Some(serde_json::to_value(Tx {
                sender: sender.clone(),
                recipient: recipient.clone(),
                amount: *amount,
            })?),
            Command::Register { nodes } => Some(serde_json::to_value(Nodes {
                nodes: nodes.clone(),
            })?),
            _ => None,
        };
        Ok(body)
    }
}

fn endpoint(node: &str, path: &str) -> String {
    format!("{}{path}", node.trim_end_matches('/'))
}

async fn send(client: &Client, node: &str, cmd: &Command) -> Result<Response> {
    let (method, path) = cmd.route();
    let url = endpoint(node, path);
    debug!(%method, %url, "sending request");
    let mut req = client.request(method, url);
    if let Some(body) = cmd.body()? {
        req = req.json(&body);
    }
    Ok(req.send().await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = Client::new();
    let res = send(&client, &cli.node, &cli.cmd).await?;
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
