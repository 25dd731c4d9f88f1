mod proxy_table;

use std::sync::Arc;

use crate::proxy_table::{ProxyTable, ShopTable};

use egress::store::{PgProxyStore, ProxyStore};
use egress_core::{
    crud::shops::{add_shop, get_shops},
    get_conn_string,
    models::proxies::{NewProxy, ProxyFilter, ProxyPatch, ProxyStatus},
    models::shops::NewShop,
    new_pool,
};

use clap::{Parser, Subcommand, ValueEnum};
use tokio_postgres::NoTls;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("./migrations");
}

#[derive(Debug, Parser)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Operator id recorded on created/updated rows
    #[arg(long, global = true)]
    actor: Option<i32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Applies pending schema migrations
    Migrate,
    /// A subcommand for managing the proxy pool
    Proxy {
        #[command(subcommand)]
        command: ProxyCommand,
    },
    /// A subcommand for managing tenant shops
    Shop {
        #[command(subcommand)]
        command: ShopCommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
enum ProxyCommand {
    /// Registers a new proxy endpoint
    Add {
        host: String,

        port: i32,

        #[arg(short, long, default_value_t = Protocol::Http)]
        protocol: Protocol,

        #[arg(short, long)]
        region: String,

        #[arg(short, long, default_value_t = 100)]
        capacity: i32,

        #[arg(short, long)]
        username: Option<String>,

        #[arg(long)]
        pwd: Option<String>,
    },
    /// Lists proxies, optionally subset by region or status
    List {
        #[arg(short, long)]
        region: Option<String>,

        #[arg(short, long)]
        status: Option<Status>,
    },
    /// Partially updates a proxy; omitted fields keep their value
    Set {
        id: i32,

        #[arg(short, long)]
        region: Option<String>,

        #[arg(short, long)]
        capacity: Option<i32>,

        #[arg(short, long)]
        username: Option<String>,

        #[arg(long)]
        pwd: Option<String>,
    },
    /// Returns a disabled proxy to service
    Enable { id: i32 },
    /// Soft-removes a proxy from allocation without losing history
    Disable { id: i32 },
}

#[derive(Debug, Clone, Subcommand)]
enum ShopCommand {
    Add {
        name: String,

        #[arg(short, long)]
        region: String,
    },
    List,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Protocol {
    Http,
    Https,
    Socks5,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Socks5 => "socks5",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Status {
    Active,
    Unstable,
    Dead,
}

impl From<Status> for ProxyStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Active => ProxyStatus::Active,
            Status::Unstable => ProxyStatus::Unstable,
            Status::Dead => ProxyStatus::Dead,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Command::Migrate = cli.command {
        let (mut client, connection) = tokio_postgres::connect(&get_conn_string(), NoTls)
            .await
            .expect("error connecting to db");
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                eprintln!("connection error: {}", e);
            }
        });
        embedded::migrations::runner()
            .run_async(&mut client)
            .await
            .expect("error running migrations");
        println!("Migrations applied!");
        return;
    }

    let db_pool = Arc::new(new_pool().await.expect("error creating db pool"));
    let proxies = PgProxyStore::new(Arc::clone(&db_pool), cli.actor);

    match cli.command {
        Command::Migrate => unreachable!(),
        Command::Proxy { command } => match command {
            ProxyCommand::Add {
                host,
                port,
                protocol,
                region,
                capacity,
                username,
                pwd,
            } => {
                let proxy = proxies
                    .create(NewProxy {
                        protocol: protocol.to_string(),
                        host,
                        port,
                        username,
                        password: pwd,
                        region,
                        capacity,
                        created_by: None,
                    })
                    .await
                    .expect("error adding proxy");
                println!("Added proxy {}!", proxy.id);
            }
            ProxyCommand::List { region, status } => {
                let filter = ProxyFilter {
                    region,
                    status: status.map(Into::into),
                    is_active: None,
                };
                let proxies = proxies.list(&filter).await.expect("error fetching proxies");
                let table = ProxyTable(proxies);
                println!("{}", table);
            }
            ProxyCommand::Set {
                id,
                region,
                capacity,
                username,
                pwd,
            } => {
                let patch = ProxyPatch {
                    region,
                    capacity,
                    username,
                    password: pwd,
                    ..Default::default()
                };
                proxies.update(id, patch).await.expect("error updating proxy");
                println!("Updated proxy {}!", id);
            }
            ProxyCommand::Enable { id } => {
                let patch = ProxyPatch {
                    is_active: Some(true),
                    ..Default::default()
                };
                proxies.update(id, patch).await.expect("error enabling proxy");
                println!("Enabled proxy {}!", id);
            }
            ProxyCommand::Disable { id } => {
                let patch = ProxyPatch {
                    is_active: Some(false),
                    ..Default::default()
                };
                proxies.update(id, patch).await.expect("error disabling proxy");
                println!("Disabled proxy {}!", id);
            }
        },
        Command::Shop { command } => match command {
            ShopCommand::Add { name, region } => {
                let shop = add_shop(
                    &db_pool,
                    &NewShop {
                        name,
                        region,
                        created_by: cli.actor,
                    },
                )
                .await
                .expect("error adding shop");
                println!("Added shop {}!", shop.id);
            }
            ShopCommand::List => {
                let shops = get_shops(&db_pool).await.expect("error fetching shops");
                let table = ShopTable(shops);
                println!("{}", table);
            }
        },
    }
}
