//! Interactive register session.
//!
//! The operator types commands on stdin; the session is one foreground
//! instance with its own ledger, attached to a background sync worker.
//! `online` / `offline` feed the connectivity monitor, and while offline
//! every submission is buffered without touching the network.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use till_core::config::SyncConfig;
use till_core::services::DatabaseService;
use till_core::sync::{
    ConnectivityMonitor, Delivery, Foreground, HttpOrderTransport, OrderLedger, OrderTransport,
    ReconcileReport, SubmitOutcome, SyncHandle, Transition,
};
use till_core::{Connectivity, Order};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use crate::commands::common::{
    build_order, describe_outcome, format_order_lines, format_queue_lines, load_sync_config,
    open_database, start_worker_with,
};
use crate::commands::sync::describe_sync;
use crate::error::CliError;

const HELP: &str = "\
Commands:
  submit <item> [item...]   take an order, items as name[:quantity[:price]]
  online | offline          report a connectivity change
  sync                      replay the offline queue now
  ledger                    show the latest orders
  queue                     show orders waiting to sync
  status                    connectivity, queue and ledger summary
  help                      this text
  quit                      leave the register";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterCommand {
    Submit(Vec<String>),
    Connectivity(Connectivity),
    Sync,
    Ledger,
    Queue,
    Status,
    Help,
    Quit,
    Nothing,
}

pub fn parse_register_command(line: &str) -> Result<RegisterCommand, CliError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(RegisterCommand::Nothing);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "submit" | "order" => {
            let items: Vec<String> = words.map(str::to_string).collect();
            if items.is_empty() {
                return Err(CliError::EmptyOrder);
            }
            RegisterCommand::Submit(items)
        }
        "online" | "offline" => RegisterCommand::Connectivity(verb.parse()?),
        "sync" => RegisterCommand::Sync,
        "ledger" | "orders" => RegisterCommand::Ledger,
        "queue" => RegisterCommand::Queue,
        "status" => RegisterCommand::Status,
        "help" | "?" => RegisterCommand::Help,
        "quit" | "exit" => RegisterCommand::Quit,
        other => return Err(CliError::UnknownCommand(other.to_string())),
    };
    Ok(command)
}

/// Refuses to transmit while the register is marked offline
pub struct GatedTransport {
    inner: Arc<dyn OrderTransport>,
    connectivity: watch::Receiver<Connectivity>,
}

impl GatedTransport {
    pub fn new(inner: Arc<dyn OrderTransport>, connectivity: watch::Receiver<Connectivity>) -> Self {
        Self {
            inner,
            connectivity,
        }
    }
}

#[async_trait]
impl OrderTransport for GatedTransport {
    async fn send(&self, order: &Order) -> till_core::Result<Delivery> {
        let online = self.connectivity.borrow().is_online();
        if !online {
            return Err(till_core::Error::Transport(
                "register is offline".to_string(),
            ));
        }
        self.inner.send(order).await
    }
}

struct Session {
    db: DatabaseService,
    handle: SyncHandle,
    monitor: ConnectivityMonitor,
    foreground: Foreground,
}

impl Session {
    async fn start(
        config: &SyncConfig,
        db: DatabaseService,
        initial: Connectivity,
    ) -> Result<Self, CliError> {
        let (state, connectivity) = watch::channel(initial);
        let http = HttpOrderTransport::new(&config.order_endpoint, config.send_timeout)?;
        let transport = GatedTransport::new(Arc::new(http), connectivity);
        let handle = start_worker_with(config, &db, Arc::new(transport));

        let ledger = OrderLedger::from_orders(db.load_ledger().await?);
        let foreground = Foreground::new(ledger, handle.subscribe(), config.notice_duration);
        let monitor = ConnectivityMonitor::with_channel(state, handle.clone());

        Ok(Self {
            db,
            handle,
            monitor,
            foreground,
        })
    }

    /// Returns `false` when the operator quits
    async fn execute(&mut self, command: RegisterCommand) -> Result<bool, CliError> {
        match command {
            RegisterCommand::Nothing => {}
            RegisterCommand::Quit => return Ok(false),
            RegisterCommand::Help => println!("{HELP}"),
            RegisterCommand::Submit(items) => self.submit(&items).await?,
            RegisterCommand::Connectivity(next) => match self.monitor.observe(next)? {
                Transition::WentOnline => println!("Back online, syncing saved orders..."),
                Transition::WentOffline => {
                    if let Some(banner) = next.banner() {
                        println!("{banner}");
                    }
                }
                Transition::Unchanged => println!("Already {next}"),
            },
            RegisterCommand::Sync => match self.handle.check_sync_and_wait().await? {
                ReconcileReport::Broadcast { orders, .. } => {
                    println!("Replayed {orders} queued orders");
                }
                report => println!("{}", describe_sync(&report, 0)),
            },
            RegisterCommand::Ledger => {
                let ledger = self.foreground.ledger();
                let latest: Vec<&Order> = ledger.newest_first().into_iter().take(10).collect();
                if latest.is_empty() {
                    println!("No orders yet.");
                }
                for line in format_order_lines(&latest) {
                    println!("{line}");
                }
            }
            RegisterCommand::Queue => {
                let queued = self.db.queued_orders().await?;
                if queued.is_empty() {
                    println!("Offline queue is empty.");
                }
                for line in format_queue_lines(&queued) {
                    println!("{line}");
                }
            }
            RegisterCommand::Status => {
                let connectivity = self.monitor.current();
                println!("Connectivity: {connectivity}");
                if let Some(banner) = connectivity.banner() {
                    println!("{banner}");
                }
                println!("Queued: {}", self.db.queued_count().await?);
                println!("Ledger: {}", self.foreground.ledger().len());
            }
        }
        Ok(true)
    }

    async fn submit(&mut self, items: &[String]) -> Result<(), CliError> {
        let order = build_order(items, None, None)?;
        let outcome = self.handle.submit(order.clone()).await;

        if outcome == SubmitOutcome::Delivered
            && self.foreground.ledger_mut().record_local(order.clone())
        {
            self.db
                .prepend_to_ledger(std::slice::from_ref(&order))
                .await?;
        }

        println!("{}", describe_outcome(&order.id, &outcome)?);
        Ok(())
    }
}

pub async fn run_register(
    start_offline: bool,
    endpoint: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = load_sync_config(endpoint)?;
    let db = open_database(db_path).await?;
    let initial = if start_offline {
        Connectivity::Offline
    } else {
        Connectivity::Online
    };

    let mut session = Session::start(&config, db, initial).await?;
    let mut notices = session.foreground.notices();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Till register ({initial}). Type `help` for commands.");
    prompt()?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let keep_going = match parse_register_command(&line) {
                    Ok(command) => session.execute(command).await.unwrap_or_else(|error| {
                        eprintln!("Error: {error}");
                        true
                    }),
                    Err(error) => {
                        eprintln!("Error: {error}");
                        true
                    }
                };
                if !keep_going {
                    break;
                }
                prompt()?;
            }
            merged = session.foreground.next_merge() => {
                let Some(merged) = merged else { break };
                session.db.prepend_to_ledger(&merged).await?;
            }
            Ok(()) = notices.changed() => {
                let notice = *notices.borrow_and_update();
                if let Some(notice) = notice {
                    println!("\n** {notice} **");
                    prompt()?;
                }
            }
        }
    }

    Ok(())
}

fn prompt() -> Result<(), CliError> {
    print!("till> ");
    io::stdout().flush()?;
    Ok(())
}
