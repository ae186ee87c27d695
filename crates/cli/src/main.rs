use anyhow::{anyhow, Context};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use orderchain_core::constants::{
    DATA_DIR_ENV, DATE_ACTIVATED_SOURCE_ENV, DEFAULT_DATA_DIR, FIELD_DEFAULTS_ENV,
};
use orderchain_core::{
    date_activated_source_from_env_value, ConceptCode, CoreConfig, DrugOrderFormFields,
    EncounterContext, EncounterId, FieldDefaults, FileOrderRepository, Order, OrderEntryService,
    OrderError, OrderId, OrderState, PatientId,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "orderchain")]
#[command(about = "Drug order entry and history CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one drug order form field
    Submit {
        /// Patient UUID
        #[arg(long)]
        patient: String,
        /// Encounter UUID
        #[arg(long)]
        encounter: String,
        /// Encounter effective date (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)
        #[arg(long)]
        encounter_date: String,
        /// Provider code recorded as the orderer
        #[arg(long)]
        provider: Option<String>,
        /// Order already submitted by this form session (repeatable)
        #[arg(long = "session-order")]
        session_orders: Vec<String>,
        /// JSON file of form field values
        fields: PathBuf,
    },
    /// Show one order
    Show {
        /// Order UUID
        order: String,
    },
    /// List a patient's orders, optionally for one drug
    History {
        /// Patient UUID
        patient: String,
        /// Drug code
        drug: Option<String>,
        /// Include voided orders
        #[arg(long)]
        all: bool,
    },
    /// Follow previous-order links back to the first order
    Chain {
        /// Order UUID
        order: String,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("orderchain=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = Arc::new(config_from_env()?);
    let service = OrderEntryService::new(cfg.clone(), FileOrderRepository::new(cfg));

    match cli.command {
        Commands::Submit {
            patient,
            encounter,
            encounter_date,
            provider,
            session_orders,
            fields,
        } => {
            let mut ctx = EncounterContext::new(
                PatientId::parse(&patient)?,
                EncounterId::parse(&encounter)?,
                parse_encounter_date(&encounter_date)?,
            );
            if let Some(provider) = provider {
                ctx = ctx.with_provider(ConceptCode::parse(&provider)?);
            }
            let session_orders = session_orders
                .iter()
                .map(|id| OrderId::parse(id))
                .collect::<Result<Vec<_>, _>>()?;
            ctx = ctx.reopen_for_editing(session_orders);

            let contents = fs::read_to_string(&fields)
                .with_context(|| format!("failed to read {}", fields.display()))?;
            let fields: DrugOrderFormFields =
                serde_json::from_str(&contents).context("invalid form field JSON")?;

            match service.submit_form(&ctx, fields, &field_defaults_from_env()?) {
                Ok(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
                Err(e) => return Err(rejection(e)),
            }
        }
        Commands::Show { order } => {
            let id = OrderId::parse(&order)?;
            match service.find_order(&id)? {
                Some(order) => println!("{}", serde_json::to_string_pretty(&order)?),
                None => println!("Order {} not found.", id),
            }
        }
        Commands::History { patient, drug, all } => {
            let patient = PatientId::parse(&patient)?;
            let mut orders = match drug {
                Some(drug) => service.order_history(&patient, &ConceptCode::parse(&drug)?)?,
                None => service.patient_orders(&patient)?,
            };
            if !all {
                orders.retain(|order| !order.voided);
            }
            if orders.is_empty() {
                println!("No orders found.");
            } else {
                println!("{}", serde_json::to_string_pretty(&orders)?);
            }
        }
        Commands::Chain { order } => {
            let chain = service.order_chain(&OrderId::parse(&order)?)?;
            for order in chain {
                println!("{}", chain_line(&order));
            }
        }
    }

    Ok(())
}

fn config_from_env() -> anyhow::Result<CoreConfig> {
    let data_dir = std::env::var(DATA_DIR_ENV).unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
    let source =
        date_activated_source_from_env_value(std::env::var(DATE_ACTIVATED_SOURCE_ENV).ok())?;
    Ok(CoreConfig::with_defaults(PathBuf::from(data_dir), source)?)
}

fn field_defaults_from_env() -> anyhow::Result<FieldDefaults> {
    match std::env::var(FIELD_DEFAULTS_ENV) {
        Ok(path) if !path.trim().is_empty() => Ok(FieldDefaults::from_path(path.trim().as_ref())?),
        _ => Ok(FieldDefaults::default()),
    }
}

fn parse_encounter_date(value: &str) -> anyhow::Result<NaiveDateTime> {
    let value = value.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts);
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid encounter date '{}'", value))?;
    date.and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("invalid encounter date '{}'", value))
}

fn chain_line(order: &Order) -> String {
    let state = match order.state() {
        OrderState::Open => "open",
        OrderState::Closed => "closed",
        OrderState::Voided => "voided",
    };
    format!(
        "{} {} drug={} activated={} stopped={} {}",
        order.id,
        order.action,
        order.drug,
        order.date_activated,
        order
            .date_stopped
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into()),
        state
    )
}

/// Validation failures are reported with their message key so a caller can localise them.
fn rejection(err: OrderError) -> anyhow::Error {
    match err.message_key() {
        Some(key) => anyhow!("submission rejected [{}]: {}", key, err),
        None => anyhow::Error::new(err).context("submission failed"),
    }
}
