use crate::demo::{run_demo, run_installment_plan, run_zoning_fee, DemoArgs};
use crate::infra::{parse_money, parse_payment_mode};
use crate::server;
use clap::{Args, Parser, Subcommand};
use permit_flow::error::AppError;
use permit_flow::workflows::permits::PaymentMode;
use rust_decimal::Decimal;

#[derive(Parser, Debug)]
#[command(
    name = "Business Permit Workflow",
    about = "Run the business permit approval service and its fee tools from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Preview fees without touching any application
    Fees {
        #[command(subcommand)]
        command: FeesCommand,
    },
    /// Walk one application from submission to a settled Treasurer column
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum FeesCommand {
    /// Zoning fee for a total declared capital
    Zoning {
        /// Total capital, e.g. 150,000
        #[arg(long, value_parser = parse_money)]
        capital: Decimal,
    },
    /// Installment schedule for an assessed business tax total
    Installments {
        /// Assessed total, e.g. 5,000.00
        #[arg(long, value_parser = parse_money)]
        total: Decimal,
        /// Annual, Semi-Annual, or Quarterly
        #[arg(long, value_parser = parse_payment_mode, default_value = "Quarterly")]
        mode: PaymentMode,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Fees {
            command: FeesCommand::Zoning { capital },
        } => run_zoning_fee(capital),
        Command::Fees {
            command: FeesCommand::Installments { total, mode },
        } => run_installment_plan(total, mode),
        Command::Demo(args) => run_demo(args),
    }
}
