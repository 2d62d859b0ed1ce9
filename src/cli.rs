use clap::{Args, Parser, Subcommand};
use famnotify::config::{AppConfig, DeliveryConfig, StoreConfig};
use famnotify::push::vapid::{VapidConfigStatus, load_vapid_config};
use std::net::SocketAddr;

const DEFAULT_SEND_TIMEOUT: &str = "5s";
const DEFAULT_CREDENTIAL_REFRESH_MARGIN: &str = "5m";
const MAX_CREDENTIAL_REFRESH_MARGIN: time::Duration = time::Duration::hours(24);

pub(crate) enum RunOutcome {
    Serve(Box<AppConfig>),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Init(args)) => return RunOutcome::Exit(run_init(args)),
        Some(Command::CheckVapid(args)) => return RunOutcome::Exit(run_check_vapid(args)),
        None => {}
    }

    match resolve_config(&cli) {
        Ok(config) => RunOutcome::Serve(Box::new(config)),
        Err(err) => {
            eprintln!("error: {err}");
            RunOutcome::Exit(2)
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "famnotify",
    version,
    about = "Push notifications for family groups"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long, env = "FAMNOTIFY_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    supabase_service_role_key: Option<String>,
    #[arg(long, env = "VAPID_PRIVATE_KEY", hide_env_values = true)]
    vapid_private_key: Option<String>,
    #[arg(long, env = "VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, env = "VAPID_SUBJECT")]
    vapid_subject: Option<String>,
    /// Service-account JSON document used for managed push.
    #[arg(long, env = "FCM_SERVICE_ACCOUNT", hide_env_values = true)]
    fcm_service_account: Option<String>,
    #[arg(long, env = "FCM_BASE_URL", default_value = famnotify::adapters::DEFAULT_FCM_BASE_URL)]
    fcm_base_url: String,
    #[arg(long, env = "FAMNOTIFY_SEND_TIMEOUT", default_value = DEFAULT_SEND_TIMEOUT)]
    send_timeout: String,
    #[arg(
        long,
        env = "FAMNOTIFY_CREDENTIAL_REFRESH_MARGIN",
        default_value = DEFAULT_CREDENTIAL_REFRESH_MARGIN
    )]
    credential_refresh_margin: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a VAPID key pair.
    Init(InitArgs),
    /// Validate a VAPID public key.
    CheckVapid(CheckVapidArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Args, Debug)]
struct CheckVapidArgs {
    key: String,
}

fn run_init(args: InitArgs) -> i32 {
    let credentials = match famnotify::generate_vapid_credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("failed to generate VAPID credentials: {err}");
            return 1;
        }
    };
    let (subject, show_subject_note) = match args.subject {
        Some(subject) => (subject, false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!("VAPID_PRIVATE_KEY=\"{}\"", credentials.private_key);
    println!("VAPID_PUBLIC_KEY=\"{}\"", credentials.public_key);
    println!("VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace VAPID_SUBJECT with a contact URI you control.");
    }
    0
}

fn run_check_vapid(args: CheckVapidArgs) -> i32 {
    match famnotify::check_public_key(&args.key) {
        Ok(()) => {
            println!("VAPID public key looks valid.");
            0
        }
        Err(err) => {
            eprintln!("invalid VAPID public key: {err}");
            1
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig, String> {
    Ok(AppConfig {
        bind: cli.bind,
        store: resolve_store_config(cli)?,
        delivery: resolve_delivery_config(cli)?,
        fcm_base_url: cli.fcm_base_url.trim().to_string(),
        send_timeout: parse_duration("send timeout", &cli.send_timeout)?
            .try_into()
            .map_err(|_| "send timeout is out of range".to_string())?,
        credential_refresh_margin: parse_refresh_margin(&cli.credential_refresh_margin)?,
    })
}

/// Access tokens never live longer than a day, so a longer margin would
/// force an exchange on every request.
fn parse_refresh_margin(raw: &str) -> Result<time::Duration, String> {
    let margin = parse_duration("credential refresh margin", raw)?;
    if margin >= MAX_CREDENTIAL_REFRESH_MARGIN {
        return Err(format!(
            "credential refresh margin '{}' must be shorter than 24h",
            raw.trim()
        ));
    }
    Ok(margin)
}

fn resolve_store_config(cli: &Cli) -> Result<StoreConfig, String> {
    let url = non_blank(cli.supabase_url.as_deref());
    let key = non_blank(cli.supabase_service_role_key.as_deref());
    match (url, key) {
        (Some(url), Some(key)) => Ok(StoreConfig::Supabase {
            url: url.to_string(),
            service_role_key: key.to_string(),
        }),
        (None, None) => Ok(StoreConfig::Memory),
        (Some(_), None) => Err("--supabase-url requires --supabase-service-role-key".to_string()),
        (None, Some(_)) => Err("--supabase-service-role-key requires --supabase-url".to_string()),
    }
}

fn resolve_delivery_config(cli: &Cli) -> Result<DeliveryConfig, String> {
    let vapid = load_vapid_config(
        non_blank(cli.vapid_private_key.as_deref()),
        non_blank(cli.vapid_public_key.as_deref()),
        non_blank(cli.vapid_subject.as_deref()),
    );
    let service_account = non_blank(cli.fcm_service_account.as_deref());

    match (vapid, service_account) {
        (VapidConfigStatus::Incomplete, _) => Err(
            "VAPID is partially configured; set private key, public key and subject".to_string(),
        ),
        (VapidConfigStatus::Ready(_), Some(_)) => Err(
            "configure either VAPID keys or a service account, not both".to_string(),
        ),
        (VapidConfigStatus::Ready(vapid), None) => Ok(DeliveryConfig::Vapid(vapid)),
        (VapidConfigStatus::Missing, Some(raw)) => {
            Ok(DeliveryConfig::ServiceAccount(raw.to_string()))
        }
        (VapidConfigStatus::Missing, None) => Ok(DeliveryConfig::Missing),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

/// Parses `<number>[s|m|h]`; a bare number means seconds.
fn parse_duration(name: &str, raw: &str) -> Result<time::Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(format!("{name} cannot be empty"));
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("invalid {name} '{value}'; expected <number>[s|m|h]"))?;

    if amount <= 0 {
        return Err(format!("{name} must be greater than 0"));
    }

    let scale = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        _ => return Err(format!("invalid {name} '{value}'; expected <number>[s|m|h]")),
    };
    amount
        .checked_mul(scale)
        .map(time::Duration::seconds)
        .ok_or_else(|| format!("{name} '{value}' is too large"))
}
