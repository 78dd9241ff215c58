// WhaleAI site tool - hydrate a page description or run the waitlist and
// donation flows from the terminal
use std::fs;
use std::sync::Arc;

use whaleai_site::api::{HttpTransport, WaitlistClient};
use whaleai_site::clipboard::{Clipboard, SystemClipboard};
use whaleai_site::config::{self, AppConfig, APP_NAME, APP_VERSION};
use whaleai_site::counts::{self, CountSync};
use whaleai_site::dom::{self, Document};
use whaleai_site::donate::{DonationWidget, MSG_ADDRESS_UNSET};
use whaleai_site::logger;
use whaleai_site::page::Page;
use whaleai_site::resolver::{ConfigKey, SiteConfig};
use whaleai_site::tasks::TaskSlots;
use whaleai_site::waitlist::{self, FormInput, SubmitOutcome, WaitlistForm};

const USAGE: &str = "\
Usage: whaleai-site [--config PATH] [--verbose] [--user-agent UA] <command>

Commands:
  hydrate <page.json> [--out FILE] [--remote]   Hydrate a page and print HTML
  join <handle> [--email E] [--ref CODE] [--source S] [--copy]
                                                Join the waitlist
  counts                                        Show waitlist counts
  donate [amount] [--remote] [--copy]           Show donation links
  config [--init]                               Show resolved config, or write defaults";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Hydrate { page: String, out: Option<String>, remote: bool },
    Join { handle: String, email: String, ref_code: String, source: String, copy: bool },
    Counts,
    Donate { amount: Option<String>, remote: bool, copy: bool },
    Config { init: bool },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cli {
    config: Option<String>,
    verbose: bool,
    user_agent: Option<String>,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut config = None;
    let mut verbose = false;
    let mut user_agent = None;
    let mut out = None;
    let mut email = String::new();
    let mut ref_code = String::new();
    let mut source = String::new();
    let mut remote = false;
    let mut copy = false;
    let mut init = false;
    let mut positional: Vec<String> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--config" => config = Some(value(arg)?),
            "--user-agent" => user_agent = Some(value(arg)?),
            "--out" => out = Some(value(arg)?),
            "--email" => email = value(arg)?,
            "--ref" => ref_code = value(arg)?,
            "--source" => source = value(arg)?,
            "--verbose" | "-v" => verbose = true,
            "--remote" => remote = true,
            "--copy" => copy = true,
            "--init" => init = true,
            "--help" | "-h" => positional.insert(0, "help".to_string()),
            flag if flag.starts_with("--") => return Err(format!("Unknown option: {}", flag)),
            _ => positional.push(arg.clone()),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        None | Some("help") => Command::Help,
        Some("hydrate") => Command::Hydrate {
            page: positional.next().ok_or("hydrate needs a page file")?,
            out,
            remote,
        },
        Some("join") => Command::Join {
            handle: positional.next().ok_or("join needs a Telegram handle")?,
            email,
            ref_code,
            source,
            copy,
        },
        Some("counts") => Command::Counts,
        Some("donate") => Command::Donate {
            amount: positional.next(),
            remote,
            copy,
        },
        Some("config") => Command::Config { init },
        Some(other) => return Err(format!("Unknown command: {}", other)),
    };

    if let Some(extra) = positional.next() {
        return Err(format!("Unexpected argument: {}", extra));
    }

    Ok(Cli {
        config,
        verbose,
        user_agent,
        command,
    })
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    logger::set_echo_warnings(cli.verbose);

    // Logging is best effort
    match config::get_app_data_dir() {
        Ok(data_dir) => {
            if let Err(e) = logger::init_logger(&data_dir) {
                eprintln!("warning: could not create log file: {}", e);
            }
        }
        Err(e) => eprintln!("warning: {}", e),
    }
    logger::log_to_file(&format!("{} v{} starting: {:?}", APP_NAME, APP_VERSION, cli.command));

    let mut app = config::load_config(cli.config.as_deref())?;
    if cli.user_agent.is_some() {
        app.user_agent = cli.user_agent.clone();
    }

    match cli.command {
        Command::Help => {
            println!("{} v{}\n\n{}", APP_NAME, APP_VERSION, USAGE);
            Ok(())
        }
        Command::Hydrate { page, out, remote } => hydrate(&app, &page, out.as_deref(), remote).await,
        Command::Join { handle, email, ref_code, source, copy } => {
            let input = FormInput {
                telegram: handle,
                email,
                ref_code,
                heard_about: source,
                honeypot: String::new(),
            };
            join(&app, &input, copy).await
        }
        Command::Counts => show_counts(&app).await,
        Command::Donate { amount, remote, copy } => donate(&app, amount.as_deref(), remote, copy).await,
        Command::Config { init } => show_config(&app, cli.config.as_deref(), init),
    }
}

async fn hydrate(app: &AppConfig, path: &str, out: Option<&str>, remote: bool) -> Result<(), String> {
    let path = shellexpand::tilde(path).to_string();
    let json = fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read page {}: {}", path, e))?;
    let spec = dom::parse_page(&json)?;

    let transport = HttpTransport::new()?;
    let page = Page::load(spec, app, transport, remote).await;

    for diagnostic in &page.diagnostics {
        eprintln!("warning: {}", diagnostic.message);
    }
    if let CountSync::Failed(e) = &page.counts {
        eprintln!("warning: counts unavailable: {}", e);
    }

    let html = page.to_html();
    page.close();

    match out {
        Some(out) => {
            let out = shellexpand::tilde(out).to_string();
            fs::write(&out, html).map_err(|e| format!("Failed to write {}: {}", out, e))?;
            println!("Wrote {}", out);
        }
        None => println!("{}", html),
    }

    Ok(())
}

async fn join(app: &AppConfig, input: &FormInput, copy: bool) -> Result<(), String> {
    let site = Arc::new(app.site_config(None));
    let form = WaitlistForm::new(site, app.handle, HttpTransport::new()?, Arc::new(TaskSlots::new()));

    // Headless: the form renders into an empty page
    let mut doc = Document::default();

    match form.submit(&mut doc, input).await {
        SubmitOutcome::Joined { referral_link, duplicate, .. } => {
            println!("{}", if duplicate { waitlist::MSG_DUPLICATE } else { waitlist::MSG_JOINED });
            match referral_link {
                Some(link) => {
                    println!("Referral link: {}", link);
                    if copy {
                        copy_text(&link)?;
                    }
                }
                None => println!("{}", waitlist::MSG_LINK_PENDING),
            }
            Ok(())
        }
        SubmitOutcome::Misconfigured => Err(waitlist::MSG_MISCONFIGURED.to_string()),
        SubmitOutcome::InvalidHandle => Err(waitlist::MSG_INVALID_HANDLE.to_string()),
        SubmitOutcome::Blocked => Err(waitlist::MSG_BLOCKED.to_string()),
        SubmitOutcome::Failed { message } => Err(message),
        SubmitOutcome::Closed | SubmitOutcome::Superseded => Err("Submission was not completed".to_string()),
    }
}

async fn show_counts(app: &AppConfig) -> Result<(), String> {
    let site = app.site_config(None);
    let client = match site.api_base() {
        Some(base) => Some(WaitlistClient::new(base, HttpTransport::new()?)),
        None => None,
    };

    match counts::fetch_counts(client.as_ref()).await {
        CountSync::Updated(c) => {
            println!("Total:       {}", c.total_count);
            println!("Today:       {}", c.today_count);
            println!("Last 7 days: {}", c.week_count);
            Ok(())
        }
        CountSync::Unconfigured => Err("WORKER_API_BASE_URL is not set".to_string()),
        CountSync::Failed(e) => Err(e.to_string()),
    }
}

async fn donate(app: &AppConfig, amount: Option<&str>, remote: bool, copy: bool) -> Result<(), String> {
    let mut site = app.site_config(None);

    if remote {
        if let Some(base) = site.api_base() {
            let client = WaitlistClient::new(base, HttpTransport::new()?);
            match client.fetch_remote_config().await {
                Ok(remote) => site = site.hydrated_with(&remote),
                Err(e) => logger::warn(&format!("Remote config unavailable: {}", e)),
            }
        }
    }

    let widget = DonationWidget::new(Arc::new(site), app.donation.clone(), app.user_agent.as_deref());
    let amount = amount.unwrap_or(app.donation.start_amount.as_str());
    let links = widget.build(Some(amount)).ok_or(MSG_ADDRESS_UNSET)?;

    if let Some(address) = widget.address() {
        println!("Address:  {}", address);
    }
    println!("Amount:   {}", links.amount.as_deref().unwrap_or("(any)"));
    println!("Wallet:   {}", links.deep_link);
    println!("Browser:  {}", links.web_link);
    println!("Open:     {}", links.primary);
    if let Some(qr) = &links.qr_url {
        println!("QR:       {}", qr);
    }

    if copy {
        copy_text(&links.deep_link)?;
    }

    Ok(())
}

fn show_config(app: &AppConfig, explicit: Option<&str>, init: bool) -> Result<(), String> {
    if init {
        let path = config::save_config(app, explicit)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    println!("Config file: {}", config::config_path(explicit)?.display());
    let site: SiteConfig = app.site_config(None);
    println!("Origin:      {}", site.origin());
    for key in ConfigKey::ALL {
        let value = site.resolve(key);
        let status = if site.is_set(key) { "" } else { "  (missing)" };
        println!("{:<20} {}{}", key.name(), value, status);
    }

    Ok(())
}

fn copy_text(text: &str) -> Result<(), String> {
    SystemClipboard::new()?.set_text(text)?;
    println!("Copied to clipboard");
    Ok(())
}
