use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};

use meo_core::diagnostics::Diagnostics;
use meo_core::platform::{create_controller, profile::load_profiles, AdbCommands, EmulatorProfile};
use meo_core::recognizer::Recognizer;
use meo_core::settings::Settings;
use meo_core::vision::{PixelVision, TemplateStore};
use meo_core::{logger, Engine, Options, TaskGraph};
use meo_tui::{App, Command};

const DEFAULT_PROFILE: &str = "Default";
const DEFAULT_ENTRY: &str = "StartUp";
const DEFAULT_ADDRESS: &str = "127.0.0.1:5555";

/// Drive an Android emulator through a task graph.
///
/// No OCR backend is built in: OcrDetect nodes never recognize, so graphs
/// should reach them only as fallbacks.
#[derive(Debug, Parser)]
#[command(name = "meo", version)]
struct Args {
    /// Directory holding tasks.json, options.json, profiles.json and template/
    #[arg(long, default_value = "resource")]
    resource: PathBuf,
    /// Emulator profile name from profiles.json
    #[arg(long)]
    profile: Option<String>,
    /// ADB serial or host:port of the device
    #[arg(long)]
    address: Option<String>,
    /// Node the run starts from
    #[arg(long)]
    entry: Option<String>,
    /// Use the logging stub instead of a real device
    #[arg(long)]
    stub: bool,
    /// Run once without the TUI, logging to stderr
    #[arg(long)]
    headless: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let (log_tx, log_rx) = mpsc::channel::<String>();
    let ui_sink = (!args.headless).then_some(log_tx);
    let _log_guard = logger::init(&cwd.join("logs"), ui_sink, args.headless).context("initializing logs")?;
    info!("meo started");

    // Everything below up to connect() is pure loading; no device is touched.
    let resource = &args.resource;
    let options = Options::load(&resource.join("options.json")).context("loading options.json")?;
    let graph = TaskGraph::load(&resource.join("tasks.json")).context("loading tasks.json")?;

    let profiles_path = resource.join("profiles.json");
    let mut profiles = if profiles_path.exists() {
        load_profiles(&profiles_path).context("loading profiles.json")?
    } else {
        BTreeMap::new()
    };
    profiles
        .entry(DEFAULT_PROFILE.to_string())
        .or_insert_with(|| EmulatorProfile { adb: AdbCommands::standard(), ..EmulatorProfile::default() });

    let settings_path = resource.join("settings.json");
    let settings = Settings::load(&settings_path);
    let profile_name = Settings::pick(args.profile, &settings.profile, DEFAULT_PROFILE);
    let entry = Settings::pick(args.entry, &settings.entry, DEFAULT_ENTRY);
    let Some(profile) = profiles.get(&profile_name) else {
        bail!("unknown profile `{}` (known: {})", profile_name, profiles.keys().cloned().collect::<Vec<_>>().join(", "));
    };
    graph.require(&entry).context("resolving entry node")?;

    let mut templates = TemplateStore::new(resource.join("template"));
    templates.preload(graph.templates()).context("loading templates")?;
    info!(nodes = graph.len(), profile = %profile_name, entry = %entry, "resources loaded");

    Settings { profile: Some(profile_name.clone()), entry: Some(entry.clone()) }.save(&settings_path);

    let address = args.address.unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
    let controller = create_controller(profile, &address, args.stub);
    let vision = PixelVision::new(&options);
    let ocr_nodes = graph.ocr_nodes();
    if !vision.ocr_available() && !ocr_nodes.is_empty() {
        warn!(nodes = %ocr_nodes.join(", "), "no OCR backend, these nodes will never recognize");
    }
    let recognizer = Recognizer::new(Box::new(vision), templates, options.identify_cache);
    let diagnostics = Diagnostics::new(cwd.join("debug"), options.print_window_crop_offset);
    let mut engine = Engine::new(Arc::new(graph), controller, Box::new(recognizer), options).with_diagnostics(diagnostics);
    engine.connect().with_context(|| format!("connecting to {}", address))?;

    if args.headless {
        let report = engine.run(&entry)?;
        println!("{:?} at {} after {} step(s)", report.outcome, report.last_node, report.trace.len());
        return Ok(());
    }

    let (event_tx, event_rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
    let abort = engine.abort_handle();
    let nodes: Vec<String> = engine.graph().nodes().map(|(_, n)| n.name.clone()).collect();
    let mut app = App::new(entry.clone(), nodes, log_rx, event_rx, cmd_tx, abort.clone());

    let mut engine = engine.with_events(event_tx);
    let runner = thread::spawn(move || {
        while let Ok(Command::Start) = cmd_rx.recv() {
            // outcome reaches the UI through Finished
            let _ = engine.run(&entry);
        }
    });

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = meo_tui::event::run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    abort.abort();
    drop(app);
    runner.join().ok();
    result
}
