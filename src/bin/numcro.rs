// Numcro CLI
// Daemon binary: loads settings, layout and macros, then runs the engine

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;

use numcro_core::mapping::ButtonTable;
use numcro_core::notify::LogNotifier;
use numcro_core::{
    Engine, EngineCommand, EngineContext, KeySink, Layout, LogSink, MacroStore, Notification,
    NotificationSink, Settings,
};

const NOTIFICATION_CAPACITY: usize = 256;
const WAIT_INTERVAL: Duration = Duration::from_millis(200);

/// Numpad macro mapper daemon
#[derive(Parser, Debug)]
#[command(name = "numcro")]
#[command(version)]
#[command(about = "Map keys from local and networked keypads to macros", long_about = None)]
struct Args {
    /// TOML settings file
    #[arg(short, long, value_name = "SETTINGS")]
    settings: Option<PathBuf>,

    /// JSON layout file
    #[arg(short, long, value_name = "LAYOUT")]
    layout: Option<PathBuf>,

    /// JSON macro store
    #[arg(short, long, value_name = "MACROS")]
    macros: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate settings, layout and macros, then exit
    #[arg(long)]
    check_config: bool,

    /// List available keyboard devices
    #[arg(long)]
    list_devices: bool,

    /// Record a macro with this name; the abort key ends it
    #[arg(long, value_name = "NAME")]
    record: Option<String>,

    /// Do not listen for networked broadcasters
    #[arg(long)]
    no_network: bool,

    /// Do not attach the local keyboard hook
    #[arg(long)]
    no_hook: bool,
}

struct Application {
    args: Args,
    settings: Settings,
    layout_path: Option<PathBuf>,
    macros_path: Option<PathBuf>,
    running: Arc<AtomicBool>,
}

impl Application {
    fn new(args: Args) -> Result<Self> {
        let settings = match &args.settings {
            Some(path) => Settings::from_file(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => Settings::load_default().context("Failed to load default settings")?,
        };
        let layout_path = args.layout.clone().or_else(Settings::default_layout_path);
        let macros_path = args.macros.clone().or_else(Settings::default_macros_path);

        Ok(Self {
            args,
            settings,
            layout_path,
            macros_path,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    fn load_layout(&self) -> Result<ButtonTable> {
        match &self.layout_path {
            Some(path) if path.exists() => {
                let table = Layout::load(path)
                    .and_then(Layout::into_table)
                    .with_context(|| format!("Failed to load layout from {}", path.display()))?;
                log::info!("Loaded {} button(s) from {}", table.len(), path.display());
                Ok(table)
            }
            Some(path) => {
                log::info!("No layout at {}; starting with an empty grid", path.display());
                Ok(ButtonTable::default())
            }
            None => Ok(ButtonTable::default()),
        }
    }

    fn load_macros(&self) -> Result<MacroStore> {
        match &self.macros_path {
            Some(path) => {
                let store = MacroStore::load(path)
                    .with_context(|| format!("Failed to load macros from {}", path.display()))?;
                log::info!("Loaded {} macro(s) from {}", store.len(), path.display());
                Ok(store)
            }
            None => Ok(MacroStore::new()),
        }
    }

    fn validate(&self) -> Result<()> {
        let table = self.load_layout()?;
        let macros = self.load_macros()?;
        let dangling = table
            .iter()
            .filter_map(|b| b.assigned_macro_id.filter(|id| !macros.contains(*id)).map(|id| (b, id)))
            .collect::<Vec<_>>();
        for (button, id) in &dangling {
            println!("Warning: button '{}' refers to missing macro {}", button.name, id);
        }
        println!(
            "Configuration is valid: {}x{} grid, {} button(s), {} macro(s)",
            table.rows(),
            table.cols(),
            table.len(),
            macros.len()
        );
        Ok(())
    }

    #[cfg(feature = "local-hook")]
    fn list_devices() -> Result<()> {
        let devices = numcro_core::transport::LocalHook::list_devices()?;
        println!("Found {} keyboard device(s):", devices.len());
        for device in &devices {
            match &device.path {
                Some(path) => println!("  {}: {} ({}) [{}]", device.index, device.name, path, device.identity),
                None => println!("  {}: {} [{}]", device.index, device.name, device.identity),
            }
        }
        Ok(())
    }

    #[cfg(not(feature = "local-hook"))]
    fn list_devices() -> Result<()> {
        bail!("--list-devices requires the 'local-hook' feature")
    }

    #[cfg(feature = "local-hook")]
    fn key_sink() -> Arc<dyn KeySink> {
        match numcro_core::output::VirtualKeyboard::new() {
            Ok(keyboard) => Arc::new(keyboard),
            Err(e) => {
                log::warn!("Virtual keyboard unavailable ({}); logging keys instead", e);
                Arc::new(LogSink)
            }
        }
    }

    #[cfg(not(feature = "local-hook"))]
    fn key_sink() -> Arc<dyn KeySink> {
        Arc::new(LogSink)
    }

    #[cfg(unix)]
    fn install_signal_handler(&self) -> Result<()> {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handler")?;
        let running = self.running.clone();
        std::thread::Builder::new()
            .name("signals".to_string())
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    log::info!("Received signal {}, shutting down", signal);
                    running.store(false, Ordering::SeqCst);
                }
            })?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn install_signal_handler(&self) -> Result<()> {
        Ok(())
    }

    fn run(&self) -> Result<()> {
        let engine_settings = &self.settings.engine;
        let ctx = EngineContext::new(self.load_layout()?, self.load_macros()?)
            .with_device_filtering(engine_settings.device_filtering)
            .with_capture_timeout(engine_settings.capture_timeout)
            .with_abort_key(engine_settings.abort_key.clone())
            .with_passthrough(engine_settings.passthrough && self.settings.hook.grab);

        let (tx, rx) = crossbeam_channel::bounded(NOTIFICATION_CAPACITY);
        let mut engine = Engine::start(ctx, engine_settings.queue_capacity, Self::key_sink(), Arc::new(tx))?;

        if self.settings.network.enabled && !self.args.no_network {
            engine.start_network(&self.settings.network)?;
        }
        self.start_hook(&mut engine)?;
        self.install_signal_handler()?;

        if let Some(name) = &self.args.record {
            engine.sender().push_command(EngineCommand::StartRecording { name: name.clone() })?;
            println!("Recording '{}'. Press {} to finish.", name, engine_settings.abort_key);
        } else {
            println!("numcro is running. Press Ctrl+C to exit.");
        }

        let log_notifier = LogNotifier;
        while self.running.load(Ordering::SeqCst) {
            let notification = match rx.recv_timeout(WAIT_INTERVAL) {
                Ok(n) => n,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if let Notification::MacroRecorded(def) = &notification {
                self.persist_macro(def.clone());
                if self.args.record.is_some() {
                    self.running.store(false, Ordering::SeqCst);
                }
            }
            log_notifier.notify(notification);
        }

        let ctx = engine.shutdown()?;
        log::info!(
            "Engine stopped with {} button(s) and {} macro(s)",
            ctx.buttons.len(),
            ctx.macros.len()
        );
        Ok(())
    }

    #[cfg(feature = "local-hook")]
    fn start_hook(&self, engine: &mut Engine) -> Result<()> {
        if self.settings.hook.enabled && !self.args.no_hook {
            if let Err(e) = engine.start_hook(&self.settings.hook) {
                // Networked keypads still work without a local hook
                log::warn!("Local hook unavailable: {}", e);
            }
        }
        Ok(())
    }

    #[cfg(not(feature = "local-hook"))]
    fn start_hook(&self, _engine: &mut Engine) -> Result<()> {
        if self.settings.hook.enabled && !self.args.no_hook {
            log::debug!("Built without 'local-hook'; only network input is available");
        }
        Ok(())
    }

    fn persist_macro(&self, def: numcro_core::MacroDefinition) {
        let Some(path) = &self.macros_path else {
            return;
        };
        if let Err(e) = save_macro(path, def) {
            log::error!("Failed to save macro to {}: {:#}", path.display(), e);
        }
    }
}

/// Merge one macro into the store on disk
fn save_macro(path: &Path, def: numcro_core::MacroDefinition) -> Result<()> {
    let mut store = MacroStore::load(path)?;
    let name = def.name.clone();
    store.insert(def);
    store.save(path)?;
    log::info!("Saved macro '{}' to {}", name, path.display());
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list_devices {
        return Application::list_devices();
    }

    let app = Application::new(args)?;
    if app.args.check_config {
        return app.validate();
    }
    if app.args.record.as_deref().is_some_and(|n| n.trim().is_empty()) {
        bail!("--record needs a non-empty macro name");
    }

    app.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use numcro_core::{MacroDefinition, Step};
    use uuid::Uuid;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["numcro", "--layout", "/tmp/layout.json"]);

        assert_eq!(args.layout, Some(PathBuf::from("/tmp/layout.json")));
        assert!(args.settings.is_none());
        assert!(args.macros.is_none());
        assert!(!args.verbose);
        assert!(!args.check_config);
        assert!(!args.list_devices);
        assert!(!args.no_network);
        assert!(!args.no_hook);
        assert!(args.record.is_none());
    }

    #[test]
    fn test_args_with_options() {
        let args = Args::parse_from([
            "numcro",
            "--settings",
            "/tmp/settings.toml",
            "--macros",
            "/tmp/macros.json",
            "--verbose",
            "--record",
            "combo",
            "--no-network",
            "--no-hook",
        ]);

        assert_eq!(args.settings, Some(PathBuf::from("/tmp/settings.toml")));
        assert_eq!(args.macros, Some(PathBuf::from("/tmp/macros.json")));
        assert!(args.verbose);
        assert_eq!(args.record.as_deref(), Some("combo"));
        assert!(args.no_network);
        assert!(args.no_hook);
    }

    #[test]
    fn test_args_check_config() {
        let args = Args::parse_from(["numcro", "--check-config"]);
        assert!(args.check_config);
    }

    #[test]
    fn test_save_macro_merges_into_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macros.json");

        let first = MacroDefinition::new(Uuid::new_v4(), "first", vec![]);
        let mut store = MacroStore::new();
        store.insert(first.clone());
        store.save(&path).unwrap();

        let second = MacroDefinition::new(Uuid::new_v4(), "second", vec![Step::new("a", 0.0, Some(20.0))]);
        save_macro(&path, second.clone()).unwrap();

        let loaded = MacroStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(first.id), Some(&first));
        assert_eq!(loaded.get(second.id), Some(&second));
    }
}
