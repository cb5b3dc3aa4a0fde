use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
mod config;
mod engine;
mod error;
mod events;
mod mappings;
mod services;
mod settings;
mod utils;

use config::{Config, RunMode};
use engine::{ConfigCache, EventRouter, ForegroundFeed, ReloadSource, RefreshProtocol, SideEffectSink};
use error::PaperError;
use services::{
    create_foreground_detector,
    create_keyboard_listener,
    resolve_primitive,
    resolve_surface_id,
    CommandSideEffects,
    SharedForeground,
    TouchListener,
    TouchRefresh,
    VirtualDevice,
};
use settings::{JsonFileSettingsStore, MemorySettingsStore, SettingValue, SettingsStore};

#[derive(Parser, Debug)]
#[command(name = "refresh-paper")]
#[command(about = "Полное обновление e-ink экрана и сочетания аппаратных клавиш")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, global = true, default_value = "refresh-paper.toml")]
    config: PathBuf,

    /// Уровень логирования (перекрывает [logging].level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Запустить демон (по умолчанию)
    Run {
        /// Режим работы (перекрывает [input].mode)
        #[arg(long, value_enum)]
        mode: Option<RunMode>,

        /// Режим сухого запуска (без реальных действий)
        #[arg(long)]
        dry_run: bool,
    },
    /// Записать значение в общее хранилище настроек
    Set { key: String, value: String },
    /// Показать текущий снимок настроек
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Arc::new(Config::load(&args.config)?);

    // Инициализация системы логирования
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, &config.logging.format)?;

    match args.command.unwrap_or(Command::Run { mode: None, dry_run: false }) {
        Command::Run { mode, dry_run } => {
            info!("Конфигурация загружена из: {:?}", args.config);
            let mode = mode.unwrap_or(config.input.mode);
            run(config, mode, dry_run).await
        }
        Command::Set { key, value } => set_setting(&config, &key, &value),
        Command::Show => show_settings(&config),
    }
}

async fn run(config: Arc<Config>, mode: RunMode, dry_run: bool) -> Result<()> {
    info!("Запуск refresh-paper v{} (режим: {})", env!("CARGO_PKG_VERSION"), mode);

    if dry_run {
        warn!("Режим сухого запуска - реальные действия отключены");
    } else if let Err(e) = utils::permissions::check_permissions(mode) {
        if matches!(e, PaperError::Permission(_)) {
            for line in utils::permissions::get_setup_commands() {
                warn!("{}", line);
            }
        }
        return Err(e.into());
    }

    // Хранилище настроек и кэш
    let store: Arc<dyn SettingsStore> = if dry_run {
        Arc::new(MemorySettingsStore::new())
    } else {
        Arc::new(JsonFileSettingsStore::new(config.settings.path.clone()))
    };
    let cache = Arc::new(ConfigCache::new(
        store,
        mode.chord_setting(),
        config.timing.settings_poll_interval_ms,
    ));
    cache.reload(ReloadSource::Init);
    if !cache.start_observer() {
        info!("Настройки перечитываются не чаще раза в {} мс", config.timing.settings_poll_interval_ms);
    }

    // Примитив обновления и поверхность
    let refresh = Arc::new(RefreshProtocol::new(resolve_primitive(&config.refresh, dry_run)));
    if !refresh.is_supported() {
        warn!("Управление обновлением экрана не найдено, полное обновление отключено");
    }
    match resolve_surface_id(&config.refresh) {
        Some(id) => refresh.set_surface(id),
        None if dry_run => refresh.set_surface(1),
        None => warn!("Идентификатор поверхности не найден, обновление экрана недоступно"),
    }

    // Единое виртуальное устройство для проброса событий и действия Back
    let virtual_device = match VirtualDevice::new("refresh-paper virtual keyboard", dry_run) {
        Ok(device) => Arc::new(device),
        Err(e) if !mode.grabs_device() => {
            warn!("Не удалось создать виртуальное устройство: {}", e);
            Arc::new(VirtualDevice::unavailable("refresh-paper virtual keyboard"))
        }
        Err(e) => return Err(e.into()),
    };

    let sink: Arc<dyn SideEffectSink> = Arc::new(CommandSideEffects::new(
        virtual_device.clone(),
        config.actions.clone(),
        dry_run,
    ));
    let foreground: Arc<dyn ForegroundFeed> = Arc::new(SharedForeground::new());

    let router = EventRouter::new(
        cache.clone(),
        refresh.clone(),
        sink,
        foreground.clone(),
        config.router_config(mode)?,
    );

    let keyboard_listener = create_keyboard_listener(config.clone(), mode, router, virtual_device.clone(), dry_run)?;
    let foreground_detector = create_foreground_detector(config.clone(), foreground.clone(), dry_run)?;

    info!("Все компоненты инициализированы");

    let stop = Arc::new(AtomicBool::new(false));

    // Диспетчеризация клавиш идёт в отдельном потоке: чтение evdev блокирующее
    let (dispatch_done_tx, dispatch_done_rx) = oneshot::channel::<()>();
    let dispatch_stop = stop.clone();
    thread::Builder::new()
        .name("key-dispatch".to_string())
        .spawn(move || {
            if let Err(e) = keyboard_listener.run(dispatch_stop) {
                error!("Ошибка в KeyboardListener: {}", e);
            }
            let _ = dispatch_done_tx.send(());
        })
        .context("Не удалось запустить поток key-dispatch")?;

    if let (Some(touch_path), false) = (config.input.touch_device_path.as_deref(), dry_run) {
        let logic = TouchRefresh::new(
            cache.clone(),
            refresh.clone(),
            foreground.clone(),
            config.foreground.excluded_packages.clone(),
        );
        match TouchListener::new(touch_path, logic) {
            Ok(listener) => {
                let touch_stop = stop.clone();
                thread::Builder::new()
                    .name("touch-listener".to_string())
                    .spawn(move || {
                        if let Err(e) = listener.run(touch_stop) {
                            error!("Ошибка в TouchListener: {}", e);
                        }
                    })
                    .context("Не удалось запустить поток touch-listener")?;
            }
            Err(e) => warn!("Обновление по касаниям отключено: {}", e),
        }
    }

    let foreground_handle = tokio::spawn(async move {
        if let Err(e) = foreground_detector.run().await {
            error!("Ошибка в ForegroundDetector: {}", e);
        }
    });

    // SIGUSR1 - внешний запрос немедленного обновления
    let signal_refresh = refresh.clone();
    let refresh_signal_handle = tokio::spawn(async move {
        let mut usr1 = match signal::unix::signal(signal::unix::SignalKind::user_defined1()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Не удалось подписаться на SIGUSR1: {}", e);
                return;
            }
        };
        while usr1.recv().await.is_some() {
            signal_refresh.trigger("signal");
        }
    });

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения или остановки диспетчера
    tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
            Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
        },
        _ = dispatch_done_rx => warn!("Поток key-dispatch завершился"),
    }

    info!("Завершение работы...");
    stop.store(true, Ordering::Release);

    // Гарантируем отсутствие залипших клавиш: релизим все
    if let Err(e) = virtual_device.release_all_keys() {
        warn!("Не удалось выполнить release_all_keys: {}", e);
    }

    foreground_handle.abort();
    refresh_signal_handle.abort();

    info!("refresh-paper завершил работу");
    Ok(())
}

fn set_setting(config: &Config, key: &str, raw: &str) -> Result<()> {
    if !settings::keys::ALL.contains(&key) {
        anyhow::bail!("Неизвестная настройка '{}'. Допустимые: {}", key, settings::keys::ALL.join(", "));
    }

    let store = JsonFileSettingsStore::new(config.settings.path.clone());
    let value = SettingValue::parse(raw);
    if let Err(e) = store.put(key, value.clone()) {
        warn!("Не удалось сохранить {} = {}: {}", key, value, e);
        std::process::exit(1);
    }

    info!("{} = {} сохранено в {:?}", key, value, store.path());
    Ok(())
}

fn show_settings(config: &Config) -> Result<()> {
    let store: Arc<dyn SettingsStore> = Arc::new(JsonFileSettingsStore::new(config.settings.path.clone()));
    let cache = ConfigCache::new(store, config.input.mode.chord_setting(), config.timing.settings_poll_interval_ms);
    if !cache.reload(ReloadSource::Init) {
        warn!("Настройки прочитаны с ошибкой, показаны значения по умолчанию");
    }

    let snapshot = cache.get();
    println!("{}", serde_json::to_string_pretty(&*snapshot)?);
    Ok(())
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    let compact = format != "full";
    tracing_subscriber::registry()
        .with(filter)
        .with(compact.then(|| fmt::layer().compact()))
        .with((!compact).then(|| fmt::layer()))
        .init();

    Ok(())
}
