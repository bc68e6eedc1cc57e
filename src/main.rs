use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::{mpsc, Notify};
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod services;
mod utils;

use config::Config;
use services::{
    create_activation_source,
    create_window_system,
    ControlChannel,
    ControlExit,
    PinSupervisor,
};

#[derive(Parser, Debug)]
#[command(name = "pintop")]
#[command(about = "Удерживает выбранное окно поверх всех остальных окон")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "pintop.toml")]
    config: String,

    /// Режим сухого запуска (эмулированный рабочий стол)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования
    #[arg(long)]
    log_level: Option<String>,

    /// Закрепить окно процесса сразу после запуска (можно указать несколько раз)
    #[arg(long = "pin", value_name = "PID")]
    pin: Vec<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Arc::new(Config::load(&args.config)?);

    // Инициализация системы логирования
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, &config.logging.format)?;

    info!("Запуск pintop v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - используется эмулированный рабочий стол");
    }

    let backend = create_window_system(args.dry_run)?;

    // Проверка прав доступа
    if let Err(e) = utils::permissions::check_permissions(backend.windows.as_ref()) {
        warn!("Закрепление окон недоступно, пока нет доступа: {}", e);
    }

    let supervisor = PinSupervisor::new(config.clone(), backend.windows.clone(), backend.activator.clone());

    // Источник событий активации
    let (events_tx, events_rx) = mpsc::channel(64);
    let activation_source = create_activation_source(config.clone(), &backend, args.dry_run)?;
    let activation_handle = activation_source.map(|source| {
        tokio::spawn(async move {
            if let Err(e) = source.run(events_tx).await {
                error!("Ошибка в источнике событий активации: {}", e);
            }
        })
    });
    let events_handle = tokio::spawn(supervisor.clone().run_activation_loop(events_rx));

    for pid in &args.pin {
        match supervisor.pin(*pid) {
            Ok(outcome) if outcome.is_pinned() => info!("{} ({})", outcome, outcome.window().id),
            Ok(outcome) => warn!("pid {} указан повторно, закрепление снято: {}", pid, outcome),
            Err(e) => error!("Не удалось закрепить окно процесса {}: {}", pid, e),
        }
    }

    // Управляющий канал на stdin
    let quit = Arc::new(Notify::new());
    let control = ControlChannel::new(config.clone(), supervisor.clone());
    let control_quit = quit.clone();
    let control_handle = tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        match control.run(stdin, tokio::io::stdout()).await {
            Ok(ControlExit::Quit) => control_quit.notify_one(),
            Ok(ControlExit::Eof) => info!("stdin закрыт, управление только через сигналы"),
            Err(e) => error!("Ошибка управляющего канала: {}", e),
        }
    });

    info!("Все сервисы запущены, сочетание клавиш: {}", config.shortcut.trigger);

    // Ожидание сигнала завершения
    tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
            Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
        },
        _ = quit.notified() => info!("Получена команда завершения"),
    }

    info!("Завершение работы...");

    // Останавливаем все таймеры до остановки остальных задач
    supervisor.shutdown();

    if let Some(handle) = &activation_handle {
        handle.abort();
    }
    control_handle.abort();
    events_handle.abort();

    // Ожидаем завершения задач (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        if let Some(handle) = activation_handle {
            let _ = handle.await;
        }
        let _ = events_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("pintop завершил работу");
    Ok(())
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        "pretty" => registry.with(tracing_subscriber::fmt::layer().with_target(true)).init(),
        _ => registry.with(tracing_subscriber::fmt::layer().compact()).init(),
    }

    Ok(())
}
