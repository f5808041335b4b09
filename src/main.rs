use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod bot;
mod config;
mod db;
mod error;
mod notes;
mod reminder;
mod routes;
mod services;

use config::Config;
use reminder::{
    Clock, RecurrenceEngine, ReminderScheduler, ReminderService, SqliteReminderStore, SystemClock,
    TimeParser,
};
use services::{init, telegram::TelegramService};

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub reminders: ReminderService,
    pub scheduler: Arc<ReminderScheduler>,
    pub telegram: TelegramService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mindbot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        "Starting MindBot (timezone {}, reminders {})",
        config.reminders.timezone,
        if config.reminders.enabled { "enabled" } else { "disabled" }
    );

    let pool = init::init_db(&config).await?;
    let telegram = TelegramService::new(config.telegram.bot_token.clone()).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = RecurrenceEngine::new(config.reminders.timezone);
    let reminders = ReminderService::new(
        Arc::new(SqliteReminderStore::new(pool.clone())),
        clock.clone(),
    );
    let scheduler = Arc::new(ReminderScheduler::new(
        reminders.clone(),
        Arc::new(telegram.clone()),
        Arc::new(engine),
        config.reminders.poll_interval(),
        config.reminders.escalation_delay(),
    ));

    let app_state = Arc::new(AppState {
        db: pool.clone(),
        config: config.clone(),
        reminders: reminders.clone(),
        scheduler,
        telegram: telegram.clone(),
    });

    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    let bg_handles = init::spawn_background_workers(app_state.clone(), shutdown_tx.clone());

    // Telegram long polling
    let bot_state = Arc::new(bot::BotState {
        notes: bot::NoteCommands::new(notes::NoteService::new(
            app_state.db.clone(),
            clock.clone(),
        )),
        reminders: bot::ReminderCommands::new(
            app_state.reminders.clone(),
            TimeParser::new(
                config.reminders.timezone,
                clock.clone(),
                config.reminders.default_time,
            ),
            engine,
        ),
        telegram: app_state.telegram.clone(),
    });
    let mut dispatcher = bot::dispatcher(app_state.telegram.get_bot().clone(), bot_state);
    let bot_shutdown = dispatcher.shutdown_token();
    let bot_handle = tokio::spawn(async move { dispatcher.dispatch().await });

    let app = routes::router(routes::HealthState {
        scheduler_enabled: config.reminders.enabled,
        escalations: app_state.reminders.escalations().clone(),
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Health endpoint listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_fut = axum::serve(listener, app);

    let signal_fut = async {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = ctrl_c => {},
                        _ = term.recv() => {},
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to bind SIGTERM, waiting for Ctrl+C only: {}", e);
                    let _ = ctrl_c.await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        tracing::info!("Shutdown signal received");
    };

    tokio::select! {
        res = server_fut => {
            if let Err(e) = res {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = signal_fut => {}
    }

    let _ = shutdown_tx.send(());
    if let Ok(stopping) = bot_shutdown.shutdown() {
        stopping.await;
    }

    let shutdown_wait = Duration::from_secs(15);
    tracing::info!(
        "Waiting up to {}s for background workers to exit",
        shutdown_wait.as_secs()
    );
    let bg_wait = async {
        for h in bg_handles {
            let _ = h.await;
        }
        let _ = bot_handle.await;
    };
    if tokio::time::timeout(shutdown_wait, bg_wait).await.is_err() {
        tracing::warn!("Background workers did not exit in time");
    }

    app_state.scheduler.shutdown();
    app_state.db.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
